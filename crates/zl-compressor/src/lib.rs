//! The single-writer `Compressor` facade (§5) and the CBOR document
//! (de)serializer (§4.E): the top-level crate that ties the arena, CBOR
//! item graph, local-parameter resolver, and node/graph registries into
//! the object an embedding program actually builds and persists.

mod canon;
mod compressor;
mod deserialize;
mod error;
mod serialize;

pub use compressor::Compressor;
pub use deserialize::{dependencies, deserialize, Dependencies, VersionPolicy};
pub use error::{CompressorError, ErrorContext, ErrorKind};
pub use serialize::{serialize, serialize_json};
