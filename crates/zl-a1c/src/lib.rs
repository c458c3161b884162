//! Arena-backed CBOR item graph ("A1C"): a streaming decoder, a
//! deterministic shortest-form encoder, and a debug-only JSON dump, all
//! built directly against [`bumpalo`] rather than `serde` (§4.C).

mod decode;
mod encode;
mod error;
mod item;
mod json;

pub use decode::{decode, DecoderOptions};
pub use encode::encode;
pub use error::{A1cError, ErrorKind};
pub use item::{ArrayBuilder, BuilderError, Item, MapBuilder, Pair};
pub use json::to_json;
