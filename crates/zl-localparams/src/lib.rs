//! Canonical local-parameter sets shared by nodes and graphs (§4.B): three
//! disjoint families (ints, blobs, refs), a sorted-and-deduped canonical
//! form used for hashing/equality, arena transfer, and resolution of a
//! CBOR params node against a string-keyed dictionary.

mod error;
mod params;
mod resolve;

pub use error::LocalParamsError;
pub use params::{build, BlobParam, IntParam, LocalParams, RefParam};
pub use resolve::resolve;
