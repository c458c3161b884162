//! Bump-allocated working memory plus a stable-identity name store (§4.A).
//!
//! Every other component of the core allocates text, type arrays, child-ID
//! arrays, and parameter payloads inside a per-compressor arena; this crate
//! owns that contract ([`RawArena`]) and its two implementations
//! ([`HeapArena`], [`LimitedArena`]), along with [`Name`] construction and
//! validation.

mod arena;
mod name;

pub use arena::{alloc_slice, alloc_str, ArenaError, HeapArena, LimitedArena, RawArena};
pub use name::{owner_id_of_unique, prefix_of_unique, Name, NameError, STANDARD_PREFIX};
