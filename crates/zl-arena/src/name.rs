use thiserror::Error;
use tracing::trace;

use crate::arena::{alloc_str, ArenaError, RawArena};

/// Prefix for library-provided (standard) anchor names (§3).
pub const STANDARD_PREFIX: &str = "!zl.";

const MAX_PREFIX_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name prefix '{prefix}' is {len} bytes, exceeding the {MAX_PREFIX_LEN}-byte limit")]
    PrefixTooLong { prefix: String, len: usize },
    #[error("name prefix '{prefix}' contains reserved character '{ch}' at byte offset {index}")]
    ReservedChar {
        prefix: String,
        ch: char,
        index: usize,
    },
    #[error("allocation failed while building name: {0}")]
    Allocation(#[from] ArenaError),
}

/// An immutable name record: a user-chosen `prefix`, a globally unique
/// `unique` string, and an `is_anchor` flag (§3). Both strings are owned by
/// the arena that built this `Name` and are valid for its lifetime.
#[derive(Clone, Copy, Debug)]
pub struct Name<'a> {
    prefix: &'a str,
    unique: &'a str,
    is_anchor: bool,
}

impl<'a> Name<'a> {
    pub fn prefix(&self) -> &'a str {
        self.prefix
    }

    pub fn unique(&self) -> &'a str {
        self.unique
    }

    pub fn is_anchor(&self) -> bool {
        self.is_anchor
    }

    /// Builds a name for a non-standard registration: validates `prefix`,
    /// copies it into `arena`, and (for non-anchor names) formats the
    /// `prefix#id` unique string. Standard names should go through
    /// [`Name::standard`] instead, which bypasses id suffixing.
    pub fn build<'arena>(
        arena: &'arena dyn RawArena,
        prefix: &str,
        id: u32,
    ) -> Result<Name<'arena>, NameError> {
        let is_anchor = validate_prefix(prefix)?;
        let prefix_copy = alloc_str(arena, prefix)?;
        let unique = if is_anchor {
            prefix_copy
        } else {
            let formatted = format!("{prefix}#{id}");
            alloc_str(arena, &formatted)?
        };
        trace!(unique, is_anchor, "built name");
        Ok(Name {
            prefix: prefix_copy,
            unique,
            is_anchor,
        })
    }

    /// Wraps a standard (library-provided) name verbatim: no id suffix is
    /// appended, and `unique` is the prefix itself. Standard names are
    /// always anchors (§3: "reserved for standard names, which use prefix
    /// `!zl.`").
    pub fn standard<'arena>(
        arena: &'arena dyn RawArena,
        prefix: &str,
    ) -> Result<Name<'arena>, NameError> {
        let is_anchor = validate_prefix(prefix)?;
        let prefix_copy = alloc_str(arena, prefix)?;
        Ok(Name {
            prefix: prefix_copy,
            unique: prefix_copy,
            is_anchor,
        })
    }
}

/// Validates `prefix` per §3 and returns whether it denotes an anchor name.
fn validate_prefix(prefix: &str) -> Result<bool, NameError> {
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(NameError::PrefixTooLong {
            prefix: prefix.to_string(),
            len: prefix.len(),
        });
    }
    for (index, ch) in prefix.char_indices() {
        match ch {
            '#' => {
                return Err(NameError::ReservedChar {
                    prefix: prefix.to_string(),
                    ch,
                    index,
                })
            }
            '!' if index != 0 => {
                return Err(NameError::ReservedChar {
                    prefix: prefix.to_string(),
                    ch,
                    index,
                })
            }
            _ => {}
        }
    }
    Ok(prefix.starts_with('!'))
}

/// Extracts the owning id from a non-anchor `unique` string of the form
/// `prefix#id`, per invariant 4 of §8. Returns `None` for anchor names
/// (which never contain a trailing `#id`).
pub fn owner_id_of_unique(unique: &str) -> Option<u32> {
    let (_, digits) = unique.rsplit_once('#')?;
    digits.parse().ok()
}

/// Recovers the original `prefix` from a `unique` string, whether anchor
/// (`unique == prefix`) or non-anchor (`unique == "prefix#id"`). `#` is
/// reserved and cannot appear in a prefix, so a non-anchor `unique` has
/// exactly one. Used to re-register a name under a freshly allocated id,
/// e.g. when rehydrating a serialized component into a different registry.
pub fn prefix_of_unique(unique: &str) -> &str {
    match unique.rsplit_once('#') {
        Some((prefix, _)) => prefix,
        None => unique,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::HeapArena;

    #[test]
    fn non_anchor_name_gets_id_suffix() {
        let heap = HeapArena::new();
        let name = Name::build(&heap, "my.node", 42).unwrap();
        assert_eq!(name.prefix(), "my.node");
        assert_eq!(name.unique(), "my.node#42");
        assert!(!name.is_anchor());
        assert_eq!(owner_id_of_unique(name.unique()), Some(42));
    }

    #[test]
    fn anchor_name_uses_prefix_as_unique() {
        let heap = HeapArena::new();
        let name = Name::build(&heap, "!my.anchor", 7).unwrap();
        assert_eq!(name.unique(), "!my.anchor");
        assert!(name.is_anchor());
        assert_eq!(owner_id_of_unique(name.unique()), None);
    }

    #[test]
    fn standard_name_bypasses_id_suffix() {
        let heap = HeapArena::new();
        let name = Name::standard(&heap, "!zl.store").unwrap();
        assert_eq!(name.unique(), "!zl.store");
        assert!(name.is_anchor());
    }

    #[test]
    fn hash_only_valid_as_first_char() {
        assert!(matches!(
            validate_prefix("bad#prefix"),
            Err(NameError::ReservedChar { ch: '#', .. })
        ));
    }

    #[test]
    fn bang_only_valid_as_first_char() {
        assert!(matches!(
            validate_prefix("my!node"),
            Err(NameError::ReservedChar { ch: '!', .. })
        ));
        assert!(validate_prefix("!anchor").is_ok());
    }

    #[test]
    fn prefix_of_unique_strips_id_suffix() {
        let heap = HeapArena::new();
        let name = Name::build(&heap, "my.node", 42).unwrap();
        assert_eq!(prefix_of_unique(name.unique()), "my.node");
        let anchor = Name::standard(&heap, "!zl.store").unwrap();
        assert_eq!(prefix_of_unique(anchor.unique()), "!zl.store");
    }

    #[test]
    fn prefix_length_bound() {
        let long = "x".repeat(64);
        assert!(matches!(
            validate_prefix(&long),
            Err(NameError::PrefixTooLong { .. })
        ));
        let ok = "x".repeat(63);
        assert!(validate_prefix(&ok).is_ok());
    }
}
