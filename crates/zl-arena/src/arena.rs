use std::cell::Cell;

use thiserror::Error;

/// Errors surfaced by arena allocation. Mirrors the single `allocation`
/// error kind of the core (§7): every failure here maps to that kind at
/// the call site.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("allocation of {requested} bytes would exceed the {limit}-byte arena budget ({used} already used)")]
    BudgetExceeded {
        requested: usize,
        used: usize,
        limit: usize,
    },
}

/// The arena contract the rest of the core depends on: `{allocate(bytes) ->
/// *void, free(arena)}` (§6). `free` is implicit in Rust: the arena's
/// allocations are valid for as long as the arena itself lives, and the
/// arena's `Drop` releases everything at once.
///
/// Implemented by [`HeapArena`] and [`LimitedArena`]. Object-safe so a
/// [`LimitedArena`] can wrap any other `RawArena` as its backing store.
pub trait RawArena {
    /// Allocate `len` zero-initialized bytes. The returned slice is valid
    /// for the lifetime of the arena.
    fn try_alloc_bytes(&self, len: usize) -> Result<&mut [u8], ArenaError>;
}

/// A heap arena backed by the process allocator (`bumpalo`), with
/// free-on-destroy semantics: nothing is freed until the whole arena is
/// dropped.
#[derive(Default)]
pub struct HeapArena {
    bump: bumpalo::Bump,
}

impl HeapArena {
    pub fn new() -> Self {
        Self {
            bump: bumpalo::Bump::new(),
        }
    }

    /// Bytes currently allocated from the underlying bump chunk(s).
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Exposes the underlying `bumpalo::Bump` for components (the CBOR item
    /// graph, node/graph child-ID arrays) that need typed bump allocation
    /// rather than the raw byte interface of [`RawArena`].
    pub fn bump(&self) -> &bumpalo::Bump {
        &self.bump
    }
}

impl RawArena for HeapArena {
    fn try_alloc_bytes(&self, len: usize) -> Result<&mut [u8], ArenaError> {
        Ok(self.bump.alloc_slice_fill_copy(len, 0u8))
    }
}

/// An arena that composes a backing [`RawArena`] with a byte budget,
/// failing allocations that would push cumulative usage past the limit.
/// Used to bound the memory a single compressor (or a single serialized
/// document) may consume.
pub struct LimitedArena<'a> {
    backing: &'a dyn RawArena,
    limit: usize,
    used: Cell<usize>,
}

impl<'a> LimitedArena<'a> {
    pub fn new(backing: &'a dyn RawArena, limit: usize) -> Self {
        Self {
            backing,
            limit,
            used: Cell::new(0),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn used(&self) -> usize {
        self.used.get()
    }
}

impl<'a> RawArena for LimitedArena<'a> {
    fn try_alloc_bytes(&self, len: usize) -> Result<&mut [u8], ArenaError> {
        let used = self.used.get();
        let new_used = used.checked_add(len).unwrap_or(usize::MAX);
        if new_used > self.limit {
            return Err(ArenaError::BudgetExceeded {
                requested: len,
                used,
                limit: self.limit,
            });
        }
        let bytes = self.backing.try_alloc_bytes(len)?;
        self.used.set(new_used);
        Ok(bytes)
    }
}

/// Deep-copies `s` into `arena`, returning a view valid for the arena's
/// lifetime. Used throughout the core wherever a component must own a
/// string independent of its original source buffer (e.g. `LocalParams::transfer`).
pub fn alloc_str<'a>(arena: &'a dyn RawArena, s: &str) -> Result<&'a str, ArenaError> {
    let bytes = arena.try_alloc_bytes(s.len())?;
    bytes.copy_from_slice(s.as_bytes());
    // Safety: `bytes` was just filled with a copy of `s`, which is valid UTF-8.
    Ok(unsafe { std::str::from_utf8_unchecked(bytes) })
}

/// Deep-copies a `Copy` slice into `arena`.
pub fn alloc_slice<'a, T: Copy>(arena: &'a dyn RawArena, src: &[T]) -> Result<&'a [T], ArenaError> {
    if src.is_empty() {
        return Ok(&[]);
    }
    let byte_len = std::mem::size_of::<T>() * src.len();
    let bytes = arena.try_alloc_bytes(byte_len)?;
    // Safety: `bytes` has byte_len bytes, matching src's size and T's layout
    // requirements are satisfied because we only ever call this with plain
    // data types (u8, i64, u32 IDs) that have no padding-sensitive invariants.
    unsafe {
        std::ptr::copy_nonoverlapping(src.as_ptr() as *const u8, bytes.as_mut_ptr(), byte_len);
        let ptr = bytes.as_ptr() as *const T;
        Ok(std::slice::from_raw_parts(ptr, src.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_arena_roundtrips_strings() {
        let heap = HeapArena::new();
        let s = alloc_str(&heap, "hello arena").unwrap();
        assert_eq!(s, "hello arena");
    }

    #[test]
    fn limited_arena_enforces_budget() {
        let heap = HeapArena::new();
        let limited = LimitedArena::new(&heap, 8);
        assert!(alloc_str(&limited, "small").is_ok()); // 5 bytes
        assert!(matches!(
            alloc_str(&limited, "this is too long"),
            Err(ArenaError::BudgetExceeded { .. })
        ));
    }

    #[test]
    fn limited_arena_tracks_cumulative_usage() {
        let heap = HeapArena::new();
        let limited = LimitedArena::new(&heap, 10);
        alloc_str(&limited, "abcde").unwrap(); // 5
        assert_eq!(limited.used(), 5);
        alloc_str(&limited, "abcde").unwrap(); // 5 more, exactly at budget
        assert_eq!(limited.used(), 10);
        assert!(alloc_str(&limited, "x").is_err());
    }

    #[test]
    fn alloc_slice_copies_ints() {
        let heap = HeapArena::new();
        let src: [u32; 4] = [1, 2, 3, 4];
        let copy = alloc_slice(&heap, &src).unwrap();
        assert_eq!(copy, &src);
    }
}
