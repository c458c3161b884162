use std::hash::{Hash, Hasher};

use tracing::trace;
use zl_arena::{alloc_slice, ArenaError, RawArena};

/// `(paramId, paramValue)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntParam {
    pub id: i64,
    pub value: i64,
}

/// `(paramId, bytes)`. Equality and hashing compare byte content, not
/// identity: two blob params with the same id and the same bytes (even from
/// different arenas) are the same param.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobParam<'a> {
    pub id: i64,
    pub value: &'a [u8],
}

/// `(paramId, pointer, size)`. Reference parameters identify a runtime
/// pointer owned by the embedding program; they are never serialized, and
/// equality compares pointer identity, not the pointed-to bytes or even the
/// recorded size.
#[derive(Debug, Clone, Copy)]
pub struct RefParam {
    pub id: i64,
    pub ptr: usize,
    pub size: usize,
}

impl PartialEq for RefParam {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.ptr == other.ptr
    }
}
impl Eq for RefParam {}

impl Hash for RefParam {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.ptr.hash(state);
    }
}

/// A canonical, arena-backed local-parameter set: each family sorted by
/// `paramId` ascending with duplicate keys resolved to the entry recorded
/// first in source order. This is the only form the rest of the core ever
/// stores — callers build one with [`build`] from raw, possibly-unsorted,
/// possibly-duplicated slices.
#[derive(Debug, Clone, Copy)]
pub struct LocalParams<'a> {
    ints: &'a [IntParam],
    blobs: &'a [BlobParam<'a>],
    refs: &'a [RefParam],
}

impl<'a> LocalParams<'a> {
    pub const EMPTY: LocalParams<'static> = LocalParams {
        ints: &[],
        blobs: &[],
        refs: &[],
    };

    pub fn ints(&self) -> &'a [IntParam] {
        self.ints
    }

    pub fn blobs(&self) -> &'a [BlobParam<'a>] {
        self.blobs
    }

    pub fn refs(&self) -> &'a [RefParam] {
        self.refs
    }

    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.blobs.is_empty() && self.refs.is_empty()
    }

    /// Deep-copies every array and blob into `arena`, returning an
    /// equivalent set whose pointers all live in the new arena.
    pub fn transfer<'b>(&self, arena: &'b dyn RawArena) -> Result<LocalParams<'b>, ArenaError> {
        let ints = alloc_slice(arena, self.ints)?;
        let mut blobs = Vec::with_capacity(self.blobs.len());
        for b in self.blobs {
            let value = alloc_slice(arena, b.value)?;
            blobs.push(BlobParam { id: b.id, value });
        }
        let blobs = alloc_slice(arena, &blobs)?;
        let refs = alloc_slice(arena, self.refs)?;
        Ok(LocalParams { ints, blobs, refs })
    }
}

impl<'a> PartialEq for LocalParams<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.ints == other.ints && self.blobs == other.blobs && self.refs == other.refs
    }
}
impl<'a> Eq for LocalParams<'a> {}

impl<'a> Hash for LocalParams<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ints.hash(state);
        self.blobs.hash(state);
        self.refs.hash(state);
    }
}

/// Sorts `items` by `id` ascending, keeping (on duplicate ids) the entry
/// that appeared first in source order: `{1:"foo",1:"huh",2:"bar"}`
/// canonicalizes to `{1:"foo",2:"bar"}`.
fn canonicalize<T: Copy>(items: &[T], id_of: impl Fn(&T) -> i64) -> Vec<T> {
    let mut indexed: Vec<(usize, T)> = items.iter().copied().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| id_of(a).cmp(&id_of(b)).then(ia.cmp(ib)));
    let mut out: Vec<T> = Vec::with_capacity(indexed.len());
    for (_, item) in indexed {
        match out.last() {
            Some(last) if id_of(last) == id_of(&item) => {}
            _ => out.push(item),
        }
    }
    out
}

/// Builds the canonical form of a raw, possibly-unsorted, possibly-
/// duplicate-keyed local-parameter set (§4.B `build`).
pub fn build<'a>(
    arena: &'a dyn RawArena,
    ints: &[IntParam],
    blobs: &[BlobParam<'_>],
    refs: &[RefParam],
) -> Result<LocalParams<'a>, ArenaError> {
    let ints = canonicalize(ints, |p| p.id);
    let ints = alloc_slice(arena, &ints)?;

    let canon_blobs = canonicalize(blobs, |p| p.id);
    let mut copied = Vec::with_capacity(canon_blobs.len());
    for b in &canon_blobs {
        let value = alloc_slice(arena, b.value)?;
        copied.push(BlobParam { id: b.id, value });
    }
    let blobs = alloc_slice(arena, &copied)?;

    let refs = canonicalize(refs, |p| p.id);
    let refs = alloc_slice(arena, &refs)?;

    trace!(ints = ints.len(), blobs = blobs.len(), refs = refs.len(), "built canonical local params");
    Ok(LocalParams { ints, blobs, refs })
}
