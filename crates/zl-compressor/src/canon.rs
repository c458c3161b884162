use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use zl_localparams::{BlobParam, IntParam, LocalParams};

/// The part of a [`LocalParams`] set that actually reaches the wire:
/// reference params are never serialized (§3), so two sets differing only
/// in their refs must still share one `"params"` entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct WireKey<'a> {
    ints: &'a [IntParam],
    blobs: &'a [BlobParam<'a>],
}

/// Assigns each distinct wire-relevant parameter set a stable 16-hex-digit
/// name, memoizing so identical sets share a name, and disambiguating hash
/// collisions with a monotonic `_k` suffix that starts at 0 (§4.E step 2).
#[derive(Default)]
pub struct ParamDictionary<'a> {
    by_key: IndexMap<WireKey<'a>, String>,
    used_names: HashSet<String>,
}

impl<'a> ParamDictionary<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the (possibly newly assigned) name for `params`'s wire-
    /// relevant content.
    pub fn name_for(&mut self, params: &LocalParams<'a>) -> String {
        let key = WireKey {
            ints: params.ints(),
            blobs: params.blobs(),
        };
        if let Some(name) = self.by_key.get(&key) {
            return name.clone();
        }

        let mut hasher = fxhash::FxHasher::default();
        key.ints.hash(&mut hasher);
        key.blobs.hash(&mut hasher);
        let base = format!("{:016x}", hasher.finish());

        let mut candidate = base.clone();
        let mut k = 0u32;
        while self.used_names.contains(&candidate) {
            candidate = format!("{base}_{k}");
            k += 1;
        }
        self.used_names.insert(candidate.clone());
        self.by_key.insert(key, candidate.clone());
        candidate
    }

    /// All assigned entries, in first-assignment order, as `(name, ints,
    /// blobs)` triples ready for the `"params"` map (§4.E step 3).
    pub fn entries(&self) -> impl Iterator<Item = (&str, &'a [IntParam], &'a [BlobParam<'a>])> {
        self.by_key.iter().map(|(k, name)| (name.as_str(), k.ints, k.blobs))
    }
}
