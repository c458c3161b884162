/// A single node of the CBOR item graph (§4.C). Arrays and maps are
/// contiguous arena-allocated slices; bytes and strings are views (either
/// into the arena, when decoded in copy mode, or into the original input,
/// when decoded with `reference_source`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'a> {
    /// Unsigned and signed integers share a single 64-bit representation.
    Int(i64),
    /// Raw 16-bit float payload; OpenZL never computes on float16 directly,
    /// it only carries the bits through.
    Float16(u16),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Null,
    Undefined,
    /// A tiny tagged simple value outside the standard bool/null/undefined
    /// set (CBOR major type 7, argument < 24, excluding 20-23).
    Simple(u8),
    Bytes(&'a [u8]),
    String(&'a str),
    Array(&'a [Item<'a>]),
    Map(&'a [Pair<'a>]),
    Tag(u64, &'a Item<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair<'a> {
    pub key: Item<'a>,
    pub value: Item<'a>,
}

impl<'a> Item<'a> {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Item::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Item::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Item::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&'a [Item<'a>]> {
        match self {
            Item::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&'a [Pair<'a>]> {
        match self {
            Item::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Looks up a map entry by a string key. Linear scan: CBOR maps in this
    /// document format are small (a handful of fixed keys per schema).
    pub fn map_get(&self, key: &str) -> Option<&Item<'a>> {
        self.as_map()?.iter().find_map(|pair| {
            if pair.key.as_str() == Some(key) {
                Some(&pair.value)
            } else {
                None
            }
        })
    }
}

/// Errors returned by the fixed-capacity builders when a caller attempts to
/// push beyond the capacity reserved at construction (§4.C: "a sentinel
/// 'allocation failure' without aborting").
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    #[error("builder capacity ({capacity}) exceeded")]
    CapacityExceeded { capacity: usize },
}

/// Incrementally constructs a fixed-capacity arena-backed array.
pub struct ArrayBuilder<'a> {
    items: bumpalo::collections::Vec<'a, Item<'a>>,
    capacity: usize,
}

impl<'a> ArrayBuilder<'a> {
    pub fn with_capacity(arena: &'a bumpalo::Bump, capacity: usize) -> Self {
        Self {
            items: bumpalo::collections::Vec::with_capacity_in(capacity, arena),
            capacity,
        }
    }

    pub fn push(&mut self, item: Item<'a>) -> Result<(), BuilderError> {
        if self.items.len() >= self.capacity {
            return Err(BuilderError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn finish(self) -> &'a [Item<'a>] {
        self.items.into_bump_slice()
    }
}

/// Incrementally constructs a fixed-capacity arena-backed map.
pub struct MapBuilder<'a> {
    pairs: bumpalo::collections::Vec<'a, Pair<'a>>,
    capacity: usize,
}

impl<'a> MapBuilder<'a> {
    pub fn with_capacity(arena: &'a bumpalo::Bump, capacity: usize) -> Self {
        Self {
            pairs: bumpalo::collections::Vec::with_capacity_in(capacity, arena),
            capacity,
        }
    }

    pub fn push(&mut self, key: Item<'a>, value: Item<'a>) -> Result<(), BuilderError> {
        if self.pairs.len() >= self.capacity {
            return Err(BuilderError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.pairs.push(Pair { key, value });
        Ok(())
    }

    pub fn push_str(&mut self, key: &str, value: Item<'a>, arena: &'a bumpalo::Bump) -> Result<(), BuilderError> {
        let key = Item::String(arena.alloc_str(key));
        self.push(key, value)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn finish(self) -> &'a [Pair<'a>] {
        self.pairs.into_bump_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_builder_respects_capacity() {
        let arena = bumpalo::Bump::new();
        let mut b = ArrayBuilder::with_capacity(&arena, 2);
        b.push(Item::Int(1)).unwrap();
        b.push(Item::Int(2)).unwrap();
        assert_eq!(
            b.push(Item::Int(3)),
            Err(BuilderError::CapacityExceeded { capacity: 2 })
        );
        let items = ArrayBuilder::with_capacity(&arena, 2).finish();
        assert!(items.is_empty());
    }

    #[test]
    fn map_builder_lookup() {
        let arena = bumpalo::Bump::new();
        let mut b = MapBuilder::with_capacity(&arena, 4);
        b.push_str("a", Item::Int(1), &arena).unwrap();
        b.push_str("b", Item::Int(2), &arena).unwrap();
        let map = Item::Map(b.finish());
        assert_eq!(map.map_get("b"), Some(&Item::Int(2)));
        assert_eq!(map.map_get("missing"), None);
    }
}
