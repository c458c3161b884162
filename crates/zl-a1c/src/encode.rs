use crate::item::Item;

/// Writes the shortest-form CBOR header for `major`/`argument` (§4.C:
/// "writes shortest-form headers — the smallest of 0-, 8-, 16-, 32-, 64-bit
/// counts that fits").
fn write_header(out: &mut Vec<u8>, major: u8, argument: u64) {
    let top = major << 5;
    if argument < 24 {
        out.push(top | argument as u8);
    } else if argument <= u8::MAX as u64 {
        out.push(top | 24);
        out.push(argument as u8);
    } else if argument <= u16::MAX as u64 {
        out.push(top | 25);
        out.extend_from_slice(&(argument as u16).to_be_bytes());
    } else if argument <= u32::MAX as u64 {
        out.push(top | 26);
        out.extend_from_slice(&(argument as u32).to_be_bytes());
    } else {
        out.push(top | 27);
        out.extend_from_slice(&argument.to_be_bytes());
    }
}

/// Encodes `item` to its deterministic, shortest-form CBOR byte
/// representation. Two logically identical in-memory trees always produce
/// byte-identical output, independent of arena allocation order (§5:
/// "Deterministic encoding guarantees that byte output depends only on the
/// logical contents, not on the allocation history of the arena").
pub fn encode(item: &Item) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(item, &mut out);
    out
}

fn encode_into(item: &Item, out: &mut Vec<u8>) {
    match item {
        Item::Int(v) if *v >= 0 => write_header(out, 0, *v as u64),
        Item::Int(v) => write_header(out, 1, (-1 - *v) as u64),
        Item::Bytes(b) => {
            write_header(out, 2, b.len() as u64);
            out.extend_from_slice(b);
        }
        Item::String(s) => {
            write_header(out, 3, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
        Item::Array(items) => {
            write_header(out, 4, items.len() as u64);
            for child in *items {
                encode_into(child, out);
            }
        }
        Item::Map(pairs) => {
            write_header(out, 5, pairs.len() as u64);
            for pair in *pairs {
                encode_into(&pair.key, out);
                encode_into(&pair.value, out);
            }
        }
        Item::Tag(tag, child) => {
            write_header(out, 6, *tag);
            encode_into(child, out);
        }
        Item::Bool(false) => out.push(0xf4),
        Item::Bool(true) => out.push(0xf5),
        Item::Null => out.push(0xf6),
        Item::Undefined => out.push(0xf7),
        Item::Simple(v) => write_header(out, 7, *v as u64),
        Item::Float16(raw) => {
            out.push(0xf9);
            out.extend_from_slice(&raw.to_be_bytes());
        }
        Item::Float32(f) => {
            out.push(0xfa);
            out.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        Item::Float64(f) => {
            out.push(0xfb);
            out.extend_from_slice(&f.to_bits().to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode, DecoderOptions};
    use crate::item::{ArrayBuilder, MapBuilder};

    #[test]
    fn small_uint_is_one_byte() {
        assert_eq!(encode(&Item::Int(5)), vec![0x05]);
    }

    #[test]
    fn uses_shortest_form_for_boundary_values() {
        assert_eq!(encode(&Item::Int(23)), vec![0x17]);
        assert_eq!(encode(&Item::Int(24)), vec![0x18, 24]);
        assert_eq!(encode(&Item::Int(256)), vec![0x19, 0x01, 0x00]);
    }

    #[test]
    fn negative_int_round_trips() {
        let bytes = encode(&Item::Int(-10));
        let arena = bumpalo::Bump::new();
        let item = decode(&bytes, &arena, DecoderOptions::default()).unwrap();
        assert_eq!(item, Item::Int(-10));
    }

    #[test]
    fn array_and_map_round_trip() {
        let arena = bumpalo::Bump::new();
        let mut arr = ArrayBuilder::with_capacity(&arena, 3);
        arr.push(Item::Int(1)).unwrap();
        arr.push(Item::Int(2)).unwrap();
        arr.push(Item::String(arena.alloc_str("three"))).unwrap();
        let array_item = Item::Array(arr.finish());

        let mut map = MapBuilder::with_capacity(&arena, 1);
        map.push_str("values", array_item, &arena).unwrap();
        let tree = Item::Map(map.finish());

        let bytes = encode(&tree);
        let arena2 = bumpalo::Bump::new();
        let decoded = decode(&bytes, &arena2, DecoderOptions::default()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn encoding_is_deterministic_across_arenas() {
        let arena_a = bumpalo::Bump::new();
        let arena_b = bumpalo::Bump::new();
        let item_a = Item::String(arena_a.alloc_str("same content"));
        let item_b = Item::String(arena_b.alloc_str("same content"));
        assert_eq!(encode(&item_a), encode(&item_b));
    }

    #[quickcheck_macros::quickcheck]
    fn int_array_round_trips(values: Vec<i64>) -> bool {
        let arena = bumpalo::Bump::new();
        let mut builder = ArrayBuilder::with_capacity(&arena, values.len());
        for v in &values {
            builder.push(Item::Int(*v)).unwrap();
        }
        let tree = Item::Array(builder.finish());
        let bytes = encode(&tree);
        let arena2 = bumpalo::Bump::new();
        match decode(&bytes, &arena2, DecoderOptions::default()) {
            Ok(decoded) => decoded == tree,
            Err(_) => false,
        }
    }
}
