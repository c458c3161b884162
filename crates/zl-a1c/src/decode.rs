use crate::a1c_err;
use crate::error::{A1cError, ErrorKind};
use crate::item::{ArrayBuilder, Item, MapBuilder, Pair};

/// Options controlling decoder behavior (§4.C).
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Bounds recursion through arrays, maps, and tags.
    pub max_depth: usize,
    /// When `true`, byte-string and text-string items borrow directly from
    /// the input buffer instead of being copied into the arena. The caller
    /// must keep the input alive for as long as the decoded tree.
    pub reference_source: bool,
    /// When `true`, simple values outside {false, true, null, undefined}
    /// are rejected rather than represented as `Item::Simple`.
    pub reject_unknown_simple: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_depth: 128,
            reference_source: false,
            reject_unknown_simple: false,
        }
    }
}

enum ArgValue {
    Definite(u64),
    Indefinite,
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    arena: &'a bumpalo::Bump,
    opts: DecoderOptions,
}

/// Decodes exactly one top-level item from `input`, failing if any bytes
/// remain afterward.
pub fn decode<'a>(
    input: &'a [u8],
    arena: &'a bumpalo::Bump,
    opts: DecoderOptions,
) -> Result<Item<'a>, A1cError> {
    let mut dec = Decoder {
        input,
        pos: 0,
        arena,
        opts,
    };
    let item = dec.decode_item(0)?;
    if dec.pos != dec.input.len() {
        return Err(a1c_err!(ErrorKind::TrailingBytes, dec.pos, 0));
    }
    Ok(item)
}

impl<'a> Decoder<'a> {
    fn peek_byte(&self, depth: usize) -> Result<u8, A1cError> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or_else(|| a1c_err!(ErrorKind::UnexpectedEof, self.pos, depth))
    }

    fn take_byte(&mut self, depth: usize) -> Result<u8, A1cError> {
        let b = self.peek_byte(depth)?;
        self.pos += 1;
        Ok(b)
    }

    fn take_bytes(&mut self, n: usize, depth: usize) -> Result<&'a [u8], A1cError> {
        if self.pos + n > self.input.len() {
            return Err(a1c_err!(ErrorKind::UnexpectedEof, self.pos, depth));
        }
        let slice = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_argument(&mut self, ai: u8, depth: usize) -> Result<ArgValue, A1cError> {
        match ai {
            0..=23 => Ok(ArgValue::Definite(ai as u64)),
            24 => Ok(ArgValue::Definite(self.take_byte(depth)? as u64)),
            25 => {
                let b = self.take_bytes(2, depth)?;
                Ok(ArgValue::Definite(u16::from_be_bytes([b[0], b[1]]) as u64))
            }
            26 => {
                let b = self.take_bytes(4, depth)?;
                Ok(ArgValue::Definite(
                    u32::from_be_bytes(b.try_into().unwrap()) as u64
                ))
            }
            27 => {
                let b = self.take_bytes(8, depth)?;
                Ok(ArgValue::Definite(u64::from_be_bytes(b.try_into().unwrap())))
            }
            28..=30 => Err(a1c_err!(
                ErrorKind::ReservedAdditionalInfo(ai),
                self.pos,
                depth
            )),
            31 => Ok(ArgValue::Indefinite),
            _ => unreachable!("additional info is a 5-bit field"),
        }
    }

    fn definite_argument(&mut self, ai: u8, start: usize, depth: usize) -> Result<u64, A1cError> {
        match self.read_argument(ai, depth)? {
            ArgValue::Definite(v) => Ok(v),
            ArgValue::Indefinite => Err(a1c_err!(ErrorKind::IndefiniteChunkMismatch, start, depth)),
        }
    }

    fn decode_item(&mut self, depth: usize) -> Result<Item<'a>, A1cError> {
        if depth > self.opts.max_depth {
            return Err(a1c_err!(ErrorKind::DepthExceeded, self.pos, depth));
        }
        let start = self.pos;
        let initial = self.take_byte(depth)?;
        let major = initial >> 5;
        let ai = initial & 0x1f;

        match major {
            0 => {
                let v = self.definite_argument(ai, start, depth)?;
                if v > i64::MAX as u64 {
                    return Err(a1c_err!(ErrorKind::LargeIntegerUnsupported, start, depth, "integer"));
                }
                Ok(Item::Int(v as i64))
            }
            1 => {
                let v = self.definite_argument(ai, start, depth)?;
                let value = -1i128 - v as i128;
                if value < i64::MIN as i128 {
                    return Err(a1c_err!(ErrorKind::LargeIntegerUnsupported, start, depth, "integer"));
                }
                Ok(Item::Int(value as i64))
            }
            2 => self.decode_bytes(ai, start, depth),
            3 => self.decode_string(ai, start, depth),
            4 => self.decode_array(ai, start, depth),
            5 => self.decode_map(ai, start, depth),
            6 => {
                let tag = self.definite_argument(ai, start, depth)?;
                let child = self.decode_item(depth + 1)?;
                let child_ref = self.arena.alloc(child);
                Ok(Item::Tag(tag, child_ref))
            }
            7 => self.decode_simple(ai, start, depth),
            _ => unreachable!("major type is a 3-bit field"),
        }
    }

    fn decode_bytes(&mut self, ai: u8, start: usize, depth: usize) -> Result<Item<'a>, A1cError> {
        match self.read_argument(ai, depth)? {
            ArgValue::Definite(len) => {
                let bytes = self.take_bytes(len as usize, depth)?;
                let view = if self.opts.reference_source {
                    bytes
                } else {
                    self.arena.alloc_slice_copy(bytes)
                };
                Ok(Item::Bytes(view))
            }
            ArgValue::Indefinite => {
                let mut buf = bumpalo::collections::Vec::new_in(self.arena);
                loop {
                    if self.peek_byte(depth)? == 0xFF {
                        self.pos += 1;
                        break;
                    }
                    let chunk_start = self.pos;
                    let chunk_initial = self.take_byte(depth)?;
                    let chunk_major = chunk_initial >> 5;
                    let chunk_ai = chunk_initial & 0x1f;
                    if chunk_major != 2 {
                        return Err(a1c_err!(
                            ErrorKind::IndefiniteChunkMismatch,
                            chunk_start,
                            depth,
                            "bytes"
                        ));
                    }
                    let len = self.definite_argument(chunk_ai, chunk_start, depth)?;
                    let chunk = self.take_bytes(len as usize, depth)?;
                    buf.extend_from_slice(chunk);
                }
                Ok(Item::Bytes(buf.into_bump_slice()))
            }
        }
    }

    fn decode_string(&mut self, ai: u8, start: usize, depth: usize) -> Result<Item<'a>, A1cError> {
        match self.read_argument(ai, depth)? {
            ArgValue::Definite(len) => {
                let bytes = self.take_bytes(len as usize, depth)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| a1c_err!(ErrorKind::InvalidUtf8, start, depth, "string"))?;
                let view = if self.opts.reference_source {
                    s
                } else {
                    self.arena.alloc_str(s)
                };
                Ok(Item::String(view))
            }
            ArgValue::Indefinite => {
                let mut buf = bumpalo::collections::String::new_in(self.arena);
                loop {
                    if self.peek_byte(depth)? == 0xFF {
                        self.pos += 1;
                        break;
                    }
                    let chunk_start = self.pos;
                    let chunk_initial = self.take_byte(depth)?;
                    let chunk_major = chunk_initial >> 5;
                    let chunk_ai = chunk_initial & 0x1f;
                    if chunk_major != 3 {
                        return Err(a1c_err!(
                            ErrorKind::IndefiniteChunkMismatch,
                            chunk_start,
                            depth,
                            "string"
                        ));
                    }
                    let len = self.definite_argument(chunk_ai, chunk_start, depth)?;
                    let chunk = self.take_bytes(len as usize, depth)?;
                    let s = std::str::from_utf8(chunk)
                        .map_err(|_| a1c_err!(ErrorKind::InvalidUtf8, chunk_start, depth, "string"))?;
                    buf.push_str(s);
                }
                Ok(Item::String(buf.into_bump_str()))
            }
        }
    }

    fn decode_array(&mut self, ai: u8, start: usize, depth: usize) -> Result<Item<'a>, A1cError> {
        match self.read_argument(ai, depth)? {
            ArgValue::Definite(count) => {
                let mut builder = ArrayBuilder::with_capacity(self.arena, count as usize);
                for _ in 0..count {
                    let item = self.decode_item(depth + 1)?;
                    builder
                        .push(item)
                        .map_err(|_| a1c_err!(ErrorKind::ArrayBuilderOverflow, start, depth, "array"))?;
                }
                Ok(Item::Array(builder.finish()))
            }
            ArgValue::Indefinite => {
                let mut items = bumpalo::collections::Vec::new_in(self.arena);
                loop {
                    if self.peek_byte(depth)? == 0xFF {
                        self.pos += 1;
                        break;
                    }
                    items.push(self.decode_item(depth + 1)?);
                }
                Ok(Item::Array(items.into_bump_slice()))
            }
        }
    }

    fn decode_map(&mut self, ai: u8, start: usize, depth: usize) -> Result<Item<'a>, A1cError> {
        match self.read_argument(ai, depth)? {
            ArgValue::Definite(count) => {
                let mut builder = MapBuilder::with_capacity(self.arena, count as usize);
                for _ in 0..count {
                    let key = self.decode_item(depth + 1)?;
                    let value = self.decode_item(depth + 1)?;
                    builder
                        .push(key, value)
                        .map_err(|_| a1c_err!(ErrorKind::MapBuilderOverflow, start, depth, "map"))?;
                }
                Ok(Item::Map(builder.finish()))
            }
            ArgValue::Indefinite => {
                let mut pairs = bumpalo::collections::Vec::new_in(self.arena);
                loop {
                    if self.peek_byte(depth)? == 0xFF {
                        self.pos += 1;
                        break;
                    }
                    let key = self.decode_item(depth + 1)?;
                    let value = self.decode_item(depth + 1)?;
                    pairs.push(Pair { key, value });
                }
                Ok(Item::Map(pairs.into_bump_slice()))
            }
        }
    }

    fn decode_simple(&mut self, ai: u8, start: usize, depth: usize) -> Result<Item<'a>, A1cError> {
        match ai {
            20 => Ok(Item::Bool(false)),
            21 => Ok(Item::Bool(true)),
            22 => Ok(Item::Null),
            23 => Ok(Item::Undefined),
            24 => {
                let v = self.take_byte(depth)?;
                if self.opts.reject_unknown_simple {
                    return Err(a1c_err!(ErrorKind::RejectedSimple(v), start, depth, "simple"));
                }
                Ok(Item::Simple(v))
            }
            25 => {
                let b = self.take_bytes(2, depth)?;
                Ok(Item::Float16(u16::from_be_bytes([b[0], b[1]])))
            }
            26 => {
                let b = self.take_bytes(4, depth)?;
                Ok(Item::Float32(f32::from_bits(u32::from_be_bytes(
                    b.try_into().unwrap(),
                ))))
            }
            27 => {
                let b = self.take_bytes(8, depth)?;
                Ok(Item::Float64(f64::from_bits(u64::from_be_bytes(
                    b.try_into().unwrap(),
                ))))
            }
            28..=30 => Err(a1c_err!(ErrorKind::ReservedAdditionalInfo(ai), start, depth, "simple")),
            31 => Err(a1c_err!(ErrorKind::UnexpectedBreak, start, depth, "simple")),
            0..=19 => {
                if self.opts.reject_unknown_simple {
                    return Err(a1c_err!(ErrorKind::RejectedSimple(ai), start, depth, "simple"));
                }
                Ok(Item::Simple(ai))
            }
            _ => unreachable!("additional info is a 5-bit field"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_small_uint() {
        let arena = bumpalo::Bump::new();
        let item = decode(&[0x05], &arena, DecoderOptions::default()).unwrap();
        assert_eq!(item, Item::Int(5));
    }

    #[test]
    fn decodes_negative_int() {
        let arena = bumpalo::Bump::new();
        // CBOR -10 is major type 1, argument 9: 0x29
        let item = decode(&[0x29], &arena, DecoderOptions::default()).unwrap();
        assert_eq!(item, Item::Int(-10));
    }

    #[test]
    fn decodes_definite_array() {
        let arena = bumpalo::Bump::new();
        // [1, 2, 3]
        let item = decode(&[0x83, 0x01, 0x02, 0x03], &arena, DecoderOptions::default()).unwrap();
        let arr = item.as_array().unwrap();
        assert_eq!(arr, &[Item::Int(1), Item::Int(2), Item::Int(3)]);
    }

    #[test]
    fn decodes_indefinite_array() {
        let arena = bumpalo::Bump::new();
        // [_ 1, 2]
        let item = decode(&[0x9f, 0x01, 0x02, 0xff], &arena, DecoderOptions::default()).unwrap();
        let arr = item.as_array().unwrap();
        assert_eq!(arr, &[Item::Int(1), Item::Int(2)]);
    }

    #[test]
    fn decodes_definite_map() {
        let arena = bumpalo::Bump::new();
        // {"a": 1}
        let bytes = [0xa1, 0x61, b'a', 0x01];
        let item = decode(&bytes, &arena, DecoderOptions::default()).unwrap();
        assert_eq!(item.map_get("a"), Some(&Item::Int(1)));
    }

    #[test]
    fn rejects_non_fitting_uint() {
        let arena = bumpalo::Bump::new();
        // argument = u64::MAX, major 0 -> too big for i64
        let mut bytes = vec![0x1b];
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());
        let err = decode(&bytes, &arena, DecoderOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::LargeIntegerUnsupported);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let arena = bumpalo::Bump::new();
        let err = decode(&[0x01, 0x02], &arena, DecoderOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TrailingBytes);
    }

    #[test]
    fn reference_source_borrows_input() {
        let arena = bumpalo::Bump::new();
        let bytes = [0x61, b'x'];
        let opts = DecoderOptions {
            reference_source: true,
            ..Default::default()
        };
        let item = decode(&bytes, &arena, opts).unwrap();
        match item {
            Item::String(s) => assert_eq!(s.as_ptr(), unsafe { bytes.as_ptr().add(1) }),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn depth_limit_is_enforced() {
        let arena = bumpalo::Bump::new();
        // A deeply nested array of depth > default max_depth: [[[[...]]]]
        let mut bytes = Vec::new();
        for _ in 0..200 {
            bytes.push(0x81); // array of length 1
        }
        bytes.push(0x00); // innermost: integer 0
        let err = decode(&bytes, &arena, DecoderOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DepthExceeded);
    }
}
