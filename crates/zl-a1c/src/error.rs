use thiserror::Error;

/// The kind of failure encountered while decoding or encoding a CBOR item
/// graph (§4.C: "every decode/encode step records a typed error").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid initial byte {0:#04x}")]
    InvalidInitialByte(u8),
    #[error("integer does not fit in i64: large integers are unsupported")]
    LargeIntegerUnsupported,
    #[error("nesting depth exceeded the configured maximum")]
    DepthExceeded,
    #[error("indefinite-length chunk has a mismatched major type or is itself indefinite")]
    IndefiniteChunkMismatch,
    #[error("array builder overflowed its declared capacity")]
    ArrayBuilderOverflow,
    #[error("map builder overflowed its declared capacity")]
    MapBuilderOverflow,
    #[error("trailing bytes after the top-level item")]
    TrailingBytes,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("CBOR break code encountered outside an indefinite-length item")]
    UnexpectedBreak,
    #[error("reserved additional-information value {0}")]
    ReservedAdditionalInfo(u8),
    #[error("non-standard simple value {0} rejected by decoder configuration")]
    RejectedSimple(u8),
    #[error("map key is not a string where a string key was required")]
    NonStringMapKey,
}

/// Provenance frame recorded alongside a decode/encode error: where in the
/// byte stream, how deep in the item tree, which major type was being
/// decoded, and which source location detected it (§4.C, §7).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte {src_pos} (depth {depth}, item {item}) [{file}:{line}]")]
pub struct A1cError {
    pub kind: ErrorKind,
    pub src_pos: usize,
    pub depth: usize,
    /// Short label of the CBOR major type being decoded when this error was
    /// raised (`"bytes"`, `"array"`, `"map"`, ... or `"unknown"` when no
    /// major type had been read yet).
    pub item: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl A1cError {
    pub fn new(kind: ErrorKind, src_pos: usize, depth: usize, item: &'static str, file: &'static str, line: u32) -> Self {
        Self {
            kind,
            src_pos,
            depth,
            item,
            file,
            line,
        }
    }
}

/// Constructs an [`A1cError`] tagged with the call site, mirroring the
/// C core's `{file, line}` provenance fields. The `item` label defaults to
/// `"unknown"`; pass a fourth argument to name the major type being decoded.
#[macro_export]
macro_rules! a1c_err {
    ($kind:expr, $pos:expr, $depth:expr) => {
        $crate::A1cError::new($kind, $pos, $depth, "unknown", file!(), line!())
    };
    ($kind:expr, $pos:expr, $depth:expr, $item:expr) => {
        $crate::A1cError::new($kind, $pos, $depth, $item, file!(), line!())
    };
}
