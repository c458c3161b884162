use thiserror::Error;

/// Failures from building or resolving a [`crate::LocalParams`] set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocalParamsError {
    #[error("string params-dictionary reference {0:?} does not resolve to any entry")]
    UnknownReference(String),
    #[error("local params CBOR node must be absent, null, a map, or a string, got something else")]
    InvalidShape,
    #[error("local params map key {0:?} is not a recognized family (\"ints\" or \"blobs\")")]
    UnknownFamily(String),
    #[error("local params int entry is not an integer pair")]
    MalformedInt,
    #[error("local params blob entry is not a (key, bytes) pair")]
    MalformedBlob,
    #[error(transparent)]
    Allocation(#[from] zl_arena::ArenaError),
}
