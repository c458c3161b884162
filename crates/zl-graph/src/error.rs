use thiserror::Error;

/// Errors the node/graph manager can produce (§4.D, mapped from §7's
/// enumerated error kinds).
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph is invalid: {0}")]
    GraphInvalid(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("temporary library limitation: {0}")]
    TemporaryLibraryLimitation(String),
    #[error("node input is invalid: {0}")]
    NodeInvalidInput(String),
    #[error("parameter is invalid: {0}")]
    ParameterInvalid(String),
    #[error(transparent)]
    Allocation(#[from] zl_arena::ArenaError),
    #[error(transparent)]
    Name(#[from] zl_arena::NameError),
    #[error("graph {0:?} is not serializable: its ref-params differ from its base's")]
    GraphNonSerializable(String),
}
