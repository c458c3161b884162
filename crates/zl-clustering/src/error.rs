use thiserror::Error;

/// Errors raised while configuring or planning a clustering graph (§4.F).
/// Lower-component errors (graph registration, CBOR, local params) convert
/// in via `#[from]`; the two variants below are this component's own.
#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error(transparent)]
    Graph(#[from] zl_graph::GraphError),
    #[error(transparent)]
    A1c(#[from] zl_a1c::A1cError),
    #[error(transparent)]
    Builder(#[from] zl_a1c::BuilderError),
    #[error(transparent)]
    LocalParams(#[from] zl_localparams::LocalParamsError),
    #[error(transparent)]
    Allocation(#[from] zl_arena::ArenaError),
    #[error(transparent)]
    Compressor(#[from] zl_compressor::CompressorError),
    /// The `ClusteringConfig` CBOR document doesn't match the fixed schema.
    #[error("clustering config is malformed: {0}")]
    Malformed(String),
    /// §4.F's `node_invalid_input`: a duplicate tag, an out-of-range index,
    /// or a missing clustering-tag metadata entry.
    #[error("node input is invalid: {0}")]
    InvalidInput(String),
}

impl ClusteringError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ClusteringError::InvalidInput(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ClusteringError::Malformed(message.into())
    }
}
