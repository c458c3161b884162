use std::collections::VecDeque;

use thiserror::Error;

/// The remaining enumerated error kinds of §7 that don't already have a
/// dedicated variant on [`CompressorError`] via a lower component's error
/// type (those convert in through `#[from]` instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Generic,
    LogicError,
    Corruption,
    FormatVersionUnsupported,
    GraphParameterInvalid,
    NodeParameterInvalid,
    NodeParameterInvalidValue,
    SrcSizeTooSmall,
    TransformExecutionFailure,
    InputTypeUnsupported,
    GraphInvalidNumInputs,
    InternalBufferTooSmall,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Generic => "GENERIC",
            ErrorKind::LogicError => "logicError",
            ErrorKind::Corruption => "corruption",
            ErrorKind::FormatVersionUnsupported => "formatVersion_unsupported",
            ErrorKind::GraphParameterInvalid => "graphParameter_invalid",
            ErrorKind::NodeParameterInvalid => "nodeParameter_invalid",
            ErrorKind::NodeParameterInvalidValue => "nodeParameter_invalidValue",
            ErrorKind::SrcSizeTooSmall => "srcSize_tooSmall",
            ErrorKind::TransformExecutionFailure => "transform_executionFailure",
            ErrorKind::InputTypeUnsupported => "inputType_unsupported",
            ErrorKind::GraphInvalidNumInputs => "graph_invalidNumInputs",
            ErrorKind::InternalBufferTooSmall => "internalBuffer_tooSmall",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the [`crate::Compressor`] facade and its
/// (de)serializer. The node/graph/local-params/CBOR component errors keep
/// their own enums and convert in here at the boundary (§7: "A1C's own
/// error kinds map into the enumeration above via a conversion function").
#[derive(Debug, Error)]
pub enum CompressorError {
    #[error("{kind}: {message}")]
    Kind { kind: ErrorKind, message: String },
    #[error(transparent)]
    Graph(#[from] zl_graph::GraphError),
    #[error(transparent)]
    LocalParams(#[from] zl_localparams::LocalParamsError),
    #[error(transparent)]
    A1c(#[from] zl_a1c::A1cError),
    #[error(transparent)]
    Builder(#[from] zl_a1c::BuilderError),
    #[error(transparent)]
    Allocation(#[from] zl_arena::ArenaError),
    #[error(transparent)]
    Name(#[from] zl_arena::NameError),
}

impl CompressorError {
    pub fn kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        CompressorError::Kind {
            kind,
            message: message.into(),
        }
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::kind(ErrorKind::Corruption, message)
    }
}

const MAX_FRAMES: usize = 8;

/// Ring buffer of the most recent error-message frames, mirroring §6's
/// "operation-context" / `get_error_context_string` accessor. Each state
/// object (compressor, serializer, deserializer) owns one.
#[derive(Debug, Default)]
pub struct ErrorContext {
    frames: VecDeque<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        if self.frames.len() == MAX_FRAMES {
            self.frames.pop_front();
        }
        self.frames.push_back(message.into());
    }

    /// The most recent formatted error message, valid only until the next
    /// `push` or until the owning state object is dropped (§6).
    pub fn get_error_context_string(&self) -> Option<&str> {
        self.frames.back().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_only_the_most_recent_frames() {
        let mut ctx = ErrorContext::new();
        for i in 0..(MAX_FRAMES + 3) {
            ctx.push(format!("frame {i}"));
        }
        assert_eq!(
            ctx.get_error_context_string(),
            Some(format!("frame {}", MAX_FRAMES + 2).as_str())
        );
        assert_eq!(ctx.frames.len(), MAX_FRAMES);
    }

    #[test]
    fn empty_context_has_no_message() {
        let ctx = ErrorContext::new();
        assert_eq!(ctx.get_error_context_string(), None);
    }
}
