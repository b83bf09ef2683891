// Core error types shared by every layer of the adapter.

use crate::dtype::{ByteOrder, ElementType};
use crate::signature::{Contiguity, RankPolicy};

/// Why a layout cannot be viewed through a requested `ViewSpec`.
///
/// Rejections are ordinary values: the checker never panics, and the calling layer decides
/// whether to surface them as a host-visible type error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("element type mismatch: expected {expected}, found {found}")]
    ElementTypeMismatch {
        expected: ElementType,
        found: ElementType,
    },
    #[error("non-native byte order ({0})")]
    NonNativeByteOrder(ByteOrder),
    #[error("rank mismatch: expected {expected}, found {found}")]
    RankMismatch { expected: RankPolicy, found: usize },
    #[error("shape mismatch in dimension {dim}: expected {expected}, found {found}")]
    ShapeMismatch {
        dim: usize,
        expected: usize,
        found: usize,
    },
    #[error("stride {stride} in dimension {dim} is not a multiple of itemsize {itemsize}")]
    MisalignedStride {
        dim: usize,
        stride: isize,
        itemsize: usize,
    },
    #[error("array is not {required} contiguous")]
    NotContiguous { required: Contiguity },
    #[error("expected at most {expected} arguments, found {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("missing required argument at position {position}")]
    MissingArgument { position: usize },
}

impl Rejection {
    /// Whether an explicit copy could satisfy the request (layout-only failures).
    pub fn is_layout_only(&self) -> bool {
        matches!(
            self,
            Rejection::MisalignedStride { .. } | Rejection::NotContiguous { .. }
        )
    }
}

/// Structural problems with a layout or an index into it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("shape has {shape} dimensions but strides have {strides}")]
    StrideLengthMismatch { shape: usize, strides: usize },
    #[error("index {index:?} out of bounds for shape {shape:?}")]
    OutOfBounds { index: Vec<usize>, shape: Vec<usize> },
    #[error("layout addresses bytes [{low}, {high}) outside storage of {available} bytes")]
    BufferOverrun {
        low: isize,
        high: isize,
        available: usize,
    },
    #[error("expected {expected} elements, found {found}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("offset overflow while computing layout extent")]
    OffsetOverflow,
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    #[error("invalid dtype string: {0}")]
    InvalidDType(String),
}

/// Recoverable failures raised while binding host values to native views.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("no matching overload; tried: {}", describe_candidates(.candidates))]
    NoMatchingOverload { candidates: Vec<(String, Rejection)> },
    #[error("layout was not accepted for this view: {0}")]
    InvalidLayout(String),
    #[error("cannot write through a read-only view")]
    ReadOnlyView,
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

fn describe_candidates(candidates: &[(String, Rejection)]) -> String {
    candidates
        .iter()
        .map(|(name, why)| format!("{name} ({why})"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors visible to host code calling into a bound module.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("TypeError: {0}")]
    TypeError(String),
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("native error: {0}")]
    Native(String),
    #[error("other error: {0}")]
    Other(String),
}

impl From<BindError> for HostError {
    fn from(err: BindError) -> Self {
        HostError::TypeError(err.to_string())
    }
}

/// Convenience alias for results using BindError.
pub type Result<T> = std::result::Result<T, BindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_errors_become_type_errors() {
        let err = BindError::from(Rejection::NonNativeByteOrder(ByteOrder::Big));
        match HostError::from(err) {
            HostError::TypeError(msg) => assert!(msg.contains("non-native byte order")),
            other => panic!("Expected TypeError, got {:?}", other),
        }
    }

    #[test]
    fn no_matching_overload_lists_candidates() {
        let err = BindError::NoMatchingOverload {
            candidates: vec![
                ("scalar".into(), Rejection::ArityMismatch { expected: 1, found: 2 }),
                ("matrix".into(), Rejection::MissingArgument { position: 0 }),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("scalar ("));
        assert!(msg.contains("matrix ("));
    }
}
