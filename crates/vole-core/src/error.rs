use crate::shape::Shape;

/// All errors that can occur within Vole.
///
/// This enum captures every reported failure mode: shape-inference mismatches
/// during graph construction, violated backward preconditions, and handles
/// mixed up between graphs. Using a single error type across the library
/// simplifies error propagation.
///
/// A node handle whose positional index is out of range for its own graph is
/// NOT represented here: positions are only ever produced by the graph
/// itself, so an out-of-range index means the handle was corrupted, and the
/// graph panics instead of returning.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operand dims of an elementwise operation do not match.
    #[error("operand dims do not match: {lhs} vs {rhs}")]
    DimsMismatch { lhs: Shape, rhs: Shape },

    /// Operand batch sizes are neither equal nor broadcastable.
    #[error("incompatible batch sizes: {lhs} vs {rhs}")]
    BatchMismatch { lhs: Shape, rhs: Shape },

    /// Matrix multiplication inner dims do not agree.
    #[error("matmul shape mismatch: [{m}x{k1}] @ [{k2}x{n}]")]
    MatmulMismatch {
        m: usize,
        k1: usize,
        k2: usize,
        n: usize,
    },

    /// An operation was applied to the wrong number of operands.
    #[error("{op}: expected {expected} operand(s), got {got}")]
    ArityMismatch {
        op: String,
        expected: usize,
        got: usize,
    },

    /// A batch multiplicity of 0 was requested.
    #[error("batch size must be at least 1")]
    ZeroBatch,

    /// A node handle was used against a graph it does not belong to.
    #[error("node {node} belongs to a different graph")]
    GraphMismatch { node: usize },

    /// Backward was requested for a node the forward path never reached.
    #[error("node {node} has no value; it was not calculated in the forward path")]
    NotCalculated { node: usize },

    /// Backward was requested twice for the same target node.
    #[error("node {node} already has a gradient")]
    AlreadyDifferentiated { node: usize },

    /// Element count mismatch when creating a tensor from a slice.
    #[error("element count mismatch: shape {shape} holds {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Tried to read a scalar out of a tensor with more than one element.
    #[error("not a scalar: tensor has shape {shape}")]
    NotAScalar { shape: Shape },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout Vole.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
