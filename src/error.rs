/*!

Structured errors for fallible graph operations.

Per-call operations return these to the caller; bulk algorithms
collect and surface the first one. Unreachable distances are not
errors, see [`crate::distance_index::Distance`].

*/

use thiserror::Error;

use crate::handle::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("edge between {left} and {right} does not exist")]
    EdgeNotFound { left: u64, right: u64 },

    #[error("path {0:?} does not exist")]
    PathNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("offset {offset} out of range for node {id} of length {len}")]
    OffsetOutOfRange {
        id: NodeId,
        offset: usize,
        len: usize,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        GraphError::InvalidInput(msg.into())
    }

    pub(crate) fn invariant<S: Into<String>>(msg: S) -> Self {
        GraphError::InvariantViolation(msg.into())
    }

    pub(crate) fn unsupported<S: Into<String>>(msg: S) -> Self {
        GraphError::Unsupported(msg.into())
    }
}
