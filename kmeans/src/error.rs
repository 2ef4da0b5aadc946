//! Error types for the clustering engine.

use thiserror::Error;

/// Errors raised by documents, metrics, evaluators and clusterers.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Malformed configuration, empty or mismatched-length input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Two documents with different declared dimensionality were combined.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
    /// Scale or centroid computed with a (near) zero divisor.
    #[error("division by zero: {0}")]
    DivisionByZero(String),
    /// Coordinate index outside `[0, dimension)`.
    #[error("index {index} out of range for dimension {dimension}")]
    OutOfRange { index: usize, dimension: usize },
    /// A cluster ended a run without members.
    #[error("cluster {cluster} is empty")]
    EmptyCluster { cluster: usize },
    /// A required configuration entry is missing.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),
    /// External collaborator (solver, partitioner) failed.
    #[error("solver failure: {0}")]
    Solver(String),
    /// Malformed text input (label files, sparse vector lines).
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
