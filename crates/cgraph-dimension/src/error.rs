//! Error types for dimension space operations.

use thiserror::Error;

use crate::point::DimensionSpacePointHash;

/// Errors that can occur while configuring or querying the dimension space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionError {
    /// The hash was never registered.
    #[error("dimension space point hash not found: {0}")]
    HashNotFound(DimensionSpacePointHash),

    /// A value's specialization depth disagrees with its generalization chain.
    #[error(
        "invalid specialization depth for {dimension}:{value}: expected {expected}, got {actual}"
    )]
    InvalidSpecializationDepth {
        dimension: String,
        value: String,
        expected: u32,
        actual: u32,
    },

    /// A generalization rule is malformed, or a point is not a generalization
    /// of another where one was required.
    #[error("invalid generalization {generalization} of {dimension}:{value}: {reason}")]
    InvalidGeneralization {
        dimension: String,
        value: String,
        generalization: String,
        reason: String,
    },

    /// A dimension was configured without values.
    #[error("dimension {0} has no values")]
    EmptyDimension(String),

    /// A dimension id was configured twice.
    #[error("dimension {0} is configured more than once")]
    DuplicateDimension(String),

    /// A dimension value was declared twice.
    #[error("dimension {dimension} declares value {value} more than once")]
    DuplicateValue { dimension: String, value: String },

    /// The point is not part of the configured dimension space.
    #[error("dimension space point {point} is not allowed: {reason}")]
    PointNotAllowed { point: String, reason: String },

    /// The canonical point encoding could not be parsed.
    #[error("invalid dimension space point encoding: {0}")]
    InvalidEncoding(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience alias for dimension results.
pub type DimensionResult<T> = Result<T, DimensionError>;
