use thiserror::Error;

/// Errors produced by type construction and decoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid {kind} {value:?}: {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid uuid: {0}")]
    InvalidUuid(String),

    #[error("property values must not be null; use an unset instruction instead")]
    NullPropertyValue,

    #[error("invalid classification code: {0:?}")]
    InvalidClassification(String),

    #[error("classification cannot change from {from} to {to}")]
    ClassificationTransition { from: String, to: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
