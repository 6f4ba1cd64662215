//! Error types for content stream operations.

use thiserror::Error;

use cgraph_types::ContentStreamId;

use crate::types::ContentStreamState;

/// Errors that can occur while managing content streams.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("content stream not found: {0}")]
    NotFound(ContentStreamId),

    #[error("content stream already exists: {0}")]
    AlreadyExists(ContentStreamId),

    /// The stream was removed; it accepts no further writes.
    #[error("content stream {0} has been removed")]
    ContentStreamRemoved(ContentStreamId),

    /// The caller's expected version is stale.
    #[error("concurrent modification of content stream {content_stream}: expected version {expected}, actual {actual}")]
    ConcurrentModification {
        content_stream: ContentStreamId,
        expected: u64,
        actual: u64,
    },

    #[error("content stream {content_stream} cannot change from {from} to {to}")]
    InvalidTransition {
        content_stream: ContentStreamId,
        from: ContentStreamState,
        to: ContentStreamState,
    },

    #[error("invalid content stream state code: {0:?}")]
    InvalidStateCode(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience alias for content stream results.
pub type StreamResult<T> = Result<T, StreamError>;
