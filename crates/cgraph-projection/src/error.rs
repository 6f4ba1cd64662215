use thiserror::Error;

use cgraph_dimension::{DimensionError, DimensionSpacePoint};
use cgraph_graph::GraphError;
use cgraph_schema::SchemaError;
use cgraph_streams::StreamError;
use cgraph_types::{ContentStreamId, NodeAggregateId, TypeError};

/// Errors produced while applying events or reading the projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("content stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("dimension error: {0}")]
    Dimension(#[from] DimensionError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// No variant of the aggregate has an edge in the requested scope.
    #[error("node aggregate {aggregate} is not visible in {dimension_space_point} of content stream {content_stream}")]
    NodeAggregateNotVisible {
        aggregate: NodeAggregateId,
        content_stream: ContentStreamId,
        dimension_space_point: DimensionSpacePoint,
    },

    #[error("invalid variant of {aggregate}: {reason}")]
    InvalidVariant {
        aggregate: NodeAggregateId,
        reason: String,
    },

    #[error("event log line {line}: {reason}")]
    InvalidEventLog { line: usize, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProjectionError {
    /// Whether the caller presented a stale stream version and may retry.
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::Stream(StreamError::ConcurrentModification { .. }))
    }
}

pub type ProjectionResult<T> = Result<T, ProjectionError>;
