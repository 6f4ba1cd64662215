//! Error types for content graph operations.

use cgraph_dimension::{DimensionError, DimensionSpacePointHash};
use cgraph_types::{ContentStreamId, NodeAggregateId, NodeAnchorPoint, ReferenceName, TypeError};

/// Errors that can occur while reading or mutating the content graph.
///
/// A failed mutation never leaves partial state behind: the enclosing
/// [`GraphTransaction`](crate::GraphTransaction) rolls back when dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("content stream not found: {0}")]
    ContentStreamNotFound(ContentStreamId),

    #[error("content stream already exists: {0}")]
    ContentStreamExists(ContentStreamId),

    #[error("node anchor not found: {0}")]
    AnchorNotFound(NodeAnchorPoint),

    #[error("node anchor {anchor} is not part of content stream {content_stream}")]
    AnchorNotInStream {
        anchor: NodeAnchorPoint,
        content_stream: ContentStreamId,
    },

    #[error("node anchor {anchor} is not attached in dimension space point {dimension_space_point}")]
    NotAttached {
        anchor: NodeAnchorPoint,
        dimension_space_point: DimensionSpacePointHash,
    },

    #[error("node aggregate {aggregate} not found in content stream {content_stream}")]
    NodeAggregateNotFound {
        aggregate: NodeAggregateId,
        content_stream: ContentStreamId,
    },

    /// The stream already holds a variant of this aggregate at this origin.
    #[error("node aggregate {aggregate} already has a variant at origin {origin} (anchor {existing})")]
    DuplicateOrigin {
        aggregate: NodeAggregateId,
        origin: DimensionSpacePointHash,
        existing: NodeAnchorPoint,
    },

    /// Attaching would make a node its own ancestor.
    #[error("attaching {child} below {parent} would create a cycle")]
    CycleDetected {
        parent: NodeAnchorPoint,
        child: NodeAnchorPoint,
    },

    /// The child already has a parent in this scope.
    #[error("node anchor {child} is already attached below {parent}")]
    AlreadyAttached {
        child: NodeAnchorPoint,
        parent: NodeAnchorPoint,
    },

    /// Two siblings would share a position (reject policy only).
    #[error("position {position} below {parent} is already taken")]
    DuplicatePosition {
        parent: NodeAnchorPoint,
        position: u32,
    },

    #[error("node anchor {child} is not a child of {parent}")]
    NotChildOf {
        parent: NodeAnchorPoint,
        child: NodeAnchorPoint,
    },

    #[error("reference {name} from {source_anchor} to {destination} not found")]
    ReferenceNotFound {
        source_anchor: NodeAnchorPoint,
        name: ReferenceName,
        destination: NodeAggregateId,
    },

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error("dimension error: {0}")]
    Dimension(#[from] DimensionError),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
