//! Event application for the content graph.
//!
//! [`ContentGraphProjection`] consumes already-validated domain events
//! ([`ContentGraphEvent`] wrapped in an [`EventEnvelope`]) and applies each
//! one to the graph, the content stream table and the dimension space point
//! table in a single graph transaction:
//!
//! 1. the stream must exist (or must not, for creation events) and must not
//!    be removed;
//! 2. the envelope's expected version must match the stream's version;
//! 3. the graph mutation runs;
//! 4. the stream version advances by exactly one;
//! 5. the transaction commits.
//!
//! Any failure rolls the graph back. Reads go through [`ContentSubgraph`].

pub mod config;
pub mod error;
pub mod event;
mod handlers;
pub mod projection;
pub mod subgraph;

pub use config::{CgraphConfig, DEFAULT_TABLE_PREFIX};
pub use error::{ProjectionError, ProjectionResult};
pub use event::{
    read_event_log, read_event_log_file, write_event_log, ContentGraphEvent, EventEnvelope,
    SerializedReference,
};
pub use projection::{AppliedEvent, ContentGraphProjection, PruneReport};
pub use subgraph::{ContentSubgraph, SubgraphNode, SubgraphReference, SubgraphTree, VisibilityConstraints};
