//! Dimension-aware, copy-on-write content graph.
//!
//! The graph stores node variants keyed by [`NodeAnchorPoint`], parent/child
//! edges per (content stream, dimension space point) scope, and ordered
//! named references between nodes.
//!
//! # Key Types
//!
//! - [`InMemoryContentGraph`] -- the graph, guarded by one `RwLock`
//! - [`GraphTransaction`] -- all-or-nothing write access; rolls back on drop
//! - [`GraphSnapshot`] -- read access to the last committed state
//! - [`ContentGraphReader`] -- the read operations shared by both
//! - [`HierarchyScope`] -- the forest of one scope, with subtree tags
//! - [`ReferenceSet`] -- the outgoing references of one node
//!
//! # Content streams
//!
//! Forking a stream shares all of its tables with the source. The first
//! write to a shared hierarchy scope or variant index copies that table
//! only, and the first write to a node record that another stream still
//! uses copies the record to a fresh anchor.
//!
//! [`NodeAnchorPoint`]: cgraph_types::NodeAnchorPoint

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod memory;
pub mod node;
pub mod reference;
pub mod stream;
pub mod traits;
pub mod transaction;

pub use config::{GraphConfig, LookupMode, PositionPolicy};
pub use error::{GraphError, GraphResult};
pub use hierarchy::{HierarchyEdge, HierarchyRelation, HierarchyScope, SubtreeTagState, SubtreeTags};
pub use memory::{GraphSnapshot, GraphState, InMemoryContentGraph};
pub use node::{NewNode, NodeRecord};
pub use reference::{ReferenceRelation, ReferenceSet, ReferenceTarget};
pub use stream::{StreamGraph, VariantIndex};
pub use traits::ContentGraphReader;
pub use transaction::GraphTransaction;
