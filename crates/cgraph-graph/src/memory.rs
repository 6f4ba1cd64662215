//! In-memory content graph.
//!
//! [`InMemoryContentGraph`] keeps the whole graph behind one `RwLock`.
//! Writers take the write guard for the lifetime of a
//! [`GraphTransaction`]; readers take a [`GraphSnapshot`] and always see the
//! last committed state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};

use cgraph_dimension::InterDimensionalVariationGraph;
use cgraph_types::{ContentStreamId, NodeAnchorPoint};

use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::node::NodeRecord;
use crate::reference::ReferenceSet;
use crate::stream::StreamGraph;
use crate::traits::ContentGraphReader;
use crate::transaction::GraphTransaction;

/// All stored graph data.
///
/// Node records and reference sets are keyed by anchor and shared by every
/// stream whose variant index or edges mention the anchor.
#[derive(Debug)]
pub struct GraphState {
    pub(crate) next_anchor: u64,
    pub(crate) nodes: HashMap<NodeAnchorPoint, NodeRecord>,
    pub(crate) references: HashMap<NodeAnchorPoint, ReferenceSet>,
    pub(crate) streams: HashMap<ContentStreamId, StreamGraph>,
}

impl GraphState {
    pub(crate) fn new() -> Self {
        Self {
            next_anchor: 1,
            nodes: HashMap::new(),
            references: HashMap::new(),
            streams: HashMap::new(),
        }
    }

    pub fn stream(&self, content_stream: ContentStreamId) -> GraphResult<&StreamGraph> {
        self.streams
            .get(&content_stream)
            .ok_or(GraphError::ContentStreamNotFound(content_stream))
    }
}

/// An in-memory implementation of the content graph.
#[derive(Debug)]
pub struct InMemoryContentGraph {
    state: RwLock<GraphState>,
    variation: Arc<InterDimensionalVariationGraph>,
    config: GraphConfig,
}

impl InMemoryContentGraph {
    pub fn new(config: GraphConfig, variation: Arc<InterDimensionalVariationGraph>) -> Self {
        Self {
            state: RwLock::new(GraphState::new()),
            variation,
            config,
        }
    }

    /// Default configuration over a dimensionless space.
    pub fn with_defaults() -> Self {
        Self::new(GraphConfig::default(), Arc::new(InterDimensionalVariationGraph::empty()))
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn variation(&self) -> &InterDimensionalVariationGraph {
        &self.variation
    }

    /// Open a write transaction stamped with the current time.
    pub fn begin(&self) -> GraphResult<GraphTransaction<'_>> {
        self.begin_at(Utc::now())
    }

    /// Open a write transaction whose writes are stamped with `now`.
    ///
    /// Blocks until no other transaction or snapshot holds the graph.
    pub fn begin_at(&self, now: DateTime<Utc>) -> GraphResult<GraphTransaction<'_>> {
        let guard = self
            .state
            .write()
            .map_err(|e| GraphError::LockPoisoned(e.to_string()))?;
        Ok(GraphTransaction::new(guard, &self.variation, &self.config, now))
    }

    /// A read view of the last committed state.
    pub fn snapshot(&self) -> GraphResult<GraphSnapshot<'_>> {
        let state = self
            .state
            .read()
            .map_err(|e| GraphError::LockPoisoned(e.to_string()))?;
        Ok(GraphSnapshot {
            state,
            variation: &self.variation,
            config: &self.config,
        })
    }
}

impl Default for InMemoryContentGraph {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// A read-only view holding the graph's read lock.
pub struct GraphSnapshot<'a> {
    state: RwLockReadGuard<'a, GraphState>,
    variation: &'a InterDimensionalVariationGraph,
    config: &'a GraphConfig,
}

impl ContentGraphReader for GraphSnapshot<'_> {
    fn graph_state(&self) -> &GraphState {
        &self.state
    }

    fn variation(&self) -> &InterDimensionalVariationGraph {
        self.variation
    }

    fn graph_config(&self) -> &GraphConfig {
        self.config
    }
}
