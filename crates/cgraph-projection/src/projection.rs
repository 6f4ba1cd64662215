//! The projection facade: applies events, serves subgraphs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use cgraph_dimension::{DimensionSpacePoint, DimensionSpacePointRegistry};
use cgraph_graph::{ContentGraphReader, GraphTransaction, HierarchyRelation, InMemoryContentGraph};
use cgraph_schema::{Schema, SchemaDiff, SchemaManager};
use cgraph_streams::{ContentStream, ContentStreamStore, InMemoryContentStreamStore, StreamError};
use cgraph_types::ContentStreamId;

use crate::config::CgraphConfig;
use crate::error::ProjectionResult;
use crate::event::{ContentGraphEvent, EventEnvelope};
use crate::handlers::{apply_event, EventContext};
use crate::subgraph::{ContentSubgraph, VisibilityConstraints};

/// Outcome of one applied event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedEvent {
    pub content_stream_id: ContentStreamId,
    pub event_type: &'static str,
    /// Stream version after the event.
    pub version: u64,
    pub applied_at: DateTime<Utc>,
}

/// What [`ContentGraphProjection::prune_removed`] deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub content_streams: Vec<ContentStreamId>,
    pub node_records: usize,
}

/// Content graph, content stream table and dimension space point table,
/// kept consistent per event.
///
/// Applying an event takes the graph's write transaction first, so applies
/// are serialized; the stream version check and increment guard against
/// writers that bypass this projection and share the stream store.
pub struct ContentGraphProjection<S: ContentStreamStore = InMemoryContentStreamStore> {
    graph: InMemoryContentGraph,
    streams: S,
    dimension_space_points: DimensionSpacePointRegistry,
    config: CgraphConfig,
}

impl ContentGraphProjection<InMemoryContentStreamStore> {
    pub fn in_memory(config: CgraphConfig) -> ProjectionResult<Self> {
        Self::new(config, InMemoryContentStreamStore::new())
    }
}

impl<S: ContentStreamStore> ContentGraphProjection<S> {
    /// Build an empty projection. Fails if the dimension configuration is
    /// invalid.
    pub fn new(config: CgraphConfig, streams: S) -> ProjectionResult<Self> {
        let variation = Arc::new(config.variation_graph()?);
        let dimension_space_points = DimensionSpacePointRegistry::new();
        dimension_space_points.register_all(variation.allowed_points())?;
        let graph = InMemoryContentGraph::new(config.graph.clone(), variation);
        Ok(Self {
            graph,
            streams,
            dimension_space_points,
            config,
        })
    }

    pub fn config(&self) -> &CgraphConfig {
        &self.config
    }

    pub fn graph(&self) -> &InMemoryContentGraph {
        &self.graph
    }

    pub fn streams(&self) -> &S {
        &self.streams
    }

    pub fn dimension_space_points(&self) -> &DimensionSpacePointRegistry {
        &self.dimension_space_points
    }

    pub fn content_stream(&self, id: ContentStreamId) -> ProjectionResult<Option<ContentStream>> {
        Ok(self.streams.get(id)?)
    }

    pub fn content_streams(&self) -> ProjectionResult<Vec<ContentStream>> {
        Ok(self.streams.list()?)
    }

    pub fn hierarchy_relations(&self, content_stream: ContentStreamId) -> ProjectionResult<Vec<HierarchyRelation>> {
        Ok(self.graph.snapshot()?.hierarchy_relations(content_stream)?)
    }

    /// Apply one event. Either the graph change, the version increment and
    /// any lifecycle change all happen, or none of the graph changes do.
    pub fn apply(&self, envelope: &EventEnvelope) -> ProjectionResult<AppliedEvent> {
        let content_stream = envelope.content_stream_id;
        let mut tx = match envelope.recorded_at {
            Some(at) => self.graph.begin_at(at)?,
            None => self.graph.begin()?,
        };
        let applied_at = tx.now();

        let version = if envelope.event.creates_content_stream() {
            self.apply_creation(&mut tx, envelope)?
        } else {
            self.apply_to_existing(&mut tx, envelope)?
        };
        tx.commit();

        info!(
            content_stream = %content_stream,
            event = envelope.event.event_type(),
            version,
            "applied event"
        );
        Ok(AppliedEvent {
            content_stream_id: content_stream,
            event_type: envelope.event.event_type(),
            version,
            applied_at,
        })
    }

    /// Apply events in order, stopping at the first failure.
    pub fn apply_all<'e>(
        &self,
        envelopes: impl IntoIterator<Item = &'e EventEnvelope>,
    ) -> ProjectionResult<Vec<AppliedEvent>> {
        envelopes.into_iter().map(|envelope| self.apply(envelope)).collect()
    }

    fn apply_creation(&self, tx: &mut GraphTransaction<'_>, envelope: &EventEnvelope) -> ProjectionResult<u64> {
        let content_stream = envelope.content_stream_id;
        if self.streams.get(content_stream)?.is_some() {
            return Err(StreamError::AlreadyExists(content_stream).into());
        }
        check_expected_version(content_stream, envelope.expected_version, 0)?;
        self.mutate_graph(tx, envelope)?;

        match &envelope.event {
            ContentGraphEvent::ContentStreamWasForked {
                source_content_stream_id,
            } => self.streams.fork(*source_content_stream_id, content_stream)?,
            _ => self.streams.create(content_stream)?,
        };
        let created = self
            .streams
            .compare_and_increment(content_stream, 0)
            .and_then(|version| self.streams.mark_created(content_stream).map(|_| version));
        match created {
            Ok(version) => Ok(version),
            Err(e) => {
                // The graph transaction rolls back; drop the row with it.
                if let Err(purge) = self.streams.purge(content_stream) {
                    warn!(content_stream = %content_stream, error = %purge, "failed to purge half-created stream");
                }
                Err(e.into())
            }
        }
    }

    fn apply_to_existing(&self, tx: &mut GraphTransaction<'_>, envelope: &EventEnvelope) -> ProjectionResult<u64> {
        let content_stream = envelope.content_stream_id;
        let stream = self.streams.require(content_stream)?;
        if stream.removed {
            return Err(StreamError::ContentStreamRemoved(content_stream).into());
        }
        check_expected_version(content_stream, envelope.expected_version, stream.version)?;

        let target_state = envelope.event.target_state();
        if let Some(to) = target_state {
            if !stream.state.can_transition_to(to) {
                return Err(StreamError::InvalidTransition {
                    content_stream,
                    from: stream.state,
                    to,
                }
                .into());
            }
        }

        self.mutate_graph(tx, envelope)?;

        // Lifecycle first: a failed transition must not leave the version
        // advanced while the graph rolls back.
        if let Some(to) = target_state {
            self.streams.transition(content_stream, to)?;
        }
        if matches!(envelope.event, ContentGraphEvent::ContentStreamWasRemoved) {
            self.streams.remove(content_stream)?;
        }
        Ok(self.streams.compare_and_increment(content_stream, stream.version)?)
    }

    fn mutate_graph(&self, tx: &mut GraphTransaction<'_>, envelope: &EventEnvelope) -> ProjectionResult<()> {
        let mut cx = EventContext {
            tx,
            points: &self.dimension_space_points,
            content_stream: envelope.content_stream_id,
        };
        apply_event(&mut cx, &envelope.event)
    }

    /// Read the graph of one stream at one point.
    pub fn subgraph(
        &self,
        content_stream: ContentStreamId,
        point: &DimensionSpacePoint,
    ) -> ProjectionResult<ContentSubgraph<'_>> {
        self.subgraph_with(content_stream, point, VisibilityConstraints::unrestricted())
    }

    /// Like [`subgraph`](Self::subgraph), hiding subtrees that carry an
    /// excluded tag.
    pub fn subgraph_with(
        &self,
        content_stream: ContentStreamId,
        point: &DimensionSpacePoint,
        visibility: VisibilityConstraints,
    ) -> ProjectionResult<ContentSubgraph<'_>> {
        ContentSubgraph::new(self.graph.snapshot()?, content_stream, point.clone(), visibility)
    }

    /// Physically delete removed streams nothing was forked from, then
    /// node records no remaining stream uses.
    pub fn prune_removed(&self) -> ProjectionResult<PruneReport> {
        let prunable = self.streams.prunable()?;
        let mut tx = self.graph.begin()?;
        for stream in &prunable {
            if tx.stream_exists(stream.id) {
                tx.drop_stream(stream.id)?;
            }
        }
        let node_records = tx.collect_garbage();
        tx.commit();

        let mut content_streams = Vec::with_capacity(prunable.len());
        for stream in prunable {
            self.streams.purge(stream.id)?;
            content_streams.push(stream.id);
        }
        debug!(streams = content_streams.len(), node_records, "pruned removed content streams");
        Ok(PruneReport {
            content_streams,
            node_records,
        })
    }

    /// The five projection tables under the configured prefix.
    pub fn schema(&self) -> ProjectionResult<Schema> {
        Ok(self.config.schema_builder()?.build()?)
    }

    /// What `manager`'s database lacks to hold this projection.
    pub fn schema_diff(&self, manager: &dyn SchemaManager) -> ProjectionResult<SchemaDiff> {
        Ok(self.config.schema_builder()?.diff_against(manager)?)
    }
}

fn check_expected_version(
    content_stream: ContentStreamId,
    expected: Option<u64>,
    actual: u64,
) -> Result<(), StreamError> {
    match expected {
        Some(expected) if expected != actual => Err(StreamError::ConcurrentModification {
            content_stream,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}
