use cgraph_dimension::{DimensionSpacePoint, DimensionSpacePointHash, InterDimensionalVariationGraph};
use cgraph_types::{ContentStreamId, NodeAggregateId, NodeAnchorPoint, ReferenceName};

use crate::config::{GraphConfig, LookupMode};
use crate::error::GraphResult;
use crate::hierarchy::{HierarchyRelation, SubtreeTags};
use crate::memory::GraphState;
use crate::node::NodeRecord;
use crate::reference::{ReferenceRelation, ReferenceTarget};

/// Read access to a consistent view of the content graph.
///
/// Implemented by [`GraphSnapshot`](crate::GraphSnapshot), which sees the
/// last committed state, and by [`GraphTransaction`](crate::GraphTransaction),
/// which also sees its own uncommitted writes.
///
/// All hierarchy reads are scoped to a content stream and a dimension space
/// point hash. A stream that has never been written to after a fork reads
/// the data it shares with its source.
pub trait ContentGraphReader {
    fn graph_state(&self) -> &GraphState;

    fn variation(&self) -> &InterDimensionalVariationGraph;

    fn graph_config(&self) -> &GraphConfig;

    fn stream_exists(&self, content_stream: ContentStreamId) -> bool {
        self.graph_state().streams.contains_key(&content_stream)
    }

    /// All content streams holding graph data, sorted.
    fn streams(&self) -> Vec<ContentStreamId> {
        let mut ids: Vec<_> = self.graph_state().streams.keys().copied().collect();
        ids.sort();
        ids
    }

    /// The stream this one was forked from, if any.
    fn stream_source(&self, content_stream: ContentStreamId) -> GraphResult<Option<ContentStreamId>> {
        Ok(self.graph_state().stream(content_stream)?.source())
    }

    fn node(&self, anchor: NodeAnchorPoint) -> Option<&NodeRecord> {
        self.graph_state().nodes.get(&anchor)
    }

    /// Number of stored node records across all streams.
    fn node_count(&self) -> usize {
        self.graph_state().nodes.len()
    }

    /// Every variant of `aggregate` in the stream.
    fn variants(
        &self,
        content_stream: ContentStreamId,
        aggregate: &NodeAggregateId,
    ) -> GraphResult<Vec<&NodeRecord>> {
        let state = self.graph_state();
        Ok(state
            .stream(content_stream)?
            .variants()
            .variants(aggregate)
            .into_iter()
            .filter_map(|(_, anchor)| state.nodes.get(&anchor))
            .collect())
    }

    /// Resolve the variant of `aggregate` for `point` using the configured
    /// lookup mode.
    fn find_by_aggregate_id(
        &self,
        content_stream: ContentStreamId,
        aggregate: &NodeAggregateId,
        point: &DimensionSpacePoint,
    ) -> GraphResult<Option<NodeAnchorPoint>> {
        self.find_by_aggregate_id_with(content_stream, aggregate, point, self.graph_config().lookup_mode)
    }

    /// Resolve the variant of `aggregate` for `point`.
    ///
    /// `Strict` accepts only a variant originating exactly at `point`.
    /// `Fallback` walks the generalizations of `point`, closest first, and
    /// finally the default point. A point outside the configured dimension
    /// space has no generalizations and resolves to its exact origin only.
    fn find_by_aggregate_id_with(
        &self,
        content_stream: ContentStreamId,
        aggregate: &NodeAggregateId,
        point: &DimensionSpacePoint,
        mode: LookupMode,
    ) -> GraphResult<Option<NodeAnchorPoint>> {
        let variants = self.graph_state().stream(content_stream)?.variants();
        match mode {
            LookupMode::Strict => Ok(variants.get(aggregate, &point.hash())),
            LookupMode::Fallback => {
                let mut candidates = self
                    .variation()
                    .generalizations(point, true)
                    .unwrap_or_else(|_| vec![point.clone()]);
                let default_point = DimensionSpacePoint::default_point();
                if !candidates.contains(&default_point) {
                    candidates.push(default_point);
                }
                Ok(candidates
                    .iter()
                    .find_map(|candidate| variants.get(aggregate, &candidate.hash())))
            }
        }
    }

    /// The variant of `aggregate` that has an incoming edge in the scope.
    fn visible_in(
        &self,
        content_stream: ContentStreamId,
        aggregate: &NodeAggregateId,
        dimension_space_point: &DimensionSpacePointHash,
    ) -> GraphResult<Option<NodeAnchorPoint>> {
        let stream = self.graph_state().stream(content_stream)?;
        let Some(scope) = stream.scope(dimension_space_point) else {
            return Ok(None);
        };
        Ok(stream
            .variants()
            .variants(aggregate)
            .into_iter()
            .map(|(_, anchor)| anchor)
            .find(|anchor| scope.contains(*anchor)))
    }

    /// Parent of `anchor` in the scope; `None` for roots and detached nodes.
    fn parent(
        &self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
    ) -> GraphResult<Option<NodeAnchorPoint>> {
        let stream = self.graph_state().stream(content_stream)?;
        Ok(stream
            .scope(dimension_space_point)
            .and_then(|scope| scope.parent_of(anchor))
            .filter(|parent| !parent.is_root_edge()))
    }

    /// Children of `anchor` in position order. Pass
    /// [`NodeAnchorPoint::ROOT_EDGE`] for the root nodes.
    fn children(
        &self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
    ) -> GraphResult<Vec<NodeAnchorPoint>> {
        let stream = self.graph_state().stream(content_stream)?;
        Ok(stream
            .scope(dimension_space_point)
            .map(|scope| scope.children_of(anchor).to_vec())
            .unwrap_or_default())
    }

    fn ancestors(
        &self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
    ) -> GraphResult<Vec<NodeAnchorPoint>> {
        let stream = self.graph_state().stream(content_stream)?;
        Ok(stream
            .scope(dimension_space_point)
            .map(|scope| scope.ancestors(anchor))
            .unwrap_or_default())
    }

    /// All descendants of `anchor`, breadth first.
    fn subtree(
        &self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
    ) -> GraphResult<Vec<NodeAnchorPoint>> {
        let stream = self.graph_state().stream(content_stream)?;
        Ok(stream
            .scope(dimension_space_point)
            .map(|scope| scope.descendants(anchor))
            .unwrap_or_default())
    }

    /// Whether `anchor` is connected to the root edge in the scope.
    fn is_reachable(
        &self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
    ) -> GraphResult<bool> {
        let stream = self.graph_state().stream(content_stream)?;
        Ok(stream
            .scope(dimension_space_point)
            .is_some_and(|scope| scope.is_reachable(anchor)))
    }

    /// Effective (explicit and inherited) tags of `anchor`'s edge.
    fn subtree_tags_for(
        &self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
    ) -> GraphResult<SubtreeTags> {
        let stream = self.graph_state().stream(content_stream)?;
        Ok(stream
            .scope(dimension_space_point)
            .map(|scope| scope.subtree_tags(anchor))
            .unwrap_or_default())
    }

    /// Every hierarchy edge of the stream as rows, ordered by dimension
    /// space point hash, parent and position.
    fn hierarchy_relations(&self, content_stream: ContentStreamId) -> GraphResult<Vec<HierarchyRelation>> {
        let stream = self.graph_state().stream(content_stream)?;
        let mut scopes: Vec<_> = stream.scopes().collect();
        scopes.sort_by(|a, b| a.dimension_space_point_hash().cmp(b.dimension_space_point_hash()));
        Ok(scopes
            .into_iter()
            .flat_map(|scope| scope.relations(content_stream))
            .collect())
    }

    fn references(&self, source: NodeAnchorPoint, name: &ReferenceName) -> Vec<ReferenceTarget> {
        self.graph_state()
            .references
            .get(&source)
            .map(|set| set.get(name).to_vec())
            .unwrap_or_default()
    }

    fn reference_relations(&self, source: NodeAnchorPoint) -> Vec<ReferenceRelation> {
        self.graph_state()
            .references
            .get(&source)
            .map(|set| set.relations(source))
            .unwrap_or_default()
    }

    /// References in the stream pointing at `destination`, ordered by source
    /// anchor.
    fn backreferences(
        &self,
        content_stream: ContentStreamId,
        destination: &NodeAggregateId,
    ) -> GraphResult<Vec<ReferenceRelation>> {
        let state = self.graph_state();
        let mut sources: Vec<_> = state.stream(content_stream)?.variants().anchors().collect();
        sources.sort();
        Ok(sources
            .into_iter()
            .filter_map(|source| state.references.get(&source).map(|set| set.relations(source)))
            .flatten()
            .filter(|row| &row.destination_node_aggregate_id == destination)
            .collect())
    }

    /// Whether a stream other than `content_stream` still uses `anchor`.
    fn is_shared(&self, content_stream: ContentStreamId, anchor: NodeAnchorPoint) -> bool {
        self.graph_state()
            .streams
            .iter()
            .filter(|(id, _)| **id != content_stream)
            .any(|(_, stream)| stream.uses_anchor(anchor))
    }
}
