//! Read view of one (content stream, dimension space point) pair.

use std::collections::BTreeSet;

use serde::Serialize;

use cgraph_dimension::{DimensionSpacePoint, DimensionSpacePointHash};
use cgraph_graph::{ContentGraphReader, GraphError, GraphSnapshot, SubtreeTags};
use cgraph_types::{
    ContentStreamId, NodeAggregateId, NodeAnchorPoint, NodeClassification, NodeName, NodeTimestamps,
    NodeTypeName, ReferenceName, SerializedPropertyValues, SubtreeTag,
};

use crate::error::ProjectionResult;

/// Subtree tags whose nodes, and everything below them, are hidden.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibilityConstraints {
    excluded: BTreeSet<SubtreeTag>,
}

impl VisibilityConstraints {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn excluding(mut self, tag: SubtreeTag) -> Self {
        self.excluded.insert(tag);
        self
    }

    pub fn hides(&self, tags: &SubtreeTags) -> bool {
        self.excluded.iter().any(|tag| tags.contains(tag))
    }
}

/// A node as seen in a subgraph.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubgraphNode {
    pub anchor: NodeAnchorPoint,
    pub aggregate_id: NodeAggregateId,
    pub node_type: NodeTypeName,
    pub name: Option<NodeName>,
    pub origin: DimensionSpacePoint,
    pub classification: NodeClassification,
    pub properties: SerializedPropertyValues,
    pub timestamps: NodeTimestamps,
    pub subtree_tags: SubtreeTags,
}

/// A reference resolved in a subgraph. `node` is the destination for
/// outgoing references and the source for backreferences.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubgraphReference {
    pub name: ReferenceName,
    pub position: u32,
    pub properties: Option<SerializedPropertyValues>,
    pub node: SubgraphNode,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubgraphTree {
    pub node: SubgraphNode,
    pub children: Vec<SubgraphTree>,
}

impl SubgraphTree {
    /// Number of nodes in this tree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SubgraphTree::node_count).sum::<usize>()
    }
}

/// Consistent read view as of the last committed event.
///
/// Only nodes connected to the root edge are visible; detached subtrees and
/// subtrees hidden by the [`VisibilityConstraints`] are not. The view holds
/// the graph's read lock, so drop it before applying further events.
pub struct ContentSubgraph<'a> {
    snapshot: GraphSnapshot<'a>,
    content_stream: ContentStreamId,
    point: DimensionSpacePoint,
    hash: DimensionSpacePointHash,
    visibility: VisibilityConstraints,
}

impl<'a> ContentSubgraph<'a> {
    pub(crate) fn new(
        snapshot: GraphSnapshot<'a>,
        content_stream: ContentStreamId,
        point: DimensionSpacePoint,
        visibility: VisibilityConstraints,
    ) -> ProjectionResult<Self> {
        snapshot.graph_state().stream(content_stream)?;
        let hash = point.hash();
        Ok(Self {
            snapshot,
            content_stream,
            point,
            hash,
            visibility,
        })
    }

    pub fn content_stream(&self) -> ContentStreamId {
        self.content_stream
    }

    pub fn dimension_space_point(&self) -> &DimensionSpacePoint {
        &self.point
    }

    pub fn find_node(&self, aggregate: &NodeAggregateId) -> ProjectionResult<Option<SubgraphNode>> {
        match self.anchor_of(aggregate)? {
            Some(anchor) => self.view(anchor),
            None => Ok(None),
        }
    }

    pub fn root_nodes(&self) -> ProjectionResult<Vec<SubgraphNode>> {
        self.child_views(NodeAnchorPoint::ROOT_EDGE)
    }

    /// Visible children in position order. Empty if the parent is not visible.
    pub fn children(&self, parent: &NodeAggregateId) -> ProjectionResult<Vec<SubgraphNode>> {
        match self.find_node(parent)? {
            Some(node) => self.child_views(node.anchor),
            None => Ok(Vec::new()),
        }
    }

    pub fn parent(&self, child: &NodeAggregateId) -> ProjectionResult<Option<SubgraphNode>> {
        let Some(node) = self.find_node(child)? else {
            return Ok(None);
        };
        match self.snapshot.parent(self.content_stream, &self.hash, node.anchor)? {
            Some(parent) => self.view(parent),
            None => Ok(None),
        }
    }

    /// Outgoing references whose destination is visible here, by name and
    /// position.
    pub fn references(&self, source: &NodeAggregateId) -> ProjectionResult<Vec<SubgraphReference>> {
        let Some(node) = self.find_node(source)? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for row in self.snapshot.reference_relations(node.anchor) {
            if let Some(destination) = self.find_node(&row.destination_node_aggregate_id)? {
                out.push(SubgraphReference {
                    name: row.name,
                    position: row.position,
                    properties: row.properties,
                    node: destination,
                });
            }
        }
        Ok(out)
    }

    /// References from visible nodes pointing at `destination`.
    pub fn backreferences(&self, destination: &NodeAggregateId) -> ProjectionResult<Vec<SubgraphReference>> {
        let mut out = Vec::new();
        for row in self.snapshot.backreferences(self.content_stream, destination)? {
            if let Some(source) = self.view(row.node_anchor_point)? {
                out.push(SubgraphReference {
                    name: row.name,
                    position: row.position,
                    properties: row.properties,
                    node: source,
                });
            }
        }
        Ok(out)
    }

    /// Effective subtree tags; empty if the node is not attached here.
    pub fn subtree_tags(&self, aggregate: &NodeAggregateId) -> ProjectionResult<SubtreeTags> {
        match self.anchor_of(aggregate)? {
            Some(anchor) => Ok(self
                .snapshot
                .subtree_tags_for(self.content_stream, &self.hash, anchor)?),
            None => Ok(SubtreeTags::new()),
        }
    }

    /// All visible nodes as a forest below the root edge.
    pub fn tree(&self) -> ProjectionResult<Vec<SubgraphTree>> {
        self.root_nodes()?
            .into_iter()
            .map(|node| self.grow(node))
            .collect()
    }

    fn grow(&self, node: SubgraphNode) -> ProjectionResult<SubgraphTree> {
        let children = self
            .child_views(node.anchor)?
            .into_iter()
            .map(|child| self.grow(child))
            .collect::<ProjectionResult<Vec<_>>>()?;
        Ok(SubgraphTree { node, children })
    }

    fn anchor_of(&self, aggregate: &NodeAggregateId) -> ProjectionResult<Option<NodeAnchorPoint>> {
        Ok(self.snapshot.visible_in(self.content_stream, aggregate, &self.hash)?)
    }

    fn child_views(&self, parent: NodeAnchorPoint) -> ProjectionResult<Vec<SubgraphNode>> {
        let mut out = Vec::new();
        for child in self.snapshot.children(self.content_stream, &self.hash, parent)? {
            if let Some(node) = self.view(child)? {
                out.push(node);
            }
        }
        Ok(out)
    }

    fn view(&self, anchor: NodeAnchorPoint) -> ProjectionResult<Option<SubgraphNode>> {
        if !self.snapshot.is_reachable(self.content_stream, &self.hash, anchor)? {
            return Ok(None);
        }
        let tags = self
            .snapshot
            .subtree_tags_for(self.content_stream, &self.hash, anchor)?;
        if self.visibility.hides(&tags) {
            return Ok(None);
        }
        let record = self.snapshot.node(anchor).ok_or(GraphError::AnchorNotFound(anchor))?;
        let name = self
            .snapshot
            .graph_state()
            .stream(self.content_stream)?
            .scope(&self.hash)
            .and_then(|scope| scope.edge(anchor))
            .and_then(|edge| edge.name.clone());
        Ok(Some(SubgraphNode {
            anchor,
            aggregate_id: record.aggregate_id.clone(),
            node_type: record.node_type.clone(),
            name,
            origin: record.origin.clone(),
            classification: record.classification,
            properties: record.properties.clone(),
            timestamps: record.timestamps,
            subtree_tags: tags,
        }))
    }
}
