//! Scoped, all-or-nothing write access to the content graph.
//!
//! A [`GraphTransaction`] holds the graph's write lock from
//! [`InMemoryContentGraph::begin`](crate::InMemoryContentGraph::begin) until it
//! is committed or dropped. Before the first change to a hierarchy scope,
//! variant index, node record or reference set it journals the prior value;
//! whole streams are journaled only when created, forked or dropped. Dropping
//! the transaction
//! without [`commit`](GraphTransaction::commit) restores every journaled
//! value, so a failed mutation never leaves partial state behind.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use cgraph_dimension::{DimensionSpacePoint, DimensionSpacePointHash, InterDimensionalVariationGraph};
use cgraph_types::{
    ContentStreamId, NodeAggregateId, NodeAnchorPoint, NodeClassification, NodeName, PropertyWrite,
    ReferenceName, SubtreeTag,
};

use crate::config::{GraphConfig, PositionPolicy};
use crate::error::{GraphError, GraphResult};
use crate::memory::GraphState;
use crate::node::{NewNode, NodeRecord};
use crate::reference::{ReferenceSet, ReferenceTarget};
use crate::hierarchy::HierarchyScope;
use crate::stream::{StreamGraph, VariantIndex};
use crate::traits::ContentGraphReader;

/// First-touched prior values. `None` means the key did not exist.
#[derive(Debug, Default)]
struct Journal {
    next_anchor: Option<u64>,
    nodes: HashMap<NodeAnchorPoint, Option<NodeRecord>>,
    references: HashMap<NodeAnchorPoint, Option<ReferenceSet>>,
    streams: HashMap<ContentStreamId, Option<StreamGraph>>,
    scopes: HashMap<(ContentStreamId, DimensionSpacePointHash), Option<Arc<HierarchyScope>>>,
    variants: HashMap<ContentStreamId, Arc<VariantIndex>>,
}

impl Journal {
    fn is_empty(&self) -> bool {
        self.next_anchor.is_none()
            && self.nodes.is_empty()
            && self.references.is_empty()
            && self.streams.is_empty()
            && self.scopes.is_empty()
            && self.variants.is_empty()
    }

    fn restore(self, state: &mut GraphState) {
        if let Some(next_anchor) = self.next_anchor {
            state.next_anchor = next_anchor;
        }
        restore_map(&mut state.nodes, self.nodes);
        restore_map(&mut state.references, self.references);
        // Whole streams first: a stream dropped after a scope write was
        // journaled with that write applied.
        restore_map(&mut state.streams, self.streams);
        for ((content_stream, hash), scope) in self.scopes {
            if let Some(stream) = state.streams.get_mut(&content_stream) {
                stream.restore_scope(hash, scope);
            }
        }
        for (content_stream, variants) in self.variants {
            if let Some(stream) = state.streams.get_mut(&content_stream) {
                stream.restore_variants(variants);
            }
        }
    }
}

fn restore_map<K: std::hash::Hash + Eq, V>(target: &mut HashMap<K, V>, prior: HashMap<K, Option<V>>) {
    for (key, value) in prior {
        match value {
            Some(value) => {
                target.insert(key, value);
            }
            None => {
                target.remove(&key);
            }
        }
    }
}

/// An open write transaction. See the module documentation.
pub struct GraphTransaction<'a> {
    state: RwLockWriteGuard<'a, GraphState>,
    variation: &'a InterDimensionalVariationGraph,
    config: &'a GraphConfig,
    journal: Journal,
    now: DateTime<Utc>,
    committed: bool,
}

impl<'a> GraphTransaction<'a> {
    pub(crate) fn new(
        state: RwLockWriteGuard<'a, GraphState>,
        variation: &'a InterDimensionalVariationGraph,
        config: &'a GraphConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            state,
            variation,
            config,
            journal: Journal::default(),
            now,
            committed: false,
        }
    }

    /// The timestamp applied to every write of this transaction.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Make all writes visible and release the lock.
    pub fn commit(mut self) {
        self.committed = true;
        debug!(
            streams = self.journal.streams.len(),
            scopes = self.journal.scopes.len(),
            nodes = self.journal.nodes.len(),
            "committed graph transaction"
        );
    }

    /// Discard all writes and release the lock. Equivalent to dropping.
    pub fn rollback(self) {}

    // ---- streams ----

    /// Register an empty stream.
    pub fn create_stream(&mut self, content_stream: ContentStreamId) -> GraphResult<()> {
        if self.state.streams.contains_key(&content_stream) {
            return Err(GraphError::ContentStreamExists(content_stream));
        }
        self.put_stream(content_stream, StreamGraph::new());
        info!(content_stream = %content_stream, "created content stream graph");
        Ok(())
    }

    /// Register `target` as a copy-on-write fork of `source`.
    pub fn fork_stream(&mut self, source: ContentStreamId, target: ContentStreamId) -> GraphResult<()> {
        if self.state.streams.contains_key(&target) {
            return Err(GraphError::ContentStreamExists(target));
        }
        let fork = self.state.stream(source)?.fork(source);
        self.put_stream(target, fork);
        info!(source = %source, content_stream = %target, "forked content stream graph");
        Ok(())
    }

    /// Drop every edge and variant entry of a stream. Node records stay until
    /// [`collect_garbage`](Self::collect_garbage).
    pub fn drop_stream(&mut self, content_stream: ContentStreamId) -> GraphResult<()> {
        let prior = self
            .state
            .streams
            .remove(&content_stream)
            .ok_or(GraphError::ContentStreamNotFound(content_stream))?;
        self.journal.streams.entry(content_stream).or_insert(Some(prior));
        info!(content_stream = %content_stream, "dropped content stream graph");
        Ok(())
    }

    /// Delete node records and reference sets no stream uses any more.
    /// Returns the number of deleted node records.
    pub fn collect_garbage(&mut self) -> usize {
        let mut live = HashSet::new();
        for stream in self.state.streams.values() {
            live.extend(stream.variants().anchors());
            for scope in stream.scopes() {
                live.extend(scope.anchors());
            }
        }
        let dead_nodes: Vec<_> = self
            .state
            .nodes
            .keys()
            .filter(|anchor| !live.contains(*anchor))
            .copied()
            .collect();
        let dead_references: Vec<_> = self
            .state
            .references
            .keys()
            .filter(|anchor| !live.contains(*anchor))
            .copied()
            .collect();
        for anchor in &dead_nodes {
            let prior = self.state.nodes.remove(anchor);
            self.journal.nodes.entry(*anchor).or_insert(prior);
        }
        for anchor in dead_references {
            let prior = self.state.references.remove(&anchor);
            self.journal.references.entry(anchor).or_insert(prior);
        }
        if !dead_nodes.is_empty() {
            info!(removed = dead_nodes.len(), "collected unused node records");
        }
        dead_nodes.len()
    }

    // ---- nodes ----

    /// Store a new node variant and add it to the stream's variant set.
    pub fn create_node(&mut self, content_stream: ContentStreamId, node: NewNode) -> GraphResult<NodeAnchorPoint> {
        let origin_hash = node.origin.hash();
        self.check_free_origin(content_stream, &node.aggregate_id, &origin_hash)?;

        let anchor = self.allocate_anchor();
        let record = NodeRecord::create(anchor, node, self.now);
        let aggregate = record.aggregate_id.clone();
        self.put_node(record);
        self.variants_mut(content_stream)?.insert(aggregate.clone(), origin_hash.clone(), anchor);
        debug!(
            content_stream = %content_stream,
            anchor = %anchor,
            aggregate = %aggregate,
            origin = %origin_hash,
            "created node"
        );
        Ok(anchor)
    }

    /// Copy the variant at `source` to a new variant originating at `origin`,
    /// including its properties and references.
    pub fn create_variant(
        &mut self,
        content_stream: ContentStreamId,
        source: NodeAnchorPoint,
        origin: DimensionSpacePoint,
    ) -> GraphResult<NodeAnchorPoint> {
        self.require_in_stream(content_stream, source)?;
        let origin_hash = origin.hash();
        let aggregate = self.record(source)?.aggregate_id.clone();
        self.check_free_origin(content_stream, &aggregate, &origin_hash)?;

        let anchor = self.allocate_anchor();
        let variant = self.record(source)?.variant_at(anchor, origin, self.now);
        self.put_node(variant);
        if let Some(references) = self.state.references.get(&source).cloned() {
            self.put_references(anchor, references);
        }
        self.variants_mut(content_stream)?.insert(aggregate.clone(), origin_hash.clone(), anchor);
        debug!(
            content_stream = %content_stream,
            source = %source,
            anchor = %anchor,
            aggregate = %aggregate,
            origin = %origin_hash,
            "created node variant"
        );
        Ok(anchor)
    }

    /// Make sure `anchor` is used by `content_stream` only, copying it if
    /// another stream shares it. Returns the anchor to write to.
    ///
    /// The copy keeps properties, references and original timestamps; every
    /// edge of this stream is rewired to it.
    pub fn ensure_exclusive(
        &mut self,
        content_stream: ContentStreamId,
        anchor: NodeAnchorPoint,
    ) -> GraphResult<NodeAnchorPoint> {
        self.require_in_stream(content_stream, anchor)?;
        if !self.is_shared(content_stream, anchor) {
            return Ok(anchor);
        }

        let copy = self.allocate_anchor();
        let record = self.record(anchor)?.copy_to(copy, self.now);
        self.put_node(record);
        if let Some(references) = self.state.references.get(&anchor).cloned() {
            self.put_references(copy, references);
        }
        self.variants_mut(content_stream)?.replace(anchor, copy);
        let touching = self.state.stream(content_stream)?.scopes_touching(anchor);
        for hash in touching {
            self.scope_mut(content_stream, &hash)?.replace_anchor(anchor, copy);
        }
        debug!(content_stream = %content_stream, from = %anchor, to = %copy, "copied shared node on write");
        Ok(copy)
    }

    /// Apply one property write. Returns the anchor written to.
    pub fn set_property(
        &mut self,
        content_stream: ContentStreamId,
        anchor: NodeAnchorPoint,
        name: &str,
        write: &PropertyWrite,
    ) -> GraphResult<NodeAnchorPoint> {
        let anchor = self.ensure_exclusive(content_stream, anchor)?;
        let now = self.now;
        let node = self.node_mut(anchor)?;
        if node.properties.apply(name, write) {
            node.timestamps = node.timestamps.modified_at(now);
        }
        Ok(anchor)
    }

    /// Apply a batch of property writes. Returns the anchor written to.
    pub fn set_properties(
        &mut self,
        content_stream: ContentStreamId,
        anchor: NodeAnchorPoint,
        writes: &BTreeMap<String, PropertyWrite>,
    ) -> GraphResult<NodeAnchorPoint> {
        let anchor = self.ensure_exclusive(content_stream, anchor)?;
        let now = self.now;
        let node = self.node_mut(anchor)?;
        if node.properties.merge(writes) {
            node.timestamps = node.timestamps.modified_at(now);
        }
        Ok(anchor)
    }

    /// Change the classification through its guarded transition.
    pub fn change_classification(
        &mut self,
        content_stream: ContentStreamId,
        anchor: NodeAnchorPoint,
        classification: NodeClassification,
    ) -> GraphResult<NodeAnchorPoint> {
        self.require_in_stream(content_stream, anchor)?;
        let current = self.record(anchor)?.classification;
        let next = current.transition_to(classification)?;
        if next == current {
            return Ok(anchor);
        }
        let anchor = self.ensure_exclusive(content_stream, anchor)?;
        let now = self.now;
        let node = self.node_mut(anchor)?;
        node.classification = next;
        node.timestamps = node.timestamps.modified_at(now);
        Ok(anchor)
    }

    /// Remove a variant from the stream's variant set and detach its
    /// incoming edges. The record itself persists.
    pub fn remove_variant(
        &mut self,
        content_stream: ContentStreamId,
        aggregate: &NodeAggregateId,
        origin: &DimensionSpacePointHash,
    ) -> GraphResult<NodeAnchorPoint> {
        if self.state.stream(content_stream)?.variants().get(aggregate, origin).is_none() {
            return Err(GraphError::NodeAggregateNotFound {
                aggregate: aggregate.clone(),
                content_stream,
            });
        }
        let anchor = self
            .variants_mut(content_stream)?
            .remove(aggregate, origin)
            .ok_or_else(|| GraphError::NodeAggregateNotFound {
                aggregate: aggregate.clone(),
                content_stream,
            })?;
        let attached: Vec<_> = self
            .state
            .stream(content_stream)?
            .scopes()
            .filter(|scope| scope.contains(anchor))
            .map(|scope| scope.dimension_space_point_hash().clone())
            .collect();
        for hash in &attached {
            self.scope_mut(content_stream, hash)?.detach(anchor)?;
        }
        debug!(
            content_stream = %content_stream,
            anchor = %anchor,
            aggregate = %aggregate,
            detached = attached.len(),
            "removed node variant"
        );
        Ok(anchor)
    }

    // ---- hierarchy ----

    /// Attach `child` below `parent` in one scope. Returns the position the
    /// child received.
    pub fn attach(
        &mut self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        parent: NodeAnchorPoint,
        child: NodeAnchorPoint,
        position: u32,
        name: Option<NodeName>,
    ) -> GraphResult<u32> {
        self.require_in_stream(content_stream, child)?;
        if !parent.is_root_edge() {
            self.require_in_stream(content_stream, parent)?;
        }
        let policy = self.config.position_policy;
        let position = self
            .scope_mut(content_stream, dimension_space_point)?
            .attach(parent, child, position, name, policy)?;
        debug!(
            content_stream = %content_stream,
            dimension_space_point = %dimension_space_point,
            parent = %parent,
            child = %child,
            position,
            "attached node"
        );
        Ok(position)
    }

    /// Remove the incoming edge of `child` in one scope.
    pub fn detach(
        &mut self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        child: NodeAnchorPoint,
    ) -> GraphResult<()> {
        self.require_attached(content_stream, dimension_space_point, child)?;
        self.scope_mut(content_stream, dimension_space_point)?.detach(child)?;
        debug!(
            content_stream = %content_stream,
            dimension_space_point = %dimension_space_point,
            child = %child,
            "detached node"
        );
        Ok(())
    }

    /// Move `child` to `position` among its siblings.
    pub fn reorder(
        &mut self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        parent: NodeAnchorPoint,
        child: NodeAnchorPoint,
        position: u32,
    ) -> GraphResult<u32> {
        let current = self
            .state
            .stream(content_stream)?
            .scope(dimension_space_point)
            .and_then(|scope| scope.parent_of(child));
        if current != Some(parent) {
            return Err(GraphError::NotChildOf { parent, child });
        }
        self.scope_mut(content_stream, dimension_space_point)?.reorder(parent, child, position)
    }

    /// Move `child` with its subtree below `new_parent`, keeping its name and
    /// explicit tags. On failure the original edge is left in place.
    pub fn move_node(
        &mut self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        child: NodeAnchorPoint,
        new_parent: NodeAnchorPoint,
        position: u32,
    ) -> GraphResult<u32> {
        self.require_attached(content_stream, dimension_space_point, child)?;
        if !new_parent.is_root_edge() {
            self.require_in_stream(content_stream, new_parent)?;
        }
        let policy = self.config.position_policy;
        let scope = self.scope_mut(content_stream, dimension_space_point)?;
        let old_position = scope.position_of(child).unwrap_or(0);
        let edge = scope.detach(child)?;
        match scope.attach_with_tags(new_parent, child, position, edge.name.clone(), &edge.subtree_tags, policy) {
            Ok(position) => {
                debug!(
                    content_stream = %content_stream,
                    dimension_space_point = %dimension_space_point,
                    child = %child,
                    from = %edge.parent,
                    to = %new_parent,
                    "moved node"
                );
                Ok(position)
            }
            Err(e) => {
                scope.attach_with_tags(
                    edge.parent,
                    child,
                    old_position,
                    edge.name,
                    &edge.subtree_tags,
                    PositionPolicy::ShiftRight,
                )?;
                Err(e)
            }
        }
    }

    /// Change the name of `anchor`'s incoming edge.
    pub fn rename(
        &mut self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
        name: Option<NodeName>,
    ) -> GraphResult<()> {
        self.require_attached(content_stream, dimension_space_point, anchor)?;
        self.scope_mut(content_stream, dimension_space_point)?.rename(anchor, name)
    }

    /// Tag the subtree starting at `anchor`. Returns `false` if the tag was
    /// already explicit there.
    pub fn tag_subtree(
        &mut self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
        tag: &SubtreeTag,
    ) -> GraphResult<bool> {
        self.require_attached(content_stream, dimension_space_point, anchor)?;
        let changed = self.scope_mut(content_stream, dimension_space_point)?.tag(anchor, tag)?;
        debug!(content_stream = %content_stream, anchor = %anchor, tag = %tag, changed, "tagged subtree");
        Ok(changed)
    }

    /// Remove an explicit tag from `anchor`. Returns `false` if it was not
    /// explicit there.
    pub fn untag_subtree(
        &mut self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
        tag: &SubtreeTag,
    ) -> GraphResult<bool> {
        self.require_attached(content_stream, dimension_space_point, anchor)?;
        let changed = self.scope_mut(content_stream, dimension_space_point)?.untag(anchor, tag)?;
        debug!(content_stream = %content_stream, anchor = %anchor, tag = %tag, changed, "untagged subtree");
        Ok(changed)
    }

    /// Swap `old` for `new` in the edges of one scope only. Used when a
    /// specialization variant takes over the edges of its source there.
    pub fn replace_in_scope(
        &mut self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        old: NodeAnchorPoint,
        new: NodeAnchorPoint,
    ) -> GraphResult<()> {
        self.require_in_stream(content_stream, new)?;
        let touched = self
            .state
            .stream(content_stream)?
            .scope(dimension_space_point)
            .is_some_and(|scope| scope.touches(old));
        if touched {
            self.scope_mut(content_stream, dimension_space_point)?.replace_anchor(old, new);
        }
        Ok(())
    }

    // ---- references ----

    /// Insert a reference at `position`, shifting later ones right. Returns
    /// the anchor written to.
    pub fn add_reference(
        &mut self,
        content_stream: ContentStreamId,
        source: NodeAnchorPoint,
        name: ReferenceName,
        position: u32,
        target: ReferenceTarget,
    ) -> GraphResult<NodeAnchorPoint> {
        let source = self.ensure_exclusive(content_stream, source)?;
        self.references_mut(source).insert(name, position, target);
        Ok(source)
    }

    pub fn remove_reference(
        &mut self,
        content_stream: ContentStreamId,
        source: NodeAnchorPoint,
        name: &ReferenceName,
        destination: &NodeAggregateId,
    ) -> GraphResult<NodeAnchorPoint> {
        self.require_reference(content_stream, source, name, destination)?;
        let source = self.ensure_exclusive(content_stream, source)?;
        self.references_mut(source).remove(name, destination);
        Ok(source)
    }

    pub fn reorder_reference(
        &mut self,
        content_stream: ContentStreamId,
        source: NodeAnchorPoint,
        name: &ReferenceName,
        destination: &NodeAggregateId,
        position: u32,
    ) -> GraphResult<NodeAnchorPoint> {
        self.require_reference(content_stream, source, name, destination)?;
        let source = self.ensure_exclusive(content_stream, source)?;
        self.references_mut(source).reorder(name, destination, position);
        Ok(source)
    }

    /// Replace the whole reference sequence `name` of `source`.
    pub fn set_references(
        &mut self,
        content_stream: ContentStreamId,
        source: NodeAnchorPoint,
        name: ReferenceName,
        targets: Vec<ReferenceTarget>,
    ) -> GraphResult<NodeAnchorPoint> {
        let source = self.ensure_exclusive(content_stream, source)?;
        self.references_mut(source).set(name, targets);
        Ok(source)
    }

    // ---- journaled access ----

    fn allocate_anchor(&mut self) -> NodeAnchorPoint {
        let next = self.state.next_anchor;
        self.journal.next_anchor.get_or_insert(next);
        self.state.next_anchor = next + 1;
        NodeAnchorPoint::new(next)
    }

    fn record(&self, anchor: NodeAnchorPoint) -> GraphResult<&NodeRecord> {
        self.state.nodes.get(&anchor).ok_or(GraphError::AnchorNotFound(anchor))
    }

    /// The scope table, journaled before its first write. Only the prior
    /// `Arc` is kept, so untouched scopes of the stream stay shared.
    fn scope_mut(
        &mut self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
    ) -> GraphResult<&mut HierarchyScope> {
        let state = &mut *self.state;
        let stream = state
            .streams
            .get_mut(&content_stream)
            .ok_or(GraphError::ContentStreamNotFound(content_stream))?;
        self.journal
            .scopes
            .entry((content_stream, dimension_space_point.clone()))
            .or_insert_with(|| stream.scope_table(dimension_space_point));
        Ok(stream.scope_mut(dimension_space_point))
    }

    fn variants_mut(&mut self, content_stream: ContentStreamId) -> GraphResult<&mut VariantIndex> {
        let state = &mut *self.state;
        let stream = state
            .streams
            .get_mut(&content_stream)
            .ok_or(GraphError::ContentStreamNotFound(content_stream))?;
        self.journal
            .variants
            .entry(content_stream)
            .or_insert_with(|| stream.variants_table());
        Ok(stream.variants_mut())
    }

    fn put_stream(&mut self, content_stream: ContentStreamId, stream: StreamGraph) {
        let prior = self.state.streams.insert(content_stream, stream);
        self.journal.streams.entry(content_stream).or_insert(prior);
    }

    fn node_mut(&mut self, anchor: NodeAnchorPoint) -> GraphResult<&mut NodeRecord> {
        let state = &mut *self.state;
        let node = state
            .nodes
            .get_mut(&anchor)
            .ok_or(GraphError::AnchorNotFound(anchor))?;
        self.journal
            .nodes
            .entry(anchor)
            .or_insert_with(|| Some(node.clone()));
        Ok(node)
    }

    fn put_node(&mut self, record: NodeRecord) {
        let anchor = record.anchor;
        let prior = self.state.nodes.insert(anchor, record);
        self.journal.nodes.entry(anchor).or_insert(prior);
    }

    fn references_mut(&mut self, anchor: NodeAnchorPoint) -> &mut ReferenceSet {
        let state = &mut *self.state;
        if !self.journal.references.contains_key(&anchor) {
            self.journal
                .references
                .insert(anchor, state.references.get(&anchor).cloned());
        }
        state.references.entry(anchor).or_default()
    }

    fn put_references(&mut self, anchor: NodeAnchorPoint, references: ReferenceSet) {
        let prior = self.state.references.insert(anchor, references);
        self.journal.references.entry(anchor).or_insert(prior);
    }

    // ---- guards ----

    fn check_free_origin(
        &self,
        content_stream: ContentStreamId,
        aggregate: &NodeAggregateId,
        origin: &DimensionSpacePointHash,
    ) -> GraphResult<()> {
        match self.state.stream(content_stream)?.variants().get(aggregate, origin) {
            Some(existing) => Err(GraphError::DuplicateOrigin {
                aggregate: aggregate.clone(),
                origin: origin.clone(),
                existing,
            }),
            None => Ok(()),
        }
    }

    fn require_in_stream(&self, content_stream: ContentStreamId, anchor: NodeAnchorPoint) -> GraphResult<()> {
        if !self.state.stream(content_stream)?.variants().contains_anchor(anchor) {
            if !self.state.nodes.contains_key(&anchor) {
                return Err(GraphError::AnchorNotFound(anchor));
            }
            return Err(GraphError::AnchorNotInStream { anchor, content_stream });
        }
        Ok(())
    }

    fn require_attached(
        &self,
        content_stream: ContentStreamId,
        dimension_space_point: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
    ) -> GraphResult<()> {
        let attached = self
            .state
            .stream(content_stream)?
            .scope(dimension_space_point)
            .is_some_and(|scope| scope.contains(anchor));
        if !attached {
            return Err(GraphError::NotAttached {
                anchor,
                dimension_space_point: dimension_space_point.clone(),
            });
        }
        Ok(())
    }

    fn require_reference(
        &self,
        content_stream: ContentStreamId,
        source: NodeAnchorPoint,
        name: &ReferenceName,
        destination: &NodeAggregateId,
    ) -> GraphResult<()> {
        self.require_in_stream(content_stream, source)?;
        let exists = self
            .state
            .references
            .get(&source)
            .is_some_and(|set| set.get(name).iter().any(|t| &t.destination == destination));
        if !exists {
            return Err(GraphError::ReferenceNotFound {
                source_anchor: source,
                name: name.clone(),
                destination: destination.clone(),
            });
        }
        Ok(())
    }
}

impl ContentGraphReader for GraphTransaction<'_> {
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

impl Drop for GraphTransaction<'_> {
    fn drop(&mut self) {
        if self.committed || self.journal.is_empty() {
            return;
        }
        warn!(
            streams = self.journal.streams.len(),
            scopes = self.journal.scopes.len(),
            nodes = self.journal.nodes.len(),
            "rolling back graph transaction"
        );
        let journal = std::mem::take(&mut self.journal);
        journal.restore(&mut self.state);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::LookupMode;
    use crate::hierarchy::SubtreeTagState;
    use crate::memory::InMemoryContentGraph;
    use cgraph_dimension::{DimensionConfig, DimensionValueConfig, DimensionsConfig};
    use cgraph_types::{NodeTypeName, SerializedPropertyValue};

    const ROOT: NodeAnchorPoint = NodeAnchorPoint::ROOT_EDGE;

    fn agg(s: &str) -> NodeAggregateId {
        NodeAggregateId::try_new(s).unwrap()
    }

    fn en() -> DimensionSpacePoint {
        DimensionSpacePoint::new([("language", "en")])
    }

    fn en_us() -> DimensionSpacePoint {
        DimensionSpacePoint::new([("language", "en_US")])
    }

    fn language_graph() -> InMemoryContentGraph {
        let config = DimensionsConfig {
            dimensions: vec![DimensionConfig::new("language")
                .with_value(
                    "en",
                    DimensionValueConfig::leaf().with_specialization("en_US", DimensionValueConfig::leaf()),
                )
                .with_value("de", DimensionValueConfig::leaf())],
        };
        let variation = InterDimensionalVariationGraph::from_config(&config).unwrap();
        InMemoryContentGraph::new(GraphConfig::default(), Arc::new(variation))
    }

    fn page(id: &str, origin: DimensionSpacePoint) -> NewNode {
        NewNode::new(
            agg(id),
            origin,
            NodeTypeName::try_new("Acme:Page").unwrap(),
            NodeClassification::Regular,
        )
    }

    /// A stream with root → a1 → a2 in `en`.
    fn seeded(graph: &InMemoryContentGraph) -> (ContentStreamId, NodeAnchorPoint, NodeAnchorPoint) {
        let cs = ContentStreamId::new();
        let hash = en().hash();
        let mut tx = graph.begin().unwrap();
        tx.create_stream(cs).unwrap();
        let a1 = tx.create_node(cs, page("a1", en())).unwrap();
        let a2 = tx.create_node(cs, page("a2", en())).unwrap();
        tx.attach(cs, &hash, ROOT, a1, 0, None).unwrap();
        tx.attach(cs, &hash, a1, a2, 0, None).unwrap();
        tx.commit();
        (cs, a1, a2)
    }

    #[test]
    fn anchors_start_at_one() {
        let graph = language_graph();
        let (_, a1, a2) = seeded(&graph);
        assert_eq!(a1, NodeAnchorPoint::new(1));
        assert_eq!(a2, NodeAnchorPoint::new(2));
    }

    #[test]
    fn detach_in_fork_leaves_source_attached() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        let fork = ContentStreamId::new();
        let hash = en().hash();

        let mut tx = graph.begin().unwrap();
        tx.fork_stream(cs, fork).unwrap();
        tx.detach(fork, &hash, a1).unwrap();
        tx.commit();

        let view = graph.snapshot().unwrap();
        assert_eq!(view.children(cs, &hash, ROOT).unwrap(), vec![a1]);
        assert!(view.children(fork, &hash, ROOT).unwrap().is_empty());
        assert!(view.is_reachable(cs, &hash, a1).unwrap());
        assert!(!view.is_reachable(fork, &hash, a1).unwrap());
        assert_eq!(view.stream_source(fork).unwrap(), Some(cs));
    }

    #[test]
    fn cycle_leaves_graph_unchanged() {
        let graph = language_graph();
        let (cs, a1, a2) = seeded(&graph);
        let hash = en().hash();
        let before = graph.snapshot().unwrap().hierarchy_relations(cs).unwrap();

        let mut tx = graph.begin().unwrap();
        let err = tx.move_node(cs, &hash, a1, a2, 0).unwrap_err();
        assert_eq!(err, GraphError::CycleDetected { parent: a2, child: a1 });
        drop(tx);

        assert_eq!(graph.snapshot().unwrap().hierarchy_relations(cs).unwrap(), before);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        {
            let mut tx = graph.begin().unwrap();
            let a3 = tx.create_node(cs, page("a3", en())).unwrap();
            tx.attach(cs, &en().hash(), a1, a3, 0, None).unwrap();
            tx.set_property(cs, a1, "title", &PropertyWrite::set("x", "string")).unwrap();
        }
        let view = graph.snapshot().unwrap();
        assert_eq!(view.node_count(), 2);
        assert_eq!(view.children(cs, &en().hash(), a1).unwrap().len(), 1);
        assert!(view.node(a1).unwrap().properties.is_empty());
        drop(view);

        // The anchor counter is restored as well.
        let mut tx = graph.begin().unwrap();
        assert_eq!(tx.create_node(cs, page("a3", en())).unwrap(), NodeAnchorPoint::new(3));
    }

    #[test]
    fn writes_journal_only_the_tables_they_touch() {
        let graph = language_graph();
        let (cs, _, _) = seeded(&graph);
        let de = DimensionSpacePoint::new([("language", "de")]);
        let mut tx = graph.begin().unwrap();
        let d1 = tx.create_node(cs, page("d1", de.clone())).unwrap();
        tx.attach(cs, &de.hash(), ROOT, d1, 0, None).unwrap();
        tx.commit();

        let (en_scope, variants) = {
            let view = graph.snapshot().unwrap();
            let stream = view.graph_state().stream(cs).unwrap();
            (stream.scope_table(&en().hash()).unwrap(), stream.variants_table())
        };

        let mut tx = graph.begin().unwrap();
        tx.rename(cs, &de.hash(), d1, Some(NodeName::try_new("start").unwrap()))
            .unwrap();
        assert_eq!(tx.journal.scopes.len(), 1);
        assert!(tx.journal.variants.is_empty());
        assert!(tx.journal.streams.is_empty());
        tx.commit();

        let view = graph.snapshot().unwrap();
        let stream = view.graph_state().stream(cs).unwrap();
        assert!(Arc::ptr_eq(&stream.scope_table(&en().hash()).unwrap(), &en_scope));
        assert!(Arc::ptr_eq(&stream.variants_table(), &variants));
    }

    #[test]
    fn rollback_restores_scope_written_before_the_stream_was_dropped() {
        let graph = language_graph();
        let (cs, a1, a2) = seeded(&graph);
        let hash = en().hash();
        {
            let mut tx = graph.begin().unwrap();
            tx.detach(cs, &hash, a2).unwrap();
            tx.drop_stream(cs).unwrap();
        }
        let view = graph.snapshot().unwrap();
        assert_eq!(view.children(cs, &hash, a1).unwrap(), vec![a2]);
    }

    #[test]
    fn duplicate_origin_is_rejected() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        let mut tx = graph.begin().unwrap();
        assert_eq!(
            tx.create_node(cs, page("a1", en())),
            Err(GraphError::DuplicateOrigin {
                aggregate: agg("a1"),
                origin: en().hash(),
                existing: a1,
            })
        );
        // Another origin of the same aggregate is fine.
        assert!(tx.create_node(cs, page("a1", DimensionSpacePoint::new([("language", "de")]))).is_ok());
    }

    #[test]
    fn set_property_in_fork_copies_on_write() {
        let graph = language_graph();
        let (cs, a1, a2) = seeded(&graph);
        let fork = ContentStreamId::new();
        let hash = en().hash();

        let mut tx = graph.begin().unwrap();
        tx.fork_stream(cs, fork).unwrap();
        let copy = tx
            .set_property(fork, a1, "title", &PropertyWrite::set("Forked", "string"))
            .unwrap();
        assert_ne!(copy, a1);
        // A second write hits the now exclusive copy in place.
        let again = tx
            .set_property(fork, copy, "title", &PropertyWrite::set("Again", "string"))
            .unwrap();
        assert_eq!(again, copy);
        tx.commit();

        let view = graph.snapshot().unwrap();
        assert!(view.node(a1).unwrap().properties.is_empty());
        let copied = view.node(copy).unwrap();
        assert_eq!(
            copied.properties.get("title"),
            Some(&SerializedPropertyValue::new("Again", "string"))
        );
        assert_eq!(copied.timestamps.original_created, view.node(a1).unwrap().timestamps.original_created);
        assert_eq!(view.children(fork, &hash, ROOT).unwrap(), vec![copy]);
        assert_eq!(view.children(fork, &hash, copy).unwrap(), vec![a2]);
        assert_eq!(view.children(cs, &hash, ROOT).unwrap(), vec![a1]);
        assert_eq!(view.find_by_aggregate_id(fork, &agg("a1"), &en()).unwrap(), Some(copy));
        assert_eq!(view.find_by_aggregate_id(cs, &agg("a1"), &en()).unwrap(), Some(a1));
    }

    #[test]
    fn unset_removes_property_and_stamps_modification() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        let mut tx = graph.begin().unwrap();
        tx.set_property(cs, a1, "title", &PropertyWrite::set("x", "string")).unwrap();
        tx.set_property(cs, a1, "title", &PropertyWrite::Unset).unwrap();
        let node = tx.node(a1).unwrap();
        assert!(!node.properties.contains("title"));
        assert!(node.timestamps.last_modified.is_some());
    }

    #[test]
    fn fallback_lookup_walks_generalizations() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        let view = graph.snapshot().unwrap();
        assert_eq!(view.find_by_aggregate_id(cs, &agg("a1"), &en_us()).unwrap(), Some(a1));
        assert_eq!(
            view.find_by_aggregate_id_with(cs, &agg("a1"), &en_us(), LookupMode::Strict).unwrap(),
            None
        );
        assert_eq!(
            view.find_by_aggregate_id(cs, &agg("a1"), &DimensionSpacePoint::new([("language", "de")]))
                .unwrap(),
            None
        );
    }

    #[test]
    fn specialization_variant_is_preferred() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        let mut tx = graph.begin().unwrap();
        let variant = tx.create_variant(cs, a1, en_us()).unwrap();
        assert_eq!(tx.find_by_aggregate_id(cs, &agg("a1"), &en_us()).unwrap(), Some(variant));
        assert_eq!(tx.find_by_aggregate_id(cs, &agg("a1"), &en()).unwrap(), Some(a1));
        assert_eq!(tx.variants(cs, &agg("a1")).unwrap().len(), 2);
    }

    #[test]
    fn classification_transitions_are_guarded() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        let mut tx = graph.begin().unwrap();
        tx.change_classification(cs, a1, NodeClassification::Tethered).unwrap();
        assert!(matches!(
            tx.change_classification(cs, a1, NodeClassification::Regular),
            Err(GraphError::Type(_))
        ));
    }

    #[test]
    fn remove_variant_detaches_but_keeps_record() {
        let graph = language_graph();
        let (cs, a1, a2) = seeded(&graph);
        let hash = en().hash();
        let mut tx = graph.begin().unwrap();
        assert_eq!(tx.remove_variant(cs, &agg("a1"), &hash).unwrap(), a1);
        assert!(tx.children(cs, &hash, ROOT).unwrap().is_empty());
        assert!(!tx.is_reachable(cs, &hash, a2).unwrap());
        assert!(tx.node(a1).is_some());
        assert!(matches!(
            tx.remove_variant(cs, &agg("a1"), &hash),
            Err(GraphError::NodeAggregateNotFound { .. })
        ));
    }

    #[test]
    fn move_keeps_explicit_tags_and_picks_up_new_ones() {
        let graph = language_graph();
        let (cs, a1, a2) = seeded(&graph);
        let hash = en().hash();
        let hidden = SubtreeTag::try_new("hidden").unwrap();
        let disabled = SubtreeTag::try_new("disabled").unwrap();

        let mut tx = graph.begin().unwrap();
        let a3 = tx.create_node(cs, page("a3", en())).unwrap();
        tx.attach(cs, &hash, ROOT, a3, 1, None).unwrap();
        tx.tag_subtree(cs, &hash, a2, &hidden).unwrap();
        tx.tag_subtree(cs, &hash, a3, &disabled).unwrap();
        tx.move_node(cs, &hash, a2, a3, 0).unwrap();

        let tags = tx.subtree_tags_for(cs, &hash, a2).unwrap();
        assert_eq!(tags.state(&hidden), Some(SubtreeTagState::Explicit));
        assert_eq!(tags.state(&disabled), Some(SubtreeTagState::Inherited));
        assert!(tx.children(cs, &hash, a1).unwrap().is_empty());
        assert_eq!(tx.parent(cs, &hash, a2).unwrap(), Some(a3));
    }

    #[test]
    fn references_copy_with_shared_node() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        let related = ReferenceName::try_new("related").unwrap();

        let mut tx = graph.begin().unwrap();
        tx.add_reference(cs, a1, related.clone(), 0, ReferenceTarget::new(agg("a2"))).unwrap();
        let fork = ContentStreamId::new();
        tx.fork_stream(cs, fork).unwrap();
        let copy = tx
            .add_reference(fork, a1, related.clone(), 0, ReferenceTarget::new(agg("a9")))
            .unwrap();
        tx.commit();

        let view = graph.snapshot().unwrap();
        assert_eq!(view.references(a1, &related).len(), 1);
        let forked: Vec<_> = view
            .references(copy, &related)
            .into_iter()
            .map(|t| t.destination.to_string())
            .collect();
        assert_eq!(forked, vec!["a9", "a2"]);
        assert_eq!(view.backreferences(cs, &agg("a2")).unwrap().len(), 1);
        assert_eq!(view.backreferences(fork, &agg("a2")).unwrap()[0].node_anchor_point, copy);
    }

    #[test]
    fn removing_missing_reference_fails() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        let mut tx = graph.begin().unwrap();
        let name = ReferenceName::try_new("related").unwrap();
        assert!(matches!(
            tx.remove_reference(cs, a1, &name, &agg("nope")),
            Err(GraphError::ReferenceNotFound { .. })
        ));
    }

    #[test]
    fn attach_requires_anchor_in_stream() {
        let graph = language_graph();
        let (cs, _, _) = seeded(&graph);
        let other = ContentStreamId::new();
        let mut tx = graph.begin().unwrap();
        tx.create_stream(other).unwrap();
        let foreign = tx.create_node(other, page("x", en())).unwrap();
        assert_eq!(
            tx.attach(cs, &en().hash(), ROOT, foreign, 0, None),
            Err(GraphError::AnchorNotInStream { anchor: foreign, content_stream: cs })
        );
        assert_eq!(
            tx.attach(cs, &en().hash(), ROOT, NodeAnchorPoint::new(99), 0, None),
            Err(GraphError::AnchorNotFound(NodeAnchorPoint::new(99)))
        );
    }

    #[test]
    fn garbage_collection_after_drop() {
        let graph = language_graph();
        let (cs, a1, _) = seeded(&graph);
        let fork = ContentStreamId::new();
        let mut tx = graph.begin().unwrap();
        tx.fork_stream(cs, fork).unwrap();
        let copy = tx.set_property(fork, a1, "x", &PropertyWrite::set(1_i64, "int")).unwrap();
        tx.drop_stream(fork).unwrap();
        assert_eq!(tx.collect_garbage(), 1);
        assert!(tx.node(copy).is_none());
        assert!(tx.node(a1).is_some());
        tx.commit();
        assert_eq!(graph.snapshot().unwrap().streams(), vec![cs]);
    }
}
