//! Per content stream view of the graph.
//!
//! A stream owns its hierarchy scopes and its variant index behind `Arc`s.
//! Forking clones the `Arc`s only; the first write to a shared table goes
//! through [`Arc::make_mut`] and diverges the forked copy from its source.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cgraph_dimension::DimensionSpacePointHash;
use cgraph_types::{ContentStreamId, NodeAggregateId, NodeAnchorPoint};

use crate::hierarchy::HierarchyScope;

/// Which anchor represents each (aggregate, origin) pair in one stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariantIndex {
    by_aggregate: HashMap<NodeAggregateId, BTreeMap<DimensionSpacePointHash, NodeAnchorPoint>>,
    anchors: HashMap<NodeAnchorPoint, (NodeAggregateId, DimensionSpacePointHash)>,
}

impl VariantIndex {
    pub fn get(
        &self,
        aggregate: &NodeAggregateId,
        origin: &DimensionSpacePointHash,
    ) -> Option<NodeAnchorPoint> {
        self.by_aggregate.get(aggregate)?.get(origin).copied()
    }

    /// All variants of `aggregate`, ordered by origin hash.
    pub fn variants(&self, aggregate: &NodeAggregateId) -> Vec<(DimensionSpacePointHash, NodeAnchorPoint)> {
        self.by_aggregate
            .get(aggregate)
            .map(|v| v.iter().map(|(h, a)| (h.clone(), *a)).collect())
            .unwrap_or_default()
    }

    pub fn contains_anchor(&self, anchor: NodeAnchorPoint) -> bool {
        self.anchors.contains_key(&anchor)
    }

    pub fn owner(&self, anchor: NodeAnchorPoint) -> Option<&(NodeAggregateId, DimensionSpacePointHash)> {
        self.anchors.get(&anchor)
    }

    pub fn anchors(&self) -> impl Iterator<Item = NodeAnchorPoint> + '_ {
        self.anchors.keys().copied()
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &NodeAggregateId> {
        self.by_aggregate.keys()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub(crate) fn insert(
        &mut self,
        aggregate: NodeAggregateId,
        origin: DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
    ) {
        self.anchors.insert(anchor, (aggregate.clone(), origin.clone()));
        self.by_aggregate.entry(aggregate).or_default().insert(origin, anchor);
    }

    pub(crate) fn remove(
        &mut self,
        aggregate: &NodeAggregateId,
        origin: &DimensionSpacePointHash,
    ) -> Option<NodeAnchorPoint> {
        let variants = self.by_aggregate.get_mut(aggregate)?;
        let anchor = variants.remove(origin)?;
        if variants.is_empty() {
            self.by_aggregate.remove(aggregate);
        }
        self.anchors.remove(&anchor);
        Some(anchor)
    }

    /// Point the variant held by `old` at `new`.
    pub(crate) fn replace(&mut self, old: NodeAnchorPoint, new: NodeAnchorPoint) {
        if let Some((aggregate, origin)) = self.anchors.remove(&old) {
            if let Some(slot) = self
                .by_aggregate
                .get_mut(&aggregate)
                .and_then(|v| v.get_mut(&origin))
            {
                *slot = new;
            }
            self.anchors.insert(new, (aggregate, origin));
        }
    }
}

/// The graph data of one content stream.
#[derive(Clone, Debug, Default)]
pub struct StreamGraph {
    source: Option<ContentStreamId>,
    scopes: HashMap<DimensionSpacePointHash, Arc<HierarchyScope>>,
    variants: Arc<VariantIndex>,
}

impl StreamGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fork of this stream, sharing every table until written to.
    pub fn fork(&self, source: ContentStreamId) -> Self {
        Self {
            source: Some(source),
            scopes: self.scopes.clone(),
            variants: Arc::clone(&self.variants),
        }
    }

    pub fn source(&self) -> Option<ContentStreamId> {
        self.source
    }

    pub fn variants(&self) -> &VariantIndex {
        &self.variants
    }

    pub(crate) fn variants_mut(&mut self) -> &mut VariantIndex {
        Arc::make_mut(&mut self.variants)
    }

    pub(crate) fn variants_table(&self) -> Arc<VariantIndex> {
        Arc::clone(&self.variants)
    }

    pub(crate) fn restore_variants(&mut self, variants: Arc<VariantIndex>) {
        self.variants = variants;
    }

    pub(crate) fn scope_table(&self, hash: &DimensionSpacePointHash) -> Option<Arc<HierarchyScope>> {
        self.scopes.get(hash).cloned()
    }

    pub(crate) fn restore_scope(&mut self, hash: DimensionSpacePointHash, scope: Option<Arc<HierarchyScope>>) {
        match scope {
            Some(scope) => {
                self.scopes.insert(hash, scope);
            }
            None => {
                self.scopes.remove(&hash);
            }
        }
    }

    pub fn scope(&self, hash: &DimensionSpacePointHash) -> Option<&HierarchyScope> {
        self.scopes.get(hash).map(Arc::as_ref)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &HierarchyScope> {
        self.scopes.values().map(Arc::as_ref)
    }

    pub(crate) fn scope_mut(&mut self, hash: &DimensionSpacePointHash) -> &mut HierarchyScope {
        let scope = self
            .scopes
            .entry(hash.clone())
            .or_insert_with(|| Arc::new(HierarchyScope::new(hash.clone())));
        Arc::make_mut(scope)
    }

    /// Scopes in which `anchor` appears in any edge.
    pub(crate) fn scopes_touching(&self, anchor: NodeAnchorPoint) -> Vec<DimensionSpacePointHash> {
        self.scopes
            .iter()
            .filter(|(_, scope)| scope.touches(anchor))
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    /// Whether `anchor` is a variant of this stream or appears in any of its
    /// edges.
    pub fn uses_anchor(&self, anchor: NodeAnchorPoint) -> bool {
        self.variants.contains_anchor(anchor) || self.scopes.values().any(|s| s.touches(anchor))
    }

    /// Whether both streams still share the same table for `hash`.
    pub fn shares_scope_with(&self, other: &StreamGraph, hash: &DimensionSpacePointHash) -> bool {
        match (self.scopes.get(hash), other.scopes.get(hash)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn shares_variants_with(&self, other: &StreamGraph) -> bool {
        Arc::ptr_eq(&self.variants, &other.variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PositionPolicy;
    use cgraph_dimension::DimensionSpacePoint;

    fn agg(s: &str) -> NodeAggregateId {
        NodeAggregateId::try_new(s).unwrap()
    }

    #[test]
    fn variant_index_round_trip() {
        let en = DimensionSpacePoint::new([("language", "en")]).hash();
        let mut index = VariantIndex::default();
        index.insert(agg("a1"), en.clone(), NodeAnchorPoint::new(1));
        assert_eq!(index.get(&agg("a1"), &en), Some(NodeAnchorPoint::new(1)));
        index.replace(NodeAnchorPoint::new(1), NodeAnchorPoint::new(5));
        assert_eq!(index.get(&agg("a1"), &en), Some(NodeAnchorPoint::new(5)));
        assert!(!index.contains_anchor(NodeAnchorPoint::new(1)));
        assert_eq!(index.remove(&agg("a1"), &en), Some(NodeAnchorPoint::new(5)));
        assert!(index.is_empty());
    }

    #[test]
    fn fork_shares_until_written() {
        let hash = DimensionSpacePoint::default_point().hash();
        let source_id = ContentStreamId::new();
        let mut source = StreamGraph::new();
        source
            .scope_mut(&hash)
            .attach(NodeAnchorPoint::ROOT_EDGE, NodeAnchorPoint::new(1), 0, None, PositionPolicy::ShiftRight)
            .unwrap();

        let mut fork = source.fork(source_id);
        assert_eq!(fork.source(), Some(source_id));
        assert!(fork.shares_scope_with(&source, &hash));
        assert!(fork.shares_variants_with(&source));

        fork.scope_mut(&hash).detach(NodeAnchorPoint::new(1)).unwrap();
        assert!(!fork.shares_scope_with(&source, &hash));
        assert!(source.scope(&hash).unwrap().contains(NodeAnchorPoint::new(1)));
        assert!(!fork.scope(&hash).unwrap().contains(NodeAnchorPoint::new(1)));
    }
}
