//! Named, ordered, multi-valued references from a node to node aggregates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cgraph_types::{NodeAggregateId, NodeAnchorPoint, ReferenceName, SerializedPropertyValues};

/// One entry of a reference sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTarget {
    pub destination: NodeAggregateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SerializedPropertyValues>,
}

impl ReferenceTarget {
    pub fn new(destination: NodeAggregateId) -> Self {
        Self {
            destination,
            properties: None,
        }
    }

    pub fn with_properties(mut self, properties: SerializedPropertyValues) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Row view of a reference, as persisted in the `referencerelation` table.
/// The key is `(name, position, node_anchor_point)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRelation {
    pub name: ReferenceName,
    pub position: u32,
    pub node_anchor_point: NodeAnchorPoint,
    pub properties: Option<SerializedPropertyValues>,
    pub destination_node_aggregate_id: NodeAggregateId,
}

/// All outgoing references of one source anchor, grouped by name.
///
/// Positions within a name are the dense indexes of the sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSet(BTreeMap<ReferenceName, Vec<ReferenceTarget>>);

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &ReferenceName) -> &[ReferenceTarget] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &ReferenceName> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any sequence contains `destination`.
    pub fn points_to(&self, destination: &NodeAggregateId) -> bool {
        self.0
            .values()
            .any(|targets| targets.iter().any(|t| &t.destination == destination))
    }

    /// Insert at `position`, shifting later entries right. Positions past the
    /// end append. Returns the position used.
    pub fn insert(&mut self, name: ReferenceName, position: u32, target: ReferenceTarget) -> u32 {
        let targets = self.0.entry(name).or_default();
        let index = (position as usize).min(targets.len());
        targets.insert(index, target);
        index as u32
    }

    /// Remove the first entry pointing to `destination`.
    pub fn remove(
        &mut self,
        name: &ReferenceName,
        destination: &NodeAggregateId,
    ) -> Option<ReferenceTarget> {
        let targets = self.0.get_mut(name)?;
        let index = targets.iter().position(|t| &t.destination == destination)?;
        let removed = targets.remove(index);
        if targets.is_empty() {
            self.0.remove(name);
        }
        Some(removed)
    }

    /// Move the entry pointing to `destination` to `position` (clamped).
    pub fn reorder(
        &mut self,
        name: &ReferenceName,
        destination: &NodeAggregateId,
        position: u32,
    ) -> Option<u32> {
        let targets = self.0.get_mut(name)?;
        let index = targets.iter().position(|t| &t.destination == destination)?;
        let target = targets.remove(index);
        let new_index = (position as usize).min(targets.len());
        targets.insert(new_index, target);
        Some(new_index as u32)
    }

    /// Replace the whole sequence of `name`. An empty sequence removes it.
    pub fn set(&mut self, name: ReferenceName, targets: Vec<ReferenceTarget>) {
        if targets.is_empty() {
            self.0.remove(&name);
        } else {
            self.0.insert(name, targets);
        }
    }

    pub fn relations(&self, source: NodeAnchorPoint) -> Vec<ReferenceRelation> {
        self.0
            .iter()
            .flat_map(|(name, targets)| {
                targets.iter().enumerate().map(move |(position, target)| ReferenceRelation {
                    name: name.clone(),
                    position: position as u32,
                    node_anchor_point: source,
                    properties: target.properties.clone(),
                    destination_node_aggregate_id: target.destination.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgraph_types::PropertyWrite;

    fn name(s: &str) -> ReferenceName {
        ReferenceName::try_new(s).unwrap()
    }

    fn agg(s: &str) -> NodeAggregateId {
        NodeAggregateId::try_new(s).unwrap()
    }

    fn destinations(set: &ReferenceSet, n: &str) -> Vec<String> {
        set.get(&name(n))
            .iter()
            .map(|t| t.destination.to_string())
            .collect()
    }

    #[test]
    fn insert_shifts_right() {
        let mut set = ReferenceSet::new();
        set.insert(name("related"), 0, ReferenceTarget::new(agg("a")));
        set.insert(name("related"), 5, ReferenceTarget::new(agg("b")));
        assert_eq!(set.insert(name("related"), 0, ReferenceTarget::new(agg("c"))), 0);
        assert_eq!(destinations(&set, "related"), vec!["c", "a", "b"]);
    }

    #[test]
    fn remove_and_reorder() {
        let mut set = ReferenceSet::new();
        for (i, d) in ["a", "b", "c"].iter().enumerate() {
            set.insert(name("related"), i as u32, ReferenceTarget::new(agg(d)));
        }
        assert_eq!(set.reorder(&name("related"), &agg("c"), 0), Some(0));
        assert_eq!(destinations(&set, "related"), vec!["c", "a", "b"]);
        assert!(set.remove(&name("related"), &agg("a")).is_some());
        assert_eq!(destinations(&set, "related"), vec!["c", "b"]);
        assert!(set.remove(&name("related"), &agg("zzz")).is_none());
        assert!(set.reorder(&name("other"), &agg("c"), 0).is_none());
    }

    #[test]
    fn names_are_independent_sequences() {
        let mut set = ReferenceSet::new();
        set.insert(name("a"), 0, ReferenceTarget::new(agg("x")));
        set.insert(name("b"), 0, ReferenceTarget::new(agg("y")));
        let rows = set.relations(NodeAnchorPoint::new(7));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.position == 0 && r.node_anchor_point == NodeAnchorPoint::new(7)));
        assert!(set.points_to(&agg("y")));
    }

    #[test]
    fn set_replaces_and_empty_clears() {
        let mut set = ReferenceSet::new();
        set.insert(name("a"), 0, ReferenceTarget::new(agg("x")));
        let mut props = SerializedPropertyValues::new();
        props.apply("weight", &PropertyWrite::set(2_i64, "int"));
        set.set(
            name("a"),
            vec![ReferenceTarget::new(agg("y")).with_properties(props.clone())],
        );
        assert_eq!(destinations(&set, "a"), vec!["y"]);
        assert_eq!(set.relations(NodeAnchorPoint::new(1))[0].properties, Some(props));
        set.set(name("a"), Vec::new());
        assert!(set.is_empty());
    }
}
