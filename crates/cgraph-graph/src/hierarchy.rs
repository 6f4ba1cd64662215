//! Parent/child edges of one (content stream, dimension space point) scope.
//!
//! A [`HierarchyScope`] holds the edges of a single scope. Within a scope the
//! edges form a forest: each child has at most one parent, sibling order is a
//! dense sequence of positions, and no anchor is its own ancestor. Root nodes
//! hang below [`NodeAnchorPoint::ROOT_EDGE`].
//!
//! Detaching an edge leaves the edges below it in place. Such subtrees are
//! unreachable from the root but can be re-attached as a whole.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use cgraph_dimension::DimensionSpacePointHash;
use cgraph_types::{ContentStreamId, NodeAnchorPoint, NodeName, SubtreeTag};

use crate::config::PositionPolicy;
use crate::error::{GraphError, GraphResult};

/// Whether a tag was set on the edge itself or inherited from an ancestor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubtreeTagState {
    Explicit,
    Inherited,
}

/// The subtree tags of one hierarchy edge.
///
/// Serialized as a JSON object in which explicit tags map to `true` and
/// inherited tags map to `null`, which is the format of the `subtreetags`
/// column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<SubtreeTag, Option<bool>>",
    into = "BTreeMap<SubtreeTag, Option<bool>>"
)]
pub struct SubtreeTags(BTreeMap<SubtreeTag, SubtreeTagState>);

impl SubtreeTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tag: &SubtreeTag) -> bool {
        self.0.contains_key(tag)
    }

    pub fn state(&self, tag: &SubtreeTag) -> Option<SubtreeTagState> {
        self.0.get(tag).copied()
    }

    pub fn is_explicit(&self, tag: &SubtreeTag) -> bool {
        self.state(tag) == Some(SubtreeTagState::Explicit)
    }

    /// All effective tags, explicit and inherited.
    pub fn tags(&self) -> impl Iterator<Item = &SubtreeTag> {
        self.0.keys()
    }

    pub fn explicit(&self) -> impl Iterator<Item = &SubtreeTag> {
        self.0
            .iter()
            .filter(|(_, s)| **s == SubtreeTagState::Explicit)
            .map(|(t, _)| t)
    }

    pub fn inherited(&self) -> impl Iterator<Item = &SubtreeTag> {
        self.0
            .iter()
            .filter(|(_, s)| **s == SubtreeTagState::Inherited)
            .map(|(t, _)| t)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    fn set_explicit(&mut self, tag: SubtreeTag) {
        self.0.insert(tag, SubtreeTagState::Explicit);
    }

    fn remove(&mut self, tag: &SubtreeTag) {
        self.0.remove(tag);
    }

    /// The tags of a child of an edge carrying `parent`: own explicit tags
    /// win, every other effective tag of the parent is inherited.
    pub fn with_inherited_from(&self, parent: &SubtreeTags) -> SubtreeTags {
        let mut tags: BTreeMap<SubtreeTag, SubtreeTagState> = self
            .explicit()
            .map(|t| (t.clone(), SubtreeTagState::Explicit))
            .collect();
        for tag in parent.tags() {
            tags.entry(tag.clone()).or_insert(SubtreeTagState::Inherited);
        }
        SubtreeTags(tags)
    }
}

impl From<BTreeMap<SubtreeTag, Option<bool>>> for SubtreeTags {
    fn from(raw: BTreeMap<SubtreeTag, Option<bool>>) -> Self {
        Self(
            raw.into_iter()
                .filter_map(|(tag, state)| match state {
                    Some(true) => Some((tag, SubtreeTagState::Explicit)),
                    None => Some((tag, SubtreeTagState::Inherited)),
                    Some(false) => None,
                })
                .collect(),
        )
    }
}

impl From<SubtreeTags> for BTreeMap<SubtreeTag, Option<bool>> {
    fn from(tags: SubtreeTags) -> Self {
        tags.0
            .into_iter()
            .map(|(tag, state)| match state {
                SubtreeTagState::Explicit => (tag, Some(true)),
                SubtreeTagState::Inherited => (tag, None),
            })
            .collect()
    }
}

/// The stored part of a hierarchy edge, keyed by its child anchor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEdge {
    pub parent: NodeAnchorPoint,
    pub name: Option<NodeName>,
    pub subtree_tags: SubtreeTags,
}

/// Row view of a hierarchy edge, as persisted in the `hierarchyrelation`
/// table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyRelation {
    pub name: Option<NodeName>,
    pub position: u32,
    pub content_stream_id: ContentStreamId,
    pub dimension_space_point_hash: DimensionSpacePointHash,
    pub parent_anchor: NodeAnchorPoint,
    pub child_anchor: NodeAnchorPoint,
    pub subtree_tags: SubtreeTags,
}

/// All hierarchy edges of one (content stream, dimension space point) scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HierarchyScope {
    dimension_space_point_hash: DimensionSpacePointHash,
    /// child → edge
    edges: HashMap<NodeAnchorPoint, HierarchyEdge>,
    /// parent → children in position order
    children: HashMap<NodeAnchorPoint, Vec<NodeAnchorPoint>>,
}

impl HierarchyScope {
    pub fn new(dimension_space_point_hash: DimensionSpacePointHash) -> Self {
        Self {
            dimension_space_point_hash,
            edges: HashMap::new(),
            children: HashMap::new(),
        }
    }

    pub fn dimension_space_point_hash(&self) -> &DimensionSpacePointHash {
        &self.dimension_space_point_hash
    }

    /// Number of edges in the scope.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge(&self, child: NodeAnchorPoint) -> Option<&HierarchyEdge> {
        self.edges.get(&child)
    }

    /// Whether `anchor` has an incoming edge in this scope.
    pub fn contains(&self, anchor: NodeAnchorPoint) -> bool {
        self.edges.contains_key(&anchor)
    }

    /// Whether `anchor` appears in any edge, as child or as parent.
    pub fn touches(&self, anchor: NodeAnchorPoint) -> bool {
        self.edges.contains_key(&anchor) || self.children.contains_key(&anchor)
    }

    /// Every anchor appearing in an edge of this scope, parents included.
    pub fn anchors(&self) -> impl Iterator<Item = NodeAnchorPoint> + '_ {
        self.edges
            .iter()
            .flat_map(|(child, edge)| [*child, edge.parent])
            .filter(|anchor| !anchor.is_root_edge())
    }

    pub fn parent_of(&self, child: NodeAnchorPoint) -> Option<NodeAnchorPoint> {
        self.edges.get(&child).map(|e| e.parent)
    }

    pub fn children_of(&self, parent: NodeAnchorPoint) -> &[NodeAnchorPoint] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn position_of(&self, child: NodeAnchorPoint) -> Option<u32> {
        let parent = self.parent_of(child)?;
        self.children_of(parent)
            .iter()
            .position(|c| *c == child)
            .map(|p| p as u32)
    }

    /// Ancestors of `anchor`, closest first, excluding the root edge.
    pub fn ancestors(&self, anchor: NodeAnchorPoint) -> Vec<NodeAnchorPoint> {
        let mut result = Vec::new();
        let mut current = anchor;
        while let Some(parent) = self.parent_of(current) {
            if parent.is_root_edge() || result.len() > self.edges.len() {
                break;
            }
            result.push(parent);
            current = parent;
        }
        result
    }

    /// All anchors below `anchor`, breadth first.
    pub fn descendants(&self, anchor: NodeAnchorPoint) -> Vec<NodeAnchorPoint> {
        let mut result = Vec::new();
        let mut queue = VecDeque::from([anchor]);
        while let Some(current) = queue.pop_front() {
            for child in self.children_of(current) {
                result.push(*child);
                queue.push_back(*child);
            }
        }
        result
    }

    /// Whether the chain of parents from `anchor` ends at the root edge.
    pub fn is_reachable(&self, anchor: NodeAnchorPoint) -> bool {
        let mut current = anchor;
        for _ in 0..=self.edges.len() {
            match self.parent_of(current) {
                Some(parent) if parent.is_root_edge() => return true,
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// Whether `ancestor` equals `anchor` or lies on its parent chain.
    fn is_self_or_ancestor(&self, ancestor: NodeAnchorPoint, anchor: NodeAnchorPoint) -> bool {
        let mut current = anchor;
        for _ in 0..=self.edges.len() {
            if current == ancestor {
                return true;
            }
            match self.parent_of(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// Effective tags of `anchor`'s edge; empty for the root edge.
    pub fn subtree_tags(&self, anchor: NodeAnchorPoint) -> SubtreeTags {
        self.edges
            .get(&anchor)
            .map(|e| e.subtree_tags.clone())
            .unwrap_or_default()
    }

    /// Add the edge `parent → child` at `position`. Returns the position the
    /// child actually received.
    pub fn attach(
        &mut self,
        parent: NodeAnchorPoint,
        child: NodeAnchorPoint,
        position: u32,
        name: Option<NodeName>,
        policy: PositionPolicy,
    ) -> GraphResult<u32> {
        self.attach_with_tags(parent, child, position, name, &SubtreeTags::new(), policy)
    }

    /// Like [`attach`](Self::attach), carrying over the explicit tags of
    /// `tags`. Used when an edge is moved to a new parent.
    pub fn attach_with_tags(
        &mut self,
        parent: NodeAnchorPoint,
        child: NodeAnchorPoint,
        position: u32,
        name: Option<NodeName>,
        tags: &SubtreeTags,
        policy: PositionPolicy,
    ) -> GraphResult<u32> {
        if child.is_root_edge() || parent == child {
            return Err(GraphError::CycleDetected { parent, child });
        }
        if let Some(existing) = self.edges.get(&child) {
            return Err(GraphError::AlreadyAttached {
                child,
                parent: existing.parent,
            });
        }
        if !parent.is_root_edge() && !self.edges.contains_key(&parent) {
            return Err(GraphError::NotAttached {
                anchor: parent,
                dimension_space_point: self.dimension_space_point_hash.clone(),
            });
        }
        if self.is_self_or_ancestor(child, parent) {
            return Err(GraphError::CycleDetected { parent, child });
        }

        let siblings = self.children.entry(parent).or_default();
        let requested = position as usize;
        let index = match policy {
            PositionPolicy::ShiftRight => requested.min(siblings.len()),
            PositionPolicy::Reject if requested < siblings.len() => {
                return Err(GraphError::DuplicatePosition { parent, position });
            }
            PositionPolicy::Reject => siblings.len(),
        };
        siblings.insert(index, child);

        let inherited = self.subtree_tags(parent);
        self.edges.insert(
            child,
            HierarchyEdge {
                parent,
                name,
                subtree_tags: tags.with_inherited_from(&inherited),
            },
        );
        // A re-attached subtree picks up the tags of its new ancestors.
        self.propagate_tags(child);
        Ok(index as u32)
    }

    /// Remove the incoming edge of `child`.
    pub fn detach(&mut self, child: NodeAnchorPoint) -> GraphResult<HierarchyEdge> {
        let edge = self.edges.remove(&child).ok_or_else(|| GraphError::NotAttached {
            anchor: child,
            dimension_space_point: self.dimension_space_point_hash.clone(),
        })?;
        if let Some(siblings) = self.children.get_mut(&edge.parent) {
            siblings.retain(|c| *c != child);
            if siblings.is_empty() {
                self.children.remove(&edge.parent);
            }
        }
        Ok(edge)
    }

    /// Move `child` to `position` among its siblings below `parent`.
    pub fn reorder(
        &mut self,
        parent: NodeAnchorPoint,
        child: NodeAnchorPoint,
        position: u32,
    ) -> GraphResult<u32> {
        if self.parent_of(child) != Some(parent) {
            return Err(GraphError::NotChildOf { parent, child });
        }
        let siblings = self.children.entry(parent).or_default();
        siblings.retain(|c| *c != child);
        let index = (position as usize).min(siblings.len());
        siblings.insert(index, child);
        Ok(index as u32)
    }

    /// Set `tag` explicitly on `anchor` and let its subtree inherit it.
    /// Returns `false` if the tag was already explicit.
    pub fn tag(&mut self, anchor: NodeAnchorPoint, tag: &SubtreeTag) -> GraphResult<bool> {
        let edge = self.edge_mut(anchor)?;
        if edge.subtree_tags.is_explicit(tag) {
            return Ok(false);
        }
        edge.subtree_tags.set_explicit(tag.clone());
        self.propagate_tags(anchor);
        Ok(true)
    }

    /// Remove the explicit `tag` from `anchor`. Descendants keep it only if
    /// they carry it explicitly or another ancestor still does.
    pub fn untag(&mut self, anchor: NodeAnchorPoint, tag: &SubtreeTag) -> GraphResult<bool> {
        let parent = self.edge_mut(anchor)?.parent;
        let parent_tags = self.subtree_tags(parent);
        let edge = self.edge_mut(anchor)?;
        if !edge.subtree_tags.is_explicit(tag) {
            return Ok(false);
        }
        edge.subtree_tags.remove(tag);
        edge.subtree_tags = edge.subtree_tags.with_inherited_from(&parent_tags);
        self.propagate_tags(anchor);
        Ok(true)
    }

    /// Rename the edge of `anchor`.
    pub fn rename(&mut self, anchor: NodeAnchorPoint, name: Option<NodeName>) -> GraphResult<()> {
        self.edge_mut(anchor)?.name = name;
        Ok(())
    }

    /// Swap `old` for `new` in every edge, keeping positions and tags.
    pub fn replace_anchor(&mut self, old: NodeAnchorPoint, new: NodeAnchorPoint) {
        if let Some(edge) = self.edges.remove(&old) {
            if let Some(siblings) = self.children.get_mut(&edge.parent) {
                for sibling in siblings.iter_mut().filter(|s| **s == old) {
                    *sibling = new;
                }
            }
            self.edges.insert(new, edge);
        }
        if let Some(children) = self.children.remove(&old) {
            for child in &children {
                if let Some(edge) = self.edges.get_mut(child) {
                    edge.parent = new;
                }
            }
            self.children.insert(new, children);
        }
    }

    /// Every edge as a row, ordered by parent and position.
    pub fn relations(&self, content_stream_id: ContentStreamId) -> Vec<HierarchyRelation> {
        let mut parents: Vec<_> = self.children.keys().copied().collect();
        parents.sort();
        let mut rows = Vec::with_capacity(self.edges.len());
        for parent in parents {
            for (position, child) in self.children_of(parent).iter().enumerate() {
                if let Some(edge) = self.edges.get(child) {
                    rows.push(HierarchyRelation {
                        name: edge.name.clone(),
                        position: position as u32,
                        content_stream_id,
                        dimension_space_point_hash: self.dimension_space_point_hash.clone(),
                        parent_anchor: parent,
                        child_anchor: *child,
                        subtree_tags: edge.subtree_tags.clone(),
                    });
                }
            }
        }
        rows
    }

    /// Check the forest invariants: edge and sibling indexes agree, no
    /// duplicate siblings, and no anchor is its own ancestor.
    pub fn is_consistent(&self) -> bool {
        let mut listed = HashSet::new();
        for (parent, children) in &self.children {
            for child in children {
                if !listed.insert(*child) {
                    return false;
                }
                match self.edges.get(child) {
                    Some(edge) if edge.parent == *parent => {}
                    _ => return false,
                }
            }
        }
        if listed.len() != self.edges.len() {
            return false;
        }
        self.edges.keys().all(|anchor| {
            let mut current = *anchor;
            for _ in 0..=self.edges.len() {
                match self.parent_of(current) {
                    Some(parent) if parent == *anchor => return false,
                    Some(parent) => current = parent,
                    None => return true,
                }
            }
            false
        })
    }

    fn edge_mut(&mut self, anchor: NodeAnchorPoint) -> GraphResult<&mut HierarchyEdge> {
        let hash = &self.dimension_space_point_hash;
        self.edges
            .get_mut(&anchor)
            .ok_or_else(|| GraphError::NotAttached {
                anchor,
                dimension_space_point: hash.clone(),
            })
    }

    /// Recompute inherited tags for everything below `from`.
    fn propagate_tags(&mut self, from: NodeAnchorPoint) {
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            let tags = self.subtree_tags(current);
            if let Some(children) = self.children.get(&current) {
                for child in children {
                    if let Some(edge) = self.edges.get_mut(child) {
                        edge.subtree_tags = edge.subtree_tags.with_inherited_from(&tags);
                    }
                    queue.push_back(*child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgraph_dimension::DimensionSpacePoint;
    use proptest::prelude::*;

    const ROOT: NodeAnchorPoint = NodeAnchorPoint::ROOT_EDGE;

    fn a(n: u64) -> NodeAnchorPoint {
        NodeAnchorPoint::new(n)
    }

    fn tag(name: &str) -> SubtreeTag {
        SubtreeTag::try_new(name).unwrap()
    }

    fn scope() -> HierarchyScope {
        HierarchyScope::new(DimensionSpacePoint::new([("language", "en")]).hash())
    }

    /// root → 1 → {2, 3}, 2 → 4
    fn sample() -> HierarchyScope {
        let mut s = scope();
        s.attach(ROOT, a(1), 0, None, PositionPolicy::ShiftRight).unwrap();
        s.attach(a(1), a(2), 0, None, PositionPolicy::ShiftRight).unwrap();
        s.attach(a(1), a(3), 1, None, PositionPolicy::ShiftRight).unwrap();
        s.attach(a(2), a(4), 0, None, PositionPolicy::ShiftRight).unwrap();
        s
    }

    #[test]
    fn attach_builds_ordered_children() {
        let s = sample();
        assert_eq!(s.children_of(a(1)), &[a(2), a(3)]);
        assert_eq!(s.parent_of(a(4)), Some(a(2)));
        assert_eq!(s.ancestors(a(4)), vec![a(2), a(1)]);
        assert!(s.is_reachable(a(4)));
        assert!(s.is_consistent());
    }

    #[test]
    fn shift_right_inserts_like_an_array() {
        let mut s = sample();
        let pos = s.attach(a(1), a(5), 0, None, PositionPolicy::ShiftRight).unwrap();
        assert_eq!(pos, 0);
        assert_eq!(s.children_of(a(1)), &[a(5), a(2), a(3)]);
        assert_eq!(s.position_of(a(3)), Some(2));
    }

    #[test]
    fn position_past_end_appends() {
        let mut s = sample();
        let pos = s.attach(a(1), a(5), 99, None, PositionPolicy::ShiftRight).unwrap();
        assert_eq!(pos, 2);
    }

    #[test]
    fn reject_policy_refuses_taken_slot() {
        let mut s = sample();
        let err = s.attach(a(1), a(5), 1, None, PositionPolicy::Reject).unwrap_err();
        assert_eq!(err, GraphError::DuplicatePosition { parent: a(1), position: 1 });
        assert_eq!(s.attach(a(1), a(5), 2, None, PositionPolicy::Reject).unwrap(), 2);
    }

    #[test]
    fn attaching_below_own_descendant_is_a_cycle() {
        let mut s = sample();
        // Detach 2 (keeping 2 → 4) and try to hang it below 4.
        s.detach(a(2)).unwrap();
        let before = s.clone();
        let err = s.attach(a(4), a(2), 0, None, PositionPolicy::ShiftRight).unwrap_err();
        assert_eq!(err, GraphError::CycleDetected { parent: a(4), child: a(2) });
        assert_eq!(s, before);
    }

    #[test]
    fn attaching_to_self_is_a_cycle() {
        let mut s = sample();
        s.detach(a(3)).unwrap();
        assert!(matches!(
            s.attach(a(3), a(3), 0, None, PositionPolicy::ShiftRight),
            Err(GraphError::CycleDetected { .. })
        ));
    }

    #[test]
    fn second_parent_is_rejected() {
        let mut s = sample();
        assert_eq!(
            s.attach(a(3), a(4), 0, None, PositionPolicy::ShiftRight),
            Err(GraphError::AlreadyAttached { child: a(4), parent: a(2) })
        );
    }

    #[test]
    fn parent_must_be_in_scope() {
        let mut s = sample();
        assert!(matches!(
            s.attach(a(42), a(5), 0, None, PositionPolicy::ShiftRight),
            Err(GraphError::NotAttached { .. })
        ));
    }

    #[test]
    fn detach_orphans_but_keeps_subtree() {
        let mut s = sample();
        let edge = s.detach(a(2)).unwrap();
        assert_eq!(edge.parent, a(1));
        assert_eq!(s.children_of(a(1)), &[a(3)]);
        assert!(!s.is_reachable(a(4)));
        assert_eq!(s.parent_of(a(4)), Some(a(2)));
        assert!(s.is_consistent());
        assert!(matches!(s.detach(a(2)), Err(GraphError::NotAttached { .. })));
    }

    #[test]
    fn reorder_moves_within_siblings() {
        let mut s = sample();
        s.attach(a(1), a(5), 2, None, PositionPolicy::ShiftRight).unwrap();
        assert_eq!(s.reorder(a(1), a(5), 0).unwrap(), 0);
        assert_eq!(s.children_of(a(1)), &[a(5), a(2), a(3)]);
        assert_eq!(s.reorder(a(1), a(5), 10).unwrap(), 2);
        assert_eq!(s.children_of(a(1)), &[a(2), a(3), a(5)]);
        assert_eq!(s.reorder(a(2), a(5), 0), Err(GraphError::NotChildOf { parent: a(2), child: a(5) }));
    }

    #[test]
    fn tags_are_inherited_by_descendants() {
        let mut s = sample();
        assert!(s.tag(a(2), &tag("disabled")).unwrap());
        assert!(s.subtree_tags(a(2)).is_explicit(&tag("disabled")));
        assert_eq!(
            s.subtree_tags(a(4)).state(&tag("disabled")),
            Some(SubtreeTagState::Inherited)
        );
        assert!(!s.subtree_tags(a(3)).contains(&tag("disabled")));
        assert!(!s.tag(a(2), &tag("disabled")).unwrap());
    }

    #[test]
    fn explicit_descendant_tag_survives_untag() {
        let mut s = sample();
        s.tag(a(1), &tag("disabled")).unwrap();
        s.tag(a(2), &tag("disabled")).unwrap();
        assert!(s.untag(a(1), &tag("disabled")).unwrap());
        assert!(!s.subtree_tags(a(3)).contains(&tag("disabled")));
        assert!(s.subtree_tags(a(2)).is_explicit(&tag("disabled")));
        assert_eq!(
            s.subtree_tags(a(4)).state(&tag("disabled")),
            Some(SubtreeTagState::Inherited)
        );
    }

    #[test]
    fn untag_keeps_tag_inherited_from_above() {
        let mut s = sample();
        s.tag(a(1), &tag("disabled")).unwrap();
        s.tag(a(2), &tag("disabled")).unwrap();
        s.untag(a(2), &tag("disabled")).unwrap();
        assert_eq!(
            s.subtree_tags(a(2)).state(&tag("disabled")),
            Some(SubtreeTagState::Inherited)
        );
        assert!(!s.untag(a(2), &tag("disabled")).unwrap());
    }

    #[test]
    fn moved_subtree_picks_up_new_tags() {
        let mut s = sample();
        s.tag(a(3), &tag("hidden")).unwrap();
        s.detach(a(2)).unwrap();
        s.attach(a(3), a(2), 0, None, PositionPolicy::ShiftRight).unwrap();
        assert!(s.subtree_tags(a(4)).contains(&tag("hidden")));
    }

    #[test]
    fn replace_anchor_rewires_both_directions() {
        let mut s = sample();
        s.replace_anchor(a(2), a(9));
        assert_eq!(s.children_of(a(1)), &[a(9), a(3)]);
        assert_eq!(s.parent_of(a(4)), Some(a(9)));
        assert!(!s.touches(a(2)));
        assert!(s.is_consistent());
    }

    #[test]
    fn relations_carry_positions() {
        let s = sample();
        let cs = ContentStreamId::new();
        let rows = s.relations(cs);
        assert_eq!(rows.len(), 4);
        let row = rows.iter().find(|r| r.child_anchor == a(3)).unwrap();
        assert_eq!(row.position, 1);
        assert_eq!(row.parent_anchor, a(1));
        assert_eq!(row.content_stream_id, cs);
    }

    #[test]
    fn subtree_tags_json_format() {
        let mut s = sample();
        s.tag(a(1), &tag("disabled")).unwrap();
        assert_eq!(s.subtree_tags(a(1)).to_json(), r#"{"disabled":true}"#);
        assert_eq!(s.subtree_tags(a(2)).to_json(), r#"{"disabled":null}"#);
        assert_eq!(SubtreeTags::new().to_json(), "{}");
        let parsed: SubtreeTags = serde_json::from_str(r#"{"disabled":null,"x":true}"#).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.is_explicit(&tag("x")));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Attach { parent: u64, child: u64, position: u32 },
        Detach { child: u64 },
        Reorder { child: u64, position: u32 },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..8, 1u64..8, 0u32..6).prop_map(|(parent, child, position)| Op::Attach { parent, child, position }),
            (1u64..8).prop_map(|child| Op::Detach { child }),
            (1u64..8, 0u32..6).prop_map(|(child, position)| Op::Reorder { child, position }),
        ]
    }

    proptest! {
        #[test]
        fn random_operations_keep_the_forest(ops in proptest::collection::vec(op(), 1..60)) {
            let mut s = scope();
            for op in ops {
                let before = s.clone();
                let result = match op {
                    Op::Attach { parent, child, position } => s
                        .attach(a(parent), a(child), position, None, PositionPolicy::ShiftRight)
                        .map(|_| ()),
                    Op::Detach { child } => s.detach(a(child)).map(|_| ()),
                    Op::Reorder { child, position } => match s.parent_of(a(child)) {
                        Some(parent) => s.reorder(parent, a(child), position).map(|_| ()),
                        None => Ok(()),
                    },
                };
                if result.is_err() {
                    prop_assert_eq!(&s, &before);
                }
                prop_assert!(s.is_consistent());
                for anchor in 1..8u64 {
                    prop_assert!(!s.ancestors(a(anchor)).contains(&a(anchor)));
                }
            }
        }
    }
}
