//! Graph mutations per event type.
//!
//! Every handler runs inside the caller's [`GraphTransaction`]; returning an
//! error leaves the transaction to roll back.

use std::collections::BTreeMap;

use cgraph_dimension::{
    DimensionSpacePoint, DimensionSpacePointHash, DimensionSpacePointRegistry, VariantRelation,
};
use cgraph_graph::{ContentGraphReader, GraphError, GraphTransaction, LookupMode, NewNode, ReferenceTarget};
use cgraph_types::{
    ContentStreamId, NodeAggregateId, NodeAnchorPoint, NodeClassification, NodeName, NodeTypeName,
    PropertyWrite, SerializedPropertyValues,
};

use crate::error::{ProjectionError, ProjectionResult};
use crate::event::{ContentGraphEvent, SerializedReference};

pub(crate) struct EventContext<'t, 'g> {
    pub tx: &'t mut GraphTransaction<'g>,
    pub points: &'t DimensionSpacePointRegistry,
    pub content_stream: ContentStreamId,
}

pub(crate) fn apply_event(cx: &mut EventContext<'_, '_>, event: &ContentGraphEvent) -> ProjectionResult<()> {
    use ContentGraphEvent as E;

    let cs = cx.content_stream;
    match event {
        E::ContentStreamWasCreated => cx.tx.create_stream(cs)?,
        E::ContentStreamWasForked {
            source_content_stream_id,
        } => cx.tx.fork_stream(*source_content_stream_id, cs)?,
        // Stream table only.
        E::ContentStreamWasRemoved
        | E::ContentStreamRebaseStarted
        | E::ContentStreamWasRebased
        | E::ContentStreamRebaseFailed => {}

        E::RootNodeAggregateWithNodeWasCreated {
            node_aggregate_id,
            node_type_name,
            covered_dimension_space_points,
        } => cx.create_root_node(node_aggregate_id, node_type_name, covered_dimension_space_points)?,
        E::NodeAggregateWithNodeWasCreated {
            node_aggregate_id,
            node_type_name,
            origin_dimension_space_point,
            covered_dimension_space_points,
            parent_node_aggregate_id,
            node_name,
            succeeding_sibling_node_aggregate_id,
            initial_property_values,
            node_aggregate_classification,
        } => cx.create_node(NodeCreation {
            aggregate: node_aggregate_id,
            node_type: node_type_name,
            origin: origin_dimension_space_point,
            coverage: covered_dimension_space_points,
            parent: parent_node_aggregate_id,
            name: node_name.as_ref(),
            succeeding_sibling: succeeding_sibling_node_aggregate_id.as_ref(),
            properties: initial_property_values,
            classification: *node_aggregate_classification,
        })?,
        E::NodePropertiesWereSet {
            node_aggregate_id,
            origin_dimension_space_point,
            property_values,
        } => {
            let anchor = cx.variant_at(node_aggregate_id, origin_dimension_space_point)?;
            cx.tx.set_properties(cs, anchor, property_values)?;
        }
        E::NodeAggregateWasMoved {
            node_aggregate_id,
            new_parent_node_aggregate_id,
            new_succeeding_sibling_node_aggregate_id,
            affected_dimension_space_points,
        } => cx.move_node(
            node_aggregate_id,
            new_parent_node_aggregate_id.as_ref(),
            new_succeeding_sibling_node_aggregate_id.as_ref(),
            affected_dimension_space_points,
        )?,
        E::NodeAggregateWasRemoved {
            node_aggregate_id,
            affected_occupied_dimension_space_points,
            affected_covered_dimension_space_points,
        } => cx.remove_node(
            node_aggregate_id,
            affected_occupied_dimension_space_points,
            affected_covered_dimension_space_points,
        )?,
        E::NodeAggregateNameWasChanged {
            node_aggregate_id,
            new_node_name,
        } => {
            cx.require_aggregate(node_aggregate_id)?;
            for (hash, anchor) in cx.visible_scopes(node_aggregate_id)? {
                cx.tx.rename(cs, &hash, anchor, new_node_name.clone())?;
            }
        }
        E::NodeReferencesWereSet {
            source_node_aggregate_id,
            source_origin_dimension_space_point,
            reference_name,
            references,
        } => {
            let source = cx.variant_at(source_node_aggregate_id, source_origin_dimension_space_point)?;
            let targets = references.iter().map(reference_target).collect();
            cx.tx.set_references(cs, source, reference_name.clone(), targets)?;
        }
        E::SubtreeWasTagged {
            node_aggregate_id,
            tag,
            affected_dimension_space_points,
        } => {
            for (hash, anchor) in cx.affected_scopes(node_aggregate_id, affected_dimension_space_points)? {
                cx.tx.tag_subtree(cs, &hash, anchor, tag)?;
            }
        }
        E::SubtreeWasUntagged {
            node_aggregate_id,
            tag,
            affected_dimension_space_points,
        } => {
            for (hash, anchor) in cx.affected_scopes(node_aggregate_id, affected_dimension_space_points)? {
                cx.tx.untag_subtree(cs, &hash, anchor, tag)?;
            }
        }
        E::NodeAggregateClassificationWasChanged {
            node_aggregate_id,
            classification,
        } => {
            for anchor in cx.require_aggregate(node_aggregate_id)? {
                cx.tx.change_classification(cs, anchor, *classification)?;
            }
        }
        E::NodeSpecializationVariantWasCreated {
            node_aggregate_id,
            source_origin,
            specialization_origin,
            specialization_coverage,
        } => cx.create_variant(
            node_aggregate_id,
            source_origin,
            specialization_origin,
            specialization_coverage,
            VariantRelation::Specialization,
        )?,
        E::NodeGeneralizationVariantWasCreated {
            node_aggregate_id,
            source_origin,
            generalization_origin,
            generalization_coverage,
        } => cx.create_variant(
            node_aggregate_id,
            source_origin,
            generalization_origin,
            generalization_coverage,
            VariantRelation::Generalization,
        )?,
        E::NodePeerVariantWasCreated {
            node_aggregate_id,
            source_origin,
            peer_origin,
            peer_coverage,
        } => cx.create_variant(
            node_aggregate_id,
            source_origin,
            peer_origin,
            peer_coverage,
            VariantRelation::Peer,
        )?,
    }
    Ok(())
}

fn reference_target(reference: &SerializedReference) -> ReferenceTarget {
    let target = ReferenceTarget::new(reference.target_node_aggregate_id.clone());
    match &reference.properties {
        Some(properties) => target.with_properties(properties.clone()),
        None => target,
    }
}

pub(crate) struct NodeCreation<'e> {
    aggregate: &'e NodeAggregateId,
    node_type: &'e NodeTypeName,
    origin: &'e DimensionSpacePoint,
    coverage: &'e [DimensionSpacePoint],
    parent: &'e NodeAggregateId,
    name: Option<&'e NodeName>,
    succeeding_sibling: Option<&'e NodeAggregateId>,
    properties: &'e BTreeMap<String, PropertyWrite>,
    classification: NodeClassification,
}

impl EventContext<'_, '_> {
    fn create_root_node(
        &mut self,
        aggregate: &NodeAggregateId,
        node_type: &NodeTypeName,
        coverage: &[DimensionSpacePoint],
    ) -> ProjectionResult<()> {
        let origin = DimensionSpacePoint::default_point();
        self.points.register(&origin)?;
        let coverage = if coverage.is_empty() {
            self.tx.variation().allowed_points().to_vec()
        } else {
            coverage.to_vec()
        };
        let anchor = self.tx.create_node(
            self.content_stream,
            NewNode::new(aggregate.clone(), origin, node_type.clone(), NodeClassification::Root),
        )?;
        for point in &coverage {
            let hash = self.register_allowed(point)?;
            let position = self.append_position(&hash, NodeAnchorPoint::ROOT_EDGE, None)?;
            self.tx
                .attach(self.content_stream, &hash, NodeAnchorPoint::ROOT_EDGE, anchor, position, None)?;
        }
        Ok(())
    }

    fn create_node(&mut self, node: NodeCreation<'_>) -> ProjectionResult<()> {
        self.register_allowed(node.origin)?;
        let coverage = self.coverage_or_specializations(node.origin, node.coverage)?;
        let new_node = NewNode::new(
            node.aggregate.clone(),
            node.origin.clone(),
            node.node_type.clone(),
            node.classification,
        )
        .with_properties(SerializedPropertyValues::from_writes(node.properties));
        let anchor = self.tx.create_node(self.content_stream, new_node)?;

        for point in &coverage {
            let hash = self.register_allowed(point)?;
            let parent = self.visible(node.parent, point, &hash)?;
            let position = self.insertion_position(&hash, parent, node.succeeding_sibling, None)?;
            self.tx.attach(
                self.content_stream,
                &hash,
                parent,
                anchor,
                position,
                node.name.cloned(),
            )?;
        }
        Ok(())
    }

    fn move_node(
        &mut self,
        aggregate: &NodeAggregateId,
        new_parent: Option<&NodeAggregateId>,
        succeeding_sibling: Option<&NodeAggregateId>,
        affected: &[DimensionSpacePoint],
    ) -> ProjectionResult<()> {
        for (hash, child) in self.affected_scopes(aggregate, affected)? {
            let parent = match new_parent {
                Some(parent) => self.tx.visible_in(self.content_stream, parent, &hash)?.ok_or_else(|| {
                    GraphError::NodeAggregateNotFound {
                        aggregate: parent.clone(),
                        content_stream: self.content_stream,
                    }
                })?,
                None => self.raw_parent(&hash, child)?,
            };
            let position = self.insertion_position(&hash, parent, succeeding_sibling, Some(child))?;
            self.tx.move_node(self.content_stream, &hash, child, parent, position)?;
        }
        Ok(())
    }

    fn remove_node(
        &mut self,
        aggregate: &NodeAggregateId,
        occupied: &[DimensionSpacePoint],
        covered: &[DimensionSpacePoint],
    ) -> ProjectionResult<()> {
        for point in covered {
            let hash = point.hash();
            if let Some(anchor) = self.tx.visible_in(self.content_stream, aggregate, &hash)? {
                self.tx.detach(self.content_stream, &hash, anchor)?;
            }
        }
        let origins: Vec<DimensionSpacePointHash> = if occupied.is_empty() {
            self.require_aggregate(aggregate)?;
            self.tx
                .variants(self.content_stream, aggregate)?
                .into_iter()
                .map(|record| record.origin_hash.clone())
                .collect()
        } else {
            occupied.iter().map(DimensionSpacePoint::hash).collect()
        };
        for origin in &origins {
            self.tx.remove_variant(self.content_stream, aggregate, origin)?;
        }
        Ok(())
    }

    fn create_variant(
        &mut self,
        aggregate: &NodeAggregateId,
        source_origin: &DimensionSpacePoint,
        target_origin: &DimensionSpacePoint,
        coverage: &[DimensionSpacePoint],
        expected: VariantRelation,
    ) -> ProjectionResult<()> {
        let source_hash = self.points.register(source_origin)?;
        self.register_allowed(target_origin)?;
        let relation = self.tx.variation().relation(source_origin, target_origin);
        if relation != expected {
            return Err(ProjectionError::InvalidVariant {
                aggregate: aggregate.clone(),
                reason: format!("{target_origin} is a {relation:?} of {source_origin}, expected {expected:?}"),
            });
        }

        let source = self.variant_at(aggregate, source_origin)?;
        let source_edge = self.edge_in_origin(&source_hash, source)?;
        let coverage = self.coverage_or_specializations(target_origin, coverage)?;
        let variant = self
            .tx
            .create_variant(self.content_stream, source, target_origin.clone())?;

        for point in &coverage {
            let hash = self.register_allowed(point)?;
            if let Some(existing) = self.tx.visible_in(self.content_stream, aggregate, &hash)? {
                // The new variant takes over the edges, children included,
                // but never from a variant at least as specific as itself.
                if self.is_fallback_for(existing, target_origin)? {
                    self.tx.replace_in_scope(self.content_stream, &hash, existing, variant)?;
                }
                continue;
            }
            let Some((parent_aggregate, name)) = &source_edge else {
                return Err(ProjectionError::NodeAggregateNotVisible {
                    aggregate: aggregate.clone(),
                    content_stream: self.content_stream,
                    dimension_space_point: source_origin.clone(),
                });
            };
            let parent = match parent_aggregate {
                Some(parent) => self.visible(parent, point, &hash)?,
                None => NodeAnchorPoint::ROOT_EDGE,
            };
            let position = self.append_position(&hash, parent, None)?;
            self.tx
                .attach(self.content_stream, &hash, parent, variant, position, name.clone())?;
        }
        Ok(())
    }

    // ---- lookups ----

    fn register_allowed(&self, point: &DimensionSpacePoint) -> ProjectionResult<DimensionSpacePointHash> {
        self.tx.variation().validate(point)?;
        Ok(self.points.register(point)?)
    }

    fn coverage_or_specializations(
        &self,
        origin: &DimensionSpacePoint,
        coverage: &[DimensionSpacePoint],
    ) -> ProjectionResult<Vec<DimensionSpacePoint>> {
        if coverage.is_empty() {
            Ok(self.tx.variation().specializations(origin, true)?)
        } else {
            Ok(coverage.to_vec())
        }
    }

    /// Whether `anchor` only covers its point as a fallback a variant at
    /// `target` would replace: its origin must strictly generalize `target`.
    fn is_fallback_for(&self, anchor: NodeAnchorPoint, target: &DimensionSpacePoint) -> ProjectionResult<bool> {
        let record = self.tx.node(anchor).ok_or(GraphError::AnchorNotFound(anchor))?;
        Ok(self.tx.variation().relation(&record.origin, target) == VariantRelation::Specialization)
    }

    /// The variant originating exactly at `origin`.
    fn variant_at(&self, aggregate: &NodeAggregateId, origin: &DimensionSpacePoint) -> ProjectionResult<NodeAnchorPoint> {
        self.tx
            .find_by_aggregate_id_with(self.content_stream, aggregate, origin, LookupMode::Strict)?
            .ok_or_else(|| {
                ProjectionError::Graph(GraphError::NodeAggregateNotFound {
                    aggregate: aggregate.clone(),
                    content_stream: self.content_stream,
                })
            })
    }

    fn visible(
        &self,
        aggregate: &NodeAggregateId,
        point: &DimensionSpacePoint,
        hash: &DimensionSpacePointHash,
    ) -> ProjectionResult<NodeAnchorPoint> {
        self.tx
            .visible_in(self.content_stream, aggregate, hash)?
            .ok_or_else(|| ProjectionError::NodeAggregateNotVisible {
                aggregate: aggregate.clone(),
                content_stream: self.content_stream,
                dimension_space_point: point.clone(),
            })
    }

    /// Anchors of every variant, failing if the stream has none.
    fn require_aggregate(&self, aggregate: &NodeAggregateId) -> ProjectionResult<Vec<NodeAnchorPoint>> {
        let anchors: Vec<_> = self
            .tx
            .variants(self.content_stream, aggregate)?
            .into_iter()
            .map(|record| record.anchor)
            .collect();
        if anchors.is_empty() {
            return Err(GraphError::NodeAggregateNotFound {
                aggregate: aggregate.clone(),
                content_stream: self.content_stream,
            }
            .into());
        }
        Ok(anchors)
    }

    /// Every scope with an edge of the aggregate, sorted by hash.
    fn visible_scopes(
        &self,
        aggregate: &NodeAggregateId,
    ) -> ProjectionResult<Vec<(DimensionSpacePointHash, NodeAnchorPoint)>> {
        let stream = self.tx.graph_state().stream(self.content_stream)?;
        let variants = stream.variants().variants(aggregate);
        let mut scopes: Vec<_> = stream
            .scopes()
            .filter_map(|scope| {
                variants
                    .iter()
                    .map(|(_, anchor)| *anchor)
                    .find(|anchor| scope.contains(*anchor))
                    .map(|anchor| (scope.dimension_space_point_hash().clone(), anchor))
            })
            .collect();
        scopes.sort();
        Ok(scopes)
    }

    /// The listed points, or every scope the aggregate is visible in.
    fn affected_scopes(
        &self,
        aggregate: &NodeAggregateId,
        points: &[DimensionSpacePoint],
    ) -> ProjectionResult<Vec<(DimensionSpacePointHash, NodeAnchorPoint)>> {
        if points.is_empty() {
            self.require_aggregate(aggregate)?;
            return self.visible_scopes(aggregate);
        }
        points
            .iter()
            .map(|point| {
                let hash = point.hash();
                let anchor = self.visible(aggregate, point, &hash)?;
                Ok((hash, anchor))
            })
            .collect()
    }

    /// Parent of `child` in the scope, the root edge included.
    fn raw_parent(&self, hash: &DimensionSpacePointHash, child: NodeAnchorPoint) -> ProjectionResult<NodeAnchorPoint> {
        self.tx
            .graph_state()
            .stream(self.content_stream)?
            .scope(hash)
            .and_then(|scope| scope.parent_of(child))
            .ok_or_else(|| {
                GraphError::NotAttached {
                    anchor: child,
                    dimension_space_point: hash.clone(),
                }
                .into()
            })
    }

    /// Parent aggregate (`None` for the root edge) and name of `anchor`'s
    /// edge in its origin scope, if it has one.
    fn edge_in_origin(
        &self,
        origin: &DimensionSpacePointHash,
        anchor: NodeAnchorPoint,
    ) -> ProjectionResult<Option<(Option<NodeAggregateId>, Option<NodeName>)>> {
        let stream = self.tx.graph_state().stream(self.content_stream)?;
        let Some(edge) = stream.scope(origin).and_then(|scope| scope.edge(anchor)) else {
            return Ok(None);
        };
        let parent = if edge.parent.is_root_edge() {
            None
        } else {
            let record = self.tx.node(edge.parent).ok_or(GraphError::AnchorNotFound(edge.parent))?;
            Some(record.aggregate_id.clone())
        };
        Ok(Some((parent, edge.name.clone())))
    }

    fn append_position(
        &self,
        hash: &DimensionSpacePointHash,
        parent: NodeAnchorPoint,
        moving: Option<NodeAnchorPoint>,
    ) -> ProjectionResult<u32> {
        self.insertion_position(hash, parent, None, moving)
    }

    /// Index before `succeeding_sibling` among the children of `parent`,
    /// or the end. `moving` is left out of the count.
    fn insertion_position(
        &self,
        hash: &DimensionSpacePointHash,
        parent: NodeAnchorPoint,
        succeeding_sibling: Option<&NodeAggregateId>,
        moving: Option<NodeAnchorPoint>,
    ) -> ProjectionResult<u32> {
        let siblings: Vec<_> = self
            .tx
            .children(self.content_stream, hash, parent)?
            .into_iter()
            .filter(|child| Some(*child) != moving)
            .collect();
        let succeeding = match succeeding_sibling {
            Some(sibling) => self.tx.visible_in(self.content_stream, sibling, hash)?,
            None => None,
        };
        let index = succeeding
            .and_then(|anchor| siblings.iter().position(|child| *child == anchor))
            .unwrap_or(siblings.len());
        Ok(index as u32)
    }
}
