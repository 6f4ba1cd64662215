use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cgraph_dimension::{DimensionSpacePoint, DimensionSpacePointHash};
use cgraph_types::{
    NodeAggregateId, NodeAnchorPoint, NodeClassification, NodeTimestamps, NodeTypeName,
    SerializedPropertyValues,
};

/// A stored node variant, keyed by its anchor.
///
/// One node aggregate may have several records: one per origin dimension
/// space point, plus the copies made when a shared record is modified in a
/// forked content stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub anchor: NodeAnchorPoint,
    pub aggregate_id: NodeAggregateId,
    pub origin: DimensionSpacePoint,
    pub origin_hash: DimensionSpacePointHash,
    pub node_type: NodeTypeName,
    pub properties: SerializedPropertyValues,
    pub classification: NodeClassification,
    pub timestamps: NodeTimestamps,
}

impl NodeRecord {
    pub(crate) fn create(anchor: NodeAnchorPoint, node: NewNode, at: DateTime<Utc>) -> Self {
        let origin_hash = node.origin.hash();
        Self {
            anchor,
            aggregate_id: node.aggregate_id,
            origin: node.origin,
            origin_hash,
            node_type: node.node_type,
            properties: node.properties,
            classification: node.classification,
            timestamps: NodeTimestamps::created_at(at),
        }
    }

    /// A copy of this record under `anchor`, keeping the original timestamps.
    pub(crate) fn copy_to(&self, anchor: NodeAnchorPoint, at: DateTime<Utc>) -> Self {
        Self {
            anchor,
            timestamps: self.timestamps.copied_at(at),
            ..self.clone()
        }
    }

    /// A copy of this record as a variant at another origin.
    pub(crate) fn variant_at(
        &self,
        anchor: NodeAnchorPoint,
        origin: DimensionSpacePoint,
        at: DateTime<Utc>,
    ) -> Self {
        let origin_hash = origin.hash();
        Self {
            anchor,
            origin,
            origin_hash,
            timestamps: self.timestamps.copied_at(at),
            ..self.clone()
        }
    }
}

/// Input of a node creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub aggregate_id: NodeAggregateId,
    pub origin: DimensionSpacePoint,
    pub node_type: NodeTypeName,
    #[serde(default)]
    pub properties: SerializedPropertyValues,
    pub classification: NodeClassification,
}

impl NewNode {
    pub fn new(
        aggregate_id: NodeAggregateId,
        origin: DimensionSpacePoint,
        node_type: NodeTypeName,
        classification: NodeClassification,
    ) -> Self {
        Self {
            aggregate_id,
            origin,
            node_type,
            properties: SerializedPropertyValues::new(),
            classification,
        }
    }

    pub fn with_properties(mut self, properties: SerializedPropertyValues) -> Self {
        self.properties = properties;
        self
    }
}
