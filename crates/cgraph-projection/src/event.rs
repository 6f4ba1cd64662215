//! Domain events consumed by the projection, and their envelopes.
//!
//! Events arrive already validated by the write side. One envelope per line
//! in the JSON lines event log:
//!
//! ```json
//! {"content_stream_id":"0190...","expected_version":1,"event":{"type":"SubtreeWasTagged","node_aggregate_id":"news","tag":"disabled"}}
//! ```

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cgraph_dimension::DimensionSpacePoint;
use cgraph_streams::ContentStreamState;
use cgraph_types::{
    ContentStreamId, NodeAggregateId, NodeClassification, NodeName, NodeTypeName, PropertyWrite,
    ReferenceName, SerializedPropertyValues, SubtreeTag,
};

use crate::error::{ProjectionError, ProjectionResult};

/// One reference of a [`ContentGraphEvent::NodeReferencesWereSet`] event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedReference {
    pub target_node_aggregate_id: NodeAggregateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SerializedPropertyValues>,
}

/// Events that change the content graph or the content stream table.
///
/// Lists of dimension space points that are left empty default to the
/// natural coverage: every allowed point for root nodes, the origin and its
/// specializations for other nodes, and every scope the aggregate is visible
/// in for tagging and moving.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentGraphEvent {
    ContentStreamWasCreated,
    ContentStreamWasForked {
        source_content_stream_id: ContentStreamId,
    },
    ContentStreamWasRemoved,
    ContentStreamRebaseStarted,
    ContentStreamWasRebased,
    ContentStreamRebaseFailed,

    RootNodeAggregateWithNodeWasCreated {
        node_aggregate_id: NodeAggregateId,
        node_type_name: NodeTypeName,
        #[serde(default)]
        covered_dimension_space_points: Vec<DimensionSpacePoint>,
    },
    NodeAggregateWithNodeWasCreated {
        node_aggregate_id: NodeAggregateId,
        node_type_name: NodeTypeName,
        origin_dimension_space_point: DimensionSpacePoint,
        #[serde(default)]
        covered_dimension_space_points: Vec<DimensionSpacePoint>,
        parent_node_aggregate_id: NodeAggregateId,
        #[serde(default)]
        node_name: Option<NodeName>,
        /// Inserted before this sibling; appended when absent.
        #[serde(default)]
        succeeding_sibling_node_aggregate_id: Option<NodeAggregateId>,
        #[serde(default)]
        initial_property_values: BTreeMap<String, PropertyWrite>,
        #[serde(default = "regular")]
        node_aggregate_classification: NodeClassification,
    },
    NodePropertiesWereSet {
        node_aggregate_id: NodeAggregateId,
        origin_dimension_space_point: DimensionSpacePoint,
        property_values: BTreeMap<String, PropertyWrite>,
    },
    NodeAggregateWasMoved {
        node_aggregate_id: NodeAggregateId,
        /// Keep the current parent when absent.
        #[serde(default)]
        new_parent_node_aggregate_id: Option<NodeAggregateId>,
        #[serde(default)]
        new_succeeding_sibling_node_aggregate_id: Option<NodeAggregateId>,
        #[serde(default)]
        affected_dimension_space_points: Vec<DimensionSpacePoint>,
    },
    NodeAggregateWasRemoved {
        node_aggregate_id: NodeAggregateId,
        /// Variants to drop from the stream. Empty means all of them.
        #[serde(default)]
        affected_occupied_dimension_space_points: Vec<DimensionSpacePoint>,
        /// Points in which only the edge is removed.
        #[serde(default)]
        affected_covered_dimension_space_points: Vec<DimensionSpacePoint>,
    },
    NodeAggregateNameWasChanged {
        node_aggregate_id: NodeAggregateId,
        new_node_name: Option<NodeName>,
    },
    NodeReferencesWereSet {
        source_node_aggregate_id: NodeAggregateId,
        source_origin_dimension_space_point: DimensionSpacePoint,
        reference_name: ReferenceName,
        references: Vec<SerializedReference>,
    },
    SubtreeWasTagged {
        node_aggregate_id: NodeAggregateId,
        tag: SubtreeTag,
        #[serde(default)]
        affected_dimension_space_points: Vec<DimensionSpacePoint>,
    },
    SubtreeWasUntagged {
        node_aggregate_id: NodeAggregateId,
        tag: SubtreeTag,
        #[serde(default)]
        affected_dimension_space_points: Vec<DimensionSpacePoint>,
    },
    NodeAggregateClassificationWasChanged {
        node_aggregate_id: NodeAggregateId,
        classification: NodeClassification,
    },
    NodeSpecializationVariantWasCreated {
        node_aggregate_id: NodeAggregateId,
        source_origin: DimensionSpacePoint,
        specialization_origin: DimensionSpacePoint,
        #[serde(default)]
        specialization_coverage: Vec<DimensionSpacePoint>,
    },
    NodeGeneralizationVariantWasCreated {
        node_aggregate_id: NodeAggregateId,
        source_origin: DimensionSpacePoint,
        generalization_origin: DimensionSpacePoint,
        #[serde(default)]
        generalization_coverage: Vec<DimensionSpacePoint>,
    },
    NodePeerVariantWasCreated {
        node_aggregate_id: NodeAggregateId,
        source_origin: DimensionSpacePoint,
        peer_origin: DimensionSpacePoint,
        #[serde(default)]
        peer_coverage: Vec<DimensionSpacePoint>,
    },
}

fn regular() -> NodeClassification {
    NodeClassification::Regular
}

impl ContentGraphEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ContentStreamWasCreated => "ContentStreamWasCreated",
            Self::ContentStreamWasForked { .. } => "ContentStreamWasForked",
            Self::ContentStreamWasRemoved => "ContentStreamWasRemoved",
            Self::ContentStreamRebaseStarted => "ContentStreamRebaseStarted",
            Self::ContentStreamWasRebased => "ContentStreamWasRebased",
            Self::ContentStreamRebaseFailed => "ContentStreamRebaseFailed",
            Self::RootNodeAggregateWithNodeWasCreated { .. } => "RootNodeAggregateWithNodeWasCreated",
            Self::NodeAggregateWithNodeWasCreated { .. } => "NodeAggregateWithNodeWasCreated",
            Self::NodePropertiesWereSet { .. } => "NodePropertiesWereSet",
            Self::NodeAggregateWasMoved { .. } => "NodeAggregateWasMoved",
            Self::NodeAggregateWasRemoved { .. } => "NodeAggregateWasRemoved",
            Self::NodeAggregateNameWasChanged { .. } => "NodeAggregateNameWasChanged",
            Self::NodeReferencesWereSet { .. } => "NodeReferencesWereSet",
            Self::SubtreeWasTagged { .. } => "SubtreeWasTagged",
            Self::SubtreeWasUntagged { .. } => "SubtreeWasUntagged",
            Self::NodeAggregateClassificationWasChanged { .. } => "NodeAggregateClassificationWasChanged",
            Self::NodeSpecializationVariantWasCreated { .. } => "NodeSpecializationVariantWasCreated",
            Self::NodeGeneralizationVariantWasCreated { .. } => "NodeGeneralizationVariantWasCreated",
            Self::NodePeerVariantWasCreated { .. } => "NodePeerVariantWasCreated",
        }
    }

    /// Whether the event brings its content stream into existence.
    pub fn creates_content_stream(&self) -> bool {
        matches!(
            self,
            Self::ContentStreamWasCreated | Self::ContentStreamWasForked { .. }
        )
    }

    /// Lifecycle state the stream moves to, for rebase events.
    pub fn target_state(&self) -> Option<ContentStreamState> {
        match self {
            Self::ContentStreamRebaseStarted => Some(ContentStreamState::Rebasing),
            Self::ContentStreamWasRebased => Some(ContentStreamState::Created),
            Self::ContentStreamRebaseFailed => Some(ContentStreamState::RebaseError),
            _ => None,
        }
    }
}

/// An event addressed to a content stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub content_stream_id: ContentStreamId,
    /// Version the writer observed. `None` skips the check; the version
    /// still advances.
    #[serde(default)]
    pub expected_version: Option<u64>,
    /// Timestamp stamped on every row the event writes. Defaults to the
    /// time of application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    pub event: ContentGraphEvent,
}

impl EventEnvelope {
    pub fn new(content_stream_id: ContentStreamId, event: ContentGraphEvent) -> Self {
        Self {
            content_stream_id,
            expected_version: None,
            recorded_at: None,
            event,
        }
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }
}

/// Parse a JSON lines event log. Blank lines are skipped; line numbers in
/// errors are 1-based.
pub fn read_event_log(reader: impl BufRead) -> ProjectionResult<Vec<EventEnvelope>> {
    let mut envelopes = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope = serde_json::from_str(&line).map_err(|e| ProjectionError::InvalidEventLog {
            line: index + 1,
            reason: e.to_string(),
        })?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}

pub fn read_event_log_file(path: impl AsRef<Path>) -> ProjectionResult<Vec<EventEnvelope>> {
    let file = std::fs::File::open(path)?;
    read_event_log(std::io::BufReader::new(file))
}

/// Render envelopes as JSON lines.
pub fn write_event_log(envelopes: &[EventEnvelope]) -> ProjectionResult<String> {
    let mut out = String::new();
    for envelope in envelopes {
        let line = serde_json::to_string(envelope).map_err(|e| ProjectionError::InvalidEventLog {
            line: 0,
            reason: e.to_string(),
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}
