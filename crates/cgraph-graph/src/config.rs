use serde::{Deserialize, Serialize};

/// What happens when a node is attached at an occupied sibling position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionPolicy {
    /// Array-insert semantics: the newcomer takes the slot and later siblings
    /// move one position to the right. Positions past the end append.
    #[default]
    ShiftRight,
    /// Fail with `DuplicatePosition` if the slot is occupied.
    Reject,
}

/// How an aggregate is resolved to a variant for a dimension space point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// Only a variant whose origin is exactly the requested point.
    Strict,
    /// Walk the generalization chain of the requested point, closest first.
    #[default]
    Fallback,
}

/// Behavioral configuration of the content graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub position_policy: PositionPolicy,
    #[serde(default)]
    pub lookup_mode: LookupMode,
}
