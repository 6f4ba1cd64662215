use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Created/modified timestamps of a node record.
///
/// The `original_*` pair survives copy-on-write duplication: a copied row
/// gets fresh `created`/`last_modified` values but keeps the originals of the
/// row it was copied from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTimestamps {
    pub created: DateTime<Utc>,
    pub original_created: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
    pub original_last_modified: Option<DateTime<Utc>>,
}

impl NodeTimestamps {
    /// Timestamps of a freshly created node.
    pub fn created_at(at: DateTime<Utc>) -> Self {
        Self {
            created: at,
            original_created: at,
            last_modified: None,
            original_last_modified: None,
        }
    }

    /// Timestamps of a copy made at `at`, preserving the originals.
    pub fn copied_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            created: at,
            original_created: self.original_created,
            last_modified: self.last_modified,
            original_last_modified: self.original_last_modified,
        }
    }

    /// Stamp a modification.
    ///
    /// `original_last_modified` is only set by the first modification of the
    /// logical node; copies carry it forward unchanged.
    pub fn modified_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            created: self.created,
            original_created: self.original_created,
            last_modified: Some(at),
            original_last_modified: Some(self.original_last_modified.unwrap_or(at)),
        }
    }
}
