//! Content stream records and lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

use cgraph_types::ContentStreamId;

use crate::error::{StreamError, StreamResult};

/// Lifecycle state of a content stream.
///
/// ```text
/// Creating ──► Created ──► Rebasing ──► Created
///                              │
///                              └──► RebaseError ──► Rebasing
/// ```
///
/// Removal is orthogonal: any state may be marked removed, and removal is
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStreamState {
    Creating,
    Created,
    Rebasing,
    RebaseError,
}

impl ContentStreamState {
    /// The compact storage code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Created => "CREATED",
            Self::Rebasing => "REBASING",
            Self::RebaseError => "REBASE_ERROR",
        }
    }

    pub fn from_code(code: &str) -> StreamResult<Self> {
        match code.trim_end_matches('\0') {
            "CREATING" => Ok(Self::Creating),
            "CREATED" => Ok(Self::Created),
            "REBASING" => Ok(Self::Rebasing),
            "REBASE_ERROR" => Ok(Self::RebaseError),
            other => Err(StreamError::InvalidStateCode(other.to_string())),
        }
    }

    /// Code padded with NUL bytes to the width of the `binary(20)` column.
    pub fn to_binary(&self) -> [u8; 20] {
        let mut buf = [0u8; 20];
        let code = self.code().as_bytes();
        buf[..code.len()].copy_from_slice(code);
        buf
    }

    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Creating, Self::Created)
                | (Self::Created, Self::Rebasing)
                | (Self::Rebasing, Self::Created)
                | (Self::Rebasing, Self::RebaseError)
                | (Self::RebaseError, Self::Rebasing)
        )
    }
}

impl fmt::Display for ContentStreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One row of the `contentstream` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStream {
    pub id: ContentStreamId,
    /// Number of events applied to the stream.
    pub version: u64,
    pub source_content_stream_id: Option<ContentStreamId>,
    /// Version of the source stream at fork time.
    pub source_version: Option<u64>,
    pub state: ContentStreamState,
    pub removed: bool,
}

impl ContentStream {
    pub(crate) fn new(id: ContentStreamId) -> Self {
        Self {
            id,
            version: 0,
            source_content_stream_id: None,
            source_version: None,
            state: ContentStreamState::Creating,
            removed: false,
        }
    }

    pub(crate) fn forked_from(id: ContentStreamId, source: &ContentStream) -> Self {
        Self {
            source_content_stream_id: Some(source.id),
            source_version: Some(source.version),
            ..Self::new(id)
        }
    }

    /// Whether events may still be applied.
    pub fn is_writable(&self) -> bool {
        !self.removed
    }

    pub fn is_fork(&self) -> bool {
        self.source_content_stream_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_binary() {
        for state in [
            ContentStreamState::Creating,
            ContentStreamState::Created,
            ContentStreamState::Rebasing,
            ContentStreamState::RebaseError,
        ] {
            let binary = state.to_binary();
            let text = std::str::from_utf8(&binary).unwrap();
            assert_eq!(ContentStreamState::from_code(text).unwrap(), state);
        }
        assert!(ContentStreamState::from_code("NOPE").is_err());
    }

    #[test]
    fn lifecycle_transitions() {
        use ContentStreamState::*;
        assert!(Creating.can_transition_to(Created));
        assert!(Created.can_transition_to(Rebasing));
        assert!(Rebasing.can_transition_to(Created));
        assert!(Rebasing.can_transition_to(RebaseError));
        assert!(RebaseError.can_transition_to(Rebasing));
        assert!(!Created.can_transition_to(Creating));
        assert!(!Creating.can_transition_to(Rebasing));
        assert!(!RebaseError.can_transition_to(Created));
    }

    #[test]
    fn fork_records_source_version() {
        let mut source = ContentStream::new(ContentStreamId::new());
        source.version = 7;
        let fork = ContentStream::forked_from(ContentStreamId::new(), &source);
        assert_eq!(fork.source_content_stream_id, Some(source.id));
        assert_eq!(fork.source_version, Some(7));
        assert_eq!(fork.version, 0);
        assert_eq!(fork.state, ContentStreamState::Creating);
        assert!(fork.is_fork());
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ContentStreamState::RebaseError).unwrap(),
            "\"rebase_error\""
        );
    }
}
