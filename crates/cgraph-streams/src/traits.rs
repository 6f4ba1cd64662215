//! The [`ContentStreamStore`] trait.

use cgraph_types::ContentStreamId;

use crate::error::{StreamError, StreamResult};
use crate::types::{ContentStream, ContentStreamState};

/// Storage of content stream rows.
///
/// Implementations must be thread-safe and make
/// [`compare_and_increment`](ContentStreamStore::compare_and_increment)
/// atomic: of several callers presenting the same expected version, exactly
/// one succeeds.
pub trait ContentStreamStore: Send + Sync {
    /// Create a stream in state `Creating` at version 0.
    fn create(&self, id: ContentStreamId) -> StreamResult<ContentStream>;

    /// Create `id` as a fork of `source`, recording the source's current
    /// version.
    fn fork(&self, source: ContentStreamId, id: ContentStreamId) -> StreamResult<ContentStream>;

    /// Read a stream. Returns `Ok(None)` if it does not exist.
    fn get(&self, id: ContentStreamId) -> StreamResult<Option<ContentStream>>;

    /// Move a stream to `state`, validating the transition. Removed streams
    /// reject every transition.
    fn transition(&self, id: ContentStreamId, state: ContentStreamState) -> StreamResult<ContentStream>;

    /// Mark a stream removed. Idempotent; returns `true` if it was live.
    fn remove(&self, id: ContentStreamId) -> StreamResult<bool>;

    /// Advance the version by one if it equals `expected`. Returns the new
    /// version.
    fn compare_and_increment(&self, id: ContentStreamId, expected: u64) -> StreamResult<u64>;

    /// All streams, ordered by id.
    fn list(&self) -> StreamResult<Vec<ContentStream>>;

    /// Physically delete a stream row. Returns `true` if it existed.
    fn purge(&self, id: ContentStreamId) -> StreamResult<bool>;

    fn current_version(&self, id: ContentStreamId) -> StreamResult<u64> {
        Ok(self.require(id)?.version)
    }

    /// Read a stream, failing if it does not exist.
    fn require(&self, id: ContentStreamId) -> StreamResult<ContentStream> {
        self.get(id)?.ok_or(StreamError::NotFound(id))
    }

    fn mark_created(&self, id: ContentStreamId) -> StreamResult<ContentStream> {
        self.transition(id, ContentStreamState::Created)
    }

    fn start_rebase(&self, id: ContentStreamId) -> StreamResult<ContentStream> {
        self.transition(id, ContentStreamState::Rebasing)
    }

    fn finish_rebase(&self, id: ContentStreamId) -> StreamResult<ContentStream> {
        self.transition(id, ContentStreamState::Created)
    }

    fn fail_rebase(&self, id: ContentStreamId) -> StreamResult<ContentStream> {
        self.transition(id, ContentStreamState::RebaseError)
    }

    /// Streams forked directly from `source`.
    fn forks_of(&self, source: ContentStreamId) -> StreamResult<Vec<ContentStream>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| s.source_content_stream_id == Some(source))
            .collect())
    }

    /// Removed streams that no live stream was forked from. These can be
    /// deleted physically.
    fn prunable(&self) -> StreamResult<Vec<ContentStream>> {
        let all = self.list()?;
        Ok(all
            .iter()
            .filter(|s| s.removed)
            .filter(|s| {
                !all.iter()
                    .any(|other| !other.removed && other.source_content_stream_id == Some(s.id))
            })
            .cloned()
            .collect())
    }
}
