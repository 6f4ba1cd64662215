//! In-memory content stream store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use cgraph_types::ContentStreamId;

use crate::error::{StreamError, StreamResult};
use crate::traits::ContentStreamStore;
use crate::types::{ContentStream, ContentStreamState};

/// [`ContentStreamStore`] backed by a `HashMap` behind a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryContentStreamStore {
    streams: RwLock<HashMap<ContentStreamId, ContentStream>>,
}

impl InMemoryContentStreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StreamResult<RwLockReadGuard<'_, HashMap<ContentStreamId, ContentStream>>> {
        self.streams
            .read()
            .map_err(|e| StreamError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> StreamResult<RwLockWriteGuard<'_, HashMap<ContentStreamId, ContentStream>>> {
        self.streams
            .write()
            .map_err(|e| StreamError::LockPoisoned(e.to_string()))
    }
}

impl ContentStreamStore for InMemoryContentStreamStore {
    fn create(&self, id: ContentStreamId) -> StreamResult<ContentStream> {
        let mut streams = self.write()?;
        if streams.contains_key(&id) {
            return Err(StreamError::AlreadyExists(id));
        }
        let stream = ContentStream::new(id);
        streams.insert(id, stream.clone());
        info!(content_stream = %id, "created content stream");
        Ok(stream)
    }

    fn fork(&self, source: ContentStreamId, id: ContentStreamId) -> StreamResult<ContentStream> {
        let mut streams = self.write()?;
        if streams.contains_key(&id) {
            return Err(StreamError::AlreadyExists(id));
        }
        let origin = streams.get(&source).ok_or(StreamError::NotFound(source))?;
        if origin.removed {
            return Err(StreamError::ContentStreamRemoved(source));
        }
        let stream = ContentStream::forked_from(id, origin);
        streams.insert(id, stream.clone());
        info!(
            content_stream = %id,
            source = %source,
            source_version = stream.source_version.unwrap_or_default(),
            "forked content stream"
        );
        Ok(stream)
    }

    fn get(&self, id: ContentStreamId) -> StreamResult<Option<ContentStream>> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn transition(&self, id: ContentStreamId, state: ContentStreamState) -> StreamResult<ContentStream> {
        let mut streams = self.write()?;
        let stream = streams.get_mut(&id).ok_or(StreamError::NotFound(id))?;
        if stream.removed {
            return Err(StreamError::ContentStreamRemoved(id));
        }
        if !stream.state.can_transition_to(state) {
            return Err(StreamError::InvalidTransition {
                content_stream: id,
                from: stream.state,
                to: state,
            });
        }
        debug!(content_stream = %id, from = %stream.state, to = %state, "content stream state changed");
        stream.state = state;
        Ok(stream.clone())
    }

    fn remove(&self, id: ContentStreamId) -> StreamResult<bool> {
        let mut streams = self.write()?;
        let stream = streams.get_mut(&id).ok_or(StreamError::NotFound(id))?;
        if stream.removed {
            return Ok(false);
        }
        stream.removed = true;
        info!(content_stream = %id, version = stream.version, "removed content stream");
        Ok(true)
    }

    fn compare_and_increment(&self, id: ContentStreamId, expected: u64) -> StreamResult<u64> {
        let mut streams = self.write()?;
        let stream = streams.get_mut(&id).ok_or(StreamError::NotFound(id))?;
        if stream.removed {
            return Err(StreamError::ContentStreamRemoved(id));
        }
        if stream.version != expected {
            return Err(StreamError::ConcurrentModification {
                content_stream: id,
                expected,
                actual: stream.version,
            });
        }
        stream.version += 1;
        debug!(content_stream = %id, version = stream.version, "advanced content stream version");
        Ok(stream.version)
    }

    fn list(&self) -> StreamResult<Vec<ContentStream>> {
        let mut all: Vec<_> = self.read()?.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn purge(&self, id: ContentStreamId) -> StreamResult<bool> {
        let removed = self.write()?.remove(&id).is_some();
        if removed {
            info!(content_stream = %id, "purged content stream");
        }
        Ok(removed)
    }
}
