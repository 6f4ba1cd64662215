//! The deduplicated hash → point lookup.
//!
//! The registry is an index, never a source of truth for existence: a point
//! exists because some node or hierarchy row references its hash.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use tracing::debug;

use crate::error::{DimensionError, DimensionResult};
use crate::point::{DimensionSpacePoint, DimensionSpacePointHash};

/// In-memory equivalent of the `dimensionspacepoints` table.
#[derive(Debug, Default)]
pub struct DimensionSpacePointRegistry {
    points: RwLock<HashMap<DimensionSpacePointHash, DimensionSpacePoint>>,
}

impl DimensionSpacePointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a point and return its hash. Registering twice is a no-op.
    pub fn register(&self, point: &DimensionSpacePoint) -> DimensionResult<DimensionSpacePointHash> {
        let hash = point.hash();
        let mut points = self
            .points
            .write()
            .map_err(|e| DimensionError::LockPoisoned(e.to_string()))?;
        if !points.contains_key(&hash) {
            debug!(hash = %hash, point = %point, "registered dimension space point");
            points.insert(hash.clone(), point.clone());
        }
        Ok(hash)
    }

    /// Register several points at once.
    pub fn register_all<'a>(
        &self,
        points: impl IntoIterator<Item = &'a DimensionSpacePoint>,
    ) -> DimensionResult<Vec<DimensionSpacePointHash>> {
        points.into_iter().map(|p| self.register(p)).collect()
    }

    /// Reconstruct a point from its hash.
    pub fn decode(&self, hash: &DimensionSpacePointHash) -> DimensionResult<DimensionSpacePoint> {
        self.read()?
            .get(hash)
            .cloned()
            .ok_or_else(|| DimensionError::HashNotFound(hash.clone()))
    }

    pub fn contains(&self, hash: &DimensionSpacePointHash) -> DimensionResult<bool> {
        Ok(self.read()?.contains_key(hash))
    }

    pub fn len(&self) -> DimensionResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> DimensionResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All rows as `(hash, canonical JSON)`, sorted by hash.
    pub fn rows(&self) -> DimensionResult<Vec<(DimensionSpacePointHash, String)>> {
        let points = self.read()?;
        let mut rows: Vec<_> = points
            .iter()
            .map(|(hash, point)| (hash.clone(), point.to_json()))
            .collect();
        rows.sort();
        Ok(rows)
    }

    fn read(&self) -> DimensionResult<RwLockReadGuard<'_, HashMap<DimensionSpacePointHash, DimensionSpacePoint>>> {
        self.points
            .read()
            .map_err(|e| DimensionError::LockPoisoned(e.to_string()))
    }
}
