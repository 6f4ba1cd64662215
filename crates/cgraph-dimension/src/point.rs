use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DimensionError, DimensionResult};

const HASH_DOMAIN: &[u8] = b"cgraph-dimensionspacepoint-v1:";

/// Width of the hex-encoded hash, matching the `varchar(32)` hash columns.
pub const HASH_HEX_LEN: usize = 32;

/// A coordinate in the dimension space: dimension name → value.
///
/// Coordinates are kept sorted by dimension name, so the canonical encoding
/// and therefore the hash do not depend on insertion order. Points are
/// immutable once constructed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionSpacePoint {
    coordinates: BTreeMap<String, String>,
}

impl DimensionSpacePoint {
    pub fn new<K, V>(coordinates: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            coordinates: coordinates
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The point of an installation without dimensions.
    pub fn default_point() -> Self {
        Self::default()
    }

    /// Parse the canonical JSON encoding (`{"language":"en"}`).
    pub fn from_json(json: &str) -> DimensionResult<Self> {
        serde_json::from_str(json).map_err(|e| DimensionError::InvalidEncoding(e.to_string()))
    }

    /// Canonical JSON encoding with keys in sorted order.
    pub fn to_json(&self) -> String {
        // A map of strings always serializes.
        serde_json::to_string(&self.coordinates).unwrap_or_else(|_| "{}".to_string())
    }

    /// Stable hash of the coordinates.
    pub fn hash(&self) -> DimensionSpacePointHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(HASH_DOMAIN);
        hasher.update(self.to_json().as_bytes());
        let digest = hasher.finalize();
        DimensionSpacePointHash(hex::encode(&digest.as_bytes()[..HASH_HEX_LEN / 2]))
    }

    pub fn coordinate(&self, dimension: &str) -> Option<&str> {
        self.coordinates.get(dimension).map(String::as_str)
    }

    pub fn coordinates(&self) -> &BTreeMap<String, String> {
        &self.coordinates
    }

    pub fn is_default(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// A copy of this point with one coordinate replaced.
    pub fn with_coordinate(&self, dimension: impl Into<String>, value: impl Into<String>) -> Self {
        let mut coordinates = self.coordinates.clone();
        coordinates.insert(dimension.into(), value.into());
        Self { coordinates }
    }
}

impl fmt::Debug for DimensionSpacePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DimensionSpacePoint({})", self.to_json())
    }
}

impl fmt::Display for DimensionSpacePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

/// Hex-encoded hash of a [`DimensionSpacePoint`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionSpacePointHash(String);

impl DimensionSpacePointHash {
    /// Parse a stored hash, checking its shape.
    pub fn from_hex(s: &str) -> DimensionResult<Self> {
        if s.len() != HASH_HEX_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DimensionError::InvalidEncoding(format!(
                "expected {HASH_HEX_LEN} hex characters, got {s:?}"
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short_hex(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Debug for DimensionSpacePointHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DimensionSpacePointHash({})", self.short_hex())
    }
}

impl fmt::Display for DimensionSpacePointHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
