use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered list of configured content dimensions.
///
/// Order matters: earlier dimensions weigh more when ranking fallbacks.
///
/// ```toml
/// [[dimensions]]
/// id = "language"
///
/// [dimensions.values.en.specializations.en_US]
/// [dimensions.values.de]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionsConfig {
    #[serde(default)]
    pub dimensions: Vec<DimensionConfig>,
}

/// Configuration of a single dimension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionConfig {
    pub id: String,
    /// Root values; specializations nest below their generalization.
    #[serde(default)]
    pub values: BTreeMap<String, DimensionValueConfig>,
}

/// One value node in a dimension's value tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionValueConfig {
    #[serde(default)]
    pub specializations: BTreeMap<String, DimensionValueConfig>,
}

impl DimensionValueConfig {
    pub fn leaf() -> Self {
        Self::default()
    }

    pub fn with_specialization(mut self, value: impl Into<String>, config: Self) -> Self {
        self.specializations.insert(value.into(), config);
        self
    }
}

impl DimensionConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>, config: DimensionValueConfig) -> Self {
        self.values.insert(value.into(), config);
        self
    }
}
