//! Content dimensions and their generalization rules.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DimensionConfig, DimensionValueConfig, DimensionsConfig};
use crate::error::{DimensionError, DimensionResult};

/// One value of a content dimension together with its depth in the
/// generalization tree (roots are depth 0).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDimensionValue {
    pub value: String,
    pub specialization_depth: u32,
}

impl ContentDimensionValue {
    pub fn new(value: impl Into<String>, specialization_depth: u32) -> Self {
        Self {
            value: value.into(),
            specialization_depth,
        }
    }
}

/// A validated content dimension.
///
/// Invariants established by [`ContentDimension::new`]:
/// - values are unique and non-empty in number,
/// - every generalization names another known value and chains are acyclic,
/// - a value's depth is its generalization's depth plus one; roots are 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDimension {
    id: String,
    values: Vec<ContentDimensionValue>,
    /// specialization → generalization
    generalizations: BTreeMap<String, String>,
}

impl ContentDimension {
    pub fn new(
        id: impl Into<String>,
        values: Vec<ContentDimensionValue>,
        generalizations: BTreeMap<String, String>,
    ) -> DimensionResult<Self> {
        let id = id.into();
        if values.is_empty() {
            return Err(DimensionError::EmptyDimension(id));
        }

        let mut depths: BTreeMap<&str, u32> = BTreeMap::new();
        for v in &values {
            if depths.insert(&v.value, v.specialization_depth).is_some() {
                return Err(DimensionError::DuplicateValue {
                    dimension: id,
                    value: v.value.clone(),
                });
            }
        }

        for (specialization, generalization) in &generalizations {
            let invalid = |reason: &str| DimensionError::InvalidGeneralization {
                dimension: id.clone(),
                value: specialization.clone(),
                generalization: generalization.clone(),
                reason: reason.to_string(),
            };
            if !depths.contains_key(specialization.as_str()) {
                return Err(invalid("specialization is not a value of this dimension"));
            }
            if !depths.contains_key(generalization.as_str()) {
                return Err(invalid("generalization is not a value of this dimension"));
            }
            if specialization == generalization {
                return Err(invalid("a value cannot generalize itself"));
            }
        }

        for start in generalizations.keys() {
            let mut seen = HashSet::new();
            let mut current = start.as_str();
            while let Some(next) = generalizations.get(current) {
                if !seen.insert(current) {
                    return Err(DimensionError::InvalidGeneralization {
                        dimension: id.clone(),
                        value: start.clone(),
                        generalization: next.clone(),
                        reason: "generalization chain forms a cycle".to_string(),
                    });
                }
                current = next.as_str();
            }
        }

        for v in &values {
            let expected = match generalizations.get(&v.value) {
                Some(generalization) => depths[generalization.as_str()] + 1,
                None => 0,
            };
            if v.specialization_depth != expected {
                return Err(DimensionError::InvalidSpecializationDepth {
                    dimension: id.clone(),
                    value: v.value.clone(),
                    expected,
                    actual: v.specialization_depth,
                });
            }
        }

        Ok(Self {
            id,
            values,
            generalizations,
        })
    }

    /// Build a dimension from its nested value tree.
    pub fn from_config(config: &DimensionConfig) -> DimensionResult<Self> {
        fn walk(
            parent: Option<&str>,
            depth: u32,
            tree: &BTreeMap<String, DimensionValueConfig>,
            values: &mut Vec<ContentDimensionValue>,
            generalizations: &mut BTreeMap<String, String>,
        ) {
            for (value, node) in tree {
                values.push(ContentDimensionValue::new(value.clone(), depth));
                if let Some(parent) = parent {
                    generalizations.insert(value.clone(), parent.to_string());
                }
                walk(Some(value.as_str()), depth + 1, &node.specializations, values, generalizations);
            }
        }

        let mut values = Vec::new();
        let mut generalizations = BTreeMap::new();
        walk(None, 0, &config.values, &mut values, &mut generalizations);
        Self::new(config.id.clone(), values, generalizations)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn values(&self) -> &[ContentDimensionValue] {
        &self.values
    }

    pub fn value(&self, value: &str) -> Option<&ContentDimensionValue> {
        self.values.iter().find(|v| v.value == value)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.value(value).is_some()
    }

    pub fn generalization(&self, value: &str) -> Option<&str> {
        self.generalizations.get(value).map(String::as_str)
    }

    /// Direct specializations of `value`.
    pub fn specializations(&self, value: &str) -> Vec<&str> {
        self.generalizations
            .iter()
            .filter(|(_, g)| g.as_str() == value)
            .map(|(s, _)| s.as_str())
            .collect()
    }

    /// `value` followed by all of its generalizations, closest first.
    pub fn generalization_chain<'a>(&'a self, value: &'a str) -> Vec<&'a str> {
        let mut chain = vec![value];
        let mut current = value;
        while let Some(next) = self.generalization(current) {
            chain.push(next);
            current = next;
        }
        chain
    }

    pub fn max_depth(&self) -> u32 {
        self.values
            .iter()
            .map(|v| v.specialization_depth)
            .max()
            .unwrap_or(0)
    }
}

/// All configured dimensions, in priority order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentDimensionSource {
    dimensions: Vec<ContentDimension>,
}

impl ContentDimensionSource {
    pub fn new(dimensions: Vec<ContentDimension>) -> DimensionResult<Self> {
        let mut ids = HashSet::new();
        for d in &dimensions {
            if !ids.insert(d.id()) {
                return Err(DimensionError::DuplicateDimension(d.id().to_string()));
            }
        }
        Ok(Self { dimensions })
    }

    pub fn from_config(config: &DimensionsConfig) -> DimensionResult<Self> {
        let dimensions = config
            .dimensions
            .iter()
            .map(ContentDimension::from_config)
            .collect::<DimensionResult<Vec<_>>>()?;
        debug!(count = dimensions.len(), "loaded content dimensions");
        Self::new(dimensions)
    }

    pub fn dimensions(&self) -> &[ContentDimension] {
        &self.dimensions
    }

    pub fn dimension(&self, id: &str) -> Option<&ContentDimension> {
        self.dimensions.iter().find(|d| d.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}
