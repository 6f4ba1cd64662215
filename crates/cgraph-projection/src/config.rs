//! Top-level configuration file.
//!
//! ```toml
//! table_prefix = "cr_default_p_graph"
//!
//! [graph]
//! position_policy = "shift_right"
//! lookup_mode = "fallback"
//!
//! [[dimensions]]
//! id = "language"
//!
//! [dimensions.values.en.specializations.en_US]
//! [dimensions.values.de]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cgraph_dimension::{DimensionConfig, DimensionsConfig, InterDimensionalVariationGraph};
use cgraph_graph::GraphConfig;
use cgraph_schema::ContentGraphSchemaBuilder;

use crate::error::{ProjectionError, ProjectionResult};

pub const DEFAULT_TABLE_PREFIX: &str = "cr_default_p_graph";

fn default_table_prefix() -> String {
    DEFAULT_TABLE_PREFIX.to_string()
}

/// Table prefix, graph behavior and dimension space. Missing sections fall
/// back to their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgraphConfig {
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub dimensions: Vec<DimensionConfig>,
}

impl Default for CgraphConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
            graph: GraphConfig::default(),
            dimensions: Vec::new(),
        }
    }
}

impl CgraphConfig {
    pub fn from_toml_str(s: &str) -> ProjectionResult<Self> {
        toml::from_str(s).map_err(|e| ProjectionError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> ProjectionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), dimensions = config.dimensions.len(), "loaded configuration");
        Ok(config)
    }

    pub fn dimensions_config(&self) -> DimensionsConfig {
        DimensionsConfig {
            dimensions: self.dimensions.clone(),
        }
    }

    /// Validate the dimensions and build the variation graph.
    pub fn variation_graph(&self) -> ProjectionResult<InterDimensionalVariationGraph> {
        Ok(InterDimensionalVariationGraph::from_config(&self.dimensions_config())?)
    }

    pub fn schema_builder(&self) -> ProjectionResult<ContentGraphSchemaBuilder> {
        Ok(ContentGraphSchemaBuilder::new(self.table_prefix.clone())?)
    }
}
