//! Dimension space for the content graph.
//!
//! A [`DimensionSpacePoint`] is a coordinate in a multi-axis classification
//! space (language, region, ...) identifying one content variant. This crate
//! provides:
//!
//! - [`DimensionSpacePoint`] / [`DimensionSpacePointHash`]: immutable points
//!   with stable, order-independent hashing
//! - [`DimensionSpacePointRegistry`]: the deduplicated hash → point lookup
//! - [`ContentDimension`] / [`ContentDimensionSource`]: validated dimension
//!   configuration with generalization rules
//! - [`InterDimensionalVariationGraph`]: generalization/specialization
//!   queries across all dimensions, used for fallback lookups

pub mod config;
pub mod dimension;
pub mod error;
pub mod point;
pub mod registry;
pub mod variation;

pub use config::{DimensionConfig, DimensionValueConfig, DimensionsConfig};
pub use dimension::{ContentDimension, ContentDimensionSource, ContentDimensionValue};
pub use error::{DimensionError, DimensionResult};
pub use point::{DimensionSpacePoint, DimensionSpacePointHash};
pub use registry::DimensionSpacePointRegistry;
pub use variation::{InterDimensionalVariationGraph, VariantRelation};
