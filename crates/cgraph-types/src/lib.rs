//! Foundation types for the content graph.
//!
//! This crate provides the identity, value, and classification types shared by
//! every other content graph crate.
//!
//! # Key Types
//!
//! - [`NodeAggregateId`]: Stable identity of a node across dimension variants and stream forks
//! - [`NodeAnchorPoint`]: Storage-local key of one concrete node variant row
//! - [`ContentStreamId`]: Identifier of a branchable content timeline
//! - [`SerializedPropertyValue`]: Typed property value; null is not representable
//! - [`PropertyWrite`]: Set-or-unset instruction applied to a property map
//! - [`NodeClassification`]: Root / regular / tethered, with guarded transitions
//! - [`NodeTimestamps`]: Current and original created/modified timestamps

pub mod classification;
pub mod error;
pub mod ids;
pub mod property;
pub mod temporal;

pub use classification::NodeClassification;
pub use error::TypeError;
pub use ids::{
    ContentStreamId, NodeAggregateId, NodeAnchorPoint, NodeName, NodeTypeName, ReferenceName,
    SubtreeTag,
};
pub use property::{PropertyValue, PropertyWrite, SerializedPropertyValue, SerializedPropertyValues};
pub use temporal::NodeTimestamps;
