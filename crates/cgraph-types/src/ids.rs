use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Declares a validated string identifier with serde support.
///
/// Deserialization goes through the same validation as [`try_new`], so a
/// malformed value can never enter the graph through an event payload.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $validate:path) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a raw string.
            pub fn try_new(value: impl Into<String>) -> Result<Self, TypeError> {
                let value = value.into();
                if let Err(reason) = $validate(&value) {
                    return Err(TypeError::InvalidIdentifier {
                        kind: $kind,
                        value,
                        reason: reason.to_string(),
                    });
                }
                Ok(Self(value))
            }

            /// The raw string value.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::try_new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::try_new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Externally visible identity of a node across all of its dimension
    /// variants and across content stream forks.
    NodeAggregateId,
    "node aggregate id",
    validate_aggregate_id
);

string_id!(
    /// Name of the node type a node record was created with
    /// (e.g. `Acme.Site:Page`).
    NodeTypeName,
    "node type name",
    validate_node_type_name
);

string_id!(
    /// Optional name of a hierarchy edge, unique among siblings by convention
    /// only.
    NodeName,
    "node name",
    validate_ascii_name
);

string_id!(
    /// Name of a reference property; multiple destinations per name form an
    /// ordered sequence.
    ReferenceName,
    "reference name",
    validate_ascii_name
);

string_id!(
    /// A tag applied to a subtree (e.g. `disabled`), inherited by descendants.
    SubtreeTag,
    "subtree tag",
    validate_subtree_tag
);

fn validate_aggregate_id(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("must not be empty");
    }
    if value.len() > 64 {
        return Err("must be at most 64 characters");
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("may only contain ASCII letters, digits, '-' and '_'");
    }
    Ok(())
}

fn validate_node_type_name(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("must not be empty");
    }
    if value.len() > 255 {
        return Err("must be at most 255 characters");
    }
    if value.chars().any(char::is_whitespace) {
        return Err("must not contain whitespace");
    }
    Ok(())
}

fn validate_ascii_name(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("must not be empty");
    }
    if value.len() > 255 {
        return Err("must be at most 255 characters");
    }
    // The name columns use an ASCII charset.
    if !value.is_ascii() || value.chars().any(|c| c.is_ascii_control()) {
        return Err("must be printable ASCII");
    }
    Ok(())
}

fn validate_subtree_tag(value: &str) -> Result<(), &'static str> {
    if value.is_empty() || value.len() > 36 {
        return Err("must be between 1 and 36 characters");
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'))
    {
        return Err("may only contain lowercase ASCII letters, digits, '_', '-' and '.'");
    }
    Ok(())
}

/// Identifier of a content stream (a branchable, versioned timeline).
///
/// Freshly generated ids are UUID v7 so they sort by creation time; any UUID
/// is accepted when parsing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentStreamId(uuid::Uuid);

impl ContentStreamId {
    /// Generate a new time-ordered content stream id.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from the hyphenated or simple UUID form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidUuid(e.to_string()))
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for ContentStreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for ContentStreamId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for ContentStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentStreamId({})", self.short_id())
    }
}

impl fmt::Display for ContentStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal, storage-local key of one concrete (node aggregate, origin
/// dimension space point) row.
///
/// Anchors are never exposed outside the storage layer. Anchor `0` is
/// reserved as the virtual parent of root node edges.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAnchorPoint(u64);

impl NodeAnchorPoint {
    /// The virtual parent anchor of every root node edge.
    pub const ROOT_EDGE: Self = Self(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn is_root_edge(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NodeAnchorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAnchorPoint({})", self.0)
    }
}

impl fmt::Display for NodeAnchorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
