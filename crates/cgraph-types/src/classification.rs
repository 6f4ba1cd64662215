use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Classification of a node aggregate.
///
/// Stored compactly as a short ASCII code in a `binary(20)` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeClassification {
    /// Top-level node without a parent aggregate.
    Root,
    /// Ordinary node created and removed by editors.
    Regular,
    /// Framework-managed child that lives and dies with its parent.
    Tethered,
}

impl NodeClassification {
    /// The compact storage code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Regular => "regular",
            Self::Tethered => "tethered",
        }
    }

    pub fn from_code(code: &str) -> Result<Self, TypeError> {
        match code.trim_end_matches('\0') {
            "root" => Ok(Self::Root),
            "regular" => Ok(Self::Regular),
            "tethered" => Ok(Self::Tethered),
            other => Err(TypeError::InvalidClassification(other.to_string())),
        }
    }

    /// Code padded with NUL bytes to the width of the `binary(20)` column.
    pub fn to_binary(&self) -> [u8; 20] {
        let mut buf = [0u8; 20];
        let code = self.code().as_bytes();
        buf[..code.len()].copy_from_slice(code);
        buf
    }

    /// Whether a node may move from `self` to `target`.
    ///
    /// Transitions are one-way: regular nodes may become tethered, nothing
    /// else changes. Staying in the same classification is always allowed.
    pub fn can_transition_to(&self, target: Self) -> bool {
        *self == target || matches!((self, target), (Self::Regular, Self::Tethered))
    }

    /// Guarded transition; fails for anything [`can_transition_to`] rejects.
    ///
    /// [`can_transition_to`]: NodeClassification::can_transition_to
    pub fn transition_to(&self, target: Self) -> Result<Self, TypeError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(TypeError::ClassificationTransition {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    pub fn is_tethered(&self) -> bool {
        matches!(self, Self::Tethered)
    }
}

impl fmt::Display for NodeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip_through_binary_column() {
        for c in [
            NodeClassification::Root,
            NodeClassification::Regular,
            NodeClassification::Tethered,
        ] {
            let bin = c.to_binary();
            let code = std::str::from_utf8(&bin).unwrap();
            assert_eq!(NodeClassification::from_code(code).unwrap(), c);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(
            NodeClassification::from_code("bogus"),
            Err(TypeError::InvalidClassification("bogus".into()))
        );
    }

    #[test]
    fn regular_may_become_tethered() {
        assert_eq!(
            NodeClassification::Regular
                .transition_to(NodeClassification::Tethered)
                .unwrap(),
            NodeClassification::Tethered
        );
    }

    #[test]
    fn tethered_cannot_become_regular() {
        assert!(NodeClassification::Tethered
            .transition_to(NodeClassification::Regular)
            .is_err());
    }

    #[test]
    fn root_is_fixed() {
        assert!(!NodeClassification::Root.can_transition_to(NodeClassification::Regular));
        assert!(!NodeClassification::Regular.can_transition_to(NodeClassification::Root));
        assert!(NodeClassification::Root.can_transition_to(NodeClassification::Root));
    }

    #[test]
    fn serde_uses_lowercase_codes() {
        let json = serde_json::to_string(&NodeClassification::Tethered).unwrap();
        assert_eq!(json, "\"tethered\"");
    }
}
