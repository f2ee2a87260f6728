//! Hierarchy node model
//!
//! A single table row type backs the whole three-tier tree. Position in the
//! tree is carried by `level` plus the materialized ancestry `path`; there is
//! no parent foreign key.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validation errors for caller-supplied dotted paths and requests
///
/// Raised before any store access; an operation that fails validation has no
/// side effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid dotted path '{path}': expected {expected} segment(s), found {found}")]
    WrongSegmentCount {
        path: String,
        expected: String,
        found: usize,
    },

    #[error("Invalid dotted path '{path}': empty segment")]
    EmptySegment { path: String },

    #[error("Invalid query type: {0}")]
    UnknownQueryType(i64),

    #[error("Invalid hierarchy level: {0}")]
    InvalidLevel(i64),
}

/// Depth in the fixed three-tier hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum HierarchyLevel {
    Group = 1,
    Parent = 2,
    Asset = 3,
}

impl HierarchyLevel {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Level of the direct children, `None` for assets
    pub fn child(self) -> Option<Self> {
        match self {
            Self::Group => Some(Self::Parent),
            Self::Parent => Some(Self::Asset),
            Self::Asset => None,
        }
    }
}

impl TryFrom<i64> for HierarchyLevel {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Group),
            2 => Ok(Self::Parent),
            3 => Ok(Self::Asset),
            other => Err(ValidationError::InvalidLevel(other)),
        }
    }
}

impl From<HierarchyLevel> for i64 {
    fn from(level: HierarchyLevel) -> Self {
        level.as_i64()
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Group => "group",
            Self::Parent => "parent",
            Self::Asset => "asset",
        };
        f.write_str(name)
    }
}

/// A persisted hierarchy node
///
/// # Fields
///
/// - `id`: store-assigned identifier, immutable
/// - `level`: group, parent or asset
/// - `path`: `"0"` for groups, `/<group_id>` for parents, `/<group_id>/<parent_id>` for assets
/// - `node_name`: label, unique among siblings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreeNode {
    pub id: i64,
    pub level: HierarchyLevel,
    pub path: String,
    pub node_name: String,
}

/// A node that has not been inserted yet (no id)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub level: HierarchyLevel,
    pub path: String,
    pub node_name: String,
}

impl NewNode {
    pub fn new(level: HierarchyLevel, path: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            node_name: node_name.into(),
        }
    }

    /// Attach the id assigned by the store
    pub fn with_id(self, id: i64) -> StreeNode {
        StreeNode {
            id,
            level: self.level,
            path: self.path,
            node_name: self.node_name,
        }
    }
}

/// Caller-facing `group`, `group.parent` or `group.parent.asset` identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DottedPath {
    Group {
        group: String,
    },
    Parent {
        group: String,
        parent: String,
    },
    Asset {
        group: String,
        parent: String,
        asset: String,
    },
}

impl DottedPath {
    /// Parse any 1 to 3 segment dotted path
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let segments = split_segments(raw)?;
        match segments.as_slice() {
            [g] => Ok(Self::Group {
                group: g.to_string(),
            }),
            [g, p] => Ok(Self::Parent {
                group: g.to_string(),
                parent: p.to_string(),
            }),
            [g, p, a] => Ok(Self::Asset {
                group: g.to_string(),
                parent: p.to_string(),
                asset: a.to_string(),
            }),
            other => Err(ValidationError::WrongSegmentCount {
                path: raw.to_string(),
                expected: "1 to 3".to_string(),
                found: other.len(),
            }),
        }
    }

    /// Parse a path that must have exactly `expected` segments
    pub fn parse_exact(raw: &str, expected: usize) -> Result<Self, ValidationError> {
        let parsed = Self::parse(raw).map_err(|err| match err {
            ValidationError::WrongSegmentCount { path, found, .. } => {
                ValidationError::WrongSegmentCount {
                    path,
                    expected: expected.to_string(),
                    found,
                }
            }
            other => other,
        })?;

        if parsed.depth() != expected {
            return Err(ValidationError::WrongSegmentCount {
                path: raw.to_string(),
                expected: expected.to_string(),
                found: parsed.depth(),
            });
        }
        Ok(parsed)
    }

    pub fn depth(&self) -> usize {
        match self {
            Self::Group { .. } => 1,
            Self::Parent { .. } => 2,
            Self::Asset { .. } => 3,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            Self::Group { group } | Self::Parent { group, .. } | Self::Asset { group, .. } => {
                group
            }
        }
    }
}

impl fmt::Display for DottedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group { group } => write!(f, "{}", group),
            Self::Parent { group, parent } => write!(f, "{}.{}", group, parent),
            Self::Asset {
                group,
                parent,
                asset,
            } => write!(f, "{}.{}.{}", group, parent, asset),
        }
    }
}

fn split_segments(raw: &str) -> Result<Vec<&str>, ValidationError> {
    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() <= 3 && segments.iter().any(|s| s.is_empty()) {
        return Err(ValidationError::EmptySegment {
            path: raw.to_string(),
        });
    }
    Ok(segments)
}

/// Request shape consumed by the ensure, query and delete entry points
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeRequest {
    pub node: String,
    #[serde(alias = "query_type")]
    pub query_type: i64,
    #[serde(alias = "force_delete")]
    pub force_delete: bool,
}

impl NodeRequest {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ..Default::default()
        }
    }

    pub fn query(node: impl Into<String>, query_type: i64) -> Self {
        Self {
            node: node.into(),
            query_type,
            force_delete: false,
        }
    }

    pub fn delete(node: impl Into<String>, force_delete: bool) -> Self {
        Self {
            node: node.into(),
            query_type: 0,
            force_delete,
        }
    }
}
