//! Materialized path encoding
//!
//! Groups sit at the root sentinel `"0"`. A parent's path is built from the
//! group id alone (`/<group_id>`); the sentinel is never concatenated. An
//! asset's path is its parent's own path plus the parent id.

use super::node::{HierarchyLevel, StreeNode};

/// Path shared by every level-1 node
pub const ROOT_PATH: &str = "0";

pub fn root_path() -> &'static str {
    ROOT_PATH
}

/// Path of every parent under the group with `group_id`
pub fn parent_path(group_id: i64) -> String {
    format!("/{}", group_id)
}

/// Path of every asset under the parent at `parent_path` with `parent_id`
pub fn asset_path(parent_path: &str, parent_id: i64) -> String {
    format!("{}/{}", parent_path, parent_id)
}

/// Path that the direct children of `node` carry, `None` for assets
pub fn child_path(node: &StreeNode) -> Option<String> {
    match node.level {
        HierarchyLevel::Group => Some(parent_path(node.id)),
        HierarchyLevel::Parent => Some(asset_path(&node.path, node.id)),
        HierarchyLevel::Asset => None,
    }
}

/// Path prefix covering every level-2 and level-3 descendant of a group
///
/// Descendant paths are either exactly this prefix (parents) or start with
/// the prefix followed by `/` (assets).
pub fn subtree_prefix(group_id: i64) -> String {
    parent_path(group_id)
}

/// True when `path` lies in the subtree rooted at `prefix`
pub fn in_subtree(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
