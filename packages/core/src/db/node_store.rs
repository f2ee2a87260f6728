//! NodeStore Trait - Persistence Abstraction
//!
//! The hierarchy components never talk to a database directly; they receive
//! an `Arc<dyn NodeStore>` at construction time. Two implementations ship
//! with the crate: [`TursoStore`](crate::db::TursoStore) over libsql and
//! [`MemoryStore`](crate::db::MemoryStore) for in-process use.
//!
//! # Contract
//!
//! - `insert_one` must fail with [`DatabaseError::DuplicateKey`] when the
//!   `(level, path, node_name)` key is already taken.
//! - `find_many` returns rows in creation (id) order.
//! - `delete_many` applies all of its filters atomically.
//! - `delete_if_childless` checks for children and deletes in one atomic step.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stree_core::db::{DatabaseService, NodeStore, TursoStore};
//! use stree_core::models::{HierarchyLevel, NewNode};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/stree.db"), 5000).await?);
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db));
//!
//!     let id = store
//!         .insert_one(NewNode::new(HierarchyLevel::Group, "0", "inf"))
//!         .await?;
//!     println!("created group {}", id);
//!     Ok(())
//! }
//! ```

use crate::db::DatabaseError;
use crate::models::{path, HierarchyLevel, NewNode, StreeNode};
use async_trait::async_trait;

/// How a [`NodeFilter`] matches the `path` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatch {
    /// Path equals the given string
    Exact(String),
    /// Path equals the prefix or continues it with `/`
    Subtree(String),
}

impl PathMatch {
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact(p) => candidate == p,
            Self::Subtree(prefix) => path::in_subtree(candidate, prefix),
        }
    }
}

/// Predicate for bulk deletes
///
/// All set fields are combined with AND; `levels` is an IN-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFilter {
    pub levels: Vec<HierarchyLevel>,
    pub path: PathMatch,
    pub node_name: Option<String>,
    pub id: Option<i64>,
}

impl NodeFilter {
    /// Every parent and asset below the group with `group_id`
    pub fn descendants_of_group(group_id: i64) -> Self {
        Self {
            levels: vec![HierarchyLevel::Parent, HierarchyLevel::Asset],
            path: PathMatch::Subtree(path::subtree_prefix(group_id)),
            node_name: None,
            id: None,
        }
    }

    /// Exactly this node
    pub fn node(node: &StreeNode) -> Self {
        Self {
            levels: vec![node.level],
            path: PathMatch::Exact(node.path.clone()),
            node_name: Some(node.node_name.clone()),
            id: Some(node.id),
        }
    }

    pub fn matches(&self, node: &StreeNode) -> bool {
        self.levels.contains(&node.level)
            && self.path.matches(&node.path)
            && self.node_name.as_deref().map_or(true, |n| n == node.node_name)
            && self.id.map_or(true, |id| id == node.id)
    }
}

/// Abstraction layer for hierarchy node persistence
///
/// Implementations must be `Send + Sync`; every method is async so both
/// embedded and networked backends fit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Point lookup by level and path, optionally narrowed by name
    ///
    /// Returns `Ok(None)` when nothing matches. Without a name the first
    /// match in id order is returned.
    async fn get_one<'a>(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: Option<&'a str>,
    ) -> Result<Option<StreeNode>, DatabaseError>;

    /// Whether a node with this exact key exists
    async fn exists(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: &str,
    ) -> Result<bool, DatabaseError>;

    /// Insert a node and return its assigned id
    ///
    /// # Errors
    ///
    /// [`DatabaseError::DuplicateKey`] if the `(level, path, node_name)` key
    /// is taken; any other variant for transport or query failures.
    async fn insert_one(&self, node: NewNode) -> Result<i64, DatabaseError>;

    /// Delete the node with this exact key, returning rows affected
    async fn delete_one(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: &str,
    ) -> Result<u64, DatabaseError>;

    /// Delete every row matching any of `filters` in one transaction
    ///
    /// Returns the total rows affected. On failure nothing is deleted.
    async fn delete_many(&self, filters: &[NodeFilter]) -> Result<u64, DatabaseError>;

    /// All nodes at `level` and `path`, optionally narrowed by name, in id order
    async fn find_many<'a>(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: Option<&'a str>,
    ) -> Result<Vec<StreeNode>, DatabaseError>;

    /// Delete `node` only if it has no children at the moment of deletion
    ///
    /// Returns 0 when the node has children or no longer exists.
    async fn delete_if_childless(&self, node: &StreeNode) -> Result<u64, DatabaseError>;
}
