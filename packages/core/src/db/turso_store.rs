//! TursoStore - NodeStore Implementation for the libsql Backend
//!
//! Thin wrapper over [`DatabaseService`]: every method delegates to a
//! `db_*` method and converts `libsql::Row` values into [`StreeNode`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use stree_core::db::{DatabaseService, NodeStore, TursoStore};
//! use stree_core::models::HierarchyLevel;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/stree.db"), 5000).await?);
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db));
//!
//!     let group = store.get_one(HierarchyLevel::Group, "0", Some("inf")).await?;
//!     Ok(())
//! }
//! ```

use crate::db::node_store::{NodeFilter, NodeStore};
use crate::db::{DatabaseError, DatabaseService};
use crate::models::{path, HierarchyLevel, NewNode, StreeNode};
use async_trait::async_trait;
use libsql::Row;
use std::sync::Arc;

/// TursoStore implements NodeStore for the libsql backend
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Convert a `SELECT id, level, path, node_name` row into a node
    fn row_to_node(row: &Row) -> Result<StreeNode, DatabaseError> {
        let id: i64 = row.get(0)?;
        let level: i64 = row.get(1)?;
        let path: String = row.get(2)?;
        let node_name: String = row.get(3)?;

        let level = HierarchyLevel::try_from(level)
            .map_err(|e| DatabaseError::CorruptRow(format!("row {}: {}", id, e)))?;

        Ok(StreeNode {
            id,
            level,
            path,
            node_name,
        })
    }

    async fn collect_nodes(mut rows: libsql::Rows) -> Result<Vec<StreeNode>, DatabaseError> {
        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }
}

#[async_trait]
impl NodeStore for TursoStore {
    async fn get_one<'a>(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: Option<&'a str>,
    ) -> Result<Option<StreeNode>, DatabaseError> {
        let rows = self.db.db_select_nodes(level, path, node_name, true).await?;
        Ok(Self::collect_nodes(rows).await?.into_iter().next())
    }

    async fn exists(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: &str,
    ) -> Result<bool, DatabaseError> {
        Ok(self.db.db_count_nodes(level, path, node_name).await? > 0)
    }

    async fn insert_one(&self, node: NewNode) -> Result<i64, DatabaseError> {
        self.db.db_insert_node(&node).await
    }

    async fn delete_one(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: &str,
    ) -> Result<u64, DatabaseError> {
        self.db.db_delete_node(level, path, node_name).await
    }

    async fn delete_many(&self, filters: &[NodeFilter]) -> Result<u64, DatabaseError> {
        self.db.db_delete_many(filters).await
    }

    async fn find_many<'a>(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: Option<&'a str>,
    ) -> Result<Vec<StreeNode>, DatabaseError> {
        let rows = self.db.db_select_nodes(level, path, node_name, false).await?;
        Self::collect_nodes(rows).await
    }

    async fn delete_if_childless(&self, node: &StreeNode) -> Result<u64, DatabaseError> {
        match (node.level.child(), path::child_path(node)) {
            (Some(child_level), Some(child_path)) => {
                self.db
                    .db_delete_if_childless(node.id, child_level, &child_path)
                    .await
            }
            _ => {
                self.db
                    .db_delete_node(node.level, &node.path, &node.node_name)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (TursoStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path, 5000).await.unwrap());
        (TursoStore::new(db), temp_dir)
    }

    #[tokio::test]
    async fn test_insert_and_get_one() {
        let (store, _temp) = create_test_store().await;

        let id = store
            .insert_one(NewNode::new(HierarchyLevel::Group, "0", "inf"))
            .await
            .unwrap();

        let found = store
            .get_one(HierarchyLevel::Group, "0", Some("inf"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.level, HierarchyLevel::Group);
        assert_eq!(found.path, "0");
        assert_eq!(found.node_name, "inf");

        assert!(store
            .get_one(HierarchyLevel::Group, "0", Some("missing"))
            .await
            .unwrap()
            .is_none());
        assert!(store.exists(HierarchyLevel::Group, "0", "inf").await.unwrap());
        assert!(!store.exists(HierarchyLevel::Parent, "0", "inf").await.unwrap());
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let (store, _temp) = create_test_store().await;

        let a = store
            .insert_one(NewNode::new(HierarchyLevel::Group, "0", "a"))
            .await
            .unwrap();
        let b = store
            .insert_one(NewNode::new(HierarchyLevel::Group, "0", "b"))
            .await
            .unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_distinguishable() {
        let (store, _temp) = create_test_store().await;
        let node = NewNode::new(HierarchyLevel::Parent, "/1", "monitor");

        store.insert_one(node.clone()).await.unwrap();
        let err = store.insert_one(node).await.unwrap_err();

        assert!(matches!(
            err,
            DatabaseError::DuplicateKey { level: HierarchyLevel::Parent, ref path, ref node_name }
                if path == "/1" && node_name == "monitor"
        ));
    }

    #[tokio::test]
    async fn test_find_many_in_creation_order() {
        let (store, _temp) = create_test_store().await;

        for name in ["thanos", "kafka", "prometheus"] {
            store
                .insert_one(NewNode::new(HierarchyLevel::Asset, "/1/2", name))
                .await
                .unwrap();
        }
        store
            .insert_one(NewNode::new(HierarchyLevel::Asset, "/1/3", "other"))
            .await
            .unwrap();

        let names: Vec<String> = store
            .find_many(HierarchyLevel::Asset, "/1/2", None)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.node_name)
            .collect();
        assert_eq!(names, vec!["thanos", "kafka", "prometheus"]);

        let narrowed = store
            .find_many(HierarchyLevel::Asset, "/1/2", Some("kafka"))
            .await
            .unwrap();
        assert_eq!(narrowed.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_one() {
        let (store, _temp) = create_test_store().await;
        store
            .insert_one(NewNode::new(HierarchyLevel::Asset, "/1/2", "kafka"))
            .await
            .unwrap();

        assert_eq!(
            store
                .delete_one(HierarchyLevel::Asset, "/1/2", "kafka")
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .delete_one(HierarchyLevel::Asset, "/1/2", "kafka")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_delete_if_childless_respects_children() {
        let (store, _temp) = create_test_store().await;

        let group_id = store
            .insert_one(NewNode::new(HierarchyLevel::Group, "0", "inf"))
            .await
            .unwrap();
        let group = store
            .get_one(HierarchyLevel::Group, "0", Some("inf"))
            .await
            .unwrap()
            .unwrap();
        store
            .insert_one(NewNode::new(
                HierarchyLevel::Parent,
                path::parent_path(group_id),
                "monitor",
            ))
            .await
            .unwrap();

        assert_eq!(store.delete_if_childless(&group).await.unwrap(), 0);
        assert!(store.exists(HierarchyLevel::Group, "0", "inf").await.unwrap());

        store
            .delete_one(HierarchyLevel::Parent, &path::parent_path(group_id), "monitor")
            .await
            .unwrap();
        assert_eq!(store.delete_if_childless(&group).await.unwrap(), 1);
        assert!(!store.exists(HierarchyLevel::Group, "0", "inf").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_many_is_atomic_sum() {
        let (store, _temp) = create_test_store().await;

        let group_id = store
            .insert_one(NewNode::new(HierarchyLevel::Group, "0", "inf"))
            .await
            .unwrap();
        let parent_path = path::parent_path(group_id);
        let parent_id = store
            .insert_one(NewNode::new(HierarchyLevel::Parent, parent_path.clone(), "monitor"))
            .await
            .unwrap();
        store
            .insert_one(NewNode::new(
                HierarchyLevel::Asset,
                path::asset_path(&parent_path, parent_id),
                "kafka",
            ))
            .await
            .unwrap();

        let group = store
            .get_one(HierarchyLevel::Group, "0", Some("inf"))
            .await
            .unwrap()
            .unwrap();
        let deleted = store
            .delete_many(&[
                NodeFilter::descendants_of_group(group_id),
                NodeFilter::node(&group),
            ])
            .await
            .unwrap();

        assert_eq!(deleted, 3);
        assert!(store
            .find_many(HierarchyLevel::Parent, &parent_path, None)
            .await
            .unwrap()
            .is_empty());
    }
}
