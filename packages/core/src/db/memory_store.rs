//! MemoryStore - in-process NodeStore
//!
//! Same contract as `TursoStore` (unique key, id order, atomic bulk and
//! guarded deletes), held in a `BTreeMap` behind one async mutex.

use crate::db::node_store::{NodeFilter, NodeStore};
use crate::db::DatabaseError;
use crate::models::{path, HierarchyLevel, NewNode, StreeNode};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryTable {
    next_id: i64,
    rows: BTreeMap<i64, StreeNode>,
}

impl MemoryTable {
    fn matching<'a>(
        &'a self,
        level: HierarchyLevel,
        path: &'a str,
        node_name: Option<&'a str>,
    ) -> impl Iterator<Item = &'a StreeNode> + 'a {
        self.rows.values().filter(move |n| {
            n.level == level
                && n.path == path
                && node_name.map_or(true, |name| n.node_name == name)
        })
    }
}

/// In-memory hierarchy table
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<MemoryTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every row in id order
    pub async fn all_nodes(&self) -> Vec<StreeNode> {
        self.table.lock().await.rows.values().cloned().collect()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn get_one<'a>(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: Option<&'a str>,
    ) -> Result<Option<StreeNode>, DatabaseError> {
        let table = self.table.lock().await;
        let found = table.matching(level, path, node_name).next().cloned();
        Ok(found)
    }

    async fn exists(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: &str,
    ) -> Result<bool, DatabaseError> {
        let table = self.table.lock().await;
        let found = table.matching(level, path, Some(node_name)).next().is_some();
        Ok(found)
    }

    async fn insert_one(&self, node: NewNode) -> Result<i64, DatabaseError> {
        let mut table = self.table.lock().await;

        if table
            .matching(node.level, &node.path, Some(node.node_name.as_str()))
            .next()
            .is_some()
        {
            return Err(DatabaseError::duplicate_key(
                node.level,
                node.path,
                node.node_name,
            ));
        }

        table.next_id += 1;
        let id = table.next_id;
        table.rows.insert(id, node.with_id(id));
        Ok(id)
    }

    async fn delete_one(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: &str,
    ) -> Result<u64, DatabaseError> {
        let mut table = self.table.lock().await;
        let ids: Vec<i64> = table
            .matching(level, path, Some(node_name))
            .map(|n| n.id)
            .collect();
        for id in &ids {
            table.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn delete_many(&self, filters: &[NodeFilter]) -> Result<u64, DatabaseError> {
        let mut table = self.table.lock().await;
        let ids: Vec<i64> = table
            .rows
            .values()
            .filter(|n| filters.iter().any(|f| f.matches(n)))
            .map(|n| n.id)
            .collect();
        for id in &ids {
            table.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn find_many<'a>(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: Option<&'a str>,
    ) -> Result<Vec<StreeNode>, DatabaseError> {
        let table = self.table.lock().await;
        Ok(table.matching(level, path, node_name).cloned().collect())
    }

    async fn delete_if_childless(&self, node: &StreeNode) -> Result<u64, DatabaseError> {
        let mut table = self.table.lock().await;

        if let (Some(child_level), Some(child_path)) = (node.level.child(), path::child_path(node))
        {
            if table.matching(child_level, &child_path, None).next().is_some() {
                return Ok(0);
            }
        }

        Ok(table.rows.remove(&node.id).map_or(0, |_| 1))
    }
}
