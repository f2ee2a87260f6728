//! Read modes over the hierarchy
//!
//! The wire format selects a mode with an integer tag (1, 2 or 3). It is
//! parsed once into [`TreeQuery`] and each variant has its own handler.
//! A missing ancestor short-circuits to an empty result; absence is never an
//! error.

use crate::db::{DatabaseError, NodeStore};
use crate::hierarchy::events::{EventLog, Outcome};
use crate::models::{path, DottedPath, HierarchyLevel, StreeNode, ValidationError};
use std::sync::Arc;

/// A parsed query request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeQuery {
    /// Mode 1: names of the parents under `group`, sorted
    Children { group: String },
    /// Mode 2: every `group.parent.asset` under `group`, grouped by parent
    Leaves { group: String },
    /// Mode 3: every `group.parent.asset` under one parent, sorted
    ParentLeaves { group: String, parent: String },
}

impl TreeQuery {
    /// Build a query from the request's dotted node and integer mode tag
    ///
    /// Modes 1 and 2 take a single group segment; mode 3 takes `group.parent`.
    pub fn from_request(node: &str, query_type: i64) -> Result<Self, ValidationError> {
        match query_type {
            1 | 2 => {
                let group = match DottedPath::parse_exact(node, 1)? {
                    DottedPath::Group { group } => group,
                    other => return Err(segment_mismatch(node, 1, &other)),
                };
                if query_type == 1 {
                    Ok(Self::Children { group })
                } else {
                    Ok(Self::Leaves { group })
                }
            }
            3 => match DottedPath::parse_exact(node, 2)? {
                DottedPath::Parent { group, parent } => Ok(Self::ParentLeaves { group, parent }),
                other => Err(segment_mismatch(node, 2, &other)),
            },
            other => Err(ValidationError::UnknownQueryType(other)),
        }
    }

    /// Integer tag this query was parsed from
    pub fn mode(&self) -> i64 {
        match self {
            Self::Children { .. } => 1,
            Self::Leaves { .. } => 2,
            Self::ParentLeaves { .. } => 3,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            Self::Children { group } | Self::Leaves { group } | Self::ParentLeaves { group, .. } => {
                group
            }
        }
    }

    fn dotted(&self) -> String {
        match self {
            Self::Children { group } | Self::Leaves { group } => group.clone(),
            Self::ParentLeaves { group, parent } => format!("{}.{}", group, parent),
        }
    }
}

fn segment_mismatch(node: &str, expected: usize, parsed: &DottedPath) -> ValidationError {
    ValidationError::WrongSegmentCount {
        path: node.to_string(),
        expected: expected.to_string(),
        found: parsed.depth(),
    }
}

/// Runs [`TreeQuery`] requests against a store
pub struct HierarchyQueryEngine {
    store: Arc<dyn NodeStore>,
}

impl HierarchyQueryEngine {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Parse and run a raw `(node, query_type)` request
    pub async fn run(&self, node: &str, query_type: i64) -> Outcome<Vec<String>> {
        match TreeQuery::from_request(node, query_type) {
            Ok(query) => self.query(&query).await,
            Err(err) => {
                let mut log = EventLog::new(node);
                log.warn("query.invalid_request", &err);
                log.fail(Vec::new(), err)
            }
        }
    }

    pub async fn query(&self, query: &TreeQuery) -> Outcome<Vec<String>> {
        let mut log = EventLog::new(query.dotted());
        let result = match query {
            TreeQuery::Children { group } => self.children(&mut log, group).await,
            TreeQuery::Leaves { group } => self.leaves(&mut log, group).await,
            TreeQuery::ParentLeaves { group, parent } => {
                self.parent_leaves(&mut log, group, parent).await
            }
        };

        match result {
            Ok(names) => {
                log.info_count("query.done", names.len() as u64);
                log.finish(names)
            }
            Err(err) => log.fail(Vec::new(), err),
        }
    }

    /// Mode 1
    async fn children(
        &self,
        log: &mut EventLog,
        group: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let Some(group) = self.group_node(log, group).await? else {
            return Ok(Vec::new());
        };

        let parents = self
            .fetch(log, "query.parents", HierarchyLevel::Parent, &path::parent_path(group.id))
            .await?;

        let mut names: Vec<String> = parents.into_iter().map(|p| p.node_name).collect();
        names.sort();
        Ok(names)
    }

    /// Mode 2
    async fn leaves(
        &self,
        log: &mut EventLog,
        group: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let Some(group) = self.group_node(log, group).await? else {
            return Ok(Vec::new());
        };

        let parents = self
            .fetch(log, "query.parents", HierarchyLevel::Parent, &path::parent_path(group.id))
            .await?;
        if parents.is_empty() {
            log.info("query.parents.empty");
            return Ok(Vec::new());
        }

        let mut leaves = Vec::new();
        for parent in &parents {
            let asset_path = path::asset_path(&parent.path, parent.id);
            match self
                .store
                .find_many(HierarchyLevel::Asset, &asset_path, None)
                .await
            {
                Ok(assets) => leaves.extend(
                    assets
                        .into_iter()
                        .map(|a| format!("{}.{}.{}", group.node_name, parent.node_name, a.node_name)),
                ),
                // one unreadable parent does not hide the others
                Err(err) => log.error("query.assets.fetch_failed", &err),
            }
        }
        Ok(leaves)
    }

    /// Mode 3
    async fn parent_leaves(
        &self,
        log: &mut EventLog,
        group: &str,
        parent: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let Some(group) = self.group_node(log, group).await? else {
            return Ok(Vec::new());
        };

        let parent_node = match self
            .store
            .get_one(HierarchyLevel::Parent, &path::parent_path(group.id), Some(parent))
            .await
        {
            Ok(Some(node)) => node,
            Ok(None) => {
                log.info("query.parent.not_found");
                return Ok(Vec::new());
            }
            Err(err) => {
                log.error("query.parent.lookup_failed", &err);
                return Err(err);
            }
        };

        let assets = self
            .fetch(
                log,
                "query.assets",
                HierarchyLevel::Asset,
                &path::asset_path(&parent_node.path, parent_node.id),
            )
            .await?;

        let mut leaves: Vec<String> = assets
            .into_iter()
            .map(|a| format!("{}.{}.{}", group.node_name, parent_node.node_name, a.node_name))
            .collect();
        leaves.sort();
        Ok(leaves)
    }

    async fn group_node(
        &self,
        log: &mut EventLog,
        group: &str,
    ) -> Result<Option<StreeNode>, DatabaseError> {
        match self
            .store
            .get_one(HierarchyLevel::Group, path::root_path(), Some(group))
            .await
        {
            Ok(Some(node)) => Ok(Some(node)),
            Ok(None) => {
                log.info("query.group.not_found");
                Ok(None)
            }
            Err(err) => {
                log.error("query.group.lookup_failed", &err);
                Err(err)
            }
        }
    }

    async fn fetch(
        &self,
        log: &mut EventLog,
        event: &str,
        level: HierarchyLevel,
        child_path: &str,
    ) -> Result<Vec<StreeNode>, DatabaseError> {
        self.store
            .find_many(level, child_path, None)
            .await
            .map_err(|err| {
                log.error(format!("{}.fetch_failed", event), &err);
                err
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, MockNodeStore};
    use crate::hierarchy::{HierarchyError, HierarchyInserter};
    use crate::models::NewNode;

    async fn seeded(paths: &[&str]) -> HierarchyQueryEngine {
        let store = Arc::new(MemoryStore::new());
        let inserter = HierarchyInserter::new(store.clone());
        for p in paths {
            assert!(inserter.ensure_path(p).await.is_ok());
        }
        HierarchyQueryEngine::new(store)
    }

    #[test]
    fn test_from_request_dispatch() {
        assert_eq!(
            TreeQuery::from_request("inf", 1).unwrap(),
            TreeQuery::Children {
                group: "inf".to_string()
            }
        );
        assert_eq!(TreeQuery::from_request("inf", 2).unwrap().mode(), 2);

        let parent_leaves = TreeQuery::from_request("inf.monitor", 3).unwrap();
        assert_eq!(parent_leaves.group(), "inf");
        assert_eq!(parent_leaves.mode(), 3);
    }

    #[test]
    fn test_from_request_rejects_bad_shapes() {
        assert_eq!(
            TreeQuery::from_request("inf", 7),
            Err(ValidationError::UnknownQueryType(7))
        );
        assert!(matches!(
            TreeQuery::from_request("inf", 3),
            Err(ValidationError::WrongSegmentCount { found: 1, .. })
        ));
        assert!(matches!(
            TreeQuery::from_request("inf.monitor", 1),
            Err(ValidationError::WrongSegmentCount { found: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_children_sorted() {
        let engine = seeded(&["inf.monitor.thanos", "inf.monitor.kafka", "inf.alert.pager"]).await;

        let outcome = engine.run("inf", 1).await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.value, vec!["alert", "monitor"]);
    }

    #[tokio::test]
    async fn test_leaves_grouped_by_parent() {
        let engine = seeded(&[
            "inf.monitor.thanos",
            "inf.monitor.kafka",
            "inf.alert.pager",
            "inf.monitor.prometheus",
        ])
        .await;

        let outcome = engine.run("inf", 2).await;
        assert_eq!(
            outcome.value,
            vec![
                "inf.monitor.thanos",
                "inf.monitor.kafka",
                "inf.monitor.prometheus",
                "inf.alert.pager",
            ]
        );
    }

    #[tokio::test]
    async fn test_parent_leaves_sorted() {
        let engine = seeded(&[
            "inf.monitor.thanos",
            "inf.monitor.kafka",
            "inf.monitor.prometheus",
            "inf.alert.pager",
        ])
        .await;

        let outcome = engine.run("inf.monitor", 3).await;
        assert_eq!(
            outcome.value,
            vec![
                "inf.monitor.kafka",
                "inf.monitor.prometheus",
                "inf.monitor.thanos",
            ]
        );
    }

    #[tokio::test]
    async fn test_absence_is_empty_not_error() {
        let engine = seeded(&["inf.monitor.kafka"]).await;

        for (node, mode) in [("waimai", 1), ("waimai", 2), ("waimai.monitor", 3), ("inf.ts", 3)] {
            let outcome = engine.run(node, mode).await;
            assert!(outcome.is_ok(), "{} mode {}", node, mode);
            assert!(outcome.value.is_empty());
        }

        let outcome = engine.run("inf.ts", 3).await;
        assert!(outcome.has_event("query.parent.not_found"));
    }

    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let engine = HierarchyQueryEngine::new(Arc::new(MockNodeStore::new()));

        let outcome = engine.run("inf.monitor.kafka", 1).await;
        assert!(outcome.value.is_empty());
        assert!(outcome.has_event("query.invalid_request"));
        assert!(matches!(outcome.error, Some(HierarchyError::Validation(_))));
    }

    #[tokio::test]
    async fn test_leaves_skip_failed_parent() {
        let mut store = MockNodeStore::new();
        store
            .expect_get_one()
            .returning(|_, _, _| Ok(Some(NewNode::new(HierarchyLevel::Group, "0", "inf").with_id(1))));
        store
            .expect_find_many()
            .withf(|level, _, _| *level == HierarchyLevel::Parent)
            .returning(|_, _, _| {
                Ok(vec![
                    NewNode::new(HierarchyLevel::Parent, "/1", "monitor").with_id(2),
                    NewNode::new(HierarchyLevel::Parent, "/1", "alert").with_id(3),
                ])
            });
        store
            .expect_find_many()
            .withf(|level, path, _| *level == HierarchyLevel::Asset && path == "/1/2")
            .returning(|_, _, _| Err(crate::db::DatabaseError::sql_execution("disk I/O error")));
        store
            .expect_find_many()
            .withf(|level, path, _| *level == HierarchyLevel::Asset && path == "/1/3")
            .returning(|_, _, _| Ok(vec![NewNode::new(HierarchyLevel::Asset, "/1/3", "pager").with_id(4)]));

        let engine = HierarchyQueryEngine::new(Arc::new(store));
        let outcome = engine.run("inf", 2).await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.value, vec!["inf.alert.pager"]);
        assert!(outcome.has_event("query.assets.fetch_failed"));
    }

    #[tokio::test]
    async fn test_group_lookup_failure_degrades_to_empty() {
        let mut store = MockNodeStore::new();
        store
            .expect_get_one()
            .returning(|_, _, _| Err(crate::db::DatabaseError::sql_execution("database is locked")));

        let engine = HierarchyQueryEngine::new(Arc::new(store));
        let outcome = engine.run("inf", 1).await;

        assert!(outcome.value.is_empty());
        assert!(outcome.has_event("query.group.lookup_failed"));
        assert!(matches!(outcome.error, Some(HierarchyError::Store(_))));
    }
}
