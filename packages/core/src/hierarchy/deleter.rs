//! Guarded deletion of hierarchy nodes
//!
//! An interior node is only removed while it has no children. The single
//! exception is a forced group delete, which drops the whole subtree in one
//! store transaction. Rejections and "not found" return 0 without an error;
//! callers tell them apart through the recorded events.

use crate::db::{DatabaseError, NodeFilter, NodeStore};
use crate::hierarchy::events::{EventLog, Outcome};
use crate::models::{path, DottedPath, HierarchyLevel, StreeNode};
use std::sync::Arc;

/// Removes nodes addressed by 1, 2 or 3 segment dotted paths
pub struct HierarchyDeleter {
    store: Arc<dyn NodeStore>,
}

impl HierarchyDeleter {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Delete the node at `dotted`; the value is the number of rows removed
    ///
    /// `force` only applies to a one-segment (group) path.
    pub async fn delete(&self, dotted: &str, force: bool) -> Outcome<u64> {
        let mut log = EventLog::new(dotted);

        let target = match DottedPath::parse(dotted) {
            Ok(target) => target,
            Err(err) => {
                log.warn("delete.invalid_path", &err);
                return log.fail(0, err);
            }
        };

        if force && target.depth() > 1 {
            log.info("delete.force_ignored");
        }

        let result = match &target {
            DottedPath::Group { group } => self.delete_group(&mut log, group, force).await,
            DottedPath::Parent { group, parent } => {
                self.delete_parent(&mut log, group, parent).await
            }
            DottedPath::Asset {
                group,
                parent,
                asset,
            } => self.delete_asset(&mut log, group, parent, asset).await,
        };

        match result {
            Ok(count) => log.finish(count),
            Err(err) => log.fail(0, err),
        }
    }

    async fn delete_group(
        &self,
        log: &mut EventLog,
        group: &str,
        force: bool,
    ) -> Result<u64, DatabaseError> {
        let Some(group) = self
            .lookup(log, HierarchyLevel::Group, path::root_path(), group)
            .await?
        else {
            return Ok(0);
        };

        if force {
            let filters = [NodeFilter::descendants_of_group(group.id), NodeFilter::node(&group)];
            return match self.store.delete_many(&filters).await {
                Ok(count) => {
                    log.info_count("delete.group.force_deleted", count);
                    Ok(count)
                }
                Err(err) => {
                    log.error("delete.group.delete_failed", &err);
                    Err(err)
                }
            };
        }

        let parents = self.children(log, &group).await?;
        if !parents.is_empty() {
            log.rejected("delete.group.rejected", "group still has parents", parents.len());
            return Ok(0);
        }

        self.remove_childless(log, &group).await
    }

    async fn delete_parent(
        &self,
        log: &mut EventLog,
        group: &str,
        parent: &str,
    ) -> Result<u64, DatabaseError> {
        let Some(group) = self
            .lookup(log, HierarchyLevel::Group, path::root_path(), group)
            .await?
        else {
            return Ok(0);
        };
        let Some(parent) = self
            .lookup(log, HierarchyLevel::Parent, &path::parent_path(group.id), parent)
            .await?
        else {
            return Ok(0);
        };

        let assets = self.children(log, &parent).await?;
        if !assets.is_empty() {
            log.rejected("delete.parent.rejected", "parent still has assets", assets.len());
            return Ok(0);
        }

        self.remove_childless(log, &parent).await
    }

    async fn delete_asset(
        &self,
        log: &mut EventLog,
        group: &str,
        parent: &str,
        asset: &str,
    ) -> Result<u64, DatabaseError> {
        let Some(group) = self
            .lookup(log, HierarchyLevel::Group, path::root_path(), group)
            .await?
        else {
            return Ok(0);
        };
        let Some(parent) = self
            .lookup(log, HierarchyLevel::Parent, &path::parent_path(group.id), parent)
            .await?
        else {
            return Ok(0);
        };
        let asset_path = path::asset_path(&parent.path, parent.id);
        let Some(asset) = self
            .lookup(log, HierarchyLevel::Asset, &asset_path, asset)
            .await?
        else {
            return Ok(0);
        };

        match self
            .store
            .delete_one(HierarchyLevel::Asset, &asset.path, &asset.node_name)
            .await
        {
            Ok(count) => {
                log.info_count("delete.asset.deleted", count);
                Ok(count)
            }
            Err(err) => {
                log.error("delete.asset.delete_failed", &err);
                Err(err)
            }
        }
    }

    /// Exact-name lookup; records `not_found` or `lookup_failed`
    async fn lookup(
        &self,
        log: &mut EventLog,
        level: HierarchyLevel,
        path: &str,
        name: &str,
    ) -> Result<Option<StreeNode>, DatabaseError> {
        match self.store.get_one(level, path, Some(name)).await {
            Ok(Some(node)) => Ok(Some(node)),
            Ok(None) => {
                log.info(format!("delete.{}.not_found", level));
                Ok(None)
            }
            Err(err) => {
                log.error(format!("delete.{}.lookup_failed", level), &err);
                Err(err)
            }
        }
    }

    async fn children(
        &self,
        log: &mut EventLog,
        node: &StreeNode,
    ) -> Result<Vec<StreeNode>, DatabaseError> {
        let level = node.level;
        let (Some(child_level), Some(child_path)) = (level.child(), path::child_path(node)) else {
            return Ok(Vec::new());
        };
        self.store
            .find_many(child_level, &child_path, None)
            .await
            .map_err(|err| {
                log.error(format!("delete.{}.children_failed", level), &err);
                err
            })
    }

    /// Final guarded delete; a child created since the check turns it into a rejection
    async fn remove_childless(
        &self,
        log: &mut EventLog,
        node: &StreeNode,
    ) -> Result<u64, DatabaseError> {
        match self.store.delete_if_childless(node).await {
            Ok(0) => {
                log.rejected(
                    format!("delete.{}.rejected", node.level),
                    "children appeared before delete",
                    0,
                );
                Ok(0)
            }
            Ok(count) => {
                log.info_count(format!("delete.{}.deleted", node.level), count);
                Ok(count)
            }
            Err(err) => {
                log.error(format!("delete.{}.delete_failed", node.level), &err);
                Err(err)
            }
        }
    }
}
