//! Cascading ensure-insert of `group.parent.asset` chains
//!
//! Each level is looked up before it is inserted, so a call that starts
//! after a partial failure resumes at the first missing level. Once a level
//! has just been created its children cannot exist yet, and their lookups
//! are skipped.
//!
//! A `DuplicateKey` from the store means a concurrent caller created the
//! same node first. That counts as "already exists": the row is re-read and
//! the chain continues beneath it.

use crate::db::{DatabaseError, NodeStore};
use crate::hierarchy::events::{EventLog, Outcome};
use crate::models::{path, DottedPath, HierarchyLevel, NewNode, StreeNode, ValidationError};
use std::sync::Arc;

/// Result of resolving one level of the chain
struct Resolved {
    node: StreeNode,
    created: bool,
}

/// Ensures full g.p.a chains exist
pub struct HierarchyInserter {
    store: Arc<dyn NodeStore>,
}

impl HierarchyInserter {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Make sure every level of `dotted` (exactly `g.p.a`) exists
    ///
    /// The outcome value is the number of rows created; 0 when the chain was
    /// already complete. On a store failure the rows created so far stay in
    /// place and the error is carried in the outcome.
    pub async fn ensure_path(&self, dotted: &str) -> Outcome<u64> {
        let mut log = EventLog::new(dotted);

        let parsed = DottedPath::parse_exact(dotted, 3).and_then(|p| match p {
            DottedPath::Asset {
                group,
                parent,
                asset,
            } => Ok((group, parent, asset)),
            other => Err(ValidationError::WrongSegmentCount {
                path: dotted.to_string(),
                expected: "3".to_string(),
                found: other.depth(),
            }),
        });
        let (group, parent, asset) = match parsed {
            Ok(segments) => segments,
            Err(err) => {
                log.warn("ensure.invalid_path", &err);
                return log.fail(0, err);
            }
        };

        let mut created = 0u64;

        let group_node = NewNode::new(HierarchyLevel::Group, path::root_path(), group);
        let group = match self.resolve(&mut log, group_node, true).await {
            Ok(resolved) => resolved,
            Err(err) => return log.fail(created, err),
        };
        created += u64::from(group.created);

        let parent_node = NewNode::new(
            HierarchyLevel::Parent,
            path::parent_path(group.node.id),
            parent,
        );
        let parent = match self.resolve(&mut log, parent_node, !group.created).await {
            Ok(resolved) => resolved,
            Err(err) => return log.fail(created, err),
        };
        created += u64::from(parent.created);

        let asset_node = NewNode::new(
            HierarchyLevel::Asset,
            path::asset_path(&parent.node.path, parent.node.id),
            asset,
        );
        match self.ensure_leaf(&mut log, asset_node, !parent.created).await {
            Ok(asset_created) => created += u64::from(asset_created),
            Err(err) => return log.fail(created, err),
        }

        log.finish(created)
    }

    /// Find or create an interior node (group or parent)
    ///
    /// `lookup` is false when the ancestor was just created by this call.
    async fn resolve(
        &self,
        log: &mut EventLog,
        node: NewNode,
        lookup: bool,
    ) -> Result<Resolved, DatabaseError> {
        let level = node.level;

        if lookup {
            match self
                .store
                .get_one(level, &node.path, Some(&node.node_name))
                .await
            {
                Ok(Some(existing)) => {
                    log.info(format!("ensure.{}.exists", level));
                    return Ok(Resolved {
                        node: existing,
                        created: false,
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    log.error(format!("ensure.{}.lookup_failed", level), &err);
                    return Err(err);
                }
            }
        }

        match self.store.insert_one(node.clone()).await {
            Ok(id) => {
                log.info(format!("ensure.{}.created", level));
                Ok(Resolved {
                    node: node.with_id(id),
                    created: true,
                })
            }
            Err(dup) if dup.is_duplicate_key() => {
                log.warn(format!("ensure.{}.concurrent_insert", level), &dup);
                match self
                    .store
                    .get_one(level, &node.path, Some(&node.node_name))
                    .await
                {
                    Ok(Some(existing)) => Ok(Resolved {
                        node: existing,
                        created: false,
                    }),
                    Ok(None) => {
                        // created and removed again before the re-read
                        log.error(format!("ensure.{}.vanished", level), &dup);
                        Err(dup)
                    }
                    Err(err) => {
                        log.error(format!("ensure.{}.lookup_failed", level), &err);
                        Err(err)
                    }
                }
            }
            Err(err) => {
                log.error(format!("ensure.{}.insert_failed", level), &err);
                Err(err)
            }
        }
    }

    /// Create the asset unless it already exists; true when a row was added
    async fn ensure_leaf(
        &self,
        log: &mut EventLog,
        node: NewNode,
        lookup: bool,
    ) -> Result<bool, DatabaseError> {
        if lookup {
            match self
                .store
                .exists(node.level, &node.path, &node.node_name)
                .await
            {
                Ok(true) => {
                    log.info("ensure.asset.exists");
                    return Ok(false);
                }
                Ok(false) => {}
                Err(err) => {
                    log.error("ensure.asset.lookup_failed", &err);
                    return Err(err);
                }
            }
        }

        match self.store.insert_one(node).await {
            Ok(_) => {
                log.info("ensure.asset.created");
                Ok(true)
            }
            Err(dup) if dup.is_duplicate_key() => {
                log.warn("ensure.asset.concurrent_insert", &dup);
                Ok(false)
            }
            Err(err) => {
                log.error("ensure.asset.insert_failed", &err);
                Err(err)
            }
        }
    }
}
