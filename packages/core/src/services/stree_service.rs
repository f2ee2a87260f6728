//! StreeService - request-level entry points
//!
//! Wires the inserter, query engine and deleter to one store and one event
//! sink. Every call forwards its decision events to the sink before
//! returning.
//!
//! Ensure and delete calls on the same group are serialized inside one
//! process by a per-group async mutex, so an insert under a parent cannot
//! interleave with that parent's removal. Queries take no lock. Malformed
//! paths never take a lock, and a group's mutex is dropped from the map as
//! soon as no request holds it.
//!
//! Two flavors of each operation exist:
//!
//! - `ensure` / `query` / `delete` degrade every failure to the zero value
//!   (0 or an empty list)
//! - `try_ensure` / `try_query` / `try_delete` return the aborting
//!   [`HierarchyError`] instead

use crate::db::NodeStore;
use crate::hierarchy::{
    HierarchyDeleter, HierarchyError, HierarchyInserter, HierarchyQueryEngine, Outcome,
};
use crate::models::{DottedPath, NodeRequest};
use crate::services::event_sink::{EventSink, TracingSink};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handle on one group's mutex, returned to the map by `release_group_lock`
struct GroupLock {
    group: String,
    mutex: Arc<Mutex<()>>,
}

pub struct StreeService {
    inserter: HierarchyInserter,
    engine: HierarchyQueryEngine,
    deleter: HierarchyDeleter,
    sink: Arc<dyn EventSink>,
    group_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StreeService {
    /// Build a service over `store` that reports through [`TracingSink`]
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self {
            inserter: HierarchyInserter::new(store.clone()),
            engine: HierarchyQueryEngine::new(store.clone()),
            deleter: HierarchyDeleter::new(store),
            sink: Arc::new(TracingSink),
            group_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Ensure `request.node` (`g.p.a`) exists; returns the number of rows created
    pub async fn ensure(&self, request: &NodeRequest) -> u64 {
        self.try_ensure(request).await.unwrap_or(0)
    }

    pub async fn try_ensure(&self, request: &NodeRequest) -> Result<u64, HierarchyError> {
        let lock = self.group_lock(&request.node).await;
        let outcome = {
            let _guard = match &lock {
                Some(lock) => Some(lock.mutex.lock().await),
                None => None,
            };
            self.inserter.ensure_path(&request.node).await
        };
        self.release_group_lock(lock).await;

        self.publish("ensure", outcome)
    }

    /// Run the query selected by `request.query_type`; empty on any failure
    pub async fn query(&self, request: &NodeRequest) -> Vec<String> {
        self.try_query(request).await.unwrap_or_default()
    }

    pub async fn try_query(&self, request: &NodeRequest) -> Result<Vec<String>, HierarchyError> {
        let outcome = self.engine.run(&request.node, request.query_type).await;
        self.publish("query", outcome)
    }

    /// Delete `request.node`; returns the number of rows removed
    pub async fn delete(&self, request: &NodeRequest) -> u64 {
        self.try_delete(request).await.unwrap_or(0)
    }

    pub async fn try_delete(&self, request: &NodeRequest) -> Result<u64, HierarchyError> {
        let lock = self.group_lock(&request.node).await;
        let outcome = {
            let _guard = match &lock {
                Some(lock) => Some(lock.mutex.lock().await),
                None => None,
            };
            self.deleter.delete(&request.node, request.force_delete).await
        };
        self.release_group_lock(lock).await;

        self.publish("delete", outcome)
    }

    fn publish<T>(&self, operation: &str, outcome: Outcome<T>) -> Result<T, HierarchyError> {
        for event in &outcome.events {
            self.sink.record(operation, event);
        }
        outcome.into_result()
    }

    /// Mutex shared by every request under the same group
    ///
    /// `None` for a malformed path; those fail validation without touching
    /// the store, so there is nothing to serialize.
    async fn group_lock(&self, node: &str) -> Option<GroupLock> {
        let group = DottedPath::parse(node).ok()?.group().to_string();
        let mut locks = self.group_locks.lock().await;
        let mutex = locks
            .entry(group.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Some(GroupLock { group, mutex })
    }

    /// Drop the map entry once no other request holds or waits on it
    async fn release_group_lock(&self, lock: Option<GroupLock>) {
        let Some(GroupLock { group, mutex }) = lock else {
            return;
        };
        let mut locks = self.group_locks.lock().await;
        // one reference in the map, one here
        let idle = locks
            .get(&group)
            .map_or(false, |current| Arc::ptr_eq(current, &mutex))
            && Arc::strong_count(&mutex) == 2;
        if idle {
            locks.remove(&group);
        }
    }
}
