//! Database Layer
//!
//! Persistence for the hierarchy table. Everything above this module works
//! against the [`NodeStore`] trait:
//!
//! - [`DatabaseService`] owns the libsql database, schema setup and raw SQL
//! - [`TursoStore`] implements `NodeStore` on top of it
//! - [`MemoryStore`] implements `NodeStore` in process memory

mod database;
mod error;
mod memory_store;
mod node_store;
mod turso_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use memory_store::MemoryStore;
#[cfg(test)]
pub use node_store::MockNodeStore;
pub use node_store::{NodeFilter, NodeStore, PathMatch};
pub use turso_store::TursoStore;
