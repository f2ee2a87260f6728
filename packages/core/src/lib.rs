//! STree Core - Three-Tier Hierarchy Engine
//!
//! Maintains a `group.parent.asset` namespace in a single relational table.
//! Position in the tree is encoded as a materialized ancestry path on each
//! row rather than a parent foreign key.
//!
//! # Modules
//!
//! - [`models`] - Node rows, dotted paths, request shape, path encoding
//! - [`db`] - `NodeStore` trait with libsql and in-memory implementations
//! - [`hierarchy`] - Inserter, query engine and deleter
//! - [`services`] - `StreeService` entry points and event sinks
//! - [`config`] - Runtime configuration

pub mod config;
pub mod db;
pub mod hierarchy;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::StreeConfig;
pub use db::{DatabaseError, DatabaseService, MemoryStore, NodeStore, TursoStore};
pub use hierarchy::{HierarchyError, HierarchyEvent, Outcome, TreeQuery};
pub use models::*;
pub use services::*;
