//! Data Models
//!
//! - `StreeNode` / `NewNode` - the single hierarchy row type
//! - `HierarchyLevel` - group, parent, asset
//! - `DottedPath` / `NodeRequest` - caller-facing identifiers and request shape
//! - [`path`] - materialized path encoding

mod node;
pub mod path;

pub use node::{DottedPath, HierarchyLevel, NewNode, NodeRequest, StreeNode, ValidationError};
