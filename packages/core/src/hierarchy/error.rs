//! Hierarchy operation errors

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Why a hierarchy operation aborted
///
/// Rejections (a delete blocked by children) and "not found" are not errors;
/// they show up as a zero result plus events.
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// The dotted path or request was malformed; the store was not touched
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The persistence layer failed mid-operation
    #[error("Store operation failed: {0}")]
    Store(#[from] DatabaseError),
}
