//! Database Error Types
//!
//! Errors raised by the persistence collaborator. `DuplicateKey` is kept
//! distinct from other failures so the inserter can absorb concurrent
//! creation of the same node.

use crate::models::HierarchyLevel;
use std::path::PathBuf;
use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A node with the same `(level, path, node_name)` already exists
    #[error("Duplicate node: level={level} path={path} name={node_name}")]
    DuplicateKey {
        level: HierarchyLevel,
        path: String,
        node_name: String,
    },

    /// A stored row could not be mapped back onto the node model
    #[error("Corrupt node row: {0}")]
    CorruptRow(String),
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a duplicate key error
    pub fn duplicate_key(
        level: HierarchyLevel,
        path: impl Into<String>,
        node_name: impl Into<String>,
    ) -> Self {
        Self::DuplicateKey {
            level,
            path: path.into(),
            node_name: node_name.into(),
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
