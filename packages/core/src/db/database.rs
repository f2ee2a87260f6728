//! Database Connection Management
//!
//! libsql/Turso connection handling and the `stree_path` schema.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE stree_path (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     level INTEGER NOT NULL,
//!     path TEXT NOT NULL,
//!     node_name TEXT NOT NULL,
//!     UNIQUE (level, path, node_name)
//! )
//! ```
//!
//! The unique key is what makes concurrent ensure-insert safe: the losing
//! writer gets a constraint failure, surfaced as `DatabaseError::DuplicateKey`.
//!
//! # Connections
//!
//! Async code must use `connect_with_timeout()`. The busy timeout lets
//! concurrent writers wait instead of failing with `SQLITE_BUSY`.

use crate::db::error::DatabaseError;
use crate::db::node_store::{NodeFilter, PathMatch};
use crate::models::{HierarchyLevel, NewNode};
use libsql::params::Params;
use libsql::{Builder, Database, Value};
use std::path::PathBuf;
use std::sync::Arc;

const NODE_COLUMNS: &str = "id, level, path, node_name";

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use stree_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_service = DatabaseService::new(PathBuf::from("/path/to/stree.db"), 5000).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    /// Busy timeout applied to every connection
    pub busy_timeout_ms: u64,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path` and initialize the schema
    ///
    /// This will:
    /// 1. Ensure the parent directory exists
    /// 2. Open/create the database file
    /// 3. Enable WAL mode and the busy timeout
    /// 4. Create the `stree_path` table and its index (idempotent)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created, the
    /// connection fails, or schema initialization fails.
    pub async fn new(db_path: PathBuf, busy_timeout_ms: u64) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };

        service.initialize_schema().await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so they go through query() rather than execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create the table and index; safe to call on an existing database
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS stree_path (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                level INTEGER NOT NULL,
                path TEXT NOT NULL,
                node_name TEXT NOT NULL,
                UNIQUE (level, path, node_name)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create stree_path table: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stree_path_level_path ON stree_path(level, path)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create path index: {}", e))
        })?;

        tracing::debug!(path = %self.db_path.display(), "stree_path schema ready");
        Ok(())
    }

    /// Get a synchronous connection handle
    ///
    /// Only for code that never holds the connection across `.await`;
    /// everything else should use `connect_with_timeout()`.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with the configured busy timeout applied
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;

        Ok(conn)
    }

    //
    // NODE OPERATIONS
    // Raw SQL behind the TursoStore implementation of NodeStore.
    //

    /// Select rows at `level`/`path`, optionally narrowed by name, in id order
    ///
    /// Returns the raw libsql rows; the caller converts them to nodes.
    pub async fn db_select_nodes(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: Option<&str>,
        limit_one: bool,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let limit_clause = if limit_one { " LIMIT 1" } else { "" };

        let (query, params) = match node_name {
            Some(name) => (
                format!(
                    "SELECT {} FROM stree_path WHERE level = ? AND path = ? AND node_name = ? ORDER BY id{}",
                    NODE_COLUMNS, limit_clause
                ),
                Params::Positional(vec![
                    Value::Integer(level.as_i64()),
                    Value::Text(path.to_string()),
                    Value::Text(name.to_string()),
                ]),
            ),
            None => (
                format!(
                    "SELECT {} FROM stree_path WHERE level = ? AND path = ? ORDER BY id{}",
                    NODE_COLUMNS, limit_clause
                ),
                Params::Positional(vec![
                    Value::Integer(level.as_i64()),
                    Value::Text(path.to_string()),
                ]),
            ),
        };

        let mut stmt = conn.prepare(&query).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare select query: {}", e))
        })?;

        stmt.query(params).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute select query: {}", e))
        })
    }

    /// Count rows with this exact key (0 or 1 under the unique constraint)
    pub async fn db_count_nodes(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: &str,
    ) -> Result<i64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT COUNT(*) FROM stree_path WHERE level = ? AND path = ? AND node_name = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare count query: {}", e))
            })?;

        let mut rows = stmt
            .query((level.as_i64(), path, node_name))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute count query: {}", e))
            })?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => row.get::<i64>(0).map_err(DatabaseError::LibsqlError),
            None => Ok(0),
        }
    }

    /// Insert a node and return the new rowid
    ///
    /// A unique-constraint failure is mapped to `DatabaseError::DuplicateKey`.
    pub async fn db_insert_node(&self, node: &NewNode) -> Result<i64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let result = conn
            .execute(
                "INSERT INTO stree_path (level, path, node_name) VALUES (?, ?, ?)",
                (node.level.as_i64(), node.path.as_str(), node.node_name.as_str()),
            )
            .await;

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => Err(DatabaseError::duplicate_key(
                node.level,
                node.path.clone(),
                node.node_name.clone(),
            )),
            Err(e) => Err(DatabaseError::sql_execution(format!(
                "Failed to insert node: {}",
                e
            ))),
        }
    }

    /// Delete the row with this exact key
    pub async fn db_delete_node(
        &self,
        level: HierarchyLevel,
        path: &str,
        node_name: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "DELETE FROM stree_path WHERE level = ? AND path = ? AND node_name = ?",
            (level.as_i64(), path, node_name),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete node: {}", e)))
    }

    /// Delete the row with `id` unless some row sits at `child_level`/`child_path`
    ///
    /// One statement, so no writer can slip a child in between the check and
    /// the delete.
    pub async fn db_delete_if_childless(
        &self,
        id: i64,
        child_level: HierarchyLevel,
        child_path: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "DELETE FROM stree_path WHERE id = ?
             AND NOT EXISTS (SELECT 1 FROM stree_path WHERE level = ? AND path = ?)",
            (id, child_level.as_i64(), child_path),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to delete childless node: {}", e))
        })
    }

    /// Apply every filter as a DELETE inside one transaction
    ///
    /// Rolls back and returns the error if any statement fails.
    pub async fn db_delete_many(&self, filters: &[NodeFilter]) -> Result<u64, DatabaseError> {
        if filters.is_empty() {
            return Ok(0);
        }

        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE TRANSACTION", ())
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
            })?;

        let mut total = 0u64;
        for filter in filters {
            let (clause, params) = filter_to_sql(filter);
            let sql = format!("DELETE FROM stree_path WHERE {}", clause);

            match conn.execute(&sql, Params::Positional(params)).await {
                Ok(affected) => {
                    tracing::debug!(where_clause = %clause, affected, "bulk delete");
                    total += affected;
                }
                Err(e) => {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(DatabaseError::sql_execution(format!(
                        "Failed to delete nodes ({}): {}",
                        clause, e
                    )));
                }
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }

        Ok(total)
    }
}

/// Render a filter as a parameterized WHERE clause
fn filter_to_sql(filter: &NodeFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if filter.levels.is_empty() {
        clauses.push("0".to_string());
    } else {
        let placeholders = vec!["?"; filter.levels.len()].join(", ");
        clauses.push(format!("level IN ({})", placeholders));
        params.extend(filter.levels.iter().map(|l| Value::Integer(l.as_i64())));
    }

    match &filter.path {
        PathMatch::Exact(path) => {
            clauses.push("path = ?".to_string());
            params.push(Value::Text(path.clone()));
        }
        PathMatch::Subtree(prefix) => {
            // substr keeps LIKE wildcards in names out of the match
            clauses.push("(path = ? OR substr(path, 1, ?) = ?)".to_string());
            let with_slash = format!("{}/", prefix);
            params.push(Value::Text(prefix.clone()));
            params.push(Value::Integer(with_slash.len() as i64));
            params.push(Value::Text(with_slash));
        }
    }

    if let Some(name) = &filter.node_name {
        clauses.push("node_name = ?".to_string());
        params.push(Value::Text(name.clone()));
    }

    if let Some(id) = filter.id {
        clauses.push("id = ?".to_string());
        params.push(Value::Integer(id));
    }

    (clauses.join(" AND "), params)
}

fn is_unique_violation(err: &libsql::Error) -> bool {
    // SQLITE_CONSTRAINT is primary code 19; extended codes keep it in the low byte
    matches!(err, libsql::Error::SqliteFailure(code, _) if (*code & 0xff) == 19)
        || err.to_string().contains("UNIQUE constraint failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_db() -> (DatabaseService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = DatabaseService::new(db_path, 5000).await.unwrap();
        (db, temp_dir)
    }

    #[tokio::test]
    async fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db_service = DatabaseService::new(db_path.clone(), 5000).await.unwrap();

        assert_eq!(db_service.db_path, db_path);
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_schema_initialization() {
        let (db, _temp) = create_test_db().await;
        let conn = db.connect().unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name='stree_path'")
            .await
            .unwrap();
        let mut rows = stmt.query(()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let table_name: String = row.get(0).unwrap();
        assert_eq!(table_name, "stree_path");

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name='idx_stree_path_level_path'")
            .await
            .unwrap();
        let mut rows = stmt.query(()).await.unwrap();
        assert!(rows.next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_parent_directory_creation() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("dirs").join("test.db");

        let _db_service = DatabaseService::new(nested_path.clone(), 5000).await.unwrap();

        assert!(nested_path.exists());
    }

    #[tokio::test]
    async fn test_idempotent_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let first = DatabaseService::new(db_path.clone(), 5000).await.unwrap();
        first
            .db_insert_node(&NewNode::new(HierarchyLevel::Group, "0", "inf"))
            .await
            .unwrap();

        let second = DatabaseService::new(db_path, 5000).await.unwrap();
        assert_eq!(
            second
                .db_count_nodes(HierarchyLevel::Group, "0", "inf")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_unique_constraint_maps_to_duplicate_key() {
        let (db, _temp) = create_test_db().await;
        let node = NewNode::new(HierarchyLevel::Group, "0", "inf");

        db.db_insert_node(&node).await.unwrap();
        let err = db.db_insert_node(&node).await.unwrap_err();

        assert!(err.is_duplicate_key(), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_same_name_allowed_under_different_paths() {
        let (db, _temp) = create_test_db().await;

        db.db_insert_node(&NewNode::new(HierarchyLevel::Parent, "/1", "monitor"))
            .await
            .unwrap();
        db.db_insert_node(&NewNode::new(HierarchyLevel::Parent, "/2", "monitor"))
            .await
            .unwrap();
        db.db_insert_node(&NewNode::new(HierarchyLevel::Asset, "/1", "monitor"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_many_subtree_clause() {
        let (db, _temp) = create_test_db().await;

        for (level, path, name) in [
            (HierarchyLevel::Parent, "/1", "a"),
            (HierarchyLevel::Asset, "/1/2", "b"),
            (HierarchyLevel::Parent, "/12", "c"),
            (HierarchyLevel::Asset, "/12/4", "d"),
        ] {
            db.db_insert_node(&NewNode::new(level, path, name))
                .await
                .unwrap();
        }

        let deleted = db
            .db_delete_many(&[NodeFilter::descendants_of_group(1)])
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        assert_eq!(
            db.db_count_nodes(HierarchyLevel::Parent, "/12", "c")
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            db.db_count_nodes(HierarchyLevel::Asset, "/12/4", "d")
                .await
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_filter_to_sql_shape() {
        let (clause, params) = filter_to_sql(&NodeFilter::descendants_of_group(7));

        assert_eq!(
            clause,
            "level IN (?, ?) AND (path = ? OR substr(path, 1, ?) = ?)"
        );
        assert_eq!(params.len(), 5);
        assert!(matches!(&params[2], Value::Text(p) if p == "/7"));
        assert!(matches!(params[3], Value::Integer(3)));
        assert!(matches!(&params[4], Value::Text(p) if p == "/7/"));
    }
}
