//! SQLite database handle that hands out query tags.

use crate::config::QueryTagConfig;
use crate::error::{Result, SqlTagError};
use crate::executor::QueryTag;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// An open SQLite database plus the configuration its query tags use.
///
/// Query tags borrow the database, so every tag (and every statement it
/// caches) is dropped before the database can be closed.
pub struct Database {
    conn: Connection,
    config: QueryTagConfig,
}

impl Database {
    /// Open or create a database file at `path`.
    pub fn open(path: impl AsRef<Path>, config: QueryTagConfig) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SqlTagError::Io {
                message: format!("Failed to create database directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| SqlTagError::Database {
            message: format!("Failed to open database: {}", e),
            source: Some(e),
        })?;

        debug!(path = %path.display(), "Opened database");
        Ok(Self::from_connection(conn, config))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(config: QueryTagConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| SqlTagError::Database {
            message: format!("Failed to open in-memory database: {}", e),
            source: Some(e),
        })?;
        Ok(Self::from_connection(conn, config))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection, config: QueryTagConfig) -> Self {
        Self { conn, config }
    }

    /// Create a query tag with this database's cache capacity.
    ///
    /// Each tag owns an independent statement cache.
    pub fn query_tag(&self) -> QueryTag<'_> {
        QueryTag::for_connection(&self.conn, &self.config)
    }

    /// Run one or more `;`-separated statements without caching anything.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| SqlTagError::execution(sql, e))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &QueryTagConfig {
        &self.config
    }

    /// Close the connection, reporting any error SQLite returns.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| SqlTagError::Database {
            message: format!("Failed to close database: {}", e),
            source: Some(e),
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use tempfile::TempDir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory(QueryTagConfig::default()).unwrap();
        db.execute_batch("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();

        let mut tag = db.query_tag();
        assert_eq!(tag.cache_capacity(), 100);
        let rows = tag.execute(&["SELECT id FROM t"], &[]).unwrap();
        assert_eq!(rows[0].get("id"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("app.db");

        let db = Database::open(&path, QueryTagConfig::with_cache_capacity(3)).unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert_eq!(db.config().cache_capacity, 3);
        db.close().unwrap();
    }

    #[test]
    fn test_tags_have_independent_caches() {
        let db = Database::open_in_memory(QueryTagConfig::default()).unwrap();
        let mut first = db.query_tag();
        let second = db.query_tag();

        first.execute(&["SELECT 1"], &[]).unwrap();
        assert_eq!(first.cache_size(), 1);
        assert_eq!(second.cache_size(), 0);
    }

    #[test]
    fn test_execute_batch_error() {
        let db = Database::open_in_memory(QueryTagConfig::default()).unwrap();
        let err = db.execute_batch("CREATE TABLE").unwrap_err();
        assert!(err.is_execution());
    }

    #[test]
    fn test_from_connection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
        let db = Database::from_connection(conn, QueryTagConfig::with_cache_capacity(1));
        let mut tag = db.query_tag();
        assert!(tag.execute(&["SELECT * FROM t"], &[]).unwrap().is_empty());
    }
}
