//! sqltag - parameterized SQLite queries with prepared statement reuse.
//!
//! A query is written as literal SQL fragments with values between them.
//! The fragments are joined with `?` placeholders into the SQL text, which
//! is the cache key: the same query shape with different values reuses one
//! prepared statement. Each query tag keeps a bounded LRU cache of
//! statements; statements that fail at run time are evicted so the next
//! call prepares against the current schema.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqltag::{sql, Database, QueryTagConfig};
//!
//! fn main() -> sqltag::Result<()> {
//!     let db = Database::open_in_memory(QueryTagConfig::default())?;
//!     db.execute_batch("CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//!     let mut tag = db.query_tag();
//!     let id = 1_i64;
//!     let rows = tag.query(&sql!("SELECT * FROM products WHERE id = ", id, ""))?;
//!     println!("Found {} rows, {} cached statements", rows.len(), tag.cache_size());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod executor;
pub mod row;
pub mod template;
pub mod value;

// Re-export commonly used types
pub use cache::{CacheStats, Lease, Release, StatementCache};
pub use config::QueryTagConfig;
pub use database::Database;
pub use engine::{Engine, PreparedStatement, SqliteEngine, SqliteStatement};
pub use error::{Result, SqlTagError};
pub use executor::{create_query_tag, QueryExecutor, QueryTag};
pub use row::Row;
pub use template::{render_sql, Template, PLACEHOLDER};
pub use value::Value;
