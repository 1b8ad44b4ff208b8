//! Query execution through the statement cache.
//!
//! [`QueryExecutor`] renders a template to SQL text, fetches (or prepares)
//! the statement for that text from its [`StatementCache`], and runs it with
//! the template's values. When a cached statement fails at run time the
//! entry is invalidated before the error is returned, so the next identical
//! query prepares afresh against the current schema.

use crate::cache::{CacheStats, StatementCache};
use crate::config::QueryTagConfig;
use crate::engine::{Engine, PreparedStatement, SqliteEngine};
use crate::error::Result;
use crate::row::Row;
use crate::template::{render_sql, Template};
use crate::value::Value;
use rusqlite::Connection;
use tracing::debug;

/// Runs parameterized queries with prepared statement reuse.
///
/// `execute` takes `&mut self`: one executor serves one caller at a time,
/// and prepare and run happen within the same call.
pub struct QueryExecutor<E: Engine> {
    engine: E,
    cache: StatementCache<E::Statement>,
}

/// A query executor over a borrowed SQLite connection.
pub type QueryTag<'conn> = QueryExecutor<SqliteEngine<'conn>>;

/// Create a query tag over `conn` using `config`.
pub fn create_query_tag<'conn>(conn: &'conn Connection, config: &QueryTagConfig) -> QueryTag<'conn> {
    QueryTag::for_connection(conn, config)
}

impl<'conn> QueryExecutor<SqliteEngine<'conn>> {
    /// Create a query tag preparing statements on `conn`.
    pub fn for_connection(conn: &'conn Connection, config: &QueryTagConfig) -> Self {
        Self::with_config(SqliteEngine::new(conn), config)
    }

    pub fn connection(&self) -> &'conn Connection {
        self.engine.connection()
    }
}

impl<E: Engine> QueryExecutor<E> {
    /// Create an executor with an empty cache of `cache_capacity` entries.
    pub fn new(engine: E, cache_capacity: usize) -> Self {
        Self {
            engine,
            cache: StatementCache::new(cache_capacity),
        }
    }

    pub fn with_config(engine: E, config: &QueryTagConfig) -> Self {
        Self::new(engine, config.cache_capacity)
    }

    /// Run the query formed by `fragments` with `values` bound between them.
    ///
    /// `fragments` must hold exactly one more element than `values`; any
    /// other shape fails with [`SqlTagError::TemplateMismatch`] before the
    /// cache or the engine is touched.
    ///
    /// [`SqlTagError::TemplateMismatch`]: crate::SqlTagError::TemplateMismatch
    pub fn execute<S: AsRef<str>>(&mut self, fragments: &[S], values: &[Value]) -> Result<Vec<Row>> {
        let sql = render_sql(fragments, values.len())?;
        self.run_cached(&sql, values)
    }

    /// Run a [`Template`].
    pub fn query(&mut self, template: &Template) -> Result<Vec<Row>> {
        self.execute(template.fragments(), template.values())
    }

    fn run_cached(&mut self, sql: &str, values: &[Value]) -> Result<Vec<Row>> {
        let engine = &self.engine;
        let mut lease = self.cache.get_or_create(sql, || engine.prepare(sql))?;
        let outcome = lease.run(values);
        lease.finish();

        outcome.map_err(|err| {
            if self.cache.invalidate(sql) {
                debug!(sql, "Dropped cached statement after execution failure");
            }
            err
        })
    }

    /// Drop every cached statement.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Whether a statement for `sql` is resident.
    pub fn is_cached(&self, sql: &str) -> bool {
        self.cache.contains(sql)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: Engine> std::fmt::Debug for QueryExecutor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
