//! SQLite engine backed by a borrowed `rusqlite` connection.

use super::{Engine, PreparedStatement};
use crate::cache::Release;
use crate::error::{Result, SqlTagError};
use crate::row::Row;
use crate::value::Value;
use rusqlite::{params_from_iter, Connection, Statement};
use std::sync::Arc;

/// Prepares statements on a borrowed connection.
///
/// Statements borrow the connection too, so every handle is finalized
/// before the connection can be closed.
#[derive(Debug, Clone, Copy)]
pub struct SqliteEngine<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEngine<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

impl<'conn> Engine for SqliteEngine<'conn> {
    type Statement = SqliteStatement<'conn>;

    fn prepare(&self, sql: &str) -> Result<SqliteStatement<'conn>> {
        let stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| SqlTagError::prepare(sql, e))?;
        Ok(SqliteStatement {
            sql: sql.to_string(),
            stmt,
        })
    }
}

/// A prepared SQLite statement together with the text it was compiled from.
pub struct SqliteStatement<'conn> {
    sql: String,
    stmt: Statement<'conn>,
}

impl SqliteStatement<'_> {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of positional parameters the statement expects.
    pub fn parameter_count(&self) -> usize {
        self.stmt.parameter_count()
    }
}

impl PreparedStatement for SqliteStatement<'_> {
    fn run(&mut self, params: &[Value]) -> Result<Vec<Row>> {
        let columns: Arc<[String]> = self
            .stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();

        let mut rows = self
            .stmt
            .query(params_from_iter(params))
            .map_err(|e| SqlTagError::execution(&self.sql, e))?;

        let mut decoded = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| SqlTagError::execution(&self.sql, e))?
        {
            let values = (0..width)
                .map(|idx| row.get::<_, Value>(idx))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| SqlTagError::execution(&self.sql, e))?;
            decoded.push(Row::new(Arc::clone(&columns), values));
        }

        Ok(decoded)
    }
}

impl Release for SqliteStatement<'_> {
    fn release(self) -> Result<()> {
        let SqliteStatement { sql, stmt } = self;
        stmt.finalize().map_err(|e| SqlTagError::Release {
            sql,
            message: e.to_string(),
            source: Some(e),
        })
    }
}

impl std::fmt::Debug for SqliteStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}
