//! The seam between the query executor and the database engine.
//!
//! The executor only needs two things from an engine: turn SQL text into a
//! reusable handle, and run a handle against bound values. [`SqliteEngine`]
//! provides both over a `rusqlite` connection; tests substitute stubs.

mod sqlite;

pub use sqlite::{SqliteEngine, SqliteStatement};

use crate::cache::Release;
use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A compiled statement that can be run any number of times.
pub trait PreparedStatement: Release {
    /// Bind `params` positionally and collect every result row in engine
    /// order. Failures are reported as [`SqlTagError::Execution`].
    ///
    /// [`SqlTagError::Execution`]: crate::SqlTagError::Execution
    fn run(&mut self, params: &[Value]) -> Result<Vec<Row>>;
}

/// Something that compiles SQL text into [`PreparedStatement`]s.
pub trait Engine {
    type Statement: PreparedStatement;

    /// Compile `sql`. Failures are reported as [`SqlTagError::Prepare`].
    ///
    /// [`SqlTagError::Prepare`]: crate::SqlTagError::Prepare
    fn prepare(&self, sql: &str) -> Result<Self::Statement>;
}
