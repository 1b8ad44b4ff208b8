//! Error types for sqltag.
//!
//! Engine errors are split by the phase that produced them, because the
//! query executor reacts differently to each: a prepare failure leaves the
//! statement cache untouched, an execution failure evicts the statement.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the sqltag library.
#[derive(Debug, Error)]
pub enum SqlTagError {
    // Engine errors
    #[error("Failed to prepare `{sql}`: {message}")]
    Prepare {
        sql: String,
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Failed to execute `{sql}`: {message}")]
    Execution {
        sql: String,
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Failed to release statement `{sql}`: {message}")]
    Release {
        sql: String,
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Template errors
    #[error("Template has {fragments} fragments for {values} values (expected {} fragments)", .values + 1)]
    TemplateMismatch { fragments: usize, values: usize },

    // Connection-level database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for sqltag operations.
pub type Result<T> = std::result::Result<T, SqlTagError>;

impl From<std::io::Error> for SqlTagError {
    fn from(err: std::io::Error) -> Self {
        SqlTagError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SqlTagError {
    fn from(err: serde_json::Error) -> Self {
        SqlTagError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for SqlTagError {
    fn from(err: rusqlite::Error) -> Self {
        SqlTagError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl SqlTagError {
    /// Create a prepare error for `sql` from an engine error.
    pub fn prepare(sql: impl Into<String>, err: rusqlite::Error) -> Self {
        SqlTagError::Prepare {
            sql: sql.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an execution error for `sql` from an engine error.
    pub fn execution(sql: impl Into<String>, err: rusqlite::Error) -> Self {
        SqlTagError::Execution {
            sql: sql.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        SqlTagError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True if the engine rejected the SQL text itself.
    pub fn is_prepare(&self) -> bool {
        matches!(self, SqlTagError::Prepare { .. })
    }

    /// True if the statement prepared but failed while running.
    pub fn is_execution(&self) -> bool {
        matches!(self, SqlTagError::Execution { .. })
    }

    /// The SQL text the error refers to, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            SqlTagError::Prepare { sql, .. }
            | SqlTagError::Execution { sql, .. }
            | SqlTagError::Release { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqlTagError::Prepare {
            sql: "SELEC 1".into(),
            message: "syntax error".into(),
            source: None,
        };
        assert_eq!(err.to_string(), "Failed to prepare `SELEC 1`: syntax error");
    }

    #[test]
    fn test_template_mismatch_display() {
        let err = SqlTagError::TemplateMismatch {
            fragments: 1,
            values: 2,
        };
        assert_eq!(
            err.to_string(),
            "Template has 1 fragments for 2 values (expected 3 fragments)"
        );
    }

    #[test]
    fn test_classification() {
        let prepare = SqlTagError::Prepare {
            sql: "x".into(),
            message: String::new(),
            source: None,
        };
        let execution = SqlTagError::Execution {
            sql: "y".into(),
            message: String::new(),
            source: None,
        };
        assert!(prepare.is_prepare());
        assert!(!prepare.is_execution());
        assert!(execution.is_execution());
        assert_eq!(execution.sql(), Some("y"));
        assert_eq!(SqlTagError::Config { message: "bad".into() }.sql(), None);
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: SqlTagError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, SqlTagError::Database { source: Some(_), .. }));
    }
}
