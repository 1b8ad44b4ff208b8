//! Query templates: literal fragments interleaved with bound values.
//!
//! A template with `n` values has exactly `n + 1` fragments. Rendering joins
//! the fragments with one positional `?` placeholder between each adjacent
//! pair; the values are never spliced into the SQL text, so two templates
//! that differ only in their values render to the same cache key.

use crate::error::{Result, SqlTagError};
use crate::value::Value;

/// Positional placeholder inserted between fragments.
pub const PLACEHOLDER: &str = "?";

/// Marker accepted by [`Template::from_marked`] where a value goes.
pub const VALUE_MARKER: &str = "{}";

/// Join `fragments` with placeholders for `value_count` values.
///
/// Fails with [`SqlTagError::TemplateMismatch`] unless
/// `fragments.len() == value_count + 1`.
pub fn render_sql<S: AsRef<str>>(fragments: &[S], value_count: usize) -> Result<String> {
    if fragments.len() != value_count + 1 {
        return Err(SqlTagError::TemplateMismatch {
            fragments: fragments.len(),
            values: value_count,
        });
    }

    let len = fragments.iter().map(|f| f.as_ref().len()).sum::<usize>() + value_count;
    let mut sql = String::with_capacity(len);
    for (i, fragment) in fragments.iter().enumerate() {
        if i > 0 {
            sql.push_str(PLACEHOLDER);
        }
        sql.push_str(fragment.as_ref());
    }
    Ok(sql)
}

/// An owned query template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    fragments: Vec<String>,
    values: Vec<Value>,
}

impl Template {
    /// Start a template with a leading literal fragment.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![text.into()],
            values: Vec::new(),
        }
    }

    /// Build a template from pre-split parts. Counts are checked when the
    /// template is rendered, not here.
    pub fn from_parts<S: Into<String>>(fragments: Vec<S>, values: Vec<Value>) -> Self {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            values,
        }
    }

    /// Split `text` on `{}` markers, one per value.
    pub fn from_marked(text: &str, values: Vec<Value>) -> Self {
        Self {
            fragments: text.split(VALUE_MARKER).map(str::to_string).collect(),
            values,
        }
    }

    /// Bind a value after the current fragment and open a new, empty one.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self.fragments.push(String::new());
        self
    }

    /// Append literal text to the current fragment.
    pub fn push(mut self, text: &str) -> Self {
        match self.fragments.last_mut() {
            Some(last) => last.push_str(text),
            None => self.fragments.push(text.to_string()),
        }
        self
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The SQL text this template prepares as.
    pub fn sql(&self) -> Result<String> {
        render_sql(&self.fragments, self.values.len())
    }

    /// The SQL text together with the values to bind, in order.
    pub fn render(&self) -> Result<(String, &[Value])> {
        Ok((self.sql()?, &self.values))
    }
}

/// Build a [`Template`] from alternating literal fragments and values.
///
/// The argument list starts and ends with a fragment, so a template that
/// ends in a value needs a trailing `""`:
///
/// ```rust,ignore
/// let template = sqltag::sql!("SELECT * FROM products WHERE id = ", id, "");
/// ```
#[macro_export]
macro_rules! sql {
    ($head:literal $(, $value:expr, $tail:literal)* $(,)?) => {
        $crate::Template::from_parts(
            ::std::vec![$head $(, $tail)*],
            ::std::vec![$($crate::Value::from($value)),*],
        )
    };
}
