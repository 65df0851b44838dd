//! Statement types.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// An opaque server-side handle standing in for uploaded SQL text.
///
/// Handles are allocated by the client and registered on the session with
/// [`SqlStore::store_sql`](crate::session::SqlStore::store_sql).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SqlId(pub u32);

/// SQL text of a statement: literal, or a stored-text handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sql {
    Text { sql: String },
    Stored { sql_id: SqlId },
}

impl Sql {
    pub fn text(sql: impl Into<String>) -> Self {
        Sql::Text { sql: sql.into() }
    }

    /// Returns the literal text, if this SQL has not been rewritten to a
    /// stored handle.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Sql::Text { sql } => Some(sql),
            Sql::Stored { .. } => None,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Sql::Stored { .. })
    }
}

/// A named statement argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArg {
    pub name: String,
    pub value: Value,
}

/// A single SQL statement with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(flatten)]
    pub sql: Sql,

    /// Positional arguments, bound in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,

    /// Named arguments; binding semantics are the server's.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub named_args: Vec<NamedArg>,

    /// When false, the server executes the statement but does not
    /// accumulate result rows.
    #[serde(default = "default_want_rows")]
    pub want_rows: bool,
}

fn default_want_rows() -> bool {
    true
}

impl Stmt {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: Sql::text(sql),
            args: Vec::new(),
            named_args: Vec::new(),
            want_rows: true,
        }
    }

    /// Appends a positional argument.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends a named argument.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named_args.push(NamedArg {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Marks the statement as row-less (DDL, writes).
    pub fn without_rows(mut self) -> Self {
        self.want_rows = false;
        self
    }
}

impl From<&str> for Stmt {
    fn from(sql: &str) -> Self {
        Stmt::new(sql)
    }
}

impl From<String> for Stmt {
    fn from(sql: String) -> Self {
        Stmt::new(sql)
    }
}
