//! Statement results.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A result column descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Col {
    pub name: Option<String>,
    pub decltype: Option<String>,
}

impl Col {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            decltype: None,
        }
    }
}

/// Result of a single executed statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StmtResult {
    pub cols: Vec<Col>,
    pub rows: Vec<Vec<Value>>,
    pub affected_row_count: u64,
    /// Rowid of the last insert, if the statement inserted a row.
    /// Encoded as a decimal string on the wire to survive JSON integer
    /// precision limits.
    #[serde(default, with = "rowid_string", skip_serializing_if = "Option::is_none")]
    pub last_insert_rowid: Option<i64>,
}

impl StmtResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A parameter descriptor returned by describe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeParam {
    pub name: Option<String>,
}

/// Result of describing a statement without executing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeResult {
    pub params: Vec<DescribeParam>,
    pub cols: Vec<Col>,
    pub is_explain: bool,
    pub is_readonly: bool,
}

mod rowid_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) => s
                .parse::<i64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid rowid: {s:?}"))),
            None => Ok(None),
        }
    }
}
