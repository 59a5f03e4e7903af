//! Values carried by filters and written rows.

use serde::{Deserialize, Serialize};

/// A literal value as understood by the datastore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<CqlValue>),
}

fn escape_text(s: &str) -> String {
    s.replace('\'', "''")
}

impl CqlValue {
    /// Render as a CQL literal.
    pub fn to_cql(&self) -> String {
        match self {
            CqlValue::Null => "null".to_string(),
            CqlValue::Bool(b) => b.to_string(),
            CqlValue::Int(n) => n.to_string(),
            CqlValue::Float(f) => format!("{:?}", f),
            CqlValue::Text(s) => format!("'{}'", escape_text(s)),
            CqlValue::List(items) => {
                let inner = items.iter().map(|v| v.to_cql()).collect::<Vec<_>>().join(", ");
                format!("[{}]", inner)
            }
        }
    }

    /// The CQL type a column holding this value would be created with.
    pub fn inferred_cql_type(&self) -> String {
        match self {
            CqlValue::Null | CqlValue::Text(_) => "text".to_string(),
            CqlValue::Bool(_) => "boolean".to_string(),
            CqlValue::Int(_) => "bigint".to_string(),
            CqlValue::Float(_) => "double".to_string(),
            CqlValue::List(items) => {
                let element = items
                    .iter()
                    .find(|v| !matches!(v, CqlValue::Null))
                    .map(|v| v.inferred_cql_type())
                    .unwrap_or_else(|| "text".to_string());
                format!("list<{}>", element)
            }
        }
    }
}

impl From<&str> for CqlValue {
    fn from(s: &str) -> Self {
        CqlValue::Text(s.to_string())
    }
}

impl From<String> for CqlValue {
    fn from(s: String) -> Self {
        CqlValue::Text(s)
    }
}

impl From<i64> for CqlValue {
    fn from(n: i64) -> Self {
        CqlValue::Int(n)
    }
}

impl From<i32> for CqlValue {
    fn from(n: i32) -> Self {
        CqlValue::Int(n as i64)
    }
}

impl From<f64> for CqlValue {
    fn from(f: f64) -> Self {
        CqlValue::Float(f)
    }
}

impl From<bool> for CqlValue {
    fn from(b: bool) -> Self {
        CqlValue::Bool(b)
    }
}

/// A named value within a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub value: CqlValue,
}

impl Cell {
    pub fn new(name: impl Into<String>, value: impl Into<CqlValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A record to write. By convention the first cell holds the partition key.
pub type Row = Vec<Cell>;
