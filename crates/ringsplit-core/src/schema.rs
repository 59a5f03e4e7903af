//! Table schema metadata as resolved from the cluster.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of index available on a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// A native secondary index: serves equality and membership lookups.
    Secondary,
    /// A custom index implementation (SASI, Lucene, ...): also serves range
    /// and pattern predicates.
    Custom,
}

impl IndexKind {
    /// Whether an index of this kind can serve a lookup that needs `required`.
    pub fn satisfies(&self, required: IndexKind) -> bool {
        match self {
            IndexKind::Custom => true,
            IndexKind::Secondary => required == IndexKind::Secondary,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Secondary => "secondary",
            IndexKind::Custom => "custom",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// The declared CQL type, e.g. `int`, `text`, `map<text, int>`.
    #[serde(rename = "type")]
    pub cql_type: String,
    #[serde(default)]
    pub partition_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexKind>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, cql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cql_type: cql_type.into(),
            partition_key: false,
            index: None,
        }
    }

    pub fn partition_key(mut self) -> Self {
        self.partition_key = true;
        self
    }

    pub fn indexed(mut self, kind: IndexKind) -> Self {
        self.index = Some(kind);
        self
    }

    pub fn is_partition_key(&self) -> bool {
        self.partition_key
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }
}

/// Schema of one table, columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub keyspace: String,
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableMetadata {
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<ColumnDefinition>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            columns,
        }
    }

    /// `keyspace.table`
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Partition key columns in declaration order.
    pub fn partition_key(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| c.partition_key)
    }
}
