//! Batched writes, the per-partition write contract used by the compute
//! layer's task executors.

use ringsplit_core::{ColumnDefinition, ConsistencyLevel, TableMetadata};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConnectorError;
use crate::session::ClusterSession;
use crate::value::Row;

/// Where and how rows are written. Taken as-is from a finalized job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteTarget {
    pub keyspace: String,
    pub table: String,
    pub consistency: ConsistencyLevel,
    pub batch_size: usize,
    pub create_table_on_write: bool,
}

/// Derive a table definition from a sample row. The first cell becomes the
/// partition key; column types are inferred from the cell values.
pub fn table_from_row(keyspace: &str, table: &str, row: &Row) -> Result<TableMetadata, ConnectorError> {
    if row.is_empty() {
        return Err(ConnectorError::ConfigError(format!(
            "cannot derive a schema for {}.{} from an empty row",
            keyspace, table
        )));
    }
    let columns = row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let column = ColumnDefinition::new(&cell.name, cell.value.inferred_cql_type());
            if i == 0 {
                column.partition_key()
            } else {
                column
            }
        })
        .collect();
    Ok(TableMetadata::new(keyspace, table, columns))
}

/// Writes rows over a session in batches of `target.batch_size`.
pub struct BatchWriter<'a> {
    session: &'a dyn ClusterSession,
    target: &'a WriteTarget,
}

impl<'a> BatchWriter<'a> {
    pub fn new(session: &'a dyn ClusterSession, target: &'a WriteTarget) -> Self {
        Self { session, target }
    }

    /// Write all `rows`, returning how many were written. Stops at the first
    /// failed batch; batches already sent are not rolled back.
    pub async fn write(&self, rows: &[Row]) -> Result<usize, ConnectorError> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };

        if self.target.create_table_on_write {
            self.ensure_table(first).await?;
        }

        let batch_size = self.target.batch_size.max(1);
        for (i, batch) in rows.chunks(batch_size).enumerate() {
            self.session
                .execute_batch(
                    &self.target.keyspace,
                    &self.target.table,
                    batch,
                    self.target.consistency,
                )
                .await?;
            debug!("Wrote batch {} ({} rows)", i, batch.len());
        }

        info!(
            "Wrote {} rows to {}.{} at {}",
            rows.len(),
            self.target.keyspace,
            self.target.table,
            self.target.consistency
        );
        Ok(rows.len())
    }

    async fn ensure_table(&self, sample: &Row) -> Result<(), ConnectorError> {
        let existing = self
            .session
            .describe_table(&self.target.keyspace, &self.target.table)
            .await?;
        if existing.is_none() {
            let metadata = table_from_row(&self.target.keyspace, &self.target.table, sample)?;
            self.session.create_table(&metadata).await?;
        }
        Ok(())
    }
}
