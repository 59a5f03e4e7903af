//! In-memory cluster backend.
//!
//! Holds schema, indexes, ring topology, size estimates and written rows in
//! process memory. It can be populated programmatically or loaded from a JSON
//! [`ClusterSnapshot`], and counts connections and schema queries so callers
//! can observe how much cluster traffic an operation caused.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ringsplit_core::{ConsistencyLevel, TableMetadata, Token, TokenRange};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConnectorError;
use crate::session::{ClusterSession, ConnectionParams, Connector, IndexDefinition, RangeEstimate};
use crate::value::Row;

/// Serializable description of a cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Native ranges as `[start, end]` pairs, as the cluster reports them.
    #[serde(default)]
    pub ring: Vec<(Token, Token)>,
    #[serde(default)]
    pub tables: Vec<TableMetadata>,
    #[serde(default)]
    pub size_estimates: Vec<SnapshotEstimate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEstimate {
    pub keyspace: String,
    pub table: String,
    pub start: Token,
    pub end: Token,
    pub rows: u64,
}

/// One batch accepted by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    pub namespace: String,
    pub rows: usize,
    pub consistency: ConsistencyLevel,
}

type TableKey = (String, String);

fn key(keyspace: &str, table: &str) -> TableKey {
    (keyspace.to_string(), table.to_string())
}

#[derive(Debug, Default)]
struct ClusterState {
    ring: Vec<(Token, Token)>,
    tables: BTreeMap<TableKey, TableMetadata>,
    estimates: BTreeMap<TableKey, Vec<RangeEstimate>>,
    rows: BTreeMap<TableKey, Vec<Row>>,
    batches: Vec<BatchRecord>,
}

#[derive(Debug)]
pub struct MemoryCluster {
    state: Mutex<ClusterState>,
    reachable: AtomicBool,
    connections: AtomicUsize,
    schema_queries: AtomicUsize,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self {
            state: Mutex::new(ClusterState::default()),
            reachable: AtomicBool::new(true),
            connections: AtomicUsize::new(0),
            schema_queries: AtomicUsize::new(0),
        }
    }
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ClusterSnapshot) -> Self {
        let cluster = Self::new();
        cluster.set_ring(snapshot.ring);
        for table in snapshot.tables {
            cluster.add_table(table);
        }
        for estimate in snapshot.size_estimates {
            cluster.add_size_estimate(
                &estimate.keyspace,
                &estimate.table,
                TokenRange::new(estimate.start, estimate.end),
                estimate.rows,
            );
        }
        cluster
    }

    pub fn from_snapshot_file(path: impl AsRef<Path>) -> Result<Self, ConnectorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let snapshot: ClusterSnapshot = serde_json::from_str(&content)?;
        info!(
            "Loaded cluster snapshot from {:?}: {} ranges, {} tables",
            path,
            snapshot.ring.len(),
            snapshot.tables.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// A connector handing out sessions to this cluster.
    pub fn connector(self: &Arc<Self>) -> Arc<dyn Connector> {
        Arc::new(MemoryConnector {
            cluster: Arc::clone(self),
        })
    }

    // The state holds no invariants a panicking writer could break.
    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_ring(&self, ring: Vec<(Token, Token)>) {
        self.lock().ring = ring;
    }

    pub fn add_table(&self, table: TableMetadata) {
        let k = key(&table.keyspace, &table.table);
        self.lock().tables.insert(k, table);
    }

    pub fn drop_table(&self, keyspace: &str, table: &str) {
        self.lock().tables.remove(&key(keyspace, table));
    }

    pub fn add_size_estimate(&self, keyspace: &str, table: &str, range: TokenRange, rows: u64) {
        self.lock()
            .estimates
            .entry(key(keyspace, table))
            .or_default()
            .push(RangeEstimate { range, rows });
    }

    /// Simulate the cluster going down or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn schema_query_count(&self) -> usize {
        self.schema_queries.load(Ordering::SeqCst)
    }

    pub fn table(&self, keyspace: &str, table: &str) -> Option<TableMetadata> {
        self.lock().tables.get(&key(keyspace, table)).cloned()
    }

    pub fn rows(&self, keyspace: &str, table: &str) -> Vec<Row> {
        self.lock()
            .rows
            .get(&key(keyspace, table))
            .cloned()
            .unwrap_or_default()
    }

    pub fn batches(&self) -> Vec<BatchRecord> {
        self.lock().batches.clone()
    }

    fn check_reachable(&self, host: &str) -> Result<(), ConnectorError> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(ConnectorError::ConnectionFailed(format!(
                "no host available at {}",
                host
            )))
        }
    }
}

/// Connector for [`MemoryCluster`]. Serves the `memory` and `cassandra` schemes.
pub struct MemoryConnector {
    cluster: Arc<MemoryCluster>,
}

impl MemoryConnector {
    pub fn new(cluster: Arc<MemoryCluster>) -> Self {
        Self { cluster }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn can_handle(&self, scheme: &str) -> bool {
        matches!(scheme, "memory" | "cassandra")
    }

    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn ClusterSession>, ConnectorError> {
        self.cluster.check_reachable(&params.host)?;
        self.cluster.connections.fetch_add(1, Ordering::SeqCst);
        debug!("Opened in-memory session to {}", params.uri());
        Ok(Box::new(MemorySession {
            cluster: Arc::clone(&self.cluster),
            host: params.host.clone(),
        }))
    }
}

struct MemorySession {
    cluster: Arc<MemoryCluster>,
    host: String,
}

#[async_trait]
impl ClusterSession for MemorySession {
    async fn describe_table(
        &self,
        keyspace: &str,
        table: &str,
    ) -> Result<Option<TableMetadata>, ConnectorError> {
        self.cluster.check_reachable(&self.host)?;
        self.cluster.schema_queries.fetch_add(1, Ordering::SeqCst);
        // Index information is served by `indexes`, as the schema tables do.
        Ok(self.cluster.table(keyspace, table).map(|mut t| {
            for column in &mut t.columns {
                column.index = None;
            }
            t
        }))
    }

    async fn indexes(
        &self,
        keyspace: &str,
        table: &str,
    ) -> Result<Vec<IndexDefinition>, ConnectorError> {
        self.cluster.check_reachable(&self.host)?;
        let indexes = self
            .cluster
            .table(keyspace, table)
            .map(|t| {
                t.columns
                    .iter()
                    .filter_map(|c| {
                        c.index.map(|kind| IndexDefinition {
                            name: format!("{}_{}_idx", table, c.name),
                            column: c.name.clone(),
                            kind,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(indexes)
    }

    async fn token_ring(&self) -> Result<Vec<(Token, Token)>, ConnectorError> {
        self.cluster.check_reachable(&self.host)?;
        Ok(self.cluster.lock().ring.clone())
    }

    async fn size_estimates(
        &self,
        keyspace: &str,
        table: &str,
    ) -> Result<Vec<RangeEstimate>, ConnectorError> {
        self.cluster.check_reachable(&self.host)?;
        Ok(self
            .cluster
            .lock()
            .estimates
            .get(&key(keyspace, table))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_table(&self, metadata: &TableMetadata) -> Result<(), ConnectorError> {
        self.cluster.check_reachable(&self.host)?;
        let mut state = self.cluster.lock();
        state
            .tables
            .entry(key(&metadata.keyspace, &metadata.table))
            .or_insert_with(|| metadata.clone());
        info!("Created table {}", metadata.namespace());
        Ok(())
    }

    async fn execute_batch(
        &self,
        keyspace: &str,
        table: &str,
        rows: &[Row],
        consistency: ConsistencyLevel,
    ) -> Result<(), ConnectorError> {
        self.cluster.check_reachable(&self.host)?;
        let mut state = self.cluster.lock();
        let k = key(keyspace, table);
        if !state.tables.contains_key(&k) {
            return Err(ConnectorError::schema_not_found(keyspace, table));
        }
        state.rows.entry(k).or_default().extend_from_slice(rows);
        state.batches.push(BatchRecord {
            namespace: format!("{}.{}", keyspace, table),
            rows: rows.len(),
            consistency,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringsplit_core::{ColumnDefinition, IndexKind};
    use std::io::Write;

    fn cluster() -> Arc<MemoryCluster> {
        let cluster = MemoryCluster::new();
        cluster.set_ring(vec![(0, 100), (100, 0)]);
        cluster.add_table(TableMetadata::new(
            "app",
            "users",
            vec![
                ColumnDefinition::new("id", "int").partition_key(),
                ColumnDefinition::new("name", "text").indexed(IndexKind::Secondary),
            ],
        ));
        Arc::new(cluster)
    }

    #[tokio::test]
    async fn test_describe_table_strips_indexes() {
        let cluster = cluster();
        let session = cluster.connector().connect(&ConnectionParams::default()).await.unwrap();

        let table = session.describe_table("app", "users").await.unwrap().unwrap();
        assert!(table.columns.iter().all(|c| c.index.is_none()));

        let indexes = session.indexes("app", "users").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].column, "name");
        assert_eq!(indexes[0].kind, IndexKind::Secondary);

        assert_eq!(cluster.connection_count(), 1);
        assert_eq!(cluster.schema_query_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_table() {
        let cluster = cluster();
        let session = cluster.connector().connect(&ConnectionParams::default()).await.unwrap();
        assert!(session.describe_table("app", "nope").await.unwrap().is_none());
        assert!(session.indexes("app", "nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_cluster() {
        let cluster = cluster();
        cluster.set_reachable(false);
        let err = cluster
            .connector()
            .connect(&ConnectionParams::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectorError::ConnectionFailed(_)));
        assert_eq!(cluster.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_batch_requires_table() {
        let cluster = cluster();
        let session = cluster.connector().connect(&ConnectionParams::default()).await.unwrap();
        let err = session
            .execute_batch("app", "events", &[], ConsistencyLevel::One)
            .await
            .unwrap_err();
        assert_eq!(err, ConnectorError::schema_not_found("app", "events"));
    }

    #[test]
    fn test_from_snapshot_file() {
        let json = r#"{
            "ring": [[-100, 100], [100, -100]],
            "tables": [{
                "keyspace": "app",
                "table": "users",
                "columns": [
                    {"name": "id", "type": "int", "partition_key": true},
                    {"name": "age", "type": "int", "index": "custom"}
                ]
            }],
            "size_estimates": [
                {"keyspace": "app", "table": "users", "start": -100, "end": 100, "rows": 500}
            ]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let cluster = MemoryCluster::from_snapshot_file(file.path()).unwrap();
        let table = cluster.table("app", "users").unwrap();
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.column("age").unwrap().index, Some(IndexKind::Custom));
        assert_eq!(cluster.lock().ring, vec![(-100, 100), (100, -100)]);
        assert_eq!(
            cluster.lock().estimates[&key("app", "users")],
            vec![RangeEstimate {
                range: TokenRange::new(-100, 100),
                rows: 500
            }]
        );
    }

    #[test]
    fn test_from_snapshot_file_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = MemoryCluster::from_snapshot_file(file.path()).unwrap_err();
        assert!(matches!(err, ConnectorError::ConfigError(_)));
    }
}
