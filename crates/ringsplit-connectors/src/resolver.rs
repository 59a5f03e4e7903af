//! Column metadata resolution with an explicit, shareable cache.
//!
//! Schema is fetched once per `(keyspace, table)` and then served from the
//! cache until it is invalidated explicitly. The cache is a handle passed in
//! by the caller; there is no process-wide cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use ringsplit_core::{IndexKind, TableMetadata};
use tracing::{debug, info};

use crate::error::ConnectorError;
use crate::session::{ClusterSession, ConnectionParams, Connector};

type CacheKey = (String, String);

/// Resolved table metadata keyed by `(keyspace, table)`. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    entries: Arc<Mutex<HashMap<CacheKey, Arc<TableMetadata>>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Entries are whole values, so a poisoned lock still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<TableMetadata>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, keyspace: &str, table: &str) -> Option<Arc<TableMetadata>> {
        self.lock()
            .get(&(keyspace.to_string(), table.to_string()))
            .cloned()
    }

    pub fn insert(&self, metadata: Arc<TableMetadata>) {
        let k = (metadata.keyspace.clone(), metadata.table.clone());
        self.lock().insert(k, metadata);
    }

    /// Drop the entry for `keyspace.table`. Returns whether one existed.
    pub fn invalidate(&self, keyspace: &str, table: &str) -> bool {
        self.lock()
            .remove(&(keyspace.to_string(), table.to_string()))
            .is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Fetches table schema and index availability from the cluster.
#[derive(Debug, Clone, Default)]
pub struct ColumnMetadataResolver {
    cache: MetadataCache,
}

impl ColumnMetadataResolver {
    pub fn new(cache: MetadataCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Resolve `keyspace.table` over an already open session.
    pub async fn resolve(
        &self,
        session: &dyn ClusterSession,
        keyspace: &str,
        table: &str,
    ) -> Result<Arc<TableMetadata>, ConnectorError> {
        if let Some(hit) = self.cache.get(keyspace, table) {
            debug!("Metadata cache hit for {}.{}", keyspace, table);
            return Ok(hit);
        }

        let mut metadata = session
            .describe_table(keyspace, table)
            .await?
            .ok_or_else(|| ConnectorError::schema_not_found(keyspace, table))?;

        for index in session.indexes(keyspace, table).await? {
            if let Some(column) = metadata.column_mut(&index.column) {
                // A column may carry several indexes; keep the most capable.
                column.index = match column.index {
                    Some(IndexKind::Custom) => Some(IndexKind::Custom),
                    _ => Some(index.kind),
                };
            }
        }

        let metadata = Arc::new(metadata);
        self.cache.insert(Arc::clone(&metadata));
        info!(
            "Resolved metadata for {}: {} columns, {} indexed",
            metadata.namespace(),
            metadata.columns.len(),
            metadata.columns.iter().filter(|c| c.is_indexed()).count()
        );
        Ok(metadata)
    }

    /// Resolve `keyspace.table`, opening a session only on a cache miss.
    /// The session is closed before returning.
    pub async fn resolve_with(
        &self,
        connector: &dyn Connector,
        params: &ConnectionParams,
        keyspace: &str,
        table: &str,
    ) -> Result<Arc<TableMetadata>, ConnectorError> {
        if let Some(hit) = self.cache.get(keyspace, table) {
            debug!("Metadata cache hit for {}.{}", keyspace, table);
            return Ok(hit);
        }
        let session = connector.connect(params).await?;
        self.resolve(session.as_ref(), keyspace, table).await
    }
}
