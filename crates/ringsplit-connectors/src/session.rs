//! Connector abstraction: the capability set a datastore backend provides,
//! and pluggable connector selection by URI scheme.

use std::sync::Arc;

use async_trait::async_trait;
use ringsplit_core::{ConsistencyLevel, IndexKind, TableMetadata, Token, TokenRange};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConnectorError;
use crate::value::Row;

/// Everything needed to open a session. Immutable and cheap to clone, so
/// every worker can open its own session from the same parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// URI scheme used to pick a connector (`cassandra`, `memory`, ...).
    pub scheme: String,
    pub host: String,
    /// Thrift RPC port.
    pub rpc_port: u16,
    /// Native protocol port.
    pub cql_port: u16,
}

impl ConnectionParams {
    pub const DEFAULT_SCHEME: &'static str = "cassandra";
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_RPC_PORT: u16 = 9160;
    pub const DEFAULT_CQL_PORT: u16 = 9042;

    pub fn uri(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.cql_port)
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            scheme: Self::DEFAULT_SCHEME.to_string(),
            host: Self::DEFAULT_HOST.to_string(),
            rpc_port: Self::DEFAULT_RPC_PORT,
            cql_port: Self::DEFAULT_CQL_PORT,
        }
    }
}

/// An index reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub column: String,
    pub kind: IndexKind,
}

/// Estimated row count of one native token range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEstimate {
    pub range: TokenRange,
    pub rows: u64,
}

/// An open session to a cluster. Sessions are scoped to the call that opened
/// them and dropped when it finishes.
#[async_trait]
pub trait ClusterSession: Send + Sync {
    /// Schema of `keyspace.table`, or `None` when it does not exist.
    async fn describe_table(
        &self,
        keyspace: &str,
        table: &str,
    ) -> Result<Option<TableMetadata>, ConnectorError>;

    /// Indexes defined on `keyspace.table`.
    async fn indexes(&self, keyspace: &str, table: &str)
        -> Result<Vec<IndexDefinition>, ConnectorError>;

    /// Native token ranges as `(start, end)` pairs. The last range may wrap.
    async fn token_ring(&self) -> Result<Vec<(Token, Token)>, ConnectorError>;

    /// Per-range row count estimates for `keyspace.table`.
    async fn size_estimates(
        &self,
        keyspace: &str,
        table: &str,
    ) -> Result<Vec<RangeEstimate>, ConnectorError>;

    async fn create_table(&self, metadata: &TableMetadata) -> Result<(), ConnectorError>;

    /// Write `rows` as a single batch at `consistency`.
    async fn execute_batch(
        &self,
        keyspace: &str,
        table: &str,
        rows: &[Row],
        consistency: ConsistencyLevel,
    ) -> Result<(), ConnectorError>;
}

/// Opens sessions to one kind of cluster.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns `true` if this connector serves URIs with the given scheme.
    fn can_handle(&self, scheme: &str) -> bool;

    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn ClusterSession>, ConnectorError>;
}

/// Registry of connectors. Iterates connectors in order and delegates to the
/// first one that can handle a scheme.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new(connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self { connectors }
    }

    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.push(connector);
    }

    pub fn connector_for(&self, scheme: &str) -> Result<Arc<dyn Connector>, ConnectorError> {
        let connector = self
            .connectors
            .iter()
            .find(|c| c.can_handle(scheme))
            .cloned()
            .ok_or_else(|| ConnectorError::UnsupportedUri(format!("{}://", scheme)))?;
        info!("Selected connector for scheme '{}'", scheme);
        Ok(connector)
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("connectors", &self.connectors.len())
            .finish()
    }
}
