//! Job configuration state machine.
//!
//! A [`JobConfig`] starts out `Building` and accepts fluent setters. A
//! successful [`JobConfig::initialize`] moves it to `Finalized`, after which
//! every setter fails with [`JobError::ImmutableConfig`] and the frozen
//! [`FinalizedJob`] is handed out behind an `Arc`. A failed `initialize`
//! leaves the configuration `Building`, untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ringsplit_connectors::{
    split_query, BatchWriter, ClusterSession, ColumnMetadataResolver, ConnectionParams, Connector,
    ConnectorError, ConnectorRegistry, CqlValue, Filter, FilterOp, MetadataCache, Row, WriteTarget,
};
use ringsplit_core::{
    normalize_ring, plan, validate_bisect_factor, ColumnDefinition, ConsistencyLevel, Partitioner,
    PlanError, PlanMode, SizeEstimates, Split, TableMetadata, UnknownPartitioner,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::JobError;
use crate::validation::validate_filters;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BISECT_FACTOR: i64 = 1;

/// Settings accumulated while the configuration is still being built.
struct JobSettings {
    keyspace: Option<String>,
    table: Option<String>,
    connection: ConnectionParams,
    read_consistency: ConsistencyLevel,
    write_consistency: ConsistencyLevel,
    batch_size: usize,
    create_table_on_write: bool,
    partitioner: String,
    bisect_factor: Option<i64>,
    split_size: Option<i64>,
    split_granularity: u64,
    filters: Vec<Filter>,
    write: bool,
    connector: Option<Arc<dyn Connector>>,
    registry: Option<ConnectorRegistry>,
    cache: MetadataCache,
}

impl JobSettings {
    fn new(write: bool) -> Self {
        Self {
            keyspace: None,
            table: None,
            connection: ConnectionParams::default(),
            read_consistency: ConsistencyLevel::default(),
            write_consistency: ConsistencyLevel::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            create_table_on_write: false,
            partitioner: Partitioner::default().class_name().to_string(),
            bisect_factor: None,
            split_size: None,
            split_granularity: PlanMode::DEFAULT_GRANULARITY,
            filters: Vec::new(),
            write,
            connector: None,
            registry: None,
            cache: MetadataCache::new(),
        }
    }

    fn plan_mode(&self) -> Result<PlanMode, JobError> {
        let mode = match (self.bisect_factor, self.split_size) {
            (Some(_), Some(_)) => return Err(JobError::ConflictingSplitModes),
            (None, Some(target)) => {
                if target <= 0 {
                    return Err(PlanError::InvalidSplitSize(target).into());
                }
                PlanMode::SplitSize {
                    target,
                    granularity: self.split_granularity,
                }
            }
            (factor, None) => {
                let factor = factor.unwrap_or(DEFAULT_BISECT_FACTOR);
                validate_bisect_factor(factor)?;
                PlanMode::Bisect(factor)
            }
        };
        Ok(mode)
    }

    /// An injected connector wins over selection by URI scheme.
    fn connector(&self) -> Result<Arc<dyn Connector>, JobError> {
        if let Some(connector) = &self.connector {
            return Ok(Arc::clone(connector));
        }
        match &self.registry {
            Some(registry) => Ok(registry.connector_for(&self.connection.scheme)?),
            None => Err(JobError::MissingField("session")),
        }
    }
}

impl fmt::Debug for JobSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSettings")
            .field("keyspace", &self.keyspace)
            .field("table", &self.table)
            .field("connection", &self.connection)
            .field("read_consistency", &self.read_consistency)
            .field("write_consistency", &self.write_consistency)
            .field("batch_size", &self.batch_size)
            .field("create_table_on_write", &self.create_table_on_write)
            .field("partitioner", &self.partitioner)
            .field("bisect_factor", &self.bisect_factor)
            .field("split_size", &self.split_size)
            .field("filters", &self.filters)
            .field("write", &self.write)
            .field("connector", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum ConfigState {
    Building(Box<JobSettings>),
    Finalized(Arc<FinalizedJob>),
}

/// Configuration of one read or write job.
///
/// ```ignore
/// let mut config = JobConfig::new();
/// config
///     .keyspace("app")?
///     .table("users")?
///     .bisect_factor(4)?
///     .session(connector)?;
/// let job = config.initialize().await?;
/// for task in job.tasks() { /* hand to a worker */ }
/// ```
#[derive(Debug)]
pub struct JobConfig {
    state: ConfigState,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl JobConfig {
    /// A read job configuration with every option at its default.
    pub fn new() -> Self {
        Self {
            state: ConfigState::Building(Box::new(JobSettings::new(false))),
        }
    }

    /// A write job configuration. Write jobs plan no read splits, and their
    /// table may be missing when `create_table_on_write` is set.
    pub fn for_write() -> Self {
        Self {
            state: ConfigState::Building(Box::new(JobSettings::new(true))),
        }
    }

    fn building(&mut self, setter: &'static str) -> Result<&mut JobSettings, JobError> {
        match &mut self.state {
            ConfigState::Building(settings) => Ok(settings.as_mut()),
            ConfigState::Finalized(_) => Err(JobError::ImmutableConfig(setter)),
        }
    }

    pub fn keyspace(&mut self, keyspace: impl Into<String>) -> Result<&mut Self, JobError> {
        self.building("keyspace")?.keyspace = Some(keyspace.into());
        Ok(self)
    }

    pub fn table(&mut self, table: impl Into<String>) -> Result<&mut Self, JobError> {
        self.building("table")?.table = Some(table.into());
        Ok(self)
    }

    /// Alias of [`JobConfig::table`].
    pub fn column_family(&mut self, table: impl Into<String>) -> Result<&mut Self, JobError> {
        self.building("column_family")?.table = Some(table.into());
        Ok(self)
    }

    /// URI scheme used to select a connector from the registry.
    pub fn scheme(&mut self, scheme: impl Into<String>) -> Result<&mut Self, JobError> {
        self.building("scheme")?.connection.scheme = scheme.into();
        Ok(self)
    }

    pub fn host(&mut self, host: impl Into<String>) -> Result<&mut Self, JobError> {
        self.building("host")?.connection.host = host.into();
        Ok(self)
    }

    pub fn rpc_port(&mut self, port: u16) -> Result<&mut Self, JobError> {
        self.building("rpc_port")?.connection.rpc_port = port;
        Ok(self)
    }

    pub fn cql_port(&mut self, port: u16) -> Result<&mut Self, JobError> {
        self.building("cql_port")?.connection.cql_port = port;
        Ok(self)
    }

    pub fn read_consistency_level(
        &mut self,
        level: ConsistencyLevel,
    ) -> Result<&mut Self, JobError> {
        self.building("read_consistency_level")?.read_consistency = level;
        Ok(self)
    }

    pub fn write_consistency_level(
        &mut self,
        level: ConsistencyLevel,
    ) -> Result<&mut Self, JobError> {
        self.building("write_consistency_level")?.write_consistency = level;
        Ok(self)
    }

    /// Must be a positive power of two. Checked by `initialize`.
    pub fn bisect_factor(&mut self, factor: i64) -> Result<&mut Self, JobError> {
        self.building("bisect_factor")?.bisect_factor = Some(factor);
        Ok(self)
    }

    /// Target rows per split. Must be positive. Checked by `initialize`.
    pub fn split_size(&mut self, rows: i64) -> Result<&mut Self, JobError> {
        self.building("split_size")?.split_size = Some(rows);
        Ok(self)
    }

    /// How many rows an average split may exceed the split size by.
    pub fn split_granularity(&mut self, rows: u64) -> Result<&mut Self, JobError> {
        self.building("split_granularity")?.split_granularity = rows;
        Ok(self)
    }

    pub fn batch_size(&mut self, rows: usize) -> Result<&mut Self, JobError> {
        self.building("batch_size")?.batch_size = rows;
        Ok(self)
    }

    pub fn create_table_on_write(&mut self, create: bool) -> Result<&mut Self, JobError> {
        self.building("create_table_on_write")?.create_table_on_write = create;
        Ok(self)
    }

    /// Partitioner class name, fully qualified or simple.
    pub fn partitioner(&mut self, class_name: impl Into<String>) -> Result<&mut Self, JobError> {
        self.building("partitioner")?.partitioner = class_name.into();
        Ok(self)
    }

    /// Replace the filter set.
    pub fn filters(
        &mut self,
        filters: impl IntoIterator<Item = Filter>,
    ) -> Result<&mut Self, JobError> {
        self.building("filters")?.filters = filters.into_iter().collect();
        Ok(self)
    }

    pub fn filter(&mut self, filter: Filter) -> Result<&mut Self, JobError> {
        self.building("filter")?.filters.push(filter);
        Ok(self)
    }

    /// Use `connector` instead of selecting one by scheme.
    pub fn session(&mut self, connector: Arc<dyn Connector>) -> Result<&mut Self, JobError> {
        self.building("session")?.connector = Some(connector);
        Ok(self)
    }

    /// Connectors to select from by the connection's URI scheme.
    pub fn connectors(&mut self, registry: ConnectorRegistry) -> Result<&mut Self, JobError> {
        self.building("connectors")?.registry = Some(registry);
        Ok(self)
    }

    /// Share a metadata cache with other configurations.
    pub fn metadata_cache(&mut self, cache: MetadataCache) -> Result<&mut Self, JobError> {
        self.building("metadata_cache")?.cache = cache;
        Ok(self)
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, ConfigState::Finalized(_))
    }

    pub fn finalized(&self) -> Option<&Arc<FinalizedJob>> {
        match &self.state {
            ConfigState::Finalized(job) => Some(job),
            ConfigState::Building(_) => None,
        }
    }

    pub fn is_write_config(&self) -> bool {
        match &self.state {
            ConfigState::Building(settings) => settings.write,
            ConfigState::Finalized(job) => job.write,
        }
    }

    pub fn is_split_mode_set(&self) -> bool {
        match &self.state {
            ConfigState::Building(settings) => settings.split_size.is_some(),
            ConfigState::Finalized(job) => job.is_split_mode_set(),
        }
    }

    pub fn is_bisect_mode_set(&self) -> bool {
        match &self.state {
            ConfigState::Building(settings) => settings.bisect_factor.is_some(),
            ConfigState::Finalized(job) => job.is_bisect_mode_set(),
        }
    }

    /// `keyspace.table`, once both are known.
    pub fn namespace(&self) -> Option<String> {
        match &self.state {
            ConfigState::Building(settings) => match (&settings.keyspace, &settings.table) {
                (Some(keyspace), Some(table)) => Some(format!("{}.{}", keyspace, table)),
                _ => None,
            },
            ConfigState::Finalized(job) => Some(job.namespace()),
        }
    }

    /// Resolve metadata, validate filters and, for read jobs, plan the splits.
    ///
    /// Settings that can be checked locally are checked before any
    /// connection is opened. The session used here is closed before this
    /// returns. Calling `initialize` on a finalized configuration returns
    /// the existing job without touching the cluster.
    pub async fn initialize(&mut self) -> Result<Arc<FinalizedJob>, JobError> {
        let settings = match &self.state {
            ConfigState::Finalized(job) => {
                debug!("Job for {} already initialized", job.namespace());
                return Ok(Arc::clone(job));
            }
            ConfigState::Building(settings) => settings,
        };

        let job = Arc::new(finalize(settings).await?);
        self.state = ConfigState::Finalized(Arc::clone(&job));
        Ok(job)
    }
}

async fn finalize(settings: &JobSettings) -> Result<FinalizedJob, JobError> {
    let keyspace = settings
        .keyspace
        .clone()
        .ok_or(JobError::MissingField("keyspace"))?;
    let table = settings.table.clone().ok_or(JobError::MissingField("table"))?;
    if settings.batch_size == 0 {
        return Err(JobError::invalid_option("batch_size", "0"));
    }
    let mode = settings.plan_mode()?;
    let partitioner: Partitioner = settings
        .partitioner
        .parse()
        .map_err(|e: UnknownPartitioner| JobError::invalid_option("partitioner", e.0))?;
    let connector = settings.connector()?;

    info!(
        "Initializing {} job for {}.{} at {}",
        if settings.write { "write" } else { "read" },
        keyspace,
        table,
        settings.connection.uri()
    );

    let session = connector.connect(&settings.connection).await?;
    // Resolve into a private cache. The shared one is only filled once the
    // whole job finalizes.
    let resolver = ColumnMetadataResolver::default();
    if let Some(hit) = settings.cache.get(&keyspace, &table) {
        resolver.cache().insert(hit);
    }
    let metadata = match resolver.resolve(session.as_ref(), &keyspace, &table).await {
        Ok(metadata) => Some(metadata),
        Err(ConnectorError::SchemaNotFound { .. })
            if settings.write && settings.create_table_on_write =>
        {
            debug!(
                "{}.{} does not exist yet, it will be created on first write",
                keyspace, table
            );
            None
        }
        Err(e) => return Err(e.into()),
    };

    // Without a table every filter names an unknown column.
    let filters = match &metadata {
        Some(metadata) => validate_filters(&settings.filters, metadata)?,
        None => validate_filters(
            &settings.filters,
            &TableMetadata::new(&keyspace, &table, Vec::new()),
        )?,
    };

    let splits = if settings.write {
        Vec::new()
    } else {
        plan_splits(session.as_ref(), &keyspace, &table, mode, partitioner).await?
    };
    drop(session);

    if let Some(metadata) = &metadata {
        settings.cache.insert(Arc::clone(metadata));
    }

    Ok(FinalizedJob {
        keyspace,
        table,
        connection: settings.connection.clone(),
        read_consistency: settings.read_consistency,
        write_consistency: settings.write_consistency,
        batch_size: settings.batch_size,
        create_table_on_write: settings.create_table_on_write,
        partitioner,
        mode,
        bisect_factor: settings.bisect_factor,
        split_size: settings.split_size,
        filters,
        metadata,
        splits,
        write: settings.write,
        connector,
    })
}

async fn plan_splits(
    session: &dyn ClusterSession,
    keyspace: &str,
    table: &str,
    mode: PlanMode,
    partitioner: Partitioner,
) -> Result<Vec<Split>, JobError> {
    let ring = normalize_ring(&session.token_ring().await?, partitioner);

    let estimates = match mode {
        PlanMode::SplitSize { .. } => {
            let reported: Vec<_> = session
                .size_estimates(keyspace, table)
                .await?
                .into_iter()
                .map(|e| ((e.range.start, e.range.end), e.rows))
                .collect();
            SizeEstimates::from_reported(&reported, partitioner)
        }
        PlanMode::Bisect(_) => SizeEstimates::new(),
    };

    let splits = plan(&ring, mode, &estimates)?;
    info!(
        "Planned {} splits for {}.{} over {} ranges",
        splits.len(),
        keyspace,
        table,
        ring.len()
    );
    Ok(splits)
}

/// A read task handed to a worker: one split and the statement that reads it.
/// Workers open their own session from `connection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadTask {
    pub split: Split,
    pub query: String,
    pub consistency: ConsistencyLevel,
    pub connection: ConnectionParams,
}

/// An initialized job. Read-only, and safe to share between workers.
pub struct FinalizedJob {
    keyspace: String,
    table: String,
    connection: ConnectionParams,
    read_consistency: ConsistencyLevel,
    write_consistency: ConsistencyLevel,
    batch_size: usize,
    create_table_on_write: bool,
    partitioner: Partitioner,
    mode: PlanMode,
    bisect_factor: Option<i64>,
    split_size: Option<i64>,
    filters: Vec<Filter>,
    metadata: Option<Arc<TableMetadata>>,
    splits: Vec<Split>,
    write: bool,
    connector: Arc<dyn Connector>,
}

impl FinalizedJob {
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column_family(&self) -> &str {
        &self.table
    }

    pub fn namespace(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    pub fn connection(&self) -> &ConnectionParams {
        &self.connection
    }

    pub fn read_consistency_level(&self) -> ConsistencyLevel {
        self.read_consistency
    }

    pub fn write_consistency_level(&self) -> ConsistencyLevel {
        self.write_consistency
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn create_table_on_write(&self) -> bool {
        self.create_table_on_write
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    pub fn plan_mode(&self) -> PlanMode {
        self.mode
    }

    pub fn bisect_factor(&self) -> i64 {
        self.bisect_factor.unwrap_or(DEFAULT_BISECT_FACTOR)
    }

    pub fn split_size(&self) -> Option<i64> {
        self.split_size
    }

    pub fn is_split_mode_set(&self) -> bool {
        self.split_size.is_some()
    }

    pub fn is_bisect_mode_set(&self) -> bool {
        self.bisect_factor.is_some()
    }

    pub fn is_write_config(&self) -> bool {
        self.write
    }

    /// The validated filters, deduplicated, in the order they were given.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Values of the equality filters by column. A later filter on the same
    /// column overrides an earlier one.
    pub fn additional_filters(&self) -> BTreeMap<String, CqlValue> {
        self.filters
            .iter()
            .filter(|f| f.op == FilterOp::Eq)
            .map(|f| (f.column.clone(), f.value.clone()))
            .collect()
    }

    /// Resolved table metadata. `None` only for a write job whose table does
    /// not exist yet.
    pub fn metadata(&self) -> Option<&Arc<TableMetadata>> {
        self.metadata.as_ref()
    }

    pub fn column_definitions(&self) -> BTreeMap<&str, &ColumnDefinition> {
        self.metadata
            .iter()
            .flat_map(|m| m.columns.iter())
            .map(|c| (c.name.as_str(), c))
            .collect()
    }

    /// Planned splits, sorted by index. Empty for write jobs.
    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    /// One read task per split.
    pub fn tasks(&self) -> Vec<ReadTask> {
        let Some(metadata) = &self.metadata else {
            return Vec::new();
        };
        self.splits
            .iter()
            .map(|split| ReadTask {
                split: split.clone(),
                query: split_query(metadata, &split.range, &self.filters),
                consistency: self.read_consistency,
                connection: self.connection.clone(),
            })
            .collect()
    }

    pub fn write_target(&self) -> WriteTarget {
        WriteTarget {
            keyspace: self.keyspace.clone(),
            table: self.table.clone(),
            consistency: self.write_consistency,
            batch_size: self.batch_size,
            create_table_on_write: self.create_table_on_write,
        }
    }

    /// Write `rows` over a session opened for this call only.
    pub async fn write(&self, rows: &[Row]) -> Result<usize, JobError> {
        let target = self.write_target();
        let session = self.connector.connect(&self.connection).await?;
        let written = BatchWriter::new(session.as_ref(), &target)
            .write(rows)
            .await?;
        Ok(written)
    }
}

impl fmt::Debug for FinalizedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizedJob")
            .field("namespace", &self.namespace())
            .field("connection", &self.connection)
            .field("read_consistency", &self.read_consistency)
            .field("write_consistency", &self.write_consistency)
            .field("batch_size", &self.batch_size)
            .field("partitioner", &self.partitioner)
            .field("mode", &self.mode)
            .field("filters", &self.filters)
            .field("splits", &self.splits.len())
            .field("write", &self.write)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringsplit_connectors::MemoryCluster;
    use ringsplit_core::{IndexKind, TokenRange};

    fn cluster() -> Arc<MemoryCluster> {
        let cluster = MemoryCluster::new();
        cluster.set_ring(vec![(0, 100), (100, 0)]);
        cluster.add_table(TableMetadata::new(
            "app",
            "users",
            vec![
                ColumnDefinition::new("id", "int").partition_key(),
                ColumnDefinition::new("name", "text").indexed(IndexKind::Secondary),
                ColumnDefinition::new("age", "int"),
            ],
        ));
        Arc::new(cluster)
    }

    fn users(cluster: &Arc<MemoryCluster>) -> JobConfig {
        let mut config = JobConfig::new();
        config
            .keyspace("app")
            .unwrap()
            .table("users")
            .unwrap()
            .partitioner("RandomPartitioner")
            .unwrap()
            .session(cluster.connector())
            .unwrap();
        config
    }

    #[test]
    fn test_new_config_is_building_read_job() {
        let config = JobConfig::new();
        assert!(!config.is_finalized());
        assert!(!config.is_write_config());
        assert!(!config.is_split_mode_set());
        assert!(!config.is_bisect_mode_set());
        assert!(config.namespace().is_none());
        assert!(JobConfig::for_write().is_write_config());
    }

    #[test]
    fn test_column_family_is_table_alias() {
        let mut config = JobConfig::new();
        config.keyspace("app").unwrap().column_family("users").unwrap();
        assert_eq!(config.namespace().as_deref(), Some("app.users"));
    }

    #[test]
    fn test_mode_flags_follow_setters() {
        let mut config = JobConfig::new();
        config.split_size(1000).unwrap();
        assert!(config.is_split_mode_set());
        assert!(!config.is_bisect_mode_set());
        config.bisect_factor(2).unwrap();
        assert!(config.is_bisect_mode_set());
    }

    #[tokio::test]
    async fn test_missing_keyspace() {
        let cluster = cluster();
        let mut config = JobConfig::new();
        config.table("users").unwrap().session(cluster.connector()).unwrap();
        let err = config.initialize().await.unwrap_err();
        assert_eq!(err, JobError::MissingField("keyspace"));
        assert_eq!(cluster.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let mut config = JobConfig::new();
        config.keyspace("app").unwrap().table("users").unwrap();
        let err = config.initialize().await.unwrap_err();
        assert_eq!(err, JobError::MissingField("session"));
    }

    #[tokio::test]
    async fn test_local_checks_precede_connection() {
        let cluster = cluster();

        let mut config = users(&cluster);
        config.bisect_factor(3).unwrap();
        let err = config.initialize().await.unwrap_err();
        assert_eq!(err, JobError::Plan(PlanError::InvalidBisectFactor(3)));

        let mut config = users(&cluster);
        config.split_size(0).unwrap();
        let err = config.initialize().await.unwrap_err();
        assert_eq!(err, JobError::Plan(PlanError::InvalidSplitSize(0)));

        let mut config = users(&cluster);
        config.partitioner("ByteOrderedPartitioner").unwrap();
        let err = config.initialize().await.unwrap_err();
        assert!(matches!(err, JobError::InvalidOption { ref option, .. } if option == "partitioner"));

        let mut config = users(&cluster);
        config.batch_size(0).unwrap();
        let err = config.initialize().await.unwrap_err();
        assert!(matches!(err, JobError::InvalidOption { ref option, .. } if option == "batch_size"));

        assert_eq!(cluster.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connector_selected_by_scheme() {
        let cluster = cluster();
        let mut config = JobConfig::new();
        config
            .keyspace("app")
            .unwrap()
            .table("users")
            .unwrap()
            .partitioner("RandomPartitioner")
            .unwrap()
            .scheme("memory")
            .unwrap()
            .connectors(ConnectorRegistry::new(vec![cluster.connector()]))
            .unwrap();
        assert!(config.initialize().await.is_ok());

        let mut config = JobConfig::new();
        config
            .keyspace("app")
            .unwrap()
            .table("users")
            .unwrap()
            .scheme("mongodb")
            .unwrap()
            .connectors(ConnectorRegistry::new(vec![cluster.connector()]))
            .unwrap();
        let err = config.initialize().await.unwrap_err();
        assert!(matches!(err, JobError::Connector(ConnectorError::UnsupportedUri(_))));
    }

    #[tokio::test]
    async fn test_finalized_accessors() {
        let cluster = cluster();
        let mut config = users(&cluster);
        config
            .bisect_factor(2)
            .unwrap()
            .read_consistency_level(ConsistencyLevel::Quorum)
            .unwrap()
            .filters([Filter::eq("name", "bob"), Filter::eq("id", 7), Filter::eq("name", "bob")])
            .unwrap();

        let job = config.initialize().await.unwrap();
        assert_eq!(job.namespace(), "app.users");
        assert_eq!(job.column_family(), "users");
        assert_eq!(job.partitioner(), Partitioner::Random);
        assert_eq!(job.bisect_factor(), 2);
        assert_eq!(job.split_size(), None);
        assert_eq!(job.batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(job.write_consistency_level(), ConsistencyLevel::LocalOne);
        assert_eq!(job.filters().len(), 2);

        let extra = job.additional_filters();
        assert_eq!(extra.get("name"), Some(&CqlValue::from("bob")));
        assert_eq!(extra.get("id"), Some(&CqlValue::Int(7)));

        let columns: Vec<&str> = job.column_definitions().into_keys().collect();
        assert_eq!(columns, vec!["age", "id", "name"]);
        assert!(job.column_definitions()["name"].is_indexed());
    }

    #[tokio::test]
    async fn test_tasks_carry_queries_and_consistency() {
        let cluster = cluster();
        let mut config = users(&cluster);
        config
            .bisect_factor(2)
            .unwrap()
            .read_consistency_level(ConsistencyLevel::Quorum)
            .unwrap()
            .filter(Filter::eq("name", "bob"))
            .unwrap();

        let job = config.initialize().await.unwrap();
        let tasks = job.tasks();
        // [0, 100) and the wrapped [100, max) halved each
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].split.range, TokenRange::new(0, 50));
        assert_eq!(
            tasks[0].query,
            "SELECT * FROM \"app\".\"users\" WHERE token(\"id\") >= 0 AND token(\"id\") <= 49 \
             AND \"name\" = 'bob' ALLOW FILTERING"
        );
        assert!(tasks.iter().all(|t| t.consistency == ConsistencyLevel::Quorum));
        let indices: Vec<usize> = tasks.iter().map(|t| t.split.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_write_target_from_job() {
        let cluster = cluster();
        let mut config = JobConfig::for_write();
        config
            .keyspace("app")
            .unwrap()
            .table("users")
            .unwrap()
            .batch_size(10)
            .unwrap()
            .write_consistency_level(ConsistencyLevel::All)
            .unwrap()
            .session(cluster.connector())
            .unwrap();

        let job = config.initialize().await.unwrap();
        assert!(job.splits().is_empty());
        assert!(job.tasks().is_empty());
        assert_eq!(
            job.write_target(),
            WriteTarget {
                keyspace: "app".to_string(),
                table: "users".to_string(),
                consistency: ConsistencyLevel::All,
                batch_size: 10,
                create_table_on_write: false,
            }
        );
    }
}
