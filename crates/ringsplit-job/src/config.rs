//! Loading a [`JobConfig`] from environment variables or a URI.

use std::str::FromStr;

use anyhow::{Context, Result};
use ringsplit_connectors::{ConnectionParams, ConnectorError};
use ringsplit_core::ConsistencyLevel;
use url::Url;

use crate::error::JobError;
use crate::job::{JobConfig, DEFAULT_BATCH_SIZE};

fn parse_optional<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => Ok(Some(
            value
                .parse()
                .with_context(|| format!("Invalid {}", key))?,
        )),
        Err(_) => Ok(None),
    }
}

impl JobConfig {
    /// A read job configured from `CASSANDRA_*` environment variables.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = JobConfig::new();

        config
            .host(
                std::env::var("CASSANDRA_HOST")
                    .unwrap_or_else(|_| ConnectionParams::DEFAULT_HOST.to_string()),
            )?
            .rpc_port(
                std::env::var("CASSANDRA_RPC_PORT")
                    .unwrap_or_else(|_| ConnectionParams::DEFAULT_RPC_PORT.to_string())
                    .parse()
                    .context("Invalid CASSANDRA_RPC_PORT")?,
            )?
            .cql_port(
                std::env::var("CASSANDRA_CQL_PORT")
                    .unwrap_or_else(|_| ConnectionParams::DEFAULT_CQL_PORT.to_string())
                    .parse()
                    .context("Invalid CASSANDRA_CQL_PORT")?,
            )?
            .batch_size(
                std::env::var("CASSANDRA_BATCH_SIZE")
                    .unwrap_or_else(|_| DEFAULT_BATCH_SIZE.to_string())
                    .parse()
                    .context("Invalid CASSANDRA_BATCH_SIZE")?,
            )?;

        if let Ok(keyspace) = std::env::var("CASSANDRA_KEYSPACE") {
            config.keyspace(keyspace)?;
        }
        if let Ok(table) = std::env::var("CASSANDRA_TABLE") {
            config.table(table)?;
        }
        if let Ok(partitioner) = std::env::var("CASSANDRA_PARTITIONER") {
            config.partitioner(partitioner)?;
        }
        if let Some(level) = parse_optional::<ConsistencyLevel>("CASSANDRA_READ_CONSISTENCY")? {
            config.read_consistency_level(level)?;
        }
        if let Some(level) = parse_optional::<ConsistencyLevel>("CASSANDRA_WRITE_CONSISTENCY")? {
            config.write_consistency_level(level)?;
        }
        if let Some(factor) = parse_optional::<i64>("CASSANDRA_BISECT_FACTOR")? {
            config.bisect_factor(factor)?;
        }
        if let Some(rows) = parse_optional::<i64>("CASSANDRA_SPLIT_SIZE")? {
            config.split_size(rows)?;
        }
        if let Some(create) = parse_optional::<bool>("CASSANDRA_CREATE_TABLE_ON_WRITE")? {
            config.create_table_on_write(create)?;
        }

        Ok(config)
    }

    /// A read job configured from a URI such as
    /// `cassandra://host:9042/keyspace?table=users&bisect_factor=4`.
    ///
    /// The table may also be given as a second path segment. Query
    /// parameters are named after the setters; unknown parameters are
    /// rejected.
    pub fn from_uri(uri: &str) -> Result<Self, JobError> {
        let parsed = Url::parse(uri)
            .map_err(|e| ConnectorError::UnsupportedUri(format!("{}: {}", uri, e)))?;

        let mut config = JobConfig::new();
        config.scheme(parsed.scheme())?;
        if let Some(host) = parsed.host_str() {
            config.host(host)?;
        }
        if let Some(port) = parsed.port() {
            config.cql_port(port)?;
        }

        let mut segments = parsed
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty());
        if let Some(keyspace) = segments.next() {
            config.keyspace(keyspace)?;
        }
        if let Some(table) = segments.next() {
            config.table(table)?;
        }

        for (key, value) in parsed.query_pairs() {
            apply_option(&mut config, &key, &value)?;
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(option: &str, value: &str) -> Result<T, JobError> {
    value
        .parse()
        .map_err(|_| JobError::invalid_option(option, value))
}

fn apply_option(config: &mut JobConfig, option: &str, value: &str) -> Result<(), JobError> {
    match option {
        "keyspace" => config.keyspace(value)?,
        "table" | "column_family" => config.table(value)?,
        "rpc_port" => config.rpc_port(parse_value(option, value)?)?,
        "cql_port" => config.cql_port(parse_value(option, value)?)?,
        "read_consistency" => config.read_consistency_level(parse_value(option, value)?)?,
        "write_consistency" => config.write_consistency_level(parse_value(option, value)?)?,
        "batch_size" => config.batch_size(parse_value(option, value)?)?,
        "bisect_factor" => config.bisect_factor(parse_value(option, value)?)?,
        "split_size" => config.split_size(parse_value(option, value)?)?,
        "split_granularity" => config.split_granularity(parse_value(option, value)?)?,
        "partitioner" => config.partitioner(value)?,
        "create_table_on_write" => config.create_table_on_write(parse_value(option, value)?)?,
        _ => return Err(JobError::invalid_option(option, value)),
    };
    Ok(())
}
