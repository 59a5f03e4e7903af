//! Ringsplit CLI - plan split reads against a cluster snapshot

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ringsplit_connectors::{
    ColumnMetadataResolver, ConnectionParams, ConnectorRegistry, Filter, MemoryCluster,
};
use ringsplit_core::Split;
use ringsplit_job::{validate_filters, JobConfig};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "ringsplit")]
#[command(about = "Plan parallel token-range reads of a Cassandra-style table")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the cluster snapshot JSON file
    #[arg(short, long, global = true, env = "RINGSPLIT_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a read job and print its tasks
    Plan {
        /// Job URI, e.g. cassandra://localhost:9042/app?table=users&bisect_factor=4.
        /// Read from CASSANDRA_* variables when omitted.
        #[arg(short, long)]
        uri: Option<String>,

        /// Filter as JSON, e.g. '{"column":"id","op":"eq","value":5}'. Repeatable.
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Print only the splits, without read statements
        #[arg(long)]
        splits_only: bool,
    },

    /// Validate filters against a table and print them normalized
    Validate {
        #[arg(short, long)]
        keyspace: String,

        #[arg(short, long)]
        table: String,

        /// Filter as JSON. Repeatable.
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let snapshot = cli
        .snapshot
        .context("A cluster snapshot is required (--snapshot or RINGSPLIT_SNAPSHOT)")?;
    let cluster = load_cluster(&snapshot)?;

    match cli.command {
        Commands::Plan {
            uri,
            filters,
            splits_only,
        } => {
            plan_job(cluster, uri.as_deref(), &filters, splits_only).await?;
        }
        Commands::Validate {
            keyspace,
            table,
            filters,
        } => {
            validate(cluster, &keyspace, &table, &filters).await?;
        }
    }

    Ok(())
}

fn load_cluster(path: &Path) -> Result<Arc<MemoryCluster>> {
    let cluster = MemoryCluster::from_snapshot_file(path)
        .with_context(|| format!("Failed to load snapshot {:?}", path))?;
    Ok(Arc::new(cluster))
}

fn parse_filters(raw: &[String]) -> Result<Vec<Filter>> {
    raw.iter()
        .map(|s| serde_json::from_str(s).with_context(|| format!("Invalid filter: {}", s)))
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn plan_job(
    cluster: Arc<MemoryCluster>,
    uri: Option<&str>,
    filters: &[String],
    splits_only: bool,
) -> Result<()> {
    let mut config = match uri {
        Some(uri) => JobConfig::from_uri(uri).with_context(|| format!("Invalid job URI {}", uri))?,
        None => JobConfig::from_env()?,
    };
    config
        .filters(parse_filters(filters)?)?
        .connectors(ConnectorRegistry::new(vec![cluster.connector()]))?;

    let job = config.initialize().await?;
    info!(
        "Job for {} has {} splits ({:?})",
        job.namespace(),
        job.splits().len(),
        job.plan_mode()
    );

    if splits_only {
        let splits: &[Split] = job.splits();
        print_json(&splits)
    } else {
        print_json(&job.tasks())
    }
}

async fn validate(
    cluster: Arc<MemoryCluster>,
    keyspace: &str,
    table: &str,
    filters: &[String],
) -> Result<()> {
    let filters = parse_filters(filters)?;
    let resolver = ColumnMetadataResolver::default();
    let metadata = resolver
        .resolve_with(
            cluster.connector().as_ref(),
            &ConnectionParams::default(),
            keyspace,
            table,
        )
        .await?;

    let normalized = validate_filters(&filters, &metadata)?;
    info!(
        "{} filters valid for {} ({} after dedup)",
        filters.len(),
        metadata.namespace(),
        normalized.len()
    );
    print_json(&normalized)
}
