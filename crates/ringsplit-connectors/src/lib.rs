//! Ringsplit Connectors - cluster access for split planning
//!
//! This crate provides:
//! - the capability traits a datastore backend implements ([`Connector`], [`ClusterSession`])
//! - a registry that picks a connector by URI scheme
//! - an in-memory cluster backend (also loadable from a JSON snapshot)
//! - filter predicates and their CQL rendering
//! - the column metadata resolver and its cache
//! - the batched writer used on the write path

pub mod error;
pub mod filter;
pub mod memory;
pub mod query;
pub mod resolver;
pub mod session;
pub mod value;
pub mod writer;

pub use error::ConnectorError;
pub use filter::{build_where_clause, Filter, FilterOp};
pub use memory::{ClusterSnapshot, MemoryCluster, MemoryConnector};
pub use query::split_query;
pub use resolver::{ColumnMetadataResolver, MetadataCache};
pub use session::{
    ClusterSession, ConnectionParams, Connector, ConnectorRegistry, IndexDefinition, RangeEstimate,
};
pub use value::{Cell, CqlValue, Row};
pub use writer::{BatchWriter, WriteTarget};
