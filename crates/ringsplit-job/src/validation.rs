//! Filter validation against resolved table metadata.

use ringsplit_connectors::{Filter, FilterOp};
use ringsplit_core::{IndexKind, TableMetadata};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no column '{column}' in {table}")]
    NoSuchField { column: String, table: String },

    /// The filter needs an index the column does not have.
    #[error("filter '{op}' on column '{column}' requires a {required} index")]
    IndexNotFound {
        column: String,
        required: IndexKind,
        op: FilterOp,
    },

    #[error("malformed '{op}' filter on column '{column}'")]
    MalformedFilter { column: String, op: FilterOp },
}

/// Check every filter against `metadata` and return them deduplicated, in
/// first-seen order.
///
/// Equality on a partition key column is always servable. Every other filter
/// needs an index on its column that can serve the operator: a secondary
/// index serves `eq` and `in`, a custom index serves everything. The first
/// failing filter aborts validation. Validating the output again returns it
/// unchanged.
pub fn validate_filters(
    filters: &[Filter],
    metadata: &TableMetadata,
) -> Result<Vec<Filter>, ValidationError> {
    let mut normalized: Vec<Filter> = Vec::with_capacity(filters.len());

    for filter in filters {
        check_filter(filter, metadata)?;
        if !normalized.contains(filter) {
            normalized.push(filter.clone());
        }
    }

    debug!(
        "Validated {} filters for {} ({} after dedup)",
        filters.len(),
        metadata.namespace(),
        normalized.len()
    );
    Ok(normalized)
}

fn check_filter(filter: &Filter, metadata: &TableMetadata) -> Result<(), ValidationError> {
    let column = metadata
        .column(&filter.column)
        .ok_or_else(|| ValidationError::NoSuchField {
            column: filter.column.clone(),
            table: metadata.namespace(),
        })?;

    if !filter.is_well_formed() {
        return Err(ValidationError::MalformedFilter {
            column: filter.column.clone(),
            op: filter.op,
        });
    }

    if column.is_partition_key() && filter.op == FilterOp::Eq {
        return Ok(());
    }

    let required = filter.op.required_index();
    match column.index {
        Some(kind) if kind.satisfies(required) => Ok(()),
        _ => Err(ValidationError::IndexNotFound {
            column: filter.column.clone(),
            required,
            op: filter.op,
        }),
    }
}
