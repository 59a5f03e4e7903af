//! CQL statements for reading a single split.

use ringsplit_core::{TableMetadata, TokenRange};

use crate::filter::Filter;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Build the read statement for one token range of `metadata`'s table.
///
/// The range is rendered as an inclusive bound pair (`token >= start AND
/// token <= end - 1`) so the exclusive end of the token space never has to be
/// written as a literal. `ALLOW FILTERING` is appended only when a filter
/// targets a column outside the partition key.
pub fn split_query(metadata: &TableMetadata, range: &TokenRange, filters: &[Filter]) -> String {
    let keys: Vec<String> = metadata.partition_key().map(|c| quote(&c.name)).collect();

    let mut predicates = Vec::with_capacity(filters.len() + 2);
    if !keys.is_empty() {
        let token = format!("token({})", keys.join(", "));
        predicates.push(format!("{} >= {}", token, range.start));
        predicates.push(format!("{} <= {}", token, range.end - 1));
    }
    predicates.extend(filters.iter().map(|f| f.to_cql()));

    let mut query = format!(
        "SELECT * FROM {}.{}",
        quote(&metadata.keyspace),
        quote(&metadata.table)
    );
    if !predicates.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&predicates.join(" AND "));
    }

    let needs_filtering = filters.iter().any(|f| {
        metadata
            .column(&f.column)
            .is_none_or(|column| !column.is_partition_key())
    });
    if needs_filtering {
        query.push_str(" ALLOW FILTERING");
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOp;
    use ringsplit_core::{ColumnDefinition, Partitioner};

    fn users() -> TableMetadata {
        TableMetadata::new(
            "app",
            "users",
            vec![
                ColumnDefinition::new("id", "int").partition_key(),
                ColumnDefinition::new("name", "text"),
            ],
        )
    }

    #[test]
    fn test_query_without_filters() {
        let q = split_query(&users(), &TokenRange::new(0, 100), &[]);
        assert_eq!(
            q,
            "SELECT * FROM \"app\".\"users\" WHERE token(\"id\") >= 0 AND token(\"id\") <= 99"
        );
    }

    #[test]
    fn test_query_end_of_murmur3_ring() {
        let ring = Partitioner::Murmur3.full_ring();
        let q = split_query(&users(), &TokenRange::new(0, ring.end), &[]);
        assert!(q.ends_with(&format!("<= {}", i64::MAX)));
    }

    #[test]
    fn test_query_with_regular_column_filter() {
        let filters = [Filter::new("name", FilterOp::Eq, "bob")];
        let q = split_query(&users(), &TokenRange::new(-5, 5), &filters);
        assert_eq!(
            q,
            "SELECT * FROM \"app\".\"users\" WHERE token(\"id\") >= -5 AND token(\"id\") <= 4 \
             AND \"name\" = 'bob' ALLOW FILTERING"
        );
    }

    #[test]
    fn test_query_partition_key_filter_needs_no_filtering() {
        let filters = [Filter::eq("id", 5)];
        let q = split_query(&users(), &TokenRange::new(0, 10), &filters);
        assert!(q.ends_with("AND \"id\" = 5"));
        assert!(!q.contains("ALLOW FILTERING"));
    }

    #[test]
    fn test_composite_partition_key() {
        let table = TableMetadata::new(
            "app",
            "events",
            vec![
                ColumnDefinition::new("tenant", "text").partition_key(),
                ColumnDefinition::new("day", "date").partition_key(),
                ColumnDefinition::new("seq", "int"),
            ],
        );
        let q = split_query(&table, &TokenRange::new(1, 2), &[]);
        assert!(q.contains("token(\"tenant\", \"day\") >= 1"));
    }
}
