use std::fmt;

use ringsplit_core::IndexKind;
use serde::{Deserialize, Serialize};

use crate::value::CqlValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: CqlValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    In,
    Like,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Between => "BETWEEN",
            FilterOp::In => "IN",
            FilterOp::Like => "LIKE",
        }
    }

    /// The weakest index that can serve this operator on a regular column.
    pub fn required_index(&self) -> IndexKind {
        match self {
            FilterOp::Eq | FilterOp::In => IndexKind::Secondary,
            FilterOp::Gt
            | FilterOp::Gte
            | FilterOp::Lt
            | FilterOp::Lte
            | FilterOp::Between
            | FilterOp::Like => IndexKind::Custom,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn quote_identifier(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<CqlValue>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<CqlValue>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    /// Whether the value has the shape the operator expects:
    /// `between` needs a two-element list, `like` needs text.
    pub fn is_well_formed(&self) -> bool {
        match (&self.op, &self.value) {
            (FilterOp::Between, CqlValue::List(bounds)) => bounds.len() == 2,
            (FilterOp::Between, _) => false,
            (FilterOp::Like, CqlValue::Text(_)) => true,
            (FilterOp::Like, _) => false,
            (_, CqlValue::Null) => false,
            _ => true,
        }
    }

    pub fn to_cql(&self) -> String {
        let col = quote_identifier(&self.column);
        match (&self.op, &self.value) {
            (FilterOp::Between, CqlValue::List(bounds)) if bounds.len() == 2 => format!(
                "{} >= {} AND {} <= {}",
                col,
                bounds[0].to_cql(),
                col,
                bounds[1].to_cql()
            ),
            (FilterOp::In, CqlValue::List(items)) => {
                let list = items.iter().map(|v| v.to_cql()).collect::<Vec<_>>().join(", ");
                format!("{} IN ({})", col, list)
            }
            (FilterOp::In, v) => format!("{} IN ({})", col, v.to_cql()),
            // malformed filters never pass validation; render them as equality
            (FilterOp::Between, v) => format!("{} = {}", col, v.to_cql()),
            (op, v) => format!("{} {} {}", col, op.as_str(), v.to_cql()),
        }
    }
}

pub fn build_where_clause(filters: &[Filter]) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = filters.iter().map(|f| f.to_cql()).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(column: &str, op: FilterOp, value: CqlValue) -> Filter {
        Filter::new(column, op, value)
    }

    #[test]
    fn test_eq_text_to_cql() {
        let cql = Filter::eq("status", "active").to_cql();
        assert_eq!(cql, "\"status\" = 'active'");
    }

    #[test]
    fn test_eq_int_to_cql() {
        let cql = Filter::eq("count", 42).to_cql();
        assert_eq!(cql, "\"count\" = 42");
    }

    #[test]
    fn test_comparisons_to_cql() {
        assert_eq!(f("a", FilterOp::Gt, CqlValue::Int(1)).to_cql(), "\"a\" > 1");
        assert_eq!(f("a", FilterOp::Gte, CqlValue::Int(1)).to_cql(), "\"a\" >= 1");
        assert_eq!(f("a", FilterOp::Lt, CqlValue::Float(2.5)).to_cql(), "\"a\" < 2.5");
        assert_eq!(
            f("d", FilterOp::Lte, CqlValue::from("2024-12-31")).to_cql(),
            "\"d\" <= '2024-12-31'"
        );
    }

    #[test]
    fn test_between_to_cql() {
        let cql = f(
            "invoice_date",
            FilterOp::Between,
            CqlValue::List(vec!["2024-01-01".into(), "2024-01-31".into()]),
        )
        .to_cql();
        assert_eq!(
            cql,
            "\"invoice_date\" >= '2024-01-01' AND \"invoice_date\" <= '2024-01-31'"
        );
    }

    #[test]
    fn test_in_to_cql() {
        let cql = f(
            "category",
            FilterOp::In,
            CqlValue::List(vec!["food".into(), "drink".into()]),
        )
        .to_cql();
        assert_eq!(cql, "\"category\" IN ('food', 'drink')");
    }

    #[test]
    fn test_in_single_value() {
        let cql = f("type", FilterOp::In, CqlValue::from("a")).to_cql();
        assert_eq!(cql, "\"type\" IN ('a')");
    }

    #[test]
    fn test_like_to_cql() {
        let cql = f("name", FilterOp::Like, CqlValue::from("%acme%")).to_cql();
        assert_eq!(cql, "\"name\" LIKE '%acme%'");
    }

    #[test]
    fn test_well_formed() {
        assert!(Filter::eq("a", 1).is_well_formed());
        assert!(!f("a", FilterOp::Between, CqlValue::Int(1)).is_well_formed());
        assert!(!f("a", FilterOp::Between, CqlValue::List(vec![CqlValue::Int(1)])).is_well_formed());
        assert!(!f("a", FilterOp::Like, CqlValue::Int(1)).is_well_formed());
        assert!(!f("a", FilterOp::Eq, CqlValue::Null).is_well_formed());
    }

    #[test]
    fn test_required_index() {
        assert_eq!(FilterOp::Eq.required_index(), IndexKind::Secondary);
        assert_eq!(FilterOp::In.required_index(), IndexKind::Secondary);
        assert_eq!(FilterOp::Gt.required_index(), IndexKind::Custom);
        assert_eq!(FilterOp::Like.required_index(), IndexKind::Custom);
    }

    #[test]
    fn test_build_where_clause_empty() {
        assert_eq!(build_where_clause(&[]), "");
    }

    #[test]
    fn test_build_where_clause_multiple() {
        let clause = build_where_clause(&[
            Filter::eq("status", "active"),
            f("amount", FilterOp::Gte, CqlValue::Int(50)),
        ]);
        assert_eq!(clause, " WHERE \"status\" = 'active' AND \"amount\" >= 50");
    }

    #[test]
    fn test_deserialize_filter() {
        let json = r#"{"column":"date","op":"between","value":["2024-01-01","2024-01-31"]}"#;
        let filter: Filter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.op, FilterOp::Between);
        assert!(filter.is_well_formed());

        let json = r#"{"column":"id","op":"eq","value":5}"#;
        let filter: Filter = serde_json::from_str(json).unwrap();
        assert_eq!(filter, Filter::eq("id", 5));
    }

    #[test]
    fn test_injection_in_column_name() {
        let cql = Filter::eq("col\"; DROP TABLE users; --", "x").to_cql();
        assert!(cql.starts_with("\"col\"\"; DROP TABLE users; --\""));
    }

    #[test]
    fn test_injection_in_value() {
        let cql = Filter::eq("status", "'; DROP TABLE users; --").to_cql();
        assert_eq!(cql, "\"status\" = '''; DROP TABLE users; --'");
    }
}
