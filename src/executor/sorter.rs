//! Result sorting for federated execution
//!
//! Chained multi-key comparator over cross-schema results. Each key names a
//! schema and field; missing sections and null values are placed per the
//! key's null handling. Values order natively when both sides are numbers,
//! strings, or booleans, and fall back to string rendering otherwise. Final
//! ties break on the shared identifier so output order is deterministic.

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::{NullHandling, SortDirection, SortOrder};

use super::result::CrossSchemaResult;

/// Sorts cross-schema results.
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts results in place according to the sort orders, in declared
    /// order, breaking remaining ties by identifier.
    pub fn sort(results: &mut [CrossSchemaResult], sort_orders: &[SortOrder]) {
        results.sort_by(|a, b| {
            for sort in sort_orders {
                let ordering = Self::compare_by(a, b, sort);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.id.cmp(&b.id)
        });
    }

    /// Compares two results on one sort key.
    fn compare_by(a: &CrossSchemaResult, b: &CrossSchemaResult, sort: &SortOrder) -> Ordering {
        let a_val = Self::sort_value(a, sort);
        let b_val = Self::sort_value(b, sort);

        match (a_val, b_val) {
            (None, None) => Ordering::Equal,
            // Null placement is absolute, independent of direction.
            (None, Some(_)) => match sort.null_handling {
                NullHandling::NullsFirst => Ordering::Less,
                NullHandling::NullsLast => Ordering::Greater,
            },
            (Some(_), None) => match sort.null_handling {
                NullHandling::NullsFirst => Ordering::Greater,
                NullHandling::NullsLast => Ordering::Less,
            },
            (Some(a_val), Some(b_val)) => {
                let ordering = Self::compare_values(a_val, b_val);
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            }
        }
    }

    /// Extracts the sort key value; missing sections, missing fields, and
    /// explicit nulls all count as null.
    fn sort_value<'a>(result: &'a CrossSchemaResult, sort: &SortOrder) -> Option<&'a Value> {
        result
            .record(&sort.schema)
            .and_then(|record| record.get(&sort.field_name))
            .filter(|value| !value.is_null())
    }

    /// Compares two non-null JSON values.
    fn compare_values(a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Number(a_n), Value::Number(b_n)) => {
                let a_f = a_n.as_f64().unwrap_or(0.0);
                let b_f = b_n.as_f64().unwrap_or(0.0);
                a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
            }
            (Value::String(a_s), Value::String(b_s)) => a_s.cmp(b_s),
            (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
            // No native ordering across types; fall back to string rendering.
            _ => a.to_string().cmp(&b.to_string()),
        }
    }
}
