//! In-process predicate evaluation
//!
//! Applies a schema's scoped filters to deserialized records, with the same
//! semantics the generators push down natively. Missing fields fail every
//! predicate except IS_NULL.

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::generator::sql_pattern_to_regex;
use crate::query::{FilterOperator, FilterPredicate, FilterValue, QueryFilter};

/// Evaluates filters against records.
pub struct RecordFilter;

impl RecordFilter {
    /// Checks whether a record matches all filters (AND semantics).
    pub fn matches(record: &Value, filters: &[QueryFilter]) -> bool {
        filters
            .iter()
            .all(|filter| Self::matches_filter(record, filter))
    }

    /// Checks whether a record matches a single filter.
    pub fn matches_filter(record: &Value, filter: &QueryFilter) -> bool {
        let field_value = record.get(&filter.field_name);

        let (operator, expected) = match &filter.predicate {
            FilterPredicate::Custom(predicate) => return predicate.test(field_value),
            FilterPredicate::Compare { operator, value } => (*operator, value),
        };

        // Null checks are the only predicates a missing field can satisfy.
        match operator {
            FilterOperator::IsNull => {
                return field_value.map(Value::is_null).unwrap_or(true);
            }
            FilterOperator::IsNotNull => {
                return field_value.map(|v| !v.is_null()).unwrap_or(false);
            }
            _ => {}
        }

        let Some(actual) = field_value else {
            return false;
        };
        if actual.is_null() {
            return false;
        }

        match operator {
            FilterOperator::Equals => *actual == expected.to_json(),
            FilterOperator::NotEquals => *actual != expected.to_json(),
            FilterOperator::GreaterThan => {
                Self::compare(actual, expected).map(|o| o.is_gt()).unwrap_or(false)
            }
            FilterOperator::GreaterThanOrEqual => {
                Self::compare(actual, expected).map(|o| o.is_ge()).unwrap_or(false)
            }
            FilterOperator::LessThan => {
                Self::compare(actual, expected).map(|o| o.is_lt()).unwrap_or(false)
            }
            FilterOperator::LessThanOrEqual => {
                Self::compare(actual, expected).map(|o| o.is_le()).unwrap_or(false)
            }
            FilterOperator::Like => Self::like_match(actual, expected).unwrap_or(false),
            FilterOperator::NotLike => {
                Self::like_match(actual, expected).map(|m| !m).unwrap_or(false)
            }
            FilterOperator::In => Self::list_match(actual, expected).unwrap_or(false),
            FilterOperator::NotIn => {
                Self::list_match(actual, expected).map(|m| !m).unwrap_or(false)
            }
            FilterOperator::Between => match expected {
                FilterValue::Range(low, high) => {
                    let low_ok = Self::compare(actual, low)
                        .map(|o| o.is_ge())
                        .unwrap_or(false);
                    let high_ok = Self::compare(actual, high)
                        .map(|o| o.is_le())
                        .unwrap_or(false);
                    low_ok && high_ok
                }
                _ => false,
            },
            FilterOperator::StartsWith => {
                Self::text_pair(actual, expected).map(|(a, e)| a.starts_with(e)).unwrap_or(false)
            }
            FilterOperator::EndsWith => {
                Self::text_pair(actual, expected).map(|(a, e)| a.ends_with(e)).unwrap_or(false)
            }
            FilterOperator::Contains => {
                Self::text_pair(actual, expected).map(|(a, e)| a.contains(e)).unwrap_or(false)
            }
            FilterOperator::IsNull | FilterOperator::IsNotNull => unreachable!(),
        }
    }

    /// Orders a record value against a filter value: numbers numerically,
    /// strings lexicographically, nothing across types.
    fn compare(actual: &Value, expected: &FilterValue) -> Option<std::cmp::Ordering> {
        match (actual, expected) {
            (Value::Number(a), FilterValue::Number(b)) => {
                a.as_f64().and_then(|a| b.as_f64().and_then(|b| a.partial_cmp(&b)))
            }
            (Value::String(a), FilterValue::Text(b)) => Some(a.as_str().cmp(b.as_str())),
            (Value::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn like_match(actual: &Value, expected: &FilterValue) -> Option<bool> {
        let actual = actual.as_str()?;
        let pattern = expected.as_text()?;
        match Regex::new(&sql_pattern_to_regex(pattern)) {
            Ok(regex) => Some(regex.is_match(actual)),
            Err(err) => {
                warn!(pattern, error = %err, "invalid LIKE pattern");
                None
            }
        }
    }

    fn list_match(actual: &Value, expected: &FilterValue) -> Option<bool> {
        match expected {
            FilterValue::List(elements) => {
                Some(elements.iter().any(|e| e.to_json() == *actual))
            }
            _ => None,
        }
    }

    fn text_pair<'a>(actual: &'a Value, expected: &'a FilterValue) -> Option<(&'a str, &'a str)> {
        Some((actual.as_str()?, expected.as_text()?))
    }
}
