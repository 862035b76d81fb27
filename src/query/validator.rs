//! Structural validation for query specifications
//!
//! Validation is advisory: the caller invokes it explicitly, and no
//! generator or executor runs it implicitly. All problems are accumulated
//! in one pass; validation never short-circuits and never mutates the
//! specification.

use std::collections::HashSet;

use super::model::{QueryFilter, QuerySpecification, SchemaRef};

/// Validates query specifications, returning human-readable problems.
pub struct QueryValidator;

impl QueryValidator {
    /// Checks a specification and returns every structural problem found.
    ///
    /// An empty list means the specification is valid.
    pub fn validate(spec: &QuerySpecification) -> Vec<String> {
        let mut problems = Vec::new();

        if spec.root_schema.key().trim().is_empty() {
            problems.push("root schema must be present".to_string());
        }

        // Joins may not target a schema already participating (the root
        // counts as seen).
        let mut seen: HashSet<&SchemaRef> = HashSet::new();
        seen.insert(&spec.root_schema);
        for join in &spec.joins {
            if !seen.insert(&join.target_schema) {
                problems.push(format!(
                    "circular join: schema '{}' is already part of the query",
                    join.target_schema
                ));
            }
        }

        Self::check_filters(&spec.filters, &mut problems);
        for join in &spec.joins {
            Self::check_filters(&join.filters, &mut problems);
        }

        for sort in &spec.sort_orders {
            if sort.field_name.trim().is_empty() {
                problems.push(format!(
                    "sort order on schema '{}' has a blank field name",
                    sort.schema
                ));
            }
        }

        if let Some(limit) = spec.limit {
            if limit == 0 {
                problems.push("limit must be greater than zero when present".to_string());
            }
        }

        problems
    }

    fn check_filters(filters: &[QueryFilter], problems: &mut Vec<String>) {
        for filter in filters {
            if filter.field_name.trim().is_empty() {
                problems.push(format!(
                    "filter on schema '{}' has a blank field name",
                    filter.schema
                ));
            }
        }
    }
}
