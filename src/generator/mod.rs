//! Database query generation subsystem
//!
//! Stateless translation of a `QuerySpecification` into backend-native
//! query text: parameterized SQL for relational backends, an aggregation
//! stage list for document stores. No I/O is ever performed here.
//!
//! Both paths share deterministic alias assignment (`t0` for the root,
//! `t1..tN` for joins in declared order) and report predicates they cannot
//! push down as first-class `TranslationDiagnostic`s so callers can
//! re-apply them client-side.

mod pipeline;
mod sql;

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::query::{QuerySpecification, SchemaRef};

pub use pipeline::{GeneratedPipeline, PipelineGenerator};
pub(crate) use pipeline::sql_pattern_to_regex;
pub use sql::{GeneratedSql, SqlDialect, SqlGenerator};

/// A predicate the generator could not express in the target language.
///
/// The predicate is omitted from the generated query; on native execution
/// paths it must be re-applied client-side.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationDiagnostic {
    /// Schema the predicate is scoped to.
    pub schema: SchemaRef,
    /// Field the predicate tests.
    pub field_name: String,
    /// Why translation failed.
    pub reason: String,
}

impl TranslationDiagnostic {
    pub fn new(
        schema: &SchemaRef,
        field_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.clone(),
            field_name: field_name.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TranslationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: {}",
            self.schema, self.field_name, self.reason
        )
    }
}

/// Assigns deterministic table aliases in root-then-join order.
pub(crate) fn assign_aliases(spec: &QuerySpecification) -> Vec<(SchemaRef, String)> {
    spec.referenced_schemas()
        .into_iter()
        .enumerate()
        .map(|(i, schema)| (schema.clone(), format!("t{i}")))
        .collect()
}

/// Ordered aliases as a lookup map for generator output.
pub(crate) fn alias_map(aliases: &[(SchemaRef, String)]) -> HashMap<SchemaRef, String> {
    aliases.iter().cloned().collect()
}
