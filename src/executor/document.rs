//! Native executor for document-store backends
//!
//! Applicable only when every referenced schema is backed by the same
//! document-store database instance; anything else delegates wholesale to
//! the generic fallback. The native path runs the generated aggregation
//! pipeline as a single call against the root collection, then maps each
//! returned document into a cross-schema result. Predicates the generator
//! could not push down are re-applied client-side over the fetched results.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::generator::PipelineGenerator;
use crate::query::{FilterPredicate, QueryFilter, QuerySpecification, SchemaRef};
use crate::registry::{BackendHandle, DocumentBackend, SchemaRegistry};

use super::errors::{FederationError, FederationResult};
use super::filters::RecordFilter;
use super::generic::GenericFederationExecutor;
use super::result::CrossSchemaResult;

/// Executor running native aggregation pipelines.
pub struct DocumentStoreExecutor {
    registry: Arc<dyn SchemaRegistry>,
    generator: PipelineGenerator,
    fallback: GenericFederationExecutor,
}

impl DocumentStoreExecutor {
    /// Creates an executor with the default shared identifier field.
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        let fallback = GenericFederationExecutor::new(Arc::clone(&registry));
        Self {
            registry,
            generator: PipelineGenerator::default(),
            fallback,
        }
    }

    /// Creates an executor matching on a custom identifier field.
    pub fn with_id_field(registry: Arc<dyn SchemaRegistry>, id_field: impl Into<String>) -> Self {
        let fallback = GenericFederationExecutor::new(Arc::clone(&registry));
        Self {
            registry,
            generator: PipelineGenerator::new(id_field),
            fallback,
        }
    }

    /// Executes a specification natively, delegating to the generic
    /// executor when the schemas span backends or database instances.
    pub async fn execute(
        &self,
        spec: &QuerySpecification,
    ) -> FederationResult<Vec<CrossSchemaResult>> {
        let mut backends: Vec<(SchemaRef, Arc<dyn DocumentBackend>)> = Vec::new();
        for schema in spec.referenced_schemas() {
            let handle = self
                .registry
                .backend_for(schema)
                .ok_or_else(|| FederationError::NoBackend(schema.key().to_string()))?;
            match handle {
                BackendHandle::Document(backend) => backends.push((schema.clone(), backend)),
                other => {
                    debug!(
                        schema = %schema,
                        kind = ?other.kind(),
                        "schema is not document-backed; delegating to generic executor"
                    );
                    return self.fallback.execute(spec).await;
                }
            }
        }

        let root_database = backends[0].1.database().to_string();
        if backends
            .iter()
            .any(|(_, backend)| backend.database() != root_database)
        {
            debug!("schemas span multiple databases; delegating to generic executor");
            return self.fallback.execute(spec).await;
        }

        let query_id = Uuid::new_v4();
        let generated = self.generator.generate(spec);

        // One native call against the root collection; failure here fails
        // the whole query with no partial results.
        let documents = backends[0]
            .1
            .run_aggregation(&generated.stages)
            .await
            .map_err(|err| FederationError::Execution(err.to_string()))?;

        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            if let Some(result) = self.map_document(spec, &generated.aliases, document) {
                results.push(result);
            }
        }

        // Any filter the generator reported as a diagnostic was dropped from
        // the pipeline; re-test those here so the native path agrees with the
        // in-process evaluation the fallback would have applied.
        let residual: Vec<&QueryFilter> = spec
            .filters
            .iter()
            .chain(spec.joins.iter().flat_map(|j| j.filters.iter()))
            .filter(|f| {
                f.predicate.is_custom()
                    || generated
                        .diagnostics
                        .iter()
                        .any(|d| d.schema == f.schema && d.field_name == f.field_name)
            })
            .collect();
        if !residual.is_empty() {
            results.retain(|result| residual.iter().all(|f| passes_residual(result, f)));
        }

        info!(
            query_id = %query_id,
            root = %spec.root_schema,
            diagnostics = generated.diagnostics.len(),
            results = results.len(),
            "document store query complete"
        );
        Ok(results)
    }

    /// Maps one aggregation output document into a cross-schema result.
    ///
    /// The root section comes from the embedded root document (with lookup
    /// arrays stripped); each join section from its alias array's first
    /// element. A malformed section is logged and omitted; a document
    /// without an identifier is dropped entirely.
    fn map_document(
        &self,
        spec: &QuerySpecification,
        aliases: &std::collections::HashMap<SchemaRef, String>,
        document: Value,
    ) -> Option<CrossSchemaResult> {
        let id = match document.get(self.generator.id_field()) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Null) | None => {
                warn!("document skipped: missing identifier");
                return None;
            }
            Some(other) => other.to_string(),
        };
        let mut result = CrossSchemaResult::new(id);

        match document.get("root") {
            Some(Value::Object(root)) => {
                let mut section = root.clone();
                for alias in aliases.values() {
                    section.remove(alias);
                }
                result.insert(spec.root_schema.clone(), Value::Object(section));
            }
            _ => {
                warn!(
                    id = %result.id,
                    schema = %spec.root_schema,
                    "section omitted: embedded root document malformed"
                );
            }
        }

        for join in &spec.joins {
            let Some(alias) = aliases.get(&join.target_schema) else {
                continue;
            };
            match document.get(alias) {
                Some(Value::Array(items)) => {
                    if let Some(first) = items.first() {
                        result.insert(join.target_schema.clone(), first.clone());
                    }
                }
                Some(_) => {
                    warn!(
                        id = %result.id,
                        schema = %join.target_schema,
                        "section omitted: joined value is not an array"
                    );
                }
                None => {}
            }
        }

        Some(result)
    }
}

/// Re-tests one non-pushable filter against the section it is scoped to.
///
/// Compare filters run through the same in-process evaluation the fallback
/// uses; a result without that section is kept, since the pipeline's join
/// stages already decided its membership.
fn passes_residual(result: &CrossSchemaResult, filter: &QueryFilter) -> bool {
    match &filter.predicate {
        FilterPredicate::Custom(predicate) => {
            let field_value = result
                .record(&filter.schema)
                .and_then(|record| record.get(&filter.field_name));
            predicate.test(field_value)
        }
        FilterPredicate::Compare { .. } => match result.record(&filter.schema) {
            Some(record) => RecordFilter::matches_filter(record, filter),
            None => true,
        },
    }
}
