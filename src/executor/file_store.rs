//! Caching executor for one-file-per-record backends
//!
//! Applicable only when every referenced schema is file-backed; anything
//! else delegates wholesale to the generic fallback. On the native path the
//! per-schema directory scan fans out one task per file, consults the shared
//! record cache before touching the filesystem, and filters each record
//! immediately after deserialization so non-matching records never enter
//! the working set.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::query::{QueryFilter, QuerySpecification, SchemaRef};
use crate::registry::{BackendHandle, FileBackend, SchemaRegistry};

use super::cache::RecordCache;
use super::errors::{FederationError, FederationResult};
use super::filters::RecordFilter;
use super::generic::{assemble, combine_ids, paginate, GenericFederationExecutor};
use super::result::CrossSchemaResult;
use super::sorter::ResultSorter;

/// File-optimized executor with a shared per-record cache.
pub struct FileStoreExecutor {
    registry: Arc<dyn SchemaRegistry>,
    cache: Arc<RecordCache>,
    fallback: GenericFederationExecutor,
}

impl FileStoreExecutor {
    /// Creates an executor sharing the given cache.
    ///
    /// The cache is deliberately injected rather than owned: callers decide
    /// its TTL/capacity policy and may share one instance across executors.
    pub fn new(registry: Arc<dyn SchemaRegistry>, cache: Arc<RecordCache>) -> Self {
        let fallback = GenericFederationExecutor::new(Arc::clone(&registry));
        Self {
            registry,
            cache,
            fallback,
        }
    }

    /// Executes a specification over file-backed schemas, delegating to the
    /// generic executor when any participating schema is not file-backed.
    pub async fn execute(
        &self,
        spec: &QuerySpecification,
    ) -> FederationResult<Vec<CrossSchemaResult>> {
        let mut backends: Vec<(SchemaRef, Arc<dyn FileBackend>)> = Vec::new();
        for schema in spec.referenced_schemas() {
            let handle = self
                .registry
                .backend_for(schema)
                .ok_or_else(|| FederationError::NoBackend(schema.key().to_string()))?;
            match handle {
                BackendHandle::File(backend) => backends.push((schema.clone(), backend)),
                other => {
                    debug!(
                        schema = %schema,
                        kind = ?other.kind(),
                        "schema is not file-backed; delegating to generic executor"
                    );
                    return self.fallback.execute(spec).await;
                }
            }
        }
        let query_id = Uuid::new_v4();
        self.cache.sweep_expired();

        let mut loads = JoinSet::new();
        for (schema, backend) in backends {
            let filters: Vec<QueryFilter> = spec.filters_for(&schema).to_vec();
            let cache = Arc::clone(&self.cache);
            loads.spawn(async move {
                let records = load_schema_dir(&schema, backend, &filters, cache).await;
                (schema, records)
            });
        }

        let mut per_schema: HashMap<SchemaRef, HashMap<String, Value>> = HashMap::new();
        while let Some(joined) = loads.join_next().await {
            let (schema, records) =
                joined.map_err(|err| FederationError::TaskPanic(err.to_string()))?;
            per_schema.insert(schema, records?);
        }

        let final_ids = combine_ids(spec, &per_schema);
        let mut results = assemble(&per_schema, final_ids);
        ResultSorter::sort(&mut results, &spec.sort_orders);
        let results = paginate(results, spec.offset, spec.limit);

        info!(
            query_id = %query_id,
            root = %spec.root_schema,
            results = results.len(),
            cached = self.cache.len(),
            "file store query complete"
        );
        Ok(results)
    }
}

/// Scans a schema directory in parallel, one task per file, going through
/// the cache before reading and filtering immediately after deserializing.
async fn load_schema_dir(
    schema: &SchemaRef,
    backend: Arc<dyn FileBackend>,
    filters: &[QueryFilter],
    cache: Arc<RecordCache>,
) -> FederationResult<HashMap<String, Value>> {
    let dir = backend.base_dir().to_path_buf();
    let mut entries = tokio::fs::read_dir(&dir).await.map_err(|err| {
        FederationError::Execution(format!("cannot list {}: {err}", dir.display()))
    })?;

    let mut files = JoinSet::new();
    loop {
        let entry = entries.next_entry().await.map_err(|err| {
            FederationError::Execution(format!("cannot list {}: {err}", dir.display()))
        })?;
        let Some(entry) = entry else { break };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };

        let schema = schema.clone();
        let backend = Arc::clone(&backend);
        let cache = Arc::clone(&cache);
        files.spawn(async move { (id.clone(), load_record(&schema, &backend, &cache, &id, path).await) });
    }

    let mut records = HashMap::new();
    while let Some(joined) = files.join_next().await {
        let (id, record) = joined.map_err(|err| FederationError::TaskPanic(err.to_string()))?;
        if let Some(record) = record {
            if RecordFilter::matches(&record, filters) {
                records.insert(id, record);
            }
        }
    }
    Ok(records)
}

/// Loads one record, cache first. Read/parse failures are logged and yield
/// `None` so the identifier is simply excluded.
async fn load_record(
    schema: &SchemaRef,
    backend: &Arc<dyn FileBackend>,
    cache: &RecordCache,
    id: &str,
    path: PathBuf,
) -> Option<Value> {
    if let Some(record) = cache.get(schema, id) {
        return Some(record);
    }

    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(schema = %schema, id, error = %err, "record skipped: read failed");
            return None;
        }
    };
    match backend.deserialize(id, &raw) {
        Ok(record) => {
            cache.insert(schema, id, record.clone());
            Some(record)
        }
        Err(err) => {
            warn!(schema = %schema, id, error = %err, "record skipped: deserialization failed");
            None
        }
    }
}
