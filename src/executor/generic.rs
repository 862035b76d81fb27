//! Always-correct in-memory fallback executor
//!
//! Loads each schema's matching identifiers independently and concurrently,
//! awaits them all, combines the identifier sets in declared join order,
//! then assembles, sorts, and paginates results in-process. Works over any
//! mix of backends; the capability-gated executors delegate here whenever
//! their native path does not apply.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::query::{QueryFilter, QuerySpecification, SchemaRef};
use crate::registry::{BackendHandle, FileBackend, SchemaRegistry};

use super::errors::{FederationError, FederationResult};
use super::filters::RecordFilter;
use super::id_set::IdSetAlgebra;
use super::result::CrossSchemaResult;
use super::sorter::ResultSorter;

/// Fallback executor performing identifier-set joins in memory.
pub struct GenericFederationExecutor {
    registry: Arc<dyn SchemaRegistry>,
}

impl GenericFederationExecutor {
    /// Creates an executor over the given registry.
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Executes a specification, returning joined, sorted, paginated results.
    pub async fn execute(
        &self,
        spec: &QuerySpecification,
    ) -> FederationResult<Vec<CrossSchemaResult>> {
        let query_id = Uuid::new_v4();

        // Every backend must resolve before any I/O starts.
        let mut backends: Vec<(SchemaRef, BackendHandle)> = Vec::new();
        for schema in spec.referenced_schemas() {
            let handle = self
                .registry
                .backend_for(schema)
                .ok_or_else(|| FederationError::NoBackend(schema.key().to_string()))?;
            backends.push((schema.clone(), handle));
        }

        // Per-schema loads fan out concurrently; the join barrier below
        // waits for all of them before any combination happens.
        let mut loads = JoinSet::new();
        for (schema, handle) in backends {
            let filters: Vec<QueryFilter> = spec.filters_for(&schema).to_vec();
            loads.spawn(async move {
                let records = load_matching(&schema, &handle, &filters).await;
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
            joins = spec.joins.len(),
            results = results.len(),
            "generic federation query complete"
        );
        Ok(results)
    }
}

/// Loads one schema's records and keeps only those matching its scoped
/// filters. Per-record failures are logged and excluded; a failure of the
/// scan itself fails the query.
async fn load_matching(
    schema: &SchemaRef,
    handle: &BackendHandle,
    filters: &[QueryFilter],
) -> FederationResult<HashMap<String, Value>> {
    let pairs = match handle {
        BackendHandle::Relational(backend) => backend
            .scan()
            .await
            .map_err(|err| FederationError::Execution(err.to_string()))?,
        BackendHandle::Document(backend) => backend
            .scan()
            .await
            .map_err(|err| FederationError::Execution(err.to_string()))?,
        BackendHandle::File(backend) => scan_file_backend(schema, backend).await?,
    };

    Ok(pairs
        .into_iter()
        .filter(|(_, record)| RecordFilter::matches(record, filters))
        .collect())
}

/// Scans a one-file-per-record directory, extracting identifiers from
/// `<id>.json` filenames. Unreadable or malformed files are skipped.
pub(crate) async fn scan_file_backend(
    schema: &SchemaRef,
    backend: &Arc<dyn FileBackend>,
) -> FederationResult<Vec<(String, Value)>> {
    let dir = backend.base_dir().to_path_buf();
    let mut entries = tokio::fs::read_dir(&dir).await.map_err(|err| {
        FederationError::Execution(format!("cannot list {}: {err}", dir.display()))
    })?;

    let mut records = Vec::new();
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
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match backend.deserialize(&id, &raw) {
                Ok(record) => records.push((id, record)),
                Err(err) => {
                    warn!(schema = %schema, id, error = %err, "record skipped: deserialization failed");
                }
            },
            Err(err) => {
                warn!(schema = %schema, id, error = %err, "record skipped: read failed");
            }
        }
    }
    Ok(records)
}

/// Folds the join operations, in declared order, over the root id set.
pub(crate) fn combine_ids(
    spec: &QuerySpecification,
    per_schema: &HashMap<SchemaRef, HashMap<String, Value>>,
) -> BTreeSet<String> {
    let ids_of = |schema: &SchemaRef| -> BTreeSet<String> {
        per_schema
            .get(schema)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default()
    };

    let mut running = ids_of(&spec.root_schema);
    for join in &spec.joins {
        running = IdSetAlgebra::combine(&running, &ids_of(&join.target_schema), join.join_type);
    }
    running
}

/// Builds one result per surviving id, attaching each schema's record only
/// when that schema produced one.
pub(crate) fn assemble(
    per_schema: &HashMap<SchemaRef, HashMap<String, Value>>,
    ids: BTreeSet<String>,
) -> Vec<CrossSchemaResult> {
    ids.into_iter()
        .map(|id| {
            let mut result = CrossSchemaResult::new(&id);
            for (schema, records) in per_schema {
                if let Some(record) = records.get(&id) {
                    result.insert(schema.clone(), record.clone());
                }
            }
            result
        })
        .collect()
}

/// Applies offset/limit. An offset at or past the end, or a zero limit,
/// yields an empty list.
pub(crate) fn paginate(
    results: Vec<CrossSchemaResult>,
    offset: u64,
    limit: Option<u64>,
) -> Vec<CrossSchemaResult> {
    let skipped = results.into_iter().skip(offset as usize);
    match limit {
        Some(limit) => skipped.take(limit as usize).collect(),
        None => skipped.collect(),
    }
}
