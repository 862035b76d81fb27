//! Federation Semantics Tests
//!
//! Join/sort/pagination semantics of the generic fallback executor over
//! in-memory backends, plus the document executor's capability gating,
//! result mapping, and client-side residual filtering:
//! - a no-join query returns exactly the root's matching ids
//! - INNER intersects, LEFT keeps, RIGHT replaces, FULL unions
//! - deterministic multi-key sorting with explicit null placement
//! - offset/limit edge cases
//! - advisory validation accumulates problems

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crossquery::{
    BackendError, BackendHandle, BackendResult, CustomPredicate, DocumentBackend,
    DocumentStoreExecutor, FederationError, FilterOperator, FilterValue,
    GenericFederationExecutor, JoinOperation, QueryFilter, QuerySpecification, QueryValidator,
    RelationalBackend, SchemaRef, SchemaRegistry, SortOrder,
};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

/// In-memory document backend; `scan` serves the generic path, and
/// `run_aggregation` replays canned output (or fails) for the native path.
struct MemoryBackend {
    database: String,
    collection: String,
    records: Vec<(String, Value)>,
    aggregation: Result<Vec<Value>, String>,
    seen_pipelines: Mutex<Vec<Vec<Value>>>,
}

impl MemoryBackend {
    fn new(database: &str, collection: &str, records: Vec<(&str, Value)>) -> Self {
        Self {
            database: database.to_string(),
            collection: collection.to_string(),
            records: records
                .into_iter()
                .map(|(id, v)| (id.to_string(), v))
                .collect(),
            aggregation: Ok(Vec::new()),
            seen_pipelines: Mutex::new(Vec::new()),
        }
    }

    fn with_aggregation(mut self, documents: Vec<Value>) -> Self {
        self.aggregation = Ok(documents);
        self
    }

    fn with_failing_aggregation(mut self, reason: &str) -> Self {
        self.aggregation = Err(reason.to_string());
        self
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    fn database(&self) -> &str {
        &self.database
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn run_aggregation(&self, pipeline: &[Value]) -> BackendResult<Vec<Value>> {
        self.seen_pipelines
            .lock()
            .unwrap()
            .push(pipeline.to_vec());
        self.aggregation
            .clone()
            .map_err(BackendError::Query)
    }

    async fn scan(&self) -> BackendResult<Vec<(String, Value)>> {
        Ok(self.records.clone())
    }
}

/// In-memory relational backend; `scan` serves the generic path.
struct MemoryTable {
    table: String,
    rows: Vec<(String, Value)>,
}

impl MemoryTable {
    fn new(table: &str, rows: Vec<(&str, Value)>) -> Arc<Self> {
        Arc::new(Self {
            table: table.to_string(),
            rows: rows.into_iter().map(|(id, v)| (id.to_string(), v)).collect(),
        })
    }
}

#[async_trait]
impl RelationalBackend for MemoryTable {
    fn table(&self) -> &str {
        &self.table
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{identifier}\"")
    }

    async fn execute_query(
        &self,
        _sql: &str,
        _params: &[FilterValue],
    ) -> BackendResult<Vec<Value>> {
        Err(BackendError::Query("not available".into()))
    }

    async fn scan(&self) -> BackendResult<Vec<(String, Value)>> {
        Ok(self.rows.clone())
    }
}

struct TestRegistry {
    backends: HashMap<SchemaRef, BackendHandle>,
}

impl TestRegistry {
    fn new(backends: Vec<(&str, Arc<MemoryBackend>)>) -> Arc<Self> {
        Arc::new(Self {
            backends: backends
                .into_iter()
                .map(|(schema, backend)| {
                    (SchemaRef::new(schema), BackendHandle::Document(backend))
                })
                .collect(),
        })
    }
}

impl SchemaRegistry for TestRegistry {
    fn backend_for(&self, schema: &SchemaRef) -> Option<BackendHandle> {
        self.backends.get(schema).cloned()
    }
}

fn users_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new(
        "primary",
        "users",
        vec![
            ("u1", json!({"uuid": "u1", "name": "amy", "age": 31})),
            ("u2", json!({"uuid": "u2", "name": "bob", "age": 17})),
            ("u3", json!({"uuid": "u3", "name": "cam", "age": 45})),
        ],
    ))
}

fn orders_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new(
        "primary",
        "orders",
        vec![
            ("u1", json!({"uuid": "u1", "total": 20})),
            ("u4", json!({"uuid": "u4", "total": 99})),
        ],
    ))
}

fn ids(results: &[crossquery::CrossSchemaResult]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

// =============================================================================
// Generic Executor: Root Filtering
// =============================================================================

/// With no joins, the result id set is exactly the root's ids passing the
/// root filters.
#[tokio::test]
async fn test_no_join_returns_filtered_root_ids() {
    let registry = TestRegistry::new(vec![("users", users_backend())]);
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_filter(QueryFilter::compare(
        "users",
        "age",
        FilterOperator::GreaterThanOrEqual,
        18i64,
    ));

    let results = executor.execute(&spec).await.unwrap();
    assert_eq!(ids(&results), vec!["u1", "u3"]);
}

#[tokio::test]
async fn test_unregistered_schema_fails_before_io() {
    let registry = TestRegistry::new(vec![("users", users_backend())]);
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_join(JoinOperation::inner("ghosts"));
    let err = executor.execute(&spec).await.unwrap_err();
    assert!(matches!(err, FederationError::NoBackend(ref s) if s == "ghosts"));
}

// =============================================================================
// Generic Executor: Join Semantics
// =============================================================================

#[tokio::test]
async fn test_inner_join_intersects_id_sets() {
    let registry =
        TestRegistry::new(vec![("users", users_backend()), ("orders", orders_backend())]);
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_join(JoinOperation::inner("orders"));
    let results = executor.execute(&spec).await.unwrap();

    assert_eq!(ids(&results), vec!["u1"]);
    assert!(results[0].has(&SchemaRef::new("users")));
    assert!(results[0].has(&SchemaRef::new("orders")));
}

#[tokio::test]
async fn test_left_join_keeps_root_ids_with_gaps() {
    let registry =
        TestRegistry::new(vec![("users", users_backend()), ("orders", orders_backend())]);
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_join(JoinOperation::left("orders"));
    let results = executor.execute(&spec).await.unwrap();

    assert_eq!(ids(&results), vec!["u1", "u2", "u3"]);
    let u2 = results.iter().find(|r| r.id == "u2").unwrap();
    assert!(u2.has(&SchemaRef::new("users")));
    assert!(!u2.has(&SchemaRef::new("orders")));
}

#[tokio::test]
async fn test_right_join_replaces_running_set() {
    let registry =
        TestRegistry::new(vec![("users", users_backend()), ("orders", orders_backend())]);
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users")
        .with_filter(QueryFilter::compare(
            "users",
            "age",
            FilterOperator::GreaterThan,
            100i64,
        ))
        .with_join(JoinOperation::right("orders"));
    let results = executor.execute(&spec).await.unwrap();

    // The root constraint matched nothing, yet RIGHT discards the running
    // set entirely: exactly the join target's ids survive.
    assert_eq!(ids(&results), vec!["u1", "u4"]);
    let u4 = results.iter().find(|r| r.id == "u4").unwrap();
    assert!(!u4.has(&SchemaRef::new("users")));
}

#[tokio::test]
async fn test_full_join_unions_id_sets() {
    let registry =
        TestRegistry::new(vec![("users", users_backend()), ("orders", orders_backend())]);
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_join(JoinOperation::full("orders"));
    let results = executor.execute(&spec).await.unwrap();
    assert_eq!(ids(&results), vec!["u1", "u2", "u3", "u4"]);
}

/// The generic executor joins across backend kinds: a document-backed root
/// against a relational-backed join target, with the join's filters applied
/// to the relational rows.
#[tokio::test]
async fn test_inner_join_across_relational_backed_schema() {
    let payments = MemoryTable::new(
        "payments",
        vec![
            ("u1", json!({"uuid": "u1", "amount": 75})),
            ("u3", json!({"uuid": "u3", "amount": 5})),
            ("u9", json!({"uuid": "u9", "amount": 120})),
        ],
    );
    let mut backends = HashMap::new();
    backends.insert(
        SchemaRef::new("users"),
        BackendHandle::Document(users_backend()),
    );
    backends.insert(
        SchemaRef::new("payments"),
        BackendHandle::Relational(payments),
    );
    let registry = Arc::new(TestRegistry { backends });
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_join(
        JoinOperation::inner("payments").with_filter(QueryFilter::compare(
            "payments",
            "amount",
            FilterOperator::GreaterThan,
            50i64,
        )),
    );
    let results = executor.execute(&spec).await.unwrap();

    // u3's payment fails the filter and u9 is not a user; only u1 survives.
    assert_eq!(ids(&results), vec!["u1"]);
    assert_eq!(
        results[0].record(&SchemaRef::new("payments")),
        Some(&json!({"uuid": "u1", "amount": 75}))
    );
    assert!(results[0].has(&SchemaRef::new("users")));
}

#[tokio::test]
async fn test_join_filters_scope_to_target_schema() {
    let registry =
        TestRegistry::new(vec![("users", users_backend()), ("orders", orders_backend())]);
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_join(
        JoinOperation::inner("orders").with_filter(QueryFilter::compare(
            "orders",
            "total",
            FilterOperator::GreaterThan,
            50i64,
        )),
    );
    let results = executor.execute(&spec).await.unwrap();
    // u1's order has total 20; only u4's passes, and u4 is not a user.
    assert!(results.is_empty());
}

// =============================================================================
// Generic Executor: Sorting & Pagination
// =============================================================================

#[tokio::test]
async fn test_sort_with_nulls_first_and_tiebreak() {
    let users = Arc::new(MemoryBackend::new(
        "primary",
        "users",
        vec![
            ("u1", json!({"rank": 2, "name": "zoe"})),
            ("u2", json!({"name": "amy"})),
            ("u3", json!({"rank": 2, "name": "kim"})),
        ],
    ));
    let registry = TestRegistry::new(vec![("users", users)]);
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users")
        .with_sort(SortOrder::asc("users", "rank").nulls_first())
        .with_sort(SortOrder::asc("users", "name"));
    let results = executor.execute(&spec).await.unwrap();

    // u2 has no rank (nulls first); the rank tie breaks on name.
    assert_eq!(ids(&results), vec!["u2", "u3", "u1"]);
}

#[tokio::test]
async fn test_pagination_edges() {
    let registry = TestRegistry::new(vec![("users", users_backend())]);
    let executor = GenericFederationExecutor::new(registry);

    let base = QuerySpecification::new("users").with_sort(SortOrder::asc("users", "name"));

    let results = executor.execute(&base.clone().with_offset(3)).await.unwrap();
    assert!(results.is_empty());

    let results = executor.execute(&base.clone().with_offset(99)).await.unwrap();
    assert!(results.is_empty());

    let results = executor.execute(&base.clone().with_limit(0)).await.unwrap();
    assert!(results.is_empty());

    let results = executor
        .execute(&base.clone().with_offset(1).with_limit(1))
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["u2"]);
}

// =============================================================================
// Validation (advisory, explicit)
// =============================================================================

#[test]
fn test_validation_reports_duplicate_join_target() {
    let spec = QuerySpecification::new("users")
        .with_join(JoinOperation::inner("orders"))
        .with_join(JoinOperation::full("orders"));

    let problems = QueryValidator::validate(&spec);
    assert_eq!(problems.len(), 1);
    assert!(problems[0].contains("orders"));
}

#[test]
fn test_validation_accumulates_all_problems() {
    let spec = QuerySpecification::new("users")
        .with_filter(QueryFilter::compare(
            "users",
            " ",
            FilterOperator::Equals,
            1i64,
        ))
        .with_join(JoinOperation::inner("users"))
        .with_limit(0);

    let problems = QueryValidator::validate(&spec);
    assert_eq!(problems.len(), 3);
}

/// Executors never validate implicitly: a spec the validator rejects still
/// executes with the documented semantics.
#[tokio::test]
async fn test_executors_do_not_validate_implicitly() {
    let registry = TestRegistry::new(vec![("users", users_backend())]);
    let executor = GenericFederationExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_limit(0);
    assert!(!QueryValidator::validate(&spec).is_empty());
    let results = executor.execute(&spec).await.unwrap();
    assert!(results.is_empty());
}

// =============================================================================
// Document Executor: Gating, Mapping, Residual Filters
// =============================================================================

fn aggregation_document(id: &str, root: Value, joined: Vec<Value>) -> Value {
    json!({ "uuid": id, "root": root, "t1": joined })
}

#[tokio::test]
async fn test_document_executor_maps_aggregation_output() {
    let users = Arc::new(
        MemoryBackend::new("primary", "users", vec![]).with_aggregation(vec![
            aggregation_document(
                "u1",
                json!({"uuid": "u1", "name": "amy", "t1": [{"total": 20}]}),
                vec![json!({"uuid": "u1", "total": 20})],
            ),
            aggregation_document("u9", json!({"uuid": "u9", "name": "eve"}), vec![]),
        ]),
    );
    let orders = Arc::new(MemoryBackend::new("primary", "orders", vec![]));
    let registry = TestRegistry::new(vec![("users", users), ("orders", orders)]);
    let executor = DocumentStoreExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_join(JoinOperation::left("orders"));
    let results = executor.execute(&spec).await.unwrap();

    assert_eq!(results.len(), 2);
    let u1 = &results[0];
    assert_eq!(u1.id, "u1");
    // Root section is the embedded root document with lookup arrays removed.
    assert_eq!(
        u1.record(&SchemaRef::new("users")),
        Some(&json!({"uuid": "u1", "name": "amy"}))
    );
    // Join section is the alias array's first element.
    assert_eq!(
        u1.record(&SchemaRef::new("orders")),
        Some(&json!({"uuid": "u1", "total": 20}))
    );
    // Empty lookup array leaves a gap.
    assert!(!results[1].has(&SchemaRef::new("orders")));
}

#[tokio::test]
async fn test_document_executor_applies_custom_predicates_client_side() {
    let users = Arc::new(
        MemoryBackend::new("primary", "users", vec![]).with_aggregation(vec![
            aggregation_document("u1", json!({"uuid": "u1", "score": 10}), vec![]),
            aggregation_document("u2", json!({"uuid": "u2", "score": 3}), vec![]),
        ]),
    );
    let registry = TestRegistry::new(vec![("users", users)]);
    let executor = DocumentStoreExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_filter(QueryFilter::custom(
        "users",
        "score",
        CustomPredicate::new("high_score", |v| {
            v.and_then(Value::as_i64).map(|n| n >= 5).unwrap_or(false)
        }),
    ));
    let results = executor.execute(&spec).await.unwrap();
    assert_eq!(ids(&results), vec!["u1"]);
}

/// A compare filter the generator cannot translate (BETWEEN without a
/// range) is re-tested in process after the native call, so the native path
/// rejects the same records the fallback's evaluation would.
#[tokio::test]
async fn test_document_executor_retests_untranslatable_compare_filters() {
    let users = Arc::new(
        MemoryBackend::new("primary", "users", vec![]).with_aggregation(vec![
            aggregation_document("u1", json!({"uuid": "u1", "age": 30}), vec![]),
        ]),
    );
    let registry = TestRegistry::new(vec![("users", users)]);
    let executor = DocumentStoreExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_filter(QueryFilter::compare(
        "users",
        "age",
        FilterOperator::Between,
        10i64,
    ));
    let results = executor.execute(&spec).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_document_executor_fails_whole_query_on_aggregation_error() {
    let users = Arc::new(
        MemoryBackend::new("primary", "users", vec![])
            .with_failing_aggregation("connection reset"),
    );
    let registry = TestRegistry::new(vec![("users", users)]);
    let executor = DocumentStoreExecutor::new(registry);

    let spec = QuerySpecification::new("users");
    let err = executor.execute(&spec).await.unwrap_err();
    assert!(matches!(err, FederationError::Execution(_)));
    assert!(err.to_string().contains("connection reset"));
}

/// Schemas on different database instances cannot share one pipeline; the
/// executor falls back to the generic path and still answers correctly.
#[tokio::test]
async fn test_document_executor_delegates_across_databases() {
    let users = users_backend();
    let orders = Arc::new(MemoryBackend::new(
        "analytics",
        "orders",
        vec![("u1", json!({"uuid": "u1", "total": 20}))],
    ));
    let registry = TestRegistry::new(vec![("users", users), ("orders", orders)]);
    let executor = DocumentStoreExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_join(JoinOperation::inner("orders"));
    let results = executor.execute(&spec).await.unwrap();
    assert_eq!(ids(&results), vec!["u1"]);
}

#[tokio::test]
async fn test_document_executor_runs_one_native_call_on_root() {
    let users = Arc::new(MemoryBackend::new("primary", "users", vec![]).with_aggregation(vec![]));
    let orders = Arc::new(MemoryBackend::new("primary", "orders", vec![]));
    let registry = TestRegistry::new(vec![("users", users.clone()), ("orders", orders.clone())]);
    let executor = DocumentStoreExecutor::new(registry);

    let spec = QuerySpecification::new("users").with_join(JoinOperation::inner("orders"));
    executor.execute(&spec).await.unwrap();

    assert_eq!(users.seen_pipelines.lock().unwrap().len(), 1);
    assert!(orders.seen_pipelines.lock().unwrap().is_empty());
}
