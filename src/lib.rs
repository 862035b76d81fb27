//! crossquery - cross-schema federated query engine
//!
//! Describes queries that join records living in independently-stored
//! schemas keyed by a shared identifier, translates them into
//! backend-native form (parameterized SQL or an aggregation pipeline), and
//! executes them through a three-tier strategy: native document-store
//! execution, a caching file-store path, and an always-correct in-memory
//! fallback.

pub mod executor;
pub mod generator;
pub mod query;
pub mod registry;

pub use executor::{
    CrossSchemaResult, DocumentStoreExecutor, FederationError, FederationResult,
    FileStoreExecutor, GenericFederationExecutor, IdSetAlgebra, RecordCache,
};
pub use generator::{
    GeneratedPipeline, GeneratedSql, PipelineGenerator, SqlDialect, SqlGenerator,
    TranslationDiagnostic,
};
pub use query::{
    CustomPredicate, FilterOperator, FilterPredicate, FilterValue, JoinOperation, JoinType,
    NullHandling, QueryFilter, QuerySpecification, QueryValidator, SchemaRef, SortDirection,
    SortOrder,
};
pub use registry::{
    BackendDescriptor, BackendError, BackendHandle, BackendKind, BackendResult, DocumentBackend,
    FileBackend, RelationalBackend, SchemaRegistry,
};
