//! Federated query execution subsystem
//!
//! Three strategies over one contract — every executor takes a
//! `QuerySpecification` and asynchronously returns a list of
//! `CrossSchemaResult`s with identical join/sort/pagination semantics:
//!
//! - `GenericFederationExecutor` — always-correct in-memory fallback
//!   performing identifier-set joins;
//! - `FileStoreExecutor` — caching, parallel-scan optimization for
//!   one-file-per-record backends;
//! - `DocumentStoreExecutor` — native aggregation-pipeline execution for
//!   single-database document stores.
//!
//! The optimized executors are capability-gated and delegate wholesale to
//! the generic fallback whenever their native path does not apply.

mod cache;
mod document;
mod errors;
mod file_store;
mod filters;
mod generic;
mod id_set;
mod result;
mod sorter;

pub use cache::RecordCache;
pub use document::DocumentStoreExecutor;
pub use errors::{FederationError, FederationResult};
pub use file_store::FileStoreExecutor;
pub use filters::RecordFilter;
pub use generic::GenericFederationExecutor;
pub use id_set::IdSetAlgebra;
pub use result::CrossSchemaResult;
pub use sorter::ResultSorter;
