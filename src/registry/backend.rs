//! Backend contracts and capability descriptors
//!
//! The registry and the storage backends are collaborators: this module
//! defines only the seams the executors need. An executor picks its
//! strategy from the `BackendDescriptor` alone, never by reaching into a
//! backend's internals.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::query::{FilterValue, SchemaRef};

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors surfaced by backend collaborators.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("deserialization failed: {0}")]
    Deserialize(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// The kind of storage technology backing a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Relational,
    Document,
    File,
}

/// Capability descriptor exposed by a backend handle.
///
/// `database` scopes document backends: the document executor only runs
/// natively when every participating schema shares one database instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub database: Option<String>,
}

impl BackendDescriptor {
    /// Descriptor for a relational backend.
    pub fn relational() -> Self {
        Self {
            kind: BackendKind::Relational,
            database: None,
        }
    }

    /// Descriptor for a document backend scoped to a database instance.
    pub fn document(database: impl Into<String>) -> Self {
        Self {
            kind: BackendKind::Document,
            database: Some(database.into()),
        }
    }

    /// Descriptor for a one-file-per-record backend.
    pub fn file() -> Self {
        Self {
            kind: BackendKind::File,
            database: None,
        }
    }
}

/// Relational backend collaborator.
///
/// Supplies identifier quoting and executes (SQL text, parameter list)
/// pairs; the execution machinery itself lives outside this crate.
#[async_trait]
pub trait RelationalBackend: Send + Sync {
    /// Table name for the schema.
    fn table(&self) -> &str;

    /// Quotes an identifier for the backend's dialect.
    fn quote_identifier(&self, identifier: &str) -> String;

    /// Executes a parameterized query, returning rows as JSON objects.
    async fn execute_query(&self, sql: &str, params: &[FilterValue]) -> BackendResult<Vec<Value>>;

    /// Full scan as (id, record) pairs, for the fallback execution path.
    async fn scan(&self) -> BackendResult<Vec<(String, Value)>>;
}

/// Document-store backend collaborator: a named collection handle.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Database instance identifier.
    fn database(&self) -> &str;

    /// Collection name for the schema.
    fn collection(&self) -> &str;

    /// Runs an aggregation pipeline against the collection.
    async fn run_aggregation(&self, pipeline: &[Value]) -> BackendResult<Vec<Value>>;

    /// Full scan as (id, record) pairs, for the fallback execution path.
    async fn scan(&self) -> BackendResult<Vec<(String, Value)>>;
}

/// One-file-per-record backend collaborator.
///
/// Records live under a base directory as `<id>.json`; deserialization of
/// the raw file contents is the backend's hook.
pub trait FileBackend: Send + Sync {
    /// Directory holding the schema's record files.
    fn base_dir(&self) -> &Path;

    /// Deserializes one record's raw JSON text.
    fn deserialize(&self, id: &str, raw: &str) -> BackendResult<Value>;
}

/// A resolved backend for one schema.
#[derive(Clone)]
pub enum BackendHandle {
    Relational(Arc<dyn RelationalBackend>),
    Document(Arc<dyn DocumentBackend>),
    File(Arc<dyn FileBackend>),
}

impl BackendHandle {
    /// Returns the capability descriptor for strategy selection.
    pub fn descriptor(&self) -> BackendDescriptor {
        match self {
            BackendHandle::Relational(_) => BackendDescriptor::relational(),
            BackendHandle::Document(backend) => BackendDescriptor::document(backend.database()),
            BackendHandle::File(_) => BackendDescriptor::file(),
        }
    }

    /// Returns the backend kind.
    pub fn kind(&self) -> BackendKind {
        self.descriptor().kind
    }
}

/// Maps a schema to its concrete storage backend.
pub trait SchemaRegistry: Send + Sync {
    /// Resolves the backend for a schema, or `None` if unregistered.
    fn backend_for(&self, schema: &SchemaRef) -> Option<BackendHandle>;
}
