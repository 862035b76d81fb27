//! Schema/backend registry contracts
//!
//! Collaborator seams: the registry maps a schema to a backend handle whose
//! capability descriptor drives executor strategy selection.

mod backend;

pub use backend::{
    BackendDescriptor, BackendError, BackendHandle, BackendKind, BackendResult, DocumentBackend,
    FileBackend, RelationalBackend, SchemaRegistry,
};
