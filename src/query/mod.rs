//! Query specification subsystem
//!
//! The data model a caller uses to describe a cross-schema query (root
//! schema, scoped filters, join operations, sort orders, pagination) plus
//! its advisory structural validator.

mod model;
mod validator;

pub use model::{
    CustomPredicate, FilterOperator, FilterPredicate, FilterValue, JoinOperation, JoinType,
    NullHandling, QueryFilter, QuerySpecification, SchemaRef, SortDirection, SortOrder,
};
pub use validator::QueryValidator;
