//! Cross-schema query data model
//!
//! Defines the query specification consumed by the generators and executors:
//! schema references, typed filter values, filter predicates, join
//! operations, sort orders, and the top-level `QuerySpecification`.
//!
//! A specification is built once and treated as immutable by every consumer.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque key identifying one logical collection/table.
///
/// Equality is by key value; used as a map key throughout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRef(String);

impl SchemaRef {
    /// Creates a schema reference from a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the schema key.
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SchemaRef {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for SchemaRef {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Typed filter value.
///
/// Keeping values tagged (instead of an untyped blob) lets the generators
/// check operator/value pairings at translation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    /// Element list for IN / NOT_IN.
    List(Vec<FilterValue>),
    /// Inclusive two-ended range for BETWEEN.
    Range(Box<FilterValue>, Box<FilterValue>),
}

impl FilterValue {
    /// Creates a range value from two ends.
    pub fn range(low: impl Into<FilterValue>, high: impl Into<FilterValue>) -> Self {
        FilterValue::Range(Box::new(low.into()), Box::new(high.into()))
    }

    /// Creates a list value from elements.
    pub fn list(elements: impl IntoIterator<Item = FilterValue>) -> Self {
        FilterValue::List(elements.into_iter().collect())
    }

    /// Renders the value as JSON for in-process comparison.
    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Null => Value::Null,
            FilterValue::Bool(b) => Value::Bool(*b),
            FilterValue::Number(n) => Value::Number(n.clone()),
            FilterValue::Text(s) => Value::String(s.clone()),
            FilterValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            FilterValue::Range(low, high) => Value::Array(vec![low.to_json(), high.to_json()]),
        }
    }

    /// Returns the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Number(v.into())
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        serde_json::Number::from_f64(v)
            .map(FilterValue::Number)
            .unwrap_or(FilterValue::Null)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

/// Filter operator set shared by the SQL and pipeline translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
    StartsWith,
    EndsWith,
    Contains,
}

impl FilterOperator {
    /// Returns the operator name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "EQUALS",
            FilterOperator::NotEquals => "NOT_EQUALS",
            FilterOperator::GreaterThan => "GREATER_THAN",
            FilterOperator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            FilterOperator::LessThan => "LESS_THAN",
            FilterOperator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            FilterOperator::Like => "LIKE",
            FilterOperator::NotLike => "NOT_LIKE",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT_IN",
            FilterOperator::IsNull => "IS_NULL",
            FilterOperator::IsNotNull => "IS_NOT_NULL",
            FilterOperator::Between => "BETWEEN",
            FilterOperator::StartsWith => "STARTS_WITH",
            FilterOperator::EndsWith => "ENDS_WITH",
            FilterOperator::Contains => "CONTAINS",
        }
    }
}

/// An opaque predicate testable only in-process.
///
/// Native query generators cannot translate it; they drop it from the
/// generated query and report a translation diagnostic so the caller (or the
/// native executors themselves) can re-apply it client-side.
#[derive(Clone)]
pub struct CustomPredicate {
    name: String,
    test: Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync>,
}

impl CustomPredicate {
    /// Wraps a closure over the (possibly absent) field value.
    pub fn new(
        name: impl Into<String>,
        test: impl Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            test: Arc::new(test),
        }
    }

    /// Returns the predicate's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tests the predicate against a field value.
    pub fn test(&self, value: Option<&Value>) -> bool {
        (self.test)(value)
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPredicate")
            .field("name", &self.name)
            .finish()
    }
}

/// The testable part of a filter: an operator/value pair or a custom
/// in-process predicate.
#[derive(Debug, Clone)]
pub enum FilterPredicate {
    Compare {
        operator: FilterOperator,
        value: FilterValue,
    },
    Custom(CustomPredicate),
}

impl FilterPredicate {
    /// Returns true if this predicate cannot be expressed in a native query.
    pub fn is_custom(&self) -> bool {
        matches!(self, FilterPredicate::Custom(_))
    }
}

/// A single filter, scoped to one schema.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    /// Schema the filter applies to.
    pub schema: SchemaRef,
    /// Field within that schema's records.
    pub field_name: String,
    /// The predicate to test.
    pub predicate: FilterPredicate,
}

impl QueryFilter {
    /// Creates an operator/value filter.
    pub fn compare(
        schema: impl Into<SchemaRef>,
        field_name: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            schema: schema.into(),
            field_name: field_name.into(),
            predicate: FilterPredicate::Compare {
                operator,
                value: value.into(),
            },
        }
    }

    /// Creates a custom-predicate filter, testable only in-process.
    pub fn custom(
        schema: impl Into<SchemaRef>,
        field_name: impl Into<String>,
        predicate: CustomPredicate,
    ) -> Self {
        Self {
            schema: schema.into(),
            field_name: field_name.into(),
            predicate: FilterPredicate::Custom(predicate),
        }
    }
}

/// Join-type policy for combining identifier sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Returns the SQL join keyword.
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
        }
    }
}

/// A request to combine the running identifier set with another schema's.
#[derive(Debug, Clone)]
pub struct JoinOperation {
    /// Schema being joined in.
    pub target_schema: SchemaRef,
    /// Join policy.
    pub join_type: JoinType,
    /// Filters scoped to the target schema.
    pub filters: Vec<QueryFilter>,
}

impl JoinOperation {
    /// Creates a join with the given policy and no filters.
    pub fn new(target_schema: impl Into<SchemaRef>, join_type: JoinType) -> Self {
        Self {
            target_schema: target_schema.into(),
            join_type,
            filters: Vec::new(),
        }
    }

    /// Creates an inner join.
    pub fn inner(target_schema: impl Into<SchemaRef>) -> Self {
        Self::new(target_schema, JoinType::Inner)
    }

    /// Creates a left join.
    pub fn left(target_schema: impl Into<SchemaRef>) -> Self {
        Self::new(target_schema, JoinType::Left)
    }

    /// Creates a right join.
    pub fn right(target_schema: impl Into<SchemaRef>) -> Self {
        Self::new(target_schema, JoinType::Right)
    }

    /// Creates a full join.
    pub fn full(target_schema: impl Into<SchemaRef>) -> Self {
        Self::new(target_schema, JoinType::Full)
    }

    /// Adds a filter scoped to the join's target schema.
    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Placement of records missing the sort field (or holding null).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullHandling {
    NullsFirst,
    NullsLast,
}

impl NullHandling {
    pub fn as_str(&self) -> &'static str {
        match self {
            NullHandling::NullsFirst => "NULLS FIRST",
            NullHandling::NullsLast => "NULLS LAST",
        }
    }
}

/// One key of the chained sort comparator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortOrder {
    /// Schema the sort field lives in.
    pub schema: SchemaRef,
    /// Field to sort by.
    pub field_name: String,
    /// Direction.
    pub direction: SortDirection,
    /// Null placement.
    pub null_handling: NullHandling,
}

impl SortOrder {
    /// Creates an ascending sort with nulls last.
    pub fn asc(schema: impl Into<SchemaRef>, field_name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            field_name: field_name.into(),
            direction: SortDirection::Asc,
            null_handling: NullHandling::NullsLast,
        }
    }

    /// Creates a descending sort with nulls last.
    pub fn desc(schema: impl Into<SchemaRef>, field_name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            field_name: field_name.into(),
            direction: SortDirection::Desc,
            null_handling: NullHandling::NullsLast,
        }
    }

    /// Places nulls before non-null values.
    pub fn nulls_first(mut self) -> Self {
        self.null_handling = NullHandling::NullsFirst;
        self
    }

    /// Places nulls after non-null values.
    pub fn nulls_last(mut self) -> Self {
        self.null_handling = NullHandling::NullsLast;
        self
    }
}

/// The full cross-schema query description.
///
/// Built once by the caller, then handed by shared reference to a generator
/// or executor; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct QuerySpecification {
    /// Schema the query starts from.
    pub root_schema: SchemaRef,
    /// Filters scoped to the root schema.
    pub filters: Vec<QueryFilter>,
    /// Join operations, applied in declared order.
    pub joins: Vec<JoinOperation>,
    /// Sort keys, applied in declared order.
    pub sort_orders: Vec<SortOrder>,
    /// Maximum number of results.
    pub limit: Option<u64>,
    /// Number of results to skip.
    pub offset: u64,
}

impl QuerySpecification {
    /// Creates a specification rooted at the given schema.
    pub fn new(root_schema: impl Into<SchemaRef>) -> Self {
        Self {
            root_schema: root_schema.into(),
            filters: Vec::new(),
            joins: Vec::new(),
            sort_orders: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Adds a root-scoped filter.
    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a join operation.
    pub fn with_join(mut self, join: JoinOperation) -> Self {
        self.joins.push(join);
        self
    }

    /// Adds a sort key.
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort_orders.push(sort);
        self
    }

    /// Sets the result limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the result offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Returns root + join target schemas in declaration order.
    pub fn referenced_schemas(&self) -> Vec<&SchemaRef> {
        let mut schemas = Vec::with_capacity(1 + self.joins.len());
        schemas.push(&self.root_schema);
        for join in &self.joins {
            schemas.push(&join.target_schema);
        }
        schemas
    }

    /// Returns the filters scoped to the given schema.
    ///
    /// The root schema owns the top-level filters; each join target owns the
    /// filters declared on its join operation.
    pub fn filters_for(&self, schema: &SchemaRef) -> &[QueryFilter] {
        if *schema == self.root_schema {
            return &self.filters;
        }
        self.joins
            .iter()
            .find(|j| j.target_schema == *schema)
            .map(|j| j.filters.as_slice())
            .unwrap_or(&[])
    }
}
