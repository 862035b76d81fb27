//! SQL generation
//!
//! Builds SELECT / FROM / JOIN / WHERE / ORDER BY / LIMIT / OFFSET clauses
//! from a query specification. Joins chain linearly from the root: join N's
//! ON predicate always compares against the immediately preceding alias.
//!
//! The parameter list always has exactly one entry per `?` placeholder in
//! the generated text.

use tracing::warn;

use crate::query::{
    FilterOperator, FilterPredicate, FilterValue, QueryFilter, QuerySpecification,
};

use super::{alias_map, assign_aliases, TranslationDiagnostic};

/// Dialect hooks for SQL generation.
///
/// `quote` is the single pluggable identifier-quoting hook; `id_column` is
/// the shared identifier column present in every participating table.
#[derive(Debug, Clone)]
pub struct SqlDialect {
    pub id_column: String,
    pub quote: fn(&str) -> String,
}

fn double_quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

impl Default for SqlDialect {
    fn default() -> Self {
        Self {
            id_column: "uuid".to_string(),
            quote: double_quote,
        }
    }
}

/// Generated SQL with its bound parameters.
#[derive(Debug, Clone)]
pub struct GeneratedSql {
    /// The SQL text, with `?` placeholders.
    pub sql: String,
    /// Parameters, one per placeholder, in placeholder order.
    pub parameters: Vec<FilterValue>,
    /// Schema → table alias assignment.
    pub aliases: std::collections::HashMap<crate::query::SchemaRef, String>,
    /// Predicates that could not be pushed down.
    pub diagnostics: Vec<TranslationDiagnostic>,
}

/// One WHERE fragment plus its parameters.
struct SqlFragment {
    text: String,
    params: Vec<FilterValue>,
}

impl SqlFragment {
    fn constant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    fn bound(text: impl Into<String>, params: Vec<FilterValue>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }
}

/// Stateless SQL translator. Performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct SqlGenerator {
    dialect: SqlDialect,
}

impl SqlGenerator {
    /// Creates a generator with the given dialect.
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// Translates a specification into parameterized SQL.
    pub fn generate(&self, spec: &QuerySpecification) -> GeneratedSql {
        let aliases = assign_aliases(spec);
        let quote = self.dialect.quote;
        let id_col = quote(&self.dialect.id_column);
        let mut diagnostics = Vec::new();

        // SELECT: shared identifier first, then every table's columns.
        let mut select = format!(
            "SELECT {root}.{id_col} AS {id}",
            root = aliases[0].1,
            id = self.dialect.id_column
        );
        for (_, alias) in &aliases {
            select.push_str(&format!(", {alias}.*"));
        }

        let mut sql = format!(
            "{select} FROM {table} {alias}",
            table = quote(spec.root_schema.key()),
            alias = aliases[0].1
        );

        // Joins chain from the immediately preceding alias.
        for (i, join) in spec.joins.iter().enumerate() {
            let source = &aliases[i].1;
            let target = &aliases[i + 1].1;
            sql.push_str(&format!(
                " {kw} {table} {target} ON {source}.{id_col} = {target}.{id_col}",
                kw = join.join_type.sql_keyword(),
                table = quote(join.target_schema.key()),
            ));
        }

        // WHERE: root filters, then each join's filters, ANDed.
        let mut conditions: Vec<String> = Vec::new();
        let mut parameters: Vec<FilterValue> = Vec::new();
        let mut scoped: Vec<(&str, &QueryFilter)> = Vec::new();
        for filter in &spec.filters {
            scoped.push((aliases[0].1.as_str(), filter));
        }
        for (i, join) in spec.joins.iter().enumerate() {
            for filter in &join.filters {
                scoped.push((aliases[i + 1].1.as_str(), filter));
            }
        }
        for (alias, filter) in scoped {
            match self.fragment(alias, filter) {
                Ok(fragment) => {
                    conditions.push(fragment.text);
                    parameters.extend(fragment.params);
                }
                Err(diagnostic) => {
                    warn!(
                        schema = %diagnostic.schema,
                        field = %diagnostic.field_name,
                        reason = %diagnostic.reason,
                        "filter dropped from generated SQL"
                    );
                    diagnostics.push(diagnostic);
                }
            }
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        // ORDER BY with explicit null placement.
        let mut order_terms: Vec<String> = Vec::new();
        for sort in &spec.sort_orders {
            let alias = aliases.iter().find(|(s, _)| *s == sort.schema);
            match alias {
                Some((_, alias)) => order_terms.push(format!(
                    "{alias}.{field} {dir} {nulls}",
                    field = quote(&sort.field_name),
                    dir = sort.direction.as_str(),
                    nulls = sort.null_handling.as_str(),
                )),
                None => {
                    let diagnostic = TranslationDiagnostic::new(
                        &sort.schema,
                        &sort.field_name,
                        "sort references a schema not participating in the query",
                    );
                    warn!(
                        schema = %diagnostic.schema,
                        field = %diagnostic.field_name,
                        "sort order dropped from generated SQL"
                    );
                    diagnostics.push(diagnostic);
                }
            }
        }
        if !order_terms.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_terms.join(", "));
        }

        if let Some(limit) = spec.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if spec.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", spec.offset));
        }

        GeneratedSql {
            sql,
            parameters,
            aliases: alias_map(&aliases),
            diagnostics,
        }
    }

    /// Translates one filter into a WHERE fragment.
    fn fragment(
        &self,
        alias: &str,
        filter: &QueryFilter,
    ) -> Result<SqlFragment, TranslationDiagnostic> {
        let (operator, value) = match &filter.predicate {
            FilterPredicate::Compare { operator, value } => (*operator, value),
            FilterPredicate::Custom(predicate) => {
                return Err(TranslationDiagnostic::new(
                    &filter.schema,
                    &filter.field_name,
                    format!(
                        "custom predicate '{}' cannot be translated; re-apply client-side",
                        predicate.name()
                    ),
                ));
            }
        };

        let column = format!("{alias}.{}", (self.dialect.quote)(&filter.field_name));
        let fragment = match operator {
            FilterOperator::Equals => SqlFragment::bound(format!("{column} = ?"), vec![value.clone()]),
            FilterOperator::NotEquals => {
                SqlFragment::bound(format!("{column} <> ?"), vec![value.clone()])
            }
            FilterOperator::GreaterThan => {
                SqlFragment::bound(format!("{column} > ?"), vec![value.clone()])
            }
            FilterOperator::GreaterThanOrEqual => {
                SqlFragment::bound(format!("{column} >= ?"), vec![value.clone()])
            }
            FilterOperator::LessThan => {
                SqlFragment::bound(format!("{column} < ?"), vec![value.clone()])
            }
            FilterOperator::LessThanOrEqual => {
                SqlFragment::bound(format!("{column} <= ?"), vec![value.clone()])
            }
            FilterOperator::Like => {
                SqlFragment::bound(format!("{column} LIKE ?"), vec![value.clone()])
            }
            FilterOperator::NotLike => {
                SqlFragment::bound(format!("{column} NOT LIKE ?"), vec![value.clone()])
            }
            FilterOperator::In | FilterOperator::NotIn => {
                let FilterValue::List(elements) = value else {
                    return Err(TranslationDiagnostic::new(
                        &filter.schema,
                        &filter.field_name,
                        format!("{} requires a list value", operator.name()),
                    ));
                };
                if elements.is_empty() {
                    // Empty membership test short-circuits to a constant
                    // predicate with no bound parameters.
                    let text = if operator == FilterOperator::In {
                        "1=0"
                    } else {
                        "1=1"
                    };
                    SqlFragment::constant(text)
                } else {
                    let placeholders = vec!["?"; elements.len()].join(",");
                    let keyword = if operator == FilterOperator::In {
                        "IN"
                    } else {
                        "NOT IN"
                    };
                    SqlFragment::bound(
                        format!("{column} {keyword} ({placeholders})"),
                        elements.clone(),
                    )
                }
            }
            FilterOperator::IsNull => SqlFragment::constant(format!("{column} IS NULL")),
            FilterOperator::IsNotNull => SqlFragment::constant(format!("{column} IS NOT NULL")),
            FilterOperator::Between => {
                let FilterValue::Range(low, high) = value else {
                    return Err(TranslationDiagnostic::new(
                        &filter.schema,
                        &filter.field_name,
                        "BETWEEN requires a two-ended range value",
                    ));
                };
                SqlFragment::bound(
                    format!("{column} BETWEEN ? AND ?"),
                    vec![(**low).clone(), (**high).clone()],
                )
            }
            FilterOperator::StartsWith | FilterOperator::EndsWith | FilterOperator::Contains => {
                let Some(text) = value.as_text() else {
                    return Err(TranslationDiagnostic::new(
                        &filter.schema,
                        &filter.field_name,
                        format!("{} requires a text value", operator.name()),
                    ));
                };
                let pattern = match operator {
                    FilterOperator::StartsWith => format!("{text}%"),
                    FilterOperator::EndsWith => format!("%{text}"),
                    _ => format!("%{text}%"),
                };
                SqlFragment::bound(
                    format!("{column} LIKE ?"),
                    vec![FilterValue::Text(pattern)],
                )
            }
        };
        Ok(fragment)
    }
}
