//! Aggregation pipeline generation
//!
//! Builds the ordered stage list a document store executes server-side:
//! root `$match`, one `$lookup` per join (let-bound identifier equality plus
//! the join's own filters, with an extra non-empty guard for INNER joins),
//! `$sort`, `$skip`/`$limit`, and a final `$project` retaining the
//! identifier, the embedded root document, and each joined array.
//!
//! Lookups yield arrays, so non-root sort fields are rewritten to the
//! array-indexed path `alias.0.field`.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::query::{
    FilterOperator, FilterPredicate, FilterValue, QueryFilter, QuerySpecification, SortDirection,
};

use super::{alias_map, assign_aliases, TranslationDiagnostic};

/// Generated aggregation pipeline.
#[derive(Debug, Clone)]
pub struct GeneratedPipeline {
    /// Ordered stage list.
    pub stages: Vec<Value>,
    /// Schema → alias assignment (aliases name the lookup arrays).
    pub aliases: std::collections::HashMap<crate::query::SchemaRef, String>,
    /// Predicates that could not be pushed down.
    pub diagnostics: Vec<TranslationDiagnostic>,
}

/// Stateless pipeline translator. Performs no I/O.
#[derive(Debug, Clone)]
pub struct PipelineGenerator {
    id_field: String,
}

impl Default for PipelineGenerator {
    fn default() -> Self {
        Self {
            id_field: "uuid".to_string(),
        }
    }
}

impl PipelineGenerator {
    /// Creates a generator matching on the given shared identifier field.
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
        }
    }

    /// The shared identifier field the pipeline matches and projects.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Translates a specification into an aggregation stage list.
    pub fn generate(&self, spec: &QuerySpecification) -> GeneratedPipeline {
        let aliases = assign_aliases(spec);
        let mut stages = Vec::new();
        let mut diagnostics = Vec::new();

        // Root-scoped filters.
        if let Some(match_doc) = self.match_document(&spec.filters, &mut diagnostics) {
            stages.push(json!({ "$match": match_doc }));
        }

        // One $lookup per join, matching the foreign identifier against the
        // let-bound local identifier.
        for (i, join) in spec.joins.iter().enumerate() {
            let alias = &aliases[i + 1].1;
            let mut lookup_pipeline = vec![json!({
                "$match": {
                    "$expr": { "$eq": [format!("${}", self.id_field), "$$sid"] }
                }
            })];
            if let Some(match_doc) = self.match_document(&join.filters, &mut diagnostics) {
                lookup_pipeline.push(json!({ "$match": match_doc }));
            }
            stages.push(json!({
                "$lookup": {
                    "from": join.target_schema.key(),
                    "let": { "sid": format!("${}", self.id_field) },
                    "pipeline": lookup_pipeline,
                    "as": alias,
                }
            }));
            if join.join_type == crate::query::JoinType::Inner {
                stages.push(json!({
                    "$match": { (format!("{alias}.0")): { "$exists": true } }
                }));
            }
        }

        // $sort runs before $project, so root fields are still top-level;
        // joined fields sit inside the lookup arrays.
        if !spec.sort_orders.is_empty() {
            let mut sort_doc = Map::new();
            for sort in &spec.sort_orders {
                let path = if sort.schema == spec.root_schema {
                    sort.field_name.clone()
                } else {
                    match aliases.iter().find(|(s, _)| *s == sort.schema) {
                        Some((_, alias)) => format!("{alias}.0.{}", sort.field_name),
                        None => {
                            diagnostics.push(TranslationDiagnostic::new(
                                &sort.schema,
                                &sort.field_name,
                                "sort references a schema not participating in the query",
                            ));
                            continue;
                        }
                    }
                };
                let direction = match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                };
                sort_doc.insert(path, json!(direction));
            }
            if !sort_doc.is_empty() {
                stages.push(json!({ "$sort": sort_doc }));
            }
        }

        if spec.offset > 0 {
            stages.push(json!({ "$skip": spec.offset }));
        }
        if let Some(limit) = spec.limit {
            stages.push(json!({ "$limit": limit }));
        }

        // Always retain the identifier, the full root document, and each
        // joined array under its alias.
        let mut projection = Map::new();
        projection.insert(self.id_field.clone(), json!(1));
        projection.insert("root".to_string(), json!("$$ROOT"));
        for (_, alias) in aliases.iter().skip(1) {
            projection.insert(alias.clone(), json!(1));
        }
        stages.push(json!({ "$project": projection }));

        GeneratedPipeline {
            stages,
            aliases: alias_map(&aliases),
            diagnostics,
        }
    }

    /// Builds one $match document from a filter list, AND semantics.
    ///
    /// Returns `None` when no filter translated.
    fn match_document(
        &self,
        filters: &[QueryFilter],
        diagnostics: &mut Vec<TranslationDiagnostic>,
    ) -> Option<Value> {
        let mut conditions = Vec::new();
        for filter in filters {
            match self.condition(filter) {
                Ok(condition) => conditions.push(condition),
                Err(diagnostic) => {
                    warn!(
                        schema = %diagnostic.schema,
                        field = %diagnostic.field_name,
                        reason = %diagnostic.reason,
                        "filter dropped from generated pipeline"
                    );
                    diagnostics.push(diagnostic);
                }
            }
        }
        match conditions.len() {
            0 => None,
            1 => Some(conditions.pop().unwrap()),
            _ => Some(json!({ "$and": conditions })),
        }
    }

    /// Translates one filter into a match condition.
    fn condition(&self, filter: &QueryFilter) -> Result<Value, TranslationDiagnostic> {
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

        let field = filter.field_name.as_str();
        let condition = match operator {
            FilterOperator::Equals => json!({ field: { "$eq": value.to_json() } }),
            FilterOperator::NotEquals => json!({ field: { "$ne": value.to_json() } }),
            FilterOperator::GreaterThan => json!({ field: { "$gt": value.to_json() } }),
            FilterOperator::GreaterThanOrEqual => json!({ field: { "$gte": value.to_json() } }),
            FilterOperator::LessThan => json!({ field: { "$lt": value.to_json() } }),
            FilterOperator::LessThanOrEqual => json!({ field: { "$lte": value.to_json() } }),
            FilterOperator::Like | FilterOperator::NotLike => {
                let Some(pattern) = value.as_text() else {
                    return Err(TranslationDiagnostic::new(
                        &filter.schema,
                        &filter.field_name,
                        format!("{} requires a text value", operator.name()),
                    ));
                };
                let regex = sql_pattern_to_regex(pattern);
                if operator == FilterOperator::Like {
                    json!({ field: { "$regex": regex } })
                } else {
                    json!({ field: { "$not": { "$regex": regex } } })
                }
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
                    // Constant predicate mirroring the SQL 1=0 / 1=1
                    // short-circuit.
                    let matches_everything = operator == FilterOperator::NotIn;
                    json!({ "$expr": matches_everything })
                } else {
                    let values: Vec<Value> = elements.iter().map(|v| v.to_json()).collect();
                    let keyword = if operator == FilterOperator::In {
                        "$in"
                    } else {
                        "$nin"
                    };
                    json!({ field: { keyword: values } })
                }
            }
            FilterOperator::IsNull => json!({ field: Value::Null }),
            FilterOperator::IsNotNull => json!({ field: { "$ne": Value::Null } }),
            FilterOperator::Between => {
                let FilterValue::Range(low, high) = value else {
                    return Err(TranslationDiagnostic::new(
                        &filter.schema,
                        &filter.field_name,
                        "BETWEEN requires a two-ended range value",
                    ));
                };
                json!({ field: { "$gte": low.to_json(), "$lte": high.to_json() } })
            }
            FilterOperator::StartsWith | FilterOperator::EndsWith | FilterOperator::Contains => {
                let Some(text) = value.as_text() else {
                    return Err(TranslationDiagnostic::new(
                        &filter.schema,
                        &filter.field_name,
                        format!("{} requires a text value", operator.name()),
                    ));
                };
                let escaped = regex::escape(text);
                let regex = match operator {
                    FilterOperator::StartsWith => format!("^{escaped}"),
                    FilterOperator::EndsWith => format!("{escaped}$"),
                    _ => escaped,
                };
                json!({ field: { "$regex": regex } })
            }
        };
        Ok(condition)
    }
}

/// Converts a SQL LIKE pattern into an anchored regex.
///
/// `%` matches any run of characters, `_` matches one; everything else is
/// escaped literally.
pub(crate) fn sql_pattern_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    regex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CustomPredicate, JoinOperation, QuerySpecification, SortOrder};

    #[test]
    fn test_stage_order_for_full_specification() {
        let spec = QuerySpecification::new("accounts")
            .with_filter(QueryFilter::compare(
                "accounts",
                "age",
                FilterOperator::GreaterThanOrEqual,
                18i64,
            ))
            .with_join(JoinOperation::inner("inventory"))
            .with_sort(SortOrder::asc("accounts", "name"))
            .with_limit(10)
            .with_offset(5);

        let generated = PipelineGenerator::default().generate(&spec);
        let keys: Vec<&str> = generated
            .stages
            .iter()
            .map(|s| s.as_object().unwrap().keys().next().unwrap().as_str())
            .collect();
        assert_eq!(
            keys,
            vec!["$match", "$lookup", "$match", "$sort", "$skip", "$limit", "$project"]
        );
    }

    #[test]
    fn test_lookup_binds_local_identifier() {
        let spec = QuerySpecification::new("a").with_join(JoinOperation::left("b"));
        let generated = PipelineGenerator::default().generate(&spec);

        let lookup = &generated.stages[0]["$lookup"];
        assert_eq!(lookup["from"], "b");
        assert_eq!(lookup["as"], "t1");
        assert_eq!(lookup["let"]["sid"], "$uuid");
        assert_eq!(
            lookup["pipeline"][0]["$match"]["$expr"]["$eq"],
            json!(["$uuid", "$$sid"])
        );
    }

    #[test]
    fn test_inner_join_requires_non_empty_lookup() {
        let spec = QuerySpecification::new("a").with_join(JoinOperation::inner("b"));
        let generated = PipelineGenerator::default().generate(&spec);
        assert_eq!(
            generated.stages[1],
            json!({ "$match": { "t1.0": { "$exists": true } } })
        );
    }

    #[test]
    fn test_left_join_has_no_guard() {
        let spec = QuerySpecification::new("a").with_join(JoinOperation::left("b"));
        let generated = PipelineGenerator::default().generate(&spec);
        // Lookup then project only.
        assert_eq!(generated.stages.len(), 2);
    }

    #[test]
    fn test_join_filters_nest_inside_lookup() {
        let spec = QuerySpecification::new("a").with_join(
            JoinOperation::left("b").with_filter(QueryFilter::compare(
                "b",
                "qty",
                FilterOperator::GreaterThan,
                0i64,
            )),
        );
        let generated = PipelineGenerator::default().generate(&spec);
        let inner = &generated.stages[0]["$lookup"]["pipeline"];
        assert_eq!(inner[1]["$match"], json!({ "qty": { "$gt": 0 } }));
    }

    #[test]
    fn test_non_root_sort_uses_array_indexed_path() {
        let spec = QuerySpecification::new("a")
            .with_join(JoinOperation::left("b"))
            .with_sort(SortOrder::desc("b", "price"));

        let generated = PipelineGenerator::default().generate(&spec);
        let sort = generated
            .stages
            .iter()
            .find(|s| s.get("$sort").is_some())
            .unwrap();
        assert_eq!(sort["$sort"]["t1.0.price"], json!(-1));
    }

    #[test]
    fn test_projection_retains_id_root_and_aliases() {
        let spec = QuerySpecification::new("a")
            .with_join(JoinOperation::left("b"))
            .with_join(JoinOperation::full("c"));

        let generated = PipelineGenerator::default().generate(&spec);
        let project = &generated.stages.last().unwrap()["$project"];
        assert_eq!(project["uuid"], json!(1));
        assert_eq!(project["root"], json!("$$ROOT"));
        assert_eq!(project["t1"], json!(1));
        assert_eq!(project["t2"], json!(1));
    }

    #[test]
    fn test_empty_in_never_matches() {
        let spec = QuerySpecification::new("a").with_filter(QueryFilter::compare(
            "a",
            "status",
            FilterOperator::In,
            FilterValue::list(vec![]),
        ));
        let generated = PipelineGenerator::default().generate(&spec);
        assert_eq!(generated.stages[0]["$match"], json!({ "$expr": false }));
    }

    #[test]
    fn test_empty_not_in_always_matches() {
        let spec = QuerySpecification::new("a").with_filter(QueryFilter::compare(
            "a",
            "status",
            FilterOperator::NotIn,
            FilterValue::list(vec![]),
        ));
        let generated = PipelineGenerator::default().generate(&spec);
        assert_eq!(generated.stages[0]["$match"], json!({ "$expr": true }));
    }

    #[test]
    fn test_like_translates_to_anchored_regex() {
        let spec = QuerySpecification::new("a").with_filter(QueryFilter::compare(
            "a",
            "name",
            FilterOperator::Like,
            "al%e_",
        ));
        let generated = PipelineGenerator::default().generate(&spec);
        assert_eq!(
            generated.stages[0]["$match"]["name"]["$regex"],
            json!("^al.*e.$")
        );
    }

    #[test]
    fn test_custom_predicate_dropped_with_diagnostic() {
        let spec = QuerySpecification::new("a").with_filter(QueryFilter::custom(
            "a",
            "score",
            CustomPredicate::new("score_check", |_| true),
        ));
        let generated = PipelineGenerator::default().generate(&spec);
        // No $match stage, only the projection.
        assert_eq!(generated.stages.len(), 1);
        assert_eq!(generated.diagnostics.len(), 1);
    }

    #[test]
    fn test_sql_pattern_to_regex_escapes_literals() {
        assert_eq!(sql_pattern_to_regex("a.b%"), "^a\\.b.*$");
        assert_eq!(sql_pattern_to_regex("_x_"), "^.x.$");
    }
}
