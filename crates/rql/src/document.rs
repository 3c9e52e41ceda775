//! Document-store query produced by the translator
//!
//! A `DocumentQuery` is the composite of a filter document plus the result
//! directives (sort, projection, paging, distinct, aggregation). It renders
//! either as its own JSON shape (serde) or as an aggregation pipeline.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// A MongoDB-style filter document
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentQuery {
    /// Filter predicate; empty matches every document
    pub filter: Document,
    /// Field → 1 (ascending) or -1 (descending), in directive order
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub sort: IndexMap<String, i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub distinct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub fields: Vec<String>,
    /// Set by `values(...)`: the caller wants bare values rather than documents
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub values_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    /// Group keys; empty aggregates the whole result
    pub group_by: Vec<String>,
    /// Output name → accumulator, in directive order
    pub accumulators: IndexMap<String, Accumulator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "field", rename_all = "lowercase")]
pub enum Accumulator {
    Sum(String),
    Mean(String),
    Max(String),
    Min(String),
    Count,
}

impl Accumulator {
    /// Output field name: `sum_price`, `mean_user_age`, `count`
    pub fn output_name(&self) -> String {
        match self {
            Accumulator::Sum(field) => format!("sum_{}", key_name(field)),
            Accumulator::Mean(field) => format!("mean_{}", key_name(field)),
            Accumulator::Max(field) => format!("max_{}", key_name(field)),
            Accumulator::Min(field) => format!("min_{}", key_name(field)),
            Accumulator::Count => "count".to_string(),
        }
    }

    /// Source field, `None` for `count`
    pub fn field(&self) -> Option<&str> {
        match self {
            Accumulator::Sum(field)
            | Accumulator::Mean(field)
            | Accumulator::Max(field)
            | Accumulator::Min(field) => Some(field),
            Accumulator::Count => None,
        }
    }

    /// `$group` accumulator expression
    pub fn to_document(&self) -> Value {
        match self {
            Accumulator::Sum(field) => json!({ "$sum": format!("${field}") }),
            Accumulator::Mean(field) => json!({ "$avg": format!("${field}") }),
            Accumulator::Max(field) => json!({ "$max": format!("${field}") }),
            Accumulator::Min(field) => json!({ "$min": format!("${field}") }),
            Accumulator::Count => json!({ "$sum": 1 }),
        }
    }
}

impl Aggregation {
    /// Body of the `$group` stage
    pub fn group_document(&self) -> Document {
        let id = if self.group_by.is_empty() {
            Value::Null
        } else {
            Value::Object(
                self.group_by
                    .iter()
                    .map(|field| (key_name(field), Value::String(format!("${field}"))))
                    .collect(),
            )
        };

        let mut group = Document::new();
        group.insert("_id".to_string(), id);
        for (name, accumulator) in &self.accumulators {
            group.insert(name.clone(), accumulator.to_document());
        }
        group
    }
}

impl DocumentQuery {
    /// True when the query neither filters nor shapes its results
    pub fn is_match_all(&self) -> bool {
        *self == DocumentQuery::default()
    }

    /// `{field: 1, ...}` projection, excluding `_id` unless it was selected
    pub fn projection_document(&self) -> Option<Document> {
        let projection = self.projection.as_ref()?;
        let mut doc: Document = projection
            .fields
            .iter()
            .map(|field| (field.clone(), json!(1)))
            .collect();
        if !projection.fields.iter().any(|field| field == "_id") {
            doc.insert("_id".to_string(), json!(0));
        }
        Some(doc)
    }

    /// Render as an aggregation pipeline
    pub fn pipeline(&self) -> Vec<Value> {
        let mut stages = Vec::new();

        if !self.filter.is_empty() {
            stages.push(json!({ "$match": self.filter }));
        }
        if let Some(aggregation) = &self.aggregation {
            stages.push(json!({ "$group": aggregation.group_document() }));
        }
        if !self.sort.is_empty() {
            let sort: Document = self
                .sort
                .iter()
                .map(|(field, order)| (field.clone(), json!(order)))
                .collect();
            stages.push(json!({ "$sort": sort }));
        }
        if let Some(skip) = self.skip {
            stages.push(json!({ "$skip": skip }));
        }
        if let Some(limit) = self.limit {
            stages.push(json!({ "$limit": limit }));
        }
        if let Some(projection) = self.projection_document() {
            stages.push(json!({ "$project": projection }));
        }
        if self.distinct {
            stages.push(json!({ "$group": { "_id": "$$ROOT" } }));
            stages.push(json!({ "$replaceRoot": { "newRoot": "$_id" } }));
        }

        stages
    }
}

/// Dotted paths are not valid output field names
pub(crate) fn key_name(field: &str) -> String {
    field.replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_everything() {
        let query = DocumentQuery::default();
        assert!(query.is_match_all());
        assert!(query.pipeline().is_empty());
        assert_eq!(serde_json::to_value(&query).unwrap(), json!({ "filter": {} }));
    }

    #[test]
    fn projection_excludes_id_unless_selected() {
        let mut query = DocumentQuery {
            projection: Some(Projection {
                fields: vec!["name".into(), "age".into()],
                values_only: false,
            }),
            ..Default::default()
        };
        assert_eq!(
            Value::Object(query.projection_document().unwrap()),
            json!({ "name": 1, "age": 1, "_id": 0 })
        );

        query.projection = Some(Projection {
            fields: vec!["_id".into()],
            values_only: true,
        });
        assert_eq!(
            Value::Object(query.projection_document().unwrap()),
            json!({ "_id": 1 })
        );
    }

    #[test]
    fn group_document() {
        let mut accumulators = IndexMap::new();
        let sum = Accumulator::Sum("pay.base".into());
        accumulators.insert(sum.output_name(), sum);
        accumulators.insert("count".into(), Accumulator::Count);
        let aggregation = Aggregation {
            group_by: vec!["dept.name".into()],
            accumulators,
        };
        assert_eq!(
            Value::Object(aggregation.group_document()),
            json!({
                "_id": { "dept_name": "$dept.name" },
                "sum_pay_base": { "$sum": "$pay.base" },
                "count": { "$sum": 1 },
            })
        );

        let ungrouped = Aggregation::default();
        assert_eq!(ungrouped.group_document()["_id"], Value::Null);
    }

    #[test]
    fn pipeline_stage_order() {
        let mut sort = IndexMap::new();
        sort.insert("b".to_string(), -1);
        sort.insert("a".to_string(), 1);
        let query = DocumentQuery {
            filter: json!({ "x": 1 }).as_object().unwrap().clone(),
            sort,
            projection: Some(Projection {
                fields: vec!["a".into()],
                values_only: false,
            }),
            limit: Some(10),
            skip: Some(20),
            distinct: true,
            aggregation: None,
        };
        let stages: Vec<String> = query
            .pipeline()
            .iter()
            .map(|stage| stage.as_object().unwrap().keys().next().unwrap().clone())
            .collect();
        assert_eq!(
            stages,
            ["$match", "$sort", "$skip", "$limit", "$project", "$group", "$replaceRoot"]
        );

        // sort keeps directive order, not key order
        let sort_stage = &query.pipeline()[1]["$sort"];
        let keys: Vec<&String> = sort_stage.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn accumulator_serialization() {
        assert_eq!(
            serde_json::to_value(Accumulator::Mean("age".into())).unwrap(),
            json!({ "op": "mean", "field": "age" })
        );
        assert_eq!(
            serde_json::to_value(Accumulator::Count).unwrap(),
            json!({ "op": "count" })
        );
    }
}
