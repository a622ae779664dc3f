//! Query DSL clause constructors.
//!
//! Every function returns a self-contained clause object ready to be placed
//! in a bool bucket.

use serde_json::{Map, Value, json};

use crate::error::QueryError;

use super::operator::Operator;

/// `{"term": {field: value}}`
pub fn term(field: &str, value: Value) -> Value {
    json!({ "term": { field: value } })
}

/// `{"terms": {field: [values]}}`
pub fn terms(field: &str, values: Vec<Value>) -> Value {
    json!({ "terms": { field: values } })
}

/// `{"range": {field: {bound: value}}}` for a single bound.
pub fn range(field: &str, bound: &str, value: Value) -> Value {
    json!({ "range": { field: { bound: value } } })
}

/// `{"range": {field: {"gte": low, "lte": high}}}`
pub fn range_between(field: &str, low: Value, high: Value) -> Value {
    json!({ "range": { field: { "gte": low, "lte": high } } })
}

/// `{"wildcard": {field: pattern}}`
pub fn wildcard(field: &str, pattern: String) -> Value {
    json!({ "wildcard": { field: pattern } })
}

/// `{"exists": {"field": field}}`
pub fn exists(field: &str) -> Value {
    json!({ "exists": { "field": field } })
}

/// Wraps a clause so it matches documents the clause does not match.
pub fn negate(clause: Value) -> Value {
    json!({ "bool": { "must_not": [clause] } })
}

/// Multi-field full-text match. An empty field list targets all fields.
pub fn multi_match(query: &str, fields: &[String], fuzziness: Option<&str>) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), json!(query));
    if !fields.is_empty() {
        body.insert("fields".to_string(), json!(fields));
    }
    if let Some(fuzziness) = fuzziness {
        body.insert("fuzziness".to_string(), json!(fuzziness));
    }
    json!({ "multi_match": body })
}

/// Builds the positive clause for `field <op> value`.
///
/// Negation is the caller's business: the clause for `!=` is the same term
/// clause as for `=`, placed in a negated bucket.
pub fn for_operator(field: &str, op: Operator, value: Value) -> Result<Value, QueryError> {
    let clause = match op {
        Operator::Eq | Operator::NotEq => term(field, value),
        Operator::Gt => range(field, "gt", value),
        Operator::Gte => range(field, "gte", value),
        Operator::Lt => range(field, "lt", value),
        Operator::Lte => range(field, "lte", value),
        Operator::Like | Operator::Contains => {
            wildcard(field, format!("*{}*", wildcard_text(&value)))
        }
        Operator::StartsWith => wildcard(field, format!("{}*", wildcard_text(&value))),
        Operator::EndsWith => wildcard(field, format!("*{}", wildcard_text(&value))),
        Operator::In | Operator::NotIn => terms(field, into_list(value)),
        Operator::Between | Operator::NotBetween => {
            let (low, high) = bounds(op, value)?;
            range_between(field, low, high)
        }
    };
    Ok(clause)
}

/// Coerces a value into a list: arrays pass through, scalars become one element.
pub(crate) fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn wildcard_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bounds(op: Operator, value: Value) -> Result<(Value, Value), QueryError> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            let mut items = items.into_iter();
            match (items.next(), items.next()) {
                (Some(low), Some(high)) => Ok((low, high)),
                _ => Err(invalid_bounds(op)),
            }
        }
        _ => Err(invalid_bounds(op)),
    }
}

/// Copies the entries of an options object into `body`.
///
/// Anything other than an object (typically `Value::Null`) adds nothing.
pub(crate) fn merge_options(body: &mut Map<String, Value>, options: Value) {
    if let Value::Object(options) = options {
        for (key, value) in options {
            body.insert(key, value);
        }
    }
}

/// `{kind: {field: value, ...options}}`, the shape shared by the
/// single-field text queries (`match_phrase`, `fuzzy`, `regexp`, `prefix`).
pub(crate) fn field_query(kind: &str, field: &str, value: Value, options: Value) -> Value {
    let mut body = Map::new();
    body.insert(field.to_string(), value);
    merge_options(&mut body, options);
    json!({ kind: body })
}

fn invalid_bounds(op: Operator) -> QueryError {
    QueryError::InvalidValue {
        operator: op.to_string(),
        message: "expected an array of exactly two bounds".to_string(),
    }
}
