use crate::common::{get_path, DOC_ID};
use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use crate::id::Id;
use crate::mapper::Document;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;

/// A compiled query filter.
///
/// Filters are written as JSON documents in the usual document-database shape
/// (`{"age": {"$gte": 18}, "$or": [...]}`) and compiled once per operation so
/// malformed operators and regex patterns fail before any document is read.
#[derive(Debug, Clone)]
pub(crate) enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Field { path: String, condition: Condition },
}

#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
    Size(usize),
}

impl Filter {
    /// Compiles an optional filter; `None` and `{}` match every document.
    pub(crate) fn compile(filter: Option<&Value>) -> DocbindResult<Filter> {
        match filter {
            None | Some(Value::Null) => Ok(Filter::And(Vec::new())),
            Some(Value::Object(map)) => Self::from_document(map),
            Some(other) => Err(filter_error(&format!("filter must be an object, got {}", other))),
        }
    }

    fn from_document(document: &Document) -> DocbindResult<Filter> {
        let mut clauses = Vec::with_capacity(document.len());
        for (key, value) in document {
            match key.as_str() {
                "$and" => clauses.push(Filter::And(Self::compile_list(key, value)?)),
                "$or" => clauses.push(Filter::Or(Self::compile_list(key, value)?)),
                "$nor" => clauses.push(Filter::Nor(Self::compile_list(key, value)?)),
                op if op.starts_with('$') => {
                    return Err(filter_error(&format!("unknown top level operator {}", op)));
                }
                path => {
                    for condition in compile_conditions(path, value)? {
                        clauses.push(Filter::Field {
                            path: path.to_string(),
                            condition,
                        });
                    }
                }
            }
        }
        Ok(Filter::And(clauses))
    }

    fn compile_list(operator: &str, value: &Value) -> DocbindResult<Vec<Filter>> {
        match value {
            Value::Array(items) if !items.is_empty() => items.iter().map(|item| Self::compile(Some(item))).collect(),
            _ => Err(filter_error(&format!("{} expects a non-empty array of filters", operator))),
        }
    }

    pub(crate) fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(document)),
            Filter::Nor(filters) => !filters.iter().any(|f| f.matches(document)),
            Filter::Field { path, condition } => condition.matches(get_path(document, path)),
        }
    }

    /// Equality conditions that seed the document inserted by an upsert.
    pub(crate) fn equality_seed(&self) -> Vec<(String, Value)> {
        let mut seed = Vec::new();
        self.collect_equalities(&mut seed);
        seed
    }

    fn collect_equalities(&self, seed: &mut Vec<(String, Value)>) {
        match self {
            Filter::And(filters) => filters.iter().for_each(|f| f.collect_equalities(seed)),
            Filter::Field {
                path,
                condition: Condition::Eq(value),
            } => seed.push((path.clone(), value.clone())),
            _ => {}
        }
    }
}

impl Condition {
    fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => equals_or_contains(actual, expected),
            Condition::Ne(expected) => !equals_or_contains(actual, expected),
            Condition::Gt(expected) => any_compares(actual, expected, |o| o == Ordering::Greater),
            Condition::Gte(expected) => any_compares(actual, expected, |o| o != Ordering::Less),
            Condition::Lt(expected) => any_compares(actual, expected, |o| o == Ordering::Less),
            Condition::Lte(expected) => any_compares(actual, expected, |o| o != Ordering::Greater),
            Condition::In(candidates) => candidates.iter().any(|c| equals_or_contains(actual, c)),
            Condition::Nin(candidates) => !candidates.iter().any(|c| equals_or_contains(actual, c)),
            Condition::Exists(should_exist) => actual.is_some() == *should_exist,
            Condition::Regex(regex) => match actual {
                Some(Value::String(s)) => regex.is_match(s),
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| matches!(item, Value::String(s) if regex.is_match(s))),
                _ => false,
            },
            Condition::Size(size) => matches!(actual, Some(Value::Array(items)) if items.len() == *size),
        }
    }
}

fn compile_conditions(path: &str, value: &Value) -> DocbindResult<Vec<Condition>> {
    let operators = match value {
        Value::Object(map) if !map.is_empty() && map.keys().any(|k| k.starts_with('$')) => map,
        _ => return Ok(vec![Condition::Eq(normalize(path, value)?)]),
    };

    if operators.keys().any(|k| !k.starts_with('$')) {
        return Err(filter_error(&format!(
            "cannot mix operators and fields in the condition for '{}'",
            path
        )));
    }

    let mut conditions = Vec::with_capacity(operators.len());
    for (operator, operand) in operators {
        let condition = match operator.as_str() {
            "$eq" => Condition::Eq(normalize(path, operand)?),
            "$ne" => Condition::Ne(normalize(path, operand)?),
            "$gt" => Condition::Gt(operand.clone()),
            "$gte" => Condition::Gte(operand.clone()),
            "$lt" => Condition::Lt(operand.clone()),
            "$lte" => Condition::Lte(operand.clone()),
            "$in" => Condition::In(normalize_list(path, operator, operand)?),
            "$nin" => Condition::Nin(normalize_list(path, operator, operand)?),
            "$exists" => match operand {
                Value::Bool(b) => Condition::Exists(*b),
                Value::Number(n) => Condition::Exists(n.as_f64() != Some(0.0)),
                _ => return Err(filter_error("$exists expects a boolean")),
            },
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| filter_error("$regex expects a string pattern"))?;
                let case_insensitive = operators
                    .get("$options")
                    .and_then(Value::as_str)
                    .is_some_and(|o| o.contains('i'));
                Condition::Regex(RegexBuilder::new(pattern).case_insensitive(case_insensitive).build()?)
            }
            "$options" if operators.contains_key("$regex") => continue,
            "$size" => match operand.as_u64() {
                Some(size) => Condition::Size(size as usize),
                None => return Err(filter_error("$size expects a non-negative integer")),
            },
            other => return Err(filter_error(&format!("unknown operator {} for '{}'", other, path))),
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn normalize_list(path: &str, operator: &str, operand: &Value) -> DocbindResult<Vec<Value>> {
    match operand {
        Value::Array(items) => items.iter().map(|item| normalize(path, item)).collect(),
        _ => Err(filter_error(&format!("{} expects an array", operator))),
    }
}

// `_id` is stored in canonical string form, so compare against the same form.
fn normalize(path: &str, value: &Value) -> DocbindResult<Value> {
    if path == DOC_ID && !value.is_null() && !value.is_object() {
        return Ok(Id::from_value(value)?.to_value());
    }
    Ok(value.clone())
}

fn equals_or_contains(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => items.iter().any(|item| values_equal(item, expected)),
        Some(actual) => values_equal(actual, expected),
    }
}

fn any_compares(actual: Option<&Value>, expected: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match actual {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare_values(item, expected).is_some_and(&accept)),
        Some(actual) => compare_values(actual, expected).is_some_and(accept),
        None => false,
    }
}

/// Structural equality where numbers compare by value (`1 == 1.0`).
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

/// Ordering between values of the same kind; `None` across kinds.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: missing and null first, then numbers,
/// strings, objects, arrays and booleans.
pub(crate) fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Object(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Bool(_)) => 5,
        }
    }

    match (a, b) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or_else(|| rank(a).cmp(&rank(b))),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn filter_error(message: &str) -> DocbindError {
    log::error!("Invalid filter: {}", message);
    DocbindError::new(&format!("Invalid filter: {}", message), ErrorKind::FilterError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn matches(filter: Value, document: Value) -> bool {
        Filter::compile(Some(&filter)).unwrap().matches(&doc(document))
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::compile(None).unwrap().matches(&doc(json!({"a": 1}))));
        assert!(matches(json!({}), json!({"a": 1})));
    }

    #[test]
    fn equality_on_plain_and_embedded_fields() {
        let d = json!({"name": "Ann", "address": {"city": "Oslo"}, "age": 30});
        assert!(matches(json!({"name": "Ann"}), d.clone()));
        assert!(matches(json!({"address.city": "Oslo"}), d.clone()));
        assert!(matches(json!({"age": 30.0}), d.clone()));
        assert!(!matches(json!({"name": "Bob"}), d.clone()));
        assert!(matches(json!({"missing": null}), d));
    }

    #[test]
    fn equality_against_array_matches_any_element() {
        let d = json!({"tags": ["a", "b"]});
        assert!(matches(json!({"tags": "b"}), d.clone()));
        assert!(matches(json!({"tags": ["a", "b"]}), d.clone()));
        assert!(!matches(json!({"tags": "c"}), d));
    }

    #[test]
    fn comparison_operators() {
        let d = json!({"age": 30, "name": "Ann"});
        assert!(matches(json!({"age": {"$gt": 20, "$lte": 30}}), d.clone()));
        assert!(!matches(json!({"age": {"$lt": 30}}), d.clone()));
        assert!(matches(json!({"name": {"$gte": "A"}}), d.clone()));
        // mixed types never compare
        assert!(!matches(json!({"age": {"$gt": "10"}}), d));
    }

    #[test]
    fn membership_and_existence() {
        let d = json!({"role": "admin"});
        assert!(matches(json!({"role": {"$in": ["admin", "owner"]}}), d.clone()));
        assert!(matches(json!({"role": {"$nin": ["guest"]}}), d.clone()));
        assert!(matches(json!({"role": {"$exists": true}}), d.clone()));
        assert!(matches(json!({"email": {"$exists": false}}), d.clone()));
        assert!(matches(json!({"role": {"$ne": "guest"}}), d));
    }

    #[test]
    fn regex_and_size() {
        let d = json!({"email": "Ann@Example.com", "tags": [1, 2, 3]});
        assert!(matches(json!({"email": {"$regex": "example", "$options": "i"}}), d.clone()));
        assert!(!matches(json!({"email": {"$regex": "example"}}), d.clone()));
        assert!(matches(json!({"tags": {"$size": 3}}), d));
    }

    #[test]
    fn logical_operators() {
        let d = json!({"a": 1, "b": 2});
        assert!(matches(json!({"$or": [{"a": 5}, {"b": 2}]}), d.clone()));
        assert!(matches(json!({"$and": [{"a": 1}, {"b": 2}]}), d.clone()));
        assert!(!matches(json!({"$nor": [{"a": 1}]}), d));
    }

    #[test]
    fn id_is_compared_in_canonical_form() {
        assert!(matches(json!({"_id": 42}), json!({"_id": "42"})));
        assert!(matches(json!({"_id": {"$in": [1, 42]}}), json!({"_id": "42"})));
    }

    #[test]
    fn malformed_filters_are_rejected() {
        for filter in [
            json!({"$where": "1"}),
            json!({"a": {"$bogus": 1}}),
            json!({"a": {"$in": 1}}),
            json!({"a": {"$gt": 1, "b": 2}}),
            json!({"$or": []}),
            json!({"a": {"$regex": "("}}),
            json!([1, 2]),
        ] {
            let err = Filter::compile(Some(&filter)).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::FilterError, "{}", filter);
        }
    }

    #[test]
    fn equality_seed_collects_plain_equalities() {
        let filter = Filter::compile(Some(&json!({"name": "Ann", "age": {"$gt": 3}, "$and": [{"city": "Oslo"}]}))).unwrap();
        let seed = filter.equality_seed();
        assert_eq!(seed, vec![("name".to_string(), json!("Ann")), ("city".to_string(), json!("Oslo"))]);
    }

    #[test]
    fn sort_order_ranks_types() {
        assert_eq!(compare_for_sort(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_for_sort(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_for_sort(Some(&json!("a")), Some(&json!(10))), Ordering::Greater);
    }
}
