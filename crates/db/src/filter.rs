//! Backend-neutral query filters and sort keys.

use std::cmp::Ordering;

use serde_json::Value;

use crate::Document;

/// A single match condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Field equals value. A `null` value also matches a missing field.
    Eq { field: String, value: Value },
    /// Case-insensitive substring match on any of the fields.
    ContainsAny { fields: Vec<String>, needle: String },
}

impl Clause {
    fn matches(&self, document: &Document) -> bool {
        match self {
            Clause::Eq { field, value } => match document.get(field) {
                Some(stored) => values_equal(stored, value),
                None => value.is_null(),
            },
            Clause::ContainsAny { fields, needle } => {
                let needle = needle.to_lowercase();
                fields.iter().any(|field| {
                    document
                        .get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            }
        }
    }
}

/// Conjunction of clauses. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Same as [`Filter::eq`] when `value` is present, otherwise unchanged.
    pub fn eq_opt<V: Into<Value>>(self, field: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.eq(field, value),
            None => self,
        }
    }

    /// Require at least one of `fields` to contain `needle`, ignoring case.
    pub fn contains_any(mut self, fields: &[&str], needle: impl Into<String>) -> Self {
        self.clauses.push(Clause::ContainsAny {
            fields: fields.iter().map(|field| field.to_string()).collect(),
            needle: needle.into(),
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate the filter against a document in memory.
    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|clause| clause.matches(document))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Sort key over a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    /// Order two documents the way MongoDB orders mixed-type fields:
    /// missing/null before numbers before strings.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = compare_values(a.get(&self.field), b.get(&self.field));
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Equality with numeric widening, so `5` matches `5.0`.
fn values_equal(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => stored == wanted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&doc(json!({"a": 1}))));
        assert!(Filter::new().is_empty());
    }

    #[test]
    fn eq_requires_all_clauses() {
        let filter = Filter::new().eq("category", "fiction").eq("status", "published");
        assert!(filter.matches(&doc(json!({"category": "fiction", "status": "published"}))));
        assert!(!filter.matches(&doc(json!({"category": "fiction", "status": "draft"}))));
        assert!(!filter.matches(&doc(json!({"category": "fiction"}))));
    }

    #[test]
    fn eq_null_matches_missing_field() {
        let filter = Filter::new().eq("status", Value::Null);
        assert!(filter.matches(&doc(json!({"title": "x"}))));
        assert!(filter.matches(&doc(json!({"status": null}))));
        assert!(!filter.matches(&doc(json!({"status": "pending"}))));
    }

    #[test]
    fn eq_widens_numbers() {
        let filter = Filter::new().eq("price", json!(5.0));
        assert!(filter.matches(&doc(json!({"price": 5}))));
    }

    #[test]
    fn eq_opt_skips_absent_values() {
        let filter = Filter::new().eq_opt("email", None::<String>);
        assert!(filter.is_empty());
        let filter = Filter::new().eq_opt("email", Some("a@b.c"));
        assert_eq!(filter.clauses().len(), 1);
    }

    #[test]
    fn contains_any_is_case_insensitive_or() {
        let filter = Filter::new().contains_any(&["title", "author"], "RUST");
        assert!(filter.matches(&doc(json!({"title": "Programming Rust", "author": "Blandy"}))));
        assert!(filter.matches(&doc(json!({"title": "Ferris", "author": "rustacean"}))));
        assert!(!filter.matches(&doc(json!({"title": "Go", "author": "Pike"}))));
        assert!(!filter.matches(&doc(json!({"title": 42}))));
    }

    #[test]
    fn sort_by_price_puts_missing_first() {
        let mut docs = vec![
            doc(json!({"n": "b", "price": 20})),
            doc(json!({"n": "a"})),
            doc(json!({"n": "c", "price": 5.5})),
        ];

        let sort = Sort::ascending("price");
        docs.sort_by(|a, b| sort.compare(a, b));
        let names: Vec<_> = docs.iter().map(|d| d["n"].as_str().unwrap()).collect();
        assert_eq!(names, ["a", "c", "b"]);

        let sort = Sort::descending("price");
        docs.sort_by(|a, b| sort.compare(a, b));
        let names: Vec<_> = docs.iter().map(|d| d["n"].as_str().unwrap()).collect();
        assert_eq!(names, ["b", "c", "a"]);
    }
}
