use serde::Deserialize;
use serde_json::Value;

use bookcourier_db::Document;

/// Fields a new book must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["title", "author", "price"];

/// Fields the `search` parameter matches against.
pub const SEARCH_FIELDS: [&str; 2] = ["title", "author"];

/// Direction of the price ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSort {
    Asc,
    Desc,
}

/// Query string accepted by `GET /books`.
#[derive(Debug, Default, Deserialize)]
pub struct BookQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort: Option<PriceSort>,
}

/// Required fields that are absent, `null`, or an empty string.
pub fn missing_fields(book: &Document) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .into_iter()
        .filter(|field| match book.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.is_empty(),
            Some(_) => false,
        })
        .collect()
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
    fn complete_book_has_no_missing_fields() {
        let book = doc(json!({"title": "Dune", "author": "Herbert", "price": 0}));
        assert!(missing_fields(&book).is_empty());
    }

    #[test]
    fn null_and_empty_count_as_missing() {
        let book = doc(json!({"title": "", "author": null}));
        assert_eq!(missing_fields(&book), vec!["title", "author", "price"]);
    }

    #[test]
    fn sort_parses_lowercase_directions() {
        let query: BookQuery = serde_json::from_value(json!({"sort": "desc"})).unwrap();
        assert_eq!(query.sort, Some(PriceSort::Desc));
        assert!(serde_json::from_value::<BookQuery>(json!({"sort": "price"})).is_err());
    }
}
