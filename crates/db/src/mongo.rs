//! MongoDB backend.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson};
use mongodb::{action::Find, Client, Collection, Database};
use serde_json::Value;

use crate::{
    Clause, DbError, DbResult, DeleteOutcome, Direction, Document, DocumentStore, Filter,
    GroupCount, InsertOutcome, Sort, UpdateOutcome, ID_FIELD,
};

/// Document store backed by a MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Create a store from an existing database handle.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connect with a MongoDB connection string and select `database`.
    pub async fn connect(uri: &str, database: &str) -> DbResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self::new(client.database(database)))
    }

    fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.db.collection(name)
    }
}

/// The driver's find action for `filter`, sorted when `sort` is given.
fn find_action<'a>(
    handle: &'a Collection<bson::Document>,
    filter: &Filter,
    sort: Option<&Sort>,
) -> Find<'a, bson::Document> {
    let action = handle.find(filter_to_bson(filter));
    match sort {
        Some(sort) => action.sort(sort_to_bson(sort)),
        None => action,
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> DbResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> DbResult<Vec<Document>> {
        let handle = self.collection(collection);
        let documents: Vec<bson::Document> = find_action(&handle, filter, sort)
            .await?
            .try_collect()
            .await?;
        Ok(documents.iter().map(document_to_json).collect())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> DbResult<Option<Document>> {
        let found = self
            .collection(collection)
            .find_one(filter_to_bson(filter))
            .await?;
        Ok(found.as_ref().map(document_to_json))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> DbResult<Option<Document>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        let found = self
            .collection(collection)
            .find_one(doc! { ID_FIELD: oid })
            .await?;
        Ok(found.as_ref().map(document_to_json))
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> DbResult<InsertOutcome> {
        document.remove(ID_FIELD);
        let result = self
            .collection(collection)
            .insert_one(json_to_document(&document))
            .await?;

        let inserted_id = match result.inserted_id {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => {
                return Err(DbError::InvalidDocument(format!(
                    "unexpected inserted id {other}"
                )))
            }
        };

        Ok(InsertOutcome {
            acknowledged: true,
            inserted_id,
        })
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        mut changes: Document,
    ) -> DbResult<UpdateOutcome> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(UpdateOutcome {
                acknowledged: true,
                matched_count: 0,
                modified_count: 0,
            });
        };

        changes.remove(ID_FIELD);
        let collection = self.collection(collection);

        // MongoDB rejects an empty `$set`, so an empty patch degrades to an
        // existence check.
        if changes.is_empty() {
            let matched = collection.count_documents(doc! { ID_FIELD: oid }).await?;
            return Ok(UpdateOutcome {
                acknowledged: true,
                matched_count: matched,
                modified_count: 0,
            });
        }

        let result = collection
            .update_one(
                doc! { ID_FIELD: oid },
                doc! { "$set": json_to_document(&changes) },
            )
            .await?;

        Ok(UpdateOutcome {
            acknowledged: true,
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> DbResult<DeleteOutcome> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(DeleteOutcome {
                acknowledged: true,
                deleted_count: 0,
            });
        };

        let result = self
            .collection(collection)
            .delete_one(doc! { ID_FIELD: oid })
            .await?;

        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    async fn estimated_count(&self, collection: &str) -> DbResult<u64> {
        Ok(self
            .collection(collection)
            .estimated_document_count()
            .await?)
    }

    async fn count_by(&self, collection: &str, field: &str) -> DbResult<Vec<GroupCount>> {
        let pipeline = [doc! {
            "$group": {
                "_id": format!("${field}"),
                "count": { "$sum": 1 },
            }
        }];

        let buckets: Vec<bson::Document> = self
            .collection(collection)
            .aggregate(pipeline)
            .await?
            .try_collect()
            .await?;

        Ok(buckets
            .iter()
            .map(|bucket| GroupCount {
                key: bucket.get(ID_FIELD).map_or(Value::Null, bson_to_json),
                count: bucket
                    .get("count")
                    .map(bson_to_json)
                    .and_then(|count| count.as_u64())
                    .unwrap_or(0),
            })
            .collect())
    }
}

/// Translate a backend-neutral filter into a MongoDB query document.
pub fn filter_to_bson(filter: &Filter) -> bson::Document {
    let mut conditions: Vec<bson::Document> = filter.clauses().iter().map(clause_to_bson).collect();

    match conditions.len() {
        0 => doc! {},
        1 => conditions.remove(0),
        _ => doc! { "$and": conditions },
    }
}

fn clause_to_bson(clause: &Clause) -> bson::Document {
    match clause {
        Clause::Eq { field, value } => {
            let mut condition = bson::Document::new();
            condition.insert(field.clone(), json_to_bson(value));
            condition
        }
        Clause::ContainsAny { fields, needle } => {
            let pattern = regex::escape(needle);
            let alternatives: Vec<bson::Document> = fields
                .iter()
                .map(|field| {
                    let mut condition = bson::Document::new();
                    condition.insert(
                        field.clone(),
                        doc! { "$regex": pattern.clone(), "$options": "i" },
                    );
                    condition
                })
                .collect();
            doc! { "$or": alternatives }
        }
    }
}

fn sort_to_bson(sort: &Sort) -> bson::Document {
    let order = match sort.direction {
        Direction::Ascending => 1,
        Direction::Descending => -1,
    };
    let mut spec = bson::Document::new();
    spec.insert(sort.field.clone(), order);
    spec
}

/// Convert a JSON value into BSON.
pub fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else {
                Bson::Double(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(json_to_document(map)),
    }
}

fn json_to_document(map: &Document) -> bson::Document {
    map.iter()
        .map(|(key, value)| (key.clone(), json_to_bson(value)))
        .collect()
}

/// Convert BSON back to JSON. ObjectIds become hex strings and dates become
/// RFC 3339 strings.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Bson::String(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map_or_else(|_| Value::from(dt.timestamp_millis()), Value::String),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(document) => Value::Object(document_to_json(document)),
        other => other.clone().into_relaxed_extjson(),
    }
}

/// Convert a stored BSON document into the JSON shape handed to callers.
pub fn document_to_json(document: &bson::Document) -> Document {
    document
        .iter()
        .map(|(key, value)| (key.clone(), bson_to_json(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_is_empty_query() {
        assert_eq!(filter_to_bson(&Filter::new()), doc! {});
    }

    #[test]
    fn single_clause_is_flat() {
        let filter = Filter::new().eq("email", "reader@example.com");
        assert_eq!(filter_to_bson(&filter), doc! { "email": "reader@example.com" });
    }

    #[test]
    fn search_becomes_escaped_case_insensitive_or() {
        let filter = Filter::new()
            .eq("category", "fiction")
            .contains_any(&["title", "author"], "c++ (2nd)");

        let expected = doc! {
            "$and": [
                { "category": "fiction" },
                { "$or": [
                    { "title": { "$regex": r"c\+\+ \(2nd\)", "$options": "i" } },
                    { "author": { "$regex": r"c\+\+ \(2nd\)", "$options": "i" } },
                ] },
            ]
        };
        assert_eq!(filter_to_bson(&filter), expected);
    }

    #[test]
    fn sort_direction_maps_to_sign() {
        assert_eq!(sort_to_bson(&Sort::ascending("price")), doc! { "price": 1 });
        assert_eq!(sort_to_bson(&Sort::descending("price")), doc! { "price": -1 });
    }

    #[tokio::test]
    async fn find_action_borrows_a_bound_collection() {
        // Client construction is lazy; nothing here touches the network.
        let store = MongoStore::connect("mongodb://127.0.0.1:27017", "bookcourier")
            .await
            .unwrap();
        let handle = store.collection("books");

        let sorted = find_action(
            &handle,
            &Filter::new().eq("category", "sf"),
            Some(&Sort::descending("price")),
        );
        let unsorted = find_action(&handle, &Filter::new(), None);
        drop((sorted, unsorted));
        assert_eq!(handle.name(), "books");
    }

    #[test]
    fn json_numbers_keep_integers() {
        assert_eq!(json_to_bson(&json!(10)), Bson::Int64(10));
        assert_eq!(json_to_bson(&json!(10.5)), Bson::Double(10.5));
    }

    #[test]
    fn object_ids_surface_as_hex() {
        let oid = ObjectId::new();
        let stored = doc! { "_id": oid, "title": "Dune", "price": 9.5, "tags": ["sf"] };

        let converted = document_to_json(&stored);
        assert_eq!(
            Value::Object(converted),
            json!({"_id": oid.to_hex(), "title": "Dune", "price": 9.5, "tags": ["sf"]})
        );
    }

    #[test]
    fn nested_documents_round_trip() {
        let original = json!({"shipping": {"city": "Dhaka", "zip": 1207}, "items": [1, 2]});
        let Value::Object(map) = original.clone() else {
            unreachable!()
        };
        let back = document_to_json(&json_to_document(&map));
        assert_eq!(Value::Object(back), original);
    }
}
