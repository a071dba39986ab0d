//! In-process document store.

use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    DbResult, DeleteOutcome, Document, DocumentStore, Filter, GroupCount, InsertOutcome, Sort,
    UpdateOutcome, ID_FIELD,
};

/// Document store kept entirely in memory.
///
/// Mirrors the MongoDB backend closely enough for tests and throwaway local
/// runs: identifiers are ObjectIds, natural order is insertion order, and
/// nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn has_id(document: &Document, id: &str) -> bool {
    document.get(ID_FIELD).and_then(Value::as_str) == Some(id)
}

fn is_object_id(id: &str) -> bool {
    ObjectId::parse_str(id).is_ok()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> DbResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let mut found: Vec<Document> = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = sort {
            found.sort_by(|a, b| sort.compare(a, b));
        }

        Ok(found)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> DbResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|documents| {
            documents
                .iter()
                .find(|document| filter.matches(document))
                .cloned()
        }))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> DbResult<Option<Document>> {
        if !is_object_id(id) {
            return Ok(None);
        }

        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|document| has_id(document, id)))
            .cloned())
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> DbResult<InsertOutcome> {
        let id = ObjectId::new().to_hex();
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document);

        Ok(InsertOutcome {
            acknowledged: true,
            inserted_id: id,
        })
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> DbResult<UpdateOutcome> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|document| has_id(document, id)));

        let Some(document) = target else {
            return Ok(UpdateOutcome {
                acknowledged: true,
                matched_count: 0,
                modified_count: 0,
            });
        };

        let mut modified = false;
        for (field, value) in changes {
            if field == ID_FIELD {
                continue;
            }
            if document.get(&field) != Some(&value) {
                document.insert(field, value);
                modified = true;
            }
        }

        Ok(UpdateOutcome {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(modified),
        })
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> DbResult<DeleteOutcome> {
        let mut collections = self.collections.write().await;
        let deleted_count = match collections.get_mut(collection) {
            Some(documents) => match documents.iter().position(|document| has_id(document, id)) {
                Some(index) => {
                    documents.remove(index);
                    1
                }
                None => 0,
            },
            None => 0,
        };

        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count,
        })
    }

    async fn estimated_count(&self, collection: &str) -> DbResult<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map_or(0, |documents| documents.len() as u64))
    }

    async fn count_by(&self, collection: &str, field: &str) -> DbResult<Vec<GroupCount>> {
        let collections = self.collections.read().await;
        let mut groups: Vec<GroupCount> = Vec::new();

        for document in collections.get(collection).into_iter().flatten() {
            let key = document.get(field).cloned().unwrap_or(Value::Null);
            match groups.iter_mut().find(|group| group.key == key) {
                Some(group) => group.count += 1,
                None => groups.push(GroupCount { key, count: 1 }),
            }
        }

        Ok(groups)
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

    #[tokio::test]
    async fn insert_assigns_object_id() {
        let store = MemoryStore::new();
        let outcome = store
            .insert_one("books", doc(json!({"_id": "client", "title": "Dune"})))
            .await
            .unwrap();

        assert!(ObjectId::parse_str(&outcome.inserted_id).is_ok());
        let stored = store
            .find_by_id("books", &outcome.inserted_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["title"], "Dune");
        assert_eq!(stored["_id"], json!(outcome.inserted_id));
    }

    #[tokio::test]
    async fn find_preserves_insertion_order() {
        let store = MemoryStore::new();
        for title in ["a", "b", "c"] {
            store
                .insert_one("books", doc(json!({"title": title})))
                .await
                .unwrap();
        }

        let found = store.find("books", &Filter::new(), None).await.unwrap();
        let titles: Vec<_> = found.iter().map(|d| d["title"].as_str().unwrap()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn malformed_id_matches_nothing() {
        let store = MemoryStore::new();
        store
            .insert_one("books", doc(json!({"title": "x"})))
            .await
            .unwrap();

        assert!(store.find_by_id("books", "not-an-id").await.unwrap().is_none());
        assert_eq!(
            store
                .delete_by_id("books", "not-an-id")
                .await
                .unwrap()
                .deleted_count,
            0
        );
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = MemoryStore::new();
        let id = store
            .insert_one("books", doc(json!({"title": "x", "price": 10})))
            .await
            .unwrap()
            .inserted_id;

        let outcome = store
            .update_by_id("books", &id, doc(json!({"price": 12, "status": "published"})))
            .await
            .unwrap();
        assert_eq!(outcome.matched_count, 1);
        assert_eq!(outcome.modified_count, 1);

        let stored = store.find_by_id("books", &id).await.unwrap().unwrap();
        assert_eq!(stored["title"], "x");
        assert_eq!(stored["price"], 12);
        assert_eq!(stored["status"], "published");
    }

    #[tokio::test]
    async fn update_with_same_values_reports_no_modification() {
        let store = MemoryStore::new();
        let id = store
            .insert_one("books", doc(json!({"title": "x"})))
            .await
            .unwrap()
            .inserted_id;

        let outcome = store
            .update_by_id("books", &id, doc(json!({"title": "x"})))
            .await
            .unwrap();
        assert_eq!(outcome.matched_count, 1);
        assert_eq!(outcome.modified_count, 0);
    }

    #[tokio::test]
    async fn delete_then_lookup_is_empty() {
        let store = MemoryStore::new();
        let id = store
            .insert_one("orders", doc(json!({"status": "pending"})))
            .await
            .unwrap()
            .inserted_id;

        assert_eq!(store.delete_by_id("orders", &id).await.unwrap().deleted_count, 1);
        assert!(store.find_by_id("orders", &id).await.unwrap().is_none());
        assert_eq!(store.estimated_count("orders").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn count_by_groups_values() {
        let store = MemoryStore::new();
        for status in [json!("pending"), json!("pending"), json!("shipped")] {
            store
                .insert_one("orders", doc(json!({"status": status})))
                .await
                .unwrap();
        }
        store
            .insert_one("orders", doc(json!({"email": "a@b.c"})))
            .await
            .unwrap();

        let mut groups = store.count_by("orders", "status").await.unwrap();
        groups.sort_by_key(|group| group.count);
        assert_eq!(
            groups,
            vec![
                GroupCount {
                    key: json!("shipped"),
                    count: 1
                },
                GroupCount {
                    key: Value::Null,
                    count: 1
                },
                GroupCount {
                    key: json!("pending"),
                    count: 2
                },
            ]
        );
    }
}
