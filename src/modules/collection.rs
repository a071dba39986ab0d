//! The list/get/create/update/delete pattern every resource module shares.

use axum::Json;
use bookcourier_db::{
    DeleteOutcome, Document, DocumentStore, Filter, InsertOutcome, Sort, UpdateOutcome, ID_FIELD,
};
use bookcourier_http::AppError;
use serde::Deserialize;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Server-stamped creation time.
pub const CREATED_AT: &str = "createdAt";

/// Query string of collections filtered by owner email.
#[derive(Debug, Default, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

/// Treat `?field=` the same as an absent parameter.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// Current UTC time as RFC 3339.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Remove fields clients may never write.
pub fn strip_managed(document: &mut Document) {
    document.remove(ID_FIELD);
    document.remove(CREATED_AT);
}

pub async fn list(
    store: &dyn DocumentStore,
    collection: &str,
    filter: Filter,
    sort: Option<Sort>,
) -> Result<Json<Vec<Document>>, AppError> {
    let documents = store.find(collection, &filter, sort.as_ref()).await?;
    Ok(Json(documents))
}

/// Fetch one document, or 404 naming `what`.
pub async fn get(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    what: &str,
) -> Result<Json<Document>, AppError> {
    store
        .find_by_id(collection, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("{} not found", what)))
}

/// Insert the body as a new document, stamping `createdAt` when `stamp` is set.
pub async fn create(
    store: &dyn DocumentStore,
    collection: &str,
    mut document: Document,
    stamp: bool,
) -> Result<Json<InsertOutcome>, AppError> {
    strip_managed(&mut document);
    if stamp {
        document.insert(CREATED_AT.to_string(), Value::String(now_rfc3339()));
    }

    let outcome = store.insert_one(collection, document).await?;
    tracing::debug!(collection, id = %outcome.inserted_id, "document created");
    Ok(Json(outcome))
}

/// Merge the body into the stored document, or 404 naming `what`.
pub async fn update(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    mut changes: Document,
    what: &str,
) -> Result<Json<UpdateOutcome>, AppError> {
    strip_managed(&mut changes);

    let outcome = store.update_by_id(collection, id, changes).await?;
    if outcome.matched_count == 0 {
        return Err(AppError::not_found(format!("{} not found", what)));
    }
    Ok(Json(outcome))
}

/// Remove the document, or 404 naming `what`. Nothing cascades.
pub async fn delete(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    what: &str,
) -> Result<Json<DeleteOutcome>, AppError> {
    let outcome = store.delete_by_id(collection, id).await?;
    if outcome.deleted_count == 0 {
        return Err(AppError::not_found(format!("{} not found", what)));
    }
    tracing::debug!(collection, id, "document deleted");
    Ok(Json(outcome))
}
