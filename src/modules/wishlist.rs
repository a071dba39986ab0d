use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use bookcourier_db::{DeleteOutcome, Document, Filter, InsertOutcome, UpdateOutcome};
use bookcourier_http::{Access, AppError, JsonBody, QueryParams};
use bookcourier_kernel::Module;
use serde::Serialize;
use serde_json::{json, Value};

use super::collection::{self, EmailQuery};
use super::AppContext;
use crate::utils::openapi::{write_result_schemas, Operation};

pub const WISHLIST_COLLECTION: &str = "wishlist";

/// Message returned instead of inserting a second copy of a wishlist entry.
pub const ALREADY_IN_WISHLIST: &str = "book already in wishlist";

/// Outcome of adding to a wishlist.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WishlistAdd {
    Inserted(InsertOutcome),
    AlreadyPresent { message: &'static str },
}

/// Per-user wishlists of books.
pub struct WishlistModule {
    ctx: AppContext,
}

#[async_trait]
impl Module for WishlistModule {
    fn name(&self) -> &'static str {
        "wishlist"
    }

    fn routes(&self) -> Router {
        let access = &self.ctx.access;
        Router::new()
            .route(
                "/wishlist",
                access.guard(Access::Authenticated, get(list_wishlist)),
            )
            .route(
                "/wishlist",
                access.guard(Access::Authenticated, post(add_to_wishlist)),
            )
            .route(
                "/wishlist/{id}",
                access.guard(Access::Authenticated, patch(update_wishlist)),
            )
            .route(
                "/wishlist/{id}",
                access.guard(Access::Authenticated, delete(remove_from_wishlist)),
            )
            .with_state(self.ctx.clone())
    }

    fn openapi(&self) -> Option<Value> {
        let mut schemas = write_result_schemas();
        schemas["WishlistItem"] = json!({
            "type": "object",
            "properties": {
                "_id": { "type": "string" },
                "email": { "type": "string", "format": "email" },
                "book_id": { "type": "string" }
            },
            "required": ["email", "book_id"]
        });
        schemas["WishlistAdd"] = json!({
            "oneOf": [
                { "$ref": "#/components/schemas/InsertResult" },
                {
                    "type": "object",
                    "properties": { "message": { "type": "string" } }
                }
            ]
        });

        Some(json!({
            "paths": {
                "/wishlist": {
                    "get": Operation::new("Wishlist", "List wishlist entries, optionally by owner email", Access::Authenticated)
                        .query("email")
                        .returns_list_of("WishlistItem")
                        .into_json(),
                    "post": Operation::new("Wishlist", "Add a book to a wishlist unless already present", Access::Authenticated)
                        .body("WishlistItem")
                        .validated()
                        .returns("WishlistAdd")
                        .into_json()
                },
                "/wishlist/{id}": {
                    "patch": Operation::new("Wishlist", "Update a wishlist entry", Access::Authenticated)
                        .path("id")
                        .body("WishlistItem")
                        .returns("UpdateResult")
                        .into_json(),
                    "delete": Operation::new("Wishlist", "Remove a wishlist entry", Access::Authenticated)
                        .path("id")
                        .returns("DeleteResult")
                        .into_json()
                }
            },
            "components": { "schemas": schemas }
        }))
    }
}

async fn list_wishlist(
    State(ctx): State<AppContext>,
    QueryParams(query): QueryParams<EmailQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let filter = Filter::new().eq_opt("email", collection::non_empty(query.email));
    collection::list(ctx.store.as_ref(), WISHLIST_COLLECTION, filter, None).await
}

/// Check-then-insert on (email, book_id). Concurrent adds can still race.
async fn add_to_wishlist(
    State(ctx): State<AppContext>,
    JsonBody(item): JsonBody<Document>,
) -> Result<Json<WishlistAdd>, AppError> {
    let key = Filter::new()
        .eq("email", key_value(&item, "email")?)
        .eq("book_id", key_value(&item, "book_id")?);

    if ctx.store.find_one(WISHLIST_COLLECTION, &key).await?.is_some() {
        tracing::debug!("wishlist entry already present");
        return Ok(Json(WishlistAdd::AlreadyPresent {
            message: ALREADY_IN_WISHLIST,
        }));
    }

    let Json(outcome) =
        collection::create(ctx.store.as_ref(), WISHLIST_COLLECTION, item, false).await?;
    Ok(Json(WishlistAdd::Inserted(outcome)))
}

/// A duplicate-check key must be a scalar so every backend compares it literally.
fn key_value(item: &Document, field: &'static str) -> Result<Value, AppError> {
    match item.get(field) {
        None => Ok(Value::Null),
        Some(Value::Object(_)) | Some(Value::Array(_)) => Err(AppError::validation(
            vec![json!({"field": field, "error": "must be a string, number or boolean"})],
            format!("{} must be a scalar value", field),
        )),
        Some(value) => Ok(value.clone()),
    }
}

async fn update_wishlist(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    JsonBody(changes): JsonBody<Document>,
) -> Result<Json<UpdateOutcome>, AppError> {
    collection::update(
        ctx.store.as_ref(),
        WISHLIST_COLLECTION,
        &id,
        changes,
        "wishlist entry",
    )
    .await
}

async fn remove_from_wishlist(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    collection::delete(ctx.store.as_ref(), WISHLIST_COLLECTION, &id, "wishlist entry").await
}

pub fn create_module(ctx: AppContext) -> Arc<dyn Module> {
    Arc::new(WishlistModule { ctx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_values_must_be_scalars() {
        let Value::Object(item) =
            json!({"email": {"$ne": null}, "book_id": "b1", "tags": ["x"]})
        else {
            unreachable!()
        };

        assert_eq!(key_value(&item, "book_id").unwrap(), json!("b1"));
        assert_eq!(key_value(&item, "missing").unwrap(), Value::Null);
        assert!(matches!(
            key_value(&item, "email"),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            key_value(&item, "tags"),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn outcomes_serialize_without_tags() {
        let inserted = WishlistAdd::Inserted(InsertOutcome {
            acknowledged: true,
            inserted_id: "65a1f0c2e4b0a1b2c3d4e5f6".into(),
        });
        assert_eq!(
            serde_json::to_value(inserted).unwrap(),
            json!({"acknowledged": true, "insertedId": "65a1f0c2e4b0a1b2c3d4e5f6"})
        );

        let present = WishlistAdd::AlreadyPresent {
            message: ALREADY_IN_WISHLIST,
        };
        assert_eq!(
            serde_json::to_value(present).unwrap(),
            json!({"message": ALREADY_IN_WISHLIST})
        );
    }
}
