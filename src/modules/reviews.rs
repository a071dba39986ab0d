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
use serde::Deserialize;
use serde_json::{json, Value};

use super::{collection, AppContext};
use crate::utils::openapi::{write_result_schemas, Operation};

pub const REVIEWS_COLLECTION: &str = "reviews";

#[derive(Debug, Default, Deserialize)]
struct ReviewQuery {
    book_id: Option<String>,
}

/// Reader reviews, loosely attached to a book through `book_id`.
pub struct ReviewsModule {
    ctx: AppContext,
}

#[async_trait]
impl Module for ReviewsModule {
    fn name(&self) -> &'static str {
        "reviews"
    }

    fn routes(&self) -> Router {
        let access = &self.ctx.access;
        Router::new()
            .route("/reviews", access.guard(Access::Public, get(list_reviews)))
            .route(
                "/review",
                access.guard(Access::Authenticated, post(create_review)),
            )
            .route(
                "/review/{id}",
                access.guard(Access::Authenticated, patch(update_review)),
            )
            .route(
                "/review/{id}",
                access.guard(Access::Authenticated, delete(delete_review)),
            )
            .with_state(self.ctx.clone())
    }

    fn openapi(&self) -> Option<Value> {
        let mut schemas = write_result_schemas();
        schemas["Review"] = json!({
            "type": "object",
            "properties": {
                "_id": { "type": "string" },
                "book_id": { "type": "string" },
                "email": { "type": "string", "format": "email" },
                "rating": { "type": "number" },
                "comment": { "type": "string" },
                "createdAt": { "type": "string", "format": "date-time" }
            }
        });

        Some(json!({
            "paths": {
                "/reviews": {
                    "get": Operation::new("Reviews", "List reviews, optionally for one book", Access::Public)
                        .query("book_id")
                        .returns_list_of("Review")
                        .into_json()
                },
                "/review": {
                    "post": Operation::new("Reviews", "Post a review", Access::Authenticated)
                        .body("Review")
                        .returns("InsertResult")
                        .into_json()
                },
                "/review/{id}": {
                    "patch": Operation::new("Reviews", "Edit a review", Access::Authenticated)
                        .path("id")
                        .body("Review")
                        .returns("UpdateResult")
                        .into_json(),
                    "delete": Operation::new("Reviews", "Delete a review", Access::Authenticated)
                        .path("id")
                        .returns("DeleteResult")
                        .into_json()
                }
            },
            "components": { "schemas": schemas }
        }))
    }
}

async fn list_reviews(
    State(ctx): State<AppContext>,
    QueryParams(query): QueryParams<ReviewQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let filter = Filter::new().eq_opt("book_id", collection::non_empty(query.book_id));
    collection::list(ctx.store.as_ref(), REVIEWS_COLLECTION, filter, None).await
}

async fn create_review(
    State(ctx): State<AppContext>,
    JsonBody(review): JsonBody<Document>,
) -> Result<Json<InsertOutcome>, AppError> {
    collection::create(ctx.store.as_ref(), REVIEWS_COLLECTION, review, true).await
}

async fn update_review(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    JsonBody(changes): JsonBody<Document>,
) -> Result<Json<UpdateOutcome>, AppError> {
    collection::update(ctx.store.as_ref(), REVIEWS_COLLECTION, &id, changes, "review").await
}

async fn delete_review(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    collection::delete(ctx.store.as_ref(), REVIEWS_COLLECTION, &id, "review").await
}

pub fn create_module(ctx: AppContext) -> Arc<dyn Module> {
    Arc::new(ReviewsModule { ctx })
}
