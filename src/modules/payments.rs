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
use serde_json::{json, Value};

use super::collection::{self, EmailQuery};
use super::AppContext;
use crate::utils::openapi::{write_result_schemas, Operation};

pub const PAYMENTS_COLLECTION: &str = "payments";

/// Payment records; every route needs a verified caller.
pub struct PaymentsModule {
    ctx: AppContext,
}

#[async_trait]
impl Module for PaymentsModule {
    fn name(&self) -> &'static str {
        "payments"
    }

    fn routes(&self) -> Router {
        let access = &self.ctx.access;
        Router::new()
            .route(
                "/payments",
                access.guard(Access::Authenticated, get(list_payments)),
            )
            .route(
                "/payment",
                access.guard(Access::Authenticated, post(create_payment)),
            )
            .route(
                "/payment/{id}",
                access.guard(Access::Authenticated, patch(update_payment)),
            )
            .route(
                "/payment/{id}",
                access.guard(Access::Authenticated, delete(delete_payment)),
            )
            .with_state(self.ctx.clone())
    }

    fn openapi(&self) -> Option<Value> {
        let mut schemas = write_result_schemas();
        schemas["Payment"] = json!({
            "type": "object",
            "properties": {
                "_id": { "type": "string" },
                "email": { "type": "string", "format": "email" },
                "price": { "type": "number" },
                "createdAt": { "type": "string", "format": "date-time" }
            }
        });

        Some(json!({
            "paths": {
                "/payments": {
                    "get": Operation::new("Payments", "List payments, optionally by payer email", Access::Authenticated)
                        .query("email")
                        .returns_list_of("Payment")
                        .into_json()
                },
                "/payment": {
                    "post": Operation::new("Payments", "Record a payment", Access::Authenticated)
                        .body("Payment")
                        .returns("InsertResult")
                        .into_json()
                },
                "/payment/{id}": {
                    "patch": Operation::new("Payments", "Update a payment", Access::Authenticated)
                        .path("id")
                        .body("Payment")
                        .returns("UpdateResult")
                        .into_json(),
                    "delete": Operation::new("Payments", "Delete a payment", Access::Authenticated)
                        .path("id")
                        .returns("DeleteResult")
                        .into_json()
                }
            },
            "components": { "schemas": schemas }
        }))
    }
}

async fn list_payments(
    State(ctx): State<AppContext>,
    QueryParams(query): QueryParams<EmailQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let filter = Filter::new().eq_opt("email", collection::non_empty(query.email));
    collection::list(ctx.store.as_ref(), PAYMENTS_COLLECTION, filter, None).await
}

async fn create_payment(
    State(ctx): State<AppContext>,
    JsonBody(payment): JsonBody<Document>,
) -> Result<Json<InsertOutcome>, AppError> {
    collection::create(ctx.store.as_ref(), PAYMENTS_COLLECTION, payment, true).await
}

async fn update_payment(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    JsonBody(changes): JsonBody<Document>,
) -> Result<Json<UpdateOutcome>, AppError> {
    collection::update(ctx.store.as_ref(), PAYMENTS_COLLECTION, &id, changes, "payment").await
}

async fn delete_payment(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    collection::delete(ctx.store.as_ref(), PAYMENTS_COLLECTION, &id, "payment").await
}

pub fn create_module(ctx: AppContext) -> Arc<dyn Module> {
    Arc::new(PaymentsModule { ctx })
}
