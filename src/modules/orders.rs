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

pub const ORDERS_COLLECTION: &str = "orders";

/// Customer orders. `status` is free-form and reported by the stats module.
pub struct OrdersModule {
    ctx: AppContext,
}

#[async_trait]
impl Module for OrdersModule {
    fn name(&self) -> &'static str {
        "orders"
    }

    fn routes(&self) -> Router {
        let access = &self.ctx.access;
        Router::new()
            .route("/orders", access.guard(Access::Authenticated, get(list_orders)))
            .route("/order", access.guard(Access::Authenticated, post(create_order)))
            .route(
                "/order/{id}",
                access.guard(Access::Authenticated, patch(update_order)),
            )
            .route("/order/{id}", access.guard(Access::Admin, delete(delete_order)))
            .with_state(self.ctx.clone())
    }

    fn openapi(&self) -> Option<Value> {
        let mut schemas = write_result_schemas();
        schemas["Order"] = json!({
            "type": "object",
            "properties": {
                "_id": { "type": "string" },
                "email": { "type": "string", "format": "email" },
                "status": { "type": "string" },
                "createdAt": { "type": "string", "format": "date-time" }
            }
        });

        Some(json!({
            "paths": {
                "/orders": {
                    "get": Operation::new("Orders", "List orders, optionally by customer email", Access::Authenticated)
                        .query("email")
                        .returns_list_of("Order")
                        .into_json()
                },
                "/order": {
                    "post": Operation::new("Orders", "Place an order", Access::Authenticated)
                        .body("Order")
                        .returns("InsertResult")
                        .into_json()
                },
                "/order/{id}": {
                    "patch": Operation::new("Orders", "Update an order", Access::Authenticated)
                        .path("id")
                        .body("Order")
                        .returns("UpdateResult")
                        .into_json(),
                    "delete": Operation::new("Orders", "Delete an order", Access::Admin)
                        .path("id")
                        .returns("DeleteResult")
                        .into_json()
                }
            },
            "components": { "schemas": schemas }
        }))
    }
}

async fn list_orders(
    State(ctx): State<AppContext>,
    QueryParams(query): QueryParams<EmailQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let filter = Filter::new().eq_opt("email", collection::non_empty(query.email));
    collection::list(ctx.store.as_ref(), ORDERS_COLLECTION, filter, None).await
}

async fn create_order(
    State(ctx): State<AppContext>,
    JsonBody(order): JsonBody<Document>,
) -> Result<Json<InsertOutcome>, AppError> {
    collection::create(ctx.store.as_ref(), ORDERS_COLLECTION, order, true).await
}

async fn update_order(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    JsonBody(changes): JsonBody<Document>,
) -> Result<Json<UpdateOutcome>, AppError> {
    collection::update(ctx.store.as_ref(), ORDERS_COLLECTION, &id, changes, "order").await
}

async fn delete_order(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    collection::delete(ctx.store.as_ref(), ORDERS_COLLECTION, &id, "order").await
}

pub fn create_module(ctx: AppContext) -> Arc<dyn Module> {
    Arc::new(OrdersModule { ctx })
}
