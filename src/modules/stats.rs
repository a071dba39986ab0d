//! Admin reporting over the other collections.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, routing::get, Json, Router};
use bookcourier_authz::USERS_COLLECTION;
use bookcourier_db::{Document, Filter, GroupCount};
use bookcourier_http::{Access, AppError};
use bookcourier_kernel::Module;
use serde::Serialize;
use serde_json::{json, Value};

use super::books::BOOKS_COLLECTION;
use super::orders::ORDERS_COLLECTION;
use super::payments::PAYMENTS_COLLECTION;
use super::AppContext;
use crate::utils::openapi::Operation;

/// Body of `GET /admin/stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_users: u64,
    pub total_books: u64,
    pub total_orders: u64,
    pub total_revenue: f64,
}

pub struct StatsModule {
    ctx: AppContext,
}

#[async_trait]
impl Module for StatsModule {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn routes(&self) -> Router {
        let access = &self.ctx.access;
        Router::new()
            .route("/admin/stats", access.guard(Access::Admin, get(summary)))
            .route("/order-stats", access.guard(Access::Admin, get(order_stats)))
            .with_state(self.ctx.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(json!({
            "paths": {
                "/admin/stats": {
                    "get": Operation::new("Stats", "Collection totals and revenue", Access::Admin)
                        .returns("Summary")
                        .into_json()
                },
                "/order-stats": {
                    "get": Operation::new("Stats", "Order counts grouped by status", Access::Admin)
                        .returns_list_of("StatusCount")
                        .into_json()
                }
            },
            "components": {
                "schemas": {
                    "Summary": {
                        "type": "object",
                        "properties": {
                            "totalUsers": { "type": "integer" },
                            "totalBooks": { "type": "integer" },
                            "totalOrders": { "type": "integer" },
                            "totalRevenue": { "type": "number" }
                        }
                    },
                    "StatusCount": {
                        "type": "object",
                        "properties": {
                            "_id": { "type": "string", "nullable": true },
                            "count": { "type": "integer" }
                        }
                    }
                }
            }
        }))
    }
}

/// Sum of `price` over payments; missing or non-numeric prices count as 0.
pub fn revenue(payments: &[Document]) -> f64 {
    payments
        .iter()
        .filter_map(|payment| payment.get("price").and_then(Value::as_f64))
        .sum()
}

async fn summary(State(ctx): State<AppContext>) -> Result<Json<Summary>, AppError> {
    let store = ctx.store.as_ref();
    let total_users = store.estimated_count(USERS_COLLECTION).await?;
    let total_books = store.estimated_count(BOOKS_COLLECTION).await?;
    let total_orders = store.estimated_count(ORDERS_COLLECTION).await?;

    let payments = store
        .find(PAYMENTS_COLLECTION, &Filter::new(), None)
        .await?;

    Ok(Json(Summary {
        total_users,
        total_books,
        total_orders,
        total_revenue: revenue(&payments),
    }))
}

async fn order_stats(State(ctx): State<AppContext>) -> Result<Json<Vec<GroupCount>>, AppError> {
    let counts = ctx.store.count_by(ORDERS_COLLECTION, "status").await?;
    Ok(Json(counts))
}

pub fn create_module(ctx: AppContext) -> Arc<dyn Module> {
    Arc::new(StatsModule { ctx })
}
