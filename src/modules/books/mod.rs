pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use bookcourier_db::{DeleteOutcome, Document, Filter, InsertOutcome, Sort, UpdateOutcome};
use bookcourier_http::{Access, AppError, JsonBody, QueryParams};
use bookcourier_kernel::{InitCtx, Module};
use serde_json::{json, Value};

use super::{collection, AppContext};
use crate::utils::openapi::{write_result_schemas, Operation};
use models::{missing_fields, BookQuery, PriceSort, SEARCH_FIELDS};

pub const BOOKS_COLLECTION: &str = "books";

/// Catalogue of books
pub struct BooksModule {
    ctx: AppContext,
}

impl BooksModule {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        let access = &self.ctx.access;
        Router::new()
            .route("/books", access.guard(Access::Public, get(list_books)))
            .route("/book/{id}", access.guard(Access::Public, get(get_book)))
            .route(
                "/book/{id}",
                access.guard(Access::LibrarianOrAdmin, patch(update_book)),
            )
            .route("/book/{id}", access.guard(Access::Admin, delete(delete_book)))
            .route(
                "/book",
                access.guard(Access::LibrarianOrAdmin, post(create_book)),
            )
            .with_state(self.ctx.clone())
    }

    fn openapi(&self) -> Option<Value> {
        let mut schemas = write_result_schemas();
        schemas["Book"] = json!({
            "type": "object",
            "properties": {
                "_id": { "type": "string" },
                "title": { "type": "string" },
                "author": { "type": "string" },
                "price": { "type": "number" },
                "category": { "type": "string" },
                "status": { "type": "string" },
                "createdAt": { "type": "string", "format": "date-time" }
            },
            "required": ["title", "author", "price"]
        });

        Some(json!({
            "paths": {
                "/books": {
                    "get": Operation::new("Books", "List books", Access::Public)
                        .query("category")
                        .query("status")
                        .query("search")
                        .query("sort")
                        .validated()
                        .returns_list_of("Book")
                        .into_json()
                },
                "/book": {
                    "post": Operation::new("Books", "Add a book", Access::LibrarianOrAdmin)
                        .body("Book")
                        .validated()
                        .returns("InsertResult")
                        .into_json()
                },
                "/book/{id}": {
                    "get": Operation::new("Books", "Get a book", Access::Public)
                        .path("id")
                        .returns("Book")
                        .into_json(),
                    "patch": Operation::new("Books", "Update a book", Access::LibrarianOrAdmin)
                        .path("id")
                        .body("Book")
                        .returns("UpdateResult")
                        .into_json(),
                    "delete": Operation::new("Books", "Delete a book", Access::Admin)
                        .path("id")
                        .returns("DeleteResult")
                        .into_json()
                }
            },
            "components": { "schemas": schemas }
        }))
    }
}

/// List books. `search` matches title or author case-insensitively; `sort`
/// orders by price.
async fn list_books(
    State(ctx): State<AppContext>,
    QueryParams(query): QueryParams<BookQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let mut filter = Filter::new()
        .eq_opt("category", collection::non_empty(query.category))
        .eq_opt("status", collection::non_empty(query.status));
    if let Some(search) = collection::non_empty(query.search) {
        filter = filter.contains_any(&SEARCH_FIELDS, search);
    }

    let sort = query.sort.map(|direction| match direction {
        PriceSort::Asc => Sort::ascending("price"),
        PriceSort::Desc => Sort::descending("price"),
    });

    collection::list(ctx.store.as_ref(), BOOKS_COLLECTION, filter, sort).await
}

async fn get_book(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    collection::get(ctx.store.as_ref(), BOOKS_COLLECTION, &id, "book").await
}

async fn create_book(
    State(ctx): State<AppContext>,
    JsonBody(book): JsonBody<Document>,
) -> Result<Json<InsertOutcome>, AppError> {
    let missing = missing_fields(&book);
    if !missing.is_empty() {
        let details = missing
            .iter()
            .map(|field| json!({"field": field, "error": "required"}))
            .collect();
        return Err(AppError::validation(
            details,
            "title, author and price are required",
        ));
    }

    collection::create(ctx.store.as_ref(), BOOKS_COLLECTION, book, true).await
}

async fn update_book(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    JsonBody(changes): JsonBody<Document>,
) -> Result<Json<UpdateOutcome>, AppError> {
    collection::update(ctx.store.as_ref(), BOOKS_COLLECTION, &id, changes, "book").await
}

async fn delete_book(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    collection::delete(ctx.store.as_ref(), BOOKS_COLLECTION, &id, "book").await
}

/// Create a new instance of the books module
pub fn create_module(ctx: AppContext) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(ctx))
}
