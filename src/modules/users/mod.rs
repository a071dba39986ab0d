use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use bookcourier_authz::{Gate, Role, USERS_COLLECTION};
use bookcourier_db::{DeleteOutcome, Document, Filter, InsertOutcome, UpdateOutcome};
use bookcourier_http::{Access, AppError, Caller, JsonBody};
use bookcourier_kernel::{InitCtx, Module};
use serde_json::{json, Value};

use super::{collection, AppContext};
use crate::utils::openapi::{write_result_schemas, Operation};

const ROLE: &str = "role";
const EMAIL: &str = "email";

/// Fields role gates resolve through; only admins may rewrite them.
const IDENTITY_FIELDS: [&str; 2] = [ROLE, EMAIL];

/// User records and their roles
pub struct UsersModule {
    ctx: AppContext,
}

impl UsersModule {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let admin = ctx
            .store
            .find_one(USERS_COLLECTION, &Filter::new().eq(ROLE, Role::Admin.as_str()))
            .await?;
        if admin.is_none() {
            tracing::warn!(
                module = self.name(),
                "no admin user stored; promote one with `bookcourier-cli set-role`"
            );
        }

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "users module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        let access = &self.ctx.access;
        Router::new()
            .route("/users", access.guard(Access::Admin, get(list_users)))
            .route(
                "/user/email/{email}",
                access.guard(Access::Public, get(user_by_email)),
            )
            .route("/user", access.guard(Access::Public, post(create_user)))
            .route(
                "/user/{id}",
                access.guard(Access::Authenticated, patch(update_user)),
            )
            .route(
                "/user/{id}",
                access.guard(Access::Authenticated, delete(delete_user)),
            )
            .with_state(self.ctx.clone())
    }

    fn openapi(&self) -> Option<Value> {
        let mut schemas = write_result_schemas();
        schemas["User"] = json!({
            "type": "object",
            "properties": {
                "_id": { "type": "string" },
                "email": { "type": "string", "format": "email" },
                "name": { "type": "string" },
                "role": { "type": "string", "enum": ["user", "librarian", "admin"] }
            },
            "required": ["email"]
        });

        Some(json!({
            "paths": {
                "/users": {
                    "get": Operation::new("Users", "List every user", Access::Admin)
                        .returns_list_of("User")
                        .into_json()
                },
                "/user/email/{email}": {
                    "get": Operation::new("Users", "Find a user by email", Access::Public)
                        .path("email")
                        .returns("User")
                        .into_json()
                },
                "/user": {
                    "post": Operation::new("Users", "Register a user with the default role", Access::Public)
                        .body("User")
                        .returns("InsertResult")
                        .into_json()
                },
                "/user/{id}": {
                    "patch": Operation::new("Users", "Update a user; changing role or email requires admin", Access::Authenticated)
                        .path("id")
                        .body("User")
                        .validated()
                        .returns("UpdateResult")
                        .into_json(),
                    "delete": Operation::new("Users", "Delete a user", Access::Authenticated)
                        .path("id")
                        .returns("DeleteResult")
                        .into_json()
                }
            },
            "components": { "schemas": schemas }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "users module started");
        Ok(())
    }
}

async fn list_users(State(ctx): State<AppContext>) -> Result<Json<Vec<Document>>, AppError> {
    collection::list(ctx.store.as_ref(), USERS_COLLECTION, Filter::new(), None).await
}

async fn user_by_email(
    State(ctx): State<AppContext>,
    Path(email): Path<String>,
) -> Result<Json<Document>, AppError> {
    ctx.store
        .find_one(USERS_COLLECTION, &Filter::new().eq(EMAIL, email))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("user not found"))
}

/// Self-registration never grants more than the default role.
async fn create_user(
    State(ctx): State<AppContext>,
    JsonBody(mut user): JsonBody<Document>,
) -> Result<Json<InsertOutcome>, AppError> {
    user.insert(ROLE.to_string(), Value::from(Role::User.as_str()));
    collection::create(ctx.store.as_ref(), USERS_COLLECTION, user, false).await
}

async fn update_user(
    State(ctx): State<AppContext>,
    caller: Caller,
    Path(id): Path<String>,
    JsonBody(changes): JsonBody<Document>,
) -> Result<Json<UpdateOutcome>, AppError> {
    if touches_identity(&changes) {
        ctx.access.require(&caller, Gate::Admin).await?;
        if let Some(requested) = changes.get(ROLE) {
            parse_role(requested)?;
        }
        tracing::info!(
            changed_by = %caller.email,
            user_id = %id,
            role = ?changes.get(ROLE),
            email = ?changes.get(EMAIL),
            "user identity change requested"
        );
    }

    collection::update(ctx.store.as_ref(), USERS_COLLECTION, &id, changes, "user").await
}

async fn delete_user(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    collection::delete(ctx.store.as_ref(), USERS_COLLECTION, &id, "user").await
}

fn touches_identity(changes: &Document) -> bool {
    IDENTITY_FIELDS.iter().any(|field| changes.contains_key(*field))
}

fn parse_role(value: &Value) -> Result<Role, AppError> {
    let invalid = || {
        AppError::validation(
            vec![json!({"field": ROLE, "error": "must be one of user, librarian, admin"})],
            "invalid role",
        )
    };
    value.as_str().ok_or_else(invalid)?.parse().map_err(|_| invalid())
}

/// Create a new instance of the users module
pub fn create_module(ctx: AppContext) -> Arc<dyn Module> {
    Arc::new(UsersModule::new(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_fields_are_detected() {
        let Value::Object(rename) = json!({"email": "other@example.com"}) else {
            unreachable!()
        };
        let Value::Object(profile) = json!({"name": "New", "photo": "x.png"}) else {
            unreachable!()
        };
        assert!(touches_identity(&rename));
        assert!(!touches_identity(&profile));
    }

    #[test]
    fn parse_role_accepts_known_roles_only() {
        assert_eq!(parse_role(&json!("librarian")).unwrap(), Role::Librarian);
        assert!(matches!(
            parse_role(&json!("superuser")),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            parse_role(&json!(3)),
            Err(AppError::Validation { .. })
        ));
    }
}
