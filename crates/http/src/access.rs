//! Token verification and role gates applied per route.
//!
//! Routes declare an [`Access`] level. Anything above `Public` first runs the
//! token verifier, which stores the verified [`Caller`] in the request
//! extensions; role-gated levels then look up the caller's stored role.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use bookcourier_authz::{authorize, bearer_token, Gate, Role, TokenVerifier};
use bookcourier_db::DocumentStore;

use crate::error::AppError;

/// Who may call a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    LibrarianOrAdmin,
    Admin,
}

impl Access {
    fn gate(self) -> Option<Gate> {
        match self {
            Access::Public | Access::Authenticated => None,
            Access::LibrarianOrAdmin => Some(Gate::LibrarianOrAdmin),
            Access::Admin => Some(Gate::Admin),
        }
    }

    /// Whether the route expects a bearer token.
    pub fn requires_token(self) -> bool {
        self != Access::Public
    }
}

/// The verified identity of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("no token provided"))
    }
}

/// Shared handles needed to authenticate and authorize callers.
#[derive(Clone)]
pub struct AccessControl {
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn DocumentStore>,
}

impl AccessControl {
    pub fn new(verifier: Arc<dyn TokenVerifier>, store: Arc<dyn DocumentStore>) -> Self {
        Self { verifier, store }
    }

    /// Wrap `route` with the middleware required by `access`.
    pub fn guard<S>(&self, access: Access, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let route = match access.gate() {
            Some(gate) => route.route_layer(from_fn_with_state(
                GateState {
                    control: self.clone(),
                    gate,
                },
                enforce_gate,
            )),
            None => route,
        };

        if access.requires_token() {
            // Added last so it runs first.
            route.route_layer(from_fn_with_state(self.clone(), verify_token))
        } else {
            route
        }
    }

    /// Check `gate` for an already verified caller from inside a handler.
    pub async fn require(&self, caller: &Caller, gate: Gate) -> Result<Role, AppError> {
        Ok(authorize(self.store.as_ref(), &caller.email, gate).await?)
    }
}

#[derive(Clone)]
struct GateState {
    control: AccessControl,
    gate: Gate,
}

/// Verify the bearer token and attach the caller's email to the request.
async fn verify_token(
    State(control): State<AccessControl>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        bearer_token(header)?.to_string()
    };

    let verified = control.verifier.verify(&token).await?;
    tracing::debug!(email = %verified.email, "caller authenticated");

    request.extensions_mut().insert(Caller {
        email: verified.email,
    });

    Ok(next.run(request).await)
}

/// Reject callers whose stored role does not satisfy the gate.
async fn enforce_gate(
    State(state): State<GateState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let email = request
        .extensions()
        .get::<Caller>()
        .map(|caller| caller.email.clone())
        .ok_or_else(|| AppError::unauthorized("no token provided"))?;

    authorize(state.control.store.as_ref(), &email, state.gate).await?;

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use bookcourier_authz::testutils::StaticTokenVerifier;
    use bookcourier_db::MemoryStore;
    use serde_json::json;
    use tower::ServiceExt;

    async fn control() -> AccessControl {
        let store = Arc::new(MemoryStore::new());
        for (email, role) in [("admin@example.com", "admin"), ("lib@example.com", "librarian")] {
            let serde_json::Value::Object(user) = json!({"email": email, "role": role}) else {
                unreachable!()
            };
            store.insert_one("users", user).await.unwrap();
        }

        let verifier = StaticTokenVerifier::new()
            .with_token("admin-token", "admin@example.com")
            .with_token("lib-token", "lib@example.com")
            .with_token("reader-token", "reader@example.com");

        AccessControl::new(Arc::new(verifier), store)
    }

    async fn whoami(caller: Caller) -> String {
        caller.email
    }

    async fn status_for(control: &AccessControl, access: Access, token: Option<&str>) -> StatusCode {
        let app: Router = Router::new().route("/probe", control.guard(access, get(whoami)));

        let mut request = axum::http::Request::builder().uri("/probe");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn public_routes_skip_verification() {
        let control = control().await;
        let app: Router = Router::new().route(
            "/open",
            control.guard(Access::Public, get(|| async { "open" })),
        );
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/open")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn authenticated_requires_valid_token() {
        let control = control().await;
        assert_eq!(
            status_for(&control, Access::Authenticated, None).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&control, Access::Authenticated, Some("forged")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&control, Access::Authenticated, Some("reader-token")).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn malformed_scheme_is_unauthorized() {
        let control = control().await;
        let app: Router = Router::new().route(
            "/probe",
            control.guard(Access::Authenticated, get(whoami)),
        );
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/probe")
                    .header(AUTHORIZATION, "Token reader-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn gates_check_stored_roles() {
        let control = control().await;

        assert_eq!(
            status_for(&control, Access::Admin, Some("admin-token")).await,
            StatusCode::OK
        );
        assert_eq!(
            status_for(&control, Access::Admin, Some("lib-token")).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&control, Access::LibrarianOrAdmin, Some("lib-token")).await,
            StatusCode::OK
        );
        assert_eq!(
            status_for(&control, Access::LibrarianOrAdmin, Some("reader-token")).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&control, Access::Admin, None).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn require_checks_gate_for_caller() {
        let control = control().await;
        let admin = Caller {
            email: "admin@example.com".to_string(),
        };
        let reader = Caller {
            email: "reader@example.com".to_string(),
        };

        assert_eq!(control.require(&admin, Gate::Admin).await.unwrap(), Role::Admin);
        assert!(matches!(
            control.require(&reader, Gate::Admin).await,
            Err(AppError::Forbidden { .. })
        ));
    }
}
