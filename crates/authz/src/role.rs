use std::fmt;
use std::str::FromStr;

use bookcourier_db::{DbError, DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collection holding user records, keyed logically by `email`.
pub const USERS_COLLECTION: &str = "users";

/// Field on the user record that carries the role.
pub const ROLE_FIELD: &str = "role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Librarian,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Librarian => "librarian",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "librarian" => Ok(Role::Librarian),
            "admin" => Ok(Role::Admin),
            other => Err(format!(
                "unknown role '{}'; expected user/librarian/admin",
                other
            )),
        }
    }
}

/// A role requirement placed in front of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Admin,
    LibrarianOrAdmin,
}

impl Gate {
    pub fn permits(self, role: Role) -> bool {
        match self {
            Gate::Admin => role == Role::Admin,
            Gate::LibrarianOrAdmin => matches!(role, Role::Librarian | Role::Admin),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] DbError),
}

/// Role stored on the user record for `email`.
///
/// `None` when there is no such user or the stored value is not a known role.
pub async fn stored_role(store: &dyn DocumentStore, email: &str) -> Result<Option<Role>, AuthzError> {
    let user = store
        .find_one(USERS_COLLECTION, &Filter::new().eq("email", email))
        .await?;

    Ok(user
        .as_ref()
        .and_then(|user| user.get(ROLE_FIELD))
        .and_then(|role| role.as_str())
        .and_then(|role| role.parse().ok()))
}

/// Check `gate` for the caller identified by `email`, returning their role.
pub async fn authorize(
    store: &dyn DocumentStore,
    email: &str,
    gate: Gate,
) -> Result<Role, AuthzError> {
    match stored_role(store, email).await? {
        Some(role) if gate.permits(role) => Ok(role),
        role => {
            tracing::warn!(
                target: "bookcourier-authz",
                email,
                role = ?role,
                gate = ?gate,
                "access denied"
            );
            Err(AuthzError::Forbidden(match gate {
                Gate::Admin => "admin access required".to_string(),
                Gate::LibrarianOrAdmin => "librarian or admin access required".to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookcourier_db::MemoryStore;
    use serde_json::{json, Value};

    async fn store_with(users: &[Value]) -> MemoryStore {
        let store = MemoryStore::new();
        for user in users {
            let Value::Object(user) = user.clone() else {
                unreachable!()
            };
            store.insert_one(USERS_COLLECTION, user).await.unwrap();
        }
        store
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::User, Role::Librarian, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn gates_compare_roles() {
        assert!(Gate::Admin.permits(Role::Admin));
        assert!(!Gate::Admin.permits(Role::Librarian));
        assert!(!Gate::Admin.permits(Role::User));
        assert!(Gate::LibrarianOrAdmin.permits(Role::Admin));
        assert!(Gate::LibrarianOrAdmin.permits(Role::Librarian));
        assert!(!Gate::LibrarianOrAdmin.permits(Role::User));
    }

    #[tokio::test]
    async fn authorize_uses_stored_role() {
        let store = store_with(&[
            json!({"email": "admin@example.com", "role": "admin"}),
            json!({"email": "lib@example.com", "role": "librarian"}),
        ])
        .await;

        assert_eq!(
            authorize(&store, "admin@example.com", Gate::Admin).await.unwrap(),
            Role::Admin
        );
        assert_eq!(
            authorize(&store, "lib@example.com", Gate::LibrarianOrAdmin)
                .await
                .unwrap(),
            Role::Librarian
        );
        assert!(matches!(
            authorize(&store, "lib@example.com", Gate::Admin).await,
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn unknown_user_or_role_is_forbidden() {
        let store = store_with(&[json!({"email": "odd@example.com", "role": "owner"})]).await;

        assert_eq!(stored_role(&store, "odd@example.com").await.unwrap(), None);
        assert!(matches!(
            authorize(&store, "odd@example.com", Gate::LibrarianOrAdmin).await,
            Err(AuthzError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&store, "ghost@example.com", Gate::LibrarianOrAdmin).await,
            Err(AuthzError::Forbidden(_))
        ));
    }
}
