use anyhow::{bail, Context};
use bookcourier_authz::{Role, USERS_COLLECTION};
use bookcourier_db::{DocumentStore, Filter, ID_FIELD};
use bookcourier_kernel::settings::Settings;
use clap::{Parser, Subcommand};
use serde_json::Value;

const COLLECTIONS: [&str; 6] = [
    USERS_COLLECTION,
    "books",
    "orders",
    "payments",
    "reviews",
    "wishlist",
];

#[derive(Debug, Parser)]
#[command(name = "bookcourier-cli", about = "Operator commands for BookCourier")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to the configured database and print collection sizes
    Check,
    /// Set the stored role of an existing user
    SetRole {
        #[arg(long)]
        email: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse()
}

/// Rewrite the stored role of the user with `email`. Fails when no such user exists.
async fn set_role(store: &dyn DocumentStore, email: &str, role: Role) -> anyhow::Result<()> {
    let user = store
        .find_one(USERS_COLLECTION, &Filter::new().eq("email", email))
        .await?;
    let Some(user) = user else {
        bail!("no user with email '{}'", email);
    };
    let Some(id) = user.get(ID_FIELD).and_then(Value::as_str) else {
        bail!("user '{}' has no identifier", email);
    };

    let mut changes = serde_json::Map::new();
    changes.insert("role".to_string(), Value::from(role.as_str()));
    store.update_by_id(USERS_COLLECTION, id, changes).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load BookCourier settings")?;
    bookcourier_telemetry::init(&settings.telemetry)?;

    let store = bookcourier_db::connect(&settings.database.uri, &settings.database.name)
        .await
        .context("failed to connect to the database")?;

    match cli.command {
        Command::Check => {
            println!("database '{}' reachable ({})", settings.database.name, store.backend());
            for collection in COLLECTIONS {
                let count = store.estimated_count(collection).await?;
                println!("{:<10} {}", collection, count);
            }
        }
        Command::SetRole { email, role } => {
            set_role(store.as_ref(), &email, role).await?;
            tracing::info!(email = %email, role = %role, "user role updated");
            println!("{} is now {}", email, role);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookcourier_authz::stored_role;
    use bookcourier_db::MemoryStore;
    use serde_json::json;

    async fn store_with_reader() -> MemoryStore {
        let store = MemoryStore::new();
        let Value::Object(user) = json!({"email": "reader@example.com", "role": "user", "name": "R"})
        else {
            unreachable!()
        };
        store.insert_one(USERS_COLLECTION, user).await.unwrap();
        store
    }

    #[tokio::test]
    async fn set_role_promotes_existing_user() {
        let store = store_with_reader().await;

        set_role(&store, "reader@example.com", Role::Admin)
            .await
            .unwrap();

        assert_eq!(
            stored_role(&store, "reader@example.com").await.unwrap(),
            Some(Role::Admin)
        );
        let user = store
            .find_one(USERS_COLLECTION, &Filter::new().eq("email", "reader@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user["name"], "R");
    }

    #[tokio::test]
    async fn set_role_fails_for_unknown_email() {
        let store = store_with_reader().await;

        let error = set_role(&store, "ghost@example.com", Role::Librarian)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("ghost@example.com"));
        assert_eq!(
            stored_role(&store, "reader@example.com").await.unwrap(),
            Some(Role::User)
        );
    }

    #[test]
    fn role_argument_parses() {
        let cli = Cli::try_parse_from([
            "bookcourier-cli",
            "set-role",
            "--email",
            "a@example.com",
            "--role",
            "librarian",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::SetRole { role: Role::Librarian, .. }
        ));
    }
}
