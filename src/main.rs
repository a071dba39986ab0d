use std::sync::Arc;

use anyhow::Context;
use bookcourier_authz::{FirebaseVerifier, TokenVerifier};
use bookcourier_kernel::{settings::Settings, InitCtx};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load BookCourier settings")?;
    bookcourier_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        database = %settings.database.name,
        "bookcourier bootstrap starting"
    );

    // Routes are only built once the database answers.
    let store = bookcourier_db::connect(&settings.database.uri, &settings.database.name)
        .await
        .context("failed to connect to the database")?;

    let verifier: Arc<dyn TokenVerifier> = Arc::new(
        FirebaseVerifier::from_settings(&settings.auth)
            .context("failed to configure token verification")?,
    );

    let registry = bookcourier::registry(store.clone(), verifier);
    let ctx = InitCtx {
        settings: &settings,
        store: &store,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    tracing::info!(
        modules = registry.module_count(),
        "bookcourier bootstrap complete"
    );

    let served = bookcourier_http::start_server(&registry, &settings).await;
    registry.stop_modules().await?;
    served
}
