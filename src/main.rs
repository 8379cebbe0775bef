use simple_bank::config::Settings;
use simple_bank::observability::{init_logging, init_metrics, LogConfig};
use simple_bank::repositories::{PgStore, Store, TransactionScope};
use simple_bank::services::TransferEngine;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let settings = Settings::new()?;

    init_logging(&LogConfig::from(&settings.logging))?;
    init_metrics()?;
    info!("Configuration loaded");

    // Connect to PostgreSQL
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(settings.database.acquire_timeout())
        .connect(&settings.database.url)
        .await?;

    info!("Database connection established");

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied successfully");

    // Open and roll back one scope to check the configured isolation level is accepted
    let store = PgStore::new(pool)
        .with_isolation_level(settings.database.isolation_level)
        .with_lock_timeout(settings.transfer.timeout());
    let scope = store.begin().await?;
    scope.rollback().await?;

    let engine = TransferEngine::from_settings(store, &settings.transfer);
    let policy = engine.policy();
    info!(
        isolation_level = engine.store().isolation_level().as_sql(),
        transfer_timeout_ms = settings.transfer.timeout_ms,
        lock_timeout = ?engine.store().lock_timeout(),
        require_positive_amount = policy.require_positive_amount,
        allow_self_transfer = policy.allow_self_transfer,
        balance_floor = ?policy.balance_floor,
        "Ledger store ready"
    );

    Ok(())
}
