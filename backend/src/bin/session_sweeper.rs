//! Closes active sessions whose token expiry has passed and clears the token.
//!
//! Run from cron. Redemption checks expiry itself, so this only affects
//! listings and dashboards.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall_backend::{
    config::{Config, StoreBackend},
    db::connection::create_pool,
    repositories::PgSessionRepository,
    services::SessionRegistry,
    utils::time::SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall_backend=info,session_sweeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    if config.store_backend == StoreBackend::Memory {
        anyhow::bail!("session_sweeper needs the postgres store; STORE_BACKEND=memory has nothing to sweep");
    }

    let pool = create_pool(&config.database_url, 1).await?;
    let registry = SessionRegistry::new(
        Arc::new(PgSessionRepository::new(pool.clone())),
        Arc::new(SystemClock),
    );

    let closed = registry.close_expired().await?;
    tracing::info!("Closed {} sessions with expired tokens", closed);

    sqlx::query("VACUUM (ANALYZE) sessions")
        .execute(&pool)
        .await?;

    Ok(())
}
