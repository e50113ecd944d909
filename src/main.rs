use content_comments::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{error::Error, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database, then the HTTP server. Any startup
/// failure aborts the process with the cause.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Configuration (fail-fast). `.env` is optional.
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging. RUST_LOG wins; otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "content_comments=debug,tower_http=info,axum=trace".into());

    // Pretty output for humans locally, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to connect to Postgres"))?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied.");
    }

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(repo, config));

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}
