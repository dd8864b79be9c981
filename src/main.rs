use blogicum::{
    AppState,
    config::{AppConfig, ConfigError, Env},
    create_router,
    fixtures::{Fixture, FixtureError},
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to connect to Postgres, check DATABASE_URL: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Failed to load fixture: {0}")]
    Fixture(#[from] FixtureError),
    #[error("Failed to bind TCP listener: {0}")]
    TcpBind(std::io::Error),
    #[error("HTTP server stopped: {0}")]
    TcpServe(std::io::Error),
}

/// main
///
/// Loads configuration, sets up logging, picks the store, optionally seeds it from a
/// fixture and serves the blog.
#[tokio::main]
async fn main() -> Result<(), InitError> {
    // 1. Configuration (fail fast on missing production settings)
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging
    // RUST_LOG wins; otherwise verbose defaults for development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blogicum=debug,tower_http=info,axum=trace".into());

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

    // 3. Store selection
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await?;
            tracing::info!("Using Postgres store");
            Arc::new(PostgresRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Optional seed data
    if let Some(path) = &config.fixture_path {
        let summary = Fixture::from_path(path).await?.load_into(repo.as_ref()).await?;
        tracing::info!(path = %path.display(), posts = summary.posts, "Seeded store");
    }

    // 5. Router and server
    let bind_addr = config.bind_addr;
    let app = create_router(AppState { repo, config });

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(InitError::TcpBind)?;

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app)
        .await
        .map_err(InitError::TcpServe)
}
