use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use diesel::{Connection, PgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use availability_cell::{PgManager, PgSchedulingStore};
use coordination_cell::{RedisLockManager, RedisManager, RedisSlotCache};
use scheduling_cell::SchedulingService;
use shared_config::{AppConfig, PoolSettings};
use shared_pool::{PoolConfig, ResourcePool};

/// Migrations embedded into the binary which helps with streamlining image
/// building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting patient intake scheduling API");

    // Load configuration
    let config = AppConfig::from_env();

    info!("Running migrations...");
    let applied = run_migrations(&config.database_url).await?;
    info!("Applied {} pending migrations", applied);

    // Process-local pools for the database and the cache tier
    let db_pool = ResourcePool::new(
        PgManager::new(&config.database_url),
        pool_config(&config.database_pool),
    );
    let redis_pool = ResourcePool::new(
        RedisManager::new(&config.redis_url).context("invalid REDIS_URL")?,
        pool_config(&config.cache_pool),
    );

    let store = Arc::new(PgSchedulingStore::new(
        db_pool.clone(),
        config.database_pool.call_deadline,
    ));
    let locks = Arc::new(RedisLockManager::new(redis_pool.clone()));
    let cache = Arc::new(RedisSlotCache::new(redis_pool.clone()));
    let service = Arc::new(SchedulingService::new(store, locks, cache, &config));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let context = Arc::new(router::ApiContext { service, db_pool, redis_pool });
    let app = router::create_router(context)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn pool_config(settings: &PoolSettings) -> PoolConfig {
    PoolConfig {
        max_size: settings.max_connections,
        acquire_timeout: settings.acquire_timeout,
        idle_after: settings.idle_after,
    }
}

async fn run_migrations(database_url: &str) -> Result<usize> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut conn = PgConnection::establish(&database_url)
            .context("failed to connect to postgres for migrations")?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("failed to run migrations: {}", e))?;
        Ok(applied.len())
    })
    .await?
}
