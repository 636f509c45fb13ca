use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use availability_cell::PgManager;
use coordination_cell::RedisManager;
use scheduling_cell::{scheduling_routes, SchedulingService};
use shared_pool::ResourcePool;

pub struct ApiContext {
    pub service: Arc<SchedulingService>,
    pub db_pool: ResourcePool<PgManager>,
    pub redis_pool: ResourcePool<RedisManager>,
}

pub fn create_router(context: Arc<ApiContext>) -> Router {
    Router::new()
        .route("/", get(|| async { "Patient intake scheduling API is running!" }))
        .route("/healthz", get(healthz))
        .with_state(context.clone())
        .nest("/scheduling", scheduling_routes(context.service.clone()))
}

async fn healthz(State(context): State<Arc<ApiContext>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "database_pool": context.db_pool.status(),
        "redis_pool": context.redis_pool.status(),
    }))
}
