use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use classwork_api::actions;
use classwork_api::bus::client::{GatewayClient, ServiceBus};
use classwork_api::bus::dispatch::Dispatcher;
use classwork_api::bus::Envelope;
use classwork_api::database::manager;
use classwork_api::error::ActionError;

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    pool: PgPool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = classwork_api::config::config();
    tracing::info!("Starting {} service", config.service_name);

    let pool = manager::connect_pool().await?;
    let bus: Arc<dyn ServiceBus> = Arc::new(GatewayClient::from_config());
    let dispatcher = Arc::new(Dispatcher::new(actions::registry(), pool.clone(), bus));

    let app = app(AppState { dispatcher, pool });

    // Allow tests or deployments to override port via env
    let port = std::env::var("CLASSWORK_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("🚀 Classwork API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        // Bus gateway bridge: one endpoint per inbound envelope
        .route("/bus/:action", post(bus_action))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Adapt an inbound bus envelope to the transport-agnostic dispatcher
async fn bus_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(envelope): Json<Envelope>,
) -> Result<Json<Value>, ActionError> {
    let result = state.dispatcher.dispatch(&action, envelope).await?;
    Ok(Json(json!({ "result": result })))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Classwork API",
            "version": version,
            "description": "Education platform backend - task assignment and grading service",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "bus": "/bus/:action (bus gateway bridge)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match manager::health_check(&state.pool).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
