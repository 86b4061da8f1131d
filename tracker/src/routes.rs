use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::scheduler::Tracker;
use crate::state::TrackingSnapshot;

pub fn router(tracker: Tracker) -> Router {
    let api_routes = Router::new()
        .route("/track", get(get_track))
        .with_state(tracker);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "pass-tracker",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Latest trajectory, live position and next pass.
async fn get_track(State(tracker): State<Tracker>) -> Json<TrackingSnapshot> {
    Json(tracker.snapshot(Utc::now()).await)
}
