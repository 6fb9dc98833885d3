use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::get_health))
        .route("/api/offices", get(handlers::get_offices))
        .route("/api/offices/nearby", get(handlers::get_nearby_offices))
        .route("/api/offices/{office_id}/crowd", get(handlers::get_crowd))
        .route(
            "/api/offices/{office_id}/advisory-context",
            get(handlers::get_advisory_context),
        )
        .route(
            "/api/offices/{office_id}/reports",
            post(handlers::post_report),
        )
        .with_state(state)
}
