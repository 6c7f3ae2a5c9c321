pub mod routes;

use crate::state::CrowdServiceState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn router(state: CrowdServiceState) -> Router {
    Router::new()
        // Health and metrics endpoints
        .route("/healthz", get(routes::healthz))
        .route("/metrics", get(routes::metrics))
        // Venue endpoints
        .route("/v1/venues", get(routes::list_venues))
        .route("/v1/venues/:venue_id/frames", post(routes::submit_frame))
        .route("/v1/venues/:venue_id/alerts", get(routes::list_alerts))
        .route("/v1/venues/:venue_id/alerts/dismiss", post(routes::dismiss_all_alerts))
        .route(
            "/v1/venues/:venue_id/alerts/:alert_id/dismiss",
            post(routes::dismiss_alert),
        )
        .route(
            "/v1/venues/:venue_id/history",
            get(routes::get_history).delete(routes::reset_history),
        )
        .route("/v1/venues/:venue_id/analytics", get(routes::get_analytics))
        .route(
            "/v1/venues/:venue_id/settings",
            get(routes::get_settings).put(routes::update_settings),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
