pub mod admin;
pub mod booking;
pub mod events;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/services", get(booking::get_services))
        .route("/api/availability", get(booking::get_availability))
        .route("/api/appointments", post(booking::submit_appointment))
        .route(
            "/api/admin/appointments",
            get(admin::list_appointments).post(admin::create_appointment),
        )
        .route(
            "/api/admin/appointments/:id",
            axum::routing::delete(admin::delete_appointment),
        )
        .route(
            "/api/admin/appointments/:id/approve",
            post(admin::approve_appointment),
        )
        .route(
            "/api/admin/appointments/:id/reject",
            post(admin::reject_appointment),
        )
        .route(
            "/api/admin/appointments/:id/cancel",
            post(admin::cancel_appointment),
        )
        .route(
            "/api/admin/appointments/:id/no-show",
            post(admin::mark_no_show),
        )
        .route(
            "/api/admin/appointments/:id/move",
            post(admin::move_appointment),
        )
        .route("/api/admin/conflicts", get(admin::list_conflicts))
        .route("/api/admin/conflicts/next", get(admin::next_conflict))
        .route("/api/admin/conflicts/resolve", post(admin::resolve_conflict))
        .route("/api/admin/blocked", get(admin::get_blocked))
        .route("/api/admin/block", post(admin::block_slot))
        .route("/api/admin/unblock", post(admin::unblock_slot))
        .route("/api/admin/stats/daily", get(admin::daily_stats))
        .route("/api/admin/stats/monthly", get(admin::monthly_stats))
        .route("/api/admin/overview", get(admin::get_overview))
        .route("/api/admin/events", get(events::events_stream))
        .route("/api/admin/expiry/sweep", post(admin::run_expiry_sweep))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
