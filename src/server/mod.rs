use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self as mw, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;

use crate::engine::Engine;
use crate::observability;

mod error;
pub mod handlers;

pub use error::ApiError;

pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Creates the router for the booking API.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/users", get(handlers::get_users))
        .route("/users/:id/usage", get(handlers::get_usage))
        .route("/users/:id/board", get(handlers::get_board))
        .route("/courses", get(handlers::get_courses).post(handlers::post_course))
        .route("/courses/draft", post(handlers::post_course_draft))
        .route("/bookings", get(handlers::get_bookings).post(handlers::post_booking))
        .route("/bookings/views", get(handlers::get_booking_views))
        .route("/bookings/check", post(handlers::post_booking_check))
        .route(
            "/bookings/:id",
            put(handlers::put_booking).delete(handlers::delete_booking),
        )
        .route("/leaderboard", get(handlers::get_leaderboard))
        .route(
            "/admin/settings",
            get(handlers::get_admin_settings).post(handlers::post_admin_settings),
        );

    Router::new()
        .route("/health", get(handlers::get_health))
        .nest("/api", api)
        .route_layer(mw::from_fn(track_metrics))
        .with_state(app_state)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let method = req.method().to_string();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    metrics::counter!(
        observability::HTTP_REQUESTS_TOTAL,
        "route" => route.clone(),
        "method" => method.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        observability::HTTP_REQUEST_DURATION_SECONDS,
        "route" => route.clone(),
        "method" => method.clone()
    )
    .record(started.elapsed().as_secs_f64());
    tracing::debug!(%method, %route, status, "request served");
    response
}
