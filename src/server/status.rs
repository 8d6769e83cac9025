//! Liveness endpoint.
//!
//! Fixed indicator with no internal state exposed; for load balancers and
//! the render tool's health probes.

use axum::http::StatusCode;

/// Status handler. Returns 200 "ok" whenever the server is accepting
/// connections.
pub async fn status_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
