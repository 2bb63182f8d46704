//! Readiness probe handler.

use axum::http::StatusCode;

use crate::signals::ShutdownSignal;

/// Axum-compatible readiness probe; returns 200 until shutdown is requested, then 503 so
/// load balancers stop routing to this instance while it deregisters and drains.
#[derive(Clone)]
pub struct ReadinessHandler {
    shutdown: ShutdownSignal,
}

impl ReadinessHandler {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self { shutdown }
    }

    /// No I/O.
    pub async fn check(&self) -> StatusCode {
        if self.shutdown.is_triggered() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        }
    }
}
