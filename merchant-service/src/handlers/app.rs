use axum::{extract::State, http::StatusCode, routing::get, Router};
use lifecycle::ReadinessHandler;

use super::health::health;

#[derive(Clone)]
pub struct AppState {
    pub(super) service_name: String,
    readiness: ReadinessHandler,
}

impl AppState {
    pub fn new(service_name: &str, readiness: ReadinessHandler) -> Self {
        Self {
            service_name: service_name.to_string(),
            readiness,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/_readiness", get(readiness))
        .route("/_liveness", get(liveness))
        .with_state(state)
}

pub async fn index(State(state): State<AppState>) -> String {
    state.service_name
}

async fn readiness(State(state): State<AppState>) -> StatusCode {
    state.readiness.check().await
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt; // for `collect`
    use lifecycle::ShutdownSignal;
    use tower::ServiceExt; // for `call`, `oneshot`, and `ready`

    use crate::handlers::HealthResponse;

    fn test_app(shutdown: &ShutdownSignal) -> Router {
        app(AppState::new(
            "merchant-service",
            ReadinessHandler::new(shutdown.clone()),
        ))
    }

    async fn get_path(app: Router, path: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get_path(test_app(&ShutdownSignal::new()), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let body: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            HealthResponse {
                status: "OK".to_string(),
                message: "Merchant service is healthy".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn health_stays_ok_during_shutdown() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let (status, _) = get_path(test_app(&shutdown), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_flips_when_shutdown_begins() {
        let shutdown = ShutdownSignal::new();
        let app = test_app(&shutdown);

        let (status, _) = get_path(app.clone(), "/_readiness").await;
        assert_eq!(status, StatusCode::OK);

        shutdown.trigger();
        let (status, _) = get_path(app, "/_readiness").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn index_and_liveness() {
        let app = test_app(&ShutdownSignal::new());

        let (status, body) = get_path(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"merchant-service");

        let (status, _) = get_path(app.clone(), "/_liveness").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_path(app, "/merchants/unknown-route").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
