use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;

/// Body of `GET /health`, polled by the registry's HTTP check and external probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    pub fn healthy(service_name: &str) -> Self {
        Self {
            status: "OK".to_string(),
            message: format!("{} is healthy", display_name(service_name)),
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(&state.service_name))
}

/// "merchant-service" -> "Merchant service"
fn display_name(service_name: &str) -> String {
    let spaced = service_name.replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_the_service() {
        let response = HealthResponse::healthy("merchant-service");
        assert_eq!(response.status, "OK");
        assert_eq!(response.message, "Merchant service is healthy");
    }

    #[test]
    fn display_name_handles_edge_cases() {
        assert_eq!(display_name(""), "");
        assert_eq!(display_name("payments_api"), "Payments api");
    }
}
