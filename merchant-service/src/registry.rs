//! Consul agent client: service registration with an HTTP health check.

use std::time::Duration;

use async_trait::async_trait;
use lifecycle::{HealthCheckSpec, RegistryClient, RegistryError, ServiceIdentity};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

const CONSUL_TOKEN_HEADER: &str = "X-Consul-Token";

#[derive(Debug, Error)]
pub enum ConsulClientError {
    #[error("invalid consul url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RegisterPayload<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    name: &'a str,
    address: &'a str,
    port: u16,
    check: CheckPayload,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CheckPayload {
    #[serde(rename = "HTTP")]
    http: String,
    interval: String,
    timeout: String,
    deregister_critical_service_after: String,
}

impl<'a> RegisterPayload<'a> {
    fn new(identity: &'a ServiceIdentity, check: &HealthCheckSpec) -> Self {
        Self {
            id: identity.id(),
            name: identity.name(),
            address: identity.address(),
            port: identity.port(),
            check: CheckPayload {
                http: identity.health_url(check),
                interval: go_duration(check.interval_seconds),
                timeout: go_duration(check.timeout_seconds),
                deregister_critical_service_after: go_duration(check.deregister_after_seconds),
            },
        }
    }
}

// Consul parses durations with Go's time.ParseDuration.
fn go_duration(seconds: u64) -> String {
    format!("{seconds}s")
}

#[derive(Clone)]
pub struct ConsulClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl ConsulClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConsulClientError> {
        let base_url = Url::parse(base_url).map_err(|source| ConsulClientError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.is_empty()),
            timeout,
        })
    }

    /// PUT to the agent endpoint under the base url. Each segment is percent-encoded, so an
    /// id containing `/`, `?` or `#` stays a single path segment.
    fn put(&self, segments: &[&str]) -> Result<RequestBuilder, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RegistryError::Unreachable("consul url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        let request = self.client.put(url);
        Ok(match &self.token {
            Some(token) => request.header(CONSUL_TOKEN_HEADER, token),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RegistryError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::Timeout(self.timeout)
            } else {
                RegistryError::Unreachable(Box::new(e))
            }
        })
    }
}

async fn rejected(response: Response) -> RegistryError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RegistryError::Rejected { status, body }
}

#[async_trait]
impl RegistryClient for ConsulClient {
    async fn register(
        &self,
        identity: &ServiceIdentity,
        check: &HealthCheckSpec,
    ) -> Result<(), RegistryError> {
        let payload = RegisterPayload::new(identity, check);
        let request = self.put(&["v1", "agent", "service", "register"])?.json(&payload);
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        Ok(())
    }

    async fn deregister(&self, id: &str) -> Result<(), RegistryError> {
        let request = self.put(&["v1", "agent", "service", "deregister", id])?;
        let response = self.send(request).await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // Unknown service id: already gone as far as we're concerned.
            StatusCode::NOT_FOUND => {
                debug!(service_id = id, "service was not registered, nothing to deregister");
                Ok(())
            }
            _ => Err(rejected(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method, MockServer};
    use serde_json::json;

    use super::*;

    fn identity() -> ServiceIdentity {
        ServiceIdentity::new("merchant-service", Some("pod-1"), "10.0.0.5", 3000)
    }

    fn client(server: &MockServer, token: Option<&str>) -> ConsulClient {
        ConsulClient::new(
            &server.base_url(),
            token.map(str::to_string),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn register_sends_service_definition_with_http_check() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::PUT)
                .path("/v1/agent/service/register")
                .json_body(json!({
                    "ID": "merchant-service-pod-1",
                    "Name": "merchant-service",
                    "Address": "10.0.0.5",
                    "Port": 3000,
                    "Check": {
                        "HTTP": "http://10.0.0.5:3000/health",
                        "Interval": "10s",
                        "Timeout": "5s",
                        "DeregisterCriticalServiceAfter": "60s"
                    }
                }));
            then.status(200);
        });

        client(&server, None)
            .register(&identity(), &HealthCheckSpec::default())
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn register_rejection_carries_status_and_body() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(Method::PUT).path("/v1/agent/service/register");
            then.status(400).body("Invalid check: Interval must be > 0");
        });

        let err = client(&server, None)
            .register(&identity(), &HealthCheckSpec::default())
            .await
            .unwrap_err();

        match err {
            RegistryError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid check"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_agent_is_reported() {
        let client = ConsulClient::new("http://127.0.0.1:1", None, Duration::from_secs(1)).unwrap();

        let err = client
            .register(&identity(), &HealthCheckSpec::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Unreachable(_)));
    }

    #[tokio::test]
    async fn deregister_uses_service_id_and_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::PUT)
                .path("/v1/agent/service/deregister/merchant-service-pod-1")
                .header("X-Consul-Token", "s3cr3t");
            then.status(200);
        });

        client(&server, Some("s3cr3t"))
            .deregister("merchant-service-pod-1")
            .await
            .unwrap();

        assert_eq!(mock.hits(), 1);
    }

    #[tokio::test]
    async fn deregistering_unknown_service_is_a_noop() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(Method::PUT)
                .path("/v1/agent/service/deregister/merchant-service-pod-1");
            then.status(404).body("Unknown service ID");
        });

        let result = client(&server, None)
            .deregister("merchant-service-pod-1")
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn deregister_server_error_is_reported() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(Method::PUT)
                .path("/v1/agent/service/deregister/merchant-service-pod-1");
            then.status(500);
        });

        let err = client(&server, None)
            .deregister("merchant-service-pod-1")
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Rejected { status: 500, .. }));
    }

    #[test]
    fn base_url_with_path_prefix_is_preserved() {
        let client = ConsulClient::new(
            "http://consul.internal:8500/proxy",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let request = client
            .put(&["v1", "agent", "service", "register"])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://consul.internal:8500/proxy/v1/agent/service/register"
        );

        let with_slash =
            ConsulClient::new("http://consul.internal:8500/", None, Duration::from_secs(1))
                .unwrap();
        let request = with_slash
            .put(&["v1", "agent", "service", "register"])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://consul.internal:8500/v1/agent/service/register"
        );
    }

    #[test]
    fn service_id_is_encoded_as_one_path_segment() {
        let client =
            ConsulClient::new("http://consul.internal:8500", None, Duration::from_secs(1)).unwrap();

        let request = client
            .put(&["v1", "agent", "service", "deregister", "merchant-service-a/b?c#d"])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "http://consul.internal:8500/v1/agent/service/deregister/merchant-service-a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ConsulClient::new("not a url", None, Duration::from_secs(1)),
            Err(ConsulClientError::InvalidUrl { .. })
        ));
    }
}
