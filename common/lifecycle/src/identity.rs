//! Service identity and health check description sent to the registry.

/// Instance identifier used when the host does not provide one.
pub const DEFAULT_HOST_ID: &str = "local";

/// Identifies one running instance of the service to the registry.
///
/// The id is derived from the service name and host identifier, so a process restarted on
/// the same host re-registers under the same id and overwrites its previous entry. It is
/// computed once in [`ServiceIdentity::new`] and cannot be changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceIdentity {
    id: String,
    name: String,
    address: String,
    port: u16,
}

impl ServiceIdentity {
    /// Build an identity. An empty `host_id` falls back to [`DEFAULT_HOST_ID`].
    pub fn new(name: &str, host_id: Option<&str>, address: &str, port: u16) -> Self {
        let host = host_id
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOST_ID);
        Self {
            id: format!("{name}-{host}"),
            name: name.to_owned(),
            address: address.to_owned(),
            port,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Absolute URL the registry polls for this instance's health.
    pub fn health_url(&self, check: &HealthCheckSpec) -> String {
        format!("http://{}:{}{}", self.address, self.port, check.path)
    }
}

/// Health check parameters, passed unmodified to the registry at registration time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthCheckSpec {
    pub path: String,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub deregister_after_seconds: u64,
}

impl Default for HealthCheckSpec {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            interval_seconds: 10,
            timeout_seconds: 5,
            deregister_after_seconds: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_name_and_host() {
        let identity = ServiceIdentity::new("merchant-service", Some("pod-7"), "10.0.0.4", 3000);
        assert_eq!(identity.id(), "merchant-service-pod-7");
        assert_eq!(identity.name(), "merchant-service");
        assert_eq!(identity.port(), 3000);
    }

    #[test]
    fn missing_or_blank_host_falls_back_to_local() {
        let missing = ServiceIdentity::new("merchant-service", None, "localhost", 3000);
        let blank = ServiceIdentity::new("merchant-service", Some("  "), "localhost", 3000);
        assert_eq!(missing.id(), "merchant-service-local");
        assert_eq!(blank.id(), missing.id());
    }

    #[test]
    fn same_inputs_give_same_id_across_restarts() {
        let first = ServiceIdentity::new("merchant-service", Some("host-a"), "a", 1);
        let second = ServiceIdentity::new("merchant-service", Some("host-a"), "b", 2);
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn health_url_uses_advertised_address() {
        let identity = ServiceIdentity::new("merchant-service", None, "merchant.internal", 3000);
        let check = HealthCheckSpec::default();
        assert_eq!(
            identity.health_url(&check),
            "http://merchant.internal:3000/health"
        );
    }
}
