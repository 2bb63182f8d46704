//! Component contracts driven by the [`Orchestrator`](crate::Orchestrator).
//!
//! Each external dependency sits behind one trait so the orchestrator's ordering and
//! failure policy never sees a concrete store, HTTP server or registry type.

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::{ConnectionError, ListenerError, RegistryError};
use crate::identity::{HealthCheckSpec, ServiceIdentity};

/// Connection state of the persistent store. Owned by the [`StoreConnector`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Classified result of one index repair attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The index did not exist, nothing to do.
    Absent,
    /// The index existed and was dropped.
    Removed,
    /// Any other failure. Logged, never fatal.
    UnexpectedError,
}

impl MigrationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationOutcome::Absent => "absent",
            MigrationOutcome::Removed => "removed",
            MigrationOutcome::UnexpectedError => "unexpected_error",
        }
    }
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opens and closes the persistent store connection.
#[async_trait]
pub trait StoreConnector: Send {
    /// Handle given to the [`MigrationGuard`] once connected.
    type Handle: Send + Sync;

    async fn connect(&mut self, uri: &str) -> Result<Self::Handle, ConnectionError>;

    /// Idempotent: closing a disconnected store is a no-op.
    async fn close(&mut self);

    fn state(&self) -> ConnectionState;
}

/// One-shot, best-effort repair of stale schema state. The signature has no error path:
/// every failure must be folded into [`MigrationOutcome::UnexpectedError`].
#[async_trait]
pub trait MigrationGuard<H: Send + Sync>: Send + Sync {
    async fn ensure_index_consistency(
        &self,
        store: &H,
        model_name: &str,
        index_name: &str,
    ) -> MigrationOutcome;
}

/// The service's network endpoint.
#[async_trait]
pub trait Listener: Send {
    /// Bind and begin accepting connections. Returns once the socket is accepting.
    async fn start(&mut self) -> Result<SocketAddr, ListenerError>;

    /// Stop accepting and drain in-flight requests. No-op if never started.
    async fn stop(&mut self);
}

/// Client side of the discovery registry. Both calls are idempotent on the registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn register(
        &self,
        identity: &ServiceIdentity,
        check: &HealthCheckSpec,
    ) -> Result<(), RegistryError>;

    async fn deregister(&self, id: &str) -> Result<(), RegistryError>;
}
