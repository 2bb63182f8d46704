//! Error types for lifecycle components and the orchestrator.

use std::time::Duration;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Returned by [`StoreConnector::connect`](crate::StoreConnector::connect). Always fatal to startup.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("store unreachable: {0}")]
    Unreachable(#[source] BoxError),
    #[error("store rejected the connection: {0}")]
    Rejected(#[source] BoxError),
    #[error("store connection timed out after {0:?}")]
    Timeout(Duration),
}

/// Returned by [`Listener::start`](crate::Listener::start) when the endpoint cannot be bound.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Registration and deregistration failures. Logged by the orchestrator, never fatal.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry unreachable: {0}")]
    Unreachable(#[source] BoxError),
    #[error("registry rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("registry request timed out after {0:?}")]
    Timeout(Duration),
}

/// Fatal startup failures returned by [`Orchestrator::run`](crate::Orchestrator::run).
/// Anything surfacing here maps to a nonzero process exit.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to connect to store: {0}")]
    StoreConnection(#[from] ConnectionError),

    #[error("listener failed to start: {0}")]
    ListenerBind(#[from] ListenerError),
}
