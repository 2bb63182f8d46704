//! Service lifecycle: ordered startup (store, schema repair, listener, registry), a single
//! shutdown channel fed by SIGINT/SIGTERM, and teardown in reverse acquisition order.
//! Components sit behind traits so the ordering and failure policy can be exercised with fakes.

mod component;
mod error;
mod identity;
mod metrics;
mod orchestrator;
mod phase;
mod readiness;
mod signals;

pub use component::{
    ConnectionState, Listener, MigrationGuard, MigrationOutcome, RegistryClient, StoreConnector,
};
pub use error::{BoxError, ConnectionError, LifecycleError, ListenerError, RegistryError};
pub use identity::{HealthCheckSpec, ServiceIdentity, DEFAULT_HOST_ID};
pub use orchestrator::{Orchestrator, OrchestratorOptions, ShutdownReport};
pub use phase::LifecyclePhase;
pub use readiness::ReadinessHandler;
pub use signals::{ShutdownSignal, SignalHandler};
