//! Lifecycle orchestrator: ordered startup, signal-driven shutdown in reverse acquisition order.

use std::time::{Duration, Instant};

use tokio::time::{error::Elapsed, timeout};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::component::{Listener, MigrationGuard, MigrationOutcome, RegistryClient, StoreConnector};
use crate::error::{ConnectionError, LifecycleError, RegistryError};
use crate::identity::{HealthCheckSpec, ServiceIdentity};
use crate::metrics;
use crate::phase::LifecyclePhase;
use crate::signals::ShutdownSignal;

/// Options for the orchestrator; use builder methods to override the defaults.
#[derive(Clone, Debug)]
pub struct OrchestratorOptions {
    pub store_uri: String,
    pub identity: ServiceIdentity,
    pub health_check: HealthCheckSpec,
    /// Model (table) owning the stale index, used for context in logs.
    pub migration_model: String,
    pub migration_index: String,
    /// Bound on store connect and close.
    pub store_timeout: Duration,
    /// Bound on each registry call.
    pub registry_timeout: Duration,
}

impl OrchestratorOptions {
    pub fn new(identity: ServiceIdentity, store_uri: impl Into<String>) -> Self {
        Self {
            store_uri: store_uri.into(),
            identity,
            health_check: HealthCheckSpec::default(),
            migration_model: "merchants".to_string(),
            migration_index: "address_1".to_string(),
            store_timeout: Duration::from_secs(5),
            registry_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_health_check(mut self, check: HealthCheckSpec) -> Self {
        self.health_check = check;
        self
    }

    pub fn with_migration(mut self, model: impl Into<String>, index: impl Into<String>) -> Self {
        self.migration_model = model.into();
        self.migration_index = index.into();
        self
    }

    pub fn with_store_timeout(mut self, d: Duration) -> Self {
        self.store_timeout = d;
        self
    }

    pub fn with_registry_timeout(mut self, d: Duration) -> Self {
        self.registry_timeout = d;
        self
    }
}

/// What the orchestrator did, returned after a completed shutdown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Highest phase reached before shutdown began.
    pub reached: LifecyclePhase,
    pub migration: Option<MigrationOutcome>,
    /// `None` if registration was never attempted.
    pub registered: Option<bool>,
    /// `None` if deregistration was skipped.
    pub deregistered: Option<bool>,
    pub store_closed: bool,
}

impl ShutdownReport {
    fn new() -> Self {
        Self {
            reached: LifecyclePhase::Init,
            migration: None,
            registered: None,
            deregistered: None,
            store_closed: false,
        }
    }

    /// True if startup completed and every release step succeeded.
    pub fn is_clean(&self) -> bool {
        self.reached >= LifecyclePhase::Running
            && self.registered == Some(true)
            && self.deregistered == Some(true)
            && self.store_closed
    }
}

/// Drives store → migration → listener → registry at startup and the mirror image at shutdown.
///
/// Exactly one instance exists per process. [`run`](Orchestrator::run) consumes it, so the
/// teardown sequence can execute at most once no matter how many shutdown requests arrive.
pub struct Orchestrator<S, M, L, R> {
    options: OrchestratorOptions,
    store: S,
    guard: M,
    listener: L,
    registry: R,
    shutdown: ShutdownSignal,
    phase: LifecyclePhase,
    highest: LifecyclePhase,
    store_connected: bool,
    store_close_attempted: bool,
    listener_started: bool,
    registration_attempted: bool,
    report: ShutdownReport,
}

impl<S, M, L, R> Orchestrator<S, M, L, R>
where
    S: StoreConnector,
    M: MigrationGuard<S::Handle>,
    L: Listener,
    R: RegistryClient,
{
    pub fn new(
        options: OrchestratorOptions,
        store: S,
        guard: M,
        listener: L,
        registry: R,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            options,
            store,
            guard,
            listener,
            registry,
            shutdown,
            phase: LifecyclePhase::Init,
            highest: LifecyclePhase::Init,
            store_connected: false,
            store_close_attempted: false,
            listener_started: false,
            registration_attempted: false,
            report: ShutdownReport::new(),
        }
    }

    /// Run startup, wait for shutdown, tear down. `Ok` means the process should exit 0,
    /// including when registration or migration failed. `Err` is a fatal startup failure.
    pub async fn run(self) -> Result<ShutdownReport, LifecycleError> {
        let span = info_span!(
            "lifecycle",
            service = %self.options.identity.name(),
            service_id = %self.options.identity.id()
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> Result<ShutdownReport, LifecycleError> {
        self.advance(LifecyclePhase::Connecting);
        let store = match self.connect_store().await {
            Ok(store) => store,
            Err(e) => {
                // A timed-out connect future was dropped mid-flight, so the connector's own
                // state is stale; the error carries the cause.
                error!(
                    operation = "store_connect",
                    "Lifecycle: startup aborted, store connection failed: {e:#}"
                );
                self.advance(LifecyclePhase::Terminated);
                return Err(e.into());
            }
        };
        self.store_connected = true;
        info!(state = ?self.store.state(), "Lifecycle: connected to store");
        if self.shutdown_requested("store_connect") {
            drop(store);
            return Ok(self.teardown().await);
        }

        self.advance(LifecyclePhase::MigratingSchema);
        let started = Instant::now();
        let outcome = self
            .guard
            .ensure_index_consistency(
                &store,
                &self.options.migration_model,
                &self.options.migration_index,
            )
            .await;
        drop(store);
        metrics::emit_step_duration(self.name(), "migration", started.elapsed().as_secs_f64());
        metrics::emit_migration_outcome(self.name(), outcome);
        debug!(
            model = %self.options.migration_model,
            index = %self.options.migration_index,
            outcome = %outcome,
            "Lifecycle: index consistency check finished"
        );
        self.report.migration = Some(outcome);
        if self.shutdown_requested("migration") {
            return Ok(self.teardown().await);
        }

        self.advance(LifecyclePhase::Listening);
        match self.listener.start().await {
            Ok(addr) => {
                self.listener_started = true;
                info!(%addr, "Lifecycle: listener accepting connections");
            }
            Err(e) => {
                error!(
                    operation = "listener_start",
                    "Lifecycle: startup aborted, listener failed to start: {e:#}"
                );
                self.close_store().await;
                self.advance(LifecyclePhase::Terminated);
                return Err(e.into());
            }
        }
        if self.shutdown_requested("listener_start") {
            return Ok(self.teardown().await);
        }

        self.advance(LifecyclePhase::Registered);
        self.register().await;
        if self.shutdown_requested("registration") {
            return Ok(self.teardown().await);
        }

        self.advance(LifecyclePhase::Running);
        info!("Lifecycle: service running");

        let shutdown = self.shutdown.clone();
        shutdown.wait().await;
        info!(trigger_reason = "signal", "Lifecycle: shutdown initiated");

        Ok(self.teardown().await)
    }

    fn name(&self) -> &str {
        self.options.identity.name()
    }

    fn advance(&mut self, to: LifecyclePhase) {
        debug_assert!(to >= self.phase, "phase moved backwards: {} -> {to}", self.phase);
        debug!(from = %self.phase, to = %to, "Lifecycle: phase transition");
        self.phase = to;
        self.highest = self.highest.max(to);
        metrics::emit_phase(self.name(), to);
    }

    /// Cooperative safe point: true if shutdown was requested while the previous step ran.
    fn shutdown_requested(&self, after: &'static str) -> bool {
        if !self.shutdown.is_triggered() {
            return false;
        }
        info!(
            after_step = after,
            phase = %self.phase,
            "Lifecycle: shutdown requested during startup"
        );
        true
    }

    async fn connect_store(&mut self) -> Result<S::Handle, ConnectionError> {
        let limit = self.options.store_timeout;
        let started = Instant::now();
        let result = timeout(limit, self.store.connect(&self.options.store_uri))
            .await
            .unwrap_or(Err(ConnectionError::Timeout(limit)));
        metrics::emit_step_duration(self.name(), "store_connect", started.elapsed().as_secs_f64());
        result
    }

    async fn register(&mut self) {
        self.registration_attempted = true;
        let limit = self.options.registry_timeout;
        let started = Instant::now();
        let result = flatten_timeout(
            timeout(
                limit,
                self.registry
                    .register(&self.options.identity, &self.options.health_check),
            )
            .await,
            limit,
        );
        metrics::emit_step_duration(self.name(), "register", started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics::emit_registry_request(self.name(), "register", "ok");
                info!(
                    health_url = %self.options.identity.health_url(&self.options.health_check),
                    "Lifecycle: registered with service registry"
                );
                self.report.registered = Some(true);
            }
            Err(e) => {
                metrics::emit_registry_request(self.name(), "register", result_label(&e));
                warn!("Lifecycle: registration failed, serving without discovery: {e:#}");
                self.report.registered = Some(false);
            }
        }
    }

    async fn deregister(&mut self) {
        let limit = self.options.registry_timeout;
        let id = self.options.identity.id();
        let result = flatten_timeout(timeout(limit, self.registry.deregister(id)).await, limit);

        match result {
            Ok(()) => {
                metrics::emit_registry_request(self.name(), "deregister", "ok");
                info!("Lifecycle: deregistered from service registry");
                self.report.deregistered = Some(true);
            }
            Err(e) => {
                metrics::emit_registry_request(self.name(), "deregister", result_label(&e));
                warn!("Lifecycle: deregistration failed: {e:#}");
                self.report.deregistered = Some(false);
            }
        }
    }

    async fn close_store(&mut self) {
        if !self.store_connected || self.store_close_attempted {
            return;
        }
        self.store_close_attempted = true;
        let limit = self.options.store_timeout;
        match timeout(limit, self.store.close()).await {
            Ok(()) => {
                info!(state = ?self.store.state(), "Lifecycle: store connection closed");
                self.report.store_closed = true;
            }
            Err(_) => warn!(
                timeout_secs = limit.as_secs_f64(),
                "Lifecycle: store close timed out, exiting anyway"
            ),
        }
    }

    /// Undo exactly the work startup did: registry, then listener, then store.
    async fn teardown(mut self) -> ShutdownReport {
        let shutdown_clock = Instant::now();
        self.report.reached = self.highest;
        self.advance(LifecyclePhase::ShuttingDown);

        if self.registration_attempted {
            self.deregister().await;
        } else {
            debug!("Lifecycle: registration never attempted, skipping deregistration");
        }
        self.advance(LifecyclePhase::Deregistered);

        if self.listener_started {
            self.listener.stop().await;
            debug!("Lifecycle: listener stopped");
        }

        self.close_store().await;
        self.advance(LifecyclePhase::Closed);
        self.advance(LifecyclePhase::Terminated);

        let total = shutdown_clock.elapsed();
        let clean = self.report.is_clean();
        metrics::emit_shutdown_completed(self.name(), clean);
        if clean {
            info!(
                clean = true,
                total_duration_secs = total.as_secs_f64(),
                "Lifecycle: shutdown complete"
            );
        } else {
            warn!(
                clean = false,
                reached = %self.report.reached,
                total_duration_secs = total.as_secs_f64(),
                "Lifecycle: shutdown complete with skipped or failed steps"
            );
        }
        self.report
    }
}

fn flatten_timeout(
    result: Result<Result<(), RegistryError>, Elapsed>,
    limit: Duration,
) -> Result<(), RegistryError> {
    result.unwrap_or(Err(RegistryError::Timeout(limit)))
}

fn result_label(e: &RegistryError) -> &'static str {
    match e {
        RegistryError::Unreachable(_) => "unreachable",
        RegistryError::Rejected { .. } => "rejected",
        RegistryError::Timeout(_) => "timeout",
    }
}
