//! Shutdown channel and OS signal subscription.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{info, warn};

/// Process-wide "shutdown requested" flag. Closed at most once; every clone observes it.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns true only for the call that actually closed the channel,
    /// even when several callers race.
    pub fn trigger(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub fn wait(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Turns SIGINT/SIGTERM into a single shutdown request.
///
/// The first signal closes the [`ShutdownSignal`]; any later signal is absorbed and logged.
/// The handler keeps its subscription for the life of the process, so a second Ctrl-C does
/// not fall back to the default "terminate immediately" disposition mid-teardown.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown: ShutdownSignal,
}

impl SignalHandler {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self { shutdown }
    }

    /// Record a received signal. Returns true if this call started shutdown.
    pub fn notify(&self, signal_name: &str) -> bool {
        if !self.shutdown.trigger() {
            warn!(
                signal = signal_name,
                "Lifecycle: signal received, shutdown already in progress"
            );
            return false;
        }
        info!(signal = signal_name, "Lifecycle: signal received, shutting down");
        true
    }

    /// Subscribe to SIGINT and SIGTERM and spawn the task forwarding them to [`notify`](Self::notify).
    /// Fails if the OS handlers cannot be installed.
    pub fn install(self) -> std::io::Result<JoinHandle<()>> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        Ok(tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    received = interrupt.recv() => match received {
                        Some(()) => "SIGINT",
                        None => break,
                    },
                    received = terminate.recv() => match received {
                        Some(()) => "SIGTERM",
                        None => break,
                    },
                };
                self.notify(name);
            }
        }))
    }
}
