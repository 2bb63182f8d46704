use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use lifecycle::{Listener, ListenerError};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct RunningServer {
    stop: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

/// axum server behind the [`Listener`] contract.
///
/// The server is stopped through its own token rather than the process shutdown signal, so it
/// keeps answering health checks until the orchestrator has deregistered the instance.
pub struct HttpListener {
    bind: String,
    router: Router,
    drain_timeout: Duration,
    running: Option<RunningServer>,
}

impl HttpListener {
    pub fn new(bind: impl Into<String>, router: Router, drain_timeout: Duration) -> Self {
        Self {
            bind: bind.into(),
            router,
            drain_timeout,
            running: None,
        }
    }

    fn bind_error(&self, source: std::io::Error) -> ListenerError {
        ListenerError::Bind {
            addr: self.bind.clone(),
            source,
        }
    }
}

#[async_trait]
impl Listener for HttpListener {
    async fn start(&mut self) -> Result<SocketAddr, ListenerError> {
        let listener = TcpListener::bind(&self.bind)
            .await
            .map_err(|e| self.bind_error(e))?;
        let addr = listener.local_addr().map_err(|e| self.bind_error(e))?;

        let stop = CancellationToken::new();
        let stopped = stop.clone();
        let router = self.router.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { stopped.cancelled().await })
                .await
        });

        self.running = Some(RunningServer { stop, task });
        Ok(addr)
    }

    async fn stop(&mut self) {
        let Some(RunningServer { stop, mut task }) = self.running.take() else {
            return;
        };
        stop.cancel();

        match tokio::time::timeout(self.drain_timeout, &mut task).await {
            Ok(Ok(Ok(()))) => info!("http server drained"),
            Ok(Ok(Err(e))) => warn!("http server exited with error: {e:#}"),
            Ok(Err(e)) => warn!("http server task failed: {e:#}"),
            Err(_) => {
                warn!(
                    timeout_secs = self.drain_timeout.as_secs_f64(),
                    "http server drain timed out, aborting open connections"
                );
                task.abort();
            }
        }
    }
}
