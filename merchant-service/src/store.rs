use std::time::Duration;

use async_trait::async_trait;
use lifecycle::{ConnectionError, ConnectionState, StoreConnector};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

/// Postgres connection pool behind the [`StoreConnector`] contract.
pub struct PgStoreConnector {
    max_connections: u32,
    acquire_timeout: Duration,
    pool: Option<PgPool>,
    state: ConnectionState,
}

impl PgStoreConnector {
    pub fn new(max_connections: u32, acquire_timeout: Duration) -> Self {
        Self {
            max_connections,
            acquire_timeout,
            pool: None,
            state: ConnectionState::Disconnected,
        }
    }
}

#[async_trait]
impl StoreConnector for PgStoreConnector {
    type Handle = PgPool;

    async fn connect(&mut self, uri: &str) -> Result<PgPool, ConnectionError> {
        self.state = ConnectionState::Connecting;

        // `connect` opens one connection up front, so bad credentials and unreachable
        // hosts surface here instead of on the first query.
        let connect = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(uri);

        // A server that accepts the socket but never answers the startup handshake is not
        // covered by `acquire_timeout`, so bound the whole connect here too.
        let result = match tokio::time::timeout(self.acquire_timeout, connect).await {
            Ok(result) => result.map_err(classify_connect_error),
            Err(_) => Err(ConnectionError::Timeout(self.acquire_timeout)),
        };

        match result {
            Ok(pool) => {
                self.pool = Some(pool.clone());
                self.state = ConnectionState::Connected;
                Ok(pool)
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    async fn close(&mut self) {
        match self.pool.take() {
            Some(pool) => pool.close().await,
            None => debug!("store already disconnected, nothing to close"),
        }
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

fn classify_connect_error(e: sqlx::Error) -> ConnectionError {
    match e {
        sqlx::Error::Database(_) | sqlx::Error::Configuration(_) => {
            ConnectionError::Rejected(Box::new(e))
        }
        other => ConnectionError::Unreachable(Box::new(other)),
    }
}
