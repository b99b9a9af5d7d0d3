use crate::config::ConnectionConfig;
use crate::db::provider::{ConnectionProvider, SqlConnection};
use crate::error::HdbError;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

struct GuardedState<C> {
    config: Option<ConnectionConfig>,
    conn: Option<C>,
}

/// Owns the connection config and the single live connection.
///
/// Every lifecycle operation and every reconfiguration holds the lock for
/// its whole duration, so operations never interleave on the handle.
pub struct ConnectionGuard<P: ConnectionProvider> {
    provider: P,
    state: Mutex<GuardedState<P::Connection>>,
}

impl<P: ConnectionProvider> ConnectionGuard<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            state: Mutex::new(GuardedState {
                config: None,
                conn: None,
            }),
        }
    }

    pub async fn lock(&self) -> Lease<'_, P> {
        Lease {
            provider: &self.provider,
            state: self.state.lock().await,
        }
    }
}

/// Exclusive access to the connection; released on drop.
pub struct Lease<'a, P: ConnectionProvider> {
    provider: &'a P,
    state: MutexGuard<'a, GuardedState<P::Connection>>,
}

impl<P: ConnectionProvider> Lease<'_, P> {
    /// Replace the config, closing any connection opened from the old one.
    pub async fn reconfigure(&mut self, config: ConnectionConfig) {
        self.close().await;
        self.state.config = Some(config);
    }

    /// The live connection, opened lazily and reopened if its health check fails.
    pub async fn connection(&mut self) -> Result<&P::Connection, HdbError> {
        let stale = match self.state.conn.as_ref() {
            Some(conn) => match conn.ping().await {
                Ok(()) => false,
                Err(e) => {
                    let secrets = self
                        .state
                        .config
                        .as_ref()
                        .map(ConnectionConfig::secrets)
                        .unwrap_or_default();
                    let e = e.redact(&secrets);
                    warn!(error = %e, "connection failed health check; reopening");
                    true
                }
            },
            None => false,
        };
        if stale {
            if let Some(conn) = self.state.conn.take() {
                conn.close().await;
            }
        }

        if self.state.conn.is_none() {
            let Some(config) = self.state.config.as_ref() else {
                return Err(HdbError::Connection(
                    "plugin has not been initialized".to_string(),
                ));
            };
            let conn = self.provider.connect(config).await?;
            debug!(url = %config.redacted_url(), "connection opened");
            self.state.conn = Some(conn);
        }

        self.state
            .conn
            .as_ref()
            .ok_or_else(|| HdbError::Connection("connection unavailable".to_string()))
    }

    /// Open (if needed) and health-check the connection.
    pub async fn verify(&mut self) -> Result<(), HdbError> {
        let conn = self.connection().await?;
        conn.ping().await
    }

    pub async fn close(&mut self) {
        if let Some(conn) = self.state.conn.take() {
            conn.close().await;
            info!("connection closed");
        }
    }
}
