use crate::config::ConnectionConfig;
use crate::db::provider::{ConnectionProvider, SqlConnection, SqlTransaction};
use crate::error::HdbError;
use async_trait::async_trait;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{Any, AnyConnection, AnyPool, Connection, Executor, Transaction};
use std::str::FromStr;
use tracing::debug;

/// Opens an `sqlx` any-driver pool for the configured URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxProvider;

#[async_trait]
impl ConnectionProvider for SqlxProvider {
    type Connection = SqlxConnection;

    async fn connect(&self, config: &ConnectionConfig) -> Result<SqlxConnection, HdbError> {
        sqlx::any::install_default_drivers();

        let connect_opts =
            AnyConnectOptions::from_str(&config.render_url()).map_err(HdbError::connection)?;
        let mut pool_opts =
            AnyPoolOptions::new().max_connections(config.max_open_connections.max(1));
        if let Some(lifetime) = config.max_lifetime() {
            pool_opts = pool_opts.max_lifetime(lifetime);
        }
        let pool = pool_opts.connect_lazy_with(connect_opts);

        debug!(
            url = %config.redacted_url(),
            max_open = config.max_open_connections,
            "connection pool created"
        );
        Ok(SqlxConnection { pool })
    }
}

#[derive(Debug, Clone)]
pub struct SqlxConnection {
    pool: AnyPool,
}

#[async_trait]
impl SqlConnection for SqlxConnection {
    async fn ping(&self) -> Result<(), HdbError> {
        let mut conn = self.pool.acquire().await.map_err(HdbError::connection)?;
        conn.ping().await.map_err(HdbError::connection)
    }

    async fn begin(&self) -> Result<Box<dyn SqlTransaction>, HdbError> {
        let tx = self.pool.begin().await.map_err(HdbError::connection)?;
        Ok(Box::new(SqlxTransaction(tx)))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Dropping the inner `sqlx` transaction queues a rollback on its connection.
struct SqlxTransaction(Transaction<'static, Any>);

#[async_trait]
impl SqlTransaction for SqlxTransaction {
    async fn execute(&mut self, sql: &str) -> Result<(), HdbError> {
        // Unprepared execution: DDL such as CREATE USER cannot be prepared everywhere.
        // `Executor::execute` hands back a boxed `Send` future.
        let conn: &mut AnyConnection = &mut self.0;
        conn.execute(sqlx::raw_sql(sql))
            .await
            .map_err(HdbError::execution)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), HdbError> {
        self.0.commit().await.map_err(HdbError::execution)
    }

    async fn rollback(self: Box<Self>) -> Result<(), HdbError> {
        self.0.rollback().await.map_err(HdbError::execution)
    }
}
