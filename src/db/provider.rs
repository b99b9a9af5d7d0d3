use crate::config::ConnectionConfig;
use crate::error::HdbError;
use async_trait::async_trait;

/// Opens live connections from a connection config.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Connection: SqlConnection;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection, HdbError>;
}

/// A live handle to the target database.
#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// Health check; an error means the handle must be reopened.
    async fn ping(&self) -> Result<(), HdbError>;

    async fn begin(&self) -> Result<Box<dyn SqlTransaction>, HdbError>;

    async fn close(&self);
}

/// An open driver transaction.
///
/// Implementations must roll back when dropped without `commit`.
#[async_trait]
pub trait SqlTransaction: Send {
    async fn execute(&mut self, sql: &str) -> Result<(), HdbError>;

    async fn commit(self: Box<Self>) -> Result<(), HdbError>;

    async fn rollback(self: Box<Self>) -> Result<(), HdbError>;
}
