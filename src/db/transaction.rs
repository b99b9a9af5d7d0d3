//! Transactional execution of rendered statements.
//!
//! One [`Transaction`] spans exactly one logical lifecycle operation. A
//! transaction that is dropped before `commit` (early return, error, or a
//! cancelled future) is rolled back by the driver.

use crate::db::provider::{SqlConnection, SqlTransaction};
use crate::error::HdbError;
use tracing::{debug, warn};

pub struct Transaction {
    inner: Option<Box<dyn SqlTransaction>>,
    executed: usize,
}

impl Transaction {
    pub async fn begin<C: SqlConnection + ?Sized>(conn: &C) -> Result<Self, HdbError> {
        let inner = conn.begin().await?;
        debug!("transaction started");
        Ok(Self {
            inner: Some(inner),
            executed: 0,
        })
    }

    pub async fn execute(&mut self, sql: &str) -> Result<(), HdbError> {
        let Some(tx) = self.inner.as_mut() else {
            return Err(HdbError::Execution("transaction already finished".to_string()));
        };
        // Statement text and driver errors may carry secrets; log positions only.
        if let Err(e) = tx.execute(sql).await {
            warn!(statement = self.executed + 1, "statement failed");
            return Err(e);
        }
        self.executed += 1;
        Ok(())
    }

    /// Execute in order, stopping at the first failure.
    pub async fn execute_all(&mut self, statements: &[String]) -> Result<(), HdbError> {
        for sql in statements {
            self.execute(sql).await?;
        }
        Ok(())
    }

    pub async fn commit(mut self) -> Result<(), HdbError> {
        let Some(tx) = self.inner.take() else {
            return Err(HdbError::Execution("transaction already finished".to_string()));
        };
        tx.commit().await?;
        debug!(statements = self.executed, "transaction committed");
        Ok(())
    }

    pub async fn rollback(mut self) {
        if let Some(tx) = self.inner.take() {
            match tx.rollback().await {
                Ok(()) => debug!(statements = self.executed, "transaction rolled back"),
                Err(e) => warn!(error = %e, "transaction rollback failed"),
            }
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.inner.is_some() {
            debug!(
                statements = self.executed,
                "transaction dropped before commit; rolling back"
            );
        }
    }
}
