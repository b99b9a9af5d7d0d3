use crate::error::HdbError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation signal carried through one lifecycle operation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// No deadline, never cancelled unless the token is.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drive `fut` until it finishes, the token fires, or the deadline passes.
    ///
    /// On abort the future is dropped, which releases any lock it holds and
    /// rolls back any open transaction.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, HdbError>
    where
        F: Future<Output = Result<T, HdbError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HdbError::Cancelled),
            _ = deadline => Err(HdbError::DeadlineExceeded),
            res = fut => res,
        }
    }
}
