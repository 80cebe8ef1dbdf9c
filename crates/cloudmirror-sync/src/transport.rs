//! Request discipline for blob store and index calls
//!
//! Each store operation is one awaited future with exactly one request in
//! flight. [`Transport::call`] bounds it with a timeout and races it against
//! the run's [`CancellationToken`]; whichever finishes first decides the
//! outcome. There is no retry: a failed request abandons the action of the
//! key it belonged to.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Failure of a single store request
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// The run was cancelled while the request was pending
    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    /// The backend reported a failure
    #[error("{operation} failed: {cause:#}")]
    Backend {
        operation: String,
        cause: anyhow::Error,
    },
}

impl TransportError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Timeout and cancellation applied around every store request
#[derive(Debug, Clone)]
pub struct Transport {
    timeout: Duration,
    cancel: CancellationToken,
}

impl Transport {
    #[must_use]
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Await `request` under the timeout, unless cancelled first
    pub async fn call<T, F>(&self, operation: &str, request: F) -> Result<T, TransportError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled {
                operation: operation.to_string(),
            });
        }

        debug!(operation, "request issued");
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TransportError::Cancelled {
                operation: operation.to_string(),
            }),
            outcome = tokio::time::timeout(self.timeout, request) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(cause)) => Err(TransportError::Backend {
                    operation: operation.to_string(),
                    cause,
                }),
                Err(_) => Err(TransportError::Timeout {
                    operation: operation.to_string(),
                    timeout: self.timeout,
                }),
            },
        }
    }
}
