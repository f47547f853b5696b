//! Async timeout wrappers

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// How long a caller waits for a setter to run on the owning thread
pub const MUTATION_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a snapshot capture may take on the owning thread
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a client waits for a response to a request
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Run `fut`, failing with [`ProtocolError::Timeout`] if it outlives `duration`
pub async fn with_timeout<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = T>,
{
    timeout(duration, fut)
        .await
        .map_err(|_| ProtocolError::Timeout)
}

/// Like [`with_timeout`] for futures that already return a protocol [`Result`]
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    with_timeout(fut, duration).await?
}
