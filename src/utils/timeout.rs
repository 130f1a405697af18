use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Close a connection after this long without receiving any bytes
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);

/// Bound on draining the in-flight write and shutting the write half on close
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `fut`, mapping an elapsed deadline to [`ProtocolError::Timeout`].
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| ProtocolError::Timeout)?
}
