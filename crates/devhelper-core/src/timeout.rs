use crate::error::LifecycleError;
use std::future::Future;
use std::time::Duration;

/// Run an external call under a hard deadline
pub(crate) async fn bounded<T, E, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, LifecycleError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<LifecycleError>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            tracing::warn!(operation, ?limit, "External call timed out");
            Err(LifecycleError::Timeout {
                operation,
                after: limit,
            })
        }
    }
}
