//! RedactFn - caller-supplied string redaction
//!
//! The function may be synchronous or asynchronous and may fail. A failure
//! aborts redaction of the whole event.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::ContractError;

type RedactFuture = Pin<Box<dyn Future<Output = Result<String, ContractError>> + Send>>;

/// Shared handle to a redaction function
#[derive(Clone)]
pub struct RedactFn(Arc<dyn Fn(String) -> RedactFuture + Send + Sync>);

impl RedactFn {
    /// Wrap a synchronous redaction function
    pub fn new<F, E>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self(Arc::new(move |text: String| {
            let result = f(&text).map_err(|e| ContractError::redaction(e.to_string()));
            Box::pin(std::future::ready(result)) as RedactFuture
        }))
    }

    /// Wrap an asynchronous redaction function
    pub fn from_async<F, Fut, E>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, E>> + Send + 'static,
        E: fmt::Display,
    {
        Self(Arc::new(move |text: String| {
            let fut = f(text);
            Box::pin(async move { fut.await.map_err(|e| ContractError::redaction(e.to_string())) })
                as RedactFuture
        }))
    }

    /// Redact a single string
    pub async fn call(&self, text: &str) -> Result<String, ContractError> {
        (self.0)(text.to_string()).await
    }
}

impl fmt::Debug for RedactFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RedactFn(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_fn() {
        let f = RedactFn::new(|s: &str| Ok::<_, ContractError>(s.replace("secret", "***")));
        assert_eq!(f.call("my secret").await.unwrap(), "my ***");
    }

    #[tokio::test]
    async fn test_async_fn_error_maps_to_redaction() {
        let f = RedactFn::from_async(|_s: String| async { Err::<String, _>("boom") });
        let err = f.call("x").await.unwrap_err();
        assert!(matches!(err, ContractError::Redaction { .. }));
        assert!(err.to_string().contains("boom"));
    }
}
