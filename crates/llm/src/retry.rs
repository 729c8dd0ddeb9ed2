use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::{Oracle, OracleError};

/// Bounded retry with exponential backoff around another oracle.
///
/// Only [`OracleError::is_transient`] failures are retried; with
/// `max_retries == 0` the inner oracle is called exactly once.
#[derive(Debug, Clone)]
pub struct WithRetry<O> {
    inner: O,
    max_retries: u32,
    backoff: Duration,
}

impl<O> WithRetry<O> {
    pub fn new(inner: O, max_retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
        }
    }
}

#[async_trait]
impl<O: Oracle> Oracle for WithRetry<O> {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let mut delay = self.backoff;
        let mut attempt = 0;
        loop {
            match self.inner.complete(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, ?err, "oracle call failed; retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(30));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures: Mutex<Vec<OracleError>>,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: Vec<OracleError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Oracle for Flaky {
        async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failures.lock().unwrap().pop() {
                Some(err) => Err(err),
                None => Ok("ok".to_string()),
            }
        }
    }

    #[tokio::test]
    async fn no_retries_by_default() {
        let oracle = WithRetry::new(
            Flaky::new(vec![OracleError::Network("refused".into())]),
            0,
            Duration::from_millis(1),
        );
        assert!(oracle.complete("p").await.is_err());
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let oracle = WithRetry::new(
            Flaky::new(vec![
                OracleError::Timeout(Duration::from_secs(1)),
                OracleError::Network("refused".into()),
            ]),
            2,
            Duration::from_millis(1),
        );
        assert_eq!(oracle.complete("p").await.unwrap(), "ok");
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let oracle = WithRetry::new(
            Flaky::new(vec![OracleError::Status {
                status: 400,
                body: "bad request".into(),
            }]),
            3,
            Duration::from_millis(1),
        );
        assert!(matches!(
            oracle.complete("p").await,
            Err(OracleError::Status { status: 400, .. })
        ));
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let oracle = WithRetry::new(
            Flaky::new(vec![
                OracleError::Network("a".into()),
                OracleError::Network("b".into()),
                OracleError::Network("c".into()),
            ]),
            1,
            Duration::from_millis(1),
        );
        assert!(oracle.complete("p").await.is_err());
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 2);
    }
}
