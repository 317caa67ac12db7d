//! Connection management with bounded fixed-interval retry

use crate::{ExecOutput, RemoteExecutor, RemoteSession, RemoteSettings, Result, SshError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use stevedore_config::{PollingConfig, SupervisorConfig};
use tokio::sync::{mpsc, Mutex};

/// Bound and spacing for a fixed-interval polling loop
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Connection retry bounds from the polling configuration
    pub fn connection(polling: &PollingConfig) -> Self {
        Self::new(
            polling.connect_attempts,
            Duration::from_millis(polling.connect_interval_ms),
        )
    }
}

/// Run `op` until it succeeds, up to `policy.attempts` times with
/// `policy.interval` between attempts. Exhaustion yields a
/// [`SshError::ConnectionError`] carrying the last failure.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<SshError> = None;

    for attempt in 1..=policy.attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::debug!("{} attempt {}/{} failed: {}", what, attempt, policy.attempts, e);
                last_error = Some(e);
            }
        }
        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(SshError::ConnectionError(format!(
        "{} failed after {} attempts: {}",
        what,
        policy.attempts,
        last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string())
    )))
}

/// Owns the shared session used for polling and batched calls, and opens
/// dedicated sessions for everything that must not contend with it.
///
/// The shared session lives behind a mutex; commands hold the lock for
/// their full round trip, which serializes all callers on it. Reconnecting
/// drops the previous session before the first new attempt, so nothing
/// registered on the old transport can ever deliver twice.
pub struct ConnectionManager {
    settings: RemoteSettings,
    retry: RetryPolicy,
    shared: Mutex<Option<RemoteSession>>,
}

impl ConnectionManager {
    pub fn new(config: &SupervisorConfig) -> Result<Self> {
        let settings = RemoteSettings::from_config(
            &config.remote,
            Duration::from_millis(config.polling.connect_timeout_ms),
        )?;
        Ok(Self::with_settings(
            settings,
            RetryPolicy::connection(&config.polling),
        ))
    }

    pub fn with_settings(settings: RemoteSettings, retry: RetryPolicy) -> Self {
        Self {
            settings,
            retry,
            shared: Mutex::new(None),
        }
    }

    /// Open an independent session outside the shared one, with the same
    /// retry bounds. The caller owns it for its full lifetime.
    pub async fn open_dedicated(&self) -> Result<RemoteSession> {
        self.open_session().await
    }

    async fn open_session(&self) -> Result<RemoteSession> {
        let settings = &self.settings;
        with_retry(&self.retry, "connect", || RemoteSession::open(settings)).await
    }
}

#[async_trait]
impl RemoteExecutor for ConnectionManager {
    async fn connect(&self) -> Result<()> {
        let mut shared = self.shared.lock().await;
        if let Some(previous) = shared.take() {
            previous.close().await;
        }
        *shared = Some(self.open_session().await?);
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<ExecOutput> {
        let mut shared = self.shared.lock().await;
        if shared.is_none() {
            *shared = Some(self.open_session().await?);
        }
        let session = shared.as_mut().expect("session populated above");
        session.exec(command).await
    }

    async fn exec_once(&self, command: &str) -> Result<ExecOutput> {
        let mut session = self.open_dedicated().await?;
        let result = session.exec(command).await;
        session.close().await;
        result
    }

    async fn exec_attached(
        &self,
        command: &str,
        output: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<ExecOutput> {
        let mut session = self.open_dedicated().await?;
        let result = session.exec_streamed(command, &output).await;
        session.close().await;
        result
    }

    async fn close(&self) {
        if let Some(session) = self.shared.lock().await.take() {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(0))
    }

    #[tokio::test]
    async fn test_retry_stops_after_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(5), "connect", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SshError::ConnectionError("unreachable".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_never_exceeds_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(20), "connect", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SshError::ConnectionError("unreachable".into())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 20);
        match result {
            Err(SshError::ConnectionError(msg)) => {
                assert!(msg.contains("after 20 attempts"));
                assert!(msg.contains("unreachable"));
            }
            other => panic!("expected connection error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_last_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "connect", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(SshError::ConnectionError("unreachable".into()))
                } else {
                    Ok("ready")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ready");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
