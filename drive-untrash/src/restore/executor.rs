use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use drive_core::DriveError;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::backoff::{DelayCurve, DriveCurve};

pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const AGGRESSIVE_MAX_ATTEMPTS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Retry,
    Terminal,
}

/// Decides which failures are worth another attempt and how long to wait.
pub trait RetryPolicy: Send + Sync {
    type Error: std::error::Error + Send + 'static;

    fn classify(&self, err: &Self::Error) -> Verdict;

    /// Total attempts per call, including the first one.
    fn max_attempts(&self) -> u32;

    fn delay(&self, retry: u32) -> Duration;
}

#[derive(Debug, Error)]
pub enum CallError<E> {
    #[error("{source}")]
    Terminal { source: E },
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },
    #[error("call executor is closed")]
    Closed,
}

impl<E> CallError<E> {
    pub fn last_error(&self) -> Option<&E> {
        match self {
            CallError::Terminal { source } | CallError::Exhausted { source, .. } => Some(source),
            CallError::Closed => None,
        }
    }
}

/// Retries 5xx responses and Drive rate-limit reasons.
#[derive(Clone)]
pub struct DrivePolicy {
    max_attempts: u32,
    curve: Arc<dyn DelayCurve>,
}

impl DrivePolicy {
    pub fn new(max_attempts: u32, curve: Arc<dyn DelayCurve>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            curve,
        }
    }

    pub fn standard() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Arc::new(DriveCurve::default()))
    }

    pub fn aggressive() -> Self {
        Self::new(AGGRESSIVE_MAX_ATTEMPTS, Arc::new(DriveCurve::default()))
    }
}

impl RetryPolicy for DrivePolicy {
    type Error = DriveError;

    fn classify(&self, err: &DriveError) -> Verdict {
        if err.is_retryable() {
            Verdict::Retry
        } else {
            Verdict::Terminal
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay(&self, retry: u32) -> Duration {
        self.curve.next_delay(retry)
    }
}

/// Runs remote calls under a process-wide concurrency cap and a retry policy.
///
/// A permit is held only while an attempt is in flight, so calls sleeping in
/// backoff do not starve the others.
pub struct CallExecutor<P> {
    gate: Arc<Semaphore>,
    max_connections: usize,
    policy: P,
}

impl<P: RetryPolicy> CallExecutor<P> {
    /// `max_connections` is clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn new(max_connections: usize, policy: P) -> Self {
        let max_connections = max_connections.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            gate: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            policy,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.max_connections - self.gate.available_permits()
    }

    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, CallError<P::Error>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, P::Error>>,
    {
        let max_attempts = self.policy.max_attempts().max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = {
                let _permit = self.gate.acquire().await.map_err(|_| CallError::Closed)?;
                operation().await
            };
            let err = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };
            match self.policy.classify(&err) {
                Verdict::Terminal => return Err(CallError::Terminal { source: err }),
                Verdict::Retry if attempt >= max_attempts => {
                    return Err(CallError::Exhausted {
                        attempts: attempt,
                        source: err,
                    });
                }
                Verdict::Retry => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        in_flight = self.in_flight(),
                        error = %err,
                        "retryable remote error"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
