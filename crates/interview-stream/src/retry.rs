use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{ClientError, StreamError};
use crate::session::{CancelHandle, StreamSession};
use crate::stream::StreamResult;

/// Exponential retry policy for stream-producing operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Exponential multiplier per retry step.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound for computed backoff.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

const fn default_backoff_factor() -> f64 {
    2.0
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }

    pub fn exponential(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            ..Self::default()
        }
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms.max(1);
        self
    }

    pub fn can_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts.max(1)
    }

    /// Delay after `retries_done` failed retries: `base * factor^retries_done`.
    pub fn backoff_duration(&self, retries_done: u32) -> Duration {
        let exp = self.backoff_factor.powi(retries_done as i32);
        let raw = (self.base_delay_ms as f64 * exp).round() as u64;
        Duration::from_millis(raw.min(self.max_delay_ms.max(1)))
    }

    /// Whether an attempt with this outcome should be repeated.
    pub fn is_retryable(&self, outcome: &AttemptOutcome) -> bool {
        match outcome {
            AttemptOutcome::Usable(_) => false,
            AttemptOutcome::Empty => true,
            AttemptOutcome::Failed(err) => err.is_retryable(),
        }
    }
}

/// Result of one attempt inside [`retry_stream`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// At least one delta or a structured result arrived. Later failures in
    /// the same attempt are ignored.
    Usable(StreamResult),
    /// The stream completed without any usable event.
    Empty,
    /// The request or the stream failed before anything usable arrived.
    Failed(ClientError),
}

/// What an attempt produced: a session to drain, or an already complete
/// result (for endpoints that may answer without streaming).
#[derive(Debug)]
pub enum AttemptSource {
    Stream(StreamSession),
    Ready(StreamResult),
}

impl From<StreamSession> for AttemptSource {
    fn from(session: StreamSession) -> Self {
        Self::Stream(session)
    }
}

/// Runs `open` and drains its session, retrying with exponential backoff.
///
/// `open` receives the 1-based attempt number. `cancel` is observed while an
/// attempt is opening, while its session drains and during the backoff sleep;
/// a cancelled operation fails with `StreamError::Cancelled` even if content
/// had already arrived.
pub async fn retry_stream<F, Fut, S>(
    policy: &RetryPolicy,
    cancel: &CancelHandle,
    mut open: F,
) -> Result<StreamResult, ClientError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<S, ClientError>>,
    S: Into<AttemptSource>,
{
    let mut attempt = 0_u32;
    loop {
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled.into());
        }
        attempt += 1;

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StreamError::Cancelled.into()),
            opened = open(attempt) => opened,
        };
        let outcome = match opened {
            Ok(source) => run_attempt(source.into(), cancel).await,
            Err(err) => AttemptOutcome::Failed(err),
        };
        let retryable = policy.is_retryable(&outcome);
        let err = match outcome {
            AttemptOutcome::Usable(result) => {
                info!(attempt, "stream attempt produced a result");
                return Ok(result);
            }
            AttemptOutcome::Empty => {
                ClientError::from(StreamError::protocol("stream ended without usable events"))
            }
            AttemptOutcome::Failed(err) => err,
        };

        if !retryable {
            return Err(err);
        }
        if !policy.can_retry(attempt) {
            warn!(attempt, error = %err, "stream retries exhausted");
            return Err(ClientError::RetryExhausted {
                attempts: attempt,
                last_error: Box::new(err),
            });
        }

        let delay = policy.backoff_duration(attempt - 1);
        warn!(attempt, max_attempts = policy.max_attempts, delay_ms = delay.as_millis() as u64, error = %err, "stream attempt failed; retrying");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => return Err(StreamError::Cancelled.into()),
        }
    }
}

async fn run_attempt(source: AttemptSource, cancel: &CancelHandle) -> AttemptOutcome {
    let cancelled = || AttemptOutcome::Failed(StreamError::Cancelled.into());
    let session = match source {
        AttemptSource::Ready(_) if cancel.is_cancelled() => return cancelled(),
        AttemptSource::Ready(result) => return AttemptOutcome::Usable(result),
        AttemptSource::Stream(session) => session,
    };
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return cancelled(),
        outcome = session.drain() => outcome,
    };
    let error = outcome.error;
    if matches!(error, Some(StreamError::Cancelled)) || cancel.is_cancelled() {
        return cancelled();
    }
    match outcome.answer.into_result() {
        Some(result) => {
            if let Some(err) = &error {
                warn!(error = %err, "stream failed after usable content; keeping partial result");
            }
            AttemptOutcome::Usable(result)
        }
        None => match error {
            Some(err) => AttemptOutcome::Failed(err.into()),
            None => AttemptOutcome::Empty,
        },
    }
}
