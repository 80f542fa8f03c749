use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::error::{NetworkError, TransportErrorCode};
use crate::client::RequestExecutor;
use crate::method::HttpMethod;

/// Exponential backoff between retry attempts
///
/// Delay for attempt `n` (0-based) is `min(initial * multiplier^n, max)`,
/// plus 0-25% when `jitter` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExponentialBackoff {
    /// Delay before the first retry (default: 1s)
    #[serde(with = "crate::humantime_serde")]
    pub initial: Duration,

    /// Upper bound for a single delay (default: 1 day)
    #[serde(with = "crate::humantime_serde")]
    pub max: Duration,

    /// Growth factor per attempt (default: 2.0)
    pub multiplier: f64,

    /// Add a random 0-25% to each delay (default: false)
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: MAX_BACKOFF,
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl ExponentialBackoff {
    /// Doubling backoff starting at `initial`
    #[must_use]
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    /// 1ms initial, 100ms max, no jitter
    #[must_use]
    pub fn fast() -> Self {
        Self {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

/// Retry policy for [`Retrying`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = 1 + `max_retries`
    pub max_retries: usize,
    pub backoff: ExponentialBackoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: ExponentialBackoff::default(),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }
}

const MAX_BACKOFF: Duration = Duration::from_secs(86_400);

/// Delay before retry number `attempt + 1`
///
/// Non-finite or negative inputs are sanitized, and the result never exceeds
/// one day or `backoff.max`.
#[must_use]
pub fn calculate_backoff(backoff: &ExponentialBackoff, attempt: usize) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);

    let multiplier = if backoff.multiplier.is_finite() && backoff.multiplier >= 0.0 {
        backoff.multiplier
    } else {
        1.0
    };
    let initial = backoff.initial.as_secs_f64();
    let max = backoff.max.min(MAX_BACKOFF).as_secs_f64();

    let raw = initial * multiplier.powi(exponent);
    let secs = if raw.is_finite() { raw.clamp(0.0, max) } else { max };
    let delay = Duration::from_secs_f64(secs);

    let delay = if backoff.jitter {
        let factor = rand::rng().random_range(0.0..=0.25);
        delay + delay.mul_f64(factor)
    } else {
        delay
    };

    delay.min(Duration::from_secs_f64(max))
}

/// Retry decorator for any [`RequestExecutor`]
///
/// Retryable failures (see [`NetworkError::is_retryable`]) are retried with
/// exponential backoff until `max_retries` is exhausted; the last error is
/// returned as-is. Other failures are returned immediately. Dropping the
/// request future cancels both the in-flight attempt and any pending sleep.
///
/// Streaming requests are not decorated.
#[derive(Debug, Clone)]
pub struct Retrying<E> {
    inner: E,
    config: RetryConfig,
}

impl<E: RequestExecutor> Retrying<E> {
    /// Decorate `inner` with the default policy (3 retries, 1s doubling)
    #[must_use]
    pub fn new(inner: E) -> Self {
        Self::with_config(inner, RetryConfig::default())
    }

    #[must_use]
    pub fn with_config(inner: E, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    #[must_use]
    pub fn inner(&self) -> &E {
        &self.inner
    }

    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[async_trait]
impl<E: RequestExecutor> RequestExecutor for Retrying<E> {
    async fn perform_request<T, B>(
        &self,
        endpoint: &Endpoint,
        method: HttpMethod,
        body: Option<&B>,
    ) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync + ?Sized,
    {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= max_retries {
            match self.inner.perform_request(endpoint, method, body).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_retryable() || attempt >= max_retries {
                        return Err(err);
                    }

                    let backoff = calculate_backoff(&self.config.backoff, attempt);
                    tracing::debug!(
                        retry = attempt + 1,
                        max_retries,
                        error = %err,
                        method = %method,
                        host = endpoint.host(),
                        backoff_ms = backoff.as_millis(),
                        "Retrying request after error"
                    );
                    last_error = Some(err);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }

        Err(last_error.unwrap_or(NetworkError::Unknown {
            status_code: TransportErrorCode::Unknown.raw(),
        }))
    }
}
