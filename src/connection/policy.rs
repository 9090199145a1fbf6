use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::{Result, StoreError};

/// Retry and circuit-breaker settings for establishing a store connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Attempts per connection cycle, including the first one.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Draw each delay uniformly from `[backoff / 2, backoff]`.
    pub jitter: bool,
    /// Consecutive exhausted cycles that open the circuit. Zero disables the breaker.
    pub breaker_threshold: u32,
    pub breaker_cooldown_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 100,
            max_backoff_ms: 5_000,
            jitter: true,
            breaker_threshold: 3,
            breaker_cooldown_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    /// Single attempt, no waiting, no breaker.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter: false,
            breaker_threshold: 0,
            breaker_cooldown_ms: 0,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.base_backoff_ms = base_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_breaker(mut self, threshold: u32, cooldown_ms: u64) -> Self {
        self.breaker_threshold = threshold;
        self.breaker_cooldown_ms = cooldown_ms;
        self
    }

    /// Un-jittered delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let base = self.base_backoff_ms.max(1);
        let cap = self.max_backoff_ms.max(base);

        let mut backoff = base;
        for _ in 1..attempt {
            backoff = backoff.saturating_mul(2).min(cap);
        }
        backoff
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        if self.base_backoff_ms == 0 {
            return Duration::ZERO;
        }

        let backoff = self.backoff_ms(attempt);
        let millis = if self.jitter {
            rand::thread_rng().gen_range(backoff / 2..=backoff)
        } else {
            backoff
        };
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Closed until `threshold` consecutive failures, then open for `cooldown`.
///
/// Once the cooldown has elapsed the next caller is let through as a trial;
/// a success closes the circuit, a failure re-opens it immediately.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn from_policy(policy: &ReconnectPolicy) -> Self {
        Self::new(
            policy.breaker_threshold,
            Duration::from_millis(policy.breaker_cooldown_ms),
        )
    }

    pub async fn check(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(until) = state.open_until {
            if Instant::now() < until {
                return Err(StoreError::Unavailable(
                    "circuit breaker open, failing fast".to_string(),
                ));
            }
            // half-open: one trial, a failure re-trips straight away
            state.open_until = None;
            state.consecutive_failures = self.threshold.saturating_sub(1);
            info!("store circuit breaker half-open");
        }
        Ok(())
    }

    pub async fn record_failure(&self) {
        if self.threshold == 0 {
            return;
        }

        let mut state = self.state.lock().await;
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold {
            state.open_until = Some(Instant::now() + self.cooldown);
            warn!(
                failures = state.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "store circuit breaker opened"
            );
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures = 0;
        state.open_until = None;
    }

    pub async fn is_open(&self) -> bool {
        let state = self.state.lock().await;
        state
            .open_until
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }
}

/// Runs `connect` until it succeeds or the policy is exhausted.
///
/// An exhausted cycle counts as one breaker failure and surfaces as
/// [`StoreError::Unavailable`] carrying the last error.
pub async fn connect_with_retry<T, F, Fut>(
    policy: &ReconnectPolicy,
    breaker: &CircuitBreaker,
    target: &str,
    mut connect: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    breaker.check().await?;

    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match connect().await {
            Ok(value) => {
                breaker.record_success().await;
                if attempt > 1 {
                    info!(target = target, attempt, "store connection established after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                warn!(target = target, attempt, error = %err, "store connection attempt failed");
                last_error = Some(err);
                if attempt < attempts {
                    let delay = policy.delay(attempt);
                    debug!(delay_ms = delay.as_millis() as u64, "backing off before retry");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    breaker.record_failure().await;
    Err(StoreError::Unavailable(format!(
        "{} unreachable after {} attempt(s): {}",
        target,
        attempts,
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string())
    )))
}
