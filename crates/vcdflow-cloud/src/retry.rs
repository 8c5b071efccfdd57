//! Retry executor for remote mutations
//!
//! Every mutation against the control plane submits a task and waits for
//! it. Transient failures (busy entity, internal server error) are retried
//! with backoff until the duration budget runs out; everything else fails
//! immediately. Running out of budget is reported as
//! [`CloudError::Timeout`], never as the last business error.

use crate::error::{CloudError, ErrorClass, Result};
use crate::task::{Task, TaskWaiter};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, warn};

/// Which transient failures a call site is willing to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry only while the entity is busy
    BusyEntity,
    /// Retry while busy and on internal server errors
    BusyOrInternal,
}

impl RetryPolicy {
    pub fn should_retry(&self, class: ErrorClass) -> bool {
        match (self, class) {
            (_, ErrorClass::Terminal) => false,
            (_, ErrorClass::RetryableBusy) => true,
            (RetryPolicy::BusyOrInternal, ErrorClass::RetryableInternal) => true,
            (RetryPolicy::BusyEntity, ErrorClass::RetryableInternal) => false,
        }
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total time a single retried call may take
    pub max_duration: Duration,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(60),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_duration(max_duration: Duration) -> Self {
        Self {
            max_duration,
            ..Default::default()
        }
    }

    /// Fixed interval between attempts
    pub fn constant(interval: Duration, max_duration: Duration) -> Self {
        Self {
            max_duration,
            initial_delay: interval,
            max_delay: interval,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay before the attempt following `attempt` (0-based), capped at max_delay
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Runs remote calls under a duration budget
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Submit a task-producing mutation and wait for it, retrying both the
    /// submission and a failed completion when `policy` allows.
    pub async fn run<W, F, Fut>(
        &self,
        waiter: &W,
        policy: RetryPolicy,
        operation: &str,
        mut submit: F,
    ) -> Result<()>
    where
        W: TaskWaiter + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Task>>,
    {
        self.retry(policy, operation, || {
            let submitted = submit();
            async move {
                let task = submitted.await?;
                debug!(operation = %task.operation, href = %task.href, "Waiting for task");
                waiter.wait_task(&task).await
            }
        })
        .await
    }

    /// Retry any fallible call by the classification of its error.
    pub async fn retry<T, F, Fut>(&self, policy: RetryPolicy, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;
        let mut last_error = None;

        loop {
            let outcome = self
                .within_budget(started, attempt, operation, &mut last_error, f())
                .await?;
            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation = %operation, attempts = attempt + 1, "Succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let class = e.classification();
                    if !policy.should_retry(class) {
                        debug!(operation = %operation, error = %e, class = %class, "Not retrying");
                        return Err(e);
                    }
                    let delay = self.next_delay(started, attempt, operation, e.to_string())?;
                    warn!(
                        operation = %operation,
                        attempt = attempt + 1,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Transient error, retrying"
                    );
                    last_error = Some(e.to_string());
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Poll until `check` reports `Some`. Transient errors count as "not yet";
    /// terminal errors abort. When the budget runs out the result is a
    /// timeout naming `condition`.
    pub async fn poll<T, F, Fut>(&self, operation: &str, condition: &str, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;
        let mut last_error = None;

        loop {
            let outcome = self
                .within_budget(started, attempt, operation, &mut last_error, check())
                .await?;
            let pending = match outcome {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => condition.to_string(),
                Err(e) if RetryPolicy::BusyOrInternal.should_retry(e.classification()) => {
                    e.to_string()
                }
                Err(e) => return Err(e),
            };
            let delay = self.next_delay(started, attempt, operation, pending.clone())?;
            debug!(operation = %operation, attempt = attempt + 1, "Condition not met yet");
            last_error = Some(pending);
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Run one attempt with whatever is left of the budget. An attempt that
    /// outlives the budget (a task stuck in queued/running) is a timeout.
    async fn within_budget<T, Fut>(
        &self,
        started: Instant,
        attempt: u32,
        operation: &str,
        last_error: &mut Option<String>,
        attempt_future: Fut,
    ) -> Result<Result<T>>
    where
        Fut: Future<Output = Result<T>>,
    {
        let remaining = self.config.max_duration.saturating_sub(started.elapsed());
        match timeout(remaining, attempt_future).await {
            Ok(outcome) => Ok(outcome),
            Err(_) => {
                let last_error = last_error
                    .take()
                    .unwrap_or_else(|| "task did not finish".to_string());
                Err(self.exhausted(operation, attempt, last_error))
            }
        }
    }

    fn next_delay(
        &self,
        started: Instant,
        attempt: u32,
        operation: &str,
        last_error: String,
    ) -> Result<Duration> {
        let delay = self.config.delay_for_attempt(attempt);
        if started.elapsed() + delay > self.config.max_duration {
            return Err(self.exhausted(operation, attempt, last_error));
        }
        Ok(delay)
    }

    fn exhausted(&self, operation: &str, attempt: u32, last_error: String) -> CloudError {
        error!(
            operation = %operation,
            attempts = attempt + 1,
            budget_secs = self.config.max_duration.as_secs(),
            "Retry budget exhausted"
        );
        CloudError::Timeout {
            operation: operation.to_string(),
            budget: self.config.max_duration,
            last_error,
        }
    }
}
