/// Retry with exponential backoff and jitter
///
/// Operations are attempted up to `max_attempts` times. Each failure is
/// classified and logged; failures whose category is not in the retryable
/// list are returned immediately, everything else sleeps
/// `min(base * exponential_base^attempt, max_delay)` (scaled by a random
/// factor in `[0.5, 1.0]` when jitter is on) and tries again.
use super::classification::{ClassifiedError, ErrorCategory, ErrorClassifier, ErrorContext};
use crate::config::RetrySettings;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Retry strategy trait
pub trait RetryStrategy: Send + Sync {
    /// Determine if another attempt should follow the failed `attempt` (zero-based)
    fn should_retry(&self, attempt: u32, error: &ClassifiedError) -> bool;

    /// Delay before the attempt following `attempt`
    fn next_delay(&self, attempt: u32) -> Duration;

    /// Maximum number of attempts, including the first
    fn max_attempts(&self) -> u32;
}

/// Exponential backoff policy with optional jitter and a category filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
    /// Empty list means every category is retryable
    pub retryable_categories: Vec<ErrorCategory>,
}

impl RetryPolicy {
    /// Single attempt, never retried
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 1.0,
            jitter: false,
            retryable_categories: Vec::new(),
        }
    }

    pub fn with_retryable(mut self, categories: Vec<ErrorCategory>) -> Self {
        self.retryable_categories = categories;
        self
    }

    pub fn is_retryable(&self, category: ErrorCategory) -> bool {
        self.retryable_categories.is_empty() || self.retryable_categories.contains(&category)
    }

    /// Capped exponential delay without jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else if capped.is_infinite() {
            self.max_delay
        } else {
            Duration::ZERO
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetrySettings::default().to_policy()
    }
}

impl RetryStrategy for RetryPolicy {
    fn should_retry(&self, attempt: u32, error: &ClassifiedError) -> bool {
        attempt + 1 < self.max_attempts && self.is_retryable(error.category)
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.backoff_delay(attempt);
        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Runs async operations under a retry strategy
pub struct RetryEngine {
    classifier: ErrorClassifier,
    strategy: Box<dyn RetryStrategy>,
}

impl RetryEngine {
    pub fn new(classifier: ErrorClassifier, policy: RetryPolicy) -> Self {
        Self::with_strategy(classifier, Box::new(policy))
    }

    pub fn with_strategy(classifier: ErrorClassifier, strategy: Box<dyn RetryStrategy>) -> Self {
        Self {
            classifier,
            strategy,
        }
    }

    pub fn strategy(&self) -> &dyn RetryStrategy {
        self.strategy.as_ref()
    }

    /// Execute `operation` until it succeeds, a non-retryable failure occurs,
    /// or attempts run out. The last error is returned unchanged.
    pub async fn retry<T, F, Fut>(&self, context: &ErrorContext, mut operation: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            operation = %context.operation,
                            attempt = attempt + 1,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let mut classified = self.classifier.classify(&error, context.clone());
                    classified.attempt = attempt;
                    self.classifier.log(&classified);

                    if !self.strategy.should_retry(attempt, &classified) {
                        if attempt + 1 >= self.strategy.max_attempts() {
                            tracing::error!(
                                operation = %context.operation,
                                attempt = attempt + 1,
                                max_attempts = self.strategy.max_attempts(),
                                "Max retry attempts reached"
                            );
                        } else {
                            tracing::debug!(
                                operation = %context.operation,
                                category = %classified.category,
                                "Failure category is not retryable"
                            );
                        }
                        return Err(error);
                    }

                    let delay = self.strategy.next_delay(attempt);
                    tracing::info!(
                        operation = %context.operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after delay"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
