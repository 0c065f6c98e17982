/// Recovery coordinator - one façade over classification, retry and circuit breaking
///
/// This module provides the recovery layer used by the pipelines:
/// - Wraps component calls with the circuit breaker for their operation key
///   and the retry engine inside it, so a breaker failure is one exhausted
///   retry sequence rather than one attempt
/// - Turns failures into serializable [`ErrorRecord`]s with a single
///   classification per error instance
/// - Decides what automated recovery can do for a recorded failure
use super::circuit_breaker::CircuitBreaker;
use super::classification::{
    ErrorCategory, ErrorClassifier, ErrorContext, ErrorSeverity, RecoveryStrategy,
};
use super::retry::{RetryEngine, RetryPolicy};
use crate::config::CheckupConfig;
use crate::CheckupError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A classified failure kept in the orchestrator's error history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub recoverable: bool,
    pub recovery_strategies: Vec<RecoveryStrategy>,
    pub remediation_steps: Vec<String>,
    /// Operation key, also the circuit breaker key
    pub operation: String,
    pub component: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub resolution: Option<String>,
}

impl ErrorRecord {
    pub fn primary_strategy(&self) -> Option<RecoveryStrategy> {
        self.recovery_strategies.first().copied()
    }
}

/// Recovery action to take for a recorded failure
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Reset the breaker for the operation so the next run calls it again
    ResetBreaker { key: String },

    /// Accept the failure and continue without the component's output
    Degrade { reason: String },

    /// Nothing automated applies; a person has to act
    Manual { steps: Vec<String> },
}

/// Recovery coordinator - main recovery entry point for the pipelines
pub struct RecoveryCoordinator {
    /// Error classifier
    classifier: ErrorClassifier,

    /// Retry engine applied inside the breaker
    retry: RetryEngine,

    /// Per-operation circuit breakers
    breakers: CircuitBreaker,
}

impl RecoveryCoordinator {
    pub fn new(config: &CheckupConfig) -> Self {
        Self::with_policy(
            config.retry.to_policy(),
            CircuitBreaker::new(config.circuit_breaker.to_breaker_config()),
        )
    }

    pub fn with_policy(policy: RetryPolicy, breakers: CircuitBreaker) -> Self {
        let classifier = ErrorClassifier::new();
        Self {
            retry: RetryEngine::new(classifier.clone(), policy),
            classifier,
            breakers,
        }
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn breakers(&self) -> &CircuitBreaker {
        &self.breakers
    }

    /// Execute an operation with retry, under the breaker keyed by
    /// `context.operation`.
    ///
    /// While the breaker is open the operation is not invoked and a
    /// [`CheckupError::CircuitOpen`] comes back inside the `anyhow` error.
    pub async fn execute_with_recovery<T, F, Fut>(
        &self,
        context: &ErrorContext,
        operation: F,
    ) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.breakers
            .execute(&context.operation, || self.retry.retry(context, operation))
            .await
    }

    /// Classify a failure returned by a collaborator and build its record.
    ///
    /// Retries already logged each attempt, so no event is emitted here.
    pub fn record(&self, error: &anyhow::Error, context: ErrorContext) -> ErrorRecord {
        let classified = self.classifier.classify(error, context);
        Self::to_record(classified)
    }

    /// Classify and log a crate error raised by the core itself
    pub fn record_checkup_error(&self, error: &CheckupError, context: ErrorContext) -> ErrorRecord {
        let classified = self.classifier.classify_checkup_error(error, context);
        self.classifier.log(&classified);
        Self::to_record(classified)
    }

    fn to_record(classified: super::classification::ClassifiedError) -> ErrorRecord {
        ErrorRecord {
            id: uuid::Uuid::new_v4().to_string(),
            category: classified.category,
            severity: classified.severity,
            recoverable: classified.recoverable,
            recovery_strategies: classified.recovery_strategies,
            remediation_steps: classified.remediation_steps,
            operation: classified.context.operation,
            component: classified.context.component,
            message: classified.message,
            timestamp: classified.context.timestamp,
            resolved: false,
            resolution: None,
        }
    }

    /// Determine the automated recovery action for a record
    pub fn determine_recovery_action(&self, record: &ErrorRecord) -> RecoveryAction {
        match record.primary_strategy() {
            Some(RecoveryStrategy::Retry) | Some(RecoveryStrategy::Fallback) => {
                RecoveryAction::ResetBreaker {
                    key: record.operation.clone(),
                }
            }
            Some(RecoveryStrategy::Skip) => RecoveryAction::Degrade {
                reason: format!(
                    "{} failure in {} skipped; continuing without its output",
                    record.category, record.operation
                ),
            },
            Some(RecoveryStrategy::Rollback)
            | Some(RecoveryStrategy::Manual)
            | Some(RecoveryStrategy::Abort)
            | None => RecoveryAction::Manual {
                steps: record.remediation_steps.clone(),
            },
        }
    }

    /// Reset one breaker
    pub fn reset_circuit_breaker(&self, key: &str) -> bool {
        self.breakers.reset(key)
    }

    /// Reset every breaker
    pub fn reset_circuit_breakers(&self) -> usize {
        self.breakers.reset_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::circuit_breaker::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn create_test_coordinator(failure_threshold: u32) -> RecoveryCoordinator {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            exponential_base: 2.0,
            jitter: false,
            retryable_categories: vec![ErrorCategory::Transfer],
        };
        let breakers = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
        });
        RecoveryCoordinator::with_policy(policy, breakers)
    }

    #[tokio::test]
    async fn test_execute_with_recovery_success() {
        let coordinator = create_test_coordinator(5);
        let context = ErrorContext::new("analyzer:quality", "/srv/project");

        let result = coordinator
            .execute_with_recovery(&context, || async { Ok::<_, anyhow::Error>(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_execute_with_recovery_retry() {
        let coordinator = create_test_coordinator(5);
        let context = ErrorContext::new("cleaner:formatter", "/srv/project");
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let result = coordinator
            .execute_with_recovery(&context, || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow::Error::new(CheckupError::Transfer("partial".into())))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_breaker_counts_exhausted_sequences() {
        let coordinator = create_test_coordinator(2);
        let context = ErrorContext::new("analyzer:broken", "/srv/project");
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        for _ in 0..2 {
            let result: anyhow::Result<()> = coordinator
                .execute_with_recovery(&context, || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::Error::new(CheckupError::Transfer("down".into())))
                })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
        assert!(coordinator.breakers().is_open("analyzer:broken"));

        let result: anyhow::Result<()> = coordinator
            .execute_with_recovery(&context, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(
            result.unwrap_err().downcast_ref::<CheckupError>(),
            Some(CheckupError::CircuitOpen { .. })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 6);

        assert_eq!(coordinator.reset_circuit_breakers(), 1);
        assert!(!coordinator.breakers().is_open("analyzer:broken"));
    }

    #[test]
    fn test_record_carries_taxonomy() {
        let coordinator = create_test_coordinator(5);
        let error = anyhow::Error::new(CheckupError::Backup("disk full".into()));
        let record = coordinator.record(
            &error,
            ErrorContext::for_component("/srv/project", "cleaner", "formatter"),
        );

        assert_eq!(record.category, ErrorCategory::Backup);
        assert_eq!(record.severity, ErrorSeverity::High);
        assert!(!record.recoverable);
        assert_eq!(record.operation, "cleaner:formatter");
        assert_eq!(record.component.as_deref(), Some("formatter"));
        assert!(!record.resolved);
    }

    #[test]
    fn test_recovery_action_types() {
        let coordinator = create_test_coordinator(5);
        let ctx = || ErrorContext::new("analyzer:imports", "/srv/project");

        let transfer = coordinator.record_checkup_error(&CheckupError::Transfer("t".into()), ctx());
        assert_eq!(
            coordinator.determine_recovery_action(&transfer),
            RecoveryAction::ResetBreaker {
                key: "analyzer:imports".to_string()
            }
        );

        let validation =
            coordinator.record_checkup_error(&CheckupError::Validation("v".into()), ctx());
        assert!(matches!(
            coordinator.determine_recovery_action(&validation),
            RecoveryAction::Degrade { .. }
        ));

        let rollback = coordinator.record_checkup_error(&CheckupError::Rollback("r".into()), ctx());
        match coordinator.determine_recovery_action(&rollback) {
            RecoveryAction::Manual { steps } => assert!(!steps.is_empty()),
            other => panic!("expected manual action, got {:?}", other),
        }
    }
}
