/// Error recovery system for the checkup core
///
/// This module provides the layered error handling used by the pipelines:
/// - Error taxonomy (category, severity, recoverability, strategies)
/// - Retry strategies with exponential backoff and jitter
/// - Per-operation circuit breakers
/// - A recovery coordinator combining the three and producing error records
///
/// # Architecture
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │   Recovery Coordinator (Orchestration)│
/// └────────────────┬─────────────────────┘
///                  │
///      ┌───────────┴───────────┐
///      ↓                       ↓
/// ┌──────────────┐      ┌──────────────┐
/// │Circuit Breaker│ ───→ │ Retry Engine │
/// └──────────────┘      └──────┬───────┘
///                              ↓
///                     ┌────────────────┐
///                     │ Classification │
///                     └────────────────┘
/// ```
///
/// # Usage Example
///
/// ```rust,ignore
/// use codebase_checkup::error::{ErrorContext, RecoveryCoordinator};
/// use codebase_checkup::CheckupConfig;
///
/// let config = CheckupConfig::for_target("/srv/project");
/// let coordinator = RecoveryCoordinator::new(&config);
///
/// let context = ErrorContext::for_component("/srv/project", "analyzer", "quality_analyzer");
/// let report = coordinator
///     .execute_with_recovery(&context, || analyzer.analyze())
///     .await?;
/// ```

pub mod circuit_breaker;
pub mod classification;
pub mod recovery_coordinator;
pub mod retry;

// Re-export main types for convenience
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitStatus};
pub use classification::{
    ClassifiedError, ErrorCategory, ErrorClassifier, ErrorContext, ErrorSeverity, RecoveryStrategy,
};
pub use recovery_coordinator::{ErrorRecord, RecoveryAction, RecoveryCoordinator};
pub use retry::{RetryEngine, RetryPolicy, RetryStrategy};
