/// Configuration surface for the checkup core.
///
/// Settings are read from an optional TOML file and then overridden by
/// `CHECKUP__*` environment variables (`__` separates nested keys, e.g.
/// `CHECKUP__RETRY__MAX_ATTEMPTS=4`). Every field has a default, so an empty
/// file (or no file at all) yields [`CheckupConfig::default`].

use crate::error::classification::ErrorCategory;
use crate::error::circuit_breaker::CircuitBreakerConfig;
use crate::error::retry::RetryPolicy;
use crate::CheckupResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "CHECKUP";

/// File name looked up in the target directory by the CLI
pub const CONFIG_FILE_NAME: &str = "checkup.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckupConfig {
    pub target_directory: PathBuf,
    /// Backup root; relative paths resolve against `target_directory`
    pub backup_dir: PathBuf,
    /// Output directory for reporters; relative paths resolve against `target_directory`
    pub report_dir: PathBuf,
    pub dry_run: bool,
    pub create_backup: bool,
    pub comprehensive_backup: bool,
    pub max_file_moves: usize,
    pub ignore_patterns: Vec<String>,
    pub exclude_dirs: Vec<String>,

    // Analyzers
    pub enable_quality_analysis: bool,
    pub enable_duplicate_detection: bool,
    pub enable_import_analysis: bool,
    pub enable_structure_analysis: bool,

    // Validators
    pub check_test_coverage: bool,
    pub validate_configs: bool,
    pub check_documentation: bool,

    // Cleaners
    pub auto_format: bool,
    pub auto_fix_imports: bool,
    pub auto_organize_files: bool,

    // Reporters
    pub generate_html_report: bool,
    pub generate_json_report: bool,
    pub generate_markdown_report: bool,

    // Analysis thresholds
    pub max_line_length: usize,
    pub max_parameters: usize,
    pub min_test_coverage: f64,

    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub rollback_policy: RollbackPolicy,
    pub logging: LoggingConfig,
}

impl Default for CheckupConfig {
    fn default() -> Self {
        Self {
            target_directory: PathBuf::from("."),
            backup_dir: PathBuf::from(".checkup_backups"),
            report_dir: PathBuf::from("checkup_reports"),
            dry_run: false,
            create_backup: true,
            comprehensive_backup: false,
            max_file_moves: 50,
            ignore_patterns: vec!["*.pyc".into(), "*.pyo".into(), "*.swp".into()],
            exclude_dirs: [
                ".git",
                "__pycache__",
                ".checkup_backups",
                ".venv",
                "venv",
                "node_modules",
                ".mypy_cache",
                ".pytest_cache",
                ".tox",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            enable_quality_analysis: true,
            enable_duplicate_detection: true,
            enable_import_analysis: true,
            enable_structure_analysis: true,
            check_test_coverage: true,
            validate_configs: true,
            check_documentation: true,
            auto_format: false,
            auto_fix_imports: false,
            auto_organize_files: false,
            generate_html_report: false,
            generate_json_report: true,
            generate_markdown_report: false,
            max_line_length: 120,
            max_parameters: 5,
            min_test_coverage: 80.0,
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            rollback_policy: RollbackPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Retry tuning applied to analyzers and validators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter: bool,
    /// Empty list retries every category
    pub retryable_categories: Vec<ErrorCategory>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
            exponential_base: 2.0,
            jitter: true,
            retryable_categories: vec![
                ErrorCategory::Connectivity,
                ErrorCategory::Transfer,
                ErrorCategory::Resource,
                ErrorCategory::Database,
                ErrorCategory::Platform,
            ],
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            exponential_base: self.exponential_base,
            jitter: self.jitter,
            retryable_categories: self.retryable_categories.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout_secs: 60,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
        }
    }
}

/// Success-rate thresholds and limits that decide rollback during cleanup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackPolicy {
    /// Below this cleaner success rate the run is aborted and rolled back
    pub rollback_below_success_rate: f64,
    /// Validation requires at least this cleaner success rate
    pub validation_min_success_rate: f64,
    /// Below this rate (and above the rollback rate) risk is medium
    pub medium_risk_below_success_rate: f64,
    pub cleaner_timeout_secs: u64,
    /// Free space required relative to the estimated backup size
    pub disk_space_factor: f64,
}

impl Default for RollbackPolicy {
    fn default() -> Self {
        Self {
            rollback_below_success_rate: 0.3,
            validation_min_success_rate: 0.5,
            medium_risk_below_success_rate: 0.7,
            cleaner_timeout_secs: 300,
            disk_space_factor: 1.5,
        }
    }
}

impl RollbackPolicy {
    pub fn cleaner_timeout(&self) -> Duration {
        Duration::from_secs(self.cleaner_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    pub json: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_file: None,
        }
    }
}

impl CheckupConfig {
    /// Default configuration for a target directory
    pub fn for_target(target: impl Into<PathBuf>) -> Self {
        Self {
            target_directory: target.into(),
            ..Default::default()
        }
    }

    /// Load configuration from an optional file layered under environment overrides
    pub fn load(path: Option<&Path>) -> CheckupResult<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: CheckupConfig = builder.build()?.try_deserialize()?;
        tracing::debug!(
            target_directory = %config.target_directory.display(),
            dry_run = config.dry_run,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Check the configuration, returning every problem found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.target_directory.exists() {
            errors.push(format!(
                "Target directory does not exist: {}",
                self.target_directory.display()
            ));
        } else if !self.target_directory.is_dir() {
            errors.push(format!(
                "Target path is not a directory: {}",
                self.target_directory.display()
            ));
        }

        if self.max_line_length == 0 {
            errors.push("max_line_length must be greater than zero".to_string());
        }
        if self.max_parameters == 0 {
            errors.push("max_parameters must be greater than zero".to_string());
        }
        if !(0.0..=100.0).contains(&self.min_test_coverage) {
            errors.push(format!(
                "min_test_coverage must be between 0 and 100 (got {})",
                self.min_test_coverage
            ));
        }

        for pattern in &self.ignore_patterns {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(format!("Invalid ignore pattern '{}': {}", pattern, e));
            }
        }

        let retry = &self.retry;
        if retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if retry.exponential_base < 1.0 {
            errors.push(format!(
                "retry.exponential_base must be >= 1.0 (got {})",
                retry.exponential_base
            ));
        }
        if retry.base_delay_ms > retry.max_delay_ms {
            errors.push(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                retry.base_delay_ms, retry.max_delay_ms
            ));
        }

        let breaker = &self.circuit_breaker;
        if breaker.failure_threshold == 0 {
            errors.push("circuit_breaker.failure_threshold must be at least 1".to_string());
        }
        if breaker.success_threshold == 0 {
            errors.push("circuit_breaker.success_threshold must be at least 1".to_string());
        }

        let policy = &self.rollback_policy;
        for (name, value) in [
            (
                "rollback_policy.rollback_below_success_rate",
                policy.rollback_below_success_rate,
            ),
            (
                "rollback_policy.validation_min_success_rate",
                policy.validation_min_success_rate,
            ),
            (
                "rollback_policy.medium_risk_below_success_rate",
                policy.medium_risk_below_success_rate,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{} must be between 0 and 1 (got {})", name, value));
            }
        }
        if policy.rollback_below_success_rate > policy.validation_min_success_rate {
            errors.push(
                "rollback_policy.rollback_below_success_rate must not exceed validation_min_success_rate"
                    .to_string(),
            );
        }
        if policy.cleaner_timeout_secs == 0 {
            errors.push("rollback_policy.cleaner_timeout_secs must be greater than zero".to_string());
        }
        if policy.disk_space_factor < 1.0 {
            errors.push(format!(
                "rollback_policy.disk_space_factor must be >= 1.0 (got {})",
                policy.disk_space_factor
            ));
        }

        errors
    }

    /// True when any mutating cleaner category is switched on
    pub fn cleanup_requested(&self) -> bool {
        self.auto_format || self.auto_fix_imports || self.auto_organize_files
    }

    pub fn resolved_backup_dir(&self) -> PathBuf {
        self.resolve(&self.backup_dir)
    }

    pub fn resolved_report_dir(&self) -> PathBuf {
        self.resolve(&self.report_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.target_directory.join(path)
        }
    }

    /// Flags recorded alongside backups and emergency reports
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "target_directory": self.target_directory,
            "dry_run": self.dry_run,
            "create_backup": self.create_backup,
            "comprehensive_backup": self.comprehensive_backup,
            "auto_format": self.auto_format,
            "auto_fix_imports": self.auto_fix_imports,
            "auto_organize_files": self.auto_organize_files,
            "max_file_moves": self.max_file_moves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid_for_existing_dir() {
        let dir = TempDir::new().unwrap();
        let config = CheckupConfig::for_target(dir.path());
        assert!(config.validate().is_empty());
        assert!(!config.cleanup_requested());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = CheckupConfig::for_target("/definitely/not/here");
        config.retry.max_attempts = 0;
        config.circuit_breaker.failure_threshold = 0;
        config.rollback_policy.validation_min_success_rate = 1.5;
        config.ignore_patterns.push("[".to_string());

        let errors = config.validate();
        assert!(errors.len() >= 4, "expected every problem, got {:?}", errors);
        assert!(errors.iter().any(|e| e.contains("does not exist")));
        assert!(errors.iter().any(|e| e.contains("max_attempts")));
        assert!(errors.iter().any(|e| e.contains("failure_threshold")));
        assert!(errors.iter().any(|e| e.contains("Invalid ignore pattern")));
    }

    #[test]
    fn test_target_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.py");
        std::fs::write(&file, "x = 1\n").unwrap();

        let errors = CheckupConfig::for_target(&file).validate();
        assert!(errors.iter().any(|e| e.contains("not a directory")));
    }

    #[test]
    fn test_relative_backup_dir_resolves_against_target() {
        let config = CheckupConfig::for_target("/srv/project");
        assert_eq!(
            config.resolved_backup_dir(),
            PathBuf::from("/srv/project/.checkup_backups")
        );

        let config = CheckupConfig {
            backup_dir: PathBuf::from("/var/backups"),
            ..CheckupConfig::for_target("/srv/project")
        };
        assert_eq!(config.resolved_backup_dir(), PathBuf::from("/var/backups"));
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
target_directory = "{}"
auto_format = true
max_parameters = 7

[retry]
max_attempts = 4
retryable_categories = ["transfer"]

[rollback_policy]
cleaner_timeout_secs = 30
"#,
            dir.path().display()
        )
        .unwrap();

        let config = CheckupConfig::load(Some(&path)).unwrap();
        assert!(config.auto_format);
        assert_eq!(config.max_parameters, 7);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(
            config.retry.retryable_categories,
            vec![ErrorCategory::Transfer]
        );
        assert_eq!(config.rollback_policy.cleaner_timeout_secs, 30);
        // untouched sections keep defaults
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        std::env::set_var("CHECKUP__DRY_RUN", "true");
        std::env::set_var("CHECKUP__CIRCUIT_BREAKER__FAILURE_THRESHOLD", "9");

        let config = CheckupConfig::load(None);

        std::env::remove_var("CHECKUP__DRY_RUN");
        std::env::remove_var("CHECKUP__CIRCUIT_BREAKER__FAILURE_THRESHOLD");

        let config = config.unwrap();
        assert!(config.dry_run);
        assert_eq!(config.circuit_breaker.failure_threshold, 9);
    }

    #[test]
    fn test_retry_settings_to_policy() {
        let policy = RetrySettings::default().to_policy();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert!(policy.retryable_categories.contains(&ErrorCategory::Transfer));
    }
}
