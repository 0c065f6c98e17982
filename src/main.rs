use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use codebase_checkup::backup::RollbackStatus;
use codebase_checkup::config::{LoggingConfig, CONFIG_FILE_NAME};
use codebase_checkup::*;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "checkup")]
#[command(about = "Analyze a Python codebase and apply guarded, reversible cleanups")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory to check
    #[arg(short, long, global = true)]
    target: Option<PathBuf>,

    /// Configuration file (defaults to <target>/checkup.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Report what would change without touching files
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print results as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run analyzers and validators only
    Analyze,

    /// Analyze, then run the selected cleaners behind a backup
    Clean(CleanupFlags),

    /// Full checkup: analysis, optional cleanup, metrics and reports
    Full(CleanupFlags),

    /// Inspect or undo earlier cleanup runs
    Rollback {
        #[command(subcommand)]
        action: RollbackAction,
    },
}

#[derive(Args)]
struct CleanupFlags {
    /// Normalize whitespace in Python sources
    #[arg(long)]
    format: bool,

    /// Remove unused imports
    #[arg(long)]
    fix_imports: bool,

    /// Move misplaced files
    #[arg(long)]
    organize: bool,
}

#[derive(Subcommand)]
enum RollbackAction {
    /// List registered cleanup runs
    List,

    /// Restore the project from the backup of a cleanup run
    Restore {
        /// Operation id shown by `rollback list`
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let target = cli.target.clone().unwrap_or_else(|| PathBuf::from("."));
    let config_path = cli.config.clone().or_else(|| find_config_file(&target));
    let mut config = CheckupConfig::load(config_path.as_deref())
        .with_context(|| match &config_path {
            Some(path) => format!("Loading configuration from {}", path.display()),
            None => "Loading configuration from environment".to_string(),
        })?;

    if cli.target.is_some() || config_path.is_none() {
        config.target_directory = target;
    }
    if cli.dry_run {
        config.dry_run = true;
    }

    let _log_guard = init_logging(&config.logging, cli.debug)?;
    tracing::debug!(config = %config.snapshot(), "Effective configuration");

    let success = match cli.command {
        Commands::Analyze => {
            let mut orchestrator = CheckupOrchestrator::new(config);
            let analysis = orchestrator.run_analysis_only().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
            analysis.failed_components.is_empty()
        }
        Commands::Clean(flags) => {
            flags.apply(&mut config);
            let mut orchestrator = CheckupOrchestrator::new(config);
            let analysis = orchestrator.run_analysis_only().await?;
            let cleanup = orchestrator.run_cleanup_only(&analysis).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&cleanup)?);
            } else {
                print_analysis(&analysis);
                print_cleanup(&cleanup);
            }
            !cleanup.rolled_back && cleanup.validation_results.validation_passed
        }
        Commands::Full(flags) => {
            flags.apply(&mut config);
            let mut orchestrator = CheckupOrchestrator::new(config);
            let results = orchestrator.run_full_checkup().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_checkup(&results);
                print_error_summary(&orchestrator);
            }
            results.success
        }
        Commands::Rollback { action } => {
            let mut orchestrator = CheckupOrchestrator::new(config);
            handle_rollback(&mut orchestrator, action, cli.json).await?
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

impl CleanupFlags {
    fn apply(&self, config: &mut CheckupConfig) {
        config.auto_format |= self.format;
        config.auto_fix_imports |= self.fix_imports;
        config.auto_organize_files |= self.organize;
    }
}

/// `<target>/checkup.toml`, falling back to the per-user config directory
fn find_config_file(target: &Path) -> Option<PathBuf> {
    let local = target.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    ProjectDirs::from("", "", "codebase-checkup")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

/// Console logging to stderr plus an optional non-blocking file sink.
///
/// `RUST_LOG` wins over the configured level; `--debug` wins over both.
fn init_logging(logging: &LoggingConfig, debug: bool) -> Result<Option<WorkerGuard>> {
    let directive = if debug { "debug" } else { logging.level.as_str() };
    let filter = || {
        if debug {
            EnvFilter::new(directive)
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
        }
    };

    let console = if logging.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    } else {
        fmt::layer()
            .with_target(debug)
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    };

    let (file_layer, guard) = match &logging.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file has no file name: {}", path.display()))?;
            std::fs::create_dir_all(directory)
                .with_context(|| format!("Creating log directory {}", directory.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter())
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Installing tracing subscriber")?;

    Ok(guard)
}

fn print_analysis(analysis: &AnalysisResults) {
    println!("\nAnalysis");
    println!("========");
    println!("  Python files: {}", analysis.metrics.python_files);
    println!("  Total lines:  {}", analysis.metrics.total_lines);
    println!("  Issues:       {}", analysis.total_issues());
    for (kind, count) in analysis.counts_by_kind() {
        println!("    {:<14} {}", kind.to_string(), count);
    }
    if !analysis.failed_components.is_empty() {
        println!("  Failed components: {}", analysis.failed_components.join(", "));
    }
    println!(
        "  Duration:     {}",
        humantime::format_duration(round_to_millis(analysis.duration))
    );
}

fn print_cleanup(cleanup: &CleanupResults) {
    println!("\nCleanup{}", if cleanup.dry_run { " (dry run)" } else { "" });
    println!("=======");
    println!(
        "  Changes: {} planned, {} applied",
        cleanup.total_changes(),
        cleanup.successful_changes()
    );
    for outcome in &cleanup.cleaner_outcomes {
        let status = if outcome.success { "ok" } else { "FAILED" };
        println!(
            "    {:<18} {:<6} {} change(s) in {}",
            outcome.name,
            status,
            outcome.changes,
            humantime::format_duration(round_to_millis(outcome.duration))
        );
    }
    if let Some(path) = &cleanup.backup_path {
        println!("  Backup:    {}", path.display());
    }
    if let Some(id) = &cleanup.operation_id {
        println!("  Operation: {} (undo with `checkup rollback restore {}`)", id, id);
    }

    let validation = &cleanup.validation_results;
    println!(
        "  Validation: {} (risk {:?}, success rate {:.0}%)",
        if validation.validation_passed { "passed" } else { "failed" },
        validation.risk_level,
        cleanup.success_rate * 100.0
    );
    for problem in &validation.problems {
        println!("    - {}", problem);
    }
    if cleanup.rolled_back {
        println!("  Changes were rolled back");
    }
}

fn print_checkup(results: &CheckupResults) {
    println!("\nCheckup {}", results.run_id);
    print_analysis(&results.analysis);
    if let Some(cleanup) = &results.cleanup {
        print_cleanup(cleanup);
    }

    if !results.warnings.is_empty() {
        println!("\nWarnings");
        for warning in &results.warnings {
            println!("  - {}", warning);
        }
    }
    if !results.report_files.is_empty() {
        println!("\nReports");
        for (name, path) in &results.report_files {
            println!("  {:<24} {}", name, path.display());
        }
    }

    match &results.error_message {
        Some(message) => println!("\nCheckup failed: {}", message),
        None if results.success => println!(
            "\nCheckup completed in {}",
            humantime::format_duration(round_to_millis(results.duration))
        ),
        None => println!("\nCheckup completed with errors"),
    }
}

fn print_error_summary(orchestrator: &CheckupOrchestrator) {
    let summary = orchestrator.get_error_summary();
    if summary.total_errors == 0 {
        return;
    }

    println!("\nErrors: {} ({} unresolved)", summary.total_errors, summary.unresolved);
    for record in &summary.recent {
        println!("  [{}/{}] {}: {}", record.category, record.severity, record.operation, record.message);
        for step in &record.remediation_steps {
            println!("      -> {}", step);
        }
    }
}

async fn handle_rollback(
    orchestrator: &mut CheckupOrchestrator,
    action: RollbackAction,
    json: bool,
) -> Result<bool> {
    match action {
        RollbackAction::List => {
            let operations = orchestrator.list_rollback_operations()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&operations)?);
            } else if operations.is_empty() {
                println!("No cleanup runs registered");
            } else {
                for entry in &operations {
                    let status = match entry.status {
                        RollbackStatus::Registered => "registered",
                        RollbackStatus::RolledBack => "rolled back",
                    };
                    println!(
                        "{}  {}  {:<11}  {} file(s)  {}",
                        entry.operation_id,
                        entry.registered_at.format("%Y-%m-%d %H:%M:%S"),
                        status,
                        entry.affected_files.len(),
                        entry.target_directory.display()
                    );
                }
            }
            Ok(true)
        }
        RollbackAction::Restore { id } => {
            let restored = orchestrator.rollback_operation(&id).await?;
            println!("Restored {} file(s) from operation {}", restored, id);
            Ok(true)
        }
    }
}

fn round_to_millis(duration: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(duration.as_millis() as u64)
}
