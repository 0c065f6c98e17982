use super::builtin::{
    ConfigValidator, FormatterCleaner, ImportAnalyzer, ImportCleaner, JsonReporter, QualityAnalyzer,
};
use super::{should_run, Analyzer, Cleaner, ComponentRole, Reporter, Validator};
use crate::config::CheckupConfig;
use std::sync::Arc;

/// Ordered collections of components per role.
///
/// Registration order is kept and is the execution order for cleaners.
pub struct ComponentRegistry {
    config: Arc<CheckupConfig>,
    analyzers: Vec<Arc<dyn Analyzer>>,
    validators: Vec<Arc<dyn Validator>>,
    cleaners: Vec<Arc<dyn Cleaner>>,
    reporters: Vec<Arc<dyn Reporter>>,
}

impl ComponentRegistry {
    pub fn new(config: Arc<CheckupConfig>) -> Self {
        Self {
            config,
            analyzers: Vec::new(),
            validators: Vec::new(),
            cleaners: Vec::new(),
            reporters: Vec::new(),
        }
    }

    /// Registry holding the built-in components
    pub fn with_builtin_components(config: Arc<CheckupConfig>) -> Self {
        let mut registry = Self::new(config);
        registry.register_analyzer(QualityAnalyzer::new);
        registry.register_analyzer(ImportAnalyzer::new);
        registry.register_validator(ConfigValidator::new);
        registry.register_cleaner(FormatterCleaner::new);
        registry.register_cleaner(ImportCleaner::new);
        registry.register_reporter(JsonReporter::new);
        registry
    }

    pub fn config(&self) -> &CheckupConfig {
        &self.config
    }

    /// Build an analyzer from the registry's configuration and append it
    pub fn register_analyzer<A, F>(&mut self, factory: F)
    where
        A: Analyzer + 'static,
        F: FnOnce(&CheckupConfig) -> A,
    {
        let analyzer = factory(&self.config);
        tracing::debug!(name = analyzer.name(), "Registered analyzer");
        self.analyzers.push(Arc::new(analyzer));
    }

    pub fn register_validator<V, F>(&mut self, factory: F)
    where
        V: Validator + 'static,
        F: FnOnce(&CheckupConfig) -> V,
    {
        let validator = factory(&self.config);
        tracing::debug!(name = validator.name(), "Registered validator");
        self.validators.push(Arc::new(validator));
    }

    pub fn register_cleaner<C, F>(&mut self, factory: F)
    where
        C: Cleaner + 'static,
        F: FnOnce(&CheckupConfig) -> C,
    {
        let cleaner = factory(&self.config);
        tracing::debug!(name = cleaner.name(), "Registered cleaner");
        self.cleaners.push(Arc::new(cleaner));
    }

    pub fn register_reporter<R, F>(&mut self, factory: F)
    where
        R: Reporter + 'static,
        F: FnOnce(&CheckupConfig) -> R,
    {
        let reporter = factory(&self.config);
        tracing::debug!(name = reporter.name(), "Registered reporter");
        self.reporters.push(Arc::new(reporter));
    }

    /// Append an already constructed analyzer
    pub fn add_analyzer(&mut self, analyzer: Arc<dyn Analyzer>) {
        self.analyzers.push(analyzer);
    }

    pub fn add_validator(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    pub fn add_cleaner(&mut self, cleaner: Arc<dyn Cleaner>) {
        self.cleaners.push(cleaner);
    }

    pub fn add_reporter(&mut self, reporter: Arc<dyn Reporter>) {
        self.reporters.push(reporter);
    }

    pub fn analyzers(&self) -> &[Arc<dyn Analyzer>] {
        &self.analyzers
    }

    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    pub fn cleaners(&self) -> &[Arc<dyn Cleaner>] {
        &self.cleaners
    }

    pub fn reporters(&self) -> &[Arc<dyn Reporter>] {
        &self.reporters
    }

    pub fn enabled_analyzers(&self) -> Vec<Arc<dyn Analyzer>> {
        self.analyzers
            .iter()
            .filter(|a| should_run(ComponentRole::Analyzer, a.kind(), &self.config))
            .cloned()
            .collect()
    }

    pub fn enabled_validators(&self) -> Vec<Arc<dyn Validator>> {
        self.validators
            .iter()
            .filter(|v| should_run(ComponentRole::Validator, v.kind(), &self.config))
            .cloned()
            .collect()
    }

    pub fn enabled_cleaners(&self) -> Vec<Arc<dyn Cleaner>> {
        self.cleaners
            .iter()
            .filter(|c| should_run(ComponentRole::Cleaner, c.kind(), &self.config))
            .cloned()
            .collect()
    }

    pub fn enabled_reporters(&self) -> Vec<Arc<dyn Reporter>> {
        self.reporters
            .iter()
            .filter(|r| should_run(ComponentRole::Reporter, r.kind(), &self.config))
            .cloned()
            .collect()
    }
}
