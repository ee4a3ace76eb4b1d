use std::collections::HashMap;

use crate::{
    analysis::{Analyzer, LuminanceAnalyzer, SceneChangeAnalyzer},
    config::AnalysisConfig,
    error::{AnalysisError, Result},
};

type AnalyzerFactory = Box<dyn Fn(&AnalysisConfig) -> Box<dyn Analyzer> + Send + Sync>;

/// Registry for managing available analyzers
///
/// Analyzers are stateful, so the registry stores factories and hands out a
/// fresh instance per job.
pub struct AnalyzerRegistry {
    factories: HashMap<String, AnalyzerFactory>,
}

impl AnalyzerRegistry {
    /// Create a new registry with all built-in analyzers
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register("scene_change", |config| {
            Box::new(SceneChangeAnalyzer::new(config.scene_change_threshold))
        });
        registry.register("luminance", |_| Box::new(LuminanceAnalyzer::new()));

        registry
    }

    /// Register a custom analyzer under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&AnalysisConfig) -> Box<dyn Analyzer> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Get a fresh instance of an analyzer by name
    pub fn create(&self, name: &str, config: &AnalysisConfig) -> Option<Box<dyn Analyzer>> {
        self.factories.get(name).map(|factory| factory(config))
    }

    /// Instantiate every named analyzer, failing on the first unknown name
    pub fn build(&self, names: &[String], config: &AnalysisConfig) -> Result<Vec<Box<dyn Analyzer>>> {
        names
            .iter()
            .map(|name| {
                self.create(name, config).ok_or_else(|| {
                    AnalysisError::UnknownAnalyzer { name: name.clone() }.into()
                })
            })
            .collect()
    }

    /// Get all available analyzer names, sorted
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
