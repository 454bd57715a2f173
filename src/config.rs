//! Configuration management for cicdgen.
//!
//! Loaded from `.cicdgen.toml` in the project directory, then
//! `<config_dir>/cicdgen/config.toml`, falling back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detection::DEFAULT_MIN_RELEVANCE;
use crate::engine::FailurePolicy;
use crate::error::{GenerationError, GenerationResult};
use crate::patterns::DEFAULT_MATRIX_THRESHOLD;
use crate::workflow::{
    GenerationOptions, OptimizationLevel, SecurityLevel, DEFAULT_BRANCH, DEFAULT_RUNNER,
};

/// Name of the project-local configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".cicdgen.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults for generated workflows
    pub generation: GenerationConfig,

    /// Orchestration settings
    pub engine: EngineConfig,

    /// Conflict resolution settings
    pub resolver: ResolverConfig,

    /// Advanced pattern settings
    pub patterns: PatternsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub optimization_level: OptimizationLevel,
    pub security_level: SecurityLevel,
    pub include_comments: bool,
    pub agent_hooks_enabled: bool,
    pub runner: String,
    pub default_branch: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::default(),
            security_level: SecurityLevel::default(),
            include_comments: true,
            agent_hooks_enabled: false,
            runner: DEFAULT_RUNNER.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run suite generators on worker threads
    pub parallel: bool,

    /// Upper bound on worker threads
    pub max_concurrency: usize,

    /// Per-generator time limit; none when absent
    pub generator_timeout_secs: Option<u64>,

    pub failure_policy: FailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_concurrency: num_cpus::get().max(1),
            generator_timeout_secs: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Confidence below which candidates are ignored for conflicts
    pub min_relevance: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { min_relevance: DEFAULT_MIN_RELEVANCE }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// Package count above which monorepo builds switch to matrix jobs
    pub monorepo_matrix_threshold: usize,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self { monorepo_matrix_threshold: DEFAULT_MATRIX_THRESHOLD }
    }
}

impl Config {
    /// Load configuration for a project directory.
    pub fn load(project_dir: &Path) -> GenerationResult<Self> {
        let local = project_dir.join(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::load_from_file(&local);
        }

        if let Some(global) = Self::global_path() {
            if global.exists() {
                return Self::load_from_file(&global);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> GenerationResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| GenerationError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> GenerationResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| GenerationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the user-wide configuration file.
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cicdgen").join("config.toml"))
    }

    fn validate(&self) -> GenerationResult<()> {
        if !(0.0..=1.0).contains(&self.resolver.min_relevance) {
            return Err(GenerationError::Config(format!(
                "resolver.min_relevance must be within [0, 1], got {}",
                self.resolver.min_relevance
            )));
        }
        if self.engine.max_concurrency == 0 {
            return Err(GenerationError::Config("engine.max_concurrency must be at least 1".to_string()));
        }
        if self.patterns.monorepo_matrix_threshold == 0 {
            return Err(GenerationError::Config(
                "patterns.monorepo_matrix_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Default generation options from the `[generation]` section.
    pub fn generation_options(&self) -> GenerationOptions {
        let generation = &self.generation;
        GenerationOptions::builder()
            .optimization_level(generation.optimization_level)
            .security_level(generation.security_level)
            .include_comments(generation.include_comments)
            .agent_hooks_enabled(generation.agent_hooks_enabled)
            .runner(generation.runner.clone())
            .default_branch(generation.default_branch.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.engine.parallel);
        assert!(config.engine.max_concurrency >= 1);
        assert_eq!(config.resolver.min_relevance, DEFAULT_MIN_RELEVANCE);
        assert_eq!(config.patterns.monorepo_matrix_threshold, DEFAULT_MATRIX_THRESHOLD);
        assert_eq!(config.generation_options(), GenerationOptions::default());
    }

    #[test]
    fn test_config_deserialization() {
        let config = Config::from_toml(
            r#"
            [generation]
            optimization_level = "aggressive"
            security_level = "enterprise"
            default_branch = "trunk"

            [engine]
            max_concurrency = 2
            generator_timeout_secs = 5
            failure_policy = "all-or-nothing"
            "#,
        )
        .unwrap();
        assert_eq!(config.generation.optimization_level, OptimizationLevel::Aggressive);
        assert_eq!(config.engine.generator_timeout_secs, Some(5));
        assert_eq!(config.engine.failure_policy, FailurePolicy::AllOrNothing);
        assert!(config.generation.include_comments);

        let options = config.generation_options();
        assert_eq!(options.default_branch, "trunk");
        assert!(options.security_level.is_enterprise());
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_toml("[resolver]\nmin_relevance = 1.5\n").unwrap_err();
        assert_eq!(err.kind(), "config");
        let err = Config::from_toml("[engine]\nparallel = \"yes\"\n").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_load_prefers_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCAL_CONFIG_FILE), "[patterns]\nmonorepo_matrix_threshold = 4\n")
            .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.patterns.monorepo_matrix_threshold, 4);
    }
}
