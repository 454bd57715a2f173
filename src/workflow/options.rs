//! Generation options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Kind of workflow a generator produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowType {
    #[default]
    Ci,
    Cd,
    Security,
    Performance,
    Testing,
    Monitoring,
    Maintenance,
    MultiEnvironment,
    Pattern,
}

impl WorkflowType {
    /// Types produced by the base generators, in suite order.
    pub const BASE: [WorkflowType; 6] = [
        Self::Ci,
        Self::Cd,
        Self::Security,
        Self::Performance,
        Self::Testing,
        Self::Monitoring,
    ];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ci => "ci",
            Self::Cd => "cd",
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Testing => "testing",
            Self::Monitoring => "monitoring",
            Self::Maintenance => "maintenance",
            Self::MultiEnvironment => "multi-environment",
            Self::Pattern => "pattern",
        }
    }

    /// Whether a single-workflow request can ask for this type.
    pub fn is_requestable(&self) -> bool {
        !matches!(self, Self::MultiEnvironment | Self::Pattern)
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ci" => Ok(Self::Ci),
            "cd" => Ok(Self::Cd),
            "security" => Ok(Self::Security),
            "performance" | "perf" => Ok(Self::Performance),
            "testing" | "test" => Ok(Self::Testing),
            "monitoring" => Ok(Self::Monitoring),
            "maintenance" => Ok(Self::Maintenance),
            "multi-environment" => Ok(Self::MultiEnvironment),
            "pattern" => Ok(Self::Pattern),
            other => Err(GenerationError::InvalidInput(format!("unknown workflow type '{other}'"))),
        }
    }
}

/// How hard generators optimize for pipeline speed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    /// No caching
    Basic,
    /// Dependency caching
    #[default]
    Standard,
    /// Caching, version matrix and cancel-in-progress concurrency
    Aggressive,
}

impl OptimizationLevel {
    /// Whether dependency caching is enabled.
    pub fn caches(&self) -> bool {
        !matches!(self, Self::Basic)
    }
}

impl FromStr for OptimizationLevel {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(GenerationError::Config(format!("unknown optimization level '{other}'"))),
        }
    }
}

/// Security posture of generated workflows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    #[default]
    Standard,
    /// Least-privilege permissions, pinned actions, mandatory audit
    Enterprise,
}

impl SecurityLevel {
    /// Whether enterprise hardening applies.
    pub fn is_enterprise(&self) -> bool {
        matches!(self, Self::Enterprise)
    }
}

impl FromStr for SecurityLevel {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(GenerationError::Config(format!("unknown security level '{other}'"))),
        }
    }
}

/// Secret and environment-file handling for deploy jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentManagement {
    /// Fail fast when a required secret is empty
    pub include_secret_validation: bool,

    /// Use OIDC role assumption instead of long-lived cloud keys
    #[serde(rename = "includeOIDC")]
    pub include_oidc: bool,

    /// Render `config/<env>.json` from environment variables
    pub include_config_generation: bool,

    /// Write `.env.<env>` files
    pub generate_env_files: bool,

    /// Infer required secrets from deployment targets and frameworks
    pub auto_detect_secrets: bool,
}

impl EnvironmentManagement {
    /// Whether any feature is on.
    pub fn any(&self) -> bool {
        self.include_secret_validation
            || self.include_oidc
            || self.include_config_generation
            || self.generate_env_files
            || self.auto_detect_secrets
    }
}

/// Runner label used when nothing else is configured.
pub const DEFAULT_RUNNER: &str = "ubuntu-latest";

/// Branch used when nothing else is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// Options for a generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    pub workflow_type: WorkflowType,
    pub optimization_level: OptimizationLevel,
    pub security_level: SecurityLevel,
    pub include_comments: bool,
    pub agent_hooks_enabled: bool,
    pub environment_management: EnvironmentManagement,
    pub runner: String,
    pub default_branch: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        GenerationOptionsBuilder::default().build()
    }
}

impl GenerationOptions {
    /// Start building options from defaults.
    pub fn builder() -> GenerationOptionsBuilder {
        GenerationOptionsBuilder::default()
    }

    /// Parse options from JSON, filling missing fields with defaults.
    pub fn from_json(input: &str) -> Result<Self, GenerationError> {
        serde_json::from_str(input).map_err(|e| GenerationError::InvalidInput(e.to_string()))
    }

    /// Same options with a different workflow type.
    #[must_use]
    pub fn for_type(&self, workflow_type: WorkflowType) -> Self {
        Self { workflow_type, ..self.clone() }
    }
}

/// Builder for [`GenerationOptions`].
#[derive(Debug, Clone)]
pub struct GenerationOptionsBuilder {
    workflow_type: WorkflowType,
    optimization_level: OptimizationLevel,
    security_level: SecurityLevel,
    include_comments: bool,
    agent_hooks_enabled: bool,
    environment_management: EnvironmentManagement,
    runner: String,
    default_branch: String,
}

impl Default for GenerationOptionsBuilder {
    fn default() -> Self {
        Self {
            workflow_type: WorkflowType::Ci,
            optimization_level: OptimizationLevel::Standard,
            security_level: SecurityLevel::Standard,
            include_comments: true,
            agent_hooks_enabled: false,
            environment_management: EnvironmentManagement::default(),
            runner: DEFAULT_RUNNER.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }
}

impl GenerationOptionsBuilder {
    #[must_use]
    pub fn workflow_type(mut self, workflow_type: WorkflowType) -> Self {
        self.workflow_type = workflow_type;
        self
    }

    #[must_use]
    pub fn optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    #[must_use]
    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    #[must_use]
    pub fn include_comments(mut self, include: bool) -> Self {
        self.include_comments = include;
        self
    }

    #[must_use]
    pub fn agent_hooks_enabled(mut self, enabled: bool) -> Self {
        self.agent_hooks_enabled = enabled;
        self
    }

    #[must_use]
    pub fn environment_management(mut self, management: EnvironmentManagement) -> Self {
        self.environment_management = management;
        self
    }

    /// Runner label for every job. Blank labels are ignored.
    #[must_use]
    pub fn runner(mut self, runner: impl Into<String>) -> Self {
        let runner = runner.into();
        if !runner.trim().is_empty() {
            self.runner = runner;
        }
        self
    }

    /// Branch that triggers pushes and deployments. Blank names are ignored.
    #[must_use]
    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        let branch = branch.into();
        if !branch.trim().is_empty() {
            self.default_branch = branch;
        }
        self
    }

    pub fn build(self) -> GenerationOptions {
        GenerationOptions {
            workflow_type: self.workflow_type,
            optimization_level: self.optimization_level,
            security_level: self.security_level,
            include_comments: self.include_comments,
            agent_hooks_enabled: self.agent_hooks_enabled,
            environment_management: self.environment_management,
            runner: self.runner,
            default_branch: self.default_branch,
        }
    }
}
