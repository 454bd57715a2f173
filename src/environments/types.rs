//! Environment configuration and the artifacts derived from it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, GenerationResult};
use crate::workflow::WorkflowOutput;

/// Kind of environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentType {
    #[default]
    Development,
    Staging,
    Production,
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rollout strategy requested for an environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStrategy {
    #[default]
    Rolling,
    BlueGreen,
    Canary,
}

impl DeploymentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rolling => "rolling",
            Self::BlueGreen => "blue-green",
            Self::Canary => "canary",
        }
    }
}

impl fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deployment environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    pub name: String,

    #[serde(rename = "type", default)]
    pub environment_type: EnvironmentType,

    #[serde(default)]
    pub approval_required: bool,

    #[serde(default)]
    pub secrets: Vec<String>,

    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    #[serde(default)]
    pub deployment_strategy: DeploymentStrategy,

    #[serde(default)]
    pub rollback_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>, environment_type: EnvironmentType) -> Self {
        Self { name: name.into(), environment_type, ..Default::default() }
    }

    /// Parse a JSON array of environments.
    pub fn list_from_json(input: &str) -> GenerationResult<Vec<Self>> {
        serde_json::from_str(input)
            .map_err(|e| GenerationError::InvalidInput(format!("environments: {e}")))
    }

    #[must_use]
    pub fn with_approval(mut self) -> Self {
        self.approval_required = true;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: DeploymentStrategy) -> Self {
        self.deployment_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_rollback(mut self) -> Self {
        self.rollback_enabled = true;
        self
    }

    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secrets.push(secret.into());
        self
    }

    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn promoted_from(mut self, source: impl Into<String>) -> Self {
        self.promotion_source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn is_production(&self) -> bool {
        self.environment_type.is_production()
    }

    /// Production is always gated; other environments opt in.
    pub fn requires_approval(&self) -> bool {
        self.approval_required || self.is_production()
    }

    /// Name usable in file names and job ids.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Lowercase, with every run of other characters collapsed to `-`.
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Rolling update parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingParams {
    pub max_unavailable: String,
    pub max_surge: String,
    pub stabilization_window_seconds: u32,
}

/// Blue-green switch parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueGreenParams {
    pub pre_promotion_analysis: bool,
    pub post_promotion_analysis: bool,
    pub auto_promotion_enabled: bool,
    pub scale_down_delay_seconds: u32,
}

/// One canary step: traffic weight and the pause after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryStep {
    pub weight: u8,
    pub pause_seconds: u32,
}

/// Metrics a canary must satisfy before the next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryAnalysis {
    pub success_rate_threshold: f64,
    pub max_latency_ms: u32,
    pub interval_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryParams {
    pub steps: Vec<CanaryStep>,
    pub analysis: CanaryAnalysis,
}

/// Strategy parameters, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeploymentStrategyConfig {
    Rolling(RollingParams),
    BlueGreen(BlueGreenParams),
    Canary(CanaryParams),
}

impl DeploymentStrategyConfig {
    pub fn strategy(&self) -> DeploymentStrategy {
        match self {
            Self::Rolling(_) => DeploymentStrategy::Rolling,
            Self::BlueGreen(_) => DeploymentStrategy::BlueGreen,
            Self::Canary(_) => DeploymentStrategy::Canary,
        }
    }
}

/// Strategy chosen for an environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAssignment {
    pub environment: String,
    pub strategy: DeploymentStrategyConfig,
}

/// Manual approval required before deploying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalGate {
    pub environment: String,
    pub required_approvals: u32,
    pub approvers: Vec<String>,
}

/// Promotion from one environment to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionPipeline {
    pub source_environment: String,
    pub target_environment: String,
    pub auto_promote: bool,
    pub conditions: Vec<String>,
}

/// How an environment recovers from a bad deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackStrategy {
    Immediate,
    RedeployPrevious,
}

impl RollbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::RedeployPrevious => "redeploy-previous",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackConfig {
    pub environment: String,
    pub enabled: bool,
    pub triggers: Vec<String>,
    pub strategy: RollbackStrategy,
}

/// Everything produced for a list of environments.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiEnvResult {
    pub workflows: Vec<WorkflowOutput>,
    pub approval_gates: Vec<ApprovalGate>,
    pub strategies: Vec<StrategyAssignment>,
    pub promotions: Vec<PromotionPipeline>,
    pub rollbacks: Vec<RollbackConfig>,
    pub warnings: Vec<String>,
}

impl MultiEnvResult {
    pub fn workflow(&self, filename: &str) -> Option<&WorkflowOutput> {
        self.workflows.iter().find(|w| w.filename == filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_from_json_defaults() {
        let envs = EnvironmentConfig::list_from_json(
            r#"[
                {"name": "dev", "type": "development"},
                {"name": "prod", "type": "production", "approvalRequired": true,
                 "deploymentStrategy": "blue-green", "rollbackEnabled": true,
                 "variables": {"LOG_LEVEL": "warn"}, "promotionSource": "dev"}
            ]"#,
        )
        .unwrap();

        assert_eq!(envs.len(), 2);
        assert_eq!(envs[0].deployment_strategy, DeploymentStrategy::Rolling);
        assert!(!envs[0].approval_required);
        assert!(envs[1].is_production());
        assert_eq!(envs[1].deployment_strategy, DeploymentStrategy::BlueGreen);
        assert_eq!(envs[1].variables["LOG_LEVEL"], "warn");
        assert_eq!(envs[1].promotion_source.as_deref(), Some("dev"));
    }

    #[test]
    fn test_invalid_environment_json() {
        let err = EnvironmentConfig::list_from_json(r#"{"name": "dev"}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid-input");
    }

    #[test]
    fn test_slug() {
        assert_eq!(slugify("Production EU"), "production-eu");
        assert_eq!(slugify("  qa/Stage  "), "qa-stage");
        assert_eq!(EnvironmentConfig::new("Dev_1", EnvironmentType::Development).slug(), "dev_1");
    }

    #[test]
    fn test_strategy_config_is_tagged() {
        let config = DeploymentStrategyConfig::Rolling(RollingParams {
            max_unavailable: "25%".to_string(),
            max_surge: "25%".to_string(),
            stabilization_window_seconds: 300,
        });
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "rolling");
        assert_eq!(json["maxUnavailable"], "25%");
        assert_eq!(config.strategy(), DeploymentStrategy::Rolling);
    }
}
