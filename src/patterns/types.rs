//! Pattern configuration.

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, GenerationResult};

/// Default package count above which monorepo builds switch to matrix jobs.
pub const DEFAULT_MATRIX_THRESHOLD: usize = 10;

/// An advanced deployment or build pattern, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PatternConfig {
    Monorepo(MonorepoConfig),
    Microservices(MicroservicesConfig),
    Canary(CanaryConfig),
    BlueGreen(BlueGreenConfig),
    FeatureFlags(FeatureFlagsConfig),
}

impl PatternConfig {
    /// Every accepted `type` value.
    pub const TYPES: [&'static str; 5] =
        ["monorepo", "microservices", "canary", "blue-green", "feature-flags"];

    pub fn from_json(input: &str) -> GenerationResult<Self> {
        let value: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| GenerationError::InvalidInput(format!("pattern: {e}")))?;
        Self::from_value(value)
    }

    /// Check the `type` tag, then deserialize the variant.
    pub fn from_value(value: serde_json::Value) -> GenerationResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(GenerationError::InvalidInput(
                "pattern configuration must be a JSON object".to_string(),
            ));
        };
        let pattern_type = match object.get("type") {
            Some(serde_json::Value::String(t)) => t.clone(),
            Some(other) => return Err(GenerationError::UnsupportedPattern(other.to_string())),
            None => {
                return Err(GenerationError::InvalidInput(
                    "pattern configuration is missing 'type'".to_string(),
                ))
            }
        };
        if !Self::TYPES.contains(&pattern_type.as_str()) {
            return Err(GenerationError::UnsupportedPattern(pattern_type));
        }

        serde_json::from_value(value)
            .map_err(|e| GenerationError::InvalidInput(format!("{pattern_type} pattern: {e}")))
    }

    pub fn pattern_type(&self) -> &'static str {
        match self {
            Self::Monorepo(_) => "monorepo",
            Self::Microservices(_) => "microservices",
            Self::Canary(_) => "canary",
            Self::BlueGreen(_) => "blue-green",
            Self::FeatureFlags(_) => "feature-flags",
        }
    }
}

// ---------------------------------------------------------------------------
// monorepo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonorepoConfig {
    pub packages: Vec<PackageConfig>,
    pub dependency_graph: DependencyGraphConfig,
    /// Overrides the configured matrix threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_threshold: Option<usize>,
    /// Paths whose changes rebuild every package.
    pub shared_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageConfig {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencyGraphConfig {
    pub enabled: bool,
    pub build_order: Vec<String>,
}

// ---------------------------------------------------------------------------
// microservices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MicroservicesConfig {
    pub services: Vec<ServiceConfig>,
    /// Mesh annotating deployments, e.g. `istio` or `linkerd`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_mesh: Option<String>,
    /// Tracing backend, e.g. `jaeger` or `otel`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default = "default_health_path")]
    pub health_check_path: String,
}

fn default_health_path() -> String {
    "/health".to_string()
}

// ---------------------------------------------------------------------------
// canary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanaryConfig {
    pub stages: Vec<CanaryStageConfig>,
    /// Prometheus-style endpoint the analysis queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryStageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub percentage: u8,
    #[serde(default = "default_stage_minutes")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub rollback_criteria: RollbackCriteria,
}

fn default_stage_minutes() -> u32 {
    10
}

/// Thresholds that roll a stage back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollbackCriteria {
    /// Fraction of failed requests, 0..1.
    pub error_rate: f64,
    pub latency_p99_ms: u32,
}

impl Default for RollbackCriteria {
    fn default() -> Self {
        Self { error_rate: 0.05, latency_p99_ms: 1000 }
    }
}

// ---------------------------------------------------------------------------
// blue-green
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlueGreenConfig {
    pub health_check_path: String,
    pub warmup_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blue_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub green_url: Option<String>,
}

impl Default for BlueGreenConfig {
    fn default() -> Self {
        Self {
            health_check_path: default_health_path(),
            warmup_seconds: 30,
            blue_url: None,
            green_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// feature flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlagsConfig {
    /// Flag service, e.g. `launchdarkly`, `unleash`, `flagsmith`.
    pub provider: String,
    pub flags: Vec<FeatureFlag>,
}

impl Default for FeatureFlagsConfig {
    fn default() -> Self {
        Self { provider: "generic".to_string(), flags: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    pub name: String,
    #[serde(default)]
    pub segments: Vec<RolloutSegment>,
    #[serde(default)]
    pub rollback_triggers: Vec<MetricThreshold>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutSegment {
    pub name: String,
    pub percentage: u8,
}

/// `metric operator threshold`, e.g. `error_rate > 0.02`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricThreshold {
    pub metric: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    pub threshold: f64,
}

fn default_operator() -> String {
    ">".to_string()
}

impl MetricThreshold {
    pub fn predicate(&self) -> String {
        format!("{} {} {}", self.metric, self.operator, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_is_unsupported() {
        let err = PatternConfig::from_json(r#"{"type": "shadow", "stages": []}"#).unwrap_err();
        assert_eq!(err.kind(), "unsupported-pattern");
        assert!(err.to_string().contains("'shadow'"));
    }

    #[test]
    fn test_missing_type_and_bad_shape() {
        assert_eq!(PatternConfig::from_json(r#"{"stages": []}"#).unwrap_err().kind(), "invalid-input");
        assert_eq!(PatternConfig::from_json("[1, 2]").unwrap_err().kind(), "invalid-input");
        let err = PatternConfig::from_json(r#"{"type": "canary", "stages": "nope"}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid-input");
    }

    #[test]
    fn test_monorepo_config() {
        let config = PatternConfig::from_json(
            r#"{
                "type": "monorepo",
                "packages": [
                    {"name": "core", "path": "packages/core"},
                    {"name": "web", "path": "apps/web", "dependencies": ["core"]}
                ],
                "dependencyGraph": {"enabled": true, "buildOrder": ["core", "web"]}
            }"#,
        )
        .unwrap();
        let PatternConfig::Monorepo(monorepo) = &config else {
            panic!("expected monorepo");
        };
        assert_eq!(config.pattern_type(), "monorepo");
        assert_eq!(monorepo.packages[1].dependencies, vec!["core"]);
        assert!(monorepo.dependency_graph.enabled);
        assert!(monorepo.matrix_threshold.is_none());
    }

    #[test]
    fn test_canary_defaults() {
        let config =
            PatternConfig::from_json(r#"{"type": "canary", "stages": [{"percentage": 10}]}"#).unwrap();
        let PatternConfig::Canary(canary) = config else {
            panic!("expected canary");
        };
        assert_eq!(canary.stages[0].duration_minutes, 10);
        assert_eq!(canary.stages[0].rollback_criteria, RollbackCriteria::default());
    }

    #[test]
    fn test_metric_predicate() {
        let threshold = MetricThreshold {
            metric: "error_rate".to_string(),
            operator: ">".to_string(),
            threshold: 0.02,
        };
        assert_eq!(threshold.predicate(), "error_rate > 0.02");
    }
}
