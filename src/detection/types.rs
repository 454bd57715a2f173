//! Detection result schema.
//!
//! Mirrors the camelCase JSON emitted by the project analyzer. Every list
//! defaults to empty so partial analyzer output still deserializes.

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, GenerationResult};

/// Structured analysis of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionResult {
    /// Detected frameworks with their category
    pub frameworks: Vec<FrameworkDetection>,

    /// Detected languages
    pub languages: Vec<LanguageDetection>,

    /// Detected build tools (webpack, maven, cargo, ...)
    pub build_tools: Vec<BuildToolDetection>,

    /// Detected package managers
    pub package_managers: Vec<PackageManagerDetection>,

    /// Detected testing frameworks
    pub testing_frameworks: Vec<TestingFrameworkDetection>,

    /// Detected deployment targets
    pub deployment_targets: Vec<DeploymentTargetDetection>,

    /// Project name, description and version
    pub project_metadata: ProjectMetadata,
}

/// A framework candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkDetection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub category: FrameworkCategory,
}

/// Category used to group competing frameworks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkCategory {
    Frontend,
    Backend,
    Fullstack,
    Mobile,
    Desktop,
    Testing,
    #[default]
    #[serde(other)]
    Other,
}

impl FrameworkCategory {
    /// Human-readable label used in warnings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend framework",
            Self::Backend => "backend framework",
            Self::Fullstack => "fullstack framework",
            Self::Mobile => "mobile framework",
            Self::Desktop => "desktop framework",
            Self::Testing => "testing framework",
            Self::Other => "framework",
        }
    }
}

/// A language candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageDetection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub primary: bool,
}

/// A build tool candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildToolDetection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    pub confidence: f64,
}

/// A package manager candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManagerDetection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_file: Option<String>,
    pub confidence: f64,
}

/// A testing framework candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestingFrameworkDetection {
    pub name: String,
    #[serde(rename = "type", default)]
    pub test_type: TestType,
    pub confidence: f64,
}

/// Level a testing framework operates at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    #[default]
    Unit,
    Integration,
    E2e,
    #[serde(other)]
    Other,
}

/// A deployment target candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTargetDetection {
    pub platform: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    pub confidence: f64,
}

/// Project identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Anything that competes for selection by confidence.
pub trait Candidate {
    /// Candidate name as reported by the analyzer.
    fn name(&self) -> &str;

    /// Confidence score in `[0, 1]`.
    fn confidence(&self) -> f64;
}

macro_rules! impl_candidate {
    ($ty:ty, $field:ident) => {
        impl Candidate for $ty {
            fn name(&self) -> &str {
                &self.$field
            }

            fn confidence(&self) -> f64 {
                self.confidence
            }
        }
    };
}

impl_candidate!(FrameworkDetection, name);
impl_candidate!(LanguageDetection, name);
impl_candidate!(BuildToolDetection, name);
impl_candidate!(PackageManagerDetection, name);
impl_candidate!(TestingFrameworkDetection, name);
impl_candidate!(DeploymentTargetDetection, platform);

impl DetectionResult {
    /// Parse a detection result from analyzer JSON.
    pub fn from_json(input: &str) -> GenerationResult<Self> {
        let value: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| GenerationError::InvalidInput(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Convert an already-parsed JSON value into a validated detection result.
    pub fn from_value(value: serde_json::Value) -> GenerationResult<Self> {
        if value.is_null() {
            return Err(GenerationError::InvalidInput("detection result is null".to_string()));
        }
        if !value.is_object() {
            return Err(GenerationError::InvalidInput(
                "detection result must be a JSON object".to_string(),
            ));
        }

        let result: Self = serde_json::from_value(value)
            .map_err(|e| GenerationError::InvalidInput(e.to_string()))?;
        result.validate()?;
        Ok(result)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> GenerationResult<()> {
        check_confidences("framework", &self.frameworks)?;
        check_confidences("language", &self.languages)?;
        check_confidences("build tool", &self.build_tools)?;
        check_confidences("package manager", &self.package_managers)?;
        check_confidences("testing framework", &self.testing_frameworks)?;
        check_confidences("deployment target", &self.deployment_targets)?;

        let primaries: Vec<&str> =
            self.languages.iter().filter(|l| l.primary).map(|l| l.name.as_str()).collect();
        if primaries.len() > 1 {
            return Err(GenerationError::InvalidInput(format!(
                "at most one primary language is allowed, found {}",
                primaries.join(", ")
            )));
        }

        Ok(())
    }

    /// Whether the analyzer found nothing usable.
    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty()
            && self.languages.is_empty()
            && self.build_tools.is_empty()
            && self.package_managers.is_empty()
            && self.testing_frameworks.is_empty()
            && self.deployment_targets.is_empty()
    }
}

fn check_confidences<T: Candidate>(kind: &str, candidates: &[T]) -> GenerationResult<()> {
    for candidate in candidates {
        let confidence = candidate.confidence();
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(GenerationError::InvalidInput(format!(
                "{kind} '{}' has confidence {confidence} outside [0, 1]",
                candidate.name()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_json() {
        let json = r#"{
            "frameworks": [
                {"name": "react", "version": "18.2.0", "confidence": 0.9,
                 "evidence": ["package.json"], "category": "frontend"}
            ],
            "languages": [{"name": "TypeScript", "confidence": 0.95, "primary": true}],
            "buildTools": [{"name": "vite", "configFile": "vite.config.ts", "confidence": 0.8}],
            "packageManagers": [{"name": "pnpm", "lockFile": "pnpm-lock.yaml", "confidence": 0.9}],
            "testingFrameworks": [{"name": "vitest", "type": "unit", "confidence": 0.7}],
            "deploymentTargets": [{"platform": "vercel", "confidence": 0.6}],
            "projectMetadata": {"name": "dashboard", "description": "Admin UI"}
        }"#;

        let result = DetectionResult::from_json(json).unwrap();
        assert_eq!(result.frameworks[0].category, FrameworkCategory::Frontend);
        assert_eq!(result.build_tools[0].config_file.as_deref(), Some("vite.config.ts"));
        assert_eq!(result.package_managers[0].lock_file.as_deref(), Some("pnpm-lock.yaml"));
        assert_eq!(result.project_metadata.name, "dashboard");
        assert!(result.languages[0].primary);
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let result = DetectionResult::from_json(r#"{"projectMetadata": {"name": "x"}}"#).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_unknown_category_maps_to_other() {
        let json = r#"{"frameworks": [{"name": "htmx", "confidence": 0.5, "category": "hypermedia"}]}"#;
        let result = DetectionResult::from_json(json).unwrap();
        assert_eq!(result.frameworks[0].category, FrameworkCategory::Other);
    }

    #[test]
    fn test_null_input_is_invalid() {
        let err = DetectionResult::from_json("null").unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput(_)));

        let err = DetectionResult::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput(_)));
    }

    #[test]
    fn test_confidence_out_of_range_is_invalid() {
        let json = r#"{"languages": [{"name": "go", "confidence": 1.5}]}"#;
        let err = DetectionResult::from_json(json).unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"));
    }

    #[test]
    fn test_two_primary_languages_is_invalid() {
        let json = r#"{"languages": [
            {"name": "go", "confidence": 0.9, "primary": true},
            {"name": "python", "confidence": 0.8, "primary": true}
        ]}"#;
        let err = DetectionResult::from_json(json).unwrap_err();
        assert!(err.to_string().contains("primary language"));
    }
}
