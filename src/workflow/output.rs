//! Generated workflow files and their metadata.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{GenerationResult, GenerationWarning};

use super::options::WorkflowType;

/// Version recorded in metadata.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A generated workflow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutput {
    /// File name relative to `.github/workflows`
    pub filename: String,

    /// YAML text
    pub content: String,

    /// Kind of workflow
    #[serde(rename = "type")]
    pub workflow_type: WorkflowType,

    /// Provenance and diagnostics
    pub metadata: WorkflowMetadata,
}

/// Metadata attached to every output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    /// RFC 3339 timestamp of generation
    pub generated_at: String,

    pub generator_version: String,

    /// One-line summary of the resolved detection
    pub detection_summary: String,

    /// Optimizations applied (caching, matrix, ...)
    pub optimizations: Vec<String>,

    /// Recoverable issues met during generation
    pub warnings: Vec<String>,

    /// SHA-256 of `content`
    pub content_digest: String,
}

impl WorkflowOutput {
    /// Wrap rendered content with fresh metadata.
    pub fn new(
        filename: impl Into<String>,
        content: String,
        workflow_type: WorkflowType,
        detection_summary: impl Into<String>,
        notes: GenerationNotes,
    ) -> Self {
        let content_digest = digest(&content);
        Self {
            filename: filename.into(),
            content,
            workflow_type,
            metadata: WorkflowMetadata {
                generated_at: Utc::now().to_rfc3339(),
                generator_version: GENERATOR_VERSION.to_string(),
                detection_summary: detection_summary.into(),
                optimizations: notes.optimizations,
                warnings: notes.warnings.iter().map(ToString::to_string).collect(),
                content_digest,
            },
        }
    }

    /// Parse `content` back into a YAML value.
    pub fn document(&self) -> GenerationResult<serde_yaml::Value> {
        Ok(serde_yaml::from_str(&self.content)?)
    }

    /// Whether generation recorded any warning.
    pub fn has_warnings(&self) -> bool {
        !self.metadata.warnings.is_empty()
    }
}

/// Hex SHA-256 of workflow text.
pub fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Optimizations and warnings collected while building one workflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationNotes {
    pub optimizations: Vec<String>,
    pub warnings: Vec<GenerationWarning>,
}

impl GenerationNotes {
    /// Notes seeded with resolver warnings.
    pub fn with_warnings(warnings: &[GenerationWarning]) -> Self {
        Self { optimizations: Vec::new(), warnings: warnings.to_vec() }
    }

    /// Record an optimization once.
    pub fn optimization(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.optimizations.contains(&name) {
            self.optimizations.push(name);
        }
    }

    /// Record a warning once.
    pub fn warn(&mut self, warning: GenerationWarning) {
        if !self.warnings.contains(&warning) {
            tracing::debug!(kind = warning.kind(), "{}", warning);
            self.warnings.push(warning);
        }
    }

    /// Merge another set of notes.
    pub fn extend(&mut self, other: GenerationNotes) {
        for name in other.optimizations {
            self.optimization(name);
        }
        for warning in other.warnings {
            self.warn(warning);
        }
    }
}
