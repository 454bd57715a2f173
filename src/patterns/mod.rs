//! Advanced build and deployment patterns.
//!
//! Each [`PatternConfig`] produces one workflow:
//!
//! - `monorepo` selective builds in dependency order
//! - `microservices` ordered service deployment
//! - `canary` staged traffic shifting with automated rollback
//! - `blue-green` parallel slots with a health-gated switch
//! - `feature-flags` deploy dark, then roll flags out per segment

mod graph;
mod microservices;
mod monorepo;
mod rollout;
mod types;

use tracing::{debug, info};

pub use graph::DependencyGraph;
pub use types::{
    BlueGreenConfig, CanaryConfig, CanaryStageConfig, DependencyGraphConfig, FeatureFlag,
    FeatureFlagsConfig, MetricThreshold, MicroservicesConfig, MonorepoConfig, PackageConfig,
    PatternConfig, RollbackCriteria, RolloutSegment, ServiceConfig, DEFAULT_MATRIX_THRESHOLD,
};

use crate::error::GenerationResult;
use crate::generators::GenerationContext;
use crate::workflow::WorkflowOutput;

/// Dispatches a pattern configuration to its generator.
#[derive(Debug, Clone, Copy)]
pub struct PatternGenerator {
    matrix_threshold: usize,
}

impl Default for PatternGenerator {
    fn default() -> Self {
        Self { matrix_threshold: DEFAULT_MATRIX_THRESHOLD }
    }
}

impl PatternGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Package count above which monorepo builds use matrix jobs.
    #[must_use]
    pub fn matrix_threshold(mut self, threshold: usize) -> Self {
        self.matrix_threshold = threshold.max(1);
        self
    }

    pub fn generate(
        &self,
        ctx: &GenerationContext,
        pattern: &PatternConfig,
    ) -> GenerationResult<Vec<WorkflowOutput>> {
        debug!(pattern = pattern.pattern_type(), "generating pattern workflow");
        let output = match pattern {
            PatternConfig::Monorepo(config) => monorepo::generate(ctx, config, self.matrix_threshold)?,
            PatternConfig::Microservices(config) => microservices::generate(ctx, config)?,
            PatternConfig::Canary(config) => rollout::canary(ctx, config)?,
            PatternConfig::BlueGreen(config) => rollout::blue_green(ctx, config)?,
            PatternConfig::FeatureFlags(config) => rollout::feature_flags(ctx, config)?,
        };
        info!(
            pattern = pattern.pattern_type(),
            filename = %output.filename,
            warnings = output.metadata.warnings.len(),
            "generated pattern workflow"
        );
        Ok(vec![output])
    }
}
