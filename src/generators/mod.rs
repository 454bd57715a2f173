//! Base workflow generators.
//!
//! Every generator is a unit struct implementing [`WorkflowGenerator`]. A
//! generator receives a [`GenerationContext`] holding the resolved detection
//! shared by every generator of the same call, the options, and the template
//! cache.

mod cd;
mod ci;
pub(crate) mod deploy;
mod monitoring;
pub(crate) mod performance;
mod security;
mod testing;

use std::sync::Arc;

use crate::detection::ResolvedDetection;
use crate::error::{GenerationError, GenerationResult};
use crate::hooks::DependencyUpdateHooks;
use crate::templates::{StepLibrary, TemplateCache, Toolchain};
use crate::workflow::{
    Concurrency, GenerationNotes, GenerationOptions, OptimizationLevel, Permissions, Renderer,
    Triggers, Workflow, WorkflowOutput, WorkflowType, GENERATOR_VERSION,
};

pub use cd::CdGenerator;
pub use ci::CiGenerator;
pub use deploy::{DeployPlan, DeployTarget};
pub use monitoring::MonitoringGenerator;
pub use performance::PerformanceGenerator;
pub use security::SecurityGenerator;
pub use testing::TestingGenerator;

/// Default job timeout in minutes.
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 30;

/// A generator producing one workflow file.
pub trait WorkflowGenerator: Send + Sync {
    /// Kind of workflow produced.
    fn workflow_type(&self) -> WorkflowType;

    /// Component name used in errors and logs.
    fn component(&self) -> &'static str;

    /// Generate the workflow.
    fn generate(&self, ctx: &GenerationContext) -> GenerationResult<WorkflowOutput>;
}

/// Generator for a requestable workflow type.
pub fn generator_for(workflow_type: WorkflowType) -> GenerationResult<Box<dyn WorkflowGenerator>> {
    let generator: Box<dyn WorkflowGenerator> = match workflow_type {
        WorkflowType::Ci => Box::new(CiGenerator),
        WorkflowType::Cd => Box::new(CdGenerator),
        WorkflowType::Security => Box::new(SecurityGenerator),
        WorkflowType::Performance => Box::new(PerformanceGenerator),
        WorkflowType::Testing => Box::new(TestingGenerator),
        WorkflowType::Monitoring => Box::new(MonitoringGenerator),
        WorkflowType::Maintenance => Box::new(DependencyUpdateHooks),
        WorkflowType::MultiEnvironment | WorkflowType::Pattern => {
            return Err(GenerationError::InvalidInput(format!(
                "workflow type '{workflow_type}' needs its own entry point"
            )))
        }
    };
    Ok(generator)
}

/// Everything a generator needs for one call.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    detection: Arc<ResolvedDetection>,
    toolchain: Arc<Toolchain>,
    options: GenerationOptions,
    cache: Arc<TemplateCache>,
}

impl GenerationContext {
    pub fn new(
        detection: Arc<ResolvedDetection>,
        options: GenerationOptions,
        cache: Arc<TemplateCache>,
    ) -> Self {
        let toolchain = Arc::new(Toolchain::from_detection(&detection));
        Self { detection, toolchain, options, cache }
    }

    /// Same detection and cache with different options.
    #[must_use]
    pub fn with_options(&self, options: GenerationOptions) -> Self {
        Self {
            detection: Arc::clone(&self.detection),
            toolchain: Arc::clone(&self.toolchain),
            options,
            cache: Arc::clone(&self.cache),
        }
    }

    pub fn detection(&self) -> &ResolvedDetection {
        &self.detection
    }

    pub fn shared_detection(&self) -> Arc<ResolvedDetection> {
        Arc::clone(&self.detection)
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn steps(&self) -> StepLibrary<'_> {
        StepLibrary::new(&self.toolchain, &self.cache)
    }

    /// Resolved action reference.
    pub fn action(&self, name: &str) -> String {
        self.steps().action(name)
    }

    pub fn runner(&self) -> &str {
        &self.options.runner
    }

    /// Notes seeded with resolver and toolchain warnings.
    pub fn notes(&self) -> GenerationNotes {
        let mut notes = GenerationNotes::with_warnings(&self.detection.warnings);
        for warning in &self.toolchain.warnings {
            notes.warn(warning.clone());
        }
        notes
    }

    /// Push and pull request triggers on the default branch plus manual dispatch.
    pub fn branch_triggers(&self) -> Triggers {
        let branch = self.options.default_branch.as_str();
        Triggers::default().on_push([branch]).on_pull_request([branch]).with_dispatch()
    }

    /// Apply security and concurrency settings shared by every workflow.
    pub fn harden(&self, workflow: &mut Workflow, notes: &mut GenerationNotes) {
        if self.options.security_level.is_enterprise() {
            if workflow.permissions.is_none() {
                workflow.permissions = Some(Permissions::read_contents());
            }
            notes.optimization("least-privilege-permissions");
            notes.optimization("pinned-actions");
        }
        if self.options.optimization_level == OptimizationLevel::Aggressive
            && workflow.concurrency.is_none()
        {
            let prefix = workflow.name.to_lowercase().replace(' ', "-");
            workflow.concurrency = Some(Concurrency::per_ref(&prefix, true));
            notes.optimization("concurrency-cancel-in-progress");
        }
    }

    /// Render a workflow into an output.
    pub fn finish(
        &self,
        filename: &str,
        workflow_type: WorkflowType,
        workflow: &Workflow,
        notes: GenerationNotes,
    ) -> GenerationResult<WorkflowOutput> {
        let renderer = if self.options.include_comments {
            Renderer::new()
                .comment(format!("{} - generated by cicdgen {GENERATOR_VERSION}", workflow.name))
                .comment(format!("Project: {}", self.detection.project_name()))
                .comment(format!("Detected stack: {}", self.detection.summary()))
                .comment("Regenerate instead of editing by hand.")
        } else {
            Renderer::new()
        };

        let content = renderer.render(workflow)?;
        tracing::debug!(
            workflow_type = %workflow_type,
            filename,
            jobs = workflow.jobs.len(),
            warnings = notes.warnings.len(),
            "rendered workflow"
        );
        Ok(WorkflowOutput::new(filename, content, workflow_type, self.detection.summary(), notes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{ConflictResolver, DetectionResult};
    use crate::workflow::{Job, SecurityLevel, Step};

    fn empty_context(options: GenerationOptions) -> GenerationContext {
        let resolved = ConflictResolver::new().resolve(&DetectionResult::default()).unwrap();
        GenerationContext::new(Arc::new(resolved), options, Arc::new(TemplateCache::new()))
    }

    #[test]
    fn test_generator_for_rejects_special_types() {
        assert!(generator_for(WorkflowType::Pattern).is_err());
        assert_eq!(generator_for(WorkflowType::Cd).unwrap().workflow_type(), WorkflowType::Cd);
    }

    #[test]
    fn test_harden_enterprise_sets_permissions() {
        let ctx = empty_context(
            GenerationOptions::builder().security_level(SecurityLevel::Enterprise).build(),
        );
        let mut workflow = Workflow::new("CI", Triggers::manual());
        let mut notes = GenerationNotes::default();
        ctx.harden(&mut workflow, &mut notes);
        assert_eq!(workflow.permissions, Some(Permissions::read_contents()));
        assert!(notes.optimizations.contains(&"least-privilege-permissions".to_string()));
    }

    #[test]
    fn test_finish_without_comments_has_no_header() {
        let ctx = empty_context(GenerationOptions::builder().include_comments(false).build());
        let workflow = Workflow::new("CI", Triggers::manual())
            .with_job("build", Job::new("ubuntu-latest").step(Step::run("x", "true")));
        let output = ctx.finish("ci.yml", WorkflowType::Ci, &workflow, ctx.notes()).unwrap();
        assert!(output.content.starts_with("name: CI"));
        assert!(output.has_warnings());
    }
}
