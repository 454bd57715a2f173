//! Workflow generation orchestrator.
//!
//! [`YamlGenerator`] resolves a detection result once per call, hands the
//! shared context to the generators, validates every workflow they produce
//! and, for multi-workflow requests, fans the generators out over a bounded
//! [`ParallelRunner`].

mod parallel;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use parallel::{ParallelRunner, Task};

use crate::config::Config;
use crate::detection::{ConflictResolver, DetectionResult};
use crate::environments::{EnvironmentConfig, MultiEnvResult, MultiEnvironmentGenerator};
use crate::error::{GenerationError, GenerationResult};
use crate::generators::{generator_for, GenerationContext, WorkflowGenerator};
use crate::hooks::AgentHooksGenerator;
use crate::patterns::{PatternConfig, PatternGenerator};
use crate::templates::TemplateCache;
use crate::validation::{
    score_best_practices, BestPracticesScore, ValidationResult, WorkflowValidator,
};
use crate::workflow::{GenerationOptions, WorkflowOutput, WorkflowType};

/// What a multi-workflow request does when one generator fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Keep sibling outputs and list the failure
    #[default]
    Isolate,
    /// Fail the whole request
    AllOrNothing,
}

/// A generator that failed inside a multi-workflow request.
#[derive(Debug)]
pub struct SuiteFailure {
    pub workflow_type: WorkflowType,
    pub component: String,
    pub error: GenerationError,
}

/// Outputs of a multi-workflow request, in request order.
#[derive(Debug, Default)]
pub struct SuiteResult {
    pub outputs: Vec<WorkflowOutput>,
    pub failures: Vec<SuiteFailure>,
}

impl SuiteResult {
    /// Whether every requested workflow was produced.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn output(&self, filename: &str) -> Option<&WorkflowOutput> {
        self.outputs.iter().find(|o| o.filename == filename)
    }
}

/// Entry point of the generation engine.
#[derive(Debug, Clone)]
pub struct YamlGenerator {
    options: GenerationOptions,
    resolver: ConflictResolver,
    runner: ParallelRunner,
    failure_policy: FailurePolicy,
    patterns: PatternGenerator,
    cache: Arc<TemplateCache>,
    validator: WorkflowValidator,
}

impl Default for YamlGenerator {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl YamlGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a generator from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        let engine = &config.engine;
        let workers = if engine.parallel { engine.max_concurrency } else { 1 };
        Self {
            options: config.generation_options(),
            resolver: ConflictResolver::new().min_relevance(config.resolver.min_relevance),
            runner: ParallelRunner::new()
                .max_concurrency(workers)
                .timeout(engine.generator_timeout_secs.map(Duration::from_secs)),
            failure_policy: engine.failure_policy,
            patterns: PatternGenerator::new()
                .matrix_threshold(config.patterns.monorepo_matrix_threshold),
            cache: TemplateCache::global(),
            validator: WorkflowValidator::new(),
        }
    }

    /// Options used by calls that do not take their own.
    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a private template cache instead of the process-wide one.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    #[must_use]
    pub fn runner(mut self, runner: ParallelRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    fn context(
        &self,
        detection: &DetectionResult,
        options: GenerationOptions,
    ) -> GenerationResult<GenerationContext> {
        let resolved = self.resolver.resolve(detection)?;
        Ok(GenerationContext::new(Arc::new(resolved), options, Arc::clone(&self.cache)))
    }

    /// Generate the workflow selected by `options.workflow_type`.
    pub fn generate_workflow(
        &self,
        detection: &DetectionResult,
        options: &GenerationOptions,
    ) -> GenerationResult<WorkflowOutput> {
        let generator = generator_for(options.workflow_type)?;
        self.generate_with(detection, options, generator)
    }

    /// Run one generator under the engine's time limit and validate its output.
    pub fn generate_with(
        &self,
        detection: &DetectionResult,
        options: &GenerationOptions,
        generator: Box<dyn WorkflowGenerator>,
    ) -> GenerationResult<WorkflowOutput> {
        let start = Instant::now();
        let ctx = self.context(detection, options.clone())?;
        let component = generator.component();
        let validator = self.validator;
        let task = Task::new(component, move || run_checked(generator.as_ref(), &ctx, validator));
        let output = self.runner.run(vec![task]).into_iter().next().unwrap_or_else(|| {
            Err(GenerationError::generator_failed(component, "generation", "no result"))
        })?;
        info!(
            workflow_type = %output.workflow_type,
            filename = %output.filename,
            warnings = output.metadata.warnings.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "generated workflow"
        );
        Ok(output)
    }

    /// Generate several workflow types with the generator's default options.
    /// Repeated types are generated once.
    pub fn generate_multiple_workflows(
        &self,
        detection: &DetectionResult,
        types: &[WorkflowType],
    ) -> GenerationResult<SuiteResult> {
        if types.is_empty() {
            return Err(GenerationError::InvalidInput("no workflow types requested".to_string()));
        }
        let mut seen = HashSet::new();
        let generators = types
            .iter()
            .filter(|t| seen.insert(**t))
            .map(|t| generator_for(*t))
            .collect::<GenerationResult<Vec<_>>>()?;
        let ctx = self.context(detection, self.options.clone())?;
        self.run_suite(&ctx, generators)
    }

    /// Every base workflow, plus the agent hooks when enabled.
    pub fn generate_complete_workflow_suite(
        &self,
        detection: &DetectionResult,
    ) -> GenerationResult<SuiteResult> {
        let mut generators = WorkflowType::BASE
            .iter()
            .map(|t| generator_for(*t))
            .collect::<GenerationResult<Vec<_>>>()?;
        if self.options.agent_hooks_enabled {
            generators.extend(AgentHooksGenerator.generators());
        }
        let ctx = self.context(detection, self.options.clone())?;
        self.run_suite(&ctx, generators)
    }

    /// Run a caller-supplied set of generators as one suite, honoring the
    /// failure policy.
    pub fn generate_suite_with(
        &self,
        detection: &DetectionResult,
        generators: Vec<Box<dyn WorkflowGenerator>>,
    ) -> GenerationResult<SuiteResult> {
        if generators.is_empty() {
            return Err(GenerationError::InvalidInput("no generators supplied".to_string()));
        }
        let ctx = self.context(detection, self.options.clone())?;
        self.run_suite(&ctx, generators)
    }

    /// Workflows for an advanced build or deployment pattern.
    pub fn generate_advanced_pattern_workflows(
        &self,
        detection: &DetectionResult,
        pattern: &PatternConfig,
    ) -> GenerationResult<Vec<WorkflowOutput>> {
        let options = self.options.for_type(WorkflowType::Pattern);
        let ctx = self.context(detection, options)?;
        let outputs = self.patterns.generate(&ctx, pattern)?;
        for output in &outputs {
            self.check_output(pattern.pattern_type(), output)?;
        }
        Ok(outputs)
    }

    /// Deploy, promotion and rollback workflows for an ordered environment list.
    pub fn generate_multi_environment_workflows(
        &self,
        detection: &DetectionResult,
        environments: &[EnvironmentConfig],
    ) -> GenerationResult<MultiEnvResult> {
        let options = self.options.for_type(WorkflowType::MultiEnvironment);
        let ctx = self.context(detection, options)?;
        let result = MultiEnvironmentGenerator.generate(&ctx, environments)?;
        for output in &result.workflows {
            self.check_output("environments", output)?;
        }
        Ok(result)
    }

    /// Parse and structurally check workflow text.
    pub fn validate_workflow(&self, yaml: &str) -> GenerationResult<ValidationResult> {
        self.validator.validate(yaml)
    }

    /// Score workflow text between 0 and 1.
    pub fn score_best_practices(&self, yaml: &str) -> GenerationResult<BestPracticesScore> {
        score_best_practices(yaml)
    }

    fn check_output(&self, component: &str, output: &WorkflowOutput) -> GenerationResult<()> {
        check(self.validator, component, output)
    }

    fn run_suite(
        &self,
        ctx: &GenerationContext,
        generators: Vec<Box<dyn WorkflowGenerator>>,
    ) -> GenerationResult<SuiteResult> {
        let start = Instant::now();
        let meta: Vec<(WorkflowType, &'static str)> =
            generators.iter().map(|g| (g.workflow_type(), g.component())).collect();

        let validator = self.validator;
        let tasks = generators
            .into_iter()
            .map(|generator| {
                let ctx = ctx.clone();
                Task::new(generator.component(), move || {
                    run_checked(generator.as_ref(), &ctx, validator)
                })
            })
            .collect();

        let mut suite = SuiteResult::default();
        for ((workflow_type, component), result) in meta.into_iter().zip(self.runner.run(tasks)) {
            match result {
                Ok(output) => suite.outputs.push(output),
                Err(error) if self.failure_policy == FailurePolicy::AllOrNothing => {
                    warn!(component, error = %error, "aborting suite");
                    return Err(error);
                }
                Err(error) => {
                    warn!(component, error = %error, "generator failed, continuing");
                    suite.failures.push(SuiteFailure {
                        workflow_type,
                        component: component.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            workflows = suite.outputs.len(),
            failures = suite.failures.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "generated workflow suite"
        );
        Ok(suite)
    }
}

/// Generate and validate one workflow.
fn run_checked(
    generator: &dyn WorkflowGenerator,
    ctx: &GenerationContext,
    validator: WorkflowValidator,
) -> GenerationResult<WorkflowOutput> {
    let output = generator.generate(ctx).map_err(|e| match e {
        e @ (GenerationError::InvalidInput(_)
        | GenerationError::GeneratorFailed { .. }
        | GenerationError::Timeout { .. }) => e,
        other => GenerationError::generator_failed(generator.component(), "generation", other.to_string()),
    })?;
    check(validator, generator.component(), &output)?;
    Ok(output)
}

fn check(
    validator: WorkflowValidator,
    component: &str,
    output: &WorkflowOutput,
) -> GenerationResult<()> {
    let result = validator.validate(&output.content).map_err(|e| {
        GenerationError::generator_failed(component, "validation", e.to_string())
    })?;
    if !result.is_valid {
        return Err(GenerationError::generator_failed(
            component,
            "validation",
            result.errors.join("; "),
        ));
    }
    debug!(component, filename = %output.filename, warnings = result.warnings.len(), "validated");
    Ok(())
}
