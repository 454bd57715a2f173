//! Continuous integration workflow.

use crate::error::GenerationResult;
use crate::workflow::{Job, OptimizationLevel, Step, Strategy, Workflow, WorkflowOutput, WorkflowType};

use super::{GenerationContext, WorkflowGenerator, DEFAULT_TIMEOUT_MINUTES};

/// Builds and tests every push and pull request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CiGenerator;

impl WorkflowGenerator for CiGenerator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Ci
    }

    fn component(&self) -> &'static str {
        "ci"
    }

    fn generate(&self, ctx: &GenerationContext) -> GenerationResult<WorkflowOutput> {
        let options = ctx.options();
        let toolchain = ctx.toolchain();
        let steps = ctx.steps();
        let mut notes = ctx.notes();

        let caching = options.optimization_level.caches() && !toolchain.is_generic();
        let matrix = if options.optimization_level == OptimizationLevel::Aggressive {
            toolchain.matrix_axis()
        } else {
            None
        };

        let mut job = Job::new(ctx.runner()).named("Build and test").timeout(DEFAULT_TIMEOUT_MINUTES);
        if let Some((axis, values)) = &matrix {
            job = job.with_strategy(Strategy::matrix(axis.clone(), values.clone()));
            notes.optimization("matrix-parallelization");
        }
        if caching {
            notes.optimization("dependency-caching");
        }

        job = job.steps(steps.prepare(caching, matrix.is_some()));
        job = job.maybe_step(steps.build());
        job = job.step(steps.test());

        if options.security_level.is_enterprise() {
            job = job.step(steps.audit());
            notes.optimization("dependency-audit");
        }

        let artifact = match &matrix {
            Some((axis, _)) => format!("build-output-${{{{ matrix.{axis} }}}}"),
            None => "build-output".to_string(),
        };
        if let Some(upload) = steps.upload_artifact(&artifact) {
            job = job.step(upload.when("success()"));
        }

        let mut workflow = Workflow::new("CI", ctx.branch_triggers()).with_job("build", job);

        if toolchain.is_generic() {
            workflow.add_job(
                "lint",
                Job::new(ctx.runner())
                    .named("Repository checks")
                    .timeout(10)
                    .step(steps.checkout())
                    .step(Step::run(
                        "Check for merge conflict markers",
                        "! git grep -nE '^(<<<<<<<|>>>>>>>)' -- . ':!*.md'",
                    )),
            );
        }

        ctx.harden(&mut workflow, &mut notes);
        ctx.finish("ci.yml", WorkflowType::Ci, &workflow, notes)
    }
}
