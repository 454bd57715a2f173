//! Testing strategy workflow: unit, integration, end-to-end and coverage.

use crate::detection::TestType;
use crate::error::{GenerationResult, GenerationWarning};
use crate::templates::catalog::testing_command;
use crate::templates::{PackageManager, Toolchain};
use crate::workflow::{
    Job, OptimizationLevel, Step, Strategy, Workflow, WorkflowOutput, WorkflowType,
};

use super::{GenerationContext, WorkflowGenerator, DEFAULT_TIMEOUT_MINUTES};

/// Layered test pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestingGenerator;

impl WorkflowGenerator for TestingGenerator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Testing
    }

    fn component(&self) -> &'static str {
        "testing"
    }

    fn generate(&self, ctx: &GenerationContext) -> GenerationResult<WorkflowOutput> {
        let detection = ctx.detection();
        let toolchain = ctx.toolchain();
        let steps = ctx.steps();
        let mut notes = ctx.notes();
        let caching = ctx.options().optimization_level.caches() && !toolchain.is_generic();
        let pm = toolchain.package_manager;

        if detection.testing_frameworks.is_empty() {
            notes.warn(GenerationWarning::MissingData {
                field: "testingFrameworks".to_string(),
                detail: "no testing framework detected, using the package manager's test command"
                    .to_string(),
            });
        }

        let mut workflow = Workflow::new("Testing", ctx.branch_triggers());

        let matrix = if ctx.options().optimization_level == OptimizationLevel::Aggressive {
            toolchain.matrix_axis()
        } else {
            None
        };
        let mut unit = Job::new(ctx.runner()).named("Unit tests").timeout(DEFAULT_TIMEOUT_MINUTES);
        if let Some((axis, values)) = &matrix {
            unit = unit.with_strategy(Strategy::matrix(axis.clone(), values.clone()));
            notes.optimization("matrix-parallelization");
        }
        unit = unit
            .steps(steps.prepare(caching, matrix.is_some()))
            .step(Step::run("Run unit tests", toolchain.test_command()));
        workflow.add_job("unit-tests", unit);
        let mut last_stage = "unit-tests".to_string();

        let integration: Vec<String> = detection
            .testing_frameworks_of(TestType::Integration)
            .into_iter()
            .filter_map(|t| testing_command(&t.name, pm))
            .collect();
        if !integration.is_empty() {
            let job = Job::new(ctx.runner())
                .named("Integration tests")
                .needs(last_stage.clone())
                .timeout(DEFAULT_TIMEOUT_MINUTES)
                .steps(steps.prepare(caching, false))
                .steps(integration.into_iter().map(|cmd| {
                    Step::run("Run integration tests", cmd).env("CI", "true")
                }));
            workflow.add_job("integration-tests", job);
            last_stage = "integration-tests".to_string();
        }

        let e2e = detection.testing_frameworks_of(TestType::E2e);
        if !e2e.is_empty() {
            let mut job = Job::new(ctx.runner())
                .named("End-to-end tests")
                .needs(last_stage.clone())
                .timeout(DEFAULT_TIMEOUT_MINUTES)
                .steps(steps.prepare(caching, false))
                .maybe_step(steps.build());
            for framework in e2e {
                job = match framework.name.to_lowercase().as_str() {
                    "cypress" => job.step(
                        Step::uses("Run Cypress", steps.action("cypress-io/github-action"))
                            .with("install", "false")
                            .with("start", start_command(pm))
                            .with("wait-on", "http://localhost:3000"),
                    ),
                    "playwright" => job
                        .step(Step::run(
                            "Install Playwright browsers",
                            exec(pm, "playwright install --with-deps"),
                        ))
                        .step(Step::run("Run Playwright", exec(pm, "playwright test")))
                        .step(
                            Step::uses("Upload Playwright report", steps.action("actions/upload-artifact"))
                                .when("failure()")
                                .with("name", "playwright-report")
                                .with("path", "playwright-report/")
                                .with("retention-days", "7"),
                        ),
                    other => match testing_command(other, pm) {
                        Some(cmd) => job.step(Step::run(format!("Run {}", framework.name), cmd)),
                        None => {
                            notes.warn(GenerationWarning::TemplateFallback {
                                component: self.component().to_string(),
                                reason: format!("no command template for e2e framework '{}'", framework.name),
                            });
                            job
                        }
                    },
                };
            }
            if job.steps.iter().any(|s| s.name.as_deref().is_some_and(|n| n.starts_with("Run "))) {
                workflow.add_job("e2e-tests", job);
                last_stage = "e2e-tests".to_string();
            }
        }

        let coverage_steps = coverage_steps(toolchain);
        if !coverage_steps.is_empty() {
            let job = Job::new(ctx.runner())
                .named("Coverage")
                .needs(last_stage)
                .timeout(DEFAULT_TIMEOUT_MINUTES)
                .steps(steps.prepare(caching, false))
                .steps(coverage_steps)
                .step(
                    Step::uses("Upload coverage", steps.action("codecov/codecov-action"))
                        .with("token", "${{ secrets.CODECOV_TOKEN }}")
                        .with("fail_ci_if_error", "false"),
                );
            workflow.add_job("coverage", job);
            notes.optimization("coverage-reporting");
        }

        ctx.harden(&mut workflow, &mut notes);
        ctx.finish("testing.yml", WorkflowType::Testing, &workflow, notes)
    }
}

fn exec(pm: Option<PackageManager>, command: &str) -> String {
    pm.map_or_else(|| format!("npx {command}"), |pm| pm.exec(command))
}

fn start_command(pm: Option<PackageManager>) -> String {
    pm.and_then(|pm| pm.run_script("start")).unwrap_or_else(|| "npm start".to_string())
}

/// Steps producing a coverage report for the toolchain.
fn coverage_steps(toolchain: &Toolchain) -> Vec<Step> {
    let Some(pm) = toolchain.package_manager else {
        return Vec::new();
    };

    let command = match pm {
        PackageManager::Npm | PackageManager::Yarn | PackageManager::Pnpm => {
            match &toolchain.unit_test_command {
                Some(cmd) if cmd.contains("--coverage") => cmd.clone(),
                _ => format!("{} -- --coverage", pm.test_command()),
            }
        }
        PackageManager::Pip | PackageManager::Poetry | PackageManager::Pipenv => format!(
            "pip install pytest-cov\n{}",
            pm.exec("pytest --cov --cov-report=xml")
        ),
        PackageManager::Cargo => {
            "cargo install cargo-llvm-cov --locked\ncargo llvm-cov --lcov --output-path lcov.info"
                .to_string()
        }
        PackageManager::GoModules => "go test -coverprofile=coverage.out ./...".to_string(),
        PackageManager::Maven => "mvn -B verify jacoco:report".to_string(),
        PackageManager::Gradle => "./gradlew test jacocoTestReport".to_string(),
        PackageManager::Bundler => "COVERAGE=true bundle exec rake test".to_string(),
        PackageManager::Composer => "vendor/bin/phpunit --coverage-clover coverage.xml".to_string(),
        PackageManager::Nuget => "dotnet test --collect:\"XPlat Code Coverage\"".to_string(),
    };

    vec![Step::run("Generate coverage report", command)]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::detection::{ConflictResolver, DetectionResult};
    use crate::templates::TemplateCache;
    use crate::workflow::GenerationOptions;

    fn generate(json: &str) -> WorkflowOutput {
        let detection = DetectionResult::from_json(json).unwrap();
        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        let ctx = GenerationContext::new(
            Arc::new(resolved),
            GenerationOptions::default(),
            Arc::new(TemplateCache::new()),
        );
        TestingGenerator.generate(&ctx).unwrap()
    }

    #[test]
    fn test_full_pipeline_order() {
        let output = generate(
            r#"{
                "languages": [{"name": "typescript", "confidence": 0.9, "primary": true}],
                "packageManagers": [{"name": "npm", "confidence": 0.9}],
                "testingFrameworks": [
                    {"name": "jest", "type": "unit", "confidence": 0.9},
                    {"name": "supertest", "type": "integration", "confidence": 0.6},
                    {"name": "playwright", "type": "e2e", "confidence": 0.8}
                ]
            }"#,
        );
        let doc = output.document().unwrap();
        let ids: Vec<&str> =
            doc["jobs"].as_mapping().unwrap().keys().filter_map(|k| k.as_str()).collect();
        // supertest has no command template, so the integration stage is skipped.
        assert_eq!(ids, vec!["unit-tests", "e2e-tests", "coverage"]);
        assert_eq!(doc["jobs"]["e2e-tests"]["needs"][0].as_str(), Some("unit-tests"));
        assert_eq!(doc["jobs"]["coverage"]["needs"][0].as_str(), Some("e2e-tests"));
        assert!(output.content.contains("npx playwright test"));
        assert!(output.content.contains("npx jest --ci --coverage"));
    }

    #[test]
    fn test_cypress_uses_action() {
        let output = generate(
            r#"{
                "languages": [{"name": "javascript", "confidence": 0.9, "primary": true}],
                "testingFrameworks": [{"name": "cypress", "type": "e2e", "confidence": 0.9}]
            }"#,
        );
        assert!(output.content.contains("cypress-io/github-action@v6"));
    }

    #[test]
    fn test_no_frameworks_warns() {
        let output = generate(r#"{"languages": [{"name": "go", "confidence": 0.9, "primary": true}]}"#);
        assert!(output.metadata.warnings.iter().any(|w| w.contains("testingFrameworks")));
        assert!(output.content.contains("go test -coverprofile"));
    }
}
