//! Performance workflow: benchmarks, Lighthouse audits and load tests.

use crate::detection::FrameworkCategory;
use crate::error::{GenerationResult, GenerationWarning};
use crate::templates::catalog::framework_profile;
use crate::templates::{FrameworkKind, PackageManager};
use crate::workflow::{Job, Step, Workflow, WorkflowOutput, WorkflowType};

use super::{GenerationContext, WorkflowGenerator, DEFAULT_TIMEOUT_MINUTES};

const K6_SCRIPT: &str = r#"import http from 'k6/http';
import { check, sleep } from 'k6';

export const options = {
  stages: [
    { duration: '30s', target: 20 },
    { duration: '1m', target: 20 },
    { duration: '15s', target: 0 },
  ],
  thresholds: {
    http_req_failed: ['rate<0.01'],
    http_req_duration: ['p(95)<500'],
  },
};

export default function () {
  const res = http.get(__ENV.TARGET_URL);
  check(res, { 'status is 200': (r) => r.status === 200 });
  sleep(1);
}
"#;

/// Benchmarks, frontend audits and backend load tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceGenerator;

impl WorkflowGenerator for PerformanceGenerator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Performance
    }

    fn component(&self) -> &'static str {
        "performance"
    }

    fn generate(&self, ctx: &GenerationContext) -> GenerationResult<WorkflowOutput> {
        let detection = ctx.detection();
        let toolchain = ctx.toolchain();
        let steps = ctx.steps();
        let mut notes = ctx.notes();
        let caching = ctx.options().optimization_level.caches() && !toolchain.is_generic();

        let mut workflow = Workflow::new("Performance", ctx.branch_triggers());

        let bench = toolchain.package_manager.and_then(|pm| pm.bench_command().map(|cmd| (pm, cmd)));
        if let Some((pm, command)) = bench {
            let mut job = Job::new(ctx.runner())
                .named("Benchmarks")
                .timeout(DEFAULT_TIMEOUT_MINUTES)
                .steps(steps.prepare(caching, false))
                .step(Step::run("Run benchmarks", command));
            if let Some((tool, file)) = benchmark_format(pm) {
                job = job.step(
                    Step::uses("Compare with baseline", steps.action("benchmark-action/github-action-benchmark"))
                        .with("tool", tool)
                        .with("output-file-path", file)
                        .with("github-token", "${{ secrets.GITHUB_TOKEN }}")
                        .with("alert-threshold", "150%")
                        .with("fail-on-alert", "true")
                        .with("auto-push", "false"),
                );
            }
            workflow.add_job("benchmark", job);
        }

        let frontend = toolchain
            .framework
            .filter(|f| matches!(f.kind, FrameworkKind::Static | FrameworkKind::Fullstack))
            .or_else(|| {
                detection
                    .framework(FrameworkCategory::Frontend)
                    .and_then(|f| framework_profile(&f.name))
            });
        if let Some(profile) = frontend {
            let mut job = Job::new(ctx.runner())
                .named("Lighthouse audit")
                .timeout(20)
                .steps(steps.prepare(caching, false))
                .maybe_step(steps.build());
            let lighthouse = Step::uses("Run Lighthouse", steps.action("treosh/lighthouse-ci-action"))
                .with("uploadArtifacts", "true")
                .with("temporaryPublicStorage", "true");
            job = match (profile.kind, profile.output_dir) {
                (FrameworkKind::Static, Some(dir)) => job.step(lighthouse.with("staticDistDir", dir)),
                _ => {
                    let start = toolchain
                        .package_manager
                        .and_then(|pm| pm.run_script("start"))
                        .unwrap_or_else(|| "npm start".to_string());
                    job.step(Step::run(
                        "Start application",
                        format!("{start} &\nnpx --yes wait-on http://localhost:{} --timeout 120000", profile.port),
                    ))
                    .step(lighthouse.with("urls", format!("http://localhost:{}", profile.port)))
                }
            };
            workflow.add_job("lighthouse", job);
        }

        let backend = toolchain
            .framework
            .filter(|f| f.kind == FrameworkKind::Server)
            .map(|f| f.port)
            .or_else(|| detection.framework(FrameworkCategory::Backend).map(|_| 8080));
        if let Some(port) = backend {
            let job = Job::new(ctx.runner())
                .named("Load test")
                .when("github.event_name != 'pull_request'")
                .timeout(20)
                .step(steps.checkout())
                .step(Step::uses("Set up k6", steps.action("grafana/setup-k6-action")))
                .step(Step::run(
                    "Write load test",
                    format!("mkdir -p .k6\ncat > .k6/load-test.js <<'EOF'\n{K6_SCRIPT}EOF"),
                ))
                .step(
                    Step::uses("Run load test", steps.action("grafana/run-k6-action"))
                        .with("path", ".k6/load-test.js")
                        .env(
                            "TARGET_URL",
                            format!("${{{{ vars.PERFORMANCE_TARGET_URL || 'http://localhost:{port}' }}}}"),
                        ),
                );
            workflow.add_job("load-test", job);
        }

        if workflow.jobs.is_empty() {
            notes.warn(GenerationWarning::MissingData {
                field: "performance tooling".to_string(),
                detail: "no benchmark command or web framework detected, emitting a timing job"
                    .to_string(),
            });
            workflow.add_job(
                "build-timing",
                Job::new(ctx.runner())
                    .named("Build timing")
                    .timeout(DEFAULT_TIMEOUT_MINUTES)
                    .steps(steps.prepare(caching, false))
                    .step(Step::run(
                        "Measure build time",
                        format!(
                            "start=$(date +%s)\n{}\necho \"Build took $(( $(date +%s) - start ))s\" >> \"$GITHUB_STEP_SUMMARY\"",
                            toolchain.build_command().unwrap_or_else(|| "true".to_string())
                        ),
                    )),
            );
        }

        ctx.harden(&mut workflow, &mut notes);
        ctx.finish("performance.yml", WorkflowType::Performance, &workflow, notes)
    }
}

/// Result format understood by the benchmark comparison action.
pub(crate) fn benchmark_format(pm: PackageManager) -> Option<(&'static str, &'static str)> {
    match pm {
        PackageManager::Cargo => Some(("cargo", "output.txt")),
        PackageManager::GoModules => Some(("go", "benchmark.txt")),
        PackageManager::Pip | PackageManager::Poetry | PackageManager::Pipenv => {
            Some(("pytest", "benchmark.json"))
        }
        _ => None,
    }
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
        PerformanceGenerator.generate(&ctx).unwrap()
    }

    #[test]
    fn test_frontend_gets_lighthouse() {
        let output = generate(
            r#"{
                "frameworks": [{"name": "react", "confidence": 0.9, "category": "frontend"}],
                "languages": [{"name": "javascript", "confidence": 0.9, "primary": true}]
            }"#,
        );
        let doc = output.document().unwrap();
        assert!(doc["jobs"].get("lighthouse").is_some());
        assert!(doc["jobs"].get("load-test").is_none());
        assert!(output.content.contains("staticDistDir: build"));
    }

    #[test]
    fn test_backend_gets_load_test() {
        let output = generate(
            r#"{
                "frameworks": [{"name": "express", "confidence": 0.9, "category": "backend"}],
                "languages": [{"name": "javascript", "confidence": 0.9, "primary": true}]
            }"#,
        );
        let doc = output.document().unwrap();
        assert!(doc["jobs"].get("load-test").is_some());
        assert!(doc["jobs"].get("lighthouse").is_none());
        assert!(output.content.contains("k6/http"));
    }

    #[test]
    fn test_rust_benchmarks_compare_baseline() {
        let output = generate(r#"{"languages": [{"name": "rust", "confidence": 0.9, "primary": true}]}"#);
        assert!(output.content.contains("cargo bench"));
        assert!(output.content.contains("github-action-benchmark"));
    }

    #[test]
    fn test_nothing_detected_still_emits_job() {
        let output = generate("{}");
        let doc = output.document().unwrap();
        assert!(doc["jobs"].get("build-timing").is_some());
        assert!(output.metadata.warnings.iter().any(|w| w.contains("performance tooling")));
    }
}
