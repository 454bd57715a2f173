//! Security scanning workflow.

use crate::error::{GenerationResult, GenerationWarning};
use crate::templates::Language;
use crate::workflow::{
    Job, PermissionLevel, Permissions, Step, Workflow, WorkflowOutput, WorkflowType,
};

use super::deploy::has_container_target;
use super::{GenerationContext, WorkflowGenerator, DEFAULT_TIMEOUT_MINUTES};

/// Weekly schedule for security scans (Monday 06:00 UTC).
pub const SECURITY_SCHEDULE: &str = "0 6 * * 1";

/// Dependency audit, CodeQL, secret scanning and container scanning.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityGenerator;

impl WorkflowGenerator for SecurityGenerator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Security
    }

    fn component(&self) -> &'static str {
        "security"
    }

    fn generate(&self, ctx: &GenerationContext) -> GenerationResult<WorkflowOutput> {
        let toolchain = ctx.toolchain();
        let steps = ctx.steps();
        let mut notes = ctx.notes();
        let caching = ctx.options().optimization_level.caches() && !toolchain.is_generic();

        let triggers = ctx.branch_triggers().on_schedule(SECURITY_SCHEDULE);
        let mut workflow = Workflow::new("Security", triggers).with_permissions(
            Permissions::read_contents().with("security-events", PermissionLevel::Write),
        );

        let audit = Job::new(ctx.runner())
            .named("Dependency audit")
            .timeout(15)
            .steps(steps.prepare(caching, false))
            .step(steps.audit());
        workflow.add_job("dependency-audit", audit);
        notes.optimization("dependency-audit");

        workflow.add_job(
            "dependency-review",
            Job::new(ctx.runner())
                .named("Dependency review")
                .when("github.event_name == 'pull_request'")
                .timeout(10)
                .step(steps.checkout())
                .step(
                    Step::uses("Review dependency changes", steps.action("actions/dependency-review-action"))
                        .with("fail-on-severity", "high"),
                ),
        );

        match toolchain.language.and_then(|l| l.codeql_language().map(|c| (l, c))) {
            Some((language, codeql)) => {
                let compiled = matches!(language, Language::Java | Language::Go | Language::DotNet);
                let mut job = Job::new(ctx.runner())
                    .named("CodeQL analysis")
                    .timeout(DEFAULT_TIMEOUT_MINUTES)
                    .with_permissions(
                        Permissions::read_contents()
                            .with("actions", PermissionLevel::Read)
                            .with("security-events", PermissionLevel::Write),
                    )
                    .step(steps.checkout())
                    .step(
                        Step::uses("Initialize CodeQL", steps.action("github/codeql-action/init"))
                            .with("languages", codeql),
                    );
                if compiled {
                    job = job.steps(steps.setup(false)).step(Step::uses(
                        "Autobuild",
                        steps.action("github/codeql-action/autobuild"),
                    ));
                }
                job = job.step(
                    Step::uses("Perform CodeQL analysis", steps.action("github/codeql-action/analyze"))
                        .with("category", format!("/language:{codeql}")),
                );
                workflow.add_job("codeql", job);
                notes.optimization("static-analysis");
            }
            None => notes.warn(GenerationWarning::TemplateFallback {
                component: self.component().to_string(),
                reason: format!(
                    "CodeQL does not support {}, skipping static analysis",
                    toolchain.language.map_or("the detected language", |l| l.display_name())
                ),
            }),
        }

        workflow.add_job(
            "secret-scan",
            Job::new(ctx.runner())
                .named("Secret scanning")
                .timeout(15)
                .step(steps.checkout().with("fetch-depth", "0"))
                .step(
                    Step::uses("Scan for leaked secrets", steps.action("trufflesecurity/trufflehog"))
                        .with("path", "./")
                        .with("extra_args", "--only-verified"),
                ),
        );
        notes.optimization("secret-scanning");

        if has_container_target(ctx.detection()) {
            workflow.add_job(
                "container-scan",
                Job::new(ctx.runner())
                    .named("Container image scan")
                    .timeout(DEFAULT_TIMEOUT_MINUTES)
                    .step(steps.checkout())
                    .step(Step::run(
                        "Build image",
                        "docker build -t app:${{ github.sha }} .",
                    ))
                    .step(
                        Step::uses("Scan image", steps.action("aquasecurity/trivy-action"))
                            .with("image-ref", "app:${{ github.sha }}")
                            .with("format", "sarif")
                            .with("output", "trivy-results.sarif")
                            .with("severity", "HIGH,CRITICAL"),
                    )
                    .step(
                        Step::uses("Upload scan results", steps.action("github/codeql-action/upload-sarif"))
                            .when("always()")
                            .with("sarif_file", "trivy-results.sarif"),
                    ),
            );
            notes.optimization("container-scanning");
        }

        ctx.harden(&mut workflow, &mut notes);
        ctx.finish("security.yml", WorkflowType::Security, &workflow, notes)
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
        SecurityGenerator.generate(&ctx).unwrap()
    }

    #[test]
    fn test_security_jobs_for_java_container() {
        let output = generate(
            r#"{
                "languages": [{"name": "java", "confidence": 0.9, "primary": true}],
                "buildTools": [{"name": "gradle", "confidence": 0.9}],
                "deploymentTargets": [{"platform": "docker", "confidence": 0.8}]
            }"#,
        );
        let doc = output.document().unwrap();
        assert_eq!(doc["on"]["schedule"][0]["cron"].as_str(), Some(SECURITY_SCHEDULE));
        for job in ["dependency-audit", "codeql", "secret-scan", "container-scan"] {
            assert!(doc["jobs"].get(job).is_some(), "missing {job}");
        }
        assert!(output.content.contains("java-kotlin"));
        assert!(output.content.contains("codeql-action/autobuild"));
        // Gradle has no native audit, so trivy scans the filesystem.
        assert!(output.content.contains("scan-type: fs"));
    }

    #[test]
    fn test_rust_skips_codeql_with_warning() {
        let output = generate(r#"{"languages": [{"name": "rust", "confidence": 0.9, "primary": true}]}"#);
        let doc = output.document().unwrap();
        assert!(doc["jobs"].get("codeql").is_none());
        assert!(doc["jobs"].get("container-scan").is_none());
        assert!(output.metadata.warnings.iter().any(|w| w.contains("CodeQL")));
    }
}
