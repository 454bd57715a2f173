//! Agent hooks: maintenance workflows that react to repository events.
//!
//! Hooks are ordinary workflows triggered by schedules and
//! `repository_dispatch` events sent by an external agent. The generated
//! files only describe where results are reported; nothing here talks to the
//! network.

use serde::Serialize;

use crate::error::{GenerationResult, GenerationWarning};
use crate::generators::performance::benchmark_format;
use crate::generators::{GenerationContext, WorkflowGenerator, DEFAULT_TIMEOUT_MINUTES};
use crate::workflow::{
    Job, PermissionLevel, Permissions, Step, Triggers, Workflow, WorkflowOutput, WorkflowType,
};

/// Weekly dependency refresh (Monday 03:00 UTC).
pub const DEPENDENCY_UPDATE_SCHEDULE: &str = "0 3 * * 1";

/// Dispatch event asking for a dependency refresh.
pub const DEPENDENCY_UPDATE_EVENT: &str = "dependency-update";

/// Dispatch event reporting a suspected performance regression.
pub const PERFORMANCE_REGRESSION_EVENT: &str = "performance-regression";

/// Where a hook reports back to the agent.
///
/// Serialized into the workflow as `AGENT_WEBHOOK_CONFIG`; the URL itself is
/// always read from a repository secret at run time.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub url_secret: String,
    pub events: Vec<String>,
    pub content_type: String,
}

impl WebhookConfig {
    pub fn new(events: &[&str]) -> Self {
        Self {
            url_secret: "AGENT_WEBHOOK_URL".to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
            content_type: "application/json".to_string(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Dependency update hook: refreshes dependencies and opens a pull request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyUpdateHooks;

impl WorkflowGenerator for DependencyUpdateHooks {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Maintenance
    }

    fn component(&self) -> &'static str {
        "agent-hooks"
    }

    fn generate(&self, ctx: &GenerationContext) -> GenerationResult<WorkflowOutput> {
        let toolchain = ctx.toolchain();
        let steps = ctx.steps();
        let mut notes = ctx.notes();

        let triggers = Triggers::manual()
            .on_schedule(DEPENDENCY_UPDATE_SCHEDULE)
            .on_repository_dispatch([DEPENDENCY_UPDATE_EVENT]);

        let update = match toolchain.package_manager.and_then(|pm| pm.update_command()) {
            Some(command) => command.to_string(),
            None => {
                notes.warn(GenerationWarning::TemplateFallback {
                    component: self.component().to_string(),
                    reason: format!(
                        "no update command for {}, running scripts/update-deps.sh",
                        toolchain
                            .package_manager
                            .map_or_else(|| "an undetected package manager".to_string(), |pm| pm.to_string())
                    ),
                });
                "if [ -x ./scripts/update-deps.sh ]; then\n  ./scripts/update-deps.sh\nelse\n  echo \"No dependency update command configured\"\nfi"
                    .to_string()
            }
        };

        let job = Job::new(ctx.runner())
            .named("Update dependencies")
            .timeout(DEFAULT_TIMEOUT_MINUTES)
            .steps(steps.prepare(false, false))
            .step(Step::run("Update dependencies", update).id("update"))
            .step(steps.test().allow_failure())
            .step(
                Step::uses("Open pull request", steps.action("peter-evans/create-pull-request"))
                    .with("branch", "agent-hooks/dependency-updates")
                    .with("title", "chore(deps): update dependencies")
                    .with("commit-message", "chore(deps): update dependencies")
                    .with(
                        "body",
                        "Automated dependency update triggered by `${{ github.event_name }}`.\nReview the test results before merging.",
                    )
                    .with("labels", "dependencies,automated")
                    .with("delete-branch", "true"),
            );

        let mut workflow = Workflow::new("Agent Hooks - Dependency Updates", triggers)
            .with_permissions(
                Permissions::read_contents()
                    .with("contents", PermissionLevel::Write)
                    .with("pull-requests", PermissionLevel::Write),
            )
            .with_job("update-dependencies", job);

        notes.optimization("automated-dependency-updates");
        ctx.harden(&mut workflow, &mut notes);
        ctx.finish(
            "agent-hooks-dependency-updates.yml",
            WorkflowType::Maintenance,
            &workflow,
            notes,
        )
    }
}

/// Performance hook: benchmarks on every push to the default branch and
/// reports regressions to the agent webhook.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceHooks;

impl WorkflowGenerator for PerformanceHooks {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Maintenance
    }

    fn component(&self) -> &'static str {
        "agent-hooks"
    }

    fn generate(&self, ctx: &GenerationContext) -> GenerationResult<WorkflowOutput> {
        let toolchain = ctx.toolchain();
        let steps = ctx.steps();
        let mut notes = ctx.notes();
        let caching = ctx.options().optimization_level.caches() && !toolchain.is_generic();
        let webhook = WebhookConfig::new(&[PERFORMANCE_REGRESSION_EVENT]);

        let triggers = Triggers::manual()
            .on_push([ctx.options().default_branch.as_str()])
            .on_repository_dispatch([PERFORMANCE_REGRESSION_EVENT]);

        let mut benchmark = Job::new(ctx.runner())
            .named("Benchmarks")
            .timeout(DEFAULT_TIMEOUT_MINUTES)
            .steps(steps.prepare(caching, false));

        let bench = toolchain.package_manager.and_then(|pm| pm.bench_command().map(|cmd| (pm, cmd)));
        match bench {
            Some((pm, command)) => {
                benchmark = benchmark.step(Step::run("Run benchmarks", command));
                if let Some((tool, file)) = benchmark_format(pm) {
                    benchmark = benchmark.step(
                        Step::uses(
                            "Compare with baseline",
                            steps.action("benchmark-action/github-action-benchmark"),
                        )
                        .id("compare")
                        .with("tool", tool)
                        .with("output-file-path", file)
                        .with("github-token", "${{ secrets.GITHUB_TOKEN }}")
                        .with("alert-threshold", "120%")
                        .with("fail-on-alert", "true")
                        .with("comment-on-alert", "true")
                        .with("auto-push", "${{ github.event_name == 'push' }}"),
                    );
                    notes.optimization("baseline-comparison");
                }
            }
            None => {
                notes.warn(GenerationWarning::MissingData {
                    field: "benchmarks".to_string(),
                    detail: "no benchmark command for the detected toolchain, timing the build instead"
                        .to_string(),
                });
                benchmark = benchmark.step(Step::run(
                    "Time build",
                    format!(
                        "start=$(date +%s)\n{}\necho \"Build took $(( $(date +%s) - start ))s\" >> \"$GITHUB_STEP_SUMMARY\"",
                        toolchain.build_command().unwrap_or_else(|| "true".to_string())
                    ),
                ));
            }
        }

        let notify = Job::new(ctx.runner())
            .named("Report regression")
            .needs("benchmark")
            .when("failure()")
            .timeout(5)
            .with_env("AGENT_WEBHOOK_URL", "${{ secrets.AGENT_WEBHOOK_URL }}")
            .with_env("AGENT_WEBHOOK_CONFIG", webhook.to_json())
            .step(
                Step::run(
                    "Notify agent webhook",
                    format!(
                        "payload=$(printf '{{\"event\":\"%s\",\"repository\":\"%s\",\"sha\":\"%s\",\"run\":\"%s\"}}' \\\n  {PERFORMANCE_REGRESSION_EVENT} \"$GITHUB_REPOSITORY\" \"$GITHUB_SHA\" \"$GITHUB_RUN_ID\")\ncurl -fsS -X POST -H 'Content-Type: application/json' -d \"$payload\" \"$AGENT_WEBHOOK_URL\""
                    ),
                )
                .when("env.AGENT_WEBHOOK_URL != ''"),
            );

        let mut workflow = Workflow::new("Agent Hooks - Performance", triggers)
            .with_permissions(
                Permissions::read_contents()
                    .with("contents", PermissionLevel::Write)
                    .with("pull-requests", PermissionLevel::Write),
            )
            .with_job("benchmark", benchmark)
            .with_job("notify-agent", notify);

        notes.optimization("regression-webhook");
        ctx.harden(&mut workflow, &mut notes);
        ctx.finish("agent-hooks-performance.yml", WorkflowType::Maintenance, &workflow, notes)
    }
}

/// Generator for every agent hook, in a fixed order.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentHooksGenerator;

impl AgentHooksGenerator {
    /// All hook generators.
    pub fn generators(&self) -> Vec<Box<dyn WorkflowGenerator>> {
        vec![Box::new(DependencyUpdateHooks), Box::new(PerformanceHooks)]
    }

    /// Generate every hook workflow.
    pub fn generate_all(&self, ctx: &GenerationContext) -> GenerationResult<Vec<WorkflowOutput>> {
        self.generators().iter().map(|g| g.generate(ctx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::detection::{ConflictResolver, DetectionResult};
    use crate::templates::TemplateCache;
    use crate::workflow::GenerationOptions;

    fn context(json: &str) -> GenerationContext {
        let detection = DetectionResult::from_json(json).unwrap();
        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        GenerationContext::new(
            Arc::new(resolved),
            GenerationOptions::default(),
            Arc::new(TemplateCache::new()),
        )
    }

    #[test]
    fn test_dependency_updates_open_pull_request() {
        let ctx = context(
            r#"{
                "languages": [{"name": "javascript", "confidence": 0.9, "primary": true}],
                "packageManagers": [{"name": "npm", "confidence": 0.9}]
            }"#,
        );
        let output = DependencyUpdateHooks.generate(&ctx).unwrap();
        let doc = output.document().unwrap();

        assert_eq!(output.filename, "agent-hooks-dependency-updates.yml");
        assert_eq!(output.workflow_type, WorkflowType::Maintenance);
        assert_eq!(
            doc["on"]["repository_dispatch"]["types"][0].as_str(),
            Some(DEPENDENCY_UPDATE_EVENT)
        );
        assert_eq!(doc["on"]["schedule"][0]["cron"].as_str(), Some(DEPENDENCY_UPDATE_SCHEDULE));
        assert_eq!(doc["permissions"]["pull-requests"].as_str(), Some("write"));
        assert!(output.content.contains("peter-evans/create-pull-request@v7"));
    }

    #[test]
    fn test_gradle_update_falls_back() {
        let ctx = context(
            r#"{
                "languages": [{"name": "java", "confidence": 0.9, "primary": true}],
                "buildTools": [{"name": "gradle", "confidence": 0.9}]
            }"#,
        );
        let output = DependencyUpdateHooks.generate(&ctx).unwrap();
        assert!(output.content.contains("scripts/update-deps.sh"));
        assert!(output.metadata.warnings.iter().any(|w| w.contains("agent-hooks")));
    }

    #[test]
    fn test_performance_hook_reports_regressions() {
        let ctx = context(r#"{"languages": [{"name": "rust", "confidence": 0.9, "primary": true}]}"#);
        let output = PerformanceHooks.generate(&ctx).unwrap();
        let doc = output.document().unwrap();

        assert_eq!(output.filename, "agent-hooks-performance.yml");
        assert_eq!(
            doc["on"]["repository_dispatch"]["types"][0].as_str(),
            Some(PERFORMANCE_REGRESSION_EVENT)
        );
        assert_eq!(doc["on"]["push"]["branches"][0].as_str(), Some("main"));
        assert_eq!(doc["jobs"]["notify-agent"]["if"].as_str(), Some("failure()"));
        assert!(output.content.contains("cargo bench"));
        assert!(output.content.contains("AGENT_WEBHOOK_CONFIG"));
    }

    #[test]
    fn test_generate_all_order() {
        let ctx = context("{}");
        let outputs = AgentHooksGenerator.generate_all(&ctx).unwrap();
        let names: Vec<&str> = outputs.iter().map(|o| o.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["agent-hooks-dependency-updates.yml", "agent-hooks-performance.yml"]
        );
    }
}
