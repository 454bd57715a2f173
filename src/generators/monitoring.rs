//! Scheduled monitoring workflow.

use crate::error::{GenerationResult, GenerationWarning};
use crate::workflow::{
    Job, PermissionLevel, Permissions, Step, Triggers, Workflow, WorkflowOutput, WorkflowType,
};

use super::deploy::health_check_step;
use super::{GenerationContext, WorkflowGenerator};

/// Every 15 minutes.
pub const MONITORING_SCHEDULE: &str = "*/15 * * * *";

const METRICS_SCRIPT: &str = r####"if [ -z "$TARGET_URL" ]; then
  echo '{"skipped": true}' > metrics.json
  exit 0
fi
curl -o /dev/null -sS -w '{"http_code": %{http_code}, "time_total": %{time_total}, "time_connect": %{time_connect}}' "$TARGET_URL" > metrics.json || true
cat metrics.json
echo "### Endpoint metrics" >> "$GITHUB_STEP_SUMMARY"
cat metrics.json >> "$GITHUB_STEP_SUMMARY""####;

const ISSUE_SCRIPT: &str = r#"const title = `Monitoring failure on ${context.ref}`;
const { data: issues } = await github.rest.issues.listForRepo({
  owner: context.repo.owner,
  repo: context.repo.repo,
  state: 'open',
  labels: 'monitoring',
});
if (!issues.some((issue) => issue.title === title)) {
  await github.rest.issues.create({
    owner: context.repo.owner,
    repo: context.repo.repo,
    title,
    labels: ['monitoring'],
    body: `Health check failed in run ${context.runId}.`,
  });
}"#;

/// Health checks, metrics collection and failure notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitoringGenerator;

impl WorkflowGenerator for MonitoringGenerator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Monitoring
    }

    fn component(&self) -> &'static str {
        "monitoring"
    }

    fn generate(&self, ctx: &GenerationContext) -> GenerationResult<WorkflowOutput> {
        let steps = ctx.steps();
        let mut notes = ctx.notes();

        if ctx.detection().deployment_targets.is_empty() {
            notes.warn(GenerationWarning::MissingData {
                field: "deploymentTargets".to_string(),
                detail: "no deployment target detected, checks read vars.HEALTH_CHECK_URL"
                    .to_string(),
            });
        }

        let url = "${{ vars.HEALTH_CHECK_URL }}";
        let triggers = Triggers::manual().on_schedule(MONITORING_SCHEDULE);

        let health = Job::new(ctx.runner())
            .named("Health check")
            .timeout(10)
            .with_output("status", "${{ steps.health.outcome }}")
            .step(health_check_step(url));

        let metrics = Job::new(ctx.runner())
            .named("Collect metrics")
            .needs("health-check")
            .when("always()")
            .timeout(10)
            .step(Step::run("Measure response times", METRICS_SCRIPT).env("TARGET_URL", url))
            .step(
                Step::uses("Upload metrics", steps.action("actions/upload-artifact"))
                    .with("name", "metrics-${{ github.run_id }}")
                    .with("path", "metrics.json")
                    .with("retention-days", "30"),
            );

        let notify = Job::new(ctx.runner())
            .named("Notify on failure")
            .needs_all(["health-check", "metrics"])
            .when("failure()")
            .timeout(5)
            .with_permissions(Permissions::read_contents().with("issues", PermissionLevel::Write))
            .with_env("SLACK_WEBHOOK_URL", "${{ secrets.SLACK_WEBHOOK_URL }}")
            .step(
                Step::uses("Notify Slack", steps.action("slackapi/slack-github-action"))
                    .when("env.SLACK_WEBHOOK_URL != ''")
                    .with("webhook", "${{ secrets.SLACK_WEBHOOK_URL }}")
                    .with("webhook-type", "incoming-webhook")
                    .with(
                        "payload",
                        "text: \"Monitoring failed for ${{ github.repository }}: ${{ github.server_url }}/${{ github.repository }}/actions/runs/${{ github.run_id }}\"",
                    ),
            )
            .step(
                Step::uses("Open incident issue", steps.action("actions/github-script"))
                    .with("script", ISSUE_SCRIPT),
            );

        let mut workflow = Workflow::new("Monitoring", triggers)
            .with_job("health-check", health)
            .with_job("metrics", metrics)
            .with_job("notify", notify);

        notes.optimization("scheduled-health-checks");
        ctx.harden(&mut workflow, &mut notes);
        ctx.finish("monitoring.yml", WorkflowType::Monitoring, &workflow, notes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::detection::{ConflictResolver, DetectionResult};
    use crate::templates::TemplateCache;
    use crate::workflow::GenerationOptions;

    #[test]
    fn test_monitoring_jobs() {
        let resolved = ConflictResolver::new().resolve(&DetectionResult::default()).unwrap();
        let ctx = GenerationContext::new(
            Arc::new(resolved),
            GenerationOptions::default(),
            Arc::new(TemplateCache::new()),
        );
        let output = MonitoringGenerator.generate(&ctx).unwrap();
        let doc = output.document().unwrap();

        assert_eq!(doc["on"]["schedule"][0]["cron"].as_str(), Some(MONITORING_SCHEDULE));
        assert_eq!(doc["jobs"]["notify"]["if"].as_str(), Some("failure()"));
        assert_eq!(doc["jobs"]["notify"]["needs"].as_sequence().unwrap().len(), 2);
        assert!(output.metadata.warnings.iter().any(|w| w.contains("deploymentTargets")));
    }

    #[test]
    fn test_metrics_step_writes_summary() {
        let resolved = ConflictResolver::new().resolve(&DetectionResult::default()).unwrap();
        let ctx = GenerationContext::new(
            Arc::new(resolved),
            GenerationOptions::default(),
            Arc::new(TemplateCache::new()),
        );
        let output = MonitoringGenerator.generate(&ctx).unwrap();
        let doc = output.document().unwrap();

        let run = doc["jobs"]["metrics"]["steps"]
            .as_sequence()
            .unwrap()
            .iter()
            .find(|s| s["name"].as_str() == Some("Measure response times"))
            .and_then(|s| s["run"].as_str())
            .unwrap();
        assert!(run.contains("echo \"### Endpoint metrics\" >> \"$GITHUB_STEP_SUMMARY\""));
        assert!(run.trim_end().ends_with("cat metrics.json >> \"$GITHUB_STEP_SUMMARY\""));
    }
}
