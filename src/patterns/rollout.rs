//! Progressive delivery: canary stages, blue-green switches and feature
//! flag rollouts.

use crate::environments::slugify;
use crate::error::{GenerationError, GenerationResult, GenerationWarning};
use crate::generators::deploy::{health_check_step, plan_deploy, DeployRequest};
use crate::generators::{GenerationContext, DEFAULT_TIMEOUT_MINUTES};
use crate::workflow::{
    Concurrency, Job, JobEnvironment, Permissions, Step, Triggers, Workflow, WorkflowOutput,
    WorkflowType,
};

use super::types::{BlueGreenConfig, CanaryConfig, CanaryStageConfig, FeatureFlagsConfig};

fn deploy_triggers(ctx: &GenerationContext) -> Triggers {
    Triggers::manual().on_push([ctx.options().default_branch.as_str()])
}

// ---------------------------------------------------------------------------
// canary
// ---------------------------------------------------------------------------

pub(super) fn canary(
    ctx: &GenerationContext,
    config: &CanaryConfig,
) -> GenerationResult<WorkflowOutput> {
    if config.stages.is_empty() {
        return Err(GenerationError::InvalidInput(
            "canary pattern needs at least one stage".to_string(),
        ));
    }
    if let Some(stage) = config.stages.iter().find(|s| s.percentage > 100) {
        return Err(GenerationError::InvalidInput(format!(
            "canary stage percentage {} exceeds 100",
            stage.percentage
        )));
    }

    let mut notes = ctx.notes();
    for (i, pair) in config.stages.windows(2).enumerate() {
        if pair[1].percentage < pair[0].percentage {
            notes.warn(GenerationWarning::NonMonotonicCanary {
                stage: i + 2,
                previous: pair[0].percentage,
                current: pair[1].percentage,
            });
        }
    }

    let mut workflow = Workflow::new("Canary Deployment", deploy_triggers(ctx))
        .with_concurrency(Concurrency {
            group: "canary-deployment".to_string(),
            cancel_in_progress: false,
        });

    let endpoint = config.metrics_endpoint.clone().unwrap_or_default();
    let mut previous: Option<String> = None;
    for (i, stage) in config.stages.iter().enumerate() {
        let id = format!("canary-stage-{}", i + 1);
        let mut job = canary_stage_job(ctx, i + 1, stage, &endpoint);
        if let Some(prev) = &previous {
            job = job.needs(prev.clone());
        }
        workflow.add_job(id.clone(), job);
        previous = Some(id);
    }

    let last = config.stages.len();
    workflow.add_job(
        "promote",
        Job::new(ctx.runner())
            .named("Promote canary")
            .needs_all(previous)
            .in_environment(JobEnvironment::named("production"))
            .timeout(10)
            .step(ctx.steps().checkout())
            .step(Step::run(
                "Promote to stable",
                "if [ -x ./scripts/canary.sh ]; then\n  ./scripts/canary.sh promote\nelse\n  echo \"Canary promoted to 100%\"\nfi",
            ))
            .step(Step::run(
                "Summarize rollout",
                format!(
                    "echo \"Canary completed {last} stage(s) at ${{{{ github.sha }}}}\" >> \"$GITHUB_STEP_SUMMARY\""
                ),
            )),
    );

    notes.optimization("progressive-traffic-shifting");
    notes.optimization("automated-rollback");

    ctx.harden(&mut workflow, &mut notes);
    ctx.finish("canary-deployment.yml", WorkflowType::Pattern, &workflow, notes)
}

fn canary_stage_job(
    ctx: &GenerationContext,
    number: usize,
    stage: &CanaryStageConfig,
    endpoint: &str,
) -> Job {
    let label = stage.name.clone().unwrap_or_else(|| format!("{}%", stage.percentage));
    let wait = u64::from(stage.duration_minutes) * 60;

    Job::new(ctx.runner())
        .named(format!("Canary stage {number}: {label}"))
        .timeout(stage.duration_minutes.saturating_add(DEFAULT_TIMEOUT_MINUTES))
        .with_env("CANARY_WEIGHT", stage.percentage.to_string())
        .with_env("ERROR_RATE_THRESHOLD", stage.rollback_criteria.error_rate.to_string())
        .with_env("LATENCY_THRESHOLD_MS", stage.rollback_criteria.latency_p99_ms.to_string())
        .with_env("METRICS_ENDPOINT", endpoint)
        .with_output("traffic", stage.percentage.to_string())
        .step(ctx.steps().checkout())
        .step(Step::run(
            format!("Shift {}% of traffic to canary", stage.percentage),
            "if [ -x ./scripts/canary.sh ]; then\n  ./scripts/canary.sh shift \"$CANARY_WEIGHT\"\nelse\n  echo \"Routing $CANARY_WEIGHT% of traffic to canary\"\nfi",
        ))
        .step(Step::run(
            format!("Observe for {} minute(s)", stage.duration_minutes),
            format!("sleep {wait}"),
        ))
        .step(
            Step::run(
                "Analyze canary metrics",
                concat!(
                    "healthy=true\n",
                    "if [ -n \"$METRICS_ENDPOINT\" ]; then\n",
                    "  error_rate=$(curl -fsS \"$METRICS_ENDPOINT/error_rate\" || echo 1)\n",
                    "  latency=$(curl -fsS \"$METRICS_ENDPOINT/latency_p99\" || echo 999999)\n",
                    "  if awk \"BEGIN { exit !($error_rate > $ERROR_RATE_THRESHOLD) }\"; then healthy=false; fi\n",
                    "  if awk \"BEGIN { exit !($latency > $LATENCY_THRESHOLD_MS) }\"; then healthy=false; fi\n",
                    "else\n",
                    "  echo \"No metrics endpoint configured, treating stage as healthy\"\n",
                    "fi\n",
                    "echo \"healthy=$healthy\" >> \"$GITHUB_OUTPUT\"",
                ),
            )
            .id("analysis"),
        )
        .step(
            Step::run(
                "Roll back canary",
                "if [ -x ./scripts/canary.sh ]; then\n  ./scripts/canary.sh rollback\nelse\n  echo \"Routing all traffic back to stable\"\nfi\nexit 1",
            )
            .when("failure() || steps.analysis.outputs.healthy == 'false'"),
        )
}

// ---------------------------------------------------------------------------
// blue-green
// ---------------------------------------------------------------------------

pub(super) fn blue_green(
    ctx: &GenerationContext,
    config: &BlueGreenConfig,
) -> GenerationResult<WorkflowOutput> {
    let mut notes = ctx.notes();
    let path = &config.health_check_path;
    let url_for = |explicit: &Option<String>, var: &str| match explicit {
        Some(url) => format!("{}{path}", url.trim_end_matches('/')),
        None => format!("${{{{ vars.{var} != '' && format('{{0}}{path}', vars.{var}) || '' }}}}"),
    };
    let blue_url = url_for(&config.blue_url, "BLUE_URL");
    let green_url = url_for(&config.green_url, "GREEN_URL");

    let slot_job = |slot: &str, url: &str| {
        Job::new(ctx.runner())
            .named(format!("Deploy {slot}"))
            .timeout(DEFAULT_TIMEOUT_MINUTES)
            .with_env("SLOT", slot)
            .step(ctx.steps().checkout())
            .step(Step::run(
                format!("Deploy to {slot} slot"),
                "if [ -x ./scripts/blue-green.sh ]; then\n  ./scripts/blue-green.sh deploy \"$SLOT\"\nelse\n  echo \"Deploying to $SLOT\"\nfi",
            ))
            .step(Step::run("Warm up", format!("sleep {}", config.warmup_seconds)))
            .step(health_check_step(url))
    };

    let mut workflow = Workflow::new("Blue-Green Deployment", deploy_triggers(ctx))
        .with_concurrency(Concurrency {
            group: "blue-green-deployment".to_string(),
            cancel_in_progress: false,
        })
        .with_job("deploy-blue", slot_job("blue", &blue_url))
        .with_job(
            "deploy-green",
            slot_job("green", &green_url).with_output("healthy", "${{ steps.health.outcome }}"),
        )
        .with_job(
            "switch-traffic",
            Job::new(ctx.runner())
                .named("Switch traffic to green")
                .needs_all(["deploy-blue", "deploy-green"])
                .when("needs.deploy-green.outputs.healthy == 'success'")
                .in_environment(JobEnvironment::named("production"))
                .timeout(10)
                .step(ctx.steps().checkout())
                .step(Step::run(
                    "Switch router to green",
                    "if [ -x ./scripts/blue-green.sh ]; then\n  ./scripts/blue-green.sh switch green\nelse\n  echo \"Routing production traffic to green\"\nfi",
                ))
                .step(health_check_step(&green_url)),
        )
        .with_job(
            "switch-back",
            Job::new(ctx.runner())
                .named("Switch back to blue")
                .needs("switch-traffic")
                .when("failure()")
                .timeout(10)
                .step(ctx.steps().checkout())
                .step(Step::run(
                    "Restore blue",
                    "if [ -x ./scripts/blue-green.sh ]; then\n  ./scripts/blue-green.sh switch blue\nelse\n  echo \"Routing production traffic back to blue\"\nfi",
                )),
        );

    notes.optimization("zero-downtime-switch");
    notes.optimization("instant-rollback");

    ctx.harden(&mut workflow, &mut notes);
    ctx.finish("blue-green-deployment.yml", WorkflowType::Pattern, &workflow, notes)
}

// ---------------------------------------------------------------------------
// feature flags
// ---------------------------------------------------------------------------

pub(super) fn feature_flags(
    ctx: &GenerationContext,
    config: &FeatureFlagsConfig,
) -> GenerationResult<WorkflowOutput> {
    let mut notes = ctx.notes();
    let steps = ctx.steps();

    let plan = plan_deploy(
        &steps,
        ctx.detection().primary_deployment_target(),
        DeployRequest {
            environment: "production",
            production: true,
            oidc: ctx.options().environment_management.include_oidc,
            run_migrations: false,
        },
    );
    for warning in &plan.warnings {
        notes.warn(warning.clone());
    }
    let permissions = plan
        .permissions
        .iter()
        .fold(Permissions::read_contents(), |acc, (scope, level)| acc.with(*scope, *level));

    let mut workflow = Workflow::new("Feature Flag Rollout", deploy_triggers(ctx)).with_job(
        "deploy",
        Job::new(ctx.runner())
            .named("Deploy with flags off")
            .timeout(DEFAULT_TIMEOUT_MINUTES)
            .in_environment(JobEnvironment::named("production"))
            .with_permissions(permissions)
            .steps(steps.prepare(false, false))
            .maybe_step(steps.build())
            .steps(plan.steps),
    );

    if config.flags.is_empty() {
        notes.warn(GenerationWarning::MissingData {
            field: "flags".to_string(),
            detail: "no feature flags configured, only the deploy job was generated".to_string(),
        });
    }

    let provider = config.provider.to_lowercase();
    for flag in &config.flags {
        let slug = slugify(&flag.name);
        if slug.is_empty() {
            return Err(GenerationError::InvalidInput(format!(
                "feature flag name '{}' has no usable characters",
                flag.name
            )));
        }
        let predicates: Vec<String> = flag.rollback_triggers.iter().map(|t| t.predicate()).collect();
        let predicates = serde_json::to_string(&predicates)
            .map_err(|e| GenerationError::generator_failed("feature-flags", "predicates", e.to_string()))?;

        let mut job = Job::new(ctx.runner())
            .named(format!("Roll out {}", flag.name))
            .needs("deploy")
            .timeout(DEFAULT_TIMEOUT_MINUTES)
            .with_env("FLAG_KEY", flag.name.clone())
            .with_env("FLAG_PROVIDER", provider.clone())
            .with_env("ROLLBACK_PREDICATES", predicates)
            .step(steps.checkout());
        for segment in &flag.segments {
            job = job
                .step(
                    Step::run(
                        format!("Enable for {} ({}%)", segment.name, segment.percentage),
                        flag_command(&provider, FlagAction::Rollout),
                    )
                    .env("SEGMENT", segment.name.clone())
                    .env("PERCENTAGE", segment.percentage.to_string()),
                )
                .step(
                    Step::run(
                        "Evaluate rollback predicates",
                        "if [ -x ./scripts/evaluate-flag-metrics.sh ]; then\n  ./scripts/evaluate-flag-metrics.sh \"$FLAG_KEY\" \"$ROLLBACK_PREDICATES\"\nelse\n  echo \"Predicates: $ROLLBACK_PREDICATES\"\nfi",
                    )
                    .env("SEGMENT", segment.name.clone()),
                );
        }
        job = job.step(
            Step::run("Disable flag", flag_command(&provider, FlagAction::Disable))
                .when("failure()"),
        );
        workflow.add_job(format!("rollout-{slug}"), job);
    }

    notes.optimization("decoupled-release");
    ctx.harden(&mut workflow, &mut notes);
    ctx.finish("feature-flags.yml", WorkflowType::Pattern, &workflow, notes)
}

/// What a provider call does to a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    /// Serve the flag to `$PERCENTAGE`% of `$SEGMENT`
    Rollout,
    /// Turn the flag off everywhere
    Disable,
}

/// Shell command for a provider call. Segment and percentage are read from
/// the step's `SEGMENT` and `PERCENTAGE` env, never pasted into the script.
fn flag_command(provider: &str, action: FlagAction) -> &'static str {
    match (provider, action) {
        ("launchdarkly", FlagAction::Rollout) => concat!(
            "body=$(jq -n --arg segment \"$SEGMENT\" --argjson pct \"$PERCENTAGE\" '{\n",
            "  comment: (\"rollout \" + $segment + \" to \" + ($pct | tostring) + \"%\"),\n",
            "  patch: [\n",
            "    {op: \"replace\", path: \"/environments/production/on\", value: true},\n",
            "    {op: \"replace\", path: \"/environments/production/fallthrough/rollout/variations/0/weight\", value: ($pct * 1000)},\n",
            "    {op: \"replace\", path: \"/environments/production/fallthrough/rollout/variations/1/weight\", value: (100000 - $pct * 1000)}\n",
            "  ]\n",
            "}')\n",
            "curl -fsS -X PATCH \"https://app.launchdarkly.com/api/v2/flags/${{ vars.LD_PROJECT_KEY }}/$FLAG_KEY\" \\\n",
            "  -H \"Authorization: ${{ secrets.LAUNCHDARKLY_API_TOKEN }}\" \\\n",
            "  -H \"Content-Type: application/json\" \\\n",
            "  -d \"$body\"",
        ),
        ("launchdarkly", FlagAction::Disable) => concat!(
            "curl -fsS -X PATCH \"https://app.launchdarkly.com/api/v2/flags/${{ vars.LD_PROJECT_KEY }}/$FLAG_KEY\" \\\n",
            "  -H \"Authorization: ${{ secrets.LAUNCHDARKLY_API_TOKEN }}\" \\\n",
            "  -H \"Content-Type: application/json\" \\\n",
            "  -d '{\"comment\": \"automatic rollback\", \"patch\": [{\"op\": \"replace\", \"path\": \"/environments/production/on\", \"value\": false}]}'",
        ),
        ("unleash", FlagAction::Rollout) => concat!(
            "body=$(jq -n --arg segment \"$SEGMENT\" --arg pct \"$PERCENTAGE\" \\\n",
            "  '{name: \"flexibleRollout\", parameters: {rollout: $pct, groupId: $segment, stickiness: \"default\"}}')\n",
            "curl -fsS -X POST \"${{ vars.UNLEASH_URL }}/api/admin/features/$FLAG_KEY/environments/production/strategies\" \\\n",
            "  -H \"Authorization: ${{ secrets.UNLEASH_API_TOKEN }}\" \\\n",
            "  -H \"Content-Type: application/json\" \\\n",
            "  -d \"$body\"",
        ),
        ("unleash", FlagAction::Disable) => concat!(
            "curl -fsS -X POST \"${{ vars.UNLEASH_URL }}/api/admin/features/$FLAG_KEY/environments/production/off\" \\\n",
            "  -H \"Authorization: ${{ secrets.UNLEASH_API_TOKEN }}\"",
        ),
        ("flagsmith", FlagAction::Rollout) => concat!(
            "body=$(jq -n --arg segment \"$SEGMENT\" --argjson pct \"$PERCENTAGE\" '{segment: $segment, percentage: $pct, enabled: true}')\n",
            "curl -fsS -X PATCH \"https://api.flagsmith.com/api/v1/features/$FLAG_KEY/\" \\\n",
            "  -H \"Authorization: Api-Key ${{ secrets.FLAGSMITH_API_KEY }}\" \\\n",
            "  -H \"Content-Type: application/json\" \\\n",
            "  -d \"$body\"",
        ),
        ("flagsmith", FlagAction::Disable) => concat!(
            "curl -fsS -X PATCH \"https://api.flagsmith.com/api/v1/features/$FLAG_KEY/\" \\\n",
            "  -H \"Authorization: Api-Key ${{ secrets.FLAGSMITH_API_KEY }}\" \\\n",
            "  -H \"Content-Type: application/json\" \\\n",
            "  -d '{\"enabled\": false}'",
        ),
        (_, FlagAction::Rollout) => concat!(
            "if [ -x ./scripts/feature-flag.sh ]; then\n",
            "  ./scripts/feature-flag.sh \"$FLAG_KEY\" \"$SEGMENT\" \"$PERCENTAGE\"\n",
            "else\n",
            "  echo \"Set $FLAG_KEY for $SEGMENT to $PERCENTAGE%\"\n",
            "fi",
        ),
        (_, FlagAction::Disable) => concat!(
            "if [ -x ./scripts/feature-flag.sh ]; then\n",
            "  ./scripts/feature-flag.sh \"$FLAG_KEY\" --disable\n",
            "else\n",
            "  echo \"Disabled $FLAG_KEY\"\n",
            "fi",
        ),
    }
}
