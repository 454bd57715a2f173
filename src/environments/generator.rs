//! Per-environment deploy workflows, promotion and emergency rollback.

use std::collections::HashSet;

use tracing::info;

use crate::error::{GenerationError, GenerationResult};
use crate::generators::deploy::{
    health_check_step, plan_deploy, DeployPlan, DeployRequest, DeployTarget,
};
use crate::generators::{GenerationContext, DEFAULT_TIMEOUT_MINUTES};
use crate::templates::StepLibrary;
use crate::workflow::{
    expression_string, Concurrency, DispatchInput, GenerationNotes, Job, JobEnvironment, PermissionLevel,
    Permissions, Step, Triggers, Workflow, WorkflowDispatch, WorkflowOutput, WorkflowType,
};

use super::secrets::{management_permissions, management_steps, required_secrets, ManagedEnvironment};
use super::strategy::{approval_gate_for, promotion_pipelines, rollback_for, strategy_for};
use super::types::{
    ApprovalGate, DeploymentStrategyConfig, EnvironmentConfig, EnvironmentType, MultiEnvResult,
    PromotionPipeline, RollbackConfig, RollbackStrategy, StrategyAssignment,
};

/// Production deploys run on weekday mornings (10:00 UTC).
pub const PRODUCTION_SCHEDULE: &str = "0 10 * * 1-5";

const COMPONENT: &str = "multi-environment";

/// Generates the workflows and derived settings for an ordered environment list.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiEnvironmentGenerator;

impl MultiEnvironmentGenerator {
    pub fn generate(
        &self,
        ctx: &GenerationContext,
        environments: &[EnvironmentConfig],
    ) -> GenerationResult<MultiEnvResult> {
        validate_environments(environments)?;

        let mut result = MultiEnvResult::default();

        for env in environments {
            let gate = approval_gate_for(env);
            let strategy = strategy_for(env);
            let rollback = rollback_for(env);

            let output = deploy_workflow(ctx, env, gate.as_ref(), &strategy, rollback.as_ref())?;
            result.workflows.push(output);

            result.approval_gates.extend(gate);
            result
                .strategies
                .push(StrategyAssignment { environment: env.name.clone(), strategy });
            result.rollbacks.extend(rollback);
        }

        let (promotions, promotion_warnings) = promotion_pipelines(environments);
        if environments.len() >= 2 {
            let mut notes = ctx.notes();
            for warning in &promotion_warnings {
                notes.warn(warning.clone());
            }
            result.workflows.push(promotion_workflow(ctx, environments, &promotions, notes)?);
        }
        result.promotions = promotions;

        if !result.rollbacks.is_empty() {
            result
                .workflows
                .push(rollback_workflow(ctx, environments, &result.rollbacks)?);
        }

        for warning in promotion_warnings.iter().map(ToString::to_string).chain(
            result.workflows.iter().flat_map(|w| w.metadata.warnings.iter().cloned()),
        ) {
            if !result.warnings.contains(&warning) {
                result.warnings.push(warning);
            }
        }

        info!(
            environments = environments.len(),
            workflows = result.workflows.len(),
            warnings = result.warnings.len(),
            "generated multi-environment workflows"
        );
        Ok(result)
    }
}

fn validate_environments(environments: &[EnvironmentConfig]) -> GenerationResult<()> {
    if environments.is_empty() {
        return Err(GenerationError::InvalidInput(
            "at least one environment is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for env in environments {
        let slug = env.slug();
        if slug.is_empty() {
            return Err(GenerationError::InvalidInput(format!(
                "environment name '{}' is empty or has no usable characters",
                env.name
            )));
        }
        if !seen.insert(slug) {
            return Err(GenerationError::InvalidInput(format!(
                "duplicate environment name '{}'",
                env.name
            )));
        }
    }
    Ok(())
}

fn environment_triggers(env: &EnvironmentConfig, default_branch: &str) -> Triggers {
    match env.environment_type {
        EnvironmentType::Development => {
            let mut branches = vec![default_branch.to_string()];
            if default_branch != "develop" {
                branches.push("develop".to_string());
            }
            Triggers::manual().on_push(branches)
        }
        EnvironmentType::Staging => Triggers::manual().on_push([default_branch]),
        EnvironmentType::Production => Triggers::manual().on_schedule(PRODUCTION_SCHEDULE),
    }
}

/// Environment variable holding an environment's URL, e.g. `STAGING_URL`.
fn url_variable(env: &EnvironmentConfig) -> String {
    format!("{}_URL", env.slug().to_uppercase().replace('-', "_"))
}

fn scoped_permissions(scopes: impl IntoIterator<Item = (&'static str, PermissionLevel)>) -> Permissions {
    scopes
        .into_iter()
        .fold(Permissions::read_contents(), |acc, (scope, level)| acc.with(scope, level))
}

fn ships_build_output(target: Option<DeployTarget>) -> bool {
    !matches!(
        target,
        Some(DeployTarget::Docker | DeployTarget::Kubernetes | DeployTarget::Vercel | DeployTarget::Heroku)
    )
}

fn approval_job(runner: &str, env: &EnvironmentConfig, gate: &ApprovalGate) -> Job {
    Job::new(runner)
        .named(format!("Approve {}", env.name))
        .in_environment(JobEnvironment::named(format!("{}-approval", env.slug())))
        .timeout(5)
        .step(
            Step::run(
                "Record approval",
                format!(
                    "echo \"{} approval(s) from {} granted for $TARGET_ENVIRONMENT\" >> \"$GITHUB_STEP_SUMMARY\"",
                    gate.required_approvals,
                    gate.approvers.join(", "),
                ),
            )
            .env("TARGET_ENVIRONMENT", env.name.clone()),
        )
}

fn deploy_workflow(
    ctx: &GenerationContext,
    env: &EnvironmentConfig,
    gate: Option<&ApprovalGate>,
    strategy: &DeploymentStrategyConfig,
    rollback: Option<&RollbackConfig>,
) -> GenerationResult<WorkflowOutput> {
    let options = ctx.options();
    let detection = ctx.detection();
    let steps = ctx.steps();
    let mut notes = ctx.notes();
    let management = &options.environment_management;
    let slug = env.slug();
    let caching = options.optimization_level.caches() && !ctx.toolchain().is_generic();

    let mut workflow = Workflow::new(
        format!("Deploy to {}", env.name),
        environment_triggers(env, &options.default_branch),
    )
    .with_concurrency(Concurrency {
        group: format!("deploy-{slug}"),
        cancel_in_progress: false,
    });

    if let Some(gate) = gate {
        workflow.add_job("approval", approval_job(ctx.runner(), env, gate));
        notes.optimization("approval-gate");
    }

    let target = detection.primary_deployment_target();
    let deploy_target = target.and_then(|t| DeployTarget::from_platform(&t.platform));
    let plan = plan_deploy(
        &steps,
        target,
        DeployRequest {
            environment: &slug,
            production: env.is_production(),
            oidc: management.include_oidc,
            run_migrations: true,
        },
    );
    for warning in &plan.warnings {
        notes.warn(warning.clone());
    }

    let declared: Vec<String> = env.secrets.iter().chain(&plan.secrets).cloned().collect();
    let secrets = required_secrets(detection, &declared, management);
    let managed = management_steps(
        &steps,
        detection,
        management,
        ManagedEnvironment {
            name: &slug,
            secrets: &secrets,
            variables: &env.variables,
            credentials_configured: plan.configures_credentials,
        },
    );
    if !managed.is_empty() {
        notes.optimization("environment-management");
    }

    let url = env
        .url
        .clone()
        .or_else(|| plan.url_output.clone())
        .unwrap_or_else(|| "${{ vars.HEALTH_CHECK_URL }}".to_string());
    let rollout = serde_json::to_string(strategy)
        .map_err(|e| GenerationError::generator_failed(COMPONENT, "strategy", e.to_string()))?;

    let mut deploy = Job::new(ctx.runner())
        .named(format!("Deploy to {}", env.name))
        .in_environment(JobEnvironment::named(env.name.clone()).with_url(url.clone()))
        .timeout(DEFAULT_TIMEOUT_MINUTES)
        .with_env("DEPLOY_ENVIRONMENT", slug.clone())
        .with_env("DEPLOYMENT_STRATEGY", strategy.strategy().as_str())
        .with_env("ROLLOUT_CONFIG", rollout)
        .with_output("url", url.clone());
    for (key, value) in &env.variables {
        deploy = deploy.with_env(key.clone(), value.clone());
    }
    if gate.is_some() {
        deploy = deploy.needs("approval");
    }

    let builds_here = ships_build_output(deploy_target);
    let migrates = ctx.toolchain().framework.and_then(|f| f.migration).is_some();
    deploy = if builds_here || migrates {
        deploy.steps(steps.prepare(caching, false))
    } else {
        deploy.step(steps.checkout())
    };
    if builds_here {
        deploy = deploy.maybe_step(steps.build());
    }
    deploy = deploy
        .steps(managed)
        .steps(plan.steps)
        .step(health_check_step(&url));

    let scopes: Vec<_> =
        plan.permissions.iter().copied().chain(management_permissions(management)).collect();
    deploy = deploy.with_permissions(scoped_permissions(scopes));
    workflow.add_job("deploy", deploy);

    let validate = Job::new(ctx.runner())
        .named(format!("Validate {}", env.name))
        .needs("deploy")
        .timeout(15)
        .step(steps.checkout())
        .step(health_check_step("${{ needs.deploy.outputs.url }}"))
        .step(
            Step::run(
                "Run smoke tests",
                "if [ -x ./scripts/smoke-test.sh ]; then\n  ./scripts/smoke-test.sh \"$BASE_URL\"\nelse\n  echo \"No smoke tests found, health check only\"\nfi",
            )
            .env("BASE_URL", "${{ needs.deploy.outputs.url }}"),
        )
        .step(Step::run(
            "Record deployment",
            format!(
                "echo \"Deployed ${{{{ github.sha }}}} to {} ({})\" >> \"$GITHUB_STEP_SUMMARY\"",
                env.name,
                strategy.strategy()
            ),
        ));
    workflow.add_job("validate", validate);

    if let Some(rollback) = rollback {
        let plan = rollback_plan(&steps, ctx, env, rollback, "${{ github.event.before }}");
        workflow.add_job(
            "rollback",
            Job::new(ctx.runner())
                .named(format!("Roll back {}", env.name))
                .needs_all(["deploy", "validate"])
                .when("failure()")
                .in_environment(JobEnvironment::named(env.name.clone()))
                .timeout(20)
                .with_permissions(scoped_permissions(plan.permissions.iter().copied()))
                .steps(plan.steps),
        );
        notes.optimization("automatic-rollback");
    }

    notes.optimization(format!("{}-strategy", strategy.strategy()));
    ctx.harden(&mut workflow, &mut notes);
    ctx.finish(&format!("deploy-{slug}.yml"), WorkflowType::MultiEnvironment, &workflow, notes)
}

/// Steps restoring the previous release of an environment.
///
/// `restore_ref` is an expression naming the release to restore; when it
/// evaluates to an empty string the previous tag (or parent commit) is used.
fn rollback_plan(
    steps: &StepLibrary<'_>,
    ctx: &GenerationContext,
    env: &EnvironmentConfig,
    rollback: &RollbackConfig,
    restore_ref: &str,
) -> DeployPlan {
    let slug = env.slug();
    let target = ctx.detection().primary_deployment_target();
    let kubernetes = target
        .and_then(|t| DeployTarget::from_platform(&t.platform))
        .is_some_and(|t| t == DeployTarget::Kubernetes);

    match rollback.strategy {
        RollbackStrategy::Immediate if kubernetes => DeployPlan {
            steps: vec![
                Step::uses("Set up kubectl", steps.action("azure/setup-kubectl")),
                Step::uses("Set Kubernetes context", steps.action("azure/k8s-set-context"))
                    .with("method", "kubeconfig")
                    .with("kubeconfig", "${{ secrets.KUBE_CONFIG }}"),
                Step::run(
                    "Undo rollout",
                    format!("kubectl rollout undo deployment/app -n {slug}\nkubectl rollout status deployment/app -n {slug} --timeout=300s"),
                ),
            ],
            ..DeployPlan::default()
        },
        RollbackStrategy::Immediate => DeployPlan {
            steps: vec![
                steps.checkout(),
                Step::run(
                    "Switch traffic back",
                    format!("if [ -x ./scripts/switch-traffic.sh ]; then\n  ./scripts/switch-traffic.sh {slug} previous\nelse\n  echo \"::error::scripts/switch-traffic.sh is required for blue-green rollback\"\n  exit 1\nfi"),
                ),
            ],
            ..DeployPlan::default()
        },
        RollbackStrategy::RedeployPrevious => {
            let mut plan = plan_deploy(
                steps,
                target,
                DeployRequest {
                    environment: &slug,
                    production: env.is_production(),
                    oidc: ctx.options().environment_management.include_oidc,
                    run_migrations: false,
                },
            );
            let mut restore = vec![
                steps.checkout().with("fetch-depth", "0"),
                Step::run(
                    "Check out previous release",
                    "if [ -z \"$RESTORE_REF\" ] || [ \"$RESTORE_REF\" = \"0000000000000000000000000000000000000000\" ]; then\n  RESTORE_REF=$(git describe --tags --abbrev=0 HEAD^ 2>/dev/null || git rev-parse HEAD^)\nfi\necho \"Restoring $RESTORE_REF\"\ngit checkout \"$RESTORE_REF\"",
                )
                .env("RESTORE_REF", restore_ref),
            ];
            restore.extend(steps.setup(false));
            restore.extend(steps.install());
            restore.extend(steps.build());
            restore.append(&mut plan.steps);
            plan.steps = restore;
            plan
        }
    }
}

fn rollback_workflow(
    ctx: &GenerationContext,
    environments: &[EnvironmentConfig],
    rollbacks: &[RollbackConfig],
) -> GenerationResult<WorkflowOutput> {
    let steps = ctx.steps();
    let mut notes = ctx.notes();

    let names: Vec<String> = rollbacks.iter().map(|r| r.environment.clone()).collect();
    let triggers = Triggers::default().with_dispatch_inputs(
        WorkflowDispatch::default()
            .with_input("environment", DispatchInput::choice("Environment to roll back", names))
            .with_input(
                "ref",
                DispatchInput::string("Release to restore (defaults to the previous release)", false),
            ),
    );
    let mut workflow = Workflow::new("Emergency Rollback", triggers);

    for rollback in rollbacks {
        let Some(env) = environments.iter().find(|e| e.name == rollback.environment) else {
            continue;
        };
        let plan = rollback_plan(&steps, ctx, env, rollback, "${{ inputs.ref }}");
        for warning in &plan.warnings {
            notes.warn(warning.clone());
        }
        let job = Job::new(ctx.runner())
            .named(format!("Roll back {}", env.name))
            .when(format!("inputs.environment == {}", expression_string(&env.name)))
            .in_environment(JobEnvironment::named(env.name.clone()))
            .timeout(20)
            .with_env("ROLLBACK_STRATEGY", rollback.strategy.as_str())
            .with_env("ROLLBACK_TRIGGERS", rollback.triggers.join(","))
            .with_permissions(scoped_permissions(plan.permissions.iter().copied()))
            .steps(plan.steps);
        workflow.add_job(format!("rollback-{}", env.slug()), job);
    }

    notes.optimization("emergency-rollback");
    ctx.harden(&mut workflow, &mut notes);
    ctx.finish("emergency-rollback.yml", WorkflowType::MultiEnvironment, &workflow, notes)
}

fn promotion_workflow(
    ctx: &GenerationContext,
    environments: &[EnvironmentConfig],
    promotions: &[PromotionPipeline],
    mut notes: GenerationNotes,
) -> GenerationResult<WorkflowOutput> {
    let targets: Vec<String> = promotions.iter().map(|p| p.target_environment.clone()).collect();
    let mut triggers = Triggers::default().with_dispatch_inputs(
        WorkflowDispatch::default()
            .with_input("target", DispatchInput::choice("Environment to promote into", targets)),
    );

    let mut sources: Vec<String> = Vec::new();
    for promotion in promotions.iter().filter(|p| p.auto_promote) {
        let workflow_name = format!("Deploy to {}", promotion.source_environment);
        if !sources.contains(&workflow_name) {
            sources.push(workflow_name);
        }
    }
    if !sources.is_empty() {
        triggers = triggers.on_workflow_run(sources);
    }

    let mut workflow = Workflow::new("Promotion", triggers)
        .with_permissions(Permissions::read_contents().with("actions", PermissionLevel::Write));

    let find = |name: &str| environments.iter().find(|e| e.name == name);
    for promotion in promotions {
        let (Some(source), Some(target)) =
            (find(&promotion.source_environment), find(&promotion.target_environment))
        else {
            continue;
        };

        let manual = format!(
            "github.event_name == 'workflow_dispatch' && inputs.target == '{}'",
            target.name
        );
        let condition = if promotion.auto_promote {
            format!(
                "(github.event_name == 'workflow_run' && github.event.workflow_run.conclusion == 'success' && github.event.workflow_run.name == 'Deploy to {}') || ({manual})",
                source.name
            )
        } else {
            manual
        };

        let source_url = source
            .url
            .clone()
            .unwrap_or_else(|| format!("${{{{ vars.{} }}}}", url_variable(source)));
        let checklist = promotion
            .conditions
            .iter()
            .map(|c| format!("echo \"- {c}\" >> \"$GITHUB_STEP_SUMMARY\""))
            .collect::<Vec<_>>()
            .join("\n");

        let mut job = Job::new(ctx.runner())
            .named(format!("Promote {} to {}", source.name, target.name))
            .when(condition)
            .timeout(15)
            .step(Step::run(
                "Check promotion conditions",
                format!(
                    "echo \"### Promotion {} -> {}\" >> \"$GITHUB_STEP_SUMMARY\"\n{checklist}",
                    source.name, target.name
                ),
            ))
            .step(health_check_step(&source_url))
            .step(
                Step::run(
                    format!("Trigger deployment to {}", target.name),
                    format!(
                        "gh workflow run deploy-{}.yml --repo \"$GITHUB_REPOSITORY\" --ref \"$PROMOTE_REF\"",
                        target.slug()
                    ),
                )
                .env("GH_TOKEN", "${{ secrets.GITHUB_TOKEN }}")
                .env(
                    "PROMOTE_REF",
                    "${{ github.event.workflow_run.head_branch || github.ref_name }}",
                ),
            );
        if target.requires_approval() {
            job = job.in_environment(JobEnvironment::named(format!("{}-approval", target.slug())));
        }
        workflow.add_job(format!("promote-{}-to-{}", source.slug(), target.slug()), job);
    }

    notes.optimization("environment-promotion");
    ctx.harden(&mut workflow, &mut notes);
    ctx.finish("promotion.yml", WorkflowType::MultiEnvironment, &workflow, notes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::detection::{ConflictResolver, DetectionResult};
    use crate::environments::DeploymentStrategy;
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

    const NODE_DOCKER: &str = r#"{
        "frameworks": [{"name": "express", "confidence": 0.9, "category": "backend"}],
        "languages": [{"name": "javascript", "confidence": 0.9, "primary": true}],
        "packageManagers": [{"name": "npm", "confidence": 0.9}],
        "deploymentTargets": [{"platform": "docker", "confidence": 0.9}]
    }"#;

    fn pipeline() -> Vec<EnvironmentConfig> {
        vec![
            EnvironmentConfig::new("dev", EnvironmentType::Development).with_rollback(),
            EnvironmentConfig::new("staging", EnvironmentType::Staging)
                .with_variable("LOG_LEVEL", "debug"),
            EnvironmentConfig::new("prod", EnvironmentType::Production)
                .with_approval()
                .with_strategy(DeploymentStrategy::BlueGreen)
                .with_rollback()
                .with_url("https://example.com"),
        ]
    }

    #[test]
    fn test_rejects_empty_and_duplicate_lists() {
        let ctx = context("{}");
        let err = MultiEnvironmentGenerator.generate(&ctx, &[]).unwrap_err();
        assert_eq!(err.kind(), "invalid-input");

        let envs = vec![
            EnvironmentConfig::new("prod", EnvironmentType::Production),
            EnvironmentConfig::new("Prod", EnvironmentType::Production),
        ];
        let err = MultiEnvironmentGenerator.generate(&ctx, &envs).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_full_pipeline_outputs() {
        let ctx = context(NODE_DOCKER);
        let result = MultiEnvironmentGenerator.generate(&ctx, &pipeline()).unwrap();

        let files: Vec<&str> = result.workflows.iter().map(|w| w.filename.as_str()).collect();
        assert_eq!(
            files,
            vec![
                "deploy-dev.yml",
                "deploy-staging.yml",
                "deploy-prod.yml",
                "promotion.yml",
                "emergency-rollback.yml"
            ]
        );
        assert_eq!(result.approval_gates.len(), 1);
        assert_eq!(result.strategies.len(), 3);
        assert_eq!(result.promotions.len(), 2);
        assert!(!result.promotions[1].auto_promote);

        let rolled_back: Vec<&str> =
            result.rollbacks.iter().map(|r| r.environment.as_str()).collect();
        assert_eq!(rolled_back, vec!["dev", "prod"]);
    }

    #[test]
    fn test_deploy_job_graph_and_triggers() {
        let ctx = context(NODE_DOCKER);
        let result = MultiEnvironmentGenerator.generate(&ctx, &pipeline()).unwrap();

        let prod = result.workflow("deploy-prod.yml").unwrap().document().unwrap();
        assert_eq!(prod["jobs"]["deploy"]["needs"][0].as_str(), Some("approval"));
        assert_eq!(prod["jobs"]["validate"]["needs"][0].as_str(), Some("deploy"));
        assert_eq!(prod["jobs"]["deploy"]["environment"]["name"].as_str(), Some("prod"));
        assert_eq!(prod["on"]["schedule"][0]["cron"].as_str(), Some(PRODUCTION_SCHEDULE));
        assert!(prod["on"].get("workflow_dispatch").is_some());
        assert_eq!(prod["jobs"]["deploy"]["env"]["DEPLOYMENT_STRATEGY"].as_str(), Some("blue-green"));

        let dev = result.workflow("deploy-dev.yml").unwrap().document().unwrap();
        let branches: Vec<&str> = dev["on"]["push"]["branches"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|b| b.as_str())
            .collect();
        assert_eq!(branches, vec!["main", "develop"]);
        assert!(dev["jobs"].get("approval").is_none());
        assert_eq!(dev["jobs"]["rollback"]["if"].as_str(), Some("failure()"));

        let staging = result.workflow("deploy-staging.yml").unwrap();
        assert!(staging.content.contains("LOG_LEVEL: debug"));
        assert!(staging.content.contains("docker/build-push-action@v6"));
    }

    #[test]
    fn test_rollback_workflow_has_job_per_enabled_environment() {
        let ctx = context(NODE_DOCKER);
        let result = MultiEnvironmentGenerator.generate(&ctx, &pipeline()).unwrap();
        let doc = result.workflow("emergency-rollback.yml").unwrap().document().unwrap();
        let jobs: Vec<&str> =
            doc["jobs"].as_mapping().unwrap().keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(jobs, vec!["rollback-dev", "rollback-prod"]);
        assert_eq!(doc["jobs"]["rollback-prod"]["env"]["ROLLBACK_STRATEGY"].as_str(), Some("immediate"));
    }

    #[test]
    fn test_single_environment_has_no_promotion() {
        let ctx = context(NODE_DOCKER);
        let envs = vec![EnvironmentConfig::new("prod", EnvironmentType::Production)];
        let result = MultiEnvironmentGenerator.generate(&ctx, &envs).unwrap();
        assert_eq!(result.workflows.len(), 1);
        assert!(result.promotions.is_empty());
        assert!(result.rollbacks.is_empty());
    }

    #[test]
    fn test_unknown_promotion_source_is_warning() {
        let ctx = context(NODE_DOCKER);
        let envs = vec![
            EnvironmentConfig::new("staging", EnvironmentType::Staging),
            EnvironmentConfig::new("prod", EnvironmentType::Production).promoted_from("qa"),
        ];
        let result = MultiEnvironmentGenerator.generate(&ctx, &envs).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("'qa'")));
        let promotion = result.workflow("promotion.yml").unwrap();
        assert!(promotion.metadata.warnings.iter().any(|w| w.contains("'qa'")));
    }

    #[test]
    fn test_promotion_only_auto_triggers_non_production() {
        let ctx = context(NODE_DOCKER);
        let result = MultiEnvironmentGenerator.generate(&ctx, &pipeline()).unwrap();
        let doc = result.workflow("promotion.yml").unwrap().document().unwrap();

        let watched: Vec<&str> = doc["on"]["workflow_run"]["workflows"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|w| w.as_str())
            .collect();
        assert_eq!(watched, vec!["Deploy to dev"]);
        let prod_condition = doc["jobs"]["promote-staging-to-prod"]["if"].as_str().unwrap();
        assert!(!prod_condition.contains("workflow_run"));
    }
}
