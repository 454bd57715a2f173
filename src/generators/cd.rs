//! Continuous deployment workflow: build, deploy, health check.

use std::collections::BTreeMap;

use crate::environments::secrets::{
    management_permissions, management_steps, required_secrets, ManagedEnvironment,
};
use crate::error::GenerationResult;
use crate::workflow::{
    expression_string, Concurrency, EventFilter, Job, JobEnvironment, Permissions, Triggers, Workflow,
    WorkflowOutput, WorkflowType,
};

use super::deploy::{health_check_step, plan_deploy, DeployRequest, DeployTarget};
use super::{GenerationContext, WorkflowGenerator, DEFAULT_TIMEOUT_MINUTES};

/// Deploys the default branch and release tags to the primary target.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdGenerator;

impl WorkflowGenerator for CdGenerator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Cd
    }

    fn component(&self) -> &'static str {
        "cd"
    }

    fn generate(&self, ctx: &GenerationContext) -> GenerationResult<WorkflowOutput> {
        let options = ctx.options();
        let detection = ctx.detection();
        let steps = ctx.steps();
        let mut notes = ctx.notes();
        let management = &options.environment_management;

        let target = detection.primary_deployment_target();
        let deploy_target = target.and_then(|t| DeployTarget::from_platform(&t.platform));
        let caching = options.optimization_level.caches() && !ctx.toolchain().is_generic();
        if caching {
            notes.optimization("dependency-caching");
        }

        let mut build = Job::new(ctx.runner())
            .named("Build")
            .timeout(DEFAULT_TIMEOUT_MINUTES)
            .steps(steps.prepare(caching, false))
            .maybe_step(steps.build());
        if options.security_level.is_enterprise() {
            build = build.step(steps.audit());
            notes.optimization("dependency-audit");
        }
        let ships_build_output = !matches!(
            deploy_target,
            Some(DeployTarget::Docker | DeployTarget::Kubernetes | DeployTarget::Vercel | DeployTarget::Heroku)
        );
        if ships_build_output {
            build = build.maybe_step(steps.upload_artifact("build-output"));
        }

        let plan = plan_deploy(
            &steps,
            target,
            DeployRequest {
                environment: "production",
                production: true,
                oidc: management.include_oidc,
                run_migrations: true,
            },
        );
        for warning in &plan.warnings {
            notes.warn(warning.clone());
        }

        let secrets = required_secrets(detection, &plan.secrets, management);
        let variables = BTreeMap::new();
        let managed = management_steps(
            &steps,
            detection,
            management,
            ManagedEnvironment {
                name: "production",
                secrets: &secrets,
                variables: &variables,
                credentials_configured: plan.configures_credentials,
            },
        );
        if !managed.is_empty() {
            notes.optimization("environment-management");
        }

        let mut environment = JobEnvironment::named("production");
        if let Some(url) = &plan.url_output {
            environment = environment.with_url(url.clone());
        }

        let mut deploy = Job::new(ctx.runner())
            .named("Deploy")
            .needs("build")
            .when(format!(
                "github.event_name != 'pull_request' && (github.ref == {} || startsWith(github.ref, 'refs/tags/v'))",
                expression_string(&format!("refs/heads/{}", options.default_branch))
            ))
            .in_environment(environment)
            .timeout(DEFAULT_TIMEOUT_MINUTES)
            .step(steps.checkout());
        if ships_build_output {
            deploy = deploy.maybe_step(steps.download_artifact("build-output"));
        }
        if ctx.toolchain().framework.and_then(|f| f.migration).is_some() {
            deploy = deploy.steps(steps.setup(false)).maybe_step(steps.install());
        }
        deploy = deploy.steps(managed).steps(plan.steps);
        if let Some(url) = &plan.url_output {
            deploy = deploy.with_output("url", url.clone());
        }

        let mut permissions = plan.permissions.clone();
        permissions.extend(management_permissions(management));
        if !permissions.is_empty() {
            let scoped = permissions
                .into_iter()
                .fold(Permissions::read_contents(), |acc, (scope, level)| acc.with(scope, level));
            deploy = deploy.with_permissions(scoped);
        }

        let health = Job::new(ctx.runner())
            .named("Health check")
            .needs("deploy")
            .timeout(10)
            .step(health_check_step("${{ needs.deploy.outputs.url || vars.HEALTH_CHECK_URL }}"));

        let mut triggers = Triggers::manual();
        triggers.push =
            Some(EventFilter::branches([options.default_branch.as_str()]).with_tags(["v*"]));

        let mut workflow = Workflow::new("CD", triggers)
            .with_job("build", build)
            .with_job("deploy", deploy)
            .with_job("health-check", health)
            .with_concurrency(Concurrency {
                group: "cd-${{ github.ref }}".to_string(),
                cancel_in_progress: false,
            });

        ctx.harden(&mut workflow, &mut notes);
        ctx.finish("cd.yml", WorkflowType::Cd, &workflow, notes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::detection::{ConflictResolver, DetectionResult};
    use crate::templates::TemplateCache;
    use crate::workflow::{EnvironmentManagement, GenerationOptions};

    fn context(json: &str, options: GenerationOptions) -> GenerationContext {
        let detection = DetectionResult::from_json(json).unwrap();
        let resolved = ConflictResolver::new().resolve(&detection).unwrap();
        GenerationContext::new(Arc::new(resolved), options, Arc::new(TemplateCache::new()))
    }

    const NEXT_VERCEL: &str = r#"{
        "frameworks": [{"name": "next", "confidence": 0.9, "category": "fullstack"}],
        "languages": [{"name": "typescript", "confidence": 0.9, "primary": true}],
        "packageManagers": [{"name": "npm", "confidence": 0.9}],
        "deploymentTargets": [{"platform": "vercel", "confidence": 0.85}]
    }"#;

    #[test]
    fn test_cd_job_chain() {
        let output = CdGenerator.generate(&context(NEXT_VERCEL, GenerationOptions::default())).unwrap();
        let doc = output.document().unwrap();
        let jobs = doc["jobs"].as_mapping().unwrap();
        let ids: Vec<&str> = jobs.keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(ids, vec!["build", "deploy", "health-check"]);
        assert_eq!(doc["jobs"]["deploy"]["needs"][0].as_str(), Some("build"));
        assert_eq!(doc["jobs"]["health-check"]["needs"][0].as_str(), Some("deploy"));
        assert!(output.content.contains("amondnet/vercel-action@v25"));
        assert_eq!(doc["jobs"]["deploy"]["environment"]["name"].as_str(), Some("production"));
        assert!(doc["on"]["pull_request"].is_null());
    }

    #[test]
    fn test_unknown_target_falls_back() {
        let json = r#"{
            "languages": [{"name": "go", "confidence": 0.9, "primary": true}],
            "deploymentTargets": [{"platform": "fly.io", "confidence": 0.9}]
        }"#;
        let output = CdGenerator.generate(&context(json, GenerationOptions::default())).unwrap();
        assert!(output.metadata.warnings.iter().any(|w| w.contains("fly.io")));
        assert!(output.content.contains("scripts/deploy.sh"));
    }

    #[test]
    fn test_environment_management_steps() {
        let options = GenerationOptions::builder()
            .environment_management(EnvironmentManagement {
                include_secret_validation: true,
                include_oidc: true,
                auto_detect_secrets: true,
                ..Default::default()
            })
            .build();
        let output = CdGenerator.generate(&context(NEXT_VERCEL, options)).unwrap();
        let doc = output.document().unwrap();
        assert_eq!(doc["jobs"]["deploy"]["permissions"]["id-token"].as_str(), Some("write"));
        assert!(output.content.contains("Validate required secrets"));
        assert!(output.content.contains("VERCEL_TOKEN: ${{ secrets.VERCEL_TOKEN }}"));
        assert!(output.content.contains("NEXTAUTH_SECRET"));
    }
}
