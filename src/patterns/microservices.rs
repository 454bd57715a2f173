//! Ordered microservice deployment.

use crate::environments::slugify;
use crate::error::{GenerationError, GenerationResult};
use crate::generators::deploy::{health_check_step, DeployTarget};
use crate::generators::{GenerationContext, DEFAULT_TIMEOUT_MINUTES};
use crate::templates::StepLibrary;
use crate::workflow::{
    Job, PermissionLevel, Permissions, Step, Triggers, Workflow, WorkflowOutput, WorkflowType,
};

use super::graph::DependencyGraph;
use super::types::{MicroservicesConfig, ServiceConfig};

pub(super) fn generate(
    ctx: &GenerationContext,
    config: &MicroservicesConfig,
) -> GenerationResult<WorkflowOutput> {
    if config.services.is_empty() {
        return Err(GenerationError::InvalidInput(
            "microservices pattern needs at least one service".to_string(),
        ));
    }

    let mut graph = DependencyGraph::new();
    for service in &config.services {
        if slugify(&service.name).is_empty() || graph.contains(&service.name) {
            return Err(GenerationError::InvalidInput(format!(
                "duplicate or empty service name '{}'",
                service.name
            )));
        }
        graph.add_node(service.name.clone());
    }
    for service in &config.services {
        for dependency in &service.dependencies {
            graph.add_dependency(&service.name, dependency)?;
        }
    }
    let order = graph.sorted_names()?;

    let mut notes = ctx.notes();
    let steps = ctx.steps();
    let kubernetes = ctx
        .detection()
        .deployment_targets
        .iter()
        .any(|t| DeployTarget::from_platform(&t.platform) == Some(DeployTarget::Kubernetes));

    let triggers = Triggers::manual().on_push([ctx.options().default_branch.as_str()]);
    let mut workflow = Workflow::new("Microservices", triggers).with_permissions(
        Permissions::read_contents().with("packages", PermissionLevel::Write),
    );

    let mut deploy_jobs = Vec::with_capacity(order.len());
    for name in &order {
        let Some(service) = config.services.iter().find(|s| s.name == *name) else {
            continue;
        };
        let needs: Vec<String> = graph
            .dependencies_of(name)
            .into_iter()
            .map(|dep| format!("deploy-{}", slugify(dep)))
            .collect();
        let id = format!("deploy-{}", slugify(name));
        workflow.add_job(id.clone(), service_job(ctx, &steps, config, service, needs, kubernetes));
        deploy_jobs.push(id);
    }

    let summary = order
        .iter()
        .enumerate()
        .map(|(i, name)| format!("echo \"{}. {name}\" >> \"$GITHUB_STEP_SUMMARY\"", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    workflow.add_job(
        "coordinate",
        Job::new(ctx.runner())
            .named("Coordinate rollout")
            .needs_all(deploy_jobs)
            .timeout(10)
            .step(Step::run(
                "Record deployment order",
                format!("echo \"### Deployment order\" >> \"$GITHUB_STEP_SUMMARY\"\n{summary}"),
            ))
            .step(Step::run(
                "Run cross-service checks",
                "if [ -x ./scripts/contract-tests.sh ]; then\n  ./scripts/contract-tests.sh\nelse\n  echo \"No cross-service checks configured\"\nfi",
            )),
    );

    notes.optimization("ordered-service-deployment");
    if config.service_mesh.is_some() {
        notes.optimization("service-mesh");
    }
    if config.tracing.is_some() {
        notes.optimization("distributed-tracing");
    }

    ctx.harden(&mut workflow, &mut notes);
    ctx.finish("microservices.yml", WorkflowType::Pattern, &workflow, notes)
}

fn service_job(
    ctx: &GenerationContext,
    steps: &StepLibrary<'_>,
    config: &MicroservicesConfig,
    service: &ServiceConfig,
    needs: Vec<String>,
    kubernetes: bool,
) -> Job {
    let slug = slugify(&service.name);
    let context = service.path.clone().unwrap_or_else(|| format!("services/{slug}"));
    let image = format!("ghcr.io/${{{{ github.repository }}}}/{slug}:${{{{ github.sha }}}}");
    let url_var = format!("{}_URL", slug.to_uppercase().replace('-', "_"));

    let mut job = Job::new(ctx.runner())
        .named(format!("Deploy {}", service.name))
        .needs_all(needs)
        .timeout(DEFAULT_TIMEOUT_MINUTES)
        .with_env("SERVICE_NAME", service.name.clone())
        .with_env("IMAGE", image.clone());
    if let Some(port) = service.port {
        job = job.with_env("SERVICE_PORT", port.to_string());
    }
    if let Some(provider) = &config.tracing {
        job = job
            .with_env("OTEL_SERVICE_NAME", service.name.clone())
            .with_env("OTEL_EXPORTER_OTLP_ENDPOINT", "${{ vars.OTEL_EXPORTER_OTLP_ENDPOINT }}")
            .with_env("TRACING_PROVIDER", provider.clone());
    }

    job = job
        .step(steps.checkout())
        .step(Step::uses("Set up Docker Buildx", steps.action("docker/setup-buildx-action")))
        .step(
            Step::uses("Log in to registry", steps.action("docker/login-action"))
                .with("registry", "ghcr.io")
                .with("username", "${{ github.actor }}")
                .with("password", "${{ secrets.GITHUB_TOKEN }}"),
        )
        .step(
            Step::uses(format!("Build {}", service.name), steps.action("docker/build-push-action"))
                .with("context", context)
                .with("push", "true")
                .with("tags", image)
                .with("cache-from", format!("type=gha,scope={slug}"))
                .with("cache-to", format!("type=gha,mode=max,scope={slug}")),
        );

    if kubernetes {
        job = job
            .step(Step::uses("Set up kubectl", steps.action("azure/setup-kubectl")))
            .step(
                Step::uses("Set Kubernetes context", steps.action("azure/k8s-set-context"))
                    .with("method", "kubeconfig")
                    .with("kubeconfig", "${{ secrets.KUBE_CONFIG }}"),
            );
        if let Some(mesh) = &config.service_mesh {
            job = job.step(Step::run(
                format!("Annotate for {mesh}"),
                format!(
                    "kubectl annotate deployment/{slug} {} --overwrite",
                    mesh_annotation(mesh)
                ),
            ));
        }
        job = job.step(Step::run(
            format!("Roll out {}", service.name),
            format!(
                "kubectl set image deployment/{slug} {slug}=\"$IMAGE\"\nkubectl rollout status deployment/{slug} --timeout=300s"
            ),
        ));
    } else {
        let mut deploy = Step::run(
            format!("Deploy {}", service.name),
            format!(
                "if [ -x ./scripts/deploy-service.sh ]; then\n  ./scripts/deploy-service.sh {slug} \"$IMAGE\"\nelse\n  echo \"No deploy script for {slug}, image pushed as $IMAGE\"\nfi"
            ),
        );
        if let Some(mesh) = &config.service_mesh {
            deploy = deploy.env("SERVICE_MESH_ANNOTATION", mesh_annotation(mesh));
        }
        job = job.step(deploy);
    }

    let health_url = format!(
        "${{{{ vars.{url_var} != '' && format('{{0}}{}', vars.{url_var}) || '' }}}}",
        service.health_check_path
    );
    job.step(health_check_step(&health_url))
}

fn mesh_annotation(mesh: &str) -> String {
    match mesh.to_lowercase().as_str() {
        "istio" => "sidecar.istio.io/inject=true".to_string(),
        "linkerd" => "linkerd.io/inject=enabled".to_string(),
        "consul" => "consul.hashicorp.com/connect-inject=true".to_string(),
        other => format!("service-mesh={other}"),
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

    fn service(name: &str, deps: &[&str]) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            health_check_path: "/health".to_string(),
            ..Default::default()
        }
    }

    fn config() -> MicroservicesConfig {
        MicroservicesConfig {
            services: vec![
                service("gateway", &["users", "orders"]),
                service("orders", &["users"]),
                service("users", &[]),
            ],
            service_mesh: Some("istio".to_string()),
            tracing: Some("jaeger".to_string()),
        }
    }

    #[test]
    fn test_needs_mirror_dependencies() {
        let ctx = context(r#"{"deploymentTargets": [{"platform": "kubernetes", "confidence": 0.9}]}"#);
        let output = generate(&ctx, &config()).unwrap();
        let doc = output.document().unwrap();

        let ids: Vec<&str> =
            doc["jobs"].as_mapping().unwrap().keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(ids, vec!["deploy-users", "deploy-orders", "deploy-gateway", "coordinate"]);
        assert!(doc["jobs"]["deploy-users"].get("needs").is_none());
        assert_eq!(doc["jobs"]["deploy-orders"]["needs"][0].as_str(), Some("deploy-users"));
        assert_eq!(doc["jobs"]["coordinate"]["needs"].as_sequence().unwrap().len(), 3);
        assert!(output.content.contains("sidecar.istio.io/inject=true"));
        assert_eq!(doc["jobs"]["deploy-gateway"]["env"]["OTEL_SERVICE_NAME"].as_str(), Some("gateway"));
    }

    #[test]
    fn test_unknown_dependency_is_invalid() {
        let mut config = config();
        config.services[2].dependencies = vec!["billing".to_string()];
        let err = generate(&context("{}"), &config).unwrap_err();
        assert_eq!(err.kind(), "invalid-input");
        assert!(err.to_string().contains("billing"));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let mut config = config();
        config.services[2].dependencies = vec!["gateway".to_string()];
        let err = generate(&context("{}"), &config).unwrap_err();
        assert_eq!(err.kind(), "cyclic-dependency");
    }

    #[test]
    fn test_without_kubernetes_uses_deploy_script() {
        let output = generate(&context("{}"), &config()).unwrap();
        assert!(output.content.contains("scripts/deploy-service.sh"));
        assert!(!output.content.contains("kubectl"));
    }
}
