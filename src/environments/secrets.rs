//! Secret inference and environment management steps.

use std::collections::BTreeMap;

use crate::detection::ResolvedDetection;
use crate::generators::deploy::{aws_credentials, DeployTarget};
use crate::templates::StepLibrary;
use crate::workflow::{EnvironmentManagement, PermissionLevel, Step};

/// Secrets implied by the detected deployment targets and frameworks.
pub fn inferred_secrets(detection: &ResolvedDetection, oidc: bool) -> Vec<String> {
    let mut secrets: Vec<String> = detection
        .deployment_targets
        .iter()
        .filter_map(|t| DeployTarget::from_platform(&t.platform))
        .flat_map(|t| t.secrets(oidc))
        .map(String::from)
        .collect();

    for framework in &detection.frameworks {
        let implied: &[&str] = match framework.name.to_lowercase().as_str() {
            "django" => &["DATABASE_URL", "DJANGO_SECRET_KEY"],
            "rails" | "ruby on rails" => &["DATABASE_URL", "RAILS_MASTER_KEY"],
            "laravel" => &["APP_KEY", "DATABASE_URL"],
            "flask" | "fastapi" | "symfony" | "prisma" => &["DATABASE_URL"],
            "next" | "next.js" | "nextjs" => &["NEXTAUTH_SECRET"],
            _ => &[],
        };
        secrets.extend(implied.iter().map(|s| s.to_string()));
    }

    secrets.sort();
    secrets.dedup();
    secrets
}

/// Declared secrets merged with inferred ones when auto-detection is on.
/// The result is sorted and free of duplicates.
pub fn required_secrets(
    detection: &ResolvedDetection,
    declared: &[String],
    management: &EnvironmentManagement,
) -> Vec<String> {
    let mut secrets: Vec<String> = declared
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if management.auto_detect_secrets {
        secrets.extend(inferred_secrets(detection, management.include_oidc));
    }
    secrets.sort();
    secrets.dedup();
    secrets
}

/// Permissions needed by the management steps.
pub fn management_permissions(
    management: &EnvironmentManagement,
) -> Vec<(&'static str, PermissionLevel)> {
    if management.include_oidc {
        vec![("id-token", PermissionLevel::Write)]
    } else {
        Vec::new()
    }
}

/// Inputs to [`management_steps`].
#[derive(Debug, Clone, Copy)]
pub struct ManagedEnvironment<'a> {
    pub name: &'a str,
    pub secrets: &'a [String],
    pub variables: &'a BTreeMap<String, String>,
    /// Whether deploy steps already configure cloud credentials
    pub credentials_configured: bool,
}

/// Steps run before deployment, in a fixed order: secret validation, cloud
/// credentials, config generation, env file.
pub fn management_steps(
    steps: &StepLibrary<'_>,
    detection: &ResolvedDetection,
    management: &EnvironmentManagement,
    env: ManagedEnvironment<'_>,
) -> Vec<Step> {
    let mut out = Vec::new();

    if management.include_secret_validation && !env.secrets.is_empty() {
        out.push(secret_validation_step(env.name, env.secrets));
    }

    if management.include_oidc && !env.credentials_configured {
        out.push(oidc_step(steps, detection));
    }

    if management.include_config_generation {
        out.push(config_generation_step(env.name, env.variables));
    }

    if management.generate_env_files {
        out.push(env_file_step(env.name, env.secrets, env.variables));
    }

    out
}

fn secret_validation_step(environment: &str, secrets: &[String]) -> Step {
    let script = format!(
        "missing=0\nfor name in {}; do\n  if [ -z \"${{!name}}\" ]; then\n    echo \"::error::Secret $name is not set for {environment}\"\n    missing=1\n  fi\ndone\nexit $missing",
        secrets.join(" ")
    );
    secrets.iter().fold(Step::run("Validate required secrets", script), |step, secret| {
        step.env(secret.as_str(), format!("${{{{ secrets.{secret} }}}}"))
    })
}

fn oidc_step(steps: &StepLibrary<'_>, detection: &ResolvedDetection) -> Step {
    let platforms: Vec<String> =
        detection.deployment_targets.iter().map(|t| t.platform.to_lowercase()).collect();

    if platforms.iter().any(|p| matches!(p.as_str(), "gcp" | "google-cloud" | "cloud-run" | "gke")) {
        Step::uses("Authenticate to Google Cloud", steps.action("google-github-actions/auth"))
            .with("workload_identity_provider", "${{ vars.GCP_WORKLOAD_IDENTITY_PROVIDER }}")
            .with("service_account", "${{ vars.GCP_SERVICE_ACCOUNT }}")
    } else if platforms.iter().any(|p| matches!(p.as_str(), "azure" | "aks" | "azure-app-service")) {
        Step::uses("Log in to Azure", steps.action("azure/login"))
            .with("client-id", "${{ vars.AZURE_CLIENT_ID }}")
            .with("tenant-id", "${{ vars.AZURE_TENANT_ID }}")
            .with("subscription-id", "${{ vars.AZURE_SUBSCRIPTION_ID }}")
    } else {
        aws_credentials(steps, true)
    }
}

/// Heredoc terminator for generated config files.
const CONFIG_TERMINATOR: &str = "CICDGEN_CONFIG_EOF";

fn config_generation_step(environment: &str, variables: &BTreeMap<String, String>) -> Step {
    let mut document = BTreeMap::new();
    document.insert("environment".to_string(), environment.to_string());
    for (key, value) in variables {
        document.insert(key.clone(), value.clone());
    }
    let json = serde_json::to_string_pretty(&document).unwrap_or_else(|_| "{}".to_string());

    let path = shell_quote(&format!("config/{environment}.json"));
    Step::run(
        format!("Generate {environment} configuration"),
        format!("mkdir -p config\ncat > {path} <<'{CONFIG_TERMINATOR}'\n{json}\n{CONFIG_TERMINATOR}"),
    )
}

fn env_file_step(
    environment: &str,
    secrets: &[String],
    variables: &BTreeMap<String, String>,
) -> Step {
    let mut lines: Vec<String> =
        variables.iter().map(|(k, v)| shell_quote(&format!("{k}={v}"))).collect();
    lines.extend(secrets.iter().map(|s| format!("\"{s}=${s}\"")));

    let script = if lines.is_empty() {
        format!(": > .env.{environment}")
    } else {
        format!("printf '%s\\n' \\\n  {} \\\n  > .env.{environment}", lines.join(" \\\n  "))
    };

    secrets.iter().fold(Step::run(format!("Write .env.{environment}"), script), |step, secret| {
        step.env(secret.as_str(), format!("${{{{ secrets.{secret} }}}}"))
    })
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{
        ConflictResolver, DeploymentTargetDetection, DetectionResult, FrameworkCategory,
        FrameworkDetection,
    };
    use crate::templates::{TemplateCache, Toolchain};

    fn detection() -> ResolvedDetection {
        let detection = DetectionResult {
            frameworks: vec![FrameworkDetection {
                name: "django".to_string(),
                confidence: 0.9,
                category: FrameworkCategory::Backend,
                ..Default::default()
            }],
            deployment_targets: vec![DeploymentTargetDetection {
                platform: "vercel".to_string(),
                target_type: None,
                confidence: 0.9,
            }],
            ..Default::default()
        };
        ConflictResolver::new().resolve(&detection).unwrap()
    }

    #[test]
    fn test_inferred_secrets_sorted_and_unique() {
        let secrets = inferred_secrets(&detection(), false);
        assert_eq!(
            secrets,
            vec![
                "DATABASE_URL",
                "DJANGO_SECRET_KEY",
                "VERCEL_ORG_ID",
                "VERCEL_PROJECT_ID",
                "VERCEL_TOKEN"
            ]
        );
    }

    #[test]
    fn test_required_secrets_merge_only_when_enabled() {
        let declared = vec!["API_KEY".to_string(), "VERCEL_TOKEN".to_string()];
        let off = required_secrets(&detection(), &declared, &EnvironmentManagement::default());
        assert_eq!(off, vec!["API_KEY", "VERCEL_TOKEN"]);

        let management = EnvironmentManagement { auto_detect_secrets: true, ..Default::default() };
        let on = required_secrets(&detection(), &declared, &management);
        assert_eq!(on.iter().filter(|s| *s == "VERCEL_TOKEN").count(), 1);
        assert!(on.contains(&"DJANGO_SECRET_KEY".to_string()));
        assert!(on.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_management_steps_order() {
        let resolved = detection();
        let toolchain = Toolchain::from_detection(&resolved);
        let cache = TemplateCache::new();
        let library = StepLibrary::new(&toolchain, &cache);
        let management = EnvironmentManagement {
            include_secret_validation: true,
            include_oidc: true,
            include_config_generation: true,
            generate_env_files: true,
            auto_detect_secrets: false,
        };
        let secrets = vec!["API_KEY".to_string()];
        let variables = BTreeMap::from([("LOG_LEVEL".to_string(), "debug".to_string())]);

        let steps = management_steps(
            &library,
            &resolved,
            &management,
            ManagedEnvironment {
                name: "staging",
                secrets: &secrets,
                variables: &variables,
                credentials_configured: false,
            },
        );

        let names: Vec<&str> = steps.iter().filter_map(|s| s.name.as_deref()).collect();
        assert_eq!(
            names,
            vec![
                "Validate required secrets",
                "Configure AWS credentials",
                "Generate staging configuration",
                "Write .env.staging"
            ]
        );
        assert_eq!(steps[0].env["API_KEY"], "${{ secrets.API_KEY }}");
        assert!(steps[2].run.as_deref().unwrap().contains("\"LOG_LEVEL\": \"debug\""));
        assert!(steps[3].run.as_deref().unwrap().contains("'LOG_LEVEL=debug'"));
    }

    #[test]
    fn test_config_heredoc_survives_eof_values() {
        let variables = BTreeMap::from([
            ("BANNER".to_string(), "line one\nEOF\nline three".to_string()),
            ("MARKER".to_string(), "EOF".to_string()),
        ]);
        let step = config_generation_step("staging", &variables);
        let run = step.run.as_deref().unwrap();

        assert!(run.contains("cat > 'config/staging.json' <<'CICDGEN_CONFIG_EOF'\n"));
        assert!(run.ends_with("\nCICDGEN_CONFIG_EOF"));
        assert_eq!(run.lines().filter(|l| *l == "CICDGEN_CONFIG_EOF").count(), 1);
        assert!(!run.lines().any(|l| l == "EOF"));
        assert!(run.contains("\"MARKER\": \"EOF\""));
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("A=it's"), "'A=it'\\''s'");
    }
}
