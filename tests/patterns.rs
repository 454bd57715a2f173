//! Advanced Pattern Integration Tests

use std::sync::Arc;

use cicdgen::templates::TemplateCache;
use cicdgen::{DetectionResult, GenerationError, PatternConfig, WorkflowOutput, YamlGenerator};

const DETECTION: &str = r#"{
    "frameworks": [{"name": "nextjs", "confidence": 0.9, "category": "fullstack"}],
    "languages": [{"name": "typescript", "confidence": 0.9, "primary": true}],
    "packageManagers": [{"name": "pnpm", "lockFile": "pnpm-lock.yaml", "confidence": 0.9}],
    "deploymentTargets": [{"platform": "kubernetes", "confidence": 0.8}]
}"#;

fn generate(pattern: &str) -> Result<Vec<WorkflowOutput>, GenerationError> {
    let detection = DetectionResult::from_json(DETECTION).unwrap();
    let pattern = PatternConfig::from_json(pattern)?;
    YamlGenerator::new()
        .with_cache(Arc::new(TemplateCache::new()))
        .generate_advanced_pattern_workflows(&detection, &pattern)
}

fn job_ids(output: &WorkflowOutput) -> Vec<String> {
    let doc = output.document().unwrap();
    doc["jobs"]
        .as_mapping()
        .unwrap()
        .keys()
        .filter_map(|k| k.as_str().map(String::from))
        .collect()
}

// ============================================================================
// Pattern Selection
// ============================================================================

#[test]
fn test_unknown_pattern_type() {
    let err = generate(r#"{"type": "serverless"}"#).unwrap_err();
    assert_eq!(err.kind(), "unsupported-pattern");
    assert!(err.to_string().contains("serverless"));
}

#[test]
fn test_missing_pattern_type() {
    let err = generate(r#"{"packages": []}"#).unwrap_err();
    assert_eq!(err.kind(), "invalid-input");
}

// ============================================================================
// Monorepo
// ============================================================================

#[test]
fn test_monorepo_builds_in_dependency_order() {
    let outputs = generate(
        r#"{
            "type": "monorepo",
            "packages": [
                {"name": "web", "path": "apps/web", "dependencies": ["ui"]},
                {"name": "ui", "path": "packages/ui", "dependencies": ["core"]},
                {"name": "core", "path": "packages/core"}
            ],
            "dependencyGraph": {"enabled": true, "buildOrder": ["core", "ui", "web"]}
        }"#,
    )
    .unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].filename, "monorepo.yml");
    assert_eq!(job_ids(&outputs[0]), vec!["detect-changes", "build-core", "build-ui", "build-web"]);
}

#[test]
fn test_monorepo_cycle_is_rejected() {
    let err = generate(
        r#"{
            "type": "monorepo",
            "packages": [
                {"name": "a", "path": "packages/a", "dependencies": ["b"]},
                {"name": "b", "path": "packages/b", "dependencies": ["a"]}
            ],
            "dependencyGraph": {"enabled": true}
        }"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), "cyclic-dependency");
}

// ============================================================================
// Microservices
// ============================================================================

#[test]
fn test_microservices_deploy_after_dependencies() {
    let outputs = generate(
        r#"{
            "type": "microservices",
            "services": [
                {"name": "gateway", "dependencies": ["users", "orders"], "port": 8080},
                {"name": "orders", "dependencies": ["users"]},
                {"name": "users"}
            ],
            "serviceMesh": "istio",
            "tracing": "jaeger"
        }"#,
    )
    .unwrap();
    let output = &outputs[0];
    assert_eq!(output.filename, "microservices.yml");

    let ids = job_ids(output);
    let position = |id: &str| ids.iter().position(|j| j == id).unwrap();
    assert!(position("deploy-users") < position("deploy-orders"));
    assert!(position("deploy-orders") < position("deploy-gateway"));

    let doc = output.document().unwrap();
    let needs: Vec<&str> = doc["jobs"]["deploy-gateway"]["needs"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|n| n.as_str())
        .collect();
    assert!(needs.contains(&"deploy-users"));
    assert!(needs.contains(&"deploy-orders"));
}

// ============================================================================
// Canary
// ============================================================================

#[test]
fn test_canary_decreasing_traffic_warns() {
    let outputs = generate(
        r#"{
            "type": "canary",
            "stages": [{"percentage": 10}, {"percentage": 50}, {"percentage": 30}]
        }"#,
    )
    .unwrap();
    let output = &outputs[0];
    assert_eq!(output.filename, "canary-deployment.yml");

    let warnings: Vec<&String> =
        output.metadata.warnings.iter().filter(|w| w.contains("lowers traffic")).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("from 50% to 30%"));

    let ids = job_ids(output);
    assert!(ids.contains(&"canary-stage-3".to_string()));
    assert!(ids.contains(&"promote".to_string()));
}

#[test]
fn test_canary_increasing_traffic_is_clean() {
    let outputs = generate(
        r#"{"type": "canary", "stages": [{"percentage": 5}, {"percentage": 25}, {"percentage": 100}]}"#,
    )
    .unwrap();
    assert!(!outputs[0].metadata.warnings.iter().any(|w| w.contains("lowers traffic")));
}

// ============================================================================
// Blue-Green and Feature Flags
// ============================================================================

#[test]
fn test_blue_green_switch_waits_for_both_stacks() {
    let outputs = generate(r#"{"type": "blue-green", "healthCheckPath": "/ready"}"#).unwrap();
    let doc = outputs[0].document().unwrap();
    let needs = doc["jobs"]["switch-traffic"]["needs"].as_sequence().unwrap();
    assert_eq!(needs.len(), 2);
    assert!(outputs[0].content.contains("/ready"));
}

#[test]
fn test_feature_flag_rollout_job_per_flag() {
    let outputs = generate(
        r#"{
            "type": "feature-flags",
            "provider": "launchdarkly",
            "flags": [{
                "name": "new-checkout",
                "segments": [{"name": "internal", "percentage": 5}, {"name": "everyone", "percentage": 100}],
                "rollbackTriggers": [{"metric": "error_rate", "threshold": 0.02}]
            }]
        }"#,
    )
    .unwrap();
    let output = &outputs[0];
    assert_eq!(output.filename, "feature-flags.yml");
    let doc = output.document().unwrap();
    assert_eq!(doc["jobs"]["rollout-new-checkout"]["needs"][0].as_str(), Some("deploy"));
    assert!(output.content.contains("error_rate > 0.02"));
}
