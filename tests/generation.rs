//! Engine Integration Tests
//!
//! Exercises the public `YamlGenerator` entry points end-to-end.

use std::sync::Arc;

use cicdgen::engine::{ParallelRunner, Task};
use cicdgen::generators::{generator_for, GenerationContext, WorkflowGenerator};
use cicdgen::templates::TemplateCache;
use cicdgen::workflow::{OptimizationLevel, SecurityLevel};
use cicdgen::{
    DetectionResult, FailurePolicy, GenerationError, GenerationOptions, GenerationResult,
    WorkflowOutput, WorkflowType, YamlGenerator,
};
use serial_test::serial;

fn engine() -> YamlGenerator {
    YamlGenerator::new().with_cache(Arc::new(TemplateCache::new()))
}

fn detection(json: &str) -> DetectionResult {
    DetectionResult::from_json(json).unwrap()
}

const NODE_APP: &str = r#"{
    "frameworks": [{"name": "react", "confidence": 0.9, "category": "frontend"}],
    "languages": [{"name": "typescript", "version": "5.3", "confidence": 0.95, "primary": true}],
    "packageManagers": [{"name": "npm", "lockFile": "package-lock.json", "confidence": 0.9}],
    "testingFrameworks": [
        {"name": "jest", "type": "unit", "confidence": 0.8},
        {"name": "playwright", "type": "e2e", "confidence": 0.7}
    ],
    "deploymentTargets": [{"platform": "vercel", "confidence": 0.8}],
    "projectMetadata": {"name": "storefront", "description": "Shop frontend"}
}"#;

// ============================================================================
// Output Shape
// ============================================================================

#[test]
fn test_every_base_workflow_has_required_sections() {
    let suite = engine().generate_complete_workflow_suite(&detection(NODE_APP)).unwrap();
    assert!(suite.is_complete());
    assert_eq!(suite.outputs.len(), WorkflowType::BASE.len());

    for output in &suite.outputs {
        let doc = output.document().unwrap();
        assert!(doc.get("name").is_some(), "{} has no name", output.filename);
        assert!(doc.get("on").is_some(), "{} has no triggers", output.filename);
        assert!(doc["jobs"].as_mapping().is_some_and(|j| !j.is_empty()), "{}", output.filename);
        assert!(output.content.contains("jobs:"));
    }
}

#[test]
fn test_suite_order_matches_base_types() {
    let suite = engine().generate_complete_workflow_suite(&detection(NODE_APP)).unwrap();
    let types: Vec<WorkflowType> = suite.outputs.iter().map(|o| o.workflow_type).collect();
    assert_eq!(types, WorkflowType::BASE.to_vec());
}

#[test]
fn test_generated_workflows_pass_validation() {
    let engine = engine();
    let suite = engine.generate_complete_workflow_suite(&detection(NODE_APP)).unwrap();
    for output in &suite.outputs {
        let result = engine.validate_workflow(&output.content).unwrap();
        assert!(result.is_valid, "{}: {:?}", output.filename, result.errors);
    }
}

// ============================================================================
// Conflict Resolution
// ============================================================================

#[test]
fn test_react_wins_over_vue() {
    let input = detection(
        r#"{
            "frameworks": [
                {"name": "React", "confidence": 0.8, "category": "frontend"},
                {"name": "Vue", "confidence": 0.7, "category": "frontend"}
            ],
            "languages": [{"name": "javascript", "confidence": 0.9, "primary": true}],
            "packageManagers": [{"name": "npm", "confidence": 0.9}]
        }"#,
    );
    let output = engine().generate_workflow(&input, &GenerationOptions::default()).unwrap();

    assert!(output.metadata.detection_summary.contains("react"));
    assert!(!output.metadata.detection_summary.contains("vue"));
    assert!(output
        .metadata
        .warnings
        .iter()
        .any(|w| w.contains("selected 'React'") && w.contains("'Vue'")));

    let doc = output.document().unwrap();
    let upload = doc["jobs"]["build"]["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .find(|s| s["name"].as_str() == Some("Upload build artifact"))
        .expect("react builds upload their output");
    assert_eq!(upload["with"]["path"].as_str(), Some("build"));
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_identical_inputs_render_identical_content() {
    let input = detection(NODE_APP);
    let options = GenerationOptions::builder()
        .workflow_type(WorkflowType::Cd)
        .optimization_level(OptimizationLevel::Aggressive)
        .security_level(SecurityLevel::Enterprise)
        .build();

    let first = engine().generate_workflow(&input, &options).unwrap();
    let second = engine().generate_workflow(&input, &options).unwrap();
    assert_eq!(first.content, second.content);
    assert_eq!(first.metadata.content_digest, second.metadata.content_digest);
}

#[test]
fn test_input_is_not_mutated() {
    let input = detection(NODE_APP);
    let before = input.clone();
    engine().generate_complete_workflow_suite(&input).unwrap();
    assert_eq!(input, before);
}

// ============================================================================
// Degenerate Input
// ============================================================================

#[test]
fn test_empty_detection_degrades_with_warnings() {
    let output = engine().generate_workflow(&detection("{}"), &GenerationOptions::default()).unwrap();
    assert!(!output.metadata.warnings.is_empty());
    assert!(output.content.contains("jobs:"));
}

#[test]
fn test_malformed_detection_is_invalid_input() {
    assert!(matches!(DetectionResult::from_json("null"), Err(GenerationError::InvalidInput(_))));
    assert!(matches!(DetectionResult::from_json("[]"), Err(GenerationError::InvalidInput(_))));

    let err = DetectionResult::from_json(
        r#"{"languages": [
            {"name": "go", "confidence": 0.9, "primary": true},
            {"name": "python", "confidence": 0.8, "primary": true}
        ]}"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), "invalid-input");

    let err = DetectionResult::from_json(r#"{"frameworks": [{"name": "x", "confidence": 1.5}]}"#)
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-input");
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_enterprise_hardening_in_every_workflow() {
    let options = GenerationOptions::builder().security_level(SecurityLevel::Enterprise).build();
    let suite = engine()
        .with_options(options)
        .generate_complete_workflow_suite(&detection(NODE_APP))
        .unwrap();
    for output in &suite.outputs {
        let doc = output.document().unwrap();
        assert!(doc.get("permissions").is_some(), "{} lacks permissions", output.filename);
        assert!(!output.content.contains("@main"), "{} tracks a branch", output.filename);
    }
}

#[test]
fn test_maintenance_returns_dependency_updates() {
    let options = GenerationOptions::builder().workflow_type(WorkflowType::Maintenance).build();
    let output = engine().generate_workflow(&detection(NODE_APP), &options).unwrap();
    assert_eq!(output.filename, "agent-hooks-dependency-updates.yml");
    let doc = output.document().unwrap();
    assert_eq!(
        doc["on"]["repository_dispatch"]["types"][0].as_str(),
        Some("dependency-update")
    );
}

#[test]
fn test_hooks_only_with_flag() {
    let without = engine().generate_complete_workflow_suite(&detection(NODE_APP)).unwrap();
    assert!(without.output("agent-hooks-performance.yml").is_none());

    let options = GenerationOptions::builder().agent_hooks_enabled(true).build();
    let with = engine()
        .with_options(options)
        .generate_complete_workflow_suite(&detection(NODE_APP))
        .unwrap();
    assert!(with.output("agent-hooks-performance.yml").is_some());
    assert!(with.output("agent-hooks-dependency-updates.yml").is_some());
}

// ============================================================================
// Parallel Execution
// ============================================================================

#[test]
fn test_all_or_nothing_policy_fails_request() {
    let suite = engine()
        .failure_policy(FailurePolicy::AllOrNothing)
        .generate_multiple_workflows(&detection(NODE_APP), &[WorkflowType::Ci, WorkflowType::Pattern]);
    // Pattern has no base generator, so the request fails before running.
    assert_eq!(suite.unwrap_err().kind(), "invalid-input");
}

/// Generator that always fails, standing in for a broken plugin.
struct FailingGenerator;

impl WorkflowGenerator for FailingGenerator {
    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Performance
    }

    fn component(&self) -> &'static str {
        "failing"
    }

    fn generate(&self, _ctx: &GenerationContext) -> GenerationResult<WorkflowOutput> {
        Err(GenerationError::generator_failed("failing", "generation", "benchmark tool missing"))
    }
}

fn mixed_generators() -> Vec<Box<dyn WorkflowGenerator>> {
    vec![
        generator_for(WorkflowType::Ci).unwrap(),
        Box::new(FailingGenerator),
        generator_for(WorkflowType::Security).unwrap(),
    ]
}

#[test]
fn test_isolate_policy_keeps_sibling_outputs() {
    let suite = engine()
        .failure_policy(FailurePolicy::Isolate)
        .generate_suite_with(&detection(NODE_APP), mixed_generators())
        .unwrap();

    assert!(!suite.is_complete());
    let names: Vec<&str> = suite.outputs.iter().map(|o| o.filename.as_str()).collect();
    assert_eq!(names, vec!["ci.yml", "security.yml"]);

    assert_eq!(suite.failures.len(), 1);
    let failure = &suite.failures[0];
    assert_eq!(failure.component, "failing");
    assert_eq!(failure.workflow_type, WorkflowType::Performance);
    assert_eq!(failure.error.kind(), "generator-failed");
    assert!(failure.error.to_string().contains("benchmark tool missing"));
}

#[test]
fn test_all_or_nothing_policy_surfaces_generator_error() {
    let err = engine()
        .failure_policy(FailurePolicy::AllOrNothing)
        .generate_suite_with(&detection(NODE_APP), mixed_generators())
        .unwrap_err();

    match err {
        GenerationError::GeneratorFailed { component, .. } => assert_eq!(component, "failing"),
        other => panic!("expected generator failure, got {other:?}"),
    }
}

#[test]
fn test_runner_timeout_is_isolated() {
    let tasks = vec![
        Task::new("stuck", || {
            std::thread::sleep(std::time::Duration::from_millis(400));
            Ok("late")
        }),
        Task::new("quick", || Ok("done")),
    ];
    let results = ParallelRunner::new()
        .max_concurrency(2)
        .timeout(Some(std::time::Duration::from_millis(50)))
        .run(tasks);
    assert_eq!(results[0].as_ref().unwrap_err().kind(), "timeout");
    assert_eq!(results[1].as_ref().unwrap(), &"done");
}

// ============================================================================
// Template Cache
// ============================================================================

#[test]
#[serial]
fn test_global_cache_is_shared() {
    let cache = TemplateCache::global();
    cache.clear();
    YamlGenerator::new().generate_workflow(&detection(NODE_APP), &GenerationOptions::default()).unwrap();
    let populated = cache.len();
    assert!(populated > 0);

    YamlGenerator::new().generate_workflow(&detection(NODE_APP), &GenerationOptions::default()).unwrap();
    assert_eq!(cache.len(), populated);
}
