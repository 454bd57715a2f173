//! Best-practices scoring.
//!
//! The score starts at zero and collects weighted rewards for explicit
//! permissions, pinned actions, dependency caching, a security scan and job
//! timeouts. `write-all` permissions and branch-tracking action references
//! are subtracted. The result is clamped to `0.0..=1.0`.

use serde::Serialize;
use serde_yaml::Value;

use crate::error::GenerationResult;

use super::validator::{action_refs, is_branch_ref, is_pinned, parse_workflow, uses_cache};

const PERMISSIONS_WEIGHT: f64 = 0.25;
const PINNING_WEIGHT: f64 = 0.25;
const CACHE_WEIGHT: f64 = 0.2;
const SECURITY_WEIGHT: f64 = 0.2;
const TIMEOUT_WEIGHT: f64 = 0.1;

const WRITE_ALL_PENALTY: f64 = 0.25;
const BRANCH_REF_PENALTY: f64 = 0.1;

/// Actions and commands that count as a security scan.
const SECURITY_ACTIONS: [&str; 6] = [
    "github/codeql-action",
    "aquasecurity/trivy-action",
    "gitleaks/gitleaks-action",
    "trufflesecurity/trufflehog",
    "snyk/actions",
    "actions/dependency-review-action",
];
const SECURITY_COMMANDS: [&str; 5] =
    ["npm audit", "pip-audit", "cargo audit", "govulncheck", "bundle audit"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BestPracticesScore {
    pub score: f64,
    /// Practices the workflow follows
    pub strengths: Vec<String>,
    /// Practices the workflow misses or violates
    pub issues: Vec<String>,
}

/// Score workflow text.
pub fn score_best_practices(yaml: &str) -> GenerationResult<BestPracticesScore> {
    Ok(score_document(&parse_workflow(yaml)?))
}

/// Score an already parsed workflow.
pub fn score_document(doc: &Value) -> BestPracticesScore {
    let mut report = BestPracticesScore::default();
    let empty = serde_yaml::Mapping::new();
    let jobs = doc.get("jobs").and_then(Value::as_mapping).unwrap_or(&empty);
    let mut score = 0.0;

    let job_scoped = !jobs.is_empty() && jobs.values().all(|job| job.get("permissions").is_some());
    let write_all = std::iter::once(doc.get("permissions"))
        .chain(jobs.values().map(|job| job.get("permissions")))
        .flatten()
        .any(|p| p.as_str() == Some("write-all"));
    if write_all {
        score -= WRITE_ALL_PENALTY;
        report.issues.push("grants write-all permissions".to_string());
    } else if doc.get("permissions").is_some() || job_scoped {
        score += PERMISSIONS_WEIGHT;
        report.strengths.push("explicit permissions".to_string());
    } else {
        report.issues.push("no explicit permissions".to_string());
    }

    let refs = action_refs(jobs);
    let pinned = refs.iter().filter(|r| is_pinned(r)).count();
    let pinned_share = if refs.is_empty() { 1.0 } else { pinned as f64 / refs.len() as f64 };
    score += PINNING_WEIGHT * pinned_share;
    if pinned == refs.len() {
        report.strengths.push("all actions pinned".to_string());
    } else {
        report.issues.push(format!("{} of {} actions unpinned", refs.len() - pinned, refs.len()));
    }
    let branch_refs = refs.iter().filter(|r| is_branch_ref(r)).count();
    if branch_refs > 0 {
        score -= BRANCH_REF_PENALTY * branch_refs as f64;
        report.issues.push(format!("{branch_refs} action(s) track a branch"));
    }

    if uses_cache(jobs) {
        score += CACHE_WEIGHT;
        report.strengths.push("dependency caching".to_string());
    } else {
        report.issues.push("no dependency caching".to_string());
    }

    if has_security_scan(jobs, &refs) {
        score += SECURITY_WEIGHT;
        report.strengths.push("security scanning".to_string());
    } else {
        report.issues.push("no security scan step".to_string());
    }

    if !jobs.is_empty() {
        let timed = jobs.values().filter(|job| job.get("timeout-minutes").is_some()).count();
        score += TIMEOUT_WEIGHT * timed as f64 / jobs.len() as f64;
        if timed == jobs.len() {
            report.strengths.push("job timeouts".to_string());
        } else {
            report.issues.push(format!("{} job(s) without timeout", jobs.len() - timed));
        }
    }

    report.score = score.clamp(0.0, 1.0);
    report
}

fn has_security_scan(jobs: &serde_yaml::Mapping, refs: &[&str]) -> bool {
    let action = refs.iter().any(|r| SECURITY_ACTIONS.iter().any(|a| r.starts_with(a)));
    action
        || jobs
            .values()
            .filter_map(|job| job.get("steps").and_then(Value::as_sequence))
            .flatten()
            .filter_map(|step| step.get("run").and_then(Value::as_str))
            .any(|run| SECURITY_COMMANDS.iter().any(|c| run.contains(c)))
}
