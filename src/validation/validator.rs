//! Structural validation of workflow documents.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::{GenerationError, GenerationResult};
use crate::patterns::DependencyGraph;

/// `owner/repo[/path]@vN[.N.N]` or a full commit SHA.
static PINNED_ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.-]+/[\w./-]+@(v?\d+(\.\d+){0,2}|[0-9a-f]{40})$").expect("valid action pattern")
});

/// Outcome of validating one workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// False when any structural error was found
    pub is_valid: bool,

    /// Structural errors
    pub errors: Vec<String>,

    /// Soft misses that do not break the workflow
    pub warnings: Vec<String>,

    /// Advisory improvements
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, ..Self::default() }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn add_suggestion(&mut self, suggestion: impl Into<String>) {
        self.suggestions.push(suggestion.into());
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.suggestions.extend(other.suggestions);
    }
}

/// Parse workflow text, mapping parser failures to [`GenerationError::WorkflowSyntax`].
pub fn parse_workflow(yaml: &str) -> GenerationResult<Value> {
    serde_yaml::from_str(yaml).map_err(|e| {
        let location = e.location();
        GenerationError::WorkflowSyntax {
            message: e.to_string(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
        }
    })
}

/// Whether an action reference is pinned to a release tag or a commit.
/// Local (`./`) and `docker://` references count as pinned.
pub fn is_pinned(reference: &str) -> bool {
    reference.starts_with("./")
        || reference.starts_with("docker://")
        || PINNED_ACTION.is_match(reference)
}

/// Whether an action reference tracks a moving branch.
pub fn is_branch_ref(reference: &str) -> bool {
    matches!(reference.rsplit_once('@'), Some((_, "main" | "master" | "latest" | "HEAD")))
}

/// Look up the trigger mapping. YAML 1.1 readers turn `on` into `true`.
pub(crate) fn triggers(doc: &Mapping) -> Option<&Value> {
    doc.get("on").or_else(|| doc.get(Value::Bool(true)))
}

/// Validates parsed workflows against the GitHub Actions job model.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowValidator;

impl WorkflowValidator {
    pub fn new() -> Self {
        Self
    }

    /// Parse and check a workflow. Unparseable text is an error; everything
    /// else is reported in the result.
    pub fn validate(&self, yaml: &str) -> GenerationResult<ValidationResult> {
        let doc = parse_workflow(yaml)?;
        Ok(self.check(&doc))
    }

    /// Structural checks on an already parsed document.
    pub fn check(&self, doc: &Value) -> ValidationResult {
        let mut result = ValidationResult::ok();

        let Some(root) = doc.as_mapping() else {
            result.add_error("workflow must be a mapping");
            return result;
        };

        match root.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => {}
            Some(_) => result.add_error("'name' must be a non-empty string"),
            None => result.add_error("missing 'name'"),
        }
        if triggers(root).is_none() {
            result.add_error("missing 'on'");
        }

        let jobs = match root.get("jobs") {
            Some(Value::Mapping(jobs)) if !jobs.is_empty() => jobs,
            Some(Value::Mapping(_)) => {
                result.add_error("'jobs' must define at least one job");
                return result;
            }
            Some(_) => {
                result.add_error("'jobs' must be a mapping");
                return result;
            }
            None => {
                result.add_error("missing 'jobs'");
                return result;
            }
        };

        let mut graph = DependencyGraph::new();
        let ids: Vec<&str> = jobs.keys().filter_map(Value::as_str).collect();
        for id in &ids {
            graph.add_node(*id);
        }

        let workflow_permissions = root.get("permissions");
        if let Some(Value::String(scope)) = workflow_permissions {
            if scope == "write-all" {
                result.add_warning("workflow grants 'permissions: write-all'");
            }
        }

        let mut jobs_without_permissions = 0usize;
        for (key, job) in jobs {
            let Some(id) = key.as_str() else {
                result.add_error("job ids must be strings");
                continue;
            };
            let Some(job) = job.as_mapping() else {
                result.add_error(format!("job '{id}' must be a mapping"));
                continue;
            };
            self.check_job(id, job, &mut graph, &mut result);
            if job.get("permissions").is_none() {
                jobs_without_permissions += 1;
            }
        }

        if result.is_valid {
            if let Err(GenerationError::CyclicDependency { nodes }) = graph.topological_order() {
                result.add_error(format!("job dependency cycle: {}", nodes.join(" -> ")));
            }
        }

        if workflow_permissions.is_none() && jobs_without_permissions > 0 {
            result.add_warning("no explicit 'permissions', the default token scope applies");
        }
        if root.get("concurrency").is_none() {
            result.add_suggestion("add a 'concurrency' group to cancel superseded runs");
        }
        if !uses_cache(jobs) {
            result.add_suggestion("cache dependencies to speed up runs");
        }

        result
    }

    fn check_job(
        &self,
        id: &str,
        job: &Mapping,
        graph: &mut DependencyGraph,
        result: &mut ValidationResult,
    ) {
        let reusable = job.contains_key("uses");
        if !reusable && !job.contains_key("runs-on") {
            result.add_error(format!("job '{id}' has no 'runs-on'"));
        }

        match job.get("needs") {
            None => {}
            Some(Value::String(need)) => check_need(id, need, graph, result),
            Some(Value::Sequence(needs)) => {
                for need in needs {
                    match need.as_str() {
                        Some(need) => check_need(id, need, graph, result),
                        None => result.add_error(format!("job '{id}' has a non-string 'needs' entry")),
                    }
                }
            }
            Some(_) => result.add_error(format!("job '{id}' has malformed 'needs'")),
        }

        if let Some(Value::String(scope)) = job.get("permissions") {
            if scope == "write-all" {
                result.add_warning(format!("job '{id}' grants 'permissions: write-all'"));
            }
        }

        if reusable {
            return;
        }
        if !job.contains_key("timeout-minutes") {
            result.add_warning(format!("job '{id}' has no 'timeout-minutes'"));
        }

        let steps = match job.get("steps") {
            Some(Value::Sequence(steps)) if !steps.is_empty() => steps,
            Some(Value::Sequence(_)) | None => {
                result.add_error(format!("job '{id}' has no steps"));
                return;
            }
            Some(_) => {
                result.add_error(format!("job '{id}' has malformed 'steps'"));
                return;
            }
        };

        for (index, step) in steps.iter().enumerate() {
            let label = step
                .get("name")
                .and_then(Value::as_str)
                .map_or_else(|| format!("#{}", index + 1), |name| format!("'{name}'"));
            let Some(step) = step.as_mapping() else {
                result.add_error(format!("step {label} in job '{id}' must be a mapping"));
                continue;
            };
            match (step.get("uses"), step.get("run")) {
                (Some(_), Some(_)) => result
                    .add_error(format!("step {label} in job '{id}' has both 'uses' and 'run'")),
                (None, None) => result
                    .add_error(format!("step {label} in job '{id}' has neither 'uses' nor 'run'")),
                (Some(Value::String(reference)), None) if !is_pinned(reference) => result
                    .add_warning(format!(
                        "step {label} in job '{id}' uses unpinned action '{reference}'"
                    )),
                _ => {}
            }
        }
    }
}

fn check_need(id: &str, need: &str, graph: &mut DependencyGraph, result: &mut ValidationResult) {
    if !graph.contains(need) {
        result.add_error(format!("job '{id}' needs unknown job '{need}'"));
        return;
    }
    if need == id {
        result.add_error(format!("job '{id}' needs itself"));
        return;
    }
    // Both ids are registered, so this cannot fail.
    let _ = graph.add_dependency(id, need);
}

/// Every string `uses:` value of every step.
pub(crate) fn action_refs(jobs: &Mapping) -> Vec<&str> {
    jobs.values()
        .filter_map(|job| job.get("steps").and_then(Value::as_sequence))
        .flatten()
        .filter_map(|step| step.get("uses").and_then(Value::as_str))
        .collect()
}

pub(crate) fn uses_cache(jobs: &Mapping) -> bool {
    let action_cache = action_refs(jobs).iter().any(|r| r.starts_with("actions/cache@"));
    let setup_cache = jobs
        .values()
        .filter_map(|job| job.get("steps").and_then(Value::as_sequence))
        .flatten()
        .any(|step| step.get("with").and_then(|w| w.get("cache")).is_some());
    action_cache || setup_cache
}
