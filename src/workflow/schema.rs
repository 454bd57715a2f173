//! Workflow document model.
//!
//! Generators build these structures and serialize them once at the end.
//! Field order matches the conventional layout of GitHub Actions files.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A complete workflow document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workflow {
    /// Workflow display name
    pub name: String,

    /// Triggers
    pub on: Triggers,

    /// Workflow-level token permissions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,

    /// Concurrency group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<Concurrency>,

    /// Workflow-level environment variables
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Jobs in declaration order
    pub jobs: Jobs,
}

impl Workflow {
    /// Create a workflow with the given name and triggers.
    pub fn new(name: impl Into<String>, on: Triggers) -> Self {
        Self {
            name: name.into(),
            on,
            permissions: None,
            concurrency: None,
            env: BTreeMap::new(),
            jobs: Jobs::default(),
        }
    }

    /// Set workflow permissions.
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Set the concurrency group.
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Add a workflow-level environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Append a job.
    pub fn with_job(mut self, id: impl Into<String>, job: Job) -> Self {
        self.jobs.push(id, job);
        self
    }

    /// Append a job in place.
    pub fn add_job(&mut self, id: impl Into<String>, job: Job) {
        self.jobs.push(id, job);
    }
}

/// Ordered job map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Jobs(Vec<(String, Job)>);

impl Jobs {
    /// Append a job; a job with the same id is replaced in place.
    pub fn push(&mut self, id: impl Into<String>, job: Job) {
        let id = id.into();
        if let Some(slot) = self.0.iter_mut().find(|(existing, _)| *existing == id) {
            slot.1 = job;
        } else {
            self.0.push((id, job));
        }
    }

    /// Look up a job by id.
    pub fn get(&self, id: &str) -> Option<&Job> {
        self.0.iter().find(|(existing, _)| existing == id).map(|(_, job)| job)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.0.iter_mut().find(|(existing, _)| existing == id).map(|(_, job)| job)
    }

    /// Job ids in declaration order.
    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Iterate over `(id, job)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Job)> {
        self.0.iter().map(|(id, job)| (id.as_str(), job))
    }

    /// Mutable iteration over jobs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Job)> {
        self.0.iter_mut().map(|(id, job)| (id.as_str(), job))
    }

    /// Number of jobs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no jobs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Jobs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, job) in &self.0 {
            map.serialize_entry(id, job)?;
        }
        map.end()
    }
}

/// Workflow triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Triggers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<EventFilter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<EventFilter>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<Schedule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_dispatch: Option<WorkflowDispatch>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_dispatch: Option<RepositoryDispatch>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_run: Option<WorkflowRunTrigger>,
}

impl Triggers {
    /// Manual dispatch only.
    pub fn manual() -> Self {
        Self { workflow_dispatch: Some(WorkflowDispatch::default()), ..Self::default() }
    }

    /// Trigger on pushes to the given branches.
    pub fn on_push<I, S>(mut self, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push = Some(EventFilter::branches(branches));
        self
    }

    /// Trigger on pull requests targeting the given branches.
    pub fn on_pull_request<I, S>(mut self, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pull_request = Some(EventFilter::branches(branches));
        self
    }

    /// Add a cron schedule.
    pub fn on_schedule(mut self, cron: impl Into<String>) -> Self {
        self.schedule.push(Schedule { cron: cron.into() });
        self
    }

    /// Add manual dispatch without inputs.
    pub fn with_dispatch(mut self) -> Self {
        if self.workflow_dispatch.is_none() {
            self.workflow_dispatch = Some(WorkflowDispatch::default());
        }
        self
    }

    /// Add manual dispatch with inputs.
    pub fn with_dispatch_inputs(mut self, dispatch: WorkflowDispatch) -> Self {
        self.workflow_dispatch = Some(dispatch);
        self
    }

    /// Trigger on repository dispatch events of the given types.
    pub fn on_repository_dispatch<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.repository_dispatch =
            Some(RepositoryDispatch { types: types.into_iter().map(Into::into).collect() });
        self
    }

    /// Trigger when other workflows complete.
    pub fn on_workflow_run<I, S>(mut self, workflows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.workflow_run = Some(WorkflowRunTrigger {
            workflows: workflows.into_iter().map(Into::into).collect(),
            types: vec!["completed".to_string()],
        });
        self
    }
}

/// Branch/tag/path filter for push and pull_request events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

impl EventFilter {
    /// Filter on branches.
    pub fn branches<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { branches: branches.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// Add tag patterns.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Add path patterns.
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }
}

/// Cron schedule entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub cron: String,
}

/// Manual dispatch with optional inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowDispatch {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, DispatchInput>,
}

impl WorkflowDispatch {
    /// Add an input.
    pub fn with_input(mut self, name: impl Into<String>, input: DispatchInput) -> Self {
        self.inputs.insert(name.into(), input);
        self
    }
}

/// A manual dispatch input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchInput {
    pub description: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub input_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl DispatchInput {
    /// Free-form string input.
    pub fn string(description: impl Into<String>, required: bool) -> Self {
        Self {
            description: description.into(),
            required,
            input_type: "string".to_string(),
            default: None,
            options: Vec::new(),
        }
    }

    /// Choice input.
    pub fn choice(description: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            description: description.into(),
            required: true,
            input_type: "choice".to_string(),
            default: options.first().cloned(),
            options,
        }
    }
}

/// Repository dispatch event filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryDispatch {
    pub types: Vec<String>,
}

/// Trigger on completion of other workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowRunTrigger {
    pub workflows: Vec<String>,
    pub types: Vec<String>,
}

/// Token permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Read,
    Write,
    None,
}

/// Token permissions: a preset (`read-all`/`write-all`) or explicit scopes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Permissions {
    Preset(String),
    Scoped(BTreeMap<String, PermissionLevel>),
}

impl Permissions {
    /// Least privilege: read repository contents only.
    pub fn read_contents() -> Self {
        Self::Scoped(BTreeMap::from([("contents".to_string(), PermissionLevel::Read)]))
    }

    /// Add or override a scope. Presets are converted to scoped permissions.
    pub fn with(self, scope: impl Into<String>, level: PermissionLevel) -> Self {
        let mut scopes = match self {
            Self::Scoped(scopes) => scopes,
            Self::Preset(_) => BTreeMap::new(),
        };
        let scope = scope.into();
        // Never downgrade a scope that another step already needs for writing.
        if scopes.get(&scope) != Some(&PermissionLevel::Write) {
            scopes.insert(scope, level);
        }
        Self::Scoped(scopes)
    }

    /// Level granted to a scope, if scoped.
    pub fn level(&self, scope: &str) -> Option<PermissionLevel> {
        match self {
            Self::Scoped(scopes) => scopes.get(scope).copied(),
            Self::Preset(preset) if preset == "write-all" => Some(PermissionLevel::Write),
            Self::Preset(preset) if preset == "read-all" => Some(PermissionLevel::Read),
            Self::Preset(_) => None,
        }
    }
}

/// Concurrency group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Concurrency {
    pub group: String,
    pub cancel_in_progress: bool,
}

impl Concurrency {
    /// Concurrency group keyed by workflow and ref.
    pub fn per_ref(prefix: &str, cancel_in_progress: bool) -> Self {
        Self {
            group: format!("{prefix}-${{{{ github.workflow }}}}-${{{{ github.ref }}}}"),
            cancel_in_progress,
        }
    }
}

/// A job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub runs_on: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,

    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<JobEnvironment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,

    pub steps: Vec<Step>,
}

impl Job {
    /// Create an empty job on a runner.
    pub fn new(runs_on: impl Into<String>) -> Self {
        Self {
            name: None,
            runs_on: runs_on.into(),
            needs: Vec::new(),
            condition: None,
            environment: None,
            permissions: None,
            strategy: None,
            outputs: BTreeMap::new(),
            env: BTreeMap::new(),
            timeout_minutes: None,
            steps: Vec::new(),
        }
    }

    /// Set the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Depend on another job.
    pub fn needs(mut self, job: impl Into<String>) -> Self {
        let job = job.into();
        if !self.needs.contains(&job) {
            self.needs.push(job);
        }
        self
    }

    /// Depend on several jobs.
    pub fn needs_all<I, S>(mut self, jobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for job in jobs {
            self = self.needs(job);
        }
        self
    }

    /// Set the `if:` condition.
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Scope the job to a deployment environment.
    pub fn in_environment(mut self, environment: JobEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Set job-level permissions.
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Set the matrix strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Expose a job output.
    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    /// Set a job-level environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, minutes: u32) -> Self {
        self.timeout_minutes = Some(minutes);
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Append an optional step.
    pub fn maybe_step(mut self, step: Option<Step>) -> Self {
        if let Some(step) = step {
            self.steps.push(step);
        }
        self
    }
}

/// Deployment environment of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEnvironment {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl JobEnvironment {
    /// Environment without URL.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), url: None }
    }

    /// Attach a URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Matrix strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Strategy {
    pub matrix: BTreeMap<String, MatrixAxis>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<u32>,
}

impl Strategy {
    /// Single-axis matrix.
    pub fn matrix(axis: impl Into<String>, values: MatrixAxis) -> Self {
        Self { matrix: BTreeMap::from([(axis.into(), values)]), fail_fast: Some(false), max_parallel: None }
    }

    /// Limit parallelism.
    pub fn max_parallel(mut self, max: u32) -> Self {
        self.max_parallel = Some(max);
        self
    }
}

/// Quote a value as a string literal inside a `${{ }}` expression.
/// Expressions escape a single quote by doubling it.
pub fn expression_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Values of a matrix axis: a literal list or an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MatrixAxis {
    Values(Vec<String>),
    Expression(String),
}

impl MatrixAxis {
    /// Literal list of values.
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Values(values.into_iter().map(Into::into).collect())
    }
}

/// A job step: either `uses` an action or `run`s a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Step {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
}

impl Step {
    fn empty(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            id: None,
            condition: None,
            uses: None,
            with: BTreeMap::new(),
            run: None,
            working_directory: None,
            env: BTreeMap::new(),
            continue_on_error: None,
        }
    }

    /// A step running a shell command.
    pub fn run(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self { run: Some(command.into()), ..Self::empty(name) }
    }

    /// A step using an action reference (`owner/repo@ref`).
    pub fn uses(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self { uses: Some(action.into()), ..Self::empty(name) }
    }

    /// Set the step id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the `if:` condition.
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Add an action input.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn in_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Allow the step to fail without failing the job.
    pub fn allow_failure(mut self) -> Self {
        self.continue_on_error = Some(true);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_string_doubles_quotes() {
        assert_eq!(expression_string("main"), "'main'");
        assert_eq!(expression_string("it's"), "'it''s'");
        assert_eq!(expression_string("a'b'c"), "'a''b''c'");
    }

    #[test]
    fn test_jobs_preserve_insertion_order() {
        let mut jobs = Jobs::default();
        jobs.push("test", Job::new("ubuntu-latest"));
        jobs.push("build", Job::new("ubuntu-latest"));
        jobs.push("deploy", Job::new("ubuntu-latest"));
        assert_eq!(jobs.ids(), vec!["test", "build", "deploy"]);

        let yaml = serde_yaml::to_string(&jobs).unwrap();
        let test_pos = yaml.find("test:").unwrap();
        let deploy_pos = yaml.find("deploy:").unwrap();
        assert!(test_pos < deploy_pos);
    }

    #[test]
    fn test_jobs_replace_same_id() {
        let mut jobs = Jobs::default();
        jobs.push("build", Job::new("ubuntu-latest"));
        jobs.push("build", Job::new("macos-latest"));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs.get("build").unwrap().runs_on, "macos-latest");
    }

    #[test]
    fn test_job_keys_are_kebab_case() {
        let job = Job::new("ubuntu-latest")
            .needs("build")
            .when("github.ref == 'refs/heads/main'")
            .timeout(10)
            .step(Step::run("Hello", "echo hi"));
        let value = serde_yaml::to_value(&job).unwrap();
        assert!(value.get("runs-on").is_some());
        assert!(value.get("timeout-minutes").is_some());
        assert!(value.get("if").is_some());
        assert!(value.get("outputs").is_none());
    }

    #[test]
    fn test_permissions_never_downgrade_write() {
        let permissions = Permissions::read_contents()
            .with("id-token", PermissionLevel::Write)
            .with("id-token", PermissionLevel::Read);
        assert_eq!(permissions.level("id-token"), Some(PermissionLevel::Write));
        assert_eq!(permissions.level("contents"), Some(PermissionLevel::Read));
    }

    #[test]
    fn test_concurrency_group_expression() {
        let concurrency = Concurrency::per_ref("ci", true);
        assert_eq!(concurrency.group, "ci-${{ github.workflow }}-${{ github.ref }}");
    }
}
