//! Selective monorepo builds.
//!
//! A `detect-changes` job runs a paths filter and exposes the list of
//! modified packages. With the dependency graph enabled a package's filter
//! also covers the paths of everything it depends on, so a change in a
//! library rebuilds its dependents, and build jobs follow the dependency
//! order.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::environments::slugify;
use crate::error::{GenerationError, GenerationResult, GenerationWarning};
use crate::generators::{GenerationContext, DEFAULT_TIMEOUT_MINUTES};
use crate::workflow::{
    EventFilter, GenerationNotes, Job, MatrixAxis, Step, Strategy, Triggers, Workflow,
    WorkflowOutput, WorkflowType,
};

use super::graph::DependencyGraph;
use super::types::{MonorepoConfig, PackageConfig};

const DETECT_JOB: &str = "detect-changes";

struct Package<'a> {
    config: &'a PackageConfig,
    slug: String,
    /// Own path plus the paths of transitive dependencies.
    watched: Vec<String>,
}

pub(super) fn generate(
    ctx: &GenerationContext,
    config: &MonorepoConfig,
    matrix_threshold: usize,
) -> GenerationResult<WorkflowOutput> {
    if config.packages.is_empty() {
        return Err(GenerationError::InvalidInput(
            "monorepo pattern needs at least one package".to_string(),
        ));
    }

    let mut notes = ctx.notes();
    let graph = build_graph(config, &mut notes)?;
    let order = graph.topological_order()?;
    let packages = resolve_packages(config, &graph)?;
    let threshold = config.matrix_threshold.unwrap_or(matrix_threshold);

    let mut paths: Vec<String> = packages.iter().map(|p| glob(&p.config.path)).collect();
    paths.extend(config.shared_paths.iter().cloned());
    let branch = ctx.options().default_branch.as_str();
    let mut triggers = Triggers::manual();
    triggers.push = Some(EventFilter::branches([branch]).with_paths(paths.clone()));
    triggers.pull_request = Some(EventFilter::branches([branch]).with_paths(paths));

    let mut workflow = Workflow::new("Monorepo", triggers);
    workflow.add_job(DETECT_JOB, detect_changes_job(ctx, &packages));
    notes.optimization("selective-builds");

    if packages.len() > threshold {
        add_level_jobs(ctx, &graph, &packages, &mut workflow)?;
        notes.optimization("matrix-builds");
    } else {
        for idx in order {
            let package = &packages[idx];
            let mut needs = vec![DETECT_JOB.to_string()];
            if config.dependency_graph.enabled {
                needs.extend(
                    graph
                        .dependencies_of(graph.name(idx))
                        .into_iter()
                        .map(|dep| format!("build-{}", slugify(dep))),
                );
            }
            workflow.add_job(format!("build-{}", package.slug), package_job(ctx, package, needs));
        }
    }
    if config.dependency_graph.enabled {
        notes.optimization("dependency-ordering");
    }

    ctx.harden(&mut workflow, &mut notes);
    ctx.finish("monorepo.yml", WorkflowType::Pattern, &workflow, notes)
}

/// Nodes go in `buildOrder` first, then in declaration order, which makes
/// `buildOrder` the tie-break of the topological sort.
fn build_graph(
    config: &MonorepoConfig,
    notes: &mut GenerationNotes,
) -> GenerationResult<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    let declared: HashSet<&str> = config.packages.iter().map(|p| p.name.as_str()).collect();

    let mut slugs = HashSet::new();
    for package in &config.packages {
        let slug = slugify(&package.name);
        if slug.is_empty() || !slugs.insert(slug) {
            return Err(GenerationError::InvalidInput(format!(
                "duplicate or empty package name '{}'",
                package.name
            )));
        }
    }

    for name in &config.dependency_graph.build_order {
        if declared.contains(name.as_str()) {
            graph.add_node(name.clone());
        } else {
            notes.warn(GenerationWarning::MissingData {
                field: "buildOrder".to_string(),
                detail: format!("'{name}' is not a declared package"),
            });
        }
    }
    for package in &config.packages {
        graph.add_node(package.name.clone());
    }

    if config.dependency_graph.enabled {
        for package in &config.packages {
            for dependency in &package.dependencies {
                graph.add_dependency(&package.name, dependency)?;
            }
        }
    }
    Ok(graph)
}

/// Packages indexed like the graph nodes.
fn resolve_packages<'a>(
    config: &'a MonorepoConfig,
    graph: &DependencyGraph,
) -> GenerationResult<Vec<Package<'a>>> {
    let mut packages = Vec::with_capacity(graph.len());
    for idx in 0..graph.len() {
        let name = graph.name(idx);
        let Some(package) = config.packages.iter().find(|p| p.name == name) else {
            return Err(GenerationError::InvalidInput(format!("unknown package '{name}'")));
        };

        let mut watched = vec![glob(&package.path)];
        let mut pending: Vec<&str> = graph.dependencies_of(name);
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(dep) = pending.pop() {
            if !seen.insert(dep) {
                continue;
            }
            if let Some(dep_pkg) = config.packages.iter().find(|p| p.name == dep) {
                watched.push(glob(&dep_pkg.path));
            }
            pending.extend(graph.dependencies_of(dep));
        }
        watched.extend(config.shared_paths.iter().cloned());
        watched.dedup();

        packages.push(Package { config: package, slug: slugify(name), watched });
    }
    Ok(packages)
}

fn glob(path: &str) -> String {
    let trimmed = path.trim().trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        "**".to_string()
    } else {
        format!("{trimmed}/**")
    }
}

fn detect_changes_job(ctx: &GenerationContext, packages: &[Package<'_>]) -> Job {
    let filters = packages
        .iter()
        .map(|p| {
            let globs = p.watched.iter().map(|g| format!("  - '{g}'")).collect::<Vec<_>>();
            format!("{}:\n{}", p.slug, globs.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut job = Job::new(ctx.runner())
        .named("Detect changed packages")
        .timeout(5)
        .with_output("modified", "${{ steps.filter.outputs.changes }}")
        .step(ctx.steps().checkout())
        .step(
            Step::uses("Filter changed paths", ctx.action("dorny/paths-filter"))
                .id("filter")
                .with("filters", filters),
        );
    for package in packages {
        job = job.with_output(
            package.slug.clone(),
            format!("${{{{ steps.filter.outputs.{} }}}}", package.slug),
        );
    }
    job
}

fn changed(slug: &str) -> String {
    format!("contains(fromJSON(needs.{DETECT_JOB}.outputs.modified), '{slug}')")
}

fn package_job(ctx: &GenerationContext, package: &Package<'_>, needs: Vec<String>) -> Job {
    let steps = ctx.steps();
    let toolchain = ctx.toolchain();
    let caching = ctx.options().optimization_level.caches() && !toolchain.is_generic();
    let path = package.config.path.as_str();

    let build = package.config.build_command.clone().or_else(|| toolchain.build_command());
    let test = package.config.test_command.clone().unwrap_or_else(|| toolchain.test_command());

    Job::new(ctx.runner())
        .named(format!("Build {}", package.config.name))
        .needs_all(needs)
        .when(format!("!cancelled() && !failure() && {}", changed(&package.slug)))
        .timeout(DEFAULT_TIMEOUT_MINUTES)
        .steps(steps.prepare(caching, false))
        .maybe_step(
            build.map(|cmd| {
                Step::run(format!("Build {}", package.config.name), cmd).in_directory(path)
            }),
        )
        .step(Step::run(format!("Test {}", package.config.name), test).in_directory(path))
}

/// One matrix job per dependency level. Commands and paths come from JSON
/// maps in the job environment, keyed by package slug.
fn add_level_jobs(
    ctx: &GenerationContext,
    graph: &DependencyGraph,
    packages: &[Package<'_>],
    workflow: &mut Workflow,
) -> GenerationResult<()> {
    let steps = ctx.steps();
    let toolchain = ctx.toolchain();
    let caching = ctx.options().optimization_level.caches() && !toolchain.is_generic();

    let mut previous: Option<String> = None;
    for (level, members) in graph.levels()?.into_iter().enumerate() {
        let members: Vec<&Package<'_>> = members.into_iter().map(|idx| &packages[idx]).collect();

        let paths: BTreeMap<&str, &str> =
            members.iter().map(|p| (p.slug.as_str(), p.config.path.as_str())).collect();
        let builds: BTreeMap<&str, String> = members
            .iter()
            .map(|p| {
                let cmd = p
                    .config
                    .build_command
                    .clone()
                    .or_else(|| toolchain.build_command())
                    .unwrap_or_else(|| "true".to_string());
                (p.slug.as_str(), cmd)
            })
            .collect();
        let tests: BTreeMap<&str, String> = members
            .iter()
            .map(|p| {
                let cmd = p.config.test_command.clone().unwrap_or_else(|| toolchain.test_command());
                (p.slug.as_str(), cmd)
            })
            .collect();

        let mut needs = vec![DETECT_JOB.to_string()];
        needs.extend(previous.clone());

        let guard =
            format!("contains(fromJSON(needs.{DETECT_JOB}.outputs.modified), matrix.package)");
        let job = Job::new(ctx.runner())
            .named(format!("Build level {level}"))
            .needs_all(needs)
            .when(format!(
                "!cancelled() && !failure() && needs.{DETECT_JOB}.outputs.modified != '[]'"
            ))
            .timeout(DEFAULT_TIMEOUT_MINUTES)
            .with_strategy(Strategy::matrix(
                "package",
                MatrixAxis::values(members.iter().map(|p| p.slug.clone())),
            ))
            .with_env("PACKAGE_PATHS", json_map(&paths))
            .with_env("PACKAGE_BUILD", json_map(&builds))
            .with_env("PACKAGE_TEST", json_map(&tests))
            .steps(steps.prepare(caching, false).into_iter().map(|s| s.when(guard.clone())))
            .step(
                Step::run("Build package", "${{ fromJSON(env.PACKAGE_BUILD)[matrix.package] }}")
                    .when(guard.clone())
                    .in_directory("${{ fromJSON(env.PACKAGE_PATHS)[matrix.package] }}"),
            )
            .step(
                Step::run("Test package", "${{ fromJSON(env.PACKAGE_TEST)[matrix.package] }}")
                    .when(guard)
                    .in_directory("${{ fromJSON(env.PACKAGE_PATHS)[matrix.package] }}"),
            );

        let id = format!("build-level-{level}");
        workflow.add_job(id.clone(), job);
        previous = Some(id);
    }
    Ok(())
}

/// Compact JSON for the small string maps placed in job environments.
fn json_map<V: Serialize>(map: &BTreeMap<&str, V>) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}
