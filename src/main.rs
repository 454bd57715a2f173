//! cicdgen - generate GitHub Actions workflows from project detection results.
//!
//! Reads a `DetectionResult` JSON file produced by a project analyzer and
//! writes the generated workflows, or validates existing workflow files.

#![allow(clippy::single_match_else)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cicdgen::{
    Config, DetectionResult, EnvironmentConfig, GenerationOptions, PatternConfig, SuiteResult,
    WorkflowOutput, WorkflowType, YamlGenerator,
};

/// Generate validated GitHub Actions workflows from project detection results
#[derive(Parser)]
#[command(name = "cicdgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to .cicdgen.toml, then the user config)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate base workflows (CI, CD, security, ...)
    Generate {
        /// Detection result JSON file
        #[arg(short, long, value_name = "FILE")]
        detection: PathBuf,

        /// Workflow type to generate; repeat for several
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        types: Vec<String>,

        /// Generate the complete suite
        #[arg(long, conflicts_with = "types")]
        all: bool,

        /// Generation options JSON file overriding the configuration
        #[arg(long, value_name = "FILE")]
        options: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Generate per-environment deploy, promotion and rollback workflows
    Environments {
        /// Detection result JSON file
        #[arg(short, long, value_name = "FILE")]
        detection: PathBuf,

        /// Ordered environment list JSON file
        #[arg(short, long, value_name = "FILE")]
        environments: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Generate an advanced pattern workflow
    Pattern {
        /// Detection result JSON file
        #[arg(short, long, value_name = "FILE")]
        detection: PathBuf,

        /// Pattern configuration JSON file
        #[arg(short, long, value_name = "FILE")]
        pattern: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Validate workflow files and score them against best practices
    Validate {
        /// Workflow files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Project directory
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Where workflow files are written, relative to the project directory
    #[arg(short, long, default_value = ".github/workflows")]
    output_dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    format: OutputFormat,

    /// Print workflows instead of writing them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Generate { detection, types, all, options, output } => {
            let config = load_config(cli.config.as_deref(), &output.project_dir)?;
            cmd_generate(&config, &detection, &types, all, options.as_deref(), &output)?;
        }
        Commands::Environments { detection, environments, output } => {
            let config = load_config(cli.config.as_deref(), &output.project_dir)?;
            cmd_environments(&config, &detection, &environments, &output)?;
        }
        Commands::Pattern { detection, pattern, output } => {
            let config = load_config(cli.config.as_deref(), &output.project_dir)?;
            cmd_pattern(&config, &detection, &pattern, &output)?;
        }
        Commands::Validate { files, format } => {
            cmd_validate(&files, format)?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>, project_dir: &Path) -> Result<Config> {
    let config = match explicit {
        Some(path) => Config::load_from_file(path),
        None => Config::load(project_dir),
    };
    config.context("Failed to load configuration")
}

fn read_detection(path: &Path) -> Result<DetectionResult> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read detection result {}", path.display()))?;
    Ok(DetectionResult::from_json(&content)?)
}

/// Generate base workflows.
fn cmd_generate(
    config: &Config,
    detection_path: &Path,
    types: &[String],
    all: bool,
    options_path: Option<&Path>,
    output: &OutputArgs,
) -> Result<()> {
    let detection = read_detection(detection_path)?;
    let options = match options_path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read options {}", path.display()))?;
            GenerationOptions::from_json(&content)?
        }
        None => config.generation_options(),
    };
    let engine = YamlGenerator::from_config(config).with_options(options.clone());

    let types = types
        .iter()
        .map(|t| t.parse::<WorkflowType>())
        .collect::<Result<Vec<_>, _>>()?;

    let suite = if all {
        engine.generate_complete_workflow_suite(&detection)?
    } else if types.len() > 1 {
        engine.generate_multiple_workflows(&detection, &types)?
    } else {
        let workflow_type = types.first().copied().unwrap_or(options.workflow_type);
        let single = engine.generate_workflow(&detection, &options.for_type(workflow_type))?;
        SuiteResult { outputs: vec![single], failures: Vec::new() }
    };

    emit(&suite.outputs, output)?;

    if !suite.is_complete() {
        for failure in &suite.failures {
            eprintln!("error: {} ({}): {}", failure.workflow_type, failure.component, failure.error);
        }
        anyhow::bail!("{} workflow(s) failed to generate", suite.failures.len());
    }
    Ok(())
}

/// Generate multi-environment workflows.
fn cmd_environments(
    config: &Config,
    detection_path: &Path,
    environments_path: &Path,
    output: &OutputArgs,
) -> Result<()> {
    let detection = read_detection(detection_path)?;
    let content = fs::read_to_string(environments_path)
        .with_context(|| format!("Failed to read environments {}", environments_path.display()))?;
    let environments = EnvironmentConfig::list_from_json(&content)?;

    let result = YamlGenerator::from_config(config)
        .generate_multi_environment_workflows(&detection, &environments)?;

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }

    if output.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    emit(&result.workflows, output)
}

/// Generate pattern workflows.
fn cmd_pattern(
    config: &Config,
    detection_path: &Path,
    pattern_path: &Path,
    output: &OutputArgs,
) -> Result<()> {
    let detection = read_detection(detection_path)?;
    let content = fs::read_to_string(pattern_path)
        .with_context(|| format!("Failed to read pattern {}", pattern_path.display()))?;
    let pattern = PatternConfig::from_json(&content)?;

    let outputs =
        YamlGenerator::from_config(config).generate_advanced_pattern_workflows(&detection, &pattern)?;
    emit(&outputs, output)
}

/// Validate workflow files.
fn cmd_validate(files: &[PathBuf], format: OutputFormat) -> Result<()> {
    let engine = YamlGenerator::new();
    let mut failed = 0usize;
    let mut reports = Vec::new();

    for path in files {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow {}", path.display()))?;

        let (result, score) = match engine.validate_workflow(&content) {
            Ok(result) => {
                let score = engine.score_best_practices(&content)?;
                (result, score)
            }
            Err(e) => {
                failed += 1;
                if format == OutputFormat::Json {
                    reports.push(serde_json::json!({
                        "file": path.display().to_string(),
                        "isValid": false,
                        "errors": [e.to_string()],
                    }));
                } else {
                    println!("{}: invalid", path.display());
                    println!("  error: {e}");
                }
                continue;
            }
        };

        if !result.is_valid {
            failed += 1;
        }

        if format == OutputFormat::Json {
            let mut report = serde_json::to_value(&result)?;
            report["file"] = serde_json::Value::String(path.display().to_string());
            report["score"] = serde_json::to_value(score.score)?;
            reports.push(report);
            continue;
        }

        let status = if result.is_valid { "valid" } else { "invalid" };
        println!("{}: {status} (score {:.2})", path.display(), score.score);
        for error in &result.errors {
            println!("  error: {error}");
        }
        for warning in &result.warnings {
            println!("  warning: {warning}");
        }
        for suggestion in &result.suggestions {
            println!("  suggestion: {suggestion}");
        }
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if failed > 0 {
        anyhow::bail!("{failed} workflow(s) failed validation");
    }
    Ok(())
}

/// Write or print generated workflows.
fn emit(outputs: &[WorkflowOutput], args: &OutputArgs) -> Result<()> {
    for output in outputs {
        for warning in &output.metadata.warnings {
            eprintln!("warning: {}: {warning}", output.filename);
        }
    }

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(outputs)?);
        return Ok(());
    }

    if args.dry_run {
        for output in outputs {
            println!("# --- {} ---", output.filename);
            println!("{}", output.content);
        }
        return Ok(());
    }

    let dir = args.project_dir.join(&args.output_dir);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    for output in outputs {
        let path = dir.join(&output.filename);
        write_atomic(&path, &output.content)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// Write through a temporary sibling file and rename it into place.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Output path has no file name")?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "cicdgen", &mut io::stdout());
}
