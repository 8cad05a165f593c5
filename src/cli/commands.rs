//! CLI command definitions for piface.
//!
//! `resolve` turns a sample sheet into pipeline invocations; `show` prints
//! what an interface file declares.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::batch::{BatchConfig, BatchOrchestrator, BatchReport};
use crate::interface::{ArgumentSpec, PipelineInterface};
use crate::probe::{FsProber, NullDetector};
use crate::sample::load_samples;

/// Resolve pipeline invocations for samples from a pipeline interface.
#[derive(Parser)]
#[command(name = "piface")]
#[command(about = "Resolve pipeline invocations from a pipeline interface")]
#[command(version)]
#[command(
    long_about = "piface reads a pipeline interface and a sample sheet and prints, for every (sample, pipeline) pair, the command line and resource package it would run with.\n\nExample usage:\n  piface resolve --interface pipeline_interface.yaml --samples samples.yaml --project-config project.yaml"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Resolve every (sample, pipeline) pair into an invocation.
    Resolve(ResolveArgs),

    /// List the pipelines an interface declares.
    Show(ShowArgs),
}

/// Output format of `piface resolve`.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for `piface resolve`.
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Pipeline interface YAML file.
    #[arg(short, long)]
    pub interface: PathBuf,

    /// Sample sheet: YAML or JSON list of mappings with `sample_name`.
    #[arg(short, long)]
    pub samples: PathBuf,

    /// Project config passed to looper-aware pipelines with -C.
    #[arg(long, env = "PIFACE_PROJECT_CONFIG")]
    pub project_config: Option<PathBuf>,

    /// Only resolve these pipeline keys (repeatable).
    #[arg(short, long = "pipeline")]
    pub pipelines: Vec<String>,

    /// Maximum number of pairs resolved concurrently.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Per-pair time limit in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for `piface show`.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Pipeline interface YAML file.
    #[arg(short, long)]
    pub interface: PathBuf,
}

/// Parse CLI arguments and return the Cli struct.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Resolve(args) => run_resolve_command(args).await,
        Commands::Show(args) => run_show_command(args),
    }
}

async fn run_resolve_command(args: ResolveArgs) -> anyhow::Result<()> {
    let config = batch_config(&args)?;

    let interface = PipelineInterface::load_file(&args.interface)
        .with_context(|| format!("Failed to load interface {}", args.interface.display()))?;
    let samples = load_samples(&args.samples)
        .with_context(|| format!("Failed to load samples {}", args.samples.display()))?;

    let orchestrator = BatchOrchestrator::new(
        Arc::new(interface),
        Arc::new(FsProber),
        Arc::new(NullDetector),
        config,
    )?;

    let cancel = orchestrator.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight pairs");
            cancel.cancel();
        }
    });

    let report = orchestrator.run(samples).await;
    ctrl_c.abort();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render_text(&report)),
    }

    info!(
        resolved = report.resolved_count(),
        skipped = report.skipped_count(),
        "Resolution complete"
    );
    Ok(())
}

fn run_show_command(args: ShowArgs) -> anyhow::Result<()> {
    let interface = PipelineInterface::load_file(&args.interface)
        .with_context(|| format!("Failed to load interface {}", args.interface.display()))?;
    print!("{}", render_interface(&interface));
    Ok(())
}

/// Environment first, then command-line overrides.
fn batch_config(args: &ResolveArgs) -> anyhow::Result<BatchConfig> {
    let mut config = BatchConfig::from_env()?;
    if let Some(max) = args.max_concurrent {
        config = config.with_max_concurrent(max);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_pair_timeout(Duration::from_secs(secs));
    }
    if let Some(path) = &args.project_config {
        config = config.with_project_config(path);
    }
    if !args.pipelines.is_empty() {
        config = config.with_pipelines(args.pipelines.clone());
    }
    config.validate()?;
    Ok(config)
}

fn render_text(report: &BatchReport) -> String {
    let mut out = String::new();
    for invocation in report.invocations() {
        let package = invocation.resource_package.as_deref().unwrap_or("local");
        let _ = writeln!(
            out,
            "{}\t{}\t[{}]\t{}",
            invocation.sample_name,
            invocation.pipeline_key,
            package,
            invocation.command_line()
        );
    }

    let skipped = report.summary_lines();
    if !skipped.is_empty() {
        let _ = writeln!(out, "\nSkipped {} pair(s):", skipped.len());
        for line in skipped {
            let _ = writeln!(out, "  {}", line);
        }
    }

    if report.cancelled {
        let _ = writeln!(
            out,
            "\nCancelled: {} pair(s) not dispatched",
            report.not_dispatched.len()
        );
    }

    let _ = writeln!(
        out,
        "\n{} resolved, {} skipped (run {})",
        report.resolved_count(),
        report.skipped_count(),
        report.run_id
    );
    out
}

fn render_interface(interface: &PipelineInterface) -> String {
    let mut out = String::new();
    for spec in interface.iter() {
        let _ = writeln!(out, "{} ({})", spec.key, spec.name);
        let _ = writeln!(out, "  path: {}", spec.path);
        if spec.looper_args {
            let _ = writeln!(out, "  looper_args: true");
        }
        if !spec.arguments.is_empty() {
            let _ = writeln!(out, "  arguments: {}", render_flags(&spec.arguments));
        }
        if !spec.optional_arguments.is_empty() {
            let _ = writeln!(
                out,
                "  optional_arguments: {}",
                render_flags(&spec.optional_arguments)
            );
        }
        match &spec.resources {
            Some(policy) => {
                let packages: Vec<String> = policy
                    .packages()
                    .iter()
                    .map(|p| format!("{}>={}", p.name, p.file_size))
                    .collect();
                let _ = writeln!(out, "  resources: {}", packages.join(", "));
            }
            None => {
                let _ = writeln!(out, "  resources: local only");
            }
        }
    }
    out
}

fn render_flags(arguments: &[ArgumentSpec]) -> String {
    arguments
        .iter()
        .map(|arg| match &arg.attribute {
            Some(attribute) => format!("{}={}", arg.flag, attribute),
            None => arg.flag.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
