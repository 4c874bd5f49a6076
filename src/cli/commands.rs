//! CLI command definitions for pkgbatch.
//!
//! Three commands: `run` executes a batch file, `plan` validates and prints
//! one without executing, and `demo` runs the built-in harmless batch with
//! sleep commands standing in for real package operations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::config::Config;
use crate::ops::{flatpak, pacman};
use crate::scheduler::{BatchRunner, BatchSummary, OperationDescriptor, OperationKind};

/// Application ids used by the Flatpak demo batch.
const DEMO_FLATPAK_APPS: &[&str] = &[
    "org.mozilla.firefox",
    "org.libreoffice.LibreOffice",
    "org.gimp.GIMP",
    "org.blender.Blender",
    "com.visualstudio.code",
];

/// Package names used by the pacman demo batch.
const DEMO_PACMAN_PACKAGES: &[&str] = &["git", "curl", "wget", "htop", "neofetch"];

/// Run batches of package-manager operations in parallel.
#[derive(Parser)]
#[command(name = "pkgbatch")]
#[command(about = "Run batches of package-manager operations in parallel")]
#[command(version)]
#[command(
    long_about = "pkgbatch executes install/update/remove operations against a bounded worker\n\
                  pool, honoring priorities, dependencies, and per-operation timeouts.\n\n\
                  Example usage:\n  pkgbatch run --file batch.json --workers 2"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "warn", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Execute a batch of operations from a JSON file.
    Run(RunArgs),

    /// Parse a batch file and print the dispatch plan without executing.
    Plan(PlanArgs),

    /// Run a harmless demonstration batch (sleep commands).
    Demo(DemoArgs),
}

/// Arguments for `pkgbatch run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to a JSON array of operation descriptors.
    #[arg(short, long)]
    pub file: PathBuf,

    /// Worker count override (0 = use config or derive from CPU count).
    #[arg(short, long, default_value = "0")]
    pub workers: usize,

    /// Optional JSON config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for `pkgbatch plan`.
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Path to a JSON array of operation descriptors.
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Arguments for `pkgbatch demo`.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Which package manager's demo batch to simulate.
    #[arg(long, value_enum, default_value_t = DemoFlavor::Flatpak)]
    pub flavor: DemoFlavor,

    /// Worker count override (0 = derive from CPU count).
    #[arg(short, long, default_value = "0")]
    pub workers: usize,
}

/// Demo batch flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DemoFlavor {
    Flatpak,
    Pacman,
}

/// Parses command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses arguments and runs the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Runs the selected command with pre-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_batch(args).await,
        Commands::Plan(args) => plan_batch(&args),
        Commands::Demo(args) => run_demo(args).await,
    }
}

fn load_descriptors(path: &Path) -> anyhow::Result<Vec<OperationDescriptor>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file {}", path.display()))?;
    let descriptors: Vec<OperationDescriptor> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse batch file {}", path.display()))?;
    Ok(descriptors)
}

async fn run_batch(args: RunArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut pool_config = config.worker_pool_config();
    if args.workers > 0 {
        pool_config.workers = args.workers;
    }

    let descriptors = load_descriptors(&args.file)?;
    if descriptors.is_empty() {
        warn!("batch file contains no operations");
        return Ok(());
    }

    info!(
        operations = descriptors.len(),
        workers = pool_config.workers,
        "executing batch"
    );

    let mut runner = BatchRunner::new(pool_config).on_progress(|result| {
        let marker = if result.success { "ok" } else { "FAILED" };
        println!(
            "[{marker}] {} ({:.1}s)",
            result.descriptor.name,
            result.duration.as_secs_f64()
        );
    });
    runner.submit_all(descriptors)?;

    let summary = runner.run().await;
    print_summary(&summary);

    if !summary.overall_success() {
        anyhow::bail!("batch failed");
    }
    Ok(())
}

fn plan_batch(args: &PlanArgs) -> anyhow::Result<()> {
    let descriptors = load_descriptors(&args.file)?;

    println!("Batch plan ({} operations):", descriptors.len());
    for descriptor in &descriptors {
        let dependencies = if descriptor.dependencies.is_empty() {
            String::from("-")
        } else {
            descriptor.dependencies.join(", ")
        };
        println!(
            "  {:<40} {:<8} {:<8} priority {:>4}  est {:>6.1}s  deps: {}",
            descriptor.name,
            descriptor.kind.to_string(),
            descriptor.manager,
            descriptor.priority,
            descriptor.estimated_secs,
            dependencies
        );
    }

    let estimated_total: f64 = descriptors.iter().map(|d| d.estimated_secs).sum();
    println!("Estimated sequential duration: {estimated_total:.1}s");
    Ok(())
}

async fn run_demo(args: DemoArgs) -> anyhow::Result<()> {
    let mut descriptors = match args.flavor {
        DemoFlavor::Flatpak => {
            let apps: Vec<String> = DEMO_FLATPAK_APPS.iter().map(|s| s.to_string()).collect();
            flatpak::operations(&apps, OperationKind::Update)
        }
        DemoFlavor::Pacman => {
            let packages: Vec<String> =
                DEMO_PACMAN_PACKAGES.iter().map(|s| s.to_string()).collect();
            pacman::operations(&packages, OperationKind::Install)
        }
    };

    // Harmless stand-in for the real package commands.
    for descriptor in &mut descriptors {
        descriptor.command = vec!["sleep".to_string(), "2".to_string()];
        descriptor.estimated_secs = 2.0;
    }

    let mut pool_config = Config::default().worker_pool_config();
    if args.workers > 0 {
        pool_config.workers = args.workers;
    }

    println!(
        "Running {} demo operations with {} workers...",
        descriptors.len(),
        pool_config.workers
    );

    let mut runner = BatchRunner::new(pool_config).on_progress(|result| {
        let marker = if result.success { "ok" } else { "FAILED" };
        println!("[{marker}] {}", result.descriptor.name);
    });
    runner.submit_all(descriptors)?;

    let summary = runner.run().await;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!("Batch summary");
    println!(
        "  total duration: {:.2}s",
        summary.total_duration.as_secs_f64()
    );
    println!("  completed:      {}", summary.completed());
    println!("  failed:         {}", summary.failed_count());
    println!("  efficiency:     {:.1}%", summary.efficiency_pct);
    if summary.deadlocked {
        println!("  terminated early: unsatisfiable dependencies");
    }
    if summary.cancelled {
        println!("  cancelled before completion");
    }

    if !summary.failed.is_empty() {
        println!();
        println!("Failed operations:");
        for result in &summary.failed {
            println!("  {}: {}", result.descriptor.name, result.error_text());
        }
    }
}
