//! xcsync
//!
//! Keeps a C# project and its generated Xcode project in sync.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use xcsync::project::{ConfigFile, ProjectLoader, SyncConfig, TargetPlatform};
use xcsync::sync::SyncOrchestrator;

/// Managed/native project synchronization
#[derive(Parser, Debug)]
#[command(name = "xcsync")]
#[command(about = "Synchronize a C# project with a generated Xcode project", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the managed project (directory or .csproj)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Directory of the generated Xcode project
    #[arg(short, long, global = true)]
    target: Option<PathBuf>,

    /// Target platform
    #[arg(long, global = true, value_enum)]
    platform: Option<TargetPlatform>,

    /// Project name (defaults to the managed project directory name)
    #[arg(short, long, global = true)]
    name: Option<String>,

    /// Config file (defaults to xcsync.toml in the managed project)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Generate the Xcode project from the managed project
    Generate,
    /// Write Xcode header changes back to the designer files
    Sync,
    /// Generate, then keep both projects in sync until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, args.json);

    let config = load_config(&args)?;
    info!(
        "xcsync v{}: {} ({}) -> {}",
        env!("CARGO_PKG_VERSION"),
        config.managed_root.display(),
        config.platform.platform,
        config.native_root.display()
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let orchestrator = SyncOrchestrator::new(config, cancel);

    match args.command {
        Command::Generate => {
            let report = orchestrator.to_native().await?;
            println!("{report}");
        }
        Command::Sync => {
            let report = orchestrator.from_native(None).await?;
            println!("{report}");
        }
        Command::Watch => orchestrator.watch().await?,
    }
    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "xcsync=debug" } else { "xcsync=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// Merge the config file under the command-line flags
fn load_config(args: &Args) -> Result<SyncConfig> {
    let root = ProjectLoader::project_root(&args.project)?;

    let mut file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::discover(&root)?.unwrap_or_default(),
    };
    let platform = args
        .platform
        .or(file.platform)
        .unwrap_or(TargetPlatform::MacOs);
    file.platform = Some(platform);

    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))?;
    let mut config = SyncConfig::new(root, platform).apply_file(file);
    if let Some(target) = &args.target {
        config = config.with_native_root(target);
    }
    if let Some(name) = &args.name {
        config = config.with_project_name(name);
    }
    Ok(config)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
        }
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }
}
