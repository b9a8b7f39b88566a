// src/main.rs

use anyhow::Result;
use clap::Parser;
use redrive::{BuildSession, FileManager, RebuildConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "redrive")]
#[command(author, version, about = "Automatic dependency triage and rebuild loop for sandboxed RPM builds", long_about = None)]
struct Cli {
    /// Source package (SRPM) to rebuild
    srpm: PathBuf,

    /// Name of the source archive being built
    #[arg(short, long)]
    name: String,

    /// Session working directory
    #[arg(short, long, default_value = "/tmp/redrive")]
    base_dir: PathBuf,

    /// Sandbox chroot configuration (mock --root)
    #[arg(long)]
    root: Option<String>,

    /// Also record 32-bit pkg-config variants
    #[arg(long)]
    b32: bool,

    /// Maximum build rounds before giving up
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Per-invocation sandbox timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// TOML overrides for the pattern and lookup tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra arguments passed through to every sandbox invocation
    #[arg(long = "sandbox-opt")]
    sandbox_opts: Vec<String>,
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = RebuildConfig::new();
    config.setup_patterns()?;
    if let Some(path) = &cli.config {
        info!("Loading configuration overrides from {}", path.display());
        config.load_overrides(path)?;
    }
    config.want_32bit |= cli.b32;
    if let Some(root) = cli.root {
        config.sandbox_root = root;
    }
    if let Some(max_rounds) = cli.max_rounds {
        config.max_rounds = max_rounds;
    }
    if let Some(secs) = cli.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    config.sandbox_opts.extend(cli.sandbox_opts);

    let mut session = BuildSession::new(config);
    session.setup_workingdir(&cli.base_dir, &cli.name);
    let mut files = FileManager::new();

    let report = session.run(&cli.name, &cli.srpm, &mut files)?;

    println!("Build of {}: {}", cli.name, report);

    let mut build_requirements: Vec<_> = session
        .requirements()
        .build_requirements()
        .iter()
        .collect();
    build_requirements.sort();
    if !build_requirements.is_empty() {
        println!("Discovered build requirements:");
        for requirement in build_requirements {
            println!("  {}", requirement);
        }
    }

    let mut run_requirements: Vec<_> = session.requirements().run_requirements().iter().collect();
    run_requirements.sort();
    if !run_requirements.is_empty() {
        println!("Discovered runtime requirements:");
        for requirement in run_requirements {
            println!("  {}", requirement);
        }
    }

    let mut unpackaged: Vec<_> = files.files().iter().collect();
    unpackaged.sort();
    if !unpackaged.is_empty() {
        println!("Unpackaged files to add to the manifest:");
        for file in unpackaged {
            println!("  {}", file);
        }
    }

    if !report.succeeded() {
        return Err(anyhow::anyhow!("build did not succeed: {}", report));
    }
    Ok(())
}
