//! FleetGuard - CIS hardening for a fleet of hosts
//!
//! This is the main entry point for the `fleetguard` binary:
//! - `harden`: run the enabled rules against an inventory
//! - `rules`: list every rule with its enablement decision

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fleetguard_common::{load_inventory, Config, LogConfig};
use fleetguard_core::{Feature, Preset, Profile, RunConfiguration};
use fleetguard_engine::report::{self, OutputFormat};
use fleetguard_engine::{HostRouter, Orchestrator, ShellBackend, ShellOptions, SshTransport};
use fleetguard_rules::RuleRegistry;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// FleetGuard fleet hardening
#[derive(Parser, Debug)]
#[command(name = "fleetguard")]
#[command(version)]
#[command(about = "Apply CIS hardening rules to a fleet of hosts", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run CIS benchmark hardening rules against an inventory
    Harden(HardenArgs),
    /// List all rules and whether the selection enables them
    Rules(SelectionArgs),
}

/// Which rules a run selects
#[derive(Args, Debug)]
struct SelectionArgs {
    /// CIS platform type (server, workstation)
    #[arg(long)]
    platform: Option<String>,

    /// Enable CIS rules up to this level (1, 2)
    #[arg(long)]
    level: Option<u8>,

    /// Features to keep; rules that would break them are skipped
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    features: Vec<Feature>,

    /// Preset setting several options at once (proxmox, azure)
    #[arg(long)]
    preset: Option<Preset>,

    /// Run audit rules and report what needs manual fixing
    #[arg(long)]
    audit: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct HardenArgs {
    /// Path to an inventory file, or @local to run on this host
    inventory: String,

    #[command(flatten)]
    selection: SelectionArgs,

    /// Show what would change without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Run changes through sudo -n
    #[arg(long)]
    sudo: bool,

    /// Hosts handled concurrently
    #[arg(long)]
    max_parallel: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())
        .and_then(Config::merge_env)
        .context("failed to load configuration")?;

    // Initialize logging
    let mut log_config = LogConfig::from_config(&config.logging)?;
    if let Some(level) = &cli.log_level {
        log_config = log_config.level(level.clone());
    }
    if let Some(format) = &cli.log_format {
        log_config = log_config.format(format.parse()?);
    }
    fleetguard_common::init_logging_with_config(log_config)?;

    info!("FleetGuard v{}", env!("CARGO_PKG_VERSION"));

    let registry = fleetguard_rules::builtin_registry()?;

    match cli.command {
        Command::Harden(args) => harden(&args, &config, &registry),
        Command::Rules(args) => list_rules(&args, &config, &registry),
    }
}

/// Combine command-line selection with configured defaults
fn run_configuration(args: &SelectionArgs, config: &Config) -> Result<RunConfiguration> {
    let platform = args
        .platform
        .clone()
        .unwrap_or_else(|| config.harden.platform.to_string());
    let level = args.level.unwrap_or(config.harden.level);
    let profile = Profile::resolve(&platform, level)?;

    let mut run = RunConfiguration::new(profile)
        .with_features(config.harden.features.iter().copied())
        .with_features(args.features.iter().copied())
        .with_audit(args.audit);

    if let Some(preset) = args.preset.or(config.harden.preset) {
        debug!("Applying preset {}", preset.as_str());
        run = run.with_preset(preset);
    }

    Ok(run)
}

fn harden(args: &HardenArgs, config: &Config, registry: &RuleRegistry) -> Result<()> {
    let run = run_configuration(&args.selection, config)?;
    let hosts = load_inventory(&args.inventory)?;

    let ssh = SshTransport::new(config.backend.ssh_binary.clone())
        .with_user(config.backend.ssh_user.clone())
        .with_connect_timeout(config.backend.connect_timeout_seconds);
    let backend = ShellBackend::new(
        Box::new(HostRouter::new(ssh)),
        ShellOptions {
            max_parallel: args.max_parallel.unwrap_or(config.backend.max_parallel),
            sudo: args.sudo || config.backend.sudo,
        },
    )?;

    let aggregate = Orchestrator::new(registry, &backend)
        .dry_run(args.dry_run)
        .run(&run, &hosts)?;

    if aggregate.has_failures() {
        warn!(
            "{} rule/host pairs failed; see report",
            aggregate.summary().failed
        );
    }

    let output = report::render(&aggregate, args.selection.format)?;
    println!("{}", output.trim_end());
    Ok(())
}

fn list_rules(args: &SelectionArgs, config: &Config, registry: &RuleRegistry) -> Result<()> {
    let run = run_configuration(args, config)?;
    let listings = report::list_rules(registry, &run);

    let output = report::render_rules(&listings, args.format)?;
    println!("{}", output.trim_end());
    Ok(())
}
