//! Snapmox CLI - snapshot retention and package updates for Proxmox LXC containers

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use snapmox::cli::{Args, SubCommand};
use snapmox::{
    format_inventory, format_report, Config, ControlInterface, DryRunControl, Maintenance,
    OutputFormat, PctControl, Phases,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    // RUST_LOG wins over --verbose
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let output_format = OutputFormat::from_json_flag(args.json);

    let phases = match args.command {
        SubCommand::Config { defaults } => {
            let config = if defaults {
                Config::default()
            } else {
                load_config(&args)?
            };
            print_config(&config, output_format)?;
            return Ok(ExitCode::SUCCESS);
        }
        SubCommand::List => {
            let maintenance = build_maintenance(&args)?;
            let containers = maintenance.inventory().await?;
            println!("{}", format_inventory(&containers, &output_format));
            return Ok(ExitCode::SUCCESS);
        }
        SubCommand::Snapshot => Some(Phases::snapshots_only()),
        SubCommand::Run => None,
    };

    let maintenance = build_maintenance(&args)?;
    let phases = phases.unwrap_or_else(|| Phases::from_config(maintenance.config()));
    let now = chrono::Local::now().naive_local();
    let report = maintenance.run(now, phases).await?;
    println!("{}", format_report(&report, &output_format));

    // container failures are in the report; only fatal errors change the status
    Ok(ExitCode::SUCCESS)
}

fn print_config(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
        OutputFormat::Human => config.to_yaml()?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

/// Load the configuration and pick the control backend for this invocation
fn build_maintenance(args: &Args) -> anyhow::Result<Maintenance> {
    let config = load_config(args)?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    // SAFETY: geteuid has no preconditions and cannot fail
    if unsafe { libc::geteuid() } != 0 {
        warn!("Not running as root; {} will most likely refuse to work", args.pct.display());
    }

    let pct = PctControl::with_binary(args.pct.clone());
    let control: Arc<dyn ControlInterface> = if args.dry_run {
        info!("Dry run: no snapshot, rollback or update will be performed");
        Arc::new(DryRunControl::new(pct))
    } else {
        Arc::new(pct)
    };
    Ok(Maintenance::new(control, config))
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    match args.config {
        Some(ref path) => Config::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}
