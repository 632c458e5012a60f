//! Tether CLI - cross-account VPC peering orchestrator
//!
//! Usage: tether [OPTIONS] <COMMAND>
//!
//! Commands:
//!   validate  Check the inventory without calling any provider API
//!   apply     Reconcile connections, DNS and routes for every edge
//!   plan      Show what apply would change
//!   teardown  Remove routes and peering connections
//!   audit     Check tier isolation

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use is_terminal::IsTerminal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tether::config::{load_inventory, Config, ConfigWarning, LogFormat};
use tether::presentation::output::write_json;
use tether::presentation::{
    create_orchestrator, render_audit, render_run, render_validation, Cli, Commands,
    RenderFormat, Simulation, TextRenderer,
};
use tether::{Inventory, TetherError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref());
    let log_format = cli
        .log_format
        .or_else(|| loaded.as_ref().ok().map(|(c, _)| c.output.log_format))
        .unwrap_or_default();
    init_tracing(cli.verbose, log_format);

    let result = match loaded {
        Ok((config, warnings)) => {
            for warning in &warnings {
                warn!("{}", warning);
            }
            let cancel = CancellationToken::new();
            install_ctrlc(cancel.clone());
            run(cli, config, warnings, cancel).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// `-v` info, `-vv` debug, `-vvv` trace, default warn; `RUST_LOG` overrides
fn init_tracing(verbose: u8, format: LogFormat) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose > 1)
        .with_writer(io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn load_config(path: Option<&Path>) -> Result<(Config, Vec<ConfigWarning>)> {
    match path {
        Some(path) => {
            let (config, warnings) = Config::load_with_warnings(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            Ok((config.with_env_overrides(), warnings))
        }
        None => {
            let cwd = std::env::current_dir().ok();
            Ok(Config::load_or_default(cwd.as_deref()))
        }
    }
}

fn install_ctrlc(cancel: CancellationToken) {
    let result = ctrlc::set_handler(move || {
        if !cancel.is_cancelled() {
            eprintln!("Interrupted: finishing in-flight calls, no new steps will start");
        }
        cancel.cancel();
    });
    if let Err(e) = result {
        warn!(error = %e, "Could not install Ctrl-C handler");
    }
}

async fn run(
    cli: Cli,
    config: Config,
    config_warnings: Vec<ConfigWarning>,
    cancel: CancellationToken,
) -> Result<u8> {
    let terminal = io::stdout().is_terminal();
    let format = RenderFormat::resolve(config.output.format, cli.json, terminal);
    let renderer = TextRenderer {
        unicode: terminal,
        verbose: cli.verbose,
    };

    let inventory_path = cli.command.inventory().clone();
    let Inventory {
        topology,
        warnings: inventory_warnings,
    } = match load_inventory(&inventory_path) {
        Ok(inventory) => inventory,
        Err(TetherError::Configuration(e)) => {
            if format == RenderFormat::Json {
                let body = serde_json::json!({ "valid": false, "violations": e.violations });
                write_json(&body, &mut io::stdout().lock())?;
            } else {
                eprintln!("Error: {}", e);
            }
            return Ok(1);
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to load inventory {}", inventory_path.display()))
        }
    };
    for warning in &inventory_warnings {
        warn!("{}", warning);
    }
    info!(
        peers = topology.registry.len(),
        edges = topology.edges.len(),
        "Inventory loaded"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let code = match cli.command {
        Commands::Validate { .. } => {
            let mut warnings = config_warnings;
            warnings.extend(inventory_warnings);
            render_validation(&topology, &warnings, format, &renderer, &mut out)?;
            0
        }

        Commands::Apply {
            dry_run,
            concurrency,
            strict,
            ..
        } => {
            let sim = Simulation::require(cli.simulate)?;
            let configured = config.run.dry_run;
            let mut options = config.run_options().dry_run(configured || dry_run);
            if let Some(n) = concurrency {
                options = options.with_concurrency(n);
            }
            let dry_run = options.dry_run;

            let report = create_orchestrator(sim.cloud(), options, cancel)
                .apply(&topology)
                .await;
            if !dry_run {
                sim.persist()?;
            }
            render_run(&report, format, &renderer, &mut out)?;
            report.exit_code(strict) as u8
        }

        Commands::Plan {
            concurrency,
            strict,
            ..
        } => {
            let sim = Simulation::require(cli.simulate)?;
            let mut options = config.run_options().dry_run(true);
            if let Some(n) = concurrency {
                options = options.with_concurrency(n);
            }

            let report = create_orchestrator(sim.cloud(), options, cancel)
                .apply(&topology)
                .await;
            render_run(&report, format, &renderer, &mut out)?;
            report.exit_code(strict) as u8
        }

        Commands::Teardown {
            edges,
            dry_run,
            strict,
            ..
        } => {
            for edge in &edges {
                let known = topology
                    .edges
                    .iter()
                    .any(|e| e.unordered_key() == edge.unordered_key());
                if !known {
                    bail!(
                        "edge {}:{} is not in the inventory matrix",
                        edge.source,
                        edge.target
                    );
                }
            }

            let sim = Simulation::require(cli.simulate)?;
            let dry_run = config.run.dry_run || dry_run;
            let options = config.run_options().dry_run(dry_run);
            let selected = if edges.is_empty() {
                None
            } else {
                Some(edges.as_slice())
            };

            let report = create_orchestrator(sim.cloud(), options, cancel)
                .teardown(&topology, selected)
                .await;
            if !dry_run {
                sim.persist()?;
            }
            render_run(&report, format, &renderer, &mut out)?;
            report.exit_code(strict) as u8
        }

        Commands::Audit { .. } => {
            let sim = Simulation::require(cli.simulate)?;
            let report = create_orchestrator(sim.cloud(), config.run_options(), cancel)
                .audit(&topology)
                .await;
            render_audit(&report, format, &renderer, &mut out)?;
            report.exit_code() as u8
        }
    };

    out.flush()?;
    Ok(code)
}
