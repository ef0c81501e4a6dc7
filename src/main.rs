mod config;
mod engine;
mod manager;
mod model;
mod report;
mod rng;
mod stats;

use crate::config::{Config, Overrides};
use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// TOML configuration file (defaults are used for missing keys)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the simulations and write the reports
    Run(Overrides),

    /// Remove agent dump files
    Clean(Overrides),
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let (Command::Run(overrides) | Command::Clean(overrides)) = &args.command;
    let cfg = Config::new(args.config.as_ref(), overrides).context("failed to construct cfg")?;
    let mgr = Manager::new(cfg).context("failed to construct mgr")?;

    match args.command {
        Command::Run(_) => mgr.run_simulations()?,
        Command::Clean(_) => {
            mgr.clean_dumps()?;
        }
    }

    Ok(())
}
