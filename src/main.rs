mod cli;
mod commands;
mod config;
mod engine;
mod progress;
mod provider;
mod resource;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub token: Option<String>,
    pub base_url: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
        token: cli.token,
        base_url: cli.base_url,
    };

    let result = match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Refresh(args) => commands::refresh::run(&ctx, &args),
        Command::Import { address, id } => commands::import::run(&ctx, &address, &id),
        Command::Destroy(args) => commands::destroy::run(&ctx, &args),
        Command::Show { address } => commands::show::run(&ctx, address.as_deref()),
        Command::Schema { resource_type } => commands::schema::run(resource_type.as_deref()),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "glprov", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(err) = &result
        && let Some(advice) = ui::advice(err)
    {
        ui::dim(advice);
    }
    result
}
