mod cli;
mod commands;
mod config;
mod engine;
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
    };

    let success = match cli.command {
        Command::Load(args) => commands::load::run(&ctx, args)?,
        Command::Apply(args) => commands::apply::run(&ctx, args)?,
        Command::Diff(args) => commands::diff::run(&ctx, args)?,
        Command::Facts(args) => commands::facts::run(&ctx, args)?,
        Command::Probe { name } => commands::facts::probe(&ctx, &name)?,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "kmodctl", &mut io::stdout());
            true
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
