//! Notesync CLI Binary

use anyhow::Context;
use clap::Parser;
use notesync::cli::{Cli, CliContext};
use notesync::logging::init_logging;
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli.workspace.clone(), cli.config.clone())
        .context("Error loading configuration")?;

    let logging = cli.logging_config(&context.config().logging);
    init_logging(Some(&logging), Some(&cli.workspace)).context("Error initializing logging")?;

    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}
