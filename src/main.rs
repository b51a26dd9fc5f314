//! MIDL to Rust translator

use std::{
    fs::{self, File},
    io::BufReader,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

mod cli;
mod theme;

use cli::Cli;
use theme::ConsoleLogger;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = ConsoleLogger::new(cli.log_level()).init() {
        eprintln!("failed to install logger: {e}");
    }

    if let Err(e) = run(&cli) {
        theme::print_error(&format!("could not translate {}", cli.input.display()), &e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let file = File::open(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?;
    debug!("reading {}", cli.input.display());

    let output = comidl::translate(BufReader::new(file), cli.generator_config())?;

    // Only touch the output once everything parsed and generated.
    fs::write(&cli.output, &output.source)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    info!(
        "wrote {} ({} skipped declaration(s))",
        cli.output.display(),
        output.diagnostics.len()
    );
    Ok(())
}
