// src/bin/troupe.rs

use clap::Parser;
use colored::*;
use troupe::cli::{Cli, dispatcher};

/// Sets up logging, parses arguments and dispatches. Every error ends up here.
fn main() {
    env_logger::init();

    if let Err(e) = dispatcher::dispatch(Cli::parse()) {
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}
