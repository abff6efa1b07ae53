use crate::session::{self, Session};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Scans every library and saves which commands each provides."
)]
struct IndexArgs {}

pub fn handle(args: Vec<String>, session: &mut Session) -> Result<()> {
    let _index_args = IndexArgs::try_parse_from(&args)?;

    let report = session.rebuild_index()?;

    let commands: usize = session
        .index()
        .libraries
        .values()
        .map(|lib| lib.commands.len())
        .sum();
    println!(
        "{} {} libraries, {} commands.",
        "Indexed".green(),
        session.index().libraries.len(),
        commands
    );
    if !report.rejected.is_empty() {
        println!(
            "  {} declined: {}",
            "!".yellow(),
            report.rejected.join(", ")
        );
    }
    session::warn_failures(report);
    Ok(())
}
