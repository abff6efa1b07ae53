use crate::{core::manager::LoadOutcome, session::Session};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Discards a library and loads it again from its source."
)]
struct ReloadArgs {
    library: String,
}

pub fn handle(args: Vec<String>, session: &mut Session) -> Result<()> {
    let reload_args = ReloadArgs::try_parse_from(&args)?;
    let name = &reload_args.library;

    match session.manager.reload(name)? {
        LoadOutcome::Loaded { commands } => {
            println!("{} '{}' ({} commands)", "Reloaded".green(), name.cyan(), commands);
        }
        LoadOutcome::AlreadyLoaded => println!("'{}' is already loaded.", name.cyan()),
        LoadOutcome::Rejected => println!(
            "{} '{}' declined to load in this environment.",
            "Skipped".yellow(),
            name.cyan()
        ),
    }

    let stale = session.manager.stale_aliases();
    if !stale.is_empty() {
        println!(
            "  {} aliases no longer pointing at a command: {}",
            "!".yellow(),
            stale.join(", ")
        );
    }
    super::load::print_conflicts(session);
    Ok(())
}
