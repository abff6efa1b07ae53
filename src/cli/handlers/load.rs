use crate::{
    core::manager::LoadOutcome,
    session::Session,
};
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Loads one or more libraries.")]
struct LoadArgs {
    /// Libraries to load, in order.
    #[arg(required = true)]
    libraries: Vec<String>,
}

pub fn handle(args: Vec<String>, session: &mut Session) -> Result<()> {
    let load_args = LoadArgs::try_parse_from(&args)?;

    let mut failures = 0;
    for name in &load_args.libraries {
        match session.manager.load(name) {
            Ok(LoadOutcome::Loaded { commands }) => {
                println!("{} '{}' ({} commands)", "Loaded".green(), name.cyan(), commands);
            }
            Ok(LoadOutcome::AlreadyLoaded) => {
                println!("'{}' is already loaded.", name.cyan());
            }
            Ok(LoadOutcome::Rejected) => {
                println!(
                    "{} '{}' declined to load in this environment.",
                    "Skipped".yellow(),
                    name.cyan()
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} '{}': {:#}", "Failed".red(), name.cyan(), anyhow::Error::from(e));
            }
        }
    }

    print_conflicts(session);

    if failures > 0 {
        return Err(anyhow!("{} of {} libraries failed to load.", failures, load_args.libraries.len()));
    }
    Ok(())
}

/// Names that were skipped because another library already owns them.
pub(super) fn print_conflicts(session: &Session) {
    for conflict in session.manager.conflicts() {
        println!(
            "  {} '{}' from '{}' is already taken by '{}'",
            "!".yellow(),
            conflict.name,
            conflict.library,
            conflict.owner
        );
    }
}
