use crate::{models::LoadState, session::Session};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Lists libraries: loaded, failed and known from the index."
)]
struct LibrariesArgs {
    /// Show each library's file.
    #[arg(long, short)]
    paths: bool,
}

pub fn handle(args: Vec<String>, session: &mut Session) -> Result<()> {
    let libraries_args = LibrariesArgs::try_parse_from(&args)?;
    session.load_defaults();

    let local_root = session.manager.local_root();
    for library in session.manager.libraries() {
        let state = match library.state {
            LoadState::Loaded => "loaded".green(),
            LoadState::Failed => "failed".red(),
            LoadState::Loading => "loading".yellow(),
            LoadState::Unloaded if session.manager.rejected().contains(&library.name) => {
                "declined".yellow()
            }
            LoadState::Unloaded => "unloaded".dimmed(),
        };
        let scope = if library.is_local(local_root) { " local" } else { "" };
        println!(
            "  {:<16} {:<10} {:<8} {} commands{}",
            library.name.cyan(),
            library.kind.to_string(),
            state,
            library.commands.len(),
            scope.dimmed()
        );
        if !library.required.is_empty() {
            println!(
                "  {:<16} requires {}",
                "",
                library.required.join(", ").yellow()
            );
        }
        if libraries_args.paths
            && let Some(file) = &library.library_file
        {
            println!("  {:<16} {}", "", file.display().to_string().dimmed());
        }
    }

    for (name, indexed) in &session.index().libraries {
        if session.manager.library(name).is_some() {
            continue;
        }
        println!(
            "  {:<16} {:<10} {:<8} {} commands",
            name.cyan(),
            indexed.kind.to_string(),
            "indexed".dimmed(),
            indexed.commands.len()
        );
        if libraries_args.paths
            && let Some(file) = &indexed.file
        {
            println!("  {:<16} {}", "", file.dimmed());
        }
    }

    let failed = session.manager.failed();
    if !failed.is_empty() {
        println!(
            "\n{} {}",
            "Failed:".red().bold(),
            failed.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}
