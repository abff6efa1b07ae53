use crate::{models::Command, session::Session};
use anyhow::Result;
use clap::Parser;
use colored::*;
use std::collections::BTreeMap;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists the available commands.")]
struct CommandsArgs {
    /// Only list commands of this library (loading it if needed).
    library: Option<String>,

    /// Load every indexed library first, not only the defaults.
    #[arg(long, short)]
    all: bool,
}

pub fn handle(args: Vec<String>, session: &mut Session) -> Result<()> {
    let commands_args = CommandsArgs::try_parse_from(&args)?;

    session.load_defaults();
    if let Some(library) = &commands_args.library {
        session.manager.load(library)?;
    } else if commands_args.all {
        let names: Vec<String> = session.index().libraries.keys().cloned().collect();
        crate::session::warn_failures(session.manager.load_many(&names));
    }

    let mut by_library: BTreeMap<&str, Vec<&Command>> = BTreeMap::new();
    for command in session.manager.commands() {
        if commands_args
            .library
            .as_deref()
            .is_some_and(|lib| lib != command.library)
        {
            continue;
        }
        by_library.entry(command.library.as_str()).or_default().push(command);
    }

    if by_library.is_empty() {
        println!("{}", "No commands loaded.".yellow());
        return Ok(());
    }

    for (library, commands) in by_library {
        println!("\n{}", library.yellow().bold());
        for command in commands {
            print_command(command);
        }
    }
    Ok(())
}

fn print_command(command: &Command) {
    let mut line = format!("  {:<16}", command.name.cyan());
    if !command.aliases.is_empty() {
        line.push_str(&format!(" ({})", command.aliases.join(", ")).dimmed().to_string());
    }
    if let Some(description) = &command.description {
        line.push_str(&format!("  {}", description));
    }
    println!("{}", line.trim_end());
}
