use crate::{models::ArgSignature, session::Session};
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Shows the arguments and options a command accepts."
)]
struct UsageArgs {
    command: String,
}

pub fn handle(args: Vec<String>, session: &mut Session) -> Result<()> {
    let usage_args = UsageArgs::try_parse_from(&args)?;
    let name = &usage_args.command;

    session.load_defaults();
    if !session.ensure_command(name)? {
        return Err(anyhow!("Unknown command '{}'.", name.cyan()));
    }

    let signature = session
        .manager
        .args(name)
        .ok_or_else(|| anyhow!("Unknown command '{}'.", name.cyan()))?;
    let Some(command) = session.manager.command(name) else {
        return Err(anyhow!("Unknown command '{}'.", name.cyan()));
    };

    match signature {
        ArgSignature::Computed(arguments) => {
            let rendered: Vec<String> = arguments.iter().map(ToString::to_string).collect();
            println!("{} {} {}", "usage:".yellow(), command.name.cyan(), rendered.join(" "));
        }
        ArgSignature::Unavailable | ArgSignature::Uncomputed => {
            println!(
                "{} {} {}",
                "usage:".yellow(),
                command.name.cyan(),
                "(arguments unknown)".dimmed()
            );
        }
    }

    if let Some(description) = &command.description {
        println!("  {}", description);
    }
    if !command.options.is_empty() {
        println!("{}", "options:".yellow());
        for (flag, kind) in &command.options {
            println!("  --{:<14} {}", flag, format!("{:?}", kind).to_lowercase().dimmed());
        }
    }
    println!("  {} {}", "library:".dimmed(), command.library);
    if let Some(location) = &command.provenance {
        println!(
            "  {} {}:{}",
            "defined at:".dimmed(),
            location.file.display(),
            location.line
        );
    }
    Ok(())
}
