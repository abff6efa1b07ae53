use anyhow::Result;
use colored::Colorize;

use crate::{
    cli::{Cli, handlers},
    session::Session,
};

// --- Action Definition and Registry ---

/// A system action, its aliases and its handler.
struct ActionDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &mut Session) -> Result<()>,
}

/// Every system action. Anything else on the command line is a pipe chain, so a
/// library command named like an action is reached through `run`.
static ACTION_REGISTRY: &[ActionDefinition] = &[
    ActionDefinition {
        name: "commands",
        aliases: &["ls"],
        handler: handlers::commands::handle,
    },
    ActionDefinition {
        name: "index",
        aliases: &[],
        handler: handlers::index::handle,
    },
    ActionDefinition {
        name: "libraries",
        aliases: &["libs"],
        handler: handlers::libraries::handle,
    },
    ActionDefinition {
        name: "load",
        aliases: &[],
        handler: handlers::load::handle,
    },
    ActionDefinition {
        name: "reload",
        aliases: &[],
        handler: handlers::reload::handle,
    },
    ActionDefinition {
        name: "run",
        aliases: &[],
        handler: handlers::run::handle,
    },
    ActionDefinition {
        name: "usage",
        aliases: &["args"],
        handler: handlers::usage::handle,
    },
];

/// Finds an action in the registry by its name or alias.
fn find_action(name: &str) -> Option<&'static ActionDefinition> {
    ACTION_REGISTRY
        .iter()
        .find(|action| action.name == name || action.aliases.contains(&name))
}

/// Routes the command line to a system action, or runs it as a pipe chain.
pub fn dispatch(cli: Cli) -> Result<()> {
    log::debug!("Dispatching args: {:?}", cli.args);

    let Some(first) = cli.args.first() else {
        println!(
            "Usage: {} <command> [args] [{} <command> [args]]...",
            "troupe".cyan(),
            "+".yellow()
        );
        println!("Try '{}' to see what is available.", "troupe commands".cyan());
        return Ok(());
    };

    let mut session = Session::open(cli.render_hint())?;

    match find_action(first) {
        Some(action) => {
            let args = cli.args.iter().skip(1).cloned().collect();
            (action.handler)(args, &mut session)
        }
        None => handlers::run::handle(cli.args, &mut session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_are_found_by_alias() {
        assert_eq!(find_action("libs").map(|a| a.name), Some("libraries"));
        assert_eq!(find_action("ls").map(|a| a.name), Some("commands"));
        assert!(find_action("upcase").is_none());
    }
}
