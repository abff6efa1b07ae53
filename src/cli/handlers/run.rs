use crate::{
    cli::handlers::usage,
    core::pipe::PipeChain,
    session::Session,
    system::{
        executor::RuntimeExecutor,
        render::{ConsoleRenderer, Renderer},
    },
};
use anyhow::{Result, anyhow};
use colored::*;

/// Runs a pipe chain. Every command it names must resolve before the first
/// stage runs, loading libraries from the index as needed. A stage passed
/// `-h` or `--help` prints that command's usage instead.
pub fn handle(args: Vec<String>, session: &mut Session) -> Result<()> {
    let chain = PipeChain::parse(&args)?;
    if let Some(command) = chain.help_request() {
        log::debug!("Help requested for '{}'.", command);
        return usage::handle(vec![command.to_string()], session);
    }

    session.load_defaults();
    for name in chain.commands() {
        if !session.ensure_command(name)? {
            return Err(anyhow!(
                "Unknown command '{}'. Run '{}' if it was added recently.",
                name.cyan(),
                "troupe index".yellow()
            ));
        }
    }

    let executor = RuntimeExecutor::new(session.cwd());
    let result = chain.execute(&session.manager, &executor)?;
    log::debug!("Chain of {} stage(s) finished.", chain.stages().len());

    ConsoleRenderer::stdout().render(&result, &session.hint)?;
    Ok(())
}
