//! # Pipe Chains
//!
//! `troupe status . + upcase + head 3` is one invocation made of three stages.
//! The `+` token only splits when it stands alone, so `a+b` and `"+"` inside a
//! single argument are left untouched.
//!
//! Stages run strictly left to right. The result of a stage is prepended to the
//! next stage's positional arguments unless it is absent (`Nil` or `false`). The
//! chain's result is the result of its last stage.

use crate::constants::{HELP_FLAGS, PIPE};
use crate::core::arg_parser::{self, ArgError};
use crate::models::{Command, Value};
use crate::system::executor::{ExecutionError, Executor};
use std::cell::OnceCell;
use thiserror::Error;

/// Resolves the command a stage names. Aliases are resolved too.
pub trait CommandLookup {
    fn lookup(&self, name: &str) -> Option<&Command>;
}

/// Represents errors that can occur while parsing or running a pipe chain.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Nothing to run.")]
    Empty,
    /// Two delimiters in a row, or one at either end.
    #[error("Stage {position} of the pipe is empty.")]
    EmptyStage { position: usize },
    #[error("Unknown command '{command}' in stage {stage}.")]
    UnknownCommand { stage: usize, command: String },
    #[error("Invalid arguments for '{command}' in stage {stage}.")]
    InvalidArguments {
        stage: usize,
        command: String,
        #[source]
        source: ArgError,
    },
    /// The stage ran and failed. Later stages were not run.
    #[error("Stage {stage} ('{command}') failed.")]
    StageFailed {
        stage: usize,
        command: String,
        #[source]
        source: ExecutionError,
    },
}

impl ChainError {
    /// 1-based stage that caused the error, when there is one.
    pub fn stage(&self) -> Option<usize> {
        match self {
            ChainError::Empty => None,
            ChainError::EmptyStage { position } => Some(*position),
            ChainError::UnknownCommand { stage, .. }
            | ChainError::InvalidArguments { stage, .. }
            | ChainError::StageFailed { stage, .. } => Some(*stage),
        }
    }
}

/// One sub-invocation: a command name and its raw argument tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub command: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PipeChain {
    stages: Vec<Stage>,
    commands: OnceCell<Vec<String>>,
}

impl PipeChain {
    /// Splits `tokens` on standalone pipe delimiters.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ChainError> {
        if tokens.is_empty() {
            return Err(ChainError::Empty);
        }

        let mut stages = Vec::new();
        for (i, segment) in tokens.split(|t| t.as_ref() == PIPE).enumerate() {
            let Some((command, args)) = segment.split_first() else {
                return Err(ChainError::EmptyStage { position: i + 1 });
            };
            stages.push(Stage {
                command: command.as_ref().to_string(),
                tokens: args.iter().map(|t| t.as_ref().to_string()).collect(),
            });
        }

        log::debug!("Parsed pipe chain with {} stage(s).", stages.len());
        Ok(Self {
            stages,
            commands: OnceCell::new(),
        })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_piped(&self) -> bool {
        self.stages.len() > 1
    }

    /// Command names in the order the user wrote them.
    pub fn commands(&self) -> &[String] {
        self.commands
            .get_or_init(|| self.stages.iter().map(|s| s.command.clone()).collect())
    }

    /// The first command whose stage asks for help. Tokens after `--` never count.
    pub fn help_request(&self) -> Option<&str> {
        self.stages
            .iter()
            .find(|stage| {
                stage
                    .tokens
                    .iter()
                    .take_while(|t| t.as_str() != "--")
                    .any(|t| HELP_FLAGS.contains(&t.as_str()))
            })
            .map(|stage| stage.command.as_str())
    }

    /// Runs every stage in order and returns the last stage's result.
    ///
    /// # Errors
    /// The first failing stage stops the chain; its error names the stage.
    pub fn execute(
        &self,
        lookup: &dyn CommandLookup,
        executor: &dyn Executor,
    ) -> Result<Value, ChainError> {
        let mut previous: Option<Value> = None;

        for (i, stage) in self.stages.iter().enumerate() {
            let position = i + 1;
            let command = lookup
                .lookup(&stage.command)
                .ok_or_else(|| ChainError::UnknownCommand {
                    stage: position,
                    command: stage.command.clone(),
                })?;

            let mut invocation =
                arg_parser::parse_invocation(&command.name, &stage.tokens, &command.options)
                    .map_err(|e| ChainError::InvalidArguments {
                        stage: position,
                        command: stage.command.clone(),
                        source: e,
                    })?;

            if let Some(result) = previous.take()
                && !result.is_absent()
            {
                invocation.args.insert(0, result);
            }

            log::debug!(
                "Running stage {} ('{}') with {} argument(s).",
                position,
                command.name,
                invocation.args.len()
            );
            let result = executor
                .execute(command, &invocation)
                .map_err(|e| ChainError::StageFailed {
                    stage: position,
                    command: stage.command.clone(),
                    source: e,
                })?;
            previous = Some(result);
        }

        Ok(previous.unwrap_or_default())
    }
}
