// src/system/executor.rs

use crate::models::{Command, CommandEntry, Invocation, OptionValue, ScriptBody, Value};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use thiserror::Error;

lazy_static! {
    // `<name>`, `<*>` or `<--flag>` inside a template line.
    static ref TOKEN_RE: Regex = Regex::new(r"<(\*|--[A-Za-z0-9_\-]+|[A-Za-z_][A-Za-z0-9_]*)>").unwrap();
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command line could not be parsed: {0}")]
    CommandParse(String),
    #[error("Command '{0}' has no definition.")]
    Unbound(String),
    #[error("Command '{command}' is missing its argument '{argument}'.")]
    MissingArgument { command: String, argument: String },
    #[error("Command '{command}' takes {expected} argument(s) but got {got}.")]
    TooManyArguments {
        command: String,
        expected: usize,
        got: usize,
    },
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{0}' exited with a non-zero error code.")]
    NonZeroExitStatus(String),
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("Command '{command}' failed.")]
    Handler {
        command: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Runs a resolved command with its parsed invocation.
pub trait Executor {
    fn execute(&self, command: &Command, invocation: &Invocation) -> Result<Value, ExecutionError>;
}

/// Calls native handlers in process and runs command-file bodies as external processes.
#[derive(Debug, Clone)]
pub struct RuntimeExecutor {
    cwd: PathBuf,
}

impl RuntimeExecutor {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn run_script(
        &self,
        command: &Command,
        body: &ScriptBody,
        invocation: &Invocation,
    ) -> Result<Value, ExecutionError> {
        let (bindings, rest) = bind_arguments(command, body, &invocation.args)?;
        let mut output = String::new();

        for line in &body.lines {
            let (line, ignore_errors) = match line.strip_prefix('-') {
                Some(stripped) => (stripped.trim(), true),
                None => (line.trim(), false),
            };
            let parts = expand_line(line, &bindings, &rest, &invocation.options)?;
            if parts.is_empty() {
                continue;
            }
            log::debug!("Running '{}': {:?}", command.name, parts);
            output.push_str(&self.capture(&parts, ignore_errors)?);
        }

        let trimmed = output.trim_end();
        if trimmed.is_empty() {
            Ok(Value::Nil)
        } else {
            Ok(Value::from(trimmed))
        }
    }

    /// Runs one command line and captures its standard output.
    /// Stderr is passed through to the user's terminal.
    fn capture(&self, parts: &[String], ignore_errors: bool) -> Result<String, ExecutionError> {
        let Some((program, args)) = parts.split_first() else {
            return Ok(String::new());
        };
        let command_line = parts.join(" ");
        let clean_cwd = dunce::simplified(&self.cwd);

        let output = match spawn_captured(program, args, clean_cwd) {
            Ok(output) => output,
            // Fallback for Windows built-in commands like `echo`.
            Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
                log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
                spawn_captured("cmd", &["/C".to_string(), command_line.clone()], clean_cwd)
                    .map_err(|e| ExecutionError::CommandFailed(command_line.clone(), e))?
            }
            Err(e) => return Err(ExecutionError::CommandFailed(command_line, e)),
        };

        if !output.status.success() && !ignore_errors {
            return Err(ExecutionError::NonZeroExitStatus(command_line));
        }

        String::from_utf8(output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
            command: command_line,
            source: e,
        })
    }
}

impl Executor for RuntimeExecutor {
    fn execute(&self, command: &Command, invocation: &Invocation) -> Result<Value, ExecutionError> {
        match &command.entry {
            CommandEntry::Native(handler) => {
                handler(invocation).map_err(|e| ExecutionError::Handler {
                    command: command.name.clone(),
                    source: e,
                })
            }
            CommandEntry::Script(body) => self.run_script(command, body, invocation),
            CommandEntry::Unbound => Err(ExecutionError::Unbound(command.name.clone())),
        }
    }
}

fn spawn_captured(
    program: &str,
    args: &[String],
    cwd: &Path,
) -> std::io::Result<std::process::Output> {
    StdCommand::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
}

/// Matches positional arguments to the body's parameters.
/// Returns named bindings and whatever the rest parameter collected.
fn bind_arguments(
    command: &Command,
    body: &ScriptBody,
    args: &[Value],
) -> Result<(BTreeMap<String, String>, Vec<String>), ExecutionError> {
    let mut bindings = BTreeMap::new();
    let mut rest = Vec::new();
    let mut values = args.iter().map(Value::to_string);

    for param in &body.params {
        if param.rest {
            rest.extend(values.by_ref());
            continue;
        }
        let value = match values.next() {
            Some(value) => value,
            None => match param.default_value() {
                Some(default) => default.to_string(),
                None => {
                    return Err(ExecutionError::MissingArgument {
                        command: command.name.clone(),
                        argument: param.name.clone(),
                    });
                }
            },
        };
        bindings.insert(param.name.clone(), value);
    }

    let extra = values.count();
    if extra > 0 {
        return Err(ExecutionError::TooManyArguments {
            command: command.name.clone(),
            expected: body.params.len(),
            got: args.len(),
        });
    }
    Ok((bindings, rest))
}

/// Splits a template line into words and substitutes its tokens.
///
/// A word that is exactly `<*>` expands to the rest arguments, and a word that is
/// exactly `<--flag>` expands to `--flag [value]` when the option is set.
/// Unknown tokens are left as written.
fn expand_line(
    line: &str,
    bindings: &BTreeMap<String, String>,
    rest: &[String],
    options: &BTreeMap<String, OptionValue>,
) -> Result<Vec<String>, ExecutionError> {
    let words = shlex::split(line).ok_or_else(|| ExecutionError::CommandParse(line.to_string()))?;
    let mut parts = Vec::with_capacity(words.len());

    for word in words {
        if word == "<*>" {
            parts.extend(rest.iter().cloned());
            continue;
        }
        if let Some(flag) = word.strip_prefix("<--").and_then(|w| w.strip_suffix('>')) {
            match options.get(flag) {
                Some(OptionValue::Flag(true)) => parts.push(format!("--{}", flag)),
                Some(OptionValue::Flag(false)) | None => {}
                Some(value) => {
                    parts.push(format!("--{}", flag));
                    parts.push(value.to_string());
                }
            }
            continue;
        }

        let substituted = TOKEN_RE.replace_all(&word, |caps: &Captures| {
            let token = &caps[1];
            if token == "*" {
                return rest.join(" ");
            }
            if let Some(flag) = token.strip_prefix("--") {
                return options.get(flag).map(|v| v.to_string()).unwrap_or_default();
            }
            bindings
                .get(token)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        });
        parts.push(substituted.into_owned());
    }
    Ok(parts)
}
