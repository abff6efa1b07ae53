// src/core/arg_parser.rs

use crate::models::{Invocation, OptionSchema, OptionType, OptionValue, OptionValues, Value};
use thiserror::Error;

/// Represents errors that can occur while parsing the arguments of one invocation.
#[derive(Error, Debug, PartialEq)]
pub enum ArgError {
    /// A typed option was given without a value.
    #[error("Option '--{option}' of command '{command}' expects a value.")]
    MissingValue { command: String, option: String },
    /// A numeric option got something that is not a number.
    #[error("Option '--{option}' of command '{command}' expects a number, got '{value}'.")]
    InvalidNumber {
        command: String,
        option: String,
        value: String,
    },
    /// A short flag matches more than one declared option.
    #[error("Short flag '-{flag}' of command '{command}' is ambiguous: {candidates}.")]
    AmbiguousShortFlag {
        command: String,
        flag: char,
        candidates: String,
    },
}

/// Parses the raw tokens of one invocation against the command's option schema.
///
/// # Logic:
/// - `--name` (or a unique `-n` short form) is an option when `name` is declared.
/// - Boolean options take no value; `--no-name` sets them to false.
/// - String, numeric and array options take the next token (or `--name=value`).
///   Array values are split on `,`.
/// - Undeclared flags are kept as positional arguments, so they can be passed
///   through to the command unchanged.
/// - `--` ends option parsing; everything after it is positional.
pub fn parse_invocation(
    command: &str,
    tokens: &[String],
    schema: &OptionSchema,
) -> Result<Invocation, ArgError> {
    let mut args = Vec::new();
    let mut options = OptionValues::new();
    let mut tokens_iter = tokens.iter().map(String::as_str).peekable();
    let mut options_done = false;

    while let Some(token) = tokens_iter.next() {
        if options_done {
            args.push(Value::from(token));
            continue;
        }
        if token == "--" {
            options_done = true;
            continue;
        }

        let Some((name, inline_value)) = resolve_flag(command, token, schema)? else {
            // It's a positional argument (or a flag the command does not declare).
            args.push(Value::from(token));
            continue;
        };

        let Some(option_type) = schema.get(&name).copied() else {
            // `--no-name` for a declared boolean.
            let negated = name.strip_prefix("no-").unwrap_or(&name).to_string();
            options.insert(negated, OptionValue::Flag(false));
            continue;
        };

        let value = match option_type {
            OptionType::Boolean => OptionValue::Flag(true),
            _ => {
                let raw = match inline_value {
                    Some(v) => v.to_string(),
                    None => tokens_iter
                        .next_if(|next| !next.starts_with('-') || next.parse::<f64>().is_ok())
                        .map(str::to_string)
                        .ok_or_else(|| ArgError::MissingValue {
                            command: command.to_string(),
                            option: name.clone(),
                        })?,
                };
                typed_value(command, &name, option_type, raw)?
            }
        };
        options.insert(name, value);
    }

    Ok(Invocation {
        command: command.to_string(),
        args,
        options,
    })
}

/// Returns the declared option a token refers to, with any `=value` suffix.
fn resolve_flag<'t>(
    command: &str,
    token: &'t str,
    schema: &OptionSchema,
) -> Result<Option<(String, Option<&'t str>)>, ArgError> {
    if let Some(long) = token.strip_prefix("--") {
        let (name, inline) = match long.split_once('=') {
            Some((n, v)) => (n, Some(v)),
            None => (long, None),
        };
        if schema.contains_key(name) {
            return Ok(Some((name.to_string(), inline)));
        }
        if let Some(negated) = name.strip_prefix("no-")
            && schema.get(negated) == Some(&OptionType::Boolean)
        {
            return Ok(Some((format!("no-{}", negated), None)));
        }
        return Ok(None);
    }

    let Some(short) = token.strip_prefix('-') else {
        return Ok(None);
    };
    let mut chars = short.chars();
    let (Some(flag), None) = (chars.next(), chars.next()) else {
        return Ok(None);
    };

    let candidates: Vec<&String> = schema.keys().filter(|k| k.starts_with(flag)).collect();
    match candidates.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(((*only).clone(), None))),
        many => Err(ArgError::AmbiguousShortFlag {
            command: command.to_string(),
            flag,
            candidates: many
                .iter()
                .map(|c| format!("--{}", c))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn typed_value(
    command: &str,
    name: &str,
    option_type: OptionType,
    raw: String,
) -> Result<OptionValue, ArgError> {
    match option_type {
        OptionType::Boolean => Ok(OptionValue::Flag(true)),
        OptionType::String => Ok(OptionValue::Text(raw)),
        OptionType::Numeric => raw
            .parse::<f64>()
            .map(OptionValue::Number)
            .map_err(|_| ArgError::InvalidNumber {
                command: command.to_string(),
                option: name.to_string(),
                value: raw,
            }),
        OptionType::Array => Ok(OptionValue::List(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )),
    }
}
