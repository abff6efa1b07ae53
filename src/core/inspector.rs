// src/core/inspector.rs

use crate::models::Argument;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    // `def name` or `def name(params)`, optionally indented.
    static ref DEF_RE: Regex =
        Regex::new(r"^\s*def\s+([A-Za-z_][A-Za-z0-9_\-]*)\s*(?:\((.*)\))?\s*$").unwrap();
}

/// Scrapes a formal parameter list out of source text.
pub trait SourceInspector: fmt::Debug {
    /// Returns the parameters of the definition named `key`, or `None` if no
    /// such definition exists in `source`.
    fn scrape_arguments(&self, source: &str, key: &str) -> Option<Vec<Argument>>;
}

/// Reads `def name(a, b = "x", *rest)` headers from command files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptInspector;

impl SourceInspector for ScriptInspector {
    fn scrape_arguments(&self, source: &str, key: &str) -> Option<Vec<Argument>> {
        source.lines().find_map(|line| {
            let (name, params) = parse_definition_header(line)?;
            (name == key).then(|| parse_parameter_list(params.unwrap_or("")))
        })
    }
}

/// Splits a `def` header into its name and raw parameter text.
pub(crate) fn parse_definition_header(line: &str) -> Option<(&str, Option<&str>)> {
    let caps = DEF_RE.captures(line)?;
    let name = caps.get(1)?.as_str();
    Some((name, caps.get(2).map(|m| m.as_str())))
}

/// Parses `a, b = "x, y", *rest` into arguments. Commas inside quotes do not split.
pub(crate) fn parse_parameter_list(params: &str) -> Vec<Argument> {
    split_top_level(params)
        .into_iter()
        .filter_map(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            if let Some(rest) = raw.strip_prefix('*') {
                return Some(Argument::rest(rest.trim()));
            }
            match raw.split_once('=') {
                Some((name, default)) => Some(Argument::optional(name.trim(), default.trim())),
                None => Some(Argument::required(raw)),
            }
        })
        .collect()
}

fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
# Short status
def status(path = ".")
  git status --short <path>
end

def log(count = 10, format = "a, b", *rest)
  git log -n <count> <*>
end

def bare
  echo hi
end
"#;

    #[test]
    fn test_scrapes_defaults_as_literal_text() {
        let args = ScriptInspector.scrape_arguments(SOURCE, "status").unwrap();
        assert_eq!(args, vec![Argument::optional("path", "\".\"")]);
    }

    #[test]
    fn test_quoted_commas_and_rest() {
        let args = ScriptInspector.scrape_arguments(SOURCE, "log").unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], Argument::optional("count", "10"));
        assert_eq!(args[1].default_text.as_deref(), Some("\"a, b\""));
        assert_eq!(args[2], Argument::rest("rest"));
    }

    #[test]
    fn test_definition_without_parens_has_no_arguments() {
        let args = ScriptInspector.scrape_arguments(SOURCE, "bare").unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_missing_definition() {
        assert!(ScriptInspector.scrape_arguments(SOURCE, "nope").is_none());
        // Prefix of an existing name must not match.
        assert!(ScriptInspector.scrape_arguments(SOURCE, "stat").is_none());
    }
}
