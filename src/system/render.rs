// src/system/render.rs

use crate::models::Value;
use colored::Colorize;
use std::io::{self, Write};

/// How the caller wants a value shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RenderHint {
    #[default]
    Plain,
    /// Show only these fields of map results.
    Fields(Vec<String>),
    /// Debug view: the value's structure as pretty JSON.
    Inspect,
}

/// Receives the final result of an invocation. Formatting is entirely its job.
pub trait Renderer {
    fn render(&mut self, value: &Value, hint: &RenderHint) -> io::Result<()>;
}

/// Writes results to a terminal or any other writer.
///
/// `Nil` and booleans print nothing, text prints as is, lists print one item per
/// line and maps print as JSON.
#[derive(Debug)]
pub struct ConsoleRenderer<W: Write> {
    out: W,
}

impl ConsoleRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_plain(&mut self, value: &Value) -> io::Result<()> {
        match value {
            Value::Nil | Value::Bool(_) => Ok(()),
            Value::List(items) => {
                for item in items {
                    self.write_plain(item)?;
                }
                Ok(())
            }
            Value::Map(_) => {
                let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
                writeln!(self.out, "{}", json)
            }
            other => writeln!(self.out, "{}", other),
        }
    }
}

impl<W: Write> Renderer for ConsoleRenderer<W> {
    fn render(&mut self, value: &Value, hint: &RenderHint) -> io::Result<()> {
        match hint {
            RenderHint::Plain => self.write_plain(value)?,
            RenderHint::Inspect => {
                let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
                writeln!(self.out, "{}", json.dimmed())?;
            }
            RenderHint::Fields(fields) => self.write_plain(&select_fields(value, fields))?,
        }
        self.out.flush()
    }
}

/// Keeps only `fields` of map values (also inside lists).
fn select_fields(value: &Value, fields: &[String]) -> Value {
    match value {
        Value::Map(map) => Value::Map(
            map.iter()
                .filter(|(k, _)| fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        Value::List(items) => Value::List(items.iter().map(|v| select_fields(v, fields)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn rendered(value: &Value, hint: &RenderHint) -> String {
        let mut renderer = ConsoleRenderer::new(Vec::new());
        renderer.render(value, hint).unwrap();
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_absent_and_boolean_values_print_nothing() {
        assert_eq!(rendered(&Value::Nil, &RenderHint::Plain), "");
        assert_eq!(rendered(&Value::Bool(true), &RenderHint::Plain), "");
    }

    #[test]
    fn test_text_and_lists() {
        assert_eq!(rendered(&Value::from("hi"), &RenderHint::Plain), "hi\n");
        let list = Value::List(vec![Value::from("a"), Value::Number(2.0)]);
        assert_eq!(rendered(&list, &RenderHint::Plain), "a\n2\n");
    }

    #[test]
    fn test_maps_print_as_json_and_fields_filter() {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Value::from("git"));
        map.insert("size".to_string(), Value::Number(3.0));
        let value = Value::Map(map);

        let json = rendered(&value, &RenderHint::Plain);
        assert!(json.contains("\"name\": \"git\""));

        let only_name = rendered(&value, &RenderHint::Fields(vec!["name".to_string()]));
        assert!(only_name.contains("\"name\""));
        assert!(!only_name.contains("\"size\""));
    }

    #[test]
    fn test_inspect_shows_structure() {
        colored::control::set_override(false);
        let out = rendered(&Value::Bool(false), &RenderHint::Inspect);
        assert_eq!(out, "false\n");
    }
}
