// src/core/builtins.rs

use crate::core::namespace::{Module, Namespace};
use crate::models::{Invocation, LibraryConfig, OptionSchema, OptionType, OptionValue, Value};
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;

/// Registers the native modules that ship with troupe.
pub fn register(namespace: &mut Namespace) {
    namespace.register_module(text_module());
}

/// The `text` library: small filters meant to sit at the end of a pipe.
pub fn text_module() -> Module {
    Module::new("Text")
        .command("echo", |inv| Ok(Value::from(joined(&inv.args))))
        .command("upcase", |inv| map_text(inv, |s| s.to_uppercase()))
        .command("downcase", |inv| map_text(inv, |s| s.to_lowercase()))
        .command("lines", |inv| Ok(Value::List(items(&inv.args))))
        .command("count", |inv| Ok(Value::Number(items(&inv.args).len() as f64)))
        .command("head", head)
        .command("sort", sort)
        .with_config(text_config)
}

fn text_config() -> LibraryConfig {
    let mut options = BTreeMap::new();
    options.insert(
        "head".to_string(),
        OptionSchema::from([("count".to_string(), OptionType::Numeric)]),
    );
    options.insert(
        "sort".to_string(),
        OptionSchema::from([("reverse".to_string(), OptionType::Boolean)]),
    );

    LibraryConfig {
        description: Some("Text filters".to_string()),
        options,
        aliases: BTreeMap::from([("count".to_string(), vec!["wc".to_string()])]),
        ..Default::default()
    }
}

fn head(inv: &Invocation) -> Result<Value> {
    let count = match inv.options.get("count") {
        Some(OptionValue::Number(n)) if *n >= 0.0 => *n as usize,
        Some(other) => return Err(anyhow!("head: invalid count '{}'", other)),
        None => 10,
    };
    Ok(Value::List(items(&inv.args).into_iter().take(count).collect()))
}

fn sort(inv: &Invocation) -> Result<Value> {
    let mut lines: Vec<String> = items(&inv.args).iter().map(Value::to_string).collect();
    lines.sort();
    if matches!(inv.options.get("reverse"), Some(OptionValue::Flag(true))) {
        lines.reverse();
    }
    Ok(Value::List(lines.into_iter().map(Value::from).collect()))
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn map_text(inv: &Invocation, f: impl Fn(&str) -> String) -> Result<Value> {
    match inv.args.as_slice() {
        [] => Ok(Value::Nil),
        [Value::List(values)] => Ok(Value::List(
            values.iter().map(|v| Value::from(f(&v.to_string()))).collect(),
        )),
        args => Ok(Value::from(f(&joined(args)))),
    }
}

/// Flattens arguments into items: lists are spread, text is split into lines.
fn items(args: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Nil => {}
            Value::List(values) => out.extend(values.iter().cloned()),
            Value::Text(text) => out.extend(text.lines().map(Value::from)),
            other => out.push(other.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommandEntry;

    fn call(name: &str, args: &[Value], options: &[(&str, OptionValue)]) -> Result<Value> {
        let module = text_module();
        let Some(CommandEntry::Native(handler)) = module.members().get(name) else {
            panic!("no native command '{}'", name);
        };
        handler(&Invocation {
            command: name.to_string(),
            args: args.to_vec(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        })
    }

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn test_echo_and_case() {
        assert_eq!(call("echo", &[text("a"), text("b")], &[]).unwrap(), text("a b"));
        assert_eq!(call("upcase", &[text("abc")], &[]).unwrap(), text("ABC"));
        assert_eq!(call("downcase", &[text("ABC")], &[]).unwrap(), text("abc"));
        assert_eq!(call("upcase", &[], &[]).unwrap(), Value::Nil);
        assert_eq!(
            call("upcase", &[Value::List(vec![text("a"), text("b")])], &[]).unwrap(),
            Value::List(vec![text("A"), text("B")])
        );
    }

    #[test]
    fn test_line_filters() {
        let input = text("pear\napple\nfig");
        assert_eq!(call("count", &[input.clone()], &[]).unwrap(), Value::Number(3.0));
        assert_eq!(
            call("head", &[input.clone()], &[("count", OptionValue::Number(2.0))]).unwrap(),
            Value::List(vec![text("pear"), text("apple")])
        );
        assert_eq!(
            call("sort", &[input.clone()], &[("reverse", OptionValue::Flag(true))]).unwrap(),
            Value::List(vec![text("pear"), text("fig"), text("apple")])
        );
        assert_eq!(
            call("lines", &[input], &[]).unwrap(),
            Value::List(vec![text("pear"), text("apple"), text("fig")])
        );
    }

    #[test]
    fn test_config_hook_declares_options_and_aliases() {
        let module = text_module();
        let config = (module.config_hook().unwrap())();
        assert_eq!(config.options["head"]["count"], OptionType::Numeric);
        assert_eq!(config.aliases["count"], vec!["wc".to_string()]);
    }

    #[test]
    fn test_user_aliases_merge_with_builtin_ones() {
        use crate::core::manager::Manager;
        use crate::models::TroupeConfig;

        let config: TroupeConfig = toml::from_str(
            r#"
            [libraries.text.aliases]
            upcase = ["up"]
            [libraries.text.options.sort]
            unique = "boolean"
            "#,
        )
        .unwrap();
        let mut namespace = Namespace::new();
        register(&mut namespace);
        let mut manager = Manager::new(namespace, config);
        manager.load("text").unwrap();

        assert_eq!(manager.resolve_name("up").as_deref(), Some("upcase"));
        assert_eq!(manager.resolve_name("wc").as_deref(), Some("count"));
        let sort = manager.command("sort").unwrap();
        assert_eq!(sort.options["reverse"], OptionType::Boolean);
        assert_eq!(sort.options["unique"], OptionType::Boolean);
        assert_eq!(manager.command("head").unwrap().options["count"], OptionType::Numeric);
    }

    #[test]
    fn test_register_uses_library_name_convention() {
        let mut namespace = Namespace::new();
        register(&mut namespace);
        assert!(namespace.has_module("Text"));
    }
}
