// src/models.rs

use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::METHOD_SEPARATOR;

// --- RESULT VALUES ---

/// A value produced by a command, or handed to one as an argument.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// An absent result is never forwarded down a pipe. `Nil` and `false` are absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Returns the text of a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{:.0}", n),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

// --- OPTIONS ---

/// The declared type of a command option.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Boolean,
    String,
    Numeric,
    Array,
}

/// Flag name -> type.
pub type OptionSchema = BTreeMap<String, OptionType>;

/// A parsed option value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum OptionValue {
    Flag(bool),
    Text(String),
    Number(f64),
    List(Vec<String>),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag(b) => write!(f, "{}", b),
            OptionValue::Text(s) => f.write_str(s),
            OptionValue::Number(n) => write!(f, "{}", n),
            OptionValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

pub type OptionValues = BTreeMap<String, OptionValue>;

/// One stage of a user invocation, after its arguments were parsed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<Value>,
    pub options: OptionValues,
}

// --- ARGUMENT SIGNATURES ---

/// A formal argument scraped from a command definition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub has_default: bool,
    /// The literal default text, exactly as written in the source (quotes included).
    pub default_text: Option<String>,
    /// Collects all remaining arguments (`*rest`).
    #[serde(default)]
    pub rest: bool,
}

impl Argument {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_default: false,
            default_text: None,
            rest: false,
        }
    }

    pub fn optional(name: impl Into<String>, default_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_default: true,
            default_text: Some(default_text.into()),
            rest: false,
        }
    }

    pub fn rest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_default: false,
            default_text: None,
            rest: true,
        }
    }

    /// The default with one level of surrounding quotes removed.
    pub fn default_value(&self) -> Option<&str> {
        let text = self.default_text.as_deref()?;
        for quote in ['"', '\''] {
            if let Some(inner) = text
                .strip_prefix(quote)
                .and_then(|t| t.strip_suffix(quote))
            {
                return Some(inner);
            }
        }
        Some(text)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rest {
            write!(f, "[*{}]", self.name)
        } else if let Some(default) = &self.default_text {
            write!(f, "[{}={}]", self.name, default)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// The externally visible state of a command's argument signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSignature {
    Uncomputed,
    Computed(Vec<Argument>),
    Unavailable,
}

/// Where a command was defined.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-based line of the definition header.
    pub line: usize,
}

/// Binds a command to a specific `Module.method` pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MethodBinding {
    pub module: String,
    pub method: String,
}

impl MethodBinding {
    /// Parses `Module.method`. Returns `None` when either side is empty.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (module, method) = qualified.rsplit_once(METHOD_SEPARATOR)?;
        if module.is_empty() || method.is_empty() {
            return None;
        }
        Some(Self {
            module: module.to_string(),
            method: method.to_string(),
        })
    }
}

// --- COMMANDS ---

/// A native command implementation.
pub type CommandHandler = Arc<dyn Fn(&Invocation) -> anyhow::Result<Value> + Send + Sync>;

/// The body of a command defined in a command file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptBody {
    pub params: Vec<Argument>,
    pub lines: Vec<String>,
    pub description: Option<String>,
}

/// What runs when a command is executed.
#[derive(Clone)]
pub enum CommandEntry {
    Native(CommandHandler),
    Script(ScriptBody),
    /// Configured, but no definition was found for it.
    Unbound,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandEntry::Native(_) => f.write_str("Native(..)"),
            CommandEntry::Script(body) => f.debug_tuple("Script").field(body).finish(),
            CommandEntry::Unbound => f.write_str("Unbound"),
        }
    }
}

/// A named, invocable unit owned by a library.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    /// Name of the owning library.
    pub library: String,
    pub options: OptionSchema,
    pub aliases: Vec<String>,
    pub binding: Option<MethodBinding>,
    pub description: Option<String>,
    pub provenance: Option<SourceLocation>,
    pub entry: CommandEntry,
    // None = Unavailable. Set at most once per Command instance.
    signature: OnceCell<Option<Vec<Argument>>>,
}

impl Command {
    pub fn new(name: impl Into<String>, library: impl Into<String>, entry: CommandEntry) -> Self {
        Self {
            name: name.into(),
            library: library.into(),
            options: OptionSchema::new(),
            aliases: Vec::new(),
            binding: None,
            description: None,
            provenance: None,
            entry,
            signature: OnceCell::new(),
        }
    }

    pub fn signature(&self) -> ArgSignature {
        match self.signature.get() {
            None => ArgSignature::Uncomputed,
            Some(Some(args)) => ArgSignature::Computed(args.clone()),
            Some(None) => ArgSignature::Unavailable,
        }
    }

    pub(crate) fn signature_cell(&self) -> &OnceCell<Option<Vec<Argument>>> {
        &self.signature
    }
}

// --- LIBRARIES ---

/// The loading protocol a library goes through.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    Module,
    File,
    Package,
    LocalFile,
    Require,
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LibraryKind::Module => "module",
            LibraryKind::File => "file",
            LibraryKind::Package => "package",
            LibraryKind::LocalFile => "local_file",
            LibraryKind::Require => "require",
        };
        f.write_str(label)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// A named source of commands.
#[derive(Debug, Clone)]
pub struct Library {
    pub name: String,
    pub kind: LibraryKind,
    pub module: Option<String>,
    pub commands: BTreeSet<String>,
    pub dependencies: Vec<String>,
    pub config: LibraryConfig,
    pub state: LoadState,
    pub library_file: Option<PathBuf>,
    pub repo_dir: Option<PathBuf>,
    /// Packages the setup hook pulled in.
    pub required: Vec<String>,
    /// Loaded for indexing only: post-setup hooks never ran.
    pub indexed: bool,
}

impl Library {
    pub fn new(name: impl Into<String>, kind: LibraryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            module: None,
            commands: BTreeSet::new(),
            dependencies: Vec::new(),
            config: LibraryConfig::default(),
            state: LoadState::Unloaded,
            library_file: None,
            repo_dir: None,
            required: Vec::new(),
            indexed: false,
        }
    }

    /// LocalFile libraries are always local; others only when they live in the local root.
    pub fn is_local(&self, local_root: Option<&Path>) -> bool {
        if self.kind == LibraryKind::LocalFile {
            return true;
        }
        match (local_root, self.repo_dir.as_deref()) {
            (Some(root), Some(dir)) => root == dir,
            _ => false,
        }
    }

    /// Takes over a merged configuration. Commands only ever grow.
    pub fn apply_config(&mut self, config: LibraryConfig) {
        self.commands.extend(config.commands.iter().cloned());
        if !config.dependencies.is_empty() {
            self.dependencies = config.dependencies.clone();
        }
        if config.module.is_some() {
            self.module = config.module.clone();
        }
        self.config = config;
    }
}

// --- CONFIGURATION MODELS (troupe.toml and command-file front matter) ---

/// Descriptor of a library, as written by the user or returned by a config hook.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct LibraryConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub commands: BTreeSet<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub module: Option<String>,
    /// Command name -> option schema.
    #[serde(default)]
    pub options: BTreeMap<String, OptionSchema>,
    /// Command name -> aliases.
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
    /// Command name -> `Module.method`.
    #[serde(default)]
    pub class_commands: BTreeMap<String, String>,
    pub object_methods: Option<bool>,
}

impl LibraryConfig {
    /// Layers `self` over `base`: every attribute set in `self` wins,
    /// except `commands`, which are unioned. Per-command maps merge key by key.
    pub fn layered_over(self, base: LibraryConfig) -> LibraryConfig {
        let mut commands = base.commands;
        commands.extend(self.commands);

        let mut options = base.options;
        for (command, schema) in self.options {
            options.entry(command).or_default().extend(schema);
        }
        let mut aliases = base.aliases;
        aliases.extend(self.aliases);
        let mut class_commands = base.class_commands;
        class_commands.extend(self.class_commands);

        LibraryConfig {
            name: self.name.or(base.name),
            description: self.description.or(base.description),
            commands,
            dependencies: if self.dependencies.is_empty() {
                base.dependencies
            } else {
                self.dependencies
            },
            module: self.module.or(base.module),
            options,
            aliases,
            class_commands,
            object_methods: self.object_methods.or(base.object_methods),
        }
    }
}

/// Where a package's code comes from.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageConfig {
    pub module: Option<String>,
    pub file: Option<String>,
}

/// Represents the deserialized structure of `troupe.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TroupeConfig {
    pub commands_dir: Option<String>,
    pub local_root: Option<String>,
    /// Libraries loaded on every start.
    #[serde(default = "default_libraries")]
    pub defaults: Vec<String>,
    #[serde(default)]
    pub libraries: BTreeMap<String, LibraryConfig>,
    #[serde(default)]
    pub packages: BTreeMap<String, PackageConfig>,
}

fn default_libraries() -> Vec<String> {
    vec!["text".to_string()]
}

impl Default for TroupeConfig {
    fn default() -> Self {
        Self {
            commands_dir: None,
            local_root: None,
            defaults: default_libraries(),
            libraries: BTreeMap::new(),
            packages: BTreeMap::new(),
        }
    }
}

// --- PERSISTED INDEX MODELS ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IndexedLibrary {
    pub kind: LibraryKind,
    pub commands: Vec<String>,
    pub file: Option<String>,
    pub file_hash: Option<String>,
}

/// Library and command names known without a live load.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandIndex {
    #[serde(default)]
    pub libraries: BTreeMap<String, IndexedLibrary>,
}

impl CommandIndex {
    /// Finds the library that provides `command`.
    pub fn library_for(&self, command: &str) -> Option<&str> {
        self.libraries
            .iter()
            .find(|(_, lib)| lib.commands.iter().any(|c| c == command))
            .map(|(name, _)| name.as_str())
    }
}
