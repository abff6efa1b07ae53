//! # Runtime Namespace
//!
//! The in-process registry that libraries load into: library modules by name,
//! ambient commands (defined outside any module as a side effect of setup),
//! installed packages and the reserved top-level symbols used by the conflict check.
//!
//! A `Module` carries its lifecycle hooks as optional typed callbacks. The loader
//! queries them (`config_hook()`, `capability_gate()`, ...) instead of probing for
//! methods at runtime.

use crate::constants::COMMANDS_NAMESPACE;
use crate::models::{
    CommandEntry, CommandHandler, Invocation, LibraryConfig, ScriptBody, SourceLocation, Value,
};
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Symbols owned by the system. Library modules should not reuse them.
pub const RESERVED_SYMBOLS: &[&str] = &[
    COMMANDS_NAMESPACE,
    "Troupe",
    "Kernel",
    "Env",
    "File",
    "Dir",
    "Process",
];

/// Returns a library's default attributes. User configuration is layered over them.
pub type ConfigCallback = Arc<dyn Fn() -> LibraryConfig + Send + Sync>;
/// Decides whether a library loads in the current environment. Receives a throwaway namespace.
pub type CapabilityGate = Arc<dyn Fn(&mut Namespace) -> bool + Send + Sync>;
/// Integrates a module into the global namespace.
pub type SetupHook = Arc<dyn Fn(&mut SetupContext<'_>) -> Result<()> + Send + Sync>;
/// One-time initialization after setup. Never called for index loads.
pub type PostSetupHook = Arc<dyn Fn() -> Result<()> + Send + Sync>;

#[derive(Clone, Default)]
struct ModuleHooks {
    config: Option<ConfigCallback>,
    gate: Option<CapabilityGate>,
    setup: Option<SetupHook>,
    post_setup: Option<PostSetupHook>,
}

/// A unit of code a library resolves to: named members plus optional lifecycle hooks.
#[derive(Clone)]
pub struct Module {
    name: String,
    members: BTreeMap<String, CommandEntry>,
    locations: BTreeMap<String, SourceLocation>,
    source_file: Option<PathBuf>,
    hooks: ModuleHooks,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("source_file", &self.source_file)
            .field("config", &self.hooks.config.is_some())
            .field("gate", &self.hooks.gate.is_some())
            .field("setup", &self.hooks.setup.is_some())
            .field("post_setup", &self.hooks.post_setup.is_some())
            .finish()
    }
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
            locations: BTreeMap::new(),
            source_file: None,
            hooks: ModuleHooks::default(),
        }
    }

    /// Adds a native command.
    pub fn command<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        let handler: CommandHandler = Arc::new(handler);
        self.members.insert(name.into(), CommandEntry::Native(handler));
        self
    }

    pub fn with_config<F>(mut self, callback: F) -> Self
    where
        F: Fn() -> LibraryConfig + Send + Sync + 'static,
    {
        self.hooks.config = Some(Arc::new(callback));
        self
    }

    pub fn with_gate<F>(mut self, gate: F) -> Self
    where
        F: Fn(&mut Namespace) -> bool + Send + Sync + 'static,
    {
        self.hooks.gate = Some(Arc::new(gate));
        self
    }

    pub fn with_setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut SetupContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.setup = Some(Arc::new(hook));
        self
    }

    pub fn with_post_setup<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.post_setup = Some(Arc::new(hook));
        self
    }

    pub(crate) fn with_source_file(mut self, path: PathBuf) -> Self {
        self.source_file = Some(path);
        self
    }

    /// Adds a command defined in a command file, together with where it was defined.
    pub(crate) fn define_script(&mut self, name: &str, body: ScriptBody, location: SourceLocation) {
        self.members
            .insert(name.to_string(), CommandEntry::Script(body));
        self.locations.insert(name.to_string(), location);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &BTreeMap<String, CommandEntry> {
        &self.members
    }

    pub fn source_file(&self) -> Option<&PathBuf> {
        self.source_file.as_ref()
    }

    /// The declared location of a member, if it was defined in a file.
    pub fn source_location(&self, method: &str) -> Option<&SourceLocation> {
        self.locations.get(method)
    }

    pub fn config_hook(&self) -> Option<&ConfigCallback> {
        self.hooks.config.as_ref()
    }

    pub fn capability_gate(&self) -> Option<&CapabilityGate> {
        self.hooks.gate.as_ref()
    }

    pub fn setup_hook(&self) -> Option<&SetupHook> {
        self.hooks.setup.as_ref()
    }

    pub fn post_setup_hook(&self) -> Option<&PostSetupHook> {
        self.hooks.post_setup.as_ref()
    }
}

/// Where an installed package's code lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    Module(String),
    File(PathBuf),
    /// A prerequisite that exposes no commands.
    Bare,
}

/// Resolves a qualified module name to its runtime handle.
pub trait NamespaceResolver {
    fn resolve_by_name(&self, qualified_name: &str) -> Option<Arc<Module>>;
}

/// The process-wide runtime namespace.
#[derive(Debug, Clone)]
pub struct Namespace {
    symbols: BTreeSet<String>,
    modules: BTreeMap<String, Arc<Module>>,
    ambient: BTreeMap<String, AmbientCommand>,
    packages: BTreeMap<String, PackageSource>,
    activated: BTreeSet<String>,
}

/// A command defined outside any module, remembered with the library whose setup defined it.
#[derive(Debug, Clone)]
struct AmbientCommand {
    library: String,
    entry: CommandEntry,
}

impl Default for Namespace {
    /// An empty namespace with nothing reserved. Used as the scratch space for capability gates.
    fn default() -> Self {
        Self {
            symbols: BTreeSet::new(),
            modules: BTreeMap::new(),
            ambient: BTreeMap::new(),
            packages: BTreeMap::new(),
            activated: BTreeSet::new(),
        }
    }
}

impl Namespace {
    /// Creates the runtime namespace with the system's reserved symbols.
    pub fn new() -> Self {
        let mut namespace = Self::default();
        for symbol in RESERVED_SYMBOLS {
            namespace.reserve(*symbol);
        }
        namespace
    }

    pub fn reserve(&mut self, symbol: impl Into<String>) {
        self.symbols.insert(symbol.into());
    }

    pub fn reserved(&self) -> &BTreeSet<String> {
        &self.symbols
    }

    /// Registers (or replaces) a module under its own name.
    pub fn register_module(&mut self, module: Module) -> Arc<Module> {
        let module = Arc::new(module);
        self.insert_module(module.clone());
        module
    }

    pub(crate) fn insert_module(&mut self, module: Arc<Module>) {
        log::trace!("Registering module '{}' in namespace.", module.name());
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn module(&self, name: &str) -> Option<Arc<Module>> {
        let unprefixed = name
            .strip_prefix(COMMANDS_NAMESPACE)
            .and_then(|rest| rest.strip_prefix("::"))
            .unwrap_or(name);
        self.modules.get(unprefixed).cloned()
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.module(name).is_some()
    }

    /// Names of modules that were not evaluated from a command file.
    pub fn native_module_names(&self) -> impl Iterator<Item = &str> {
        self.modules
            .values()
            .filter(|m| m.source_file().is_none())
            .map(|m| m.name())
    }

    /// Defines (or redefines) an ambient command on behalf of `library`.
    pub fn define_ambient(
        &mut self,
        library: impl Into<String>,
        name: impl Into<String>,
        entry: CommandEntry,
    ) {
        let library = library.into();
        self.ambient
            .insert(name.into(), AmbientCommand { library, entry });
    }

    pub fn ambient(&self, name: &str) -> Option<&CommandEntry> {
        self.ambient.get(name).map(|ambient| &ambient.entry)
    }

    /// Ambient commands last defined by `library`'s setup.
    pub fn ambient_of<'a>(
        &'a self,
        library: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a CommandEntry)> + 'a {
        self.ambient
            .iter()
            .filter(move |(_, ambient)| ambient.library == library)
            .map(|(name, ambient)| (name, &ambient.entry))
    }

    /// Removes the ambient commands `library` defined, so its next setup starts clean.
    pub fn forget_ambient(&mut self, library: &str) {
        self.ambient.retain(|name, ambient| {
            let keep = ambient.library != library;
            if !keep {
                log::trace!("Forgetting ambient command '{}' of '{}'.", name, library);
            }
            keep
        });
    }

    pub fn register_package(&mut self, name: impl Into<String>, source: PackageSource) {
        self.packages.insert(name.into(), source);
    }

    pub fn package(&self, name: &str) -> Option<&PackageSource> {
        self.packages.get(name)
    }

    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Activates an installed package and returns where its code lives.
    pub fn activate(&mut self, name: &str) -> Option<PackageSource> {
        let source = self.packages.get(name)?.clone();
        if self.activated.insert(name.to_string()) {
            log::debug!("Activated package '{}'.", name);
        }
        Some(source)
    }

    pub fn is_activated(&self, name: &str) -> bool {
        self.activated.contains(name)
    }
}

impl NamespaceResolver for Namespace {
    fn resolve_by_name(&self, qualified_name: &str) -> Option<Arc<Module>> {
        self.module(qualified_name)
    }
}

/// Handed to a module's setup hook while it integrates into the namespace.
#[derive(Debug)]
pub struct SetupContext<'a> {
    namespace: &'a mut Namespace,
    library: &'a str,
    required: Vec<String>,
}

impl<'a> SetupContext<'a> {
    pub(crate) fn new(namespace: &'a mut Namespace, library: &'a str) -> Self {
        Self {
            namespace,
            library,
            required: Vec::new(),
        }
    }

    pub fn library(&self) -> &str {
        self.library
    }

    /// Defines a command outside of the module. Detected only with `object_methods` on.
    pub fn define_command<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Invocation) -> Result<Value> + Send + Sync + 'static,
    {
        let handler: CommandHandler = Arc::new(handler);
        self.namespace
            .define_ambient(self.library, name, CommandEntry::Native(handler));
    }

    /// Pulls in a package the module depends on.
    pub fn require(&mut self, package: &str) -> Result<()> {
        self.namespace.activate(package).ok_or_else(|| {
            anyhow!(
                "Library '{}' requires package '{}', which is not installed.",
                self.library,
                package
            )
        })?;
        if !self.required.iter().any(|p| p == package) {
            self.required.push(package.to_string());
        }
        Ok(())
    }

    pub(crate) fn into_required(self) -> Vec<String> {
        self.required
    }
}

/// `git_tools` -> `GitTools`.
pub fn camelize(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
