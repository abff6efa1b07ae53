//! # Library Manager
//!
//! Owns the process-wide registry: libraries, commands, aliases, the failed set
//! and the file-scan cache. It drives [`loader::load`] for each library, loads
//! dependencies, creates [`Command`] entities and keeps aliases unique.
//!
//! Failure handling follows one path: a fatal load error marks the library as
//! failed and only then drops its file cache entry, so a reload always scans the
//! source again.

use crate::core::file_cache::FileCache;
use crate::core::index_manager;
use crate::core::introspector::Introspector;
use crate::core::loader::{self, LoadContext, LoadError, LoadMode, LoadReport};
use crate::core::namespace::{Namespace, PackageSource};
use crate::core::paths;
use crate::core::pipe::CommandLookup;
use crate::models::{
    ArgSignature, Command, CommandEntry, CommandIndex, IndexedLibrary, Library, LibraryKind,
    LoadState, MethodBinding, TroupeConfig,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Where an alias points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub command: String,
    pub library: String,
    /// The command it pointed to was discarded by a reload and not recreated yet.
    pub stale: bool,
}

/// A command or alias that was skipped because its name was already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasConflict {
    pub name: String,
    pub library: String,
    /// Library that already owns the name.
    pub owner: String,
}

/// Non-fatal result of a load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { commands: usize },
    AlreadyLoaded,
    /// The capability gate declined. The library has no commands and is not failed.
    Rejected,
}

/// Result of loading several libraries. One failure never stops the others.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub loaded: Vec<String>,
    pub rejected: Vec<String>,
    pub failed: Vec<(String, LoadError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct Manager {
    namespace: Namespace,
    config: TroupeConfig,
    commands_dir: Option<PathBuf>,
    local_root: Option<PathBuf>,
    mode: LoadMode,
    libraries: BTreeMap<String, Library>,
    commands: BTreeMap<String, Command>,
    aliases: BTreeMap<String, AliasEntry>,
    failed: BTreeSet<String>,
    rejected: BTreeSet<String>,
    conflicts: Vec<AliasConflict>,
    /// Commands hidden by a Package library, keyed by name, with the package that hid them.
    shadowed: BTreeMap<String, (String, Command)>,
    file_cache: FileCache,
    introspector: Introspector,
    /// Libraries currently being loaded, outermost first.
    loading: Vec<String>,
}

impl Manager {
    /// Creates a manager over `namespace`. Packages declared in `config` are
    /// registered in the namespace.
    pub fn new(mut namespace: Namespace, config: TroupeConfig) -> Self {
        for (name, package) in &config.packages {
            let source = match (&package.module, &package.file) {
                (Some(module), _) => PackageSource::Module(module.clone()),
                (None, Some(file)) => match paths::expand_path(file) {
                    Ok(path) => PackageSource::File(path),
                    Err(e) => {
                        log::warn!("Ignoring file of package '{}': {:#}", name, e);
                        PackageSource::Bare
                    }
                },
                (None, None) => PackageSource::Bare,
            };
            namespace.register_package(name.clone(), source);
        }

        Self {
            namespace,
            config,
            commands_dir: None,
            local_root: None,
            mode: LoadMode::Live,
            libraries: BTreeMap::new(),
            commands: BTreeMap::new(),
            aliases: BTreeMap::new(),
            failed: BTreeSet::new(),
            rejected: BTreeSet::new(),
            conflicts: Vec::new(),
            shadowed: BTreeMap::new(),
            file_cache: FileCache::new(),
            introspector: Introspector::default(),
            loading: Vec::new(),
        }
    }

    pub fn with_commands_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.commands_dir = Some(dir.into());
        self
    }

    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    pub fn with_introspector(mut self, introspector: Introspector) -> Self {
        self.introspector = introspector;
        self
    }

    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    // --- Loading ---

    /// Loads a library and its dependencies.
    ///
    /// # Errors
    /// Any fatal `LoadError`. The library is then in the failed set and later
    /// `load` calls return `LoadError::PreviouslyFailed` until it is reloaded.
    pub fn load(&mut self, name: &str) -> Result<LoadOutcome, LoadError> {
        if self.failed.contains(name) {
            return Err(LoadError::PreviouslyFailed {
                library: name.to_string(),
            });
        }
        if self.rejected.contains(name) {
            return Ok(LoadOutcome::Rejected);
        }
        if self
            .libraries
            .get(name)
            .is_some_and(|lib| lib.state == LoadState::Loaded)
        {
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        if self.loading.iter().any(|l| l == name) {
            let mut chain = self.loading.clone();
            chain.push(name.to_string());
            return Err(LoadError::CircularDependency { chain });
        }

        self.loading.push(name.to_string());
        let result = self.load_library(name);
        self.loading.pop();

        match result {
            Ok(count) => {
                log::debug!("Library '{}' loaded with {} command(s).", name, count);
                Ok(LoadOutcome::Loaded { commands: count })
            }
            Err(LoadError::CapabilityRejected { .. }) => {
                self.mark_rejected(name);
                Ok(LoadOutcome::Rejected)
            }
            Err(e) => {
                self.mark_failed(name, &e);
                Err(e)
            }
        }
    }

    /// Loads every library in `names`, in order.
    pub fn load_many<S: AsRef<str>>(&mut self, names: &[S]) -> BatchReport {
        let mut report = BatchReport::default();
        for name in names {
            let name = name.as_ref();
            match self.load(name) {
                Ok(LoadOutcome::Rejected) => report.rejected.push(name.to_string()),
                Ok(_) => report.loaded.push(name.to_string()),
                Err(e) => report.failed.push((name.to_string(), e)),
            }
        }
        report
    }

    /// Loads the libraries listed under `defaults` in the config.
    pub fn load_defaults(&mut self) -> BatchReport {
        let defaults = self.config.defaults.clone();
        self.load_many(&defaults)
    }

    /// Forgets everything known about a library and loads it again.
    ///
    /// Clears failed or rejected status, drops the file cache entry, discards the
    /// library's commands (their aliases become stale) along with the ambient
    /// commands its setup defined, and rediscovers its kind.
    pub fn reload(&mut self, name: &str) -> Result<LoadOutcome, LoadError> {
        log::debug!("Reloading library '{}'.", name);
        self.failed.remove(name);
        self.rejected.remove(name);
        self.file_cache.reset(name);
        self.discard_commands(name);
        self.namespace.forget_ambient(name);
        self.libraries.remove(name);
        self.load(name)
    }

    /// Runs the lifecycle and creates commands. Returns the number of commands.
    fn load_library(&mut self, name: &str) -> Result<usize, LoadError> {
        let mut library = match self.libraries.remove(name) {
            Some(library) => library,
            None => {
                let kind = loader::detect_kind(
                    name,
                    &self.config,
                    &self.namespace,
                    self.commands_dir.as_deref(),
                    self.local_root.as_deref(),
                );
                log::debug!("Discovered library '{}' as {}.", name, kind);
                Library::new(name, kind)
            }
        };
        library.state = LoadState::Loading;

        let user_config = self.config.libraries.get(name).cloned();
        let mut ctx = LoadContext {
            namespace: &mut self.namespace,
            file_cache: &mut self.file_cache,
            user_config: user_config.as_ref(),
            commands_dir: self.commands_dir.as_deref(),
            local_root: self.local_root.as_deref(),
            mode: self.mode,
        };
        let result = loader::load(&mut library, &mut ctx);
        self.libraries.insert(name.to_string(), library);
        let report = result?;

        for dependency in &report.dependencies {
            match self.load(dependency) {
                Ok(LoadOutcome::Rejected) => {
                    return Err(LoadError::DependencyFailed {
                        library: name.to_string(),
                        dependency: dependency.clone(),
                        source: Box::new(LoadError::CapabilityRejected {
                            library: dependency.clone(),
                        }),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(LoadError::DependencyFailed {
                        library: name.to_string(),
                        dependency: dependency.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }

        if let Some(library) = self.libraries.get_mut(name) {
            library.required = report.required.clone();
        }
        let count = self.create_commands(name, report);
        if let Some(library) = self.libraries.get_mut(name) {
            library.state = LoadState::Loaded;
        }
        Ok(count)
    }

    /// Builds the library's commands from a load report, enforcing alias uniqueness.
    fn create_commands(&mut self, name: &str, report: LoadReport) -> usize {
        let Some(library) = self.libraries.get(name) else {
            return 0;
        };
        let exempt = library.kind == LibraryKind::Package;
        let attach_provenance = library.library_file.is_some();
        let config = library.config.clone();

        let mut created = 0;
        for command_name in &report.commands {
            let binding = config
                .class_commands
                .get(command_name)
                .and_then(|qualified| MethodBinding::parse(qualified));

            let entry = match &binding {
                Some(binding) => self
                    .namespace
                    .module(&binding.module)
                    .and_then(|m| m.members().get(&binding.method).cloned())
                    .unwrap_or(CommandEntry::Unbound),
                None => report
                    .entries
                    .get(command_name)
                    .cloned()
                    .unwrap_or(CommandEntry::Unbound),
            };

            let mut command = Command::new(command_name, name, entry);
            command.binding = binding;
            command.options = config.options.get(command_name).cloned().unwrap_or_default();
            command.aliases = config.aliases.get(command_name).cloned().unwrap_or_default();
            if let CommandEntry::Script(body) = &command.entry {
                command.description = body.description.clone();
            }
            if attach_provenance && let Some(module) = &report.module {
                command.provenance = module.source_location(command_name).cloned();
            }

            if !exempt && let Some(owner) = self.name_owner(command_name, name) {
                self.record_conflict(command_name, name, owner);
                continue;
            }

            for alias in &command.aliases {
                if !exempt && let Some(owner) = self.name_owner(alias, name) {
                    self.record_conflict(alias, name, owner);
                    continue;
                }
                self.aliases.insert(
                    alias.clone(),
                    AliasEntry {
                        command: command_name.clone(),
                        library: name.to_string(),
                        stale: false,
                    },
                );
            }

            if exempt
                && let Some(previous) = self.commands.remove(command_name)
                && previous.library != name
            {
                log::debug!(
                    "Package '{}' shadows command '{}' of library '{}'.",
                    name,
                    command_name,
                    previous.library
                );
                self.shadowed
                    .insert(command_name.clone(), (name.to_string(), previous));
            }
            self.commands.insert(command_name.clone(), command);
            created += 1;
        }
        created
    }

    /// Library owning `name` as a command or live alias, if it is not `library`.
    fn name_owner(&self, name: &str, library: &str) -> Option<String> {
        if let Some(command) = self.commands.get(name)
            && command.library != library
        {
            return Some(command.library.clone());
        }
        match self.aliases.get(name) {
            Some(alias) if !alias.stale && alias.library != library => Some(alias.library.clone()),
            _ => None,
        }
    }

    fn record_conflict(&mut self, name: &str, library: &str, owner: String) {
        log::warn!(
            "Library '{}' cannot define '{}': the name already belongs to library '{}'.",
            library,
            name,
            owner
        );
        self.conflicts.push(AliasConflict {
            name: name.to_string(),
            library: library.to_string(),
            owner,
        });
    }

    fn discard_commands(&mut self, library: &str) {
        self.commands.retain(|_, command| command.library != library);
        for alias in self.aliases.values_mut() {
            if alias.library == library {
                alias.stale = true;
            }
        }

        // Commands this library shadowed belong to their owners again.
        let restored: Vec<String> = self
            .shadowed
            .iter()
            .filter(|(_, (package, _))| package == library)
            .map(|(name, _)| name.clone())
            .collect();
        for name in restored {
            if let Some((_, command)) = self.shadowed.remove(&name) {
                log::debug!(
                    "Restoring command '{}' of library '{}'.",
                    name,
                    command.library
                );
                self.commands.entry(name).or_insert(command);
            }
        }
        // A discarded owner has nothing left to restore.
        self.shadowed
            .retain(|_, (_, command)| command.library != library);
    }

    fn mark_failed(&mut self, name: &str, error: &LoadError) {
        log::warn!("Library '{}' failed to load: {}", name, error);
        if let Some(library) = self.libraries.get_mut(name) {
            library.state = LoadState::Failed;
        }
        self.failed.insert(name.to_string());
        self.file_cache.reset(name);
    }

    fn mark_rejected(&mut self, name: &str) {
        log::debug!("Library '{}' was rejected by its capability gate.", name);
        if let Some(library) = self.libraries.get_mut(name) {
            library.state = LoadState::Unloaded;
            library.commands.clear();
        }
        self.rejected.insert(name.to_string());
    }

    // --- Indexing ---

    /// Loads every discoverable library without running post-setup hooks and
    /// returns what each provides.
    ///
    /// File-based libraries whose content hash matches `previous` are copied
    /// from it instead of being loaded again. The live registry is not touched.
    pub fn index_all(&self, previous: &CommandIndex) -> (CommandIndex, BatchReport) {
        let names = index_manager::discover_libraries(
            &self.config,
            &self.namespace,
            self.commands_dir.as_deref(),
            self.local_root.as_deref(),
        );

        let mut indexer = Manager::new(self.namespace.clone(), self.config.clone())
            .with_mode(LoadMode::Index);
        indexer.commands_dir = self.commands_dir.clone();
        indexer.local_root = self.local_root.clone();

        let mut index = CommandIndex::default();
        let mut report = BatchReport::default();

        for name in names {
            if let Some(reused) = unchanged_entry(&name, previous, &indexer) {
                log::debug!("Index entry for '{}' is up to date.", name);
                index.libraries.insert(name.clone(), reused);
                report.loaded.push(name);
                continue;
            }

            match indexer.load(&name) {
                Ok(LoadOutcome::Rejected) => report.rejected.push(name),
                Ok(_) => {
                    if let Some(library) = indexer.library(&name) {
                        index.libraries.insert(name.clone(), indexed_library(library));
                    }
                    report.loaded.push(name);
                }
                Err(e) => report.failed.push((name, e)),
            }
        }
        (index, report)
    }

    // --- Introspection ---

    /// The argument signature of a command (or alias). `None` if no such command.
    pub fn args(&mut self, name: &str) -> Option<ArgSignature> {
        let resolved = self.resolve_name(name)?;
        let command = self.commands.get(&resolved)?;
        let library = self.libraries.get(&command.library);
        Some(self.introspector.resolve(
            command,
            library,
            &self.namespace,
            &mut self.file_cache,
        ))
    }

    // --- Lookups ---

    /// Canonical command name for a command name or a live alias.
    pub fn resolve_name(&self, name: &str) -> Option<String> {
        if self.commands.contains_key(name) {
            return Some(name.to_string());
        }
        self.alias(name).map(|alias| alias.command.clone())
    }

    pub fn command(&self, name_or_alias: &str) -> Option<&Command> {
        let name = self.resolve_name(name_or_alias)?;
        self.commands.get(&name)
    }

    /// A live alias. Stale aliases are not returned.
    pub fn alias(&self, name: &str) -> Option<&AliasEntry> {
        self.aliases.get(name).filter(|alias| !alias.stale)
    }

    pub fn stale_aliases(&self) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|(_, alias)| alias.stale)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libraries.get(name)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries.values()
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn failed(&self) -> &BTreeSet<String> {
        &self.failed
    }

    pub fn rejected(&self) -> &BTreeSet<String> {
        &self.rejected
    }

    pub fn conflicts(&self) -> &[AliasConflict] {
        &self.conflicts
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn file_cache(&self) -> &FileCache {
        &self.file_cache
    }

    pub fn config(&self) -> &TroupeConfig {
        &self.config
    }

    pub fn local_root(&self) -> Option<&Path> {
        self.local_root.as_deref()
    }
}

impl CommandLookup for Manager {
    fn lookup(&self, name: &str) -> Option<&Command> {
        self.command(name)
    }
}

fn indexed_library(library: &Library) -> IndexedLibrary {
    let file_hash = library
        .library_file
        .as_deref()
        .and_then(|path| index_manager::file_hash(path).ok());
    IndexedLibrary {
        kind: library.kind,
        commands: library.commands.iter().cloned().collect(),
        file: library
            .library_file
            .as_ref()
            .map(|p| p.display().to_string()),
        file_hash,
    }
}

/// The previous entry for `name` if its file is still byte-for-byte the same.
fn unchanged_entry(name: &str, previous: &CommandIndex, indexer: &Manager) -> Option<IndexedLibrary> {
    let entry = previous.libraries.get(name)?;
    let (file, hash) = (entry.file.as_deref()?, entry.file_hash.as_deref()?);
    if indexer.config.libraries.contains_key(name) {
        // User configuration can change what a library provides without touching its file.
        return None;
    }
    let current = index_manager::file_hash(Path::new(file)).ok()?;
    (current == hash).then(|| entry.clone())
}
