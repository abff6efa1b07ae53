//! # Library Loading
//!
//! Turns one library descriptor into commands, dependencies and merged
//! configuration. Each [`LibraryKind`] has its own way of resolving a library to a
//! [`Module`]; after that every kind goes through the same ordered lifecycle:
//!
//! 1. resolve the descriptor to a module (or file),
//! 2. layer user configuration over the module's config hook,
//! 3. ask the capability gate, with a throwaway namespace,
//! 4. check the module name against reserved symbols (warning only),
//! 5. integrate the module into the namespace and run its setup hook,
//! 6. run the post-setup hook, for live loads only.
//!
//! Registry bookkeeping (states, the failed set, command creation) belongs to the
//! manager. This module never touches the library registry.

use crate::constants::{COMMAND_FILE_EXT, COMMANDS_DIR};
use crate::core::conflict;
use crate::core::file_cache::FileCache;
use crate::core::namespace::{Module, Namespace, PackageSource, SetupContext, camelize};
use crate::core::script::{self, ScriptError};
use crate::models::{CommandEntry, Library, LibraryConfig, LibraryKind, TroupeConfig};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Represents errors that can occur while loading a library.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The capability gate declined to load the library. Not a failure.
    #[error("Library '{library}' is not supported in this environment.")]
    CapabilityRejected { library: String },

    /// The command file of a File or LocalFile library does not exist.
    #[error("Command file for library '{library}' not found at '{}'.", path.display())]
    NotFound { library: String, path: PathBuf },

    /// A Module library names a module that is not in the namespace.
    #[error("Module '{module}' for library '{library}' is not defined.")]
    NoModule { library: String, module: String },

    /// The command file could not be evaluated.
    #[error("Failed to evaluate the command file of library '{library}'.")]
    Script {
        library: String,
        #[source]
        source: ScriptError,
    },

    /// Package or requirement that is not installed.
    #[error("Package '{package}' required by library '{library}' is not installed.")]
    PackageNotFound { library: String, package: String },

    /// A dependency of the library failed to load.
    #[error("Dependency '{dependency}' of library '{library}' failed to load.")]
    DependencyFailed {
        library: String,
        dependency: String,
        #[source]
        source: Box<LoadError>,
    },

    /// The library is in the failed set. Only an explicit reload retries it.
    #[error("Library '{library}' failed to load earlier. Reload it to try again.")]
    PreviouslyFailed { library: String },

    /// Libraries that depend on each other.
    #[error("Circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// A lifecycle hook returned an error.
    #[error("The {hook} hook of library '{library}' failed.")]
    Hook {
        library: String,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The library's source file could not be read.
    #[error("Failed to read the source of library '{library}'.")]
    Io {
        library: String,
        #[source]
        source: anyhow::Error,
    },
}

impl LoadError {
    /// Everything except a capability rejection marks the library as failed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LoadError::CapabilityRejected { .. })
    }
}

/// Whether a load executes the library or only reads what it provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    #[default]
    Live,
    /// Builds the persisted index. Post-setup hooks never run.
    Index,
}

/// Everything a load may read or mutate besides the library itself.
#[derive(Debug)]
pub struct LoadContext<'a> {
    pub namespace: &'a mut Namespace,
    pub file_cache: &'a mut FileCache,
    pub user_config: Option<&'a LibraryConfig>,
    pub commands_dir: Option<&'a Path>,
    pub local_root: Option<&'a Path>,
    pub mode: LoadMode,
}

/// What a successful load produced.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// All command names of the library: detected ones unioned with configured ones.
    pub commands: BTreeSet<String>,
    pub dependencies: Vec<String>,
    pub config: LibraryConfig,
    pub module: Option<Arc<Module>>,
    /// Definitions of the detected commands.
    pub entries: BTreeMap<String, CommandEntry>,
    /// Packages pulled in by the setup hook.
    pub required: Vec<String>,
    /// Reserved symbol the module name collides with, if any.
    pub conflict: Option<String>,
}

/// Resolves a library of one kind to the module holding its code.
trait KindLoader {
    /// Lifecycle step 1. `Ok(None)` means the library exposes no code (requirements).
    fn resolve(
        &self,
        library: &mut Library,
        ctx: &mut LoadContext<'_>,
    ) -> Result<Option<Arc<Module>>, LoadError>;
}

struct ModuleLoader;
struct FileLoader {
    local: bool,
}
struct PackageLoader;
struct RequireLoader;

impl KindLoader for ModuleLoader {
    fn resolve(
        &self,
        library: &mut Library,
        ctx: &mut LoadContext<'_>,
    ) -> Result<Option<Arc<Module>>, LoadError> {
        let module_name = library
            .module
            .clone()
            .or_else(|| ctx.user_config.and_then(|c| c.module.clone()))
            .unwrap_or_else(|| camelize(&library.name));

        let module = ctx
            .namespace
            .module(&module_name)
            .ok_or_else(|| LoadError::NoModule {
                library: library.name.clone(),
                module: module_name.clone(),
            })?;
        library.module = Some(module.name().to_string());
        Ok(Some(module))
    }
}

impl KindLoader for FileLoader {
    fn resolve(
        &self,
        library: &mut Library,
        ctx: &mut LoadContext<'_>,
    ) -> Result<Option<Arc<Module>>, LoadError> {
        let (path, repo_dir) = match library.library_file.clone() {
            Some(path) => {
                let dir = path.parent().map(Path::to_path_buf);
                (path, dir)
            }
            None => {
                let dir = if self.local {
                    ctx.local_root.map(local_commands_dir)
                } else {
                    ctx.commands_dir.map(Path::to_path_buf)
                };
                let Some(dir) = dir else {
                    return Err(LoadError::NotFound {
                        library: library.name.clone(),
                        path: command_file_name(&library.name),
                    });
                };
                (dir.join(command_file_name(&library.name)), Some(dir))
            }
        };

        if !path.is_file() {
            return Err(LoadError::NotFound {
                library: library.name.clone(),
                path,
            });
        }

        let source = ctx
            .file_cache
            .read_library_file(&library.name, &path)
            .map_err(|e| LoadError::Io {
                library: library.name.clone(),
                source: e,
            })?;

        let module_name = library
            .module
            .clone()
            .unwrap_or_else(|| camelize(&library.name));
        let module =
            script::evaluate(&path, &source, &module_name).map_err(|e| LoadError::Script {
                library: library.name.clone(),
                source: e,
            })?;

        library.library_file = Some(path);
        library.repo_dir = if self.local {
            ctx.local_root.map(Path::to_path_buf)
        } else {
            repo_dir
        };
        library.module = Some(module_name);
        Ok(Some(Arc::new(module)))
    }
}

impl KindLoader for PackageLoader {
    fn resolve(
        &self,
        library: &mut Library,
        ctx: &mut LoadContext<'_>,
    ) -> Result<Option<Arc<Module>>, LoadError> {
        let source = activate(library, ctx)?;
        log::debug!(
            "Package '{}' activated, exposing {:?}.",
            library.name,
            source
        );

        match source {
            PackageSource::Module(module) => {
                library.module = Some(module);
                ModuleLoader.resolve(library, ctx)
            }
            PackageSource::File(path) => {
                library.library_file = Some(path);
                FileLoader { local: false }.resolve(library, ctx)
            }
            PackageSource::Bare => Ok(None),
        }
    }
}

impl KindLoader for RequireLoader {
    fn resolve(
        &self,
        library: &mut Library,
        ctx: &mut LoadContext<'_>,
    ) -> Result<Option<Arc<Module>>, LoadError> {
        activate(library, ctx)?;
        Ok(None)
    }
}

fn activate(library: &Library, ctx: &mut LoadContext<'_>) -> Result<PackageSource, LoadError> {
    ctx.namespace
        .activate(&library.name)
        .ok_or_else(|| LoadError::PackageNotFound {
            library: library.name.clone(),
            package: library.name.clone(),
        })
}

fn loader_for(kind: LibraryKind) -> Box<dyn KindLoader> {
    match kind {
        LibraryKind::Module => Box::new(ModuleLoader),
        LibraryKind::File => Box::new(FileLoader { local: false }),
        LibraryKind::LocalFile => Box::new(FileLoader { local: true }),
        LibraryKind::Package => Box::new(PackageLoader),
        LibraryKind::Require => Box::new(RequireLoader),
    }
}

/// Runs the full lifecycle for `library`.
///
/// The library is updated in place (merged config, module, file). Command entities
/// are not created here; the report carries what is needed to create them.
///
/// # Errors
/// `LoadError::CapabilityRejected` when the gate declines. Any other error is fatal
/// for this library.
pub fn load(library: &mut Library, ctx: &mut LoadContext<'_>) -> Result<LoadReport, LoadError> {
    log::debug!("Loading library '{}' ({}).", library.name, library.kind);

    // 1. Resolve.
    let module = loader_for(library.kind).resolve(library, ctx)?;

    // 2. Config hook, with user configuration layered over it.
    let base = module
        .as_ref()
        .and_then(|m| m.config_hook())
        .map(|hook| hook())
        .unwrap_or_default();
    let merged = match ctx.user_config {
        Some(user) => user.clone().layered_over(base),
        None => base,
    };
    library.apply_config(merged);

    // 3. Capability gate.
    if let Some(gate) = module.as_ref().and_then(|m| m.capability_gate()) {
        let mut scratch = Namespace::default();
        if !gate(&mut scratch) {
            log::debug!("Capability gate rejected library '{}'.", library.name);
            return Err(LoadError::CapabilityRejected {
                library: library.name.clone(),
            });
        }
    }

    // 4. Namespace conflict check.
    let conflict = module
        .as_ref()
        .and_then(|m| conflict::check(m.name(), ctx.namespace.reserved()));
    if let Some(symbol) = &conflict {
        log::warn!(
            "Library '{}' defines '{}', which collides with the reserved symbol '{}'.",
            library.name,
            module.as_ref().map(|m| m.name()).unwrap_or_default(),
            symbol
        );
    }

    // 5. Integration and setup.
    let mut required = Vec::new();
    if let Some(module) = &module {
        ctx.namespace.insert_module(module.clone());
        if let Some(setup) = module.setup_hook() {
            let mut setup_ctx = SetupContext::new(&mut *ctx.namespace, &library.name);
            setup(&mut setup_ctx).map_err(|e| LoadError::Hook {
                library: library.name.clone(),
                hook: "setup",
                source: e,
            })?;
            required = setup_ctx.into_required();
        }
    }

    let mut entries = BTreeMap::new();
    if let Some(module) = &module {
        for (name, entry) in module.members() {
            entries.insert(name.clone(), entry.clone());
        }
        if library.config.object_methods.unwrap_or(true) {
            for (name, entry) in ctx.namespace.ambient_of(&library.name) {
                log::debug!(
                    "Detected ambient command '{}' from library '{}'.",
                    name,
                    library.name
                );
                entries.insert(name.clone(), entry.clone());
            }
        }
    }
    library.commands.extend(entries.keys().cloned());
    library
        .commands
        .extend(library.config.class_commands.keys().cloned());

    // 6. Post-setup, live loads only.
    if ctx.mode == LoadMode::Live {
        if let Some(hook) = module.as_ref().and_then(|m| m.post_setup_hook()) {
            hook().map_err(|e| LoadError::Hook {
                library: library.name.clone(),
                hook: "post-setup",
                source: e,
            })?;
        }
    } else {
        log::debug!("Skipping post-setup of '{}' for indexing.", library.name);
    }
    library.indexed = ctx.mode == LoadMode::Index;

    Ok(LoadReport {
        commands: library.commands.clone(),
        dependencies: library.dependencies.clone(),
        config: library.config.clone(),
        module,
        entries,
        required,
        conflict,
    })
}

/// Decides how a library name is loaded.
///
/// Precedence: a module (configured, or the camelized name present in the
/// namespace), a command file, a local command file, a package exposing code,
/// and finally a bare requirement.
pub fn detect_kind(
    name: &str,
    config: &TroupeConfig,
    namespace: &Namespace,
    commands_dir: Option<&Path>,
    local_root: Option<&Path>,
) -> LibraryKind {
    // Modules evaluated from command files live in the namespace too; only native ones count.
    let is_native = |module: &str| {
        namespace
            .module(module)
            .is_some_and(|m| m.source_file().is_none())
    };
    let configured_module = config
        .libraries
        .get(name)
        .and_then(|c| c.module.as_deref());
    if configured_module.is_some_and(|m| is_native(m)) || is_native(&camelize(name)) {
        return LibraryKind::Module;
    }

    let file_name = command_file_name(name);
    if commands_dir.is_some_and(|dir| dir.join(&file_name).is_file()) {
        return LibraryKind::File;
    }
    if local_root.is_some_and(|root| local_commands_dir(root).join(&file_name).is_file()) {
        return LibraryKind::LocalFile;
    }

    match namespace.package(name) {
        Some(PackageSource::Module(_) | PackageSource::File(_)) => LibraryKind::Package,
        Some(PackageSource::Bare) => LibraryKind::Require,
        // A configured module that is not defined yet still fails as a module.
        None if configured_module.is_some() => LibraryKind::Module,
        None => LibraryKind::Require,
    }
}

pub fn command_file_name(library: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", library, COMMAND_FILE_EXT))
}

pub fn local_commands_dir(local_root: &Path) -> PathBuf {
    local_root.join(COMMANDS_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LoadState, Value};
    use anyhow::anyhow;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    fn traced_module(name: &str, calls: &Calls, gate: bool) -> Module {
        let (c1, c2, c3, c4) = (calls.clone(), calls.clone(), calls.clone(), calls.clone());
        Module::new(name)
            .command("hello", |_| Ok(Value::from("hi")))
            .with_config(move || {
                c1.lock().unwrap().push("config");
                LibraryConfig {
                    commands: ["configured"].iter().map(|s| s.to_string()).collect(),
                    description: Some("module default".to_string()),
                    ..Default::default()
                }
            })
            .with_gate(move |_| {
                c2.lock().unwrap().push("gate");
                gate
            })
            .with_setup(move |ctx| {
                c3.lock().unwrap().push("setup");
                ctx.define_command("ambient_hi", |_| Ok(Value::Nil));
                Ok(())
            })
            .with_post_setup(move || {
                c4.lock().unwrap().push("post_setup");
                Ok(())
            })
    }

    fn context<'a>(
        namespace: &'a mut Namespace,
        file_cache: &'a mut FileCache,
        mode: LoadMode,
    ) -> LoadContext<'a> {
        LoadContext {
            namespace,
            file_cache,
            user_config: None,
            commands_dir: None,
            local_root: None,
            mode,
        }
    }

    #[test]
    fn test_module_lifecycle_runs_in_order() {
        let calls = Calls::default();
        let mut namespace = Namespace::new();
        namespace.register_module(traced_module("Greeter", &calls, true));
        let mut cache = FileCache::new();
        let mut library = Library::new("greeter", LibraryKind::Module);

        let report = load(
            &mut library,
            &mut context(&mut namespace, &mut cache, LoadMode::Live),
        )
        .unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["config", "gate", "setup", "post_setup"]
        );
        let names: Vec<&str> = report.commands.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["ambient_hi", "configured", "hello"]);
        assert!(report.entries.contains_key("ambient_hi"));
        assert!(!report.entries.contains_key("configured"));
        assert_eq!(library.module.as_deref(), Some("Greeter"));
        assert!(!library.indexed);
    }

    #[test]
    fn test_user_config_wins_but_commands_are_unioned() {
        let calls = Calls::default();
        let mut namespace = Namespace::new();
        namespace.register_module(traced_module("Greeter", &calls, true));
        let mut cache = FileCache::new();
        let user = LibraryConfig {
            commands: ["extra"].iter().map(|s| s.to_string()).collect(),
            description: Some("mine".to_string()),
            ..Default::default()
        };
        let mut ctx = context(&mut namespace, &mut cache, LoadMode::Live);
        ctx.user_config = Some(&user);

        let mut library = Library::new("greeter", LibraryKind::Module);
        let report = load(&mut library, &mut ctx).unwrap();

        assert!(report.commands.is_superset(&user.commands));
        assert!(report.commands.contains("configured"));
        assert_eq!(report.config.description.as_deref(), Some("mine"));
    }

    #[test]
    fn test_gate_rejection_stops_before_setup() {
        let calls = Calls::default();
        let mut namespace = Namespace::new();
        namespace.register_module(traced_module("Greeter", &calls, false));
        let mut cache = FileCache::new();
        let mut library = Library::new("greeter", LibraryKind::Module);

        let err = load(
            &mut library,
            &mut context(&mut namespace, &mut cache, LoadMode::Live),
        )
        .unwrap_err();

        assert!(matches!(err, LoadError::CapabilityRejected { .. }));
        assert!(!err.is_fatal());
        assert_eq!(*calls.lock().unwrap(), vec!["config", "gate"]);
        assert!(namespace.ambient("ambient_hi").is_none());
    }

    #[test]
    fn test_gate_gets_a_throwaway_namespace() {
        let mut namespace = Namespace::new();
        namespace.register_module(Module::new("Sandboxed").with_gate(|scratch| {
            let empty = scratch.reserved().is_empty() && !scratch.has_module("Sandboxed");
            scratch.register_module(Module::new("Leaked"));
            empty
        }));
        let mut cache = FileCache::new();
        let mut library = Library::new("sandboxed", LibraryKind::Module);

        load(
            &mut library,
            &mut context(&mut namespace, &mut cache, LoadMode::Live),
        )
        .unwrap();
        assert!(!namespace.has_module("Leaked"));
    }

    #[test]
    fn test_index_mode_skips_post_setup() {
        let calls = Calls::default();
        let mut namespace = Namespace::new();
        namespace.register_module(traced_module("Greeter", &calls, true));
        let mut cache = FileCache::new();
        let mut library = Library::new("greeter", LibraryKind::Module);

        load(
            &mut library,
            &mut context(&mut namespace, &mut cache, LoadMode::Index),
        )
        .unwrap();

        assert!(!calls.lock().unwrap().contains(&"post_setup"));
        assert!(library.indexed);
    }

    #[test]
    fn test_object_methods_off_ignores_ambient_commands() {
        let calls = Calls::default();
        let mut namespace = Namespace::new();
        namespace.register_module(traced_module("Greeter", &calls, true));
        let mut cache = FileCache::new();
        let user = LibraryConfig {
            object_methods: Some(false),
            ..Default::default()
        };
        let mut ctx = context(&mut namespace, &mut cache, LoadMode::Live);
        ctx.user_config = Some(&user);

        let mut library = Library::new("greeter", LibraryKind::Module);
        let report = load(&mut library, &mut ctx).unwrap();
        assert!(!report.commands.contains("ambient_hi"));
        assert!(report.commands.contains("hello"));
    }

    #[test]
    fn test_hook_errors_are_fatal() {
        let mut namespace = Namespace::new();
        namespace.register_module(
            Module::new("Broken").with_setup(|_| Err(anyhow!("setup exploded"))),
        );
        let mut cache = FileCache::new();
        let mut library = Library::new("broken", LibraryKind::Module);

        let err = load(
            &mut library,
            &mut context(&mut namespace, &mut cache, LoadMode::Live),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Hook { hook: "setup", .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_module() {
        let mut namespace = Namespace::new();
        let mut cache = FileCache::new();
        let mut library = Library::new("ghost", LibraryKind::Module);
        let err = load(
            &mut library,
            &mut context(&mut namespace, &mut cache, LoadMode::Live),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::NoModule { ref module, .. } if module == "Ghost"));
    }

    #[test]
    fn test_file_library_registers_module_with_provenance() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("git.troupe"),
            "+++\ndependencies = [\"text\"]\n+++\ndef status(path = \".\")\n git status <path>\nend\n",
        )
        .unwrap();

        let mut namespace = Namespace::new();
        let mut cache = FileCache::new();
        let mut ctx = context(&mut namespace, &mut cache, LoadMode::Live);
        ctx.commands_dir = Some(dir.path());

        let mut library = Library::new("git", LibraryKind::File);
        let report = load(&mut library, &mut ctx).unwrap();

        assert!(report.commands.contains("status"));
        assert_eq!(report.dependencies, vec!["text".to_string()]);
        assert_eq!(library.library_file, Some(dir.path().join("git.troupe")));
        assert_eq!(library.repo_dir.as_deref(), Some(dir.path()));
        assert_eq!(
            report.module.unwrap().source_location("status").unwrap().line,
            4
        );
        assert!(namespace.has_module("Git"));
        assert!(cache.contains("git"));
    }

    #[test]
    fn test_file_errors() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.troupe"), "def broken\n").unwrap();

        let mut namespace = Namespace::new();
        let mut cache = FileCache::new();
        let mut ctx = context(&mut namespace, &mut cache, LoadMode::Live);
        ctx.commands_dir = Some(dir.path());

        let mut missing = Library::new("missing", LibraryKind::File);
        assert!(matches!(
            load(&mut missing, &mut ctx),
            Err(LoadError::NotFound { .. })
        ));

        let mut bad = Library::new("bad", LibraryKind::File);
        assert!(matches!(
            load(&mut bad, &mut ctx),
            Err(LoadError::Script { .. })
        ));
    }

    #[test]
    fn test_local_file_library_is_local() {
        let root = tempdir().unwrap();
        fs::create_dir_all(local_commands_dir(root.path())).unwrap();
        fs::write(
            local_commands_dir(root.path()).join("proj.troupe"),
            "def build\n make\nend\n",
        )
        .unwrap();

        let mut namespace = Namespace::new();
        let mut cache = FileCache::new();
        let mut ctx = context(&mut namespace, &mut cache, LoadMode::Live);
        ctx.local_root = Some(root.path());

        let mut library = Library::new("proj", LibraryKind::LocalFile);
        load(&mut library, &mut ctx).unwrap();
        assert!(library.is_local(Some(root.path())));
        assert!(library.commands.contains("build"));
    }

    #[test]
    fn test_package_delegates_to_module() {
        let mut namespace = Namespace::new();
        namespace.register_module(Module::new("Tools").command("lint", |_| Ok(Value::Nil)));
        namespace.register_package("tools", PackageSource::Module("Tools".to_string()));
        let mut cache = FileCache::new();

        let mut library = Library::new("tools", LibraryKind::Package);
        let report = load(
            &mut library,
            &mut context(&mut namespace, &mut cache, LoadMode::Live),
        )
        .unwrap();
        assert!(report.commands.contains("lint"));
        assert!(namespace.is_activated("tools"));
    }

    #[test]
    fn test_require_activates_without_detection() {
        let mut namespace = Namespace::new();
        namespace.register_package("json", PackageSource::Bare);
        let mut cache = FileCache::new();

        let mut library = Library::new("json", LibraryKind::Require);
        let report = load(
            &mut library,
            &mut context(&mut namespace, &mut cache, LoadMode::Live),
        )
        .unwrap();
        assert!(report.commands.is_empty());
        assert!(report.module.is_none());
        assert!(namespace.is_activated("json"));

        let mut unknown = Library::new("nope", LibraryKind::Require);
        assert!(matches!(
            load(
                &mut unknown,
                &mut context(&mut namespace, &mut cache, LoadMode::Live)
            ),
            Err(LoadError::PackageNotFound { .. })
        ));
        assert_eq!(unknown.state, LoadState::Unloaded);
    }

    #[test]
    fn test_conflict_is_reported_but_not_fatal() {
        let mut namespace = Namespace::new();
        namespace.register_module(Module::new("Env").command("show", |_| Ok(Value::Nil)));
        let mut cache = FileCache::new();
        let mut library = Library::new("env", LibraryKind::Module);

        let report = load(
            &mut library,
            &mut context(&mut namespace, &mut cache, LoadMode::Live),
        )
        .unwrap();
        assert_eq!(report.conflict.as_deref(), Some("Env"));
        assert!(report.commands.contains("show"));
    }

    #[test]
    fn test_detect_kind_precedence() {
        let commands = tempdir().unwrap();
        let local = tempdir().unwrap();
        fs::write(commands.path().join("git.troupe"), "").unwrap();
        fs::create_dir_all(local_commands_dir(local.path())).unwrap();
        fs::write(local_commands_dir(local.path()).join("proj.troupe"), "").unwrap();

        let mut namespace = Namespace::new();
        namespace.register_module(Module::new("Text"));
        namespace.register_package("tools", PackageSource::Module("Tools".to_string()));
        namespace.register_package("json", PackageSource::Bare);
        let config = TroupeConfig::default();
        let detect = |name: &str| {
            detect_kind(
                name,
                &config,
                &namespace,
                Some(commands.path()),
                Some(local.path()),
            )
        };

        assert_eq!(detect("text"), LibraryKind::Module);
        assert_eq!(detect("git"), LibraryKind::File);
        assert_eq!(detect("proj"), LibraryKind::LocalFile);
        assert_eq!(detect("tools"), LibraryKind::Package);
        assert_eq!(detect("json"), LibraryKind::Require);
        assert_eq!(detect("unknown"), LibraryKind::Require);
    }
}
