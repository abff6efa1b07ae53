//! # Argument Introspection
//!
//! Resolves a command's formal arguments by scraping source text, never by calling
//! the command. Commands are mostly introspected for usage output, often before
//! they ever run.
//!
//! The result is memoized inside the `Command` itself: the first call moves its
//! signature from `Uncomputed` to `Computed` or `Unavailable`, and later calls read
//! that value back without touching the filesystem or the inspector.

use crate::core::file_cache::FileCache;
use crate::core::inspector::{ScriptInspector, SourceInspector};
use crate::core::namespace::NamespaceResolver;
use crate::models::{ArgSignature, Argument, Command, Library};
use std::fs;

#[derive(Debug)]
pub struct Introspector {
    inspector: Box<dyn SourceInspector>,
}

impl Default for Introspector {
    fn default() -> Self {
        Self::new(ScriptInspector)
    }
}

impl Introspector {
    pub fn new(inspector: impl SourceInspector + 'static) -> Self {
        Self {
            inspector: Box::new(inspector),
        }
    }

    /// Returns the argument signature of `command`, computing it on the first call only.
    pub fn resolve(
        &self,
        command: &Command,
        library: Option<&Library>,
        resolver: &dyn NamespaceResolver,
        file_cache: &mut FileCache,
    ) -> ArgSignature {
        command
            .signature_cell()
            .get_or_init(|| self.scan(command, library, resolver, file_cache));
        command.signature()
    }

    fn scan(
        &self,
        command: &Command,
        library: Option<&Library>,
        resolver: &dyn NamespaceResolver,
        file_cache: &mut FileCache,
    ) -> Option<Vec<Argument>> {
        let (source, key) = source_and_key(command, library, resolver, file_cache);
        let (Some(source), Some(key)) = (source, key) else {
            log::debug!("No source available for command '{}'.", command.name);
            return None;
        };

        let args = self.inspector.scrape_arguments(&source, &key);
        if args.is_none() {
            log::debug!(
                "Definition '{}' not found in the source of command '{}'.",
                key,
                command.name
            );
        }
        args
    }
}

/// Finds the source text to scrape and the definition name to look for.
fn source_and_key(
    command: &Command,
    library: Option<&Library>,
    resolver: &dyn NamespaceResolver,
    file_cache: &mut FileCache,
) -> (Option<String>, Option<String>) {
    // 1. A command bound to a specific Module.method reads the method's own file.
    if let Some(binding) = &command.binding {
        let location = resolver
            .resolve_by_name(&binding.module)
            .and_then(|module| module.source_location(&binding.method).cloned());

        let Some(location) = location else {
            log::debug!(
                "No source location for '{}.{}'.",
                binding.module,
                binding.method
            );
            return (None, Some(binding.method.clone()));
        };

        return match fs::read_to_string(&location.file) {
            Ok(text) => (Some(text), Some(binding.method.clone())),
            Err(e) => {
                log::warn!(
                    "Could not read '{}' to inspect '{}': {}",
                    location.file.display(),
                    command.name,
                    e
                );
                (None, Some(binding.method.clone()))
            }
        };
    }

    // 2. Otherwise, the owning library's file, looked up by the command's own name.
    let Some(library) = library else {
        return (None, None);
    };
    let Some(path) = library.library_file.as_deref().filter(|p| p.exists()) else {
        return (None, Some(command.name.clone()));
    };

    match file_cache.read_library_file(&library.name, path) {
        Ok(source) => (Some(source.to_string()), Some(command.name.clone())),
        Err(e) => {
            log::warn!("Could not read library file for '{}': {:#}", library.name, e);
            (None, Some(command.name.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::namespace::{Module, Namespace};
    use crate::models::{CommandEntry, LibraryKind, MethodBinding, ScriptBody, SourceLocation};
    use std::cell::Cell;
    use std::io::Write;
    use std::rc::Rc;
    use tempfile::NamedTempFile;

    /// Counts scrapes and delegates to the real inspector.
    #[derive(Debug, Clone, Default)]
    struct CountingInspector {
        calls: Rc<Cell<usize>>,
    }

    impl SourceInspector for CountingInspector {
        fn scrape_arguments(&self, source: &str, key: &str) -> Option<Vec<Argument>> {
            self.calls.set(self.calls.get() + 1);
            ScriptInspector.scrape_arguments(source, key)
        }
    }

    fn source_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn file_library(path: &std::path::Path) -> Library {
        let mut lib = Library::new("git", LibraryKind::File);
        lib.library_file = Some(path.to_path_buf());
        lib
    }

    #[test]
    fn test_resolves_from_library_file_once() {
        let file = source_file("def status(path = \".\")\n git status <path>\nend\n");
        let library = file_library(file.path());
        let command = Command::new("status", "git", CommandEntry::Unbound);

        let inspector = CountingInspector::default();
        let calls = inspector.calls.clone();
        let introspector = Introspector::new(inspector);
        let namespace = Namespace::new();
        let mut cache = FileCache::new();

        assert_eq!(command.signature(), ArgSignature::Uncomputed);
        let first = introspector.resolve(&command, Some(&library), &namespace, &mut cache);
        let second = introspector.resolve(&command, Some(&library), &namespace, &mut cache);

        assert_eq!(first, second);
        assert_eq!(
            first,
            ArgSignature::Computed(vec![Argument::optional("path", "\".\"")])
        );
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.scans(), 1);
    }

    #[test]
    fn test_miss_is_cached_as_unavailable() {
        let file = source_file("def other\nend\n");
        let library = file_library(file.path());
        let command = Command::new("status", "git", CommandEntry::Unbound);

        let inspector = CountingInspector::default();
        let calls = inspector.calls.clone();
        let introspector = Introspector::new(inspector);
        let namespace = Namespace::new();
        let mut cache = FileCache::new();

        for _ in 0..3 {
            assert_eq!(
                introspector.resolve(&command, Some(&library), &namespace, &mut cache),
                ArgSignature::Unavailable
            );
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_no_source_is_unavailable_without_scraping() {
        let library = Library::new("text", LibraryKind::Module);
        let command = Command::new("upcase", "text", CommandEntry::Unbound);

        let inspector = CountingInspector::default();
        let calls = inspector.calls.clone();
        let introspector = Introspector::new(inspector);
        let mut cache = FileCache::new();

        let signature = introspector.resolve(&command, Some(&library), &Namespace::new(), &mut cache);
        assert_eq!(signature, ArgSignature::Unavailable);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_bound_command_reads_the_method_source() {
        let tools = source_file("def helper\nend\n\ndef lint(target, strict = false)\n lint <target>\nend\n");
        let mut module = Module::new("Tools");
        module.define_script(
            "lint",
            ScriptBody::default(),
            SourceLocation {
                file: tools.path().to_path_buf(),
                line: 4,
            },
        );
        let mut namespace = Namespace::new();
        namespace.register_module(module);

        // The owning library has no file of its own.
        let library = Library::new("checks", LibraryKind::Module);
        let mut command = Command::new("check", "checks", CommandEntry::Unbound);
        command.binding = MethodBinding::parse("Tools.lint");

        let introspector = Introspector::default();
        let mut cache = FileCache::new();
        let signature = introspector.resolve(&command, Some(&library), &namespace, &mut cache);

        assert_eq!(
            signature,
            ArgSignature::Computed(vec![
                Argument::required("target"),
                Argument::optional("strict", "false"),
            ])
        );
    }

    #[test]
    fn test_unresolvable_binding_is_unavailable() {
        let mut command = Command::new("check", "checks", CommandEntry::Unbound);
        command.binding = MethodBinding::parse("Missing.lint");
        let introspector = Introspector::default();
        let signature =
            introspector.resolve(&command, None, &Namespace::new(), &mut FileCache::new());
        assert_eq!(signature, ArgSignature::Unavailable);
    }
}
