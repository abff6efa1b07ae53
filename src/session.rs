// src/session.rs

use crate::core::{
    builtins, config_loader,
    index_manager::{self, IndexError},
    manager::{BatchReport, Manager},
    namespace::Namespace,
    paths,
};
use crate::models::CommandIndex;
use crate::system::render::RenderHint;
use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Everything a single `troupe` invocation works with: the live registry, the
/// persisted index and how results should be shown.
#[derive(Debug)]
pub struct Session {
    pub manager: Manager,
    index: CommandIndex,
    index_path: PathBuf,
    cwd: PathBuf,
    pub hint: RenderHint,
}

impl Session {
    /// Builds a session from the user's configuration directory.
    pub fn open(hint: RenderHint) -> Result<Self> {
        let config_dir = paths::get_config_dir()?;
        let config = config_loader::load_config(&config_dir)?;
        let commands_dir = paths::resolve_commands_dir(&config, &config_dir)?;
        let cwd = std::env::current_dir()?;
        let local_root = paths::resolve_local_root(&config, &cwd)?;

        let mut namespace = Namespace::new();
        builtins::register(&mut namespace);

        let manager = Manager::new(namespace, config)
            .with_commands_dir(commands_dir)
            .with_local_root(local_root);

        let index_path = paths::get_index_path()?;
        let index = match index_manager::load_index(&index_path) {
            Ok(index) => index,
            Err(e @ (IndexError::Decompress(_) | IndexError::BincodeDecode(_))) => {
                log::warn!("Ignoring unreadable command index: {}", e);
                CommandIndex::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::from_parts(manager, index, index_path, cwd, hint))
    }

    pub fn from_parts(
        manager: Manager,
        index: CommandIndex,
        index_path: PathBuf,
        cwd: PathBuf,
        hint: RenderHint,
    ) -> Self {
        Self {
            manager,
            index,
            index_path,
            cwd,
            hint,
        }
    }

    pub fn index(&self) -> &CommandIndex {
        &self.index
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Loads the default libraries. Failures are reported, not returned.
    pub fn load_defaults(&mut self) {
        warn_failures(self.manager.load_defaults());
    }

    /// Makes sure `name` resolves to a command, loading the library the index
    /// says provides it. Returns whether the command is now available.
    pub fn ensure_command(&mut self, name: &str) -> Result<bool> {
        if self.manager.command(name).is_some() {
            return Ok(true);
        }

        let Some(library) = self.index.library_for(name).map(str::to_string) else {
            log::debug!("Command '{}' is not in the index.", name);
            return Ok(false);
        };

        log::debug!("Loading library '{}' for command '{}'.", library, name);
        self.manager.load(&library)?;
        Ok(self.manager.command(name).is_some())
    }

    /// Rebuilds the index from every discoverable library and saves it.
    pub fn rebuild_index(&mut self) -> Result<BatchReport> {
        let (index, report) = self.manager.index_all(&self.index);
        if index != self.index {
            index_manager::save_index(&self.index_path, &index)?;
            log::debug!("Saved command index to '{}'.", self.index_path.display());
        } else {
            log::debug!("Command index unchanged, not saving.");
        }
        self.index = index;
        Ok(report)
    }
}

/// Prints one warning per failed library in `report`, with its full cause chain.
pub fn warn_failures(report: BatchReport) {
    for (library, error) in report.failed {
        eprintln!(
            "{} library '{}' failed to load: {:#}",
            "Warning:".yellow().bold(),
            library.cyan(),
            anyhow::Error::from(error)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndexedLibrary, LibraryKind, TroupeConfig};
    use tempfile::tempdir;

    fn session(dir: &Path, index: CommandIndex) -> Session {
        let mut namespace = Namespace::new();
        builtins::register(&mut namespace);
        let config = TroupeConfig {
            defaults: Vec::new(),
            ..Default::default()
        };
        let manager = Manager::new(namespace, config).with_commands_dir(dir.join("commands"));
        Session::from_parts(
            manager,
            index,
            dir.join("index.bin"),
            dir.to_path_buf(),
            RenderHint::Plain,
        )
    }

    #[test]
    fn test_ensure_command_loads_the_indexed_library() {
        let dir = tempdir().unwrap();
        let mut index = CommandIndex::default();
        index.libraries.insert(
            "text".to_string(),
            IndexedLibrary {
                kind: LibraryKind::Module,
                commands: vec!["upcase".to_string()],
                file: None,
                file_hash: None,
            },
        );
        let mut session = session(dir.path(), index);

        assert!(session.manager.command("upcase").is_none());
        assert!(session.ensure_command("upcase").unwrap());
        assert!(session.manager.library("text").is_some());
    }

    #[test]
    fn test_failures_render_their_cause_chain() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("commands")).unwrap();
        std::fs::write(
            dir.path().join("commands/git.troupe"),
            "+++\ndependencies = [\"missing\"]\n+++\ndef status\nend\n",
        )
        .unwrap();
        let mut session = session(dir.path(), CommandIndex::default());

        let mut report = session.manager.load_many(&["git"]);
        let (_, error) = report.failed.pop().unwrap();
        let rendered = format!("{:#}", anyhow::Error::from(error));

        assert!(rendered.starts_with("Dependency 'missing' of library 'git' failed to load."));
        assert!(rendered.contains("Package 'missing' required by library 'missing'"));
    }

    #[test]
    fn test_unknown_command_is_not_an_error() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path(), CommandIndex::default());
        assert!(!session.ensure_command("nope").unwrap());
    }

    #[test]
    fn test_rebuild_index_saves_discovered_libraries() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path(), CommandIndex::default());

        let report = session.rebuild_index().unwrap();

        assert!(report.is_success());
        assert!(session.index().libraries.contains_key("text"));
        let saved = index_manager::load_index(&dir.path().join("index.bin")).unwrap();
        assert_eq!(&saved, session.index());
    }
}
