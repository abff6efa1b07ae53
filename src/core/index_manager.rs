use crate::constants::COMMAND_FILE_EXT;
use crate::core::cache;
use crate::core::loader::local_commands_dir;
use crate::core::namespace::Namespace;
use crate::models::{CommandIndex, TroupeConfig};

use std::collections::BTreeSet;
use std::{fs, path::Path};
use thiserror::Error;
use walkdir::WalkDir;

/// Represents errors that can occur while reading or writing the command index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A filesystem I/O error occurred.
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path error: {0}")]
    Path(#[from] crate::core::paths::PathError),

    /// The index file is not valid LZ4 data.
    #[error("Failed to decompress the command index: {0}. It might be corrupt.")]
    Decompress(String),

    /// An error occurred while deserializing data from `bincode` binary format.
    #[error("Failed to decode from binary format: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),
    /// An error occurred while serializing data to `bincode` binary format.
    #[error("Failed to encode to binary format: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),
}

type IndexResult<T> = Result<T, IndexError>;

/// Loads the command index from `path`. A missing file is an empty index.
pub fn load_index(path: &Path) -> IndexResult<CommandIndex> {
    if !path.exists() {
        log::debug!("No command index at '{}'.", path.display());
        return Ok(CommandIndex::default());
    }

    let compressed_bytes = fs::read(path)?;
    if compressed_bytes.is_empty() {
        return Ok(CommandIndex::default());
    }
    let bytes = lz4_flex::decompress_size_prepended(&compressed_bytes)
        .map_err(|e| IndexError::Decompress(e.to_string()))?;
    let (index, _): (CommandIndex, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;

    log::trace!(
        "Loaded command index with {} libraries.",
        index.libraries.len()
    );
    Ok(index)
}

/// Saves the command index to `path`, creating its directory if needed.
pub fn save_index(path: &Path, index: &CommandIndex) -> IndexResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = bincode::serde::encode_to_vec(index, bincode::config::standard())?;
    let compressed_bytes = lz4_flex::compress_prepend_size(&bytes);
    fs::write(path, compressed_bytes)?;
    Ok(())
}

/// Content hash of a library file, as stored in the index.
pub fn file_hash(path: &Path) -> anyhow::Result<String> {
    Ok(cache::calculate_validation_data(path)?.content_hash)
}

/// Every library name that can be loaded: configured libraries and defaults,
/// command files in the global and local directories, native modules and packages.
pub fn discover_libraries(
    config: &TroupeConfig,
    namespace: &Namespace,
    commands_dir: Option<&Path>,
    local_root: Option<&Path>,
) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = config.libraries.keys().cloned().collect();
    names.extend(config.defaults.iter().cloned());

    if let Some(dir) = commands_dir {
        names.extend(command_files_in(dir));
    }
    if let Some(root) = local_root {
        names.extend(command_files_in(&local_commands_dir(root)));
    }

    names.extend(
        namespace
            .native_module_names()
            .map(decamelize),
    );
    names.extend(namespace.package_names().map(str::to_string));

    log::debug!("Discovered {} libraries.", names.len());
    names
}

/// Library names of the command files directly inside `dir`.
fn command_files_in(dir: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry.path().extension().and_then(|e| e.to_str()) == Some(COMMAND_FILE_EXT)
        })
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .collect()
}

/// `GitTools` -> `git_tools`.
pub fn decamelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::namespace::{Module, PackageSource};
    use crate::models::{IndexedLibrary, LibraryKind};
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("index.bin");
        let mut index = CommandIndex::default();
        index.libraries.insert(
            "git".to_string(),
            IndexedLibrary {
                kind: LibraryKind::File,
                commands: vec!["status".to_string()],
                file: Some("/cmds/git.troupe".to_string()),
                file_hash: Some("abc".to_string()),
            },
        );

        save_index(&path, &index).unwrap();
        assert_eq!(load_index(&path).unwrap(), index);
    }

    #[test]
    fn test_missing_index_is_empty() {
        let dir = tempdir().unwrap();
        let index = load_index(&dir.path().join("index.bin")).unwrap();
        assert!(index.libraries.is_empty());
    }

    #[test]
    fn test_corrupt_index_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.bin");
        fs::write(&path, b"\x10\x00\x00\x00garbage").unwrap();
        assert!(load_index(&path).is_err());
    }

    #[test]
    fn test_discover_libraries() {
        let commands = tempdir().unwrap();
        let local = tempdir().unwrap();
        fs::write(commands.path().join("git.troupe"), "").unwrap();
        fs::write(commands.path().join("notes.txt"), "").unwrap();
        fs::create_dir_all(local_commands_dir(local.path())).unwrap();
        fs::write(local_commands_dir(local.path()).join("proj.troupe"), "").unwrap();

        let mut namespace = Namespace::new();
        namespace.register_module(Module::new("GitTools"));
        namespace.register_package("json", PackageSource::Bare);

        let names = discover_libraries(
            &TroupeConfig::default(),
            &namespace,
            Some(commands.path()),
            Some(local.path()),
        );
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["git", "git_tools", "json", "proj", "text"]);
    }

    #[test]
    fn test_decamelize() {
        assert_eq!(decamelize("GitTools"), "git_tools");
        assert_eq!(decamelize("Text"), "text");
    }
}
