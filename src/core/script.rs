//! # Command Files
//!
//! Evaluates a `*.troupe` command file into a fresh [`Module`]. While the file is
//! read, a [`ProvenanceRecorder`] notes the file and line of every definition so
//! argument introspection can later go back to the source text.
//!
//! ```text
//! +++
//! description = "git helpers"
//! platforms = ["linux", "macos"]
//! [options.log]
//! count = "numeric"
//! +++
//! # Short status
//! def status(path = ".")
//!   git status --short <path>
//! end
//! ```
//!
//! The optional TOML front matter becomes the module's config hook. A `platforms`
//! list becomes its capability gate.

use crate::constants::FRONT_MATTER_DELIMITER;
use crate::core::inspector::{parse_definition_header, parse_parameter_list};
use crate::core::namespace::Module;
use crate::models::{LibraryConfig, ScriptBody, SourceLocation};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Represents errors that can occur while evaluating a command file.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The front matter is not valid TOML.
    #[error("Invalid front matter in '{path}': {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// The front matter was opened but never closed.
    #[error("Front matter in '{path}' is not terminated by '+++'.")]
    UnterminatedFrontMatter { path: PathBuf },
    /// A `def` without its `end`.
    #[error("Definition '{name}' at line {line} is missing its 'end'.")]
    UnterminatedDefinition { name: String, line: usize },
    /// A `def` inside another `def`.
    #[error("Nested definition at line {line}.")]
    NestedDefinition { line: usize },
    /// The same command defined twice in one file.
    #[error("Command '{name}' is defined twice (second definition at line {line}).")]
    DuplicateDefinition { name: String, line: usize },
    /// Anything outside a definition that is not a comment or blank.
    #[error("Unexpected content at line {line}: '{content}'")]
    UnexpectedLine { line: usize, content: String },
}

/// Front matter of a command file.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    #[serde(flatten)]
    pub config: LibraryConfig,
    /// Operating systems the library loads on. Absent means everywhere.
    pub platforms: Option<Vec<String>>,
}

/// Records where each command was defined while a file is evaluated.
#[derive(Debug, Default)]
pub struct ProvenanceRecorder {
    file: PathBuf,
    locations: BTreeMap<String, SourceLocation>,
}

impl ProvenanceRecorder {
    pub fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            locations: BTreeMap::new(),
        }
    }

    /// Returns `false` if `name` was already recorded.
    pub fn record(&mut self, name: &str, line: usize) -> bool {
        if self.locations.contains_key(name) {
            return false;
        }
        self.locations.insert(
            name.to_string(),
            SourceLocation {
                file: self.file.clone(),
                line,
            },
        );
        true
    }

    pub fn location(&self, name: &str) -> Option<&SourceLocation> {
        self.locations.get(name)
    }
}

struct PendingDefinition {
    name: String,
    line: usize,
    body: ScriptBody,
}

/// Evaluates the contents of a command file into a new module named `module_name`.
pub fn evaluate(path: &Path, source: &str, module_name: &str) -> Result<Module, ScriptError> {
    log::debug!("Evaluating command file '{}'.", path.display());

    let (front_matter, body_start) = split_front_matter(path, source)?;
    let mut module = Module::new(module_name).with_source_file(path.to_path_buf());
    let mut recorder = ProvenanceRecorder::new(path);

    let mut pending: Option<PendingDefinition> = None;
    let mut comment_block: Vec<String> = Vec::new();

    for (offset, raw_line) in source.lines().enumerate().skip(body_start) {
        let line_no = offset + 1;
        let trimmed = raw_line.trim();

        if let Some((name, params)) = parse_definition_header(raw_line) {
            if pending.is_some() {
                return Err(ScriptError::NestedDefinition { line: line_no });
            }
            if !recorder.record(name, line_no) {
                return Err(ScriptError::DuplicateDefinition {
                    name: name.to_string(),
                    line: line_no,
                });
            }
            let description = (!comment_block.is_empty()).then(|| comment_block.join(" "));
            comment_block.clear();
            pending = Some(PendingDefinition {
                name: name.to_string(),
                line: line_no,
                body: ScriptBody {
                    params: parse_parameter_list(params.unwrap_or("")),
                    lines: Vec::new(),
                    description,
                },
            });
            continue;
        }

        if trimmed == "end"
            && let Some(def) = pending.take()
        {
            let location = recorder.location(&def.name).cloned().unwrap_or(SourceLocation {
                file: path.to_path_buf(),
                line: def.line,
            });
            log::trace!("Defined '{}' at {}:{}", def.name, path.display(), def.line);
            module.define_script(&def.name, def.body, location);
            continue;
        }

        match pending.as_mut() {
            Some(def) => {
                if !trimmed.is_empty() {
                    def.body.lines.push(trimmed.to_string());
                }
            }
            None if trimmed.is_empty() => comment_block.clear(),
            None => {
                if let Some(comment) = trimmed.strip_prefix('#') {
                    comment_block.push(comment.trim().to_string());
                } else {
                    return Err(ScriptError::UnexpectedLine {
                        line: line_no,
                        content: trimmed.to_string(),
                    });
                }
            }
        }
    }

    if let Some(def) = pending {
        return Err(ScriptError::UnterminatedDefinition {
            name: def.name,
            line: def.line,
        });
    }

    if let Some(front_matter) = front_matter {
        module = attach_front_matter(module, front_matter);
    }

    Ok(module)
}

/// Returns the parsed front matter and the index of the first line after it.
fn split_front_matter(
    path: &Path,
    source: &str,
) -> Result<(Option<FrontMatter>, usize), ScriptError> {
    let mut lines = source.lines().enumerate();
    let opening = lines.find(|(_, line)| !line.trim().is_empty());

    let Some((open_idx, first)) = opening else {
        return Ok((None, 0));
    };
    if first.trim() != FRONT_MATTER_DELIMITER {
        return Ok((None, 0));
    }

    let mut toml_text = String::new();
    for (idx, line) in lines {
        if line.trim() == FRONT_MATTER_DELIMITER {
            let front_matter: FrontMatter =
                toml::from_str(&toml_text).map_err(|e| ScriptError::FrontMatter {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            log::trace!(
                "Front matter of '{}' spans lines {}..{}",
                path.display(),
                open_idx + 1,
                idx + 1
            );
            return Ok((Some(front_matter), idx + 1));
        }
        toml_text.push_str(line);
        toml_text.push('\n');
    }

    Err(ScriptError::UnterminatedFrontMatter {
        path: path.to_path_buf(),
    })
}

fn attach_front_matter(module: Module, front_matter: FrontMatter) -> Module {
    let FrontMatter { config, platforms } = front_matter;
    let module = module.with_config(move || config.clone());

    match platforms {
        Some(platforms) => module.with_gate(move |_scratch| {
            platforms.iter().any(|p| p == std::env::consts::OS)
        }),
        None => module,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::namespace::Namespace;
    use crate::models::{Argument, CommandEntry, OptionType};

    const GIT_FILE: &str = r#"+++
description = "git helpers"
dependencies = ["text"]
[options.log]
count = "numeric"
+++

# Short status
# of the repo
def status(path = ".")
  git status --short <path>
end

def log(count = 10, *rest)
  git log -n <count> <*>

  -git fetch
end
"#;

    #[test]
    fn test_evaluate_records_members_and_provenance() {
        let path = Path::new("/cmds/git.troupe");
        let module = evaluate(path, GIT_FILE, "Git").unwrap();

        assert_eq!(module.name(), "Git");
        assert_eq!(module.members().len(), 2);
        assert_eq!(module.source_file().map(|p| p.as_path()), Some(path));

        let status = module.source_location("status").unwrap();
        assert_eq!(status.line, 10);
        assert_eq!(status.file, path);
        assert_eq!(module.source_location("log").unwrap().line, 14);

        match &module.members()["status"] {
            CommandEntry::Script(body) => {
                assert_eq!(body.params, vec![Argument::optional("path", "\".\"")]);
                assert_eq!(body.lines, vec!["git status --short <path>".to_string()]);
                assert_eq!(body.description.as_deref(), Some("Short status of the repo"));
            }
            other => panic!("unexpected entry {:?}", other),
        }
        match &module.members()["log"] {
            CommandEntry::Script(body) => assert_eq!(body.lines.len(), 2),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_front_matter_becomes_config_hook() {
        let module = evaluate(Path::new("git.troupe"), GIT_FILE, "Git").unwrap();
        let config = (module.config_hook().unwrap())();
        assert_eq!(config.description.as_deref(), Some("git helpers"));
        assert_eq!(config.dependencies, vec!["text".to_string()]);
        assert_eq!(config.options["log"]["count"], OptionType::Numeric);
        assert!(module.capability_gate().is_none());
    }

    #[test]
    fn test_platforms_become_capability_gate() {
        let source = "+++\nplatforms = [\"plan9\"]\n+++\ndef a\nend\n";
        let module = evaluate(Path::new("a.troupe"), source, "A").unwrap();
        let gate = module.capability_gate().unwrap();
        assert!(!gate(&mut Namespace::default()));

        let here = format!("+++\nplatforms = [\"{}\"]\n+++\n", std::env::consts::OS);
        let module = evaluate(Path::new("b.troupe"), &here, "B").unwrap();
        assert!((module.capability_gate().unwrap())(&mut Namespace::default()));
    }

    #[test]
    fn test_file_without_front_matter() {
        let module = evaluate(Path::new("x.troupe"), "def hello(name)\n echo <name>\nend\n", "X")
            .unwrap();
        assert!(module.config_hook().is_none());
        assert_eq!(module.source_location("hello").unwrap().line, 1);
    }

    #[test]
    fn test_evaluation_errors() {
        let p = Path::new("bad.troupe");
        assert!(matches!(
            evaluate(p, "def a\n echo\n", "Bad"),
            Err(ScriptError::UnterminatedDefinition { line: 1, .. })
        ));
        assert!(matches!(
            evaluate(p, "def a\ndef b\nend\n", "Bad"),
            Err(ScriptError::NestedDefinition { line: 2 })
        ));
        assert!(matches!(
            evaluate(p, "def a\nend\ndef a\nend\n", "Bad"),
            Err(ScriptError::DuplicateDefinition { line: 3, .. })
        ));
        assert!(matches!(
            evaluate(p, "echo stray\n", "Bad"),
            Err(ScriptError::UnexpectedLine { line: 1, .. })
        ));
        assert!(matches!(
            evaluate(p, "+++\ndescription = \"x\"\n", "Bad"),
            Err(ScriptError::UnterminatedFrontMatter { .. })
        ));
        assert!(matches!(
            evaluate(p, "+++\nnot toml at all\n+++\n", "Bad"),
            Err(ScriptError::FrontMatter { .. })
        ));
    }
}
