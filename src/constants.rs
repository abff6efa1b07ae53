// src/constants.rs

/// The token that splits one invocation into piped stages. Only recognized as a whole argument.
pub const PIPE: &str = "+";

/// Stage arguments that ask for a command's usage instead of running it.
pub const HELP_FLAGS: &[&str] = &["-h", "--help"];

/// The name of the configuration directory (in ~/.config/).
pub const CONFIG_DIR_NAME: &str = "troupe";

/// Environment variable that overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "TROUPE_CONFIG_DIR";

/// The name of the main configuration file (inside the config directory).
pub const CONFIG_FILENAME: &str = "troupe.toml";

/// The name of the directory holding command files (inside the config directory).
pub const COMMANDS_DIR: &str = "commands";

/// The default user-local root, relative to the working directory.
pub const LOCAL_ROOT_DIR: &str = ".troupe";

/// Extension of command files.
pub const COMMAND_FILE_EXT: &str = "troupe";

/// Delimiter line surrounding the TOML front matter of a command file.
pub const FRONT_MATTER_DELIMITER: &str = "+++";

/// The name of the persisted command index (inside the config directory).
pub const COMMAND_INDEX_FILENAME: &str = "index.bin";

/// Namespace prefix under which library modules live.
pub const COMMANDS_NAMESPACE: &str = "Commands";

/// Separator between a module and a method in a command binding (`Tools.lint`).
pub const METHOD_SEPARATOR: char = '.';
