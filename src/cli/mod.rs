use clap::Parser;

use crate::system::render::RenderHint;

pub mod dispatcher;
pub mod handlers;

/// troupe: load command libraries and pipe their commands together.
///
/// `troupe <command> [args] [+ <command> [args]]...` runs a pipe chain, where
/// each stage receives the previous stage's result as its first argument.
/// System actions: `commands`, `libraries`, `usage`, `load`, `reload`,
/// `index` and `run`.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// Show only these fields of map results (comma separated).
    #[arg(short, long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Print the structure of the result instead of rendering it.
    #[arg(long, conflicts_with = "fields")]
    pub inspect: bool,

    /// An action, or a pipe chain of commands.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    pub fn render_hint(&self) -> RenderHint {
        if self.inspect {
            RenderHint::Inspect
        } else if !self.fields.is_empty() {
            let fields = self
                .fields
                .iter()
                .map(|field| field.trim())
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect();
            RenderHint::Fields(fields)
        } else {
            RenderHint::Plain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_after_the_command_belong_to_the_chain() {
        let cli = Cli::try_parse_from(["troupe", "head", "--count", "3", "+", "sort", "-r"]).unwrap();
        assert_eq!(cli.args, vec!["head", "--count", "3", "+", "sort", "-r"]);
        assert_eq!(cli.render_hint(), RenderHint::Plain);
    }

    #[test]
    fn test_global_render_flags() {
        let cli = Cli::try_parse_from(["troupe", "-f", "name,size", "ls"]).unwrap();
        assert_eq!(
            cli.render_hint(),
            RenderHint::Fields(vec!["name".to_string(), "size".to_string()])
        );

        let cli = Cli::try_parse_from(["troupe", "--inspect", "ls"]).unwrap();
        assert_eq!(cli.render_hint(), RenderHint::Inspect);
    }

    #[test]
    fn test_fields_ignore_whitespace_around_names() {
        let cli = Cli::try_parse_from(["troupe", "-f", "f1, f2", "commands"]).unwrap();
        assert_eq!(
            cli.render_hint(),
            RenderHint::Fields(vec!["f1".to_string(), "f2".to_string()])
        );
    }
}
