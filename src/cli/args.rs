//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::completions::CompletionsArgs;
use crate::cli::commands::doc::DocCommands;
use crate::cli::commands::hardpoints::HardpointsCommands;
use crate::cli::commands::profile::ProfileCommands;
use crate::cli::commands::vis::VisArgs;

#[derive(Parser, Debug)]
#[command(name = "hpt")]
#[command(author, version, about = "Hardpoint Toolkit - suspension hardpoints as named, posed CAD markers")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Assembly document to operate on
    #[arg(long, short = 'd', global = true, env = "HPT_DOCUMENT")]
    pub document: Option<PathBuf>,

    /// Config file (replaces ./hpt.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level for stderr output (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Do not write STATE/TOTAL/PROGRESS lines to stdout
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Auto)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, inspect and switch assembly documents
    #[command(subcommand)]
    Doc(DocCommands),

    /// Insert hardpoint markers and bind them to poses
    #[command(subcommand)]
    Hardpoints(HardpointsCommands),

    /// Show or hide markers
    Vis(VisArgs),

    /// Save and apply visibility profiles
    #[command(subcommand, name = "vis-profile")]
    VisProfile(ProfileCommands),

    /// Print the marker color scheme
    Colors,

    /// Leave component edit and clear the selection
    Release,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Tables for people
    #[default]
    Auto,
    /// Same as auto
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    /// JSON or YAML, where stdout must hold nothing else
    pub fn is_structured(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Auto => write!(f, "auto"),
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["hpt", "release", "--document", "car.json", "--no-progress"]).unwrap();
        assert_eq!(cli.global.document, Some(PathBuf::from("car.json")));
        assert!(cli.global.no_progress);
        assert!(matches!(cli.command, Commands::Release));
    }

    #[test]
    fn test_structured_formats() {
        assert!(OutputFormat::Json.is_structured());
        assert!(OutputFormat::Yaml.is_structured());
        assert!(!OutputFormat::Auto.is_structured());
        assert!(!OutputFormat::Text.is_structured());
    }
}
