//! CLI module - argument parsing and command dispatch

pub mod args;
pub mod commands;
pub mod helpers;
pub mod output;

pub use args::{Cli, Commands, GlobalOpts, OutputFormat};

use miette::Result;

/// Run a parsed command line
pub fn dispatch(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Commands::Doc(cmd) => commands::doc::run(cmd, &global),
        Commands::Hardpoints(cmd) => commands::hardpoints::run(cmd, &global),
        Commands::Vis(args) => commands::vis::run(args, &global),
        Commands::VisProfile(cmd) => commands::profile::run(cmd, &global),
        Commands::Colors => commands::colors::run(&global),
        Commands::Release => commands::release::run(&global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
