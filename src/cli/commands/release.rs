//! `hpt release` command - Recover from an aborted run

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{load_config, open_host, save_host};
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::pipeline::release;

pub fn run(global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let (mut host, mut session) = open_host(global, &config)?;
    let outcome = release(&mut host, &mut session).into_diagnostic()?;
    save_host(&mut host, &session)?;

    if !print_structured(&outcome, global.format)? {
        println!("{} {}", style("✓").green(), outcome.summary());
    }
    Ok(())
}
