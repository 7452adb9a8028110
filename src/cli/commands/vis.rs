//! `hpt vis` command - Show or hide markers

use clap::ValueEnum;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{load_config, open_host, progress_reporter, save_host};
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::pipeline::{apply_visibility, Target};

#[derive(clap::Args, Debug)]
pub struct VisArgs {
    /// all, front, rear, wheels, frontwheels, rearwheels, chassis,
    /// nonchassis, substring, name or feature
    pub target: String,

    /// Show or hide
    #[arg(value_enum)]
    pub action: VisAction,

    /// Text for the substring/name/feature targets
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VisAction {
    Show,
    Hide,
}

pub fn run(args: VisArgs, global: &GlobalOpts) -> Result<()> {
    let target = Target::parse(&args.target, args.filter.as_deref()).into_diagnostic()?;
    let visible = args.action == VisAction::Show;

    let config = load_config(global)?;
    let (mut host, mut session) = open_host(global, &config)?;
    let mut progress = progress_reporter(global);
    let outcome =
        apply_visibility(&mut host, &mut session, &target, visible, &mut progress).into_diagnostic()?;
    save_host(&mut host, &session)?;

    if print_structured(&outcome, global.format)? {
        return Ok(());
    }
    let verb = if visible { "shown" } else { "hidden" };
    if outcome.matched == 0 {
        println!("{} Nothing matches {}", style("!").yellow(), style(&target).cyan());
    } else {
        println!(
            "{} {} ({} matched, {} {})",
            style("✓").green(),
            outcome.summary(),
            outcome.matched,
            style(&target).cyan(),
            verb
        );
    }
    if outcome.failed > 0 {
        println!("{} {} failed, see log output", style("✗").red(), outcome.failed);
    }
    Ok(())
}
