//! `hpt vis-profile` command - Save and apply visibility profiles

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::helpers::{load_config, open_host, progress_reporter, save_host};
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::pipeline::profile::ProfileSettings;
use crate::pipeline::{ProfileStore, VisibilityProfile};

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Save a profile (replaces one with the same name)
    Save(SaveArgs),

    /// Apply a saved profile to the document
    Apply {
        /// Profile name
        name: String,
    },

    /// List saved profiles
    List,

    /// Print one profile's settings
    Show {
        /// Profile name
        name: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct SaveArgs {
    /// Profile name
    pub name: String,

    /// Keyword targets to show (front, rear, wheels, ...)
    #[arg(long, value_delimiter = ',')]
    pub show: Vec<String>,

    /// Keyword targets to hide
    #[arg(long, value_delimiter = ',')]
    pub hide: Vec<String>,

    /// Show markers whose name contains this text
    #[arg(long)]
    pub show_matching: Vec<String>,

    /// Hide markers whose name contains this text
    #[arg(long)]
    pub hide_matching: Vec<String>,
}

impl SaveArgs {
    fn settings(&self) -> ProfileSettings {
        let mut settings = ProfileSettings::default();
        for (keys, visible) in [(&self.show, true), (&self.hide, false)] {
            for key in keys {
                settings.suspension.insert(key.trim().to_lowercase(), visible);
            }
        }
        for (texts, visible) in [(&self.show_matching, true), (&self.hide_matching, false)] {
            for text in texts {
                settings.categories.insert(text.clone(), visible);
            }
        }
        settings
    }
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "SETTINGS")]
    settings: usize,
    #[tabled(rename = "CREATED")]
    created: String,
}

pub fn run(cmd: ProfileCommands, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let store = ProfileStore::new(config.profiles_dir());

    match cmd {
        ProfileCommands::Save(args) => {
            let settings = args.settings();
            if settings.suspension.is_empty() && settings.categories.is_empty() {
                return Err(miette::miette!(
                    help = "pass --show, --hide, --show-matching or --hide-matching",
                    "Profile '{}' would be empty",
                    args.name
                ));
            }
            let profile = VisibilityProfile::new(args.name.trim(), settings);
            let path = store.save(&profile).into_diagnostic()?;
            println!(
                "{} Saved profile {} to {}",
                style("✓").green(),
                style(&profile.name).cyan(),
                style(path.display()).dim()
            );
        }
        ProfileCommands::Apply { name } => {
            let profile = store.load(&name).into_diagnostic()?;
            let (mut host, mut session) = open_host(global, &config)?;
            let mut progress = progress_reporter(global);
            let outcome = profile
                .apply(&mut host, &mut session, &mut progress)
                .into_diagnostic()?;
            save_host(&mut host, &session)?;

            if !print_structured(&outcome, global.format)? {
                println!(
                    "{} Applied {}: {}",
                    style("✓").green(),
                    style(&profile.name).cyan(),
                    outcome.summary()
                );
                if outcome.failed > 0 {
                    println!("{} {} failed, see log output", style("✗").red(), outcome.failed);
                }
            }
        }
        ProfileCommands::List => {
            let profiles = store.list();
            if print_structured(&profiles, global.format)? {
                return Ok(());
            }
            if profiles.is_empty() {
                println!("No profiles in {}", style(store.dir().display()).dim());
                return Ok(());
            }
            let rows: Vec<ProfileRow> = profiles
                .into_iter()
                .map(|p| ProfileRow {
                    name: p.name,
                    settings: p.settings,
                    created: p
                        .created
                        .map(|c| c.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()).to_string());
        }
        ProfileCommands::Show { name } => {
            let profile = store.load(&name).into_diagnostic()?;
            if print_structured(&profile, global.format)? {
                return Ok(());
            }
            println!("{}", style(&profile.name).bold());
            for (key, visible) in &profile.settings.suspension {
                println!("  {:<14} {}", key, show_hide(*visible));
            }
            for (text, visible) in &profile.settings.categories {
                println!("  *{}* {}", text, show_hide(*visible));
            }
        }
    }
    Ok(())
}

fn show_hide(visible: bool) -> console::StyledObject<&'static str> {
    if visible {
        style("show").green()
    } else {
        style("hide").red()
    }
}
