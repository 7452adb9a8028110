//! Shared helper functions for CLI commands

use console::style;
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::PathBuf;

use crate::cad::{MemoryHost, Session};
use crate::cli::GlobalOpts;
use crate::core::color::Rgb;
use crate::core::config::Config;
use crate::core::extract::Extraction;
use crate::core::hardpoint::Position;
use crate::core::progress::ProgressReporter;

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// `(x, y, z)` with one decimal, for tables
pub fn format_position(p: &Position) -> String {
    format!("({:.1}, {:.1}, {:.1})", p.x, p.y, p.z)
}

pub fn format_rgb(rgb: Rgb) -> String {
    format!("{:>3} {:>3} {:>3}", rgb[0], rgb[1], rgb[2])
}

/// Config with `--config` applied
pub fn load_config(global: &GlobalOpts) -> Result<Config> {
    Config::load(global.config.as_deref()).map_err(|e| miette::miette!("{}", e))
}

/// Document path from `--document` / `HPT_DOCUMENT`, else the config
pub fn document_path(global: &GlobalOpts, config: &Config) -> Result<PathBuf> {
    global
        .document
        .clone()
        .or_else(|| config.document.clone())
        .ok_or_else(|| {
            miette::miette!(
                help = "pass --document <path>, set HPT_DOCUMENT, or create one with `hpt doc new <path>`",
                "No active document"
            )
        })
}

/// Open the document and the session the last run left behind
pub fn open_host(global: &GlobalOpts, config: &Config) -> Result<(MemoryHost, Session)> {
    let path = document_path(global, config)?;
    let host = MemoryHost::open(&path).map_err(|e| miette::miette!("{}", e))?;
    let session = host.restore_session();
    Ok((host, session))
}

/// Persist the document together with the session state
pub fn save_host(host: &mut MemoryHost, session: &Session) -> Result<()> {
    host.store_session(session).into_diagnostic()?;
    host.save().into_diagnostic()
}

/// Progress to stdout unless `--no-progress` or a structured format
pub fn progress_reporter(global: &GlobalOpts) -> ProgressReporter {
    if global.no_progress || global.format.is_structured() {
        ProgressReporter::silent()
    } else {
        ProgressReporter::new(io::stdout())
    }
}

/// One line about data warnings, when there were any
pub fn print_warning_count(extraction: &Extraction, global: &GlobalOpts) {
    if !extraction.warnings.is_empty() && !global.format.is_structured() {
        println!(
            "{} {} data warning(s), see log output",
            style("!").yellow(),
            extraction.warnings.len()
        );
    }
}
