//! `hpt doc` command - Manage assembly documents

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cad::{CadHost, Document, DocumentKind, MemoryHost};
use crate::cli::helpers::{format_position, format_rgb, load_config, open_host, truncate_str};
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;

#[derive(Subcommand, Debug)]
pub enum DocCommands {
    /// Create a new empty document
    New(NewArgs),

    /// Show the document's configurations, markers, frames and folders
    Show,

    /// Make a configuration active
    Activate(ActivateArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Where to write the document
    pub path: PathBuf,

    /// Document title (defaults to the file stem)
    #[arg(long)]
    pub title: Option<String>,

    /// Configurations to create; the first one is active
    #[arg(long = "configuration", short = 'c')]
    pub configurations: Vec<String>,

    /// Document type
    #[arg(long, value_enum, default_value_t = KindArg::Assembly)]
    pub kind: KindArg,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct ActivateArgs {
    /// Configuration name
    pub configuration: String,

    /// Add the configuration when it does not exist
    #[arg(long)]
    pub create: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Assembly,
    Part,
    Drawing,
}

impl From<KindArg> for DocumentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Assembly => DocumentKind::Assembly,
            KindArg::Part => DocumentKind::Part,
            KindArg::Drawing => DocumentKind::Drawing,
        }
    }
}

/// Run a doc subcommand
pub fn run(cmd: DocCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        DocCommands::New(args) => run_new(args),
        DocCommands::Show => run_show(global),
        DocCommands::Activate(args) => run_activate(args, global),
    }
}

fn run_new(args: NewArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        return Err(miette::miette!(
            help = "use --force to overwrite",
            "{} already exists",
            args.path.display()
        ));
    }
    if let Some(parent) = args.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }

    let title = args.title.unwrap_or_else(|| {
        args.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Assembly")
            .to_string()
    });
    let document = Document::new(title, args.kind.into(), args.configurations);
    let configurations = document.configurations.join(", ");

    let mut host = MemoryHost::new(document).with_path(&args.path);
    host.save().into_diagnostic()?;

    println!(
        "{} Created {} ({})",
        style("✓").green(),
        style(args.path.display()).cyan(),
        configurations
    );
    Ok(())
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "COMPONENT")]
    name: String,
    #[tabled(rename = "POSITION")]
    position: String,
    #[tabled(rename = "COLOR")]
    color: String,
    #[tabled(rename = "FLAGS")]
    flags: String,
}

#[derive(Tabled)]
struct FrameRow {
    #[tabled(rename = "FRAME")]
    name: String,
    #[tabled(rename = "POSITION")]
    position: String,
    #[tabled(rename = "CONFIGURATION")]
    scope: String,
}

#[derive(Serialize)]
struct DocView<'a> {
    title: &'a str,
    kind: DocumentKind,
    active_configuration: &'a str,
    configurations: &'a [String],
    components: Vec<ComponentView>,
    frames: usize,
    folders: Vec<FolderView<'a>>,
    constraints: usize,
    rebuilds: u64,
}

#[derive(Serialize)]
struct ComponentView {
    name: String,
    position: crate::core::hardpoint::Position,
    visible: bool,
    is_virtual: bool,
}

#[derive(Serialize)]
struct FolderView<'a> {
    name: &'a str,
    members: usize,
}

fn run_show(global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let (host, _session) = open_host(global, &config)?;
    let doc = host.document().into_diagnostic()?;

    let view = DocView {
        title: &doc.title,
        kind: doc.kind,
        active_configuration: &doc.active_configuration,
        configurations: &doc.configurations,
        components: doc
            .components
            .iter()
            .map(|c| ComponentView {
                name: c.decorated_name(),
                position: c.placement.position,
                visible: c.visible,
                is_virtual: c.is_virtual,
            })
            .collect(),
        frames: doc.frames.len(),
        folders: doc
            .folders
            .iter()
            .map(|f| FolderView {
                name: &f.name,
                members: f.members.len(),
            })
            .collect(),
        constraints: doc.constraints.len(),
        rebuilds: doc.rebuilds,
    };
    if print_structured(&view, global.format)? {
        return Ok(());
    }

    println!("{} ({})", style(&doc.title).bold(), doc.kind);
    for configuration in &doc.configurations {
        if *configuration == doc.active_configuration {
            println!("  {} {}", style("*").green(), style(configuration).green());
        } else {
            println!("    {}", configuration);
        }
    }
    println!();

    if doc.components.is_empty() {
        println!("No components.");
    } else {
        let rows: Vec<ComponentRow> = doc
            .components
            .iter()
            .map(|c| {
                let mut flags = Vec::new();
                if c.is_virtual {
                    flags.push("virtual");
                }
                if c.fixed {
                    flags.push("fixed");
                }
                if !c.visible {
                    flags.push("hidden");
                }
                ComponentRow {
                    name: truncate_str(&c.decorated_name(), 40),
                    position: format_position(&c.placement.position),
                    color: c.color.map(format_rgb).unwrap_or_else(|| "-".to_string()),
                    flags: flags.join(" "),
                }
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    }

    let frames: Vec<FrameRow> = doc
        .frames
        .iter()
        .map(|f| FrameRow {
            name: truncate_str(&f.name, 48),
            position: format_position(&f.position),
            scope: match &f.scope {
                Some(s) if doc.is_active(&f.scope) => s.clone(),
                Some(s) => format!("{} (suppressed)", s),
                None => "all".to_string(),
            },
        })
        .collect();
    if !frames.is_empty() {
        println!("{}", Table::new(frames).with(Style::rounded()).to_string());
    }

    for folder in &doc.folders {
        println!(
            "{} {} ({} members)",
            style("▸").dim(),
            style(&folder.name).cyan(),
            folder.members.len()
        );
    }
    println!(
        "{} constraints, {} rebuilds",
        style(doc.constraints.len()).cyan(),
        style(doc.rebuilds).cyan()
    );
    Ok(())
}

fn run_activate(args: ActivateArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let (mut host, _session) = open_host(global, &config)?;
    {
        let doc = host.document_mut().into_diagnostic()?;
        if args.create && doc.add_configuration(&args.configuration) {
            println!("{} Added configuration {}", style("+").green(), style(&args.configuration).cyan());
        }
        doc.activate(&args.configuration).into_diagnostic()?;
    }
    let info = host.document_info().into_diagnostic()?;
    host.save().into_diagnostic()?;
    println!(
        "{} Active configuration: {}",
        style("✓").green(),
        style(&info.active_configuration).cyan()
    );
    Ok(())
}
