//! `hpt hardpoints` command - Insert markers and bind poses

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::helpers::{
    format_position, format_rgb, load_config, open_host, print_warning_count, progress_reporter, save_host,
};
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::core::color::color_for;
use crate::core::config::Config;
use crate::core::extract::Extraction;
use crate::core::progress::Stage;
use crate::core::suspension::SuspensionSet;
use crate::pipeline::{
    list_poses, InsertionOptions, InsertionOutcome, InsertionPipeline, PipelineError, PoseBinder,
    PoseOutcome,
};

#[derive(Subcommand, Debug)]
pub enum HardpointsCommands {
    /// Insert one marker per hardpoint
    Add(InsertArgs),

    /// Insert markers for the wheel centers only
    Addwheels(InsertArgs),

    /// Insert markers, then bind them to a pose
    Insertpose(InsertPoseArgs),

    /// Bind existing markers to a pose in the active configuration
    Pose(PoseArgs),

    /// List the poses in the document
    Poses,

    /// Delete a pose's frames, constraints and folder
    PoseDelete(PoseDeleteArgs),

    /// Print the hardpoints the input files describe (no document needed)
    List(ListArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Front suspension JSON
    #[arg(long)]
    pub front: Option<PathBuf>,

    /// Rear suspension JSON
    #[arg(long)]
    pub rear: Option<PathBuf>,

    /// Vehicle setup JSON (rear reference distance)
    #[arg(long)]
    pub vehicle: Option<PathBuf>,
}

impl SourceArgs {
    fn load(&self) -> Result<SuspensionSet> {
        SuspensionSet::load(self.front.as_deref(), self.rear.as_deref(), self.vehicle.as_deref())
            .map_err(|e| miette::miette!("{}", e))
    }
}

#[derive(clap::Args, Debug)]
pub struct InsertArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Marker template part
    #[arg(long, short = 't', env = "HPT_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Do not rename/rotate the marker's own frame
    #[arg(long)]
    pub no_orient: bool,
}

#[derive(clap::Args, Debug)]
pub struct InsertPoseArgs {
    #[command(flatten)]
    pub insert: InsertArgs,

    /// Pose name (prefix of the frame names)
    #[arg(long, short = 'p')]
    pub pose: String,
}

#[derive(clap::Args, Debug)]
pub struct PoseArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Pose name (prefix of the frame names)
    #[arg(long, short = 'p')]
    pub pose: String,
}

#[derive(clap::Args, Debug)]
pub struct PoseDeleteArgs {
    /// Pose name
    pub pose: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Wheel centers only
    #[arg(long)]
    pub wheels: bool,
}

/// Run a hardpoints subcommand
pub fn run(cmd: HardpointsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        HardpointsCommands::Add(args) => run_insert(args, false, None, global),
        HardpointsCommands::Addwheels(args) => run_insert(args, true, None, global),
        HardpointsCommands::Insertpose(args) => {
            run_insert(args.insert, false, Some(args.pose), global)
        }
        HardpointsCommands::Pose(args) => run_pose(args, global),
        HardpointsCommands::Poses => run_poses(global),
        HardpointsCommands::PoseDelete(args) => run_pose_delete(args, global),
        HardpointsCommands::List(args) => run_list(args, global),
    }
}

fn extract(set: &SuspensionSet, wheels_only: bool) -> Extraction {
    if wheels_only {
        set.wheel_hardpoints()
    } else {
        set.hardpoints()
    }
}

fn insertion_options(args: &InsertArgs, config: &Config) -> Result<InsertionOptions> {
    let template = args
        .template
        .clone()
        .or_else(|| config.template.clone())
        .ok_or(PipelineError::NoTemplate)
        .into_diagnostic()?;
    let mut options = InsertionOptions::from_config(config, template);
    if args.no_orient {
        options.orient_local_frames = false;
    }
    Ok(options)
}

fn run_insert(
    args: InsertArgs,
    wheels_only: bool,
    pose: Option<String>,
    global: &GlobalOpts,
) -> Result<()> {
    let config = load_config(global)?;
    let options = insertion_options(&args, &config)?;
    let binder = pose
        .as_deref()
        .map(|p| PoseBinder::new(p, &config))
        .transpose()
        .into_diagnostic()?;

    let mut progress = progress_reporter(global);
    progress.stage(Stage::LoadingJson);
    let extraction = extract(&args.source.load()?, wheels_only);

    let (mut host, mut session) = open_host(global, &config)?;
    let outcome = InsertionPipeline::new(options)
        .run(&mut host, &mut session, &extraction.hardpoints, &mut progress)
        .into_diagnostic()?;

    let posed = match &binder {
        Some(binder) => Some(
            binder
                .run(&mut host, &mut session, &extraction.hardpoints, &mut progress)
                .into_diagnostic()?,
        ),
        None => None,
    };
    save_host(&mut host, &session)?;

    print_insertion(&outcome, global)?;
    if let Some(posed) = &posed {
        print_pose(posed, global)?;
    }
    print_warning_count(&extraction, global);
    Ok(())
}

fn run_pose(args: PoseArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let binder = PoseBinder::new(&args.pose, &config).into_diagnostic()?;
    let mut progress = progress_reporter(global);
    progress.stage(Stage::LoadingJson);
    let extraction = args.source.load()?.hardpoints();

    let (mut host, mut session) = open_host(global, &config)?;
    let outcome = binder
        .run(&mut host, &mut session, &extraction.hardpoints, &mut progress)
        .into_diagnostic()?;
    save_host(&mut host, &session)?;

    print_pose(&outcome, global)?;
    print_warning_count(&extraction, global);
    Ok(())
}

#[derive(Tabled)]
struct PoseRow {
    #[tabled(rename = "POSE")]
    pose: String,
    #[tabled(rename = "FOLDER")]
    folder: String,
    #[tabled(rename = "FRAMES")]
    frames: usize,
}

fn run_poses(global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let (host, _session) = open_host(global, &config)?;
    let poses = list_poses(&host).into_diagnostic()?;
    if print_structured(&poses, global.format)? {
        return Ok(());
    }

    if poses.is_empty() {
        println!("No poses found.");
        return Ok(());
    }
    let rows: Vec<PoseRow> = poses
        .into_iter()
        .map(|p| PoseRow {
            pose: p.pose,
            folder: p.folder,
            frames: p.frames,
        })
        .collect();
    let count = rows.len();
    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    println!("{} poses", style(count).cyan());
    Ok(())
}

fn run_pose_delete(args: PoseDeleteArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let binder = PoseBinder::new(&args.pose, &config).into_diagnostic()?;
    let (mut host, mut session) = open_host(global, &config)?;
    let deletion = binder.delete(&mut host, &mut session).into_diagnostic()?;
    save_host(&mut host, &session)?;

    if print_structured(&deletion, global.format)? {
        return Ok(());
    }
    let mark = if deletion.folder_deleted {
        style("✓").green()
    } else {
        style("!").yellow()
    };
    println!(
        "{} {} (pose {})",
        mark,
        deletion.summary(),
        style(&deletion.pose).cyan()
    );
    Ok(())
}

fn print_insertion(outcome: &InsertionOutcome, global: &GlobalOpts) -> Result<()> {
    if print_structured(outcome, global.format)? {
        return Ok(());
    }
    for failed in &outcome.failed {
        println!("{} {}: {}", style("✗").red(), failed.identity, style(&failed.error).dim());
    }
    for marker in outcome.incomplete() {
        if let Some(step) = marker.stopped_at {
            println!(
                "{} {}: {} failed, left as {}",
                style("✗").red(),
                marker.renamed_name,
                step,
                if marker.renamed { &marker.renamed_name } else { &marker.original_name }
            );
        }
    }
    let mark = if outcome.created() == outcome.requested {
        style("✓").green()
    } else {
        style("!").yellow()
    };
    println!("{} {}", mark, outcome.summary());
    Ok(())
}

fn print_pose(outcome: &PoseOutcome, global: &GlobalOpts) -> Result<()> {
    if print_structured(outcome, global.format)? {
        return Ok(());
    }
    for binding in outcome.bindings.iter().filter(|b| !b.bound) {
        println!("{} {} not bound", style("✗").red(), binding.hardpoint_name);
    }
    let mark = if outcome.bound() == outcome.bindings.len() {
        style("✓").green()
    } else {
        style("!").yellow()
    };
    println!(
        "{} {} (pose {}, configuration {})",
        mark,
        outcome.summary(),
        style(&outcome.pose).cyan(),
        style(&outcome.configuration).cyan()
    );
    Ok(())
}

#[derive(Tabled)]
struct HardpointRow {
    #[tabled(rename = "HARDPOINT")]
    identity: String,
    #[tabled(rename = "POSITION")]
    position: String,
    #[tabled(rename = "ANGLES")]
    angles: String,
    #[tabled(rename = "COLOR")]
    color: String,
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let extraction = extract(&args.source.load()?, args.wheels);
    if print_structured(&extraction.hardpoints, global.format)? {
        return Ok(());
    }

    if extraction.is_empty() {
        println!("No hardpoints found.");
    } else {
        let rows: Vec<HardpointRow> = extraction
            .hardpoints
            .iter()
            .map(|hp| {
                let o = hp.orientation();
                HardpointRow {
                    identity: hp.identity(),
                    position: format_position(&hp.position()),
                    angles: if o.is_zero() {
                        "-".to_string()
                    } else {
                        format!("({:.2}, {:.2}, {:.2})", o.angle_x, o.angle_y, o.angle_z)
                    },
                    color: format_rgb(color_for(hp.base_name())),
                }
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()).to_string());
        println!("{} hardpoints", style(extraction.hardpoints.len()).cyan());
    }
    print_warning_count(&extraction, global);
    Ok(())
}
