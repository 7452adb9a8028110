//! Marker insertion
//!
//! One marker component per hardpoint, each taken through the same ordered
//! steps before the next hardpoint starts:
//!
//! `Inserted -> MadeVirtual -> Renamed -> Floated -> Oriented -> Colored`
//!
//! then all renamed markers are grouped into one folder and the document is
//! rebuilt once. A failed step other than `MadeVirtual` stops that marker; the
//! units it would have used are still emitted, so a driver's progress bar
//! always reaches `TOTAL`.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{check_assembly, check_template, group_into_folder, CancelToken, PipelineError};
use crate::cad::{CadHost, ComponentHandle, EntityRef, FolderRef, FrameRef, HostError, Session};
use crate::core::color::color_for;
use crate::core::config::Config;
use crate::core::hardpoint::HardpointSpec;
use crate::core::progress::{ProgressReporter, Stage};

/// Per-hardpoint steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionStep {
    Inserted,
    MadeVirtual,
    Renamed,
    Floated,
    Oriented,
    Colored,
}

impl std::fmt::Display for InsertionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertionStep::Inserted => write!(f, "insert"),
            InsertionStep::MadeVirtual => write!(f, "make virtual"),
            InsertionStep::Renamed => write!(f, "rename"),
            InsertionStep::Floated => write!(f, "float"),
            InsertionStep::Oriented => write!(f, "orient"),
            InsertionStep::Colored => write!(f, "color"),
        }
    }
}

impl InsertionStep {
    /// A marker survives a failure of this step
    pub fn is_optional(self) -> bool {
        self == InsertionStep::MadeVirtual
    }
}

#[derive(Debug, Clone)]
pub struct InsertionOptions {
    pub template: PathBuf,
    pub template_extensions: Vec<String>,
    pub folder_name: String,
    pub local_frame_name: String,
    pub orient_local_frames: bool,
    pub make_virtual: bool,
}

impl InsertionOptions {
    pub fn from_config(config: &Config, template: PathBuf) -> Self {
        Self {
            template,
            template_extensions: config.template_extensions.clone(),
            folder_name: config.hardpoints_folder.clone(),
            local_frame_name: config.local_frame_name.clone(),
            orient_local_frames: config.orient_local_frames,
            make_virtual: config.make_virtual,
        }
    }

    /// Steps each hardpoint goes through
    pub fn steps(&self) -> Vec<InsertionStep> {
        let mut steps = vec![
            InsertionStep::Inserted,
            InsertionStep::MadeVirtual,
            InsertionStep::Renamed,
            InsertionStep::Floated,
        ];
        if self.orient_local_frames {
            steps.push(InsertionStep::Oriented);
        }
        steps.push(InsertionStep::Colored);
        steps
    }

    /// `TOTAL` for `count` hardpoints: the steps plus grouping and rebuild
    pub fn total_units(&self, count: usize) -> u64 {
        (count * self.steps().len() + 2) as u64
    }
}

/// A marker the host confirmed, with what happened to it
#[derive(Debug, Clone, Serialize)]
pub struct InsertedComponent {
    pub original_name: String,
    pub renamed_name: String,
    pub handle: ComponentHandle,
    pub spec: HardpointSpec,
    pub made_virtual: bool,
    pub renamed: bool,
    pub floated: bool,
    pub oriented: bool,
    pub colored: bool,
    /// Step that failed and stopped this marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<InsertionStep>,
}

impl InsertedComponent {
    pub fn is_complete(&self) -> bool {
        self.stopped_at.is_none()
    }

    fn record(&mut self, step: InsertionStep) {
        match step {
            InsertionStep::Inserted => {}
            InsertionStep::MadeVirtual => self.made_virtual = true,
            InsertionStep::Renamed => self.renamed = true,
            InsertionStep::Floated => self.floated = true,
            InsertionStep::Oriented => self.oriented = true,
            InsertionStep::Colored => self.colored = true,
        }
    }
}

/// A hardpoint whose marker could not be inserted
#[derive(Debug, Clone, Serialize)]
pub struct FailedInsertion {
    pub identity: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InsertionOutcome {
    pub requested: usize,
    pub inserted: Vec<InsertedComponent>,
    pub failed: Vec<FailedInsertion>,
    #[serde(skip)]
    pub folder: Option<FolderRef>,
    pub rebuilt: bool,
    pub cancelled: bool,
}

impl InsertionOutcome {
    /// Markers that went through every step
    pub fn created(&self) -> usize {
        self.inserted.iter().filter(|c| c.is_complete()).count()
    }

    pub fn incomplete(&self) -> impl Iterator<Item = &InsertedComponent> {
        self.inserted.iter().filter(|c| !c.is_complete())
    }

    pub fn summary(&self) -> String {
        let mut line = format!("created {} of {}", self.created(), self.requested);
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}

/// Inserts one marker per hardpoint
#[derive(Debug, Clone)]
pub struct InsertionPipeline {
    options: InsertionOptions,
    cancel: CancelToken,
}

impl InsertionPipeline {
    pub fn new(options: InsertionOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &InsertionOptions {
        &self.options
    }

    /// Run all hardpoints
    ///
    /// Fails only on setup problems (no host, no assembly, bad template);
    /// everything after that is logged and reflected in the outcome.
    pub fn run<H: CadHost + ?Sized>(
        &self,
        host: &mut H,
        session: &mut Session,
        hardpoints: &[HardpointSpec],
        progress: &mut ProgressReporter,
    ) -> Result<InsertionOutcome, PipelineError> {
        progress.stage(Stage::Initializing);
        let info = check_assembly(host)?;
        progress.stage(Stage::LoadingMarkerPart);
        check_template(&self.options.template, &self.options.template_extensions)?;
        info!(
            document = %info.title,
            hardpoints = hardpoints.len(),
            template = %self.options.template.display(),
            "inserting markers"
        );

        let steps = self.options.steps();
        let per_item = steps.len() as u64;
        progress.set_total(self.options.total_units(hardpoints.len()));
        progress.stage(Stage::InsertingBodies);

        let mut outcome = InsertionOutcome {
            requested: hardpoints.len(),
            ..Default::default()
        };

        for (index, spec) in hardpoints.iter().enumerate() {
            if self.cancel.is_cancelled() {
                let remaining = (hardpoints.len() - index) as u64;
                info!(remaining, "insertion cancelled");
                outcome.cancelled = true;
                progress.advance_by(remaining * per_item);
                break;
            }

            let handle = match host.insert_component_at_origin(session, &self.options.template) {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(hardpoint = %spec.identity(), error = %e, "insert failed");
                    outcome.failed.push(FailedInsertion {
                        identity: spec.identity(),
                        error: e.to_string(),
                    });
                    progress.advance_by(per_item);
                    continue;
                }
            };
            progress.advance();

            let mut component = InsertedComponent {
                original_name: host_name(host, handle),
                renamed_name: spec.identity(),
                handle,
                spec: spec.clone(),
                made_virtual: false,
                renamed: false,
                floated: false,
                oriented: false,
                colored: false,
                stopped_at: None,
            };

            for (position, step) in steps.iter().enumerate().skip(1) {
                match self.apply_step(host, session, &component, *step) {
                    Ok(true) => component.record(*step),
                    Ok(false) => {}
                    Err(e) if step.is_optional() => {
                        warn!(hardpoint = %component.renamed_name, step = %step, error = %e, "step failed")
                    }
                    Err(e) => {
                        warn!(
                            hardpoint = %component.renamed_name,
                            step = %step,
                            error = %e,
                            "step failed, marker left incomplete"
                        );
                        component.stopped_at = Some(*step);
                        progress.advance_by((steps.len() - position) as u64);
                        break;
                    }
                }
                progress.advance();
            }

            debug!(
                hardpoint = %component.renamed_name,
                handle = %handle,
                "marker done"
            );
            outcome.inserted.push(component);
        }

        progress.stage(Stage::CreatingHardpointsFolder);
        let members: Vec<EntityRef> = outcome
            .inserted
            .iter()
            .filter(|c| c.renamed)
            .map(|c| EntityRef::Component { handle: c.handle })
            .collect();
        outcome.folder = group_into_folder(host, session, &self.options.folder_name, &members);
        progress.advance();

        progress.stage(Stage::Rebuilding);
        match host.rebuild(session) {
            Ok(()) => outcome.rebuilt = true,
            Err(e) => warn!(error = %e, "rebuild failed"),
        }
        progress.advance();
        progress.stage(Stage::Complete);

        info!("{}", outcome.summary());
        Ok(outcome)
    }

    /// One step after insertion; `Ok(false)` when skipped on purpose
    fn apply_step<H: CadHost + ?Sized>(
        &self,
        host: &mut H,
        session: &mut Session,
        component: &InsertedComponent,
        step: InsertionStep,
    ) -> Result<bool, HostError> {
        let handle = component.handle;
        match step {
            InsertionStep::Inserted => Ok(true),
            InsertionStep::MadeVirtual => {
                if !self.options.make_virtual || !host.capabilities().make_virtual {
                    debug!(hardpoint = %component.renamed_name, "not making virtual");
                    return Ok(false);
                }
                host.make_virtual(session, handle)?;
                Ok(true)
            }
            InsertionStep::Renamed => {
                host.rename_component(session, handle, &component.renamed_name)?;
                Ok(true)
            }
            InsertionStep::Floated => {
                host.release_constraint(session, handle)?;
                Ok(true)
            }
            InsertionStep::Oriented => {
                self.orient(host, session, component)?;
                Ok(true)
            }
            InsertionStep::Colored => {
                if !host.capabilities().colors {
                    return Ok(false);
                }
                host.set_color(session, handle, color_for(component.spec.base_name()))?;
                Ok(true)
            }
        }
    }

    /// Rename (and for wheels rotate) the marker's own frame
    ///
    /// Always returns to the assembly context, even when the edit failed.
    fn orient<H: CadHost + ?Sized>(
        &self,
        host: &mut H,
        session: &mut Session,
        component: &InsertedComponent,
    ) -> Result<(), HostError> {
        host.enter_edit_context(session, component.handle)?;
        let edited = self.edit_local_frame(host, session, component);
        if let Err(e) = host.exit_edit_context(session) {
            warn!(hardpoint = %component.renamed_name, error = %e, "could not leave component edit");
            if edited.is_ok() {
                return Err(e);
            }
        }
        edited
    }

    fn edit_local_frame<H: CadHost + ?Sized>(
        &self,
        host: &mut H,
        session: &mut Session,
        component: &InsertedComponent,
    ) -> Result<(), HostError> {
        let frame = find_marker_frame(host, session, component.handle, &self.options.local_frame_name)?
            .ok_or_else(|| HostError::UnknownEntity(format!("coordinate frame in {}", component.handle)))?;

        host.rename_frame(session, frame, &component.renamed_name)?;
        if component.spec.is_wheel() {
            host.set_frame_rotation(session, frame, component.spec.orientation())?;
        }
        Ok(())
    }
}

/// The template frame by name, else the first frame the component has
pub(crate) fn find_marker_frame<H: CadHost + ?Sized>(
    host: &H,
    session: &Session,
    handle: ComponentHandle,
    name: &str,
) -> Result<Option<FrameRef>, HostError> {
    if let Some(frame) = host.find_local_frame(session, handle, name)? {
        return Ok(Some(frame));
    }
    let frames = host.local_frames(session, handle)?;
    if let Some(first) = frames.first() {
        debug!(frame = %first.name, expected = name, "using first frame found");
    }
    Ok(frames.first().map(|f| f.frame))
}

fn host_name<H: CadHost + ?Sized>(host: &H, handle: ComponentHandle) -> String {
    host.components()
        .ok()
        .and_then(|all| all.into_iter().find(|c| c.handle == handle))
        .map(|c| c.name)
        .unwrap_or_default()
}
