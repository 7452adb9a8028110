//! Pose binding
//!
//! A pose places every marker through configuration-scoped features: one
//! assembly frame per hardpoint (`"<pose> <identity>"`) plus a coincident
//! and an alignment constraint tying the marker's own frame to it. All of it
//! is scoped to the active configuration, so other configurations keep their
//! own placement.
//!
//! Running the same pose again updates the frames in place and reuses the
//! constraints. A pose is found again through its `"<pose> Transforms"`
//! folder, which is also what listing and deleting poses go by.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::insertion::find_marker_frame;
use super::{check_assembly, group_into_folder, PipelineError};
use crate::cad::{
    CadHost, ComponentInfo, ConstraintKind, ConstraintRef, EntityRef, FeatureRef, FolderRef,
    FrameRef, HostError, Session,
};
use crate::core::config::Config;
use crate::core::hardpoint::HardpointSpec;
use crate::core::naming::{find_match, MatchTier};
use crate::core::progress::{ProgressReporter, Stage};

/// Suffix of the folder holding a pose's frames
pub const POSE_FOLDER_SUFFIX: &str = " Transforms";

/// Characters a pose name cannot contain (they end up in feature names)
pub const INVALID_POSE_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Trimmed pose name, or why it is unusable
pub fn validate_pose_name(name: &str) -> Result<String, PipelineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidPoseName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if let Some(c) = trimmed.chars().find(|c| INVALID_POSE_CHARS.contains(c)) {
        return Err(PipelineError::InvalidPoseName {
            name: name.to_string(),
            reason: format!("'{}' is not allowed", c),
        });
    }
    Ok(trimmed.to_string())
}

/// Outcome for one hardpoint
#[derive(Debug, Clone, Serialize)]
pub struct PoseBinding {
    pub hardpoint_name: String,
    pub frame_name: String,
    #[serde(skip)]
    pub frame: Option<FrameRef>,
    pub frame_created: bool,
    pub matched_component: Option<String>,
    pub match_tier: Option<MatchTier>,
    pub constraints_created: usize,
    pub constraints_reused: usize,
    pub bound: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoseOutcome {
    pub pose: String,
    pub configuration: String,
    pub bindings: Vec<PoseBinding>,
    #[serde(skip)]
    pub folder: Option<FolderRef>,
    pub rebuilt: bool,
}

impl PoseOutcome {
    pub fn bound(&self) -> usize {
        self.bindings.iter().filter(|b| b.bound).count()
    }

    pub fn summary(&self) -> String {
        format!("bound {} of {} hardpoints", self.bound(), self.bindings.len())
    }
}

/// A pose present in the document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseSummary {
    pub pose: String,
    pub folder: String,
    pub frames: usize,
}

/// What deleting a pose removed
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoseDeletion {
    pub pose: String,
    pub frames_deleted: usize,
    pub constraints_deleted: usize,
    /// Frames that could not be deleted
    pub failed: usize,
    pub folder_deleted: bool,
    pub rebuilt: bool,
}

impl PoseDeletion {
    pub fn summary(&self) -> String {
        format!(
            "deleted {} frames and {} constraints",
            self.frames_deleted, self.constraints_deleted
        )
    }
}

/// Poses in the document, one per transforms folder
pub fn list_poses<H: CadHost + ?Sized>(host: &H) -> Result<Vec<PoseSummary>, PipelineError> {
    check_assembly(host)?;
    let mut poses = Vec::new();
    for folder in host.containers()? {
        let Some(pose) = folder.name.strip_suffix(POSE_FOLDER_SUFFIX) else {
            continue;
        };
        if pose.trim().is_empty() {
            continue;
        }
        let frames = host
            .container_members(folder.folder)?
            .iter()
            .filter(|m| matches!(m, EntityRef::Frame { .. }))
            .count();
        poses.push(PoseSummary {
            pose: pose.to_string(),
            folder: folder.name.clone(),
            frames,
        });
    }
    Ok(poses)
}

/// Builds pose frames and binds markers to them
#[derive(Debug, Clone)]
pub struct PoseBinder {
    pose: String,
    hardpoints_folder: String,
    local_frame_name: String,
}

impl PoseBinder {
    /// Validates the pose name up front
    pub fn new(pose: &str, config: &Config) -> Result<Self, PipelineError> {
        Ok(Self {
            pose: validate_pose_name(pose)?,
            hardpoints_folder: config.hardpoints_folder.clone(),
            local_frame_name: config.local_frame_name.clone(),
        })
    }

    pub fn pose(&self) -> &str {
        &self.pose
    }

    pub fn frame_name(&self, spec: &HardpointSpec) -> String {
        format!("{} {}", self.pose, spec.identity())
    }

    /// Folder holding this pose's frames
    pub fn folder_name(&self) -> String {
        format!("{}{}", self.pose, POSE_FOLDER_SUFFIX)
    }

    pub fn run<H: CadHost + ?Sized>(
        &self,
        host: &mut H,
        session: &mut Session,
        hardpoints: &[HardpointSpec],
        progress: &mut ProgressReporter,
    ) -> Result<PoseOutcome, PipelineError> {
        let info = check_assembly(host)?;
        let configuration = info.active_configuration;
        info!(pose = %self.pose, configuration = %configuration, hardpoints = hardpoints.len(), "binding pose");

        progress.set_total((2 * hardpoints.len() + 2) as u64);
        progress.stage(Stage::CreatingCoordinateSystems);

        let mut bindings = Vec::with_capacity(hardpoints.len());
        for spec in hardpoints {
            let mut binding = PoseBinding {
                hardpoint_name: spec.identity(),
                frame_name: self.frame_name(spec),
                frame: None,
                frame_created: false,
                matched_component: None,
                match_tier: None,
                constraints_created: 0,
                constraints_reused: 0,
                bound: false,
            };
            match host.create_or_update_frame(
                session,
                &binding.frame_name,
                spec.position(),
                spec.orientation(),
            ) {
                Ok((frame, created)) => {
                    binding.frame = Some(frame);
                    binding.frame_created = created;
                    scope(host, session, FeatureRef::Frame(frame), &configuration);
                }
                Err(e) => warn!(frame = %binding.frame_name, error = %e, "frame failed"),
            }
            bindings.push(binding);
            progress.advance();
        }

        progress.stage(Stage::CreatingTransforms);
        let pool = self.component_pool(host);
        for binding in &mut bindings {
            if let Some(frame) = binding.frame {
                self.bind(host, session, &pool, frame, binding, &configuration);
            }
            progress.advance();
        }

        progress.stage(Stage::CreatingTransformsFolder);
        let frames: Vec<EntityRef> = bindings
            .iter()
            .filter_map(|b| b.frame.map(|frame| EntityRef::Frame { frame }))
            .collect();
        let folder = group_into_folder(host, session, &self.folder_name(), &frames);
        progress.advance();

        progress.stage(Stage::Rebuilding);
        let rebuilt = match host.rebuild(session) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "rebuild failed");
                false
            }
        };
        progress.advance();
        progress.stage(Stage::Complete);

        let outcome = PoseOutcome {
            pose: self.pose.clone(),
            configuration,
            bindings,
            folder,
            rebuilt,
        };
        info!("{}", outcome.summary());
        Ok(outcome)
    }

    /// Remove this pose's frames, the constraints on them, and its folder
    ///
    /// Markers keep the placement the last rebuild gave them. The folder is
    /// kept when a frame could not be deleted, so a second run finds the rest.
    pub fn delete<H: CadHost + ?Sized>(
        &self,
        host: &mut H,
        session: &mut Session,
    ) -> Result<PoseDeletion, PipelineError> {
        check_assembly(host)?;
        let folder = host
            .find_container(&self.folder_name())?
            .ok_or_else(|| PipelineError::UnknownPose(self.pose.clone()))?;
        let frames: Vec<FrameRef> = host
            .container_members(folder)?
            .into_iter()
            .filter_map(|m| match m {
                EntityRef::Frame { frame } => Some(frame),
                _ => None,
            })
            .collect();
        info!(pose = %self.pose, frames = frames.len(), "deleting pose");

        let mut deletion = PoseDeletion {
            pose: self.pose.clone(),
            ..Default::default()
        };
        for frame in frames {
            let constraints = host.constraints_on(EntityRef::Frame { frame }).unwrap_or_else(|e| {
                warn!(%frame, error = %e, "could not list constraints");
                Vec::new()
            });
            for constraint in constraints {
                match host.delete_feature(session, FeatureRef::Constraint(constraint)) {
                    Ok(()) => deletion.constraints_deleted += 1,
                    Err(e) => warn!(%constraint, error = %e, "could not delete constraint"),
                }
            }
            match host.delete_feature(session, FeatureRef::Frame(frame)) {
                Ok(()) => deletion.frames_deleted += 1,
                Err(e) => {
                    warn!(%frame, error = %e, "could not delete frame");
                    deletion.failed += 1;
                }
            }
        }

        if deletion.failed == 0 {
            match host.delete_feature(session, FeatureRef::Folder(folder)) {
                Ok(()) => deletion.folder_deleted = true,
                Err(e) => warn!(%folder, error = %e, "could not delete folder"),
            }
        }

        match host.rebuild(session) {
            Ok(()) => deletion.rebuilt = true,
            Err(e) => warn!(error = %e, "rebuild failed"),
        }
        info!("{}", deletion.summary());
        Ok(deletion)
    }

    /// Markers in the hardpoints folder, else every component
    fn component_pool<H: CadHost + ?Sized>(&self, host: &H) -> Vec<ComponentInfo> {
        let all = match host.components() {
            Ok(all) => all,
            Err(e) => {
                warn!(error = %e, "could not list components");
                return Vec::new();
            }
        };

        let members = match host.find_container(&self.hardpoints_folder) {
            Ok(Some(folder)) => host.container_members(folder).unwrap_or_default(),
            _ => Vec::new(),
        };
        let pool: Vec<ComponentInfo> = all
            .iter()
            .filter(|c| members.contains(&EntityRef::Component { handle: c.handle }))
            .cloned()
            .collect();

        if pool.is_empty() {
            warn!(
                folder = %self.hardpoints_folder,
                "hardpoints folder missing or empty, matching against all components"
            );
            return all;
        }
        pool
    }

    fn bind<H: CadHost + ?Sized>(
        &self,
        host: &mut H,
        session: &mut Session,
        pool: &[ComponentInfo],
        frame: FrameRef,
        binding: &mut PoseBinding,
        configuration: &str,
    ) {
        let Some(found) = find_match(pool, &binding.hardpoint_name, |c| c.name.as_str()) else {
            warn!(hardpoint = %binding.hardpoint_name, "no component matches");
            return;
        };
        let component = found.candidate;
        binding.matched_component = Some(component.name.clone());
        binding.match_tier = Some(found.tier);
        if found.tier != MatchTier::Exact && found.tier != MatchTier::Normalized {
            debug!(hardpoint = %binding.hardpoint_name, component = %component.name, tier = %found.tier, "loose match");
        }

        let local = match self.marker_frame(host, session, component, &binding.hardpoint_name) {
            Ok(Some(local)) => local,
            Ok(None) => {
                warn!(component = %component.name, "component has no coordinate frame");
                return;
            }
            Err(e) => {
                warn!(component = %component.name, error = %e, "frame lookup failed");
                return;
            }
        };

        let pose = EntityRef::Frame { frame };
        let marker = EntityRef::LocalFrame {
            component: component.handle,
            frame: local,
        };

        let mut kinds = vec![ConstraintKind::Coincident];
        if host.capabilities().alignment_constraints {
            kinds.push(ConstraintKind::Aligned);
        } else {
            debug!("host has no alignment constraints, binding position only");
        }

        for kind in kinds {
            match ensure_constraint(host, session, kind, pose, marker, configuration) {
                Ok((_, true)) => binding.constraints_created += 1,
                Ok((_, false)) => binding.constraints_reused += 1,
                Err(e) => {
                    warn!(hardpoint = %binding.hardpoint_name, %kind, error = %e, "constraint failed");
                    return;
                }
            }
        }
        binding.bound = true;
    }

    /// The marker's frame: identity name, then template name, then the first one
    fn marker_frame<H: CadHost + ?Sized>(
        &self,
        host: &H,
        session: &Session,
        component: &ComponentInfo,
        identity: &str,
    ) -> Result<Option<FrameRef>, HostError> {
        if let Some(frame) = host.find_local_frame(session, component.handle, identity)? {
            return Ok(Some(frame));
        }
        find_marker_frame(host, session, component.handle, &self.local_frame_name)
    }
}

/// Reuse the constraint between `a` and `b` or create it; scoped either way
fn ensure_constraint<H: CadHost + ?Sized>(
    host: &mut H,
    session: &mut Session,
    kind: ConstraintKind,
    a: EntityRef,
    b: EntityRef,
    configuration: &str,
) -> Result<(ConstraintRef, bool), HostError> {
    if let Some(existing) = host.find_constraint(kind, a, b)? {
        scope(host, session, FeatureRef::Constraint(existing), configuration);
        return Ok((existing, false));
    }
    let created = match kind {
        ConstraintKind::Coincident => host.create_coincident_constraint(session, a, b, configuration)?,
        ConstraintKind::Aligned => host.create_alignment_constraint(session, a, b, configuration)?,
    };
    Ok((created, true))
}

fn scope<H: CadHost + ?Sized>(
    host: &mut H,
    session: &mut Session,
    feature: FeatureRef,
    configuration: &str,
) {
    if !host.capabilities().configuration_scope {
        return;
    }
    if let Err(e) = host.set_configuration_scope(session, feature, configuration) {
        warn!(?feature, configuration, error = %e, "could not scope feature");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cad::{Document, DocumentKind, FaultPlan, HostOp, MemoryHost};
    use crate::core::hardpoint::{Orientation, Position, Suffix};
    use crate::core::progress::ProgressEvent;
    use crate::pipeline::{InsertionOptions, InsertionPipeline};
    use tempfile::NamedTempFile;

    fn template() -> NamedTempFile {
        tempfile::Builder::new()
            .prefix("Marker")
            .suffix(".SLDPRT")
            .tempfile()
            .unwrap()
    }

    fn specs() -> Vec<HardpointSpec> {
        vec![
            HardpointSpec::new("CHAS_LowFor", Suffix::Front, Position::new(100.0, 200.0, 50.0)),
            HardpointSpec::new("UPRI_LowPnt", Suffix::Front, Position::new(0.0, 650.0, 120.0)),
            HardpointSpec::new("FL_wheel", Suffix::Front, Position::new(0.0, 600.0, 250.0))
                .with_orientation(Orientation::new(-1.0, 0.0, 0.2)),
        ]
    }

    /// An assembly with the markers already inserted
    fn inserted(tpl: &NamedTempFile) -> MemoryHost {
        let mut host = MemoryHost::new(Document::new(
            "Car",
            DocumentKind::Assembly,
            vec!["Static".into(), "Bump".into()],
        ));
        InsertionPipeline::new(InsertionOptions::from_config(
            &Config::default(),
            tpl.path().to_path_buf(),
        ))
        .run(&mut host, &mut Session::new(), &specs(), &mut ProgressReporter::silent())
        .unwrap();
        host
    }

    fn binder(pose: &str) -> PoseBinder {
        PoseBinder::new(pose, &Config::default()).unwrap()
    }

    #[test]
    fn test_pose_name_validation() {
        assert_eq!(validate_pose_name("  Static ").unwrap(), "Static");
        assert!(validate_pose_name("").is_err());
        assert!(validate_pose_name("   ").is_err());
        for bad in ["a<b", "a>b", "a:b", "a\"b", "a|b", "a?b", "a*b"] {
            assert!(validate_pose_name(bad).is_err(), "{} accepted", bad);
        }
        assert!(validate_pose_name("Full Bump 30mm").is_ok());
    }

    #[test]
    fn test_bind_places_markers_at_hardpoints() {
        let tpl = template();
        let mut host = inserted(&tpl);
        let mut session = Session::new();
        let outcome = binder("Static")
            .run(&mut host, &mut session, &specs(), &mut ProgressReporter::silent())
            .unwrap();

        assert_eq!(outcome.summary(), "bound 3 of 3 hardpoints");
        assert_eq!(outcome.configuration, "Static");
        assert!(outcome.rebuilt);

        let doc = host.document().unwrap();
        for spec in specs() {
            let component = doc.component_by_name(&spec.identity()).unwrap();
            let local = component.local_frames[0].id;
            let origin = component.local_frame_origin(FrameRef(local)).unwrap();
            assert!(origin.distance_to(&spec.position()) < 1e-6, "{} at {}", spec, origin);
        }
        let folder = doc.folder_by_name("Static Transforms").unwrap();
        assert_eq!(folder.members.len(), 3);
        assert!(doc.frame_by_name("Static FL_wheel_FRONT").is_some());
    }

    #[test]
    fn test_second_run_updates_in_place() {
        let tpl = template();
        let mut host = inserted(&tpl);
        let mut session = Session::new();
        binder("Static")
            .run(&mut host, &mut session, &specs(), &mut ProgressReporter::silent())
            .unwrap();
        let ids: Vec<u64> = host.document().unwrap().frames.iter().map(|f| f.id).collect();
        let constraints = host.document().unwrap().constraints.len();

        let moved: Vec<HardpointSpec> = specs()
            .into_iter()
            .map(|s| {
                let p = s.position();
                HardpointSpec::new(s.base_name(), s.suffix(), Position::new(p.x + 10.0, p.y, p.z))
                    .with_orientation(s.orientation())
            })
            .collect();
        let outcome = binder("Static")
            .run(&mut host, &mut session, &moved, &mut ProgressReporter::silent())
            .unwrap();

        assert!(outcome.bindings.iter().all(|b| !b.frame_created));
        assert!(outcome.bindings.iter().all(|b| b.constraints_reused == 2));
        let doc = host.document().unwrap();
        let again: Vec<u64> = doc.frames.iter().map(|f| f.id).collect();
        assert_eq!(ids, again);
        assert_eq!(doc.constraints.len(), constraints);
        assert_eq!(doc.frame_by_name("Static CHAS_LowFor_FRONT").unwrap().position.x, 110.0);
    }

    #[test]
    fn test_pose_features_are_scoped_to_active_configuration() {
        let tpl = template();
        let mut host = inserted(&tpl);
        let mut session = Session::new();
        binder("Static")
            .run(&mut host, &mut session, &specs(), &mut ProgressReporter::silent())
            .unwrap();

        host.document_mut().unwrap().activate("Bump").unwrap();
        binder("Bump")
            .run(&mut host, &mut session, &specs(), &mut ProgressReporter::silent())
            .unwrap();

        let doc = host.document().unwrap();
        let static_frame = doc.frame_by_name("Static CHAS_LowFor_FRONT").unwrap();
        let bump_frame = doc.frame_by_name("Bump CHAS_LowFor_FRONT").unwrap();
        assert_eq!(static_frame.scope.as_deref(), Some("Static"));
        assert!(!doc.is_active(&static_frame.scope));
        assert!(doc.is_active(&bump_frame.scope));
        assert!(doc
            .constraints
            .iter()
            .all(|c| c.scope.as_deref() == Some("Static") || c.scope.as_deref() == Some("Bump")));
    }

    #[test]
    fn test_progress_and_missing_components() {
        let tpl = template();
        let mut host = inserted(&tpl);
        let mut list = specs();
        list.push(HardpointSpec::new("DAMP_Top", Suffix::Rear, Position::ORIGIN));
        let mut progress = ProgressReporter::silent();
        let outcome = binder("Static")
            .run(&mut host, &mut Session::new(), &list, &mut progress)
            .unwrap();

        assert_eq!(outcome.summary(), "bound 3 of 4 hardpoints");
        assert_eq!(progress.total(), 10);
        assert_eq!(progress.units_reported(), 10);
        assert!(progress
            .events()
            .contains(&ProgressEvent::State("CreatingTransformsFolder".to_string())));
    }

    #[test]
    fn test_progress_matches_total_when_everything_fails() {
        let tpl = template();
        for n in [0, 1, 3] {
            let mut host = inserted(&tpl).with_faults(FaultPlan::all());
            let mut progress = ProgressReporter::silent();
            let outcome = binder("Static")
                .run(&mut host, &mut Session::new(), &specs()[..n], &mut progress)
                .unwrap();
            assert_eq!(outcome.bound(), 0);
            assert_eq!(progress.units_reported(), progress.total());
        }
    }

    #[test]
    fn test_falls_back_to_all_components_without_folder() {
        let tpl = template();
        let mut host = inserted(&tpl);
        host.document_mut().unwrap().folders.clear();
        let outcome = binder("Static")
            .run(&mut host, &mut Session::new(), &specs(), &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(outcome.bound(), 3);
    }

    /// `inserted` with the Static and Bump poses bound
    fn posed(tpl: &NamedTempFile) -> MemoryHost {
        let mut host = inserted(tpl);
        let mut session = Session::new();
        binder("Static")
            .run(&mut host, &mut session, &specs(), &mut ProgressReporter::silent())
            .unwrap();
        host.document_mut().unwrap().activate("Bump").unwrap();
        binder("Bump")
            .run(&mut host, &mut session, &specs(), &mut ProgressReporter::silent())
            .unwrap();
        host
    }

    #[test]
    fn test_list_poses_by_folder() {
        let tpl = template();
        assert!(list_poses(&inserted(&tpl)).unwrap().is_empty());

        let host = posed(&tpl);
        let poses = list_poses(&host).unwrap();
        let names: Vec<&str> = poses.iter().map(|p| p.pose.as_str()).collect();
        assert_eq!(names, ["Static", "Bump"]);
        assert!(poses.iter().all(|p| p.frames == 3));
        assert_eq!(poses[0].folder, "Static Transforms");
    }

    #[test]
    fn test_delete_pose_removes_its_features_only() {
        let tpl = template();
        let mut host = posed(&tpl);
        let mut session = Session::new();
        let deletion = binder("Static").delete(&mut host, &mut session).unwrap();

        assert_eq!(deletion.summary(), "deleted 3 frames and 6 constraints");
        assert!(deletion.folder_deleted);
        assert!(deletion.rebuilt);

        let doc = host.document().unwrap();
        assert!(doc.frames.iter().all(|f| f.name.starts_with("Bump ")));
        assert_eq!(doc.frames.len(), 3);
        assert_eq!(doc.constraints.len(), 6);
        assert!(doc.folder_by_name("Static Transforms").is_none());
        assert!(doc.folder_by_name("Bump Transforms").is_some());
        assert_eq!(doc.components.len(), 3);

        let poses = list_poses(&host).unwrap();
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].pose, "Bump");
    }

    #[test]
    fn test_delete_unknown_pose_fails() {
        let tpl = template();
        let mut host = posed(&tpl);
        let err = binder("Droop")
            .delete(&mut host, &mut Session::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPose(ref p) if p == "Droop"));
    }

    #[test]
    fn test_failed_delete_keeps_the_folder() {
        let tpl = template();
        let mut host = posed(&tpl).with_faults(FaultPlan::none().fail(HostOp::Delete));
        let deletion = binder("Static")
            .delete(&mut host, &mut Session::new())
            .unwrap();
        assert_eq!(deletion.frames_deleted, 0);
        assert_eq!(deletion.failed, 3);
        assert!(!deletion.folder_deleted);
        assert!(host.document().unwrap().folder_by_name("Static Transforms").is_some());
    }

    #[test]
    fn test_constraint_failure_is_per_item() {
        let tpl = template();
        let mut host = inserted(&tpl).with_faults(FaultPlan::none().fail(HostOp::Constraint));
        let outcome = binder("Static")
            .run(&mut host, &mut Session::new(), &specs(), &mut ProgressReporter::silent())
            .unwrap();
        assert_eq!(outcome.bound(), 0);
        assert!(outcome.bindings.iter().all(|b| b.frame.is_some()));
        assert!(outcome.bindings.iter().all(|b| b.match_tier == Some(MatchTier::Normalized)));
    }
}
