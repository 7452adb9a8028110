//! Host-driving pipelines
//!
//! Each pipeline checks its fatal preconditions first, then works item by
//! item: per-item host failures are logged and counted, never propagated.

pub mod insertion;
pub mod pose;
pub mod profile;
pub mod release;
pub mod visibility;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::cad::{CadHost, DocumentInfo, DocumentKind, EntityRef, FolderRef, HostError, Session};

pub use insertion::{InsertedComponent, InsertionOptions, InsertionOutcome, InsertionPipeline};
pub use pose::{
    list_poses, validate_pose_name, PoseBinder, PoseBinding, PoseDeletion, PoseOutcome, PoseSummary,
};
pub use profile::{ProfileError, ProfileStore, ProfileSummary, VisibilityProfile};
pub use release::{release, ReleaseOutcome};
pub use visibility::{apply_visibility, Target, VisibilityOutcome};

/// Errors that stop a pipeline before it touches the document
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("No marker template configured (use --template or set `template` in hpt.yaml)")]
    NoTemplate,

    #[error("Marker template {path} must have one of these extensions: {allowed}")]
    TemplateExtension { path: PathBuf, allowed: String },

    #[error("Invalid pose name '{name}': {reason}")]
    InvalidPoseName { name: String, reason: String },

    #[error("Unknown visibility target '{0}'")]
    UnknownTarget(String),

    #[error("Visibility target '{0}' needs a filter value")]
    MissingFilter(String),

    #[error("No frame or folder named '{0}'")]
    FeatureNotFound(String),

    #[error("No pose named '{0}' in the document")]
    UnknownPose(String),
}

/// Cooperative cancellation, checked between hardpoints
///
/// For embedders driving a pipeline from another thread; the CLI never
/// cancels a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The active document must exist and be an assembly
pub fn check_assembly<H: CadHost + ?Sized>(host: &H) -> Result<DocumentInfo, PipelineError> {
    let info = host.document_info()?;
    if info.kind != DocumentKind::Assembly {
        return Err(HostError::WrongDocumentType { found: info.kind }.into());
    }
    Ok(info)
}

/// The template must exist and carry an accepted extension
pub fn check_template(template: &Path, extensions: &[String]) -> Result<(), PipelineError> {
    let ext = template.extension().and_then(|e| e.to_str()).unwrap_or("");
    let accepted = extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext));
    if !accepted {
        return Err(PipelineError::TemplateExtension {
            path: template.to_path_buf(),
            allowed: extensions.join(", "),
        });
    }
    if !template.is_file() {
        return Err(HostError::TemplateMissing(template.to_path_buf()).into());
    }
    Ok(())
}

/// Put `entities` in the folder called `name`, creating it when missing
///
/// Returns `None` when nothing was grouped.
pub(crate) fn group_into_folder<H: CadHost + ?Sized>(
    host: &mut H,
    session: &mut Session,
    name: &str,
    entities: &[EntityRef],
) -> Option<FolderRef> {
    if entities.is_empty() {
        return None;
    }
    if !host.capabilities().folders {
        tracing::debug!(folder = name, "host has no folders, skipping grouping");
        return None;
    }

    host.clear_selection(session);
    for entity in entities {
        if let Err(e) = host.select_entity(session, *entity, true) {
            warn!(%entity, error = %e, "could not select for grouping");
        }
    }
    if session.selection().is_empty() {
        return None;
    }

    let result = match host.find_container(name) {
        Ok(Some(folder)) => host.add_to_container(session, folder).map(|_| folder),
        Ok(None) => host.create_container(session, name),
        Err(e) => Err(e),
    };
    host.clear_selection(session);
    match result {
        Ok(folder) => Some(folder),
        Err(e) => {
            warn!(folder = name, error = %e, "grouping failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cad::{Document, MemoryHost};

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_part_document_is_rejected() {
        let host = MemoryHost::new(Document::new("Marker", DocumentKind::Part, Vec::new()));
        let err = check_assembly(&host).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Host(HostError::WrongDocumentType { .. })
        ));
    }

    #[test]
    fn test_template_checks() {
        let exts = vec!["sldprt".to_string()];
        let err = check_template(Path::new("marker.step"), &exts).unwrap_err();
        assert!(matches!(err, PipelineError::TemplateExtension { .. }));

        let err = check_template(Path::new("/no/such/Marker.SLDPRT"), &exts).unwrap_err();
        assert!(matches!(err, PipelineError::Host(HostError::TemplateMissing(_))));
    }
}
