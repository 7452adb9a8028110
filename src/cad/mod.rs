//! CAD host abstraction
//!
//! The host owns an assembly document with one active configuration. All
//! calls that depend on or change the current selection or edit context take
//! the caller's [`Session`] explicitly; each method documents what it expects
//! of the session and what it leaves behind.
//!
//! Optional operations are advertised through [`Capabilities`] so callers can
//! skip them up front.

pub mod memory;
pub mod session;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::color::Rgb;
use crate::core::hardpoint::{Orientation, Position};

pub use memory::{Document, FaultPlan, HostOp, MemoryHost};
pub use session::{EditContext, Session};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle_type!(
    /// A component instance in the assembly
    ComponentHandle,
    "component"
);
handle_type!(
    /// A coordinate frame, either assembly-level or inside a component
    FrameRef,
    "frame"
);
handle_type!(
    /// A feature-tree folder
    FolderRef,
    "folder"
);
handle_type!(
    /// An assembly constraint (mate)
    ConstraintRef,
    "constraint"
);

/// Anything that can be selected or constrained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityRef {
    Component { handle: ComponentHandle },
    Frame { frame: FrameRef },
    LocalFrame {
        component: ComponentHandle,
        frame: FrameRef,
    },
    Folder { folder: FolderRef },
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Component { handle } => write!(f, "{}", handle),
            EntityRef::Frame { frame } => write!(f, "{}", frame),
            EntityRef::LocalFrame { component, frame } => write!(f, "{}/{}", component, frame),
            EntityRef::Folder { folder } => write!(f, "{}", folder),
        }
    }
}

/// Features that can be scoped to a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureRef {
    Frame(FrameRef),
    Constraint(ConstraintRef),
    Folder(FolderRef),
}

/// Kinds accepted by [`CadHost::select_by_name`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Component,
    Frame,
    Folder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Part,
    Assembly,
    Drawing,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Part => write!(f, "part"),
            DocumentKind::Assembly => write!(f, "assembly"),
            DocumentKind::Drawing => write!(f, "drawing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    /// Origins coincide
    Coincident,
    /// Axes parallel, pins rotation
    Aligned,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Coincident => write!(f, "coincident"),
            ConstraintKind::Aligned => write!(f, "aligned"),
        }
    }
}

/// Summary of the active document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub title: String,
    pub kind: DocumentKind,
    pub active_configuration: String,
    pub configurations: Vec<String>,
}

/// A component as the host reports it
///
/// `name` carries the host's decorations (instance counter and so on); use
/// [`crate::core::naming::normalize`] before comparing with identities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentInfo {
    pub handle: ComponentHandle,
    pub name: String,
    pub visible: bool,
}

/// A coordinate frame inside a component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedFrame {
    pub frame: FrameRef,
    pub name: String,
}

/// An assembly-level folder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedFolder {
    pub folder: FolderRef,
    pub name: String,
}

/// Optional operations a host supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub make_virtual: bool,
    pub configuration_scope: bool,
    pub folders: bool,
    pub alignment_constraints: bool,
    pub visibility: bool,
    pub colors: bool,
}

impl Capabilities {
    pub const fn all() -> Self {
        Self {
            make_virtual: true,
            configuration_scope: true,
            folders: true,
            alignment_constraints: true,
            visibility: true,
            colors: true,
        }
    }

    pub const fn minimal() -> Self {
        Self {
            make_virtual: false,
            configuration_scope: false,
            folders: false,
            alignment_constraints: false,
            visibility: false,
            colors: false,
        }
    }
}

/// Errors reported by a CAD host
#[derive(Debug, Error)]
pub enum HostError {
    #[error("CAD host is not reachable: {0}")]
    Unreachable(String),

    #[error("No active document")]
    NoActiveDocument,

    #[error("Active document is a {found}, expected an assembly")]
    WrongDocumentType { found: DocumentKind },

    #[error("Marker template not found: {0}")]
    TemplateMissing(PathBuf),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Name already in use: {0}")]
    DuplicateName(String),

    #[error("Wrong edit context: {0}")]
    EditContext(String),

    #[error("Operation not supported by this host: {0}")]
    Unsupported(&'static str),

    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },

    #[error("Failed to save document {path}: {message}")]
    Save { path: PathBuf, message: String },
}

impl HostError {
    /// Errors that make any further work on the document pointless
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HostError::Unreachable(_)
                | HostError::NoActiveDocument
                | HostError::WrongDocumentType { .. }
                | HostError::TemplateMissing(_)
        )
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// The capability set the pipelines drive
///
/// Methods never change the active configuration. Unless stated otherwise
/// they leave the selection and edit context as they found them.
pub trait CadHost {
    /// Optional operations this host supports
    fn capabilities(&self) -> Capabilities;

    /// Active document summary; fails when there is none
    fn document_info(&self) -> HostResult<DocumentInfo>;

    /// All top-level components with their decorated names
    fn components(&self) -> HostResult<Vec<ComponentInfo>>;

    /// Insert `template` as a new component at the assembly origin
    ///
    /// Requires the assembly edit context. Clears the selection.
    fn insert_component_at_origin(
        &mut self,
        session: &mut Session,
        template: &Path,
    ) -> HostResult<ComponentHandle>;

    /// Detach a component from its file, keeping its content
    ///
    /// Returns `false` when the component already was virtual.
    fn make_virtual(&mut self, session: &mut Session, handle: ComponentHandle) -> HostResult<bool>;

    /// Set a component's display name
    fn rename_component(
        &mut self,
        session: &mut Session,
        handle: ComponentHandle,
        name: &str,
    ) -> HostResult<()>;

    /// Drop the fixed/positional constraint applied on insert
    fn release_constraint(&mut self, session: &mut Session, handle: ComponentHandle)
        -> HostResult<()>;

    /// Start editing a component in place
    ///
    /// Requires the assembly edit context; leaves the session in
    /// `EditContext::Component(handle)`.
    fn enter_edit_context(&mut self, session: &mut Session, handle: ComponentHandle)
        -> HostResult<()>;

    /// Return to the assembly edit context. A no-op when already there.
    fn exit_edit_context(&mut self, session: &mut Session) -> HostResult<()>;

    /// Find a frame inside a component by exact name
    fn find_local_frame(
        &self,
        session: &Session,
        handle: ComponentHandle,
        name: &str,
    ) -> HostResult<Option<FrameRef>>;

    /// Every frame inside a component, in feature-tree order
    fn local_frames(&self, session: &Session, handle: ComponentHandle) -> HostResult<Vec<NamedFrame>>;

    /// Rename a frame (assembly-level or local)
    fn rename_frame(&mut self, session: &mut Session, frame: FrameRef, name: &str) -> HostResult<()>;

    /// Set a local frame's rotation, keeping its origin
    ///
    /// Requires editing the component that owns the frame.
    fn set_frame_rotation(
        &mut self,
        session: &mut Session,
        frame: FrameRef,
        angles: Orientation,
    ) -> HostResult<()>;

    fn set_color(&mut self, session: &mut Session, handle: ComponentHandle, rgb: Rgb)
        -> HostResult<()>;

    fn set_visibility(
        &mut self,
        session: &mut Session,
        handle: ComponentHandle,
        visible: bool,
    ) -> HostResult<()>;

    /// Show or hide an assembly-level frame or folder (and its members)
    fn set_feature_visibility(
        &mut self,
        session: &mut Session,
        feature: FeatureRef,
        visible: bool,
    ) -> HostResult<()>;

    /// Select an entity by name; adds to the selection when `append`
    ///
    /// Returns `false` (selection untouched) when nothing has that name.
    /// Components match on display name or decorated name.
    fn select_by_name(
        &mut self,
        session: &mut Session,
        name: &str,
        kind: EntityKind,
        append: bool,
    ) -> HostResult<bool>;

    /// Select an entity by reference; adds to the selection when `append`
    fn select_entity(
        &mut self,
        session: &mut Session,
        entity: EntityRef,
        append: bool,
    ) -> HostResult<()>;

    fn clear_selection(&mut self, session: &mut Session) {
        session.clear_selection();
    }

    /// Create a folder holding the current selection
    ///
    /// Requires a non-empty selection; clears it.
    fn create_container(&mut self, session: &mut Session, name: &str) -> HostResult<FolderRef>;

    /// Move the current selection into an existing folder; clears it
    fn add_to_container(&mut self, session: &mut Session, folder: FolderRef) -> HostResult<()>;

    fn find_container(&self, name: &str) -> HostResult<Option<FolderRef>>;

    fn container_members(&self, folder: FolderRef) -> HostResult<Vec<EntityRef>>;

    /// Every assembly-level folder, in feature-tree order
    fn containers(&self) -> HostResult<Vec<NamedFolder>>;

    /// Assembly-level frame by exact name
    fn find_frame(&self, name: &str) -> HostResult<Option<FrameRef>>;

    fn create_frame(
        &mut self,
        session: &mut Session,
        name: &str,
        position: Position,
        angles: Orientation,
    ) -> HostResult<FrameRef>;

    /// Clear the frame's entity binding and set position/rotation numerically
    ///
    /// The frame keeps its identity.
    fn update_frame(
        &mut self,
        session: &mut Session,
        frame: FrameRef,
        position: Position,
        angles: Orientation,
    ) -> HostResult<()>;

    /// Update the frame named `name` in place, or create it
    ///
    /// Returns the frame and whether it was newly created.
    fn create_or_update_frame(
        &mut self,
        session: &mut Session,
        name: &str,
        position: Position,
        angles: Orientation,
    ) -> HostResult<(FrameRef, bool)> {
        match self.find_frame(name)? {
            Some(frame) => {
                self.update_frame(session, frame, position, angles)?;
                Ok((frame, false))
            }
            None => Ok((self.create_frame(session, name, position, angles)?, true)),
        }
    }

    /// Existing constraint of `kind` between `a` and `b` (either order)
    fn find_constraint(
        &self,
        kind: ConstraintKind,
        a: EntityRef,
        b: EntityRef,
    ) -> HostResult<Option<ConstraintRef>>;

    /// Constraints that reference `entity` on either side
    fn constraints_on(&self, entity: EntityRef) -> HostResult<Vec<ConstraintRef>>;

    /// Remove a frame, constraint or folder from the document
    ///
    /// Deleting a frame also drops the constraints that reference it.
    /// Deleting a folder keeps its members at the top level. Clears the
    /// selection.
    fn delete_feature(&mut self, session: &mut Session, feature: FeatureRef) -> HostResult<()>;

    /// Coincident constraint active only in `configuration`
    fn create_coincident_constraint(
        &mut self,
        session: &mut Session,
        a: EntityRef,
        b: EntityRef,
        configuration: &str,
    ) -> HostResult<ConstraintRef>;

    /// Axis alignment constraint active only in `configuration`
    fn create_alignment_constraint(
        &mut self,
        session: &mut Session,
        a: EntityRef,
        b: EntityRef,
        configuration: &str,
    ) -> HostResult<ConstraintRef>;

    /// Make a feature active in `configuration` only
    fn set_configuration_scope(
        &mut self,
        session: &mut Session,
        feature: FeatureRef,
        configuration: &str,
    ) -> HostResult<()>;

    /// Recompute the document
    fn rebuild(&mut self, session: &mut Session) -> HostResult<()>;
}
