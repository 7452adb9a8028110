//! In-memory assembly document host
//!
//! `MemoryHost` keeps a whole assembly document in memory and persists it as
//! pretty-printed JSON. It behaves like a desktop CAD host where the protocol
//! cares: components get instance-decorated names, there is one selection
//! and one edit context, features can be scoped to a configuration, and a
//! rebuild solves coincident/alignment constraints into component
//! placements.
//!
//! Faults can be injected per operation for tests.

use chrono::{DateTime, Utc};
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    CadHost, Capabilities, ComponentHandle, ComponentInfo, ConstraintKind, ConstraintRef,
    DocumentInfo, DocumentKind, EditContext, EntityKind, EntityRef, FeatureRef, FolderRef,
    FrameRef, HostError, HostResult, NamedFolder, NamedFrame, Session,
};
use crate::core::color::Rgb;
use crate::core::hardpoint::{Orientation, Position};

/// Default name of the frame inside the marker template
pub const TEMPLATE_FRAME_NAME: &str = "Coordinate System1";

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    Insert,
    MakeVirtual,
    Rename,
    Release,
    EnterEdit,
    ExitEdit,
    FindLocalFrame,
    RenameFrame,
    SetFrameRotation,
    SetColor,
    SetVisibility,
    Select,
    CreateContainer,
    CreateFrame,
    UpdateFrame,
    Constraint,
    ConfigurationScope,
    Delete,
    Rebuild,
}

impl HostOp {
    pub const ALL: [HostOp; 19] = [
        HostOp::Insert,
        HostOp::MakeVirtual,
        HostOp::Rename,
        HostOp::Release,
        HostOp::EnterEdit,
        HostOp::ExitEdit,
        HostOp::FindLocalFrame,
        HostOp::RenameFrame,
        HostOp::SetFrameRotation,
        HostOp::SetColor,
        HostOp::SetVisibility,
        HostOp::Select,
        HostOp::CreateContainer,
        HostOp::CreateFrame,
        HostOp::UpdateFrame,
        HostOp::Constraint,
        HostOp::ConfigurationScope,
        HostOp::Delete,
        HostOp::Rebuild,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HostOp::Insert => "insert_component_at_origin",
            HostOp::MakeVirtual => "make_virtual",
            HostOp::Rename => "rename_component",
            HostOp::Release => "release_constraint",
            HostOp::EnterEdit => "enter_edit_context",
            HostOp::ExitEdit => "exit_edit_context",
            HostOp::FindLocalFrame => "find_local_frame",
            HostOp::RenameFrame => "rename_frame",
            HostOp::SetFrameRotation => "set_frame_rotation",
            HostOp::SetColor => "set_color",
            HostOp::SetVisibility => "set_visibility",
            HostOp::Select => "select",
            HostOp::CreateContainer => "create_container",
            HostOp::CreateFrame => "create_frame",
            HostOp::UpdateFrame => "update_frame",
            HostOp::Constraint => "create_constraint",
            HostOp::ConfigurationScope => "set_configuration_scope",
            HostOp::Delete => "delete_feature",
            HostOp::Rebuild => "rebuild",
        }
    }
}

/// Which operations fail
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    failing: HashSet<HostOp>,
}

impl FaultPlan {
    pub fn none() -> Self {
        Self::default()
    }

    /// Every operation fails
    pub fn all() -> Self {
        Self {
            failing: HostOp::ALL.into_iter().collect(),
        }
    }

    pub fn fail(mut self, op: HostOp) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn is_failing(&self, op: HostOp) -> bool {
        self.failing.contains(&op)
    }

    fn check(&self, op: HostOp) -> HostResult<()> {
        if self.is_failing(op) {
            return Err(HostError::Failed {
                operation: op.as_str(),
                message: "injected fault".to_string(),
            });
        }
        Ok(())
    }
}

/// Component placement in the assembly frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Placement {
    pub position: Position,
    pub orientation: Orientation,
}

/// A frame inside a component, relative to the component origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFrameRecord {
    pub id: u64,
    pub name: String,
    pub origin: Position,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub id: u64,
    pub name: String,
    pub instance: u32,
    pub template: PathBuf,
    pub is_virtual: bool,
    pub fixed: bool,
    pub visible: bool,
    pub color: Option<Rgb>,
    pub placement: Placement,
    pub local_frames: Vec<LocalFrameRecord>,
}

impl ComponentRecord {
    /// Name as the host reports it, e.g. `P1_FRONT-1`
    pub fn decorated_name(&self) -> String {
        format!("{}-{}", self.name, self.instance)
    }

    pub fn handle(&self) -> ComponentHandle {
        ComponentHandle(self.id)
    }

    /// World position of one of this component's local frame origins
    pub fn local_frame_origin(&self, frame: FrameRef) -> Option<Position> {
        let local = self.local_frames.iter().find(|f| f.id == frame.0)?;
        let rotation = self.placement.orientation.to_rotation();
        let world = self.placement.position.to_vector() + rotation * local.origin.to_vector();
        Some(Position::from_vector(&world))
    }
}

/// Assembly-level coordinate frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub id: u64,
    pub name: String,
    pub position: Position,
    pub orientation: Orientation,
    /// Geometry the frame was defined from, cleared by numeric updates
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: u64,
    pub name: String,
    pub members: Vec<EntityRef>,
    #[serde(default)]
    pub scope: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRecord {
    pub id: u64,
    pub kind: ConstraintKind,
    pub a: EntityRef,
    pub b: EntityRef,
    #[serde(default)]
    pub scope: Option<String>,
}

impl ConstraintRecord {
    fn connects(&self, a: EntityRef, b: EntityRef) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }

    /// `(local frame, assembly frame)` when this constraint pins a frame of `component`
    fn binding_for(&self, component: ComponentHandle) -> Option<(FrameRef, FrameRef)> {
        match (self.a, self.b) {
            (EntityRef::LocalFrame { component: c, frame: local }, EntityRef::Frame { frame })
            | (EntityRef::Frame { frame }, EntityRef::LocalFrame { component: c, frame: local })
                if c == component =>
            {
                Some((local, frame))
            }
            _ => None,
        }
    }
}

/// The persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub kind: DocumentKind,
    pub configurations: Vec<String>,
    pub active_configuration: String,
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
    #[serde(default)]
    pub frames: Vec<FrameRecord>,
    #[serde(default)]
    pub folders: Vec<FolderRecord>,
    #[serde(default)]
    pub constraints: Vec<ConstraintRecord>,
    #[serde(default)]
    pub rebuilds: u64,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    /// Host command state left behind by the last client
    #[serde(default)]
    pub editing: Option<ComponentHandle>,
    #[serde(default)]
    pub selection: Vec<EntityRef>,
    #[serde(default)]
    next_id: u64,
}

impl Document {
    /// New empty document; the first configuration is active
    pub fn new(title: impl Into<String>, kind: DocumentKind, configurations: Vec<String>) -> Self {
        let configurations = if configurations.is_empty() {
            vec!["Default".to_string()]
        } else {
            configurations
        };
        Self {
            title: title.into(),
            kind,
            active_configuration: configurations[0].clone(),
            configurations,
            components: Vec::new(),
            frames: Vec::new(),
            folders: Vec::new(),
            constraints: Vec::new(),
            rebuilds: 0,
            modified: None,
            editing: None,
            selection: Vec::new(),
            next_id: 0,
        }
    }

    /// Make `configuration` active
    pub fn activate(&mut self, configuration: &str) -> HostResult<()> {
        if !self.configurations.iter().any(|c| c == configuration) {
            return Err(HostError::UnknownEntity(format!("configuration '{}'", configuration)));
        }
        self.active_configuration = configuration.to_string();
        Ok(())
    }

    /// Add a configuration if it does not exist yet
    pub fn add_configuration(&mut self, configuration: &str) -> bool {
        if self.configurations.iter().any(|c| c == configuration) {
            return false;
        }
        self.configurations.push(configuration.to_string());
        true
    }

    /// Whether a feature with this scope is active (not suppressed)
    pub fn is_active(&self, scope: &Option<String>) -> bool {
        scope.as_deref().map_or(true, |s| s == self.active_configuration)
    }

    pub fn component(&self, handle: ComponentHandle) -> Option<&ComponentRecord> {
        self.components.iter().find(|c| c.id == handle.0)
    }

    pub fn component_by_name(&self, name: &str) -> Option<&ComponentRecord> {
        self.components
            .iter()
            .find(|c| c.name == name || c.decorated_name() == name)
    }

    pub fn frame(&self, frame: FrameRef) -> Option<&FrameRecord> {
        self.frames.iter().find(|f| f.id == frame.0)
    }

    pub fn frame_by_name(&self, name: &str) -> Option<&FrameRecord> {
        self.frames.iter().find(|f| f.name == name)
    }

    pub fn folder_by_name(&self, name: &str) -> Option<&FolderRecord> {
        self.folders.iter().find(|f| f.name == name)
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn component_mut(&mut self, handle: ComponentHandle) -> HostResult<&mut ComponentRecord> {
        self.components
            .iter_mut()
            .find(|c| c.id == handle.0)
            .ok_or_else(|| HostError::UnknownEntity(handle.to_string()))
    }

    fn folder_mut(&mut self, folder: FolderRef) -> HostResult<&mut FolderRecord> {
        self.folders
            .iter_mut()
            .find(|f| f.id == folder.0)
            .ok_or_else(|| HostError::UnknownEntity(folder.to_string()))
    }

    /// Owner of a local frame
    fn local_frame_owner(&self, frame: FrameRef) -> Option<ComponentHandle> {
        self.components
            .iter()
            .find(|c| c.local_frames.iter().any(|f| f.id == frame.0))
            .map(|c| c.handle())
    }

    fn entity_exists(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Component { handle } => self.component(*handle).is_some(),
            EntityRef::Frame { frame } => self.frame(*frame).is_some(),
            EntityRef::LocalFrame { component, frame } => self
                .component(*component)
                .is_some_and(|c| c.local_frames.iter().any(|f| f.id == frame.0)),
            EntityRef::Folder { folder } => self.folders.iter().any(|f| f.id == folder.0),
        }
    }

    fn require_configuration(&self, configuration: &str) -> HostResult<()> {
        if self.configurations.iter().any(|c| c == configuration) {
            Ok(())
        } else {
            Err(HostError::UnknownEntity(format!("configuration '{}'", configuration)))
        }
    }

    /// An entity lives in at most one folder
    fn detach_from_folders(&mut self, members: &[EntityRef]) {
        for folder in &mut self.folders {
            folder.members.retain(|m| !members.contains(m));
        }
    }

    /// Placement implied by the active constraints on one component
    fn solved_placement(&self, component: &ComponentRecord) -> Option<Placement> {
        let mut rotation: Option<Rotation3<f64>> = None;
        let mut anchor: Option<(Vector3<f64>, Vector3<f64>)> = None;

        for constraint in self.constraints.iter().filter(|c| self.is_active(&c.scope)) {
            let Some((local, frame)) = constraint.binding_for(component.handle()) else {
                continue;
            };
            let Some(target) = self.frame(frame).filter(|f| self.is_active(&f.scope)) else {
                continue;
            };
            let Some(local) = component.local_frames.iter().find(|f| f.id == local.0) else {
                continue;
            };
            match constraint.kind {
                ConstraintKind::Aligned => {
                    rotation = Some(
                        target.orientation.to_rotation() * local.orientation.to_rotation().inverse(),
                    );
                }
                ConstraintKind::Coincident => {
                    anchor = Some((target.position.to_vector(), local.origin.to_vector()));
                }
            }
        }

        if rotation.is_none() && anchor.is_none() {
            return None;
        }

        let rotation = rotation.unwrap_or_else(|| component.placement.orientation.to_rotation());
        let position = match anchor {
            Some((target, local_origin)) => Position::from_vector(&(target - rotation * local_origin)),
            None => component.placement.position,
        };
        Some(Placement {
            position,
            orientation: Orientation::from_rotation(&rotation),
        })
    }

    fn solve(&mut self) {
        let solved: Vec<(usize, Placement)> = self
            .components
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.fixed)
            .filter_map(|(i, c)| self.solved_placement(c).map(|p| (i, p)))
            .collect();
        for (index, placement) in solved {
            self.components[index].placement = placement;
        }
    }
}

/// A [`CadHost`] over an in-memory [`Document`]
#[derive(Debug, Clone)]
pub struct MemoryHost {
    document: Option<Document>,
    path: Option<PathBuf>,
    capabilities: Capabilities,
    faults: FaultPlan,
    reachable: bool,
    template_frame_name: String,
}

impl MemoryHost {
    pub fn new(document: Document) -> Self {
        Self {
            document: Some(document),
            path: None,
            capabilities: Capabilities::all(),
            faults: FaultPlan::none(),
            reachable: true,
            template_frame_name: TEMPLATE_FRAME_NAME.to_string(),
        }
    }

    /// A host with no document open
    pub fn empty() -> Self {
        Self {
            document: None,
            ..Self::new(Document::new("", DocumentKind::Assembly, Vec::new()))
        }
    }

    /// A host that cannot be reached at all
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::empty()
        }
    }

    /// Open a document file; saving writes back to the same path
    pub fn open(path: &Path) -> HostResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HostError::Unreachable(format!("cannot open document {}: {}", path.display(), e))
        })?;
        let document: Document = serde_json::from_str(&content).map_err(|e| {
            HostError::Unreachable(format!("cannot parse document {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), components = document.components.len(), "opened document");
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..Self::new(document)
        })
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Name of the frame every inserted marker carries
    pub fn with_template_frame_name(mut self, name: impl Into<String>) -> Self {
        self.template_frame_name = name.into();
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn document(&self) -> HostResult<&Document> {
        if !self.reachable {
            return Err(HostError::Unreachable("host is not running".to_string()));
        }
        self.document.as_ref().ok_or(HostError::NoActiveDocument)
    }

    pub fn document_mut(&mut self) -> HostResult<&mut Document> {
        if !self.reachable {
            return Err(HostError::Unreachable("host is not running".to_string()));
        }
        self.document.as_mut().ok_or(HostError::NoActiveDocument)
    }

    /// Session as the last client left it
    pub fn restore_session(&self) -> Session {
        let Ok(doc) = self.document() else {
            return Session::new();
        };
        let context = match doc.editing {
            Some(handle) => EditContext::Component(handle),
            None => EditContext::Assembly,
        };
        Session::restore(doc.selection.clone(), context)
    }

    /// Keep the session with the document so the next client sees it
    pub fn store_session(&mut self, session: &Session) -> HostResult<()> {
        let doc = self.document_mut()?;
        doc.editing = match session.edit_context() {
            EditContext::Component(handle) => Some(handle),
            EditContext::Assembly => None,
        };
        doc.selection = session.selection().to_vec();
        Ok(())
    }

    /// Write the document back to its file
    pub fn save(&mut self) -> HostResult<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let document = self.document_mut()?;
        document.modified = Some(Utc::now());
        let json = serde_json::to_string_pretty(document).map_err(|e| HostError::Save {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&path, json).map_err(|e| HostError::Save {
            path: path.clone(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "saved document");
        Ok(())
    }

    /// Document access guarded by a fault check
    fn doc_for(&mut self, op: HostOp) -> HostResult<&mut Document> {
        self.faults.check(op)?;
        self.document_mut()
    }

    fn scope_for(&self, configuration: &str) -> Option<String> {
        self.capabilities
            .configuration_scope
            .then(|| configuration.to_string())
    }

    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        a: EntityRef,
        b: EntityRef,
        configuration: &str,
    ) -> HostResult<ConstraintRef> {
        let scope = self.scope_for(configuration);
        let doc = self.doc_for(HostOp::Constraint)?;
        doc.require_configuration(configuration)?;
        for entity in [&a, &b] {
            if !doc.entity_exists(entity) {
                return Err(HostError::UnknownEntity(entity.to_string()));
            }
        }
        let id = doc.allocate_id();
        doc.constraints.push(ConstraintRecord {
            id,
            kind,
            a,
            b,
            scope,
        });
        debug!(%kind, %a, %b, configuration, "constraint created");
        Ok(ConstraintRef(id))
    }
}

impl CadHost for MemoryHost {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn document_info(&self) -> HostResult<DocumentInfo> {
        let doc = self.document()?;
        Ok(DocumentInfo {
            title: doc.title.clone(),
            kind: doc.kind,
            active_configuration: doc.active_configuration.clone(),
            configurations: doc.configurations.clone(),
        })
    }

    fn components(&self) -> HostResult<Vec<ComponentInfo>> {
        Ok(self
            .document()?
            .components
            .iter()
            .map(|c| ComponentInfo {
                handle: c.handle(),
                name: c.decorated_name(),
                visible: c.visible,
            })
            .collect())
    }

    fn insert_component_at_origin(
        &mut self,
        session: &mut Session,
        template: &Path,
    ) -> HostResult<ComponentHandle> {
        let frame_name = self.template_frame_name.clone();
        let doc = self.doc_for(HostOp::Insert)?;
        if !session.is_editing_assembly() {
            return Err(HostError::EditContext(
                "cannot insert while editing a component".to_string(),
            ));
        }
        if !template.is_file() {
            return Err(HostError::TemplateMissing(template.to_path_buf()));
        }

        let name = template
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Part")
            .to_string();
        let instance = next_instance(&doc.components, &name, None);
        let id = doc.allocate_id();
        let frame_id = doc.allocate_id();
        doc.components.push(ComponentRecord {
            id,
            name,
            instance,
            template: template.to_path_buf(),
            is_virtual: false,
            fixed: true,
            visible: true,
            color: None,
            placement: Placement::default(),
            local_frames: vec![LocalFrameRecord {
                id: frame_id,
                name: frame_name,
                origin: Position::ORIGIN,
                orientation: Orientation::ZERO,
            }],
        });
        session.clear_selection();
        Ok(ComponentHandle(id))
    }

    fn make_virtual(&mut self, _session: &mut Session, handle: ComponentHandle) -> HostResult<bool> {
        if !self.capabilities.make_virtual {
            return Err(HostError::Unsupported("make_virtual"));
        }
        let component = self.doc_for(HostOp::MakeVirtual)?.component_mut(handle)?;
        let changed = !component.is_virtual;
        component.is_virtual = true;
        Ok(changed)
    }

    fn rename_component(
        &mut self,
        _session: &mut Session,
        handle: ComponentHandle,
        name: &str,
    ) -> HostResult<()> {
        let doc = self.doc_for(HostOp::Rename)?;
        if name.trim().is_empty() {
            return Err(HostError::Failed {
                operation: HostOp::Rename.as_str(),
                message: "empty name".to_string(),
            });
        }
        if doc
            .components
            .iter()
            .any(|c| c.id != handle.0 && c.name == name)
        {
            return Err(HostError::DuplicateName(name.to_string()));
        }
        let instance = next_instance(&doc.components, name, Some(handle));
        let component = doc.component_mut(handle)?;
        component.name = name.to_string();
        component.instance = instance;
        Ok(())
    }

    fn release_constraint(&mut self, _session: &mut Session, handle: ComponentHandle) -> HostResult<()> {
        self.doc_for(HostOp::Release)?.component_mut(handle)?.fixed = false;
        Ok(())
    }

    fn enter_edit_context(&mut self, session: &mut Session, handle: ComponentHandle) -> HostResult<()> {
        let doc = self.doc_for(HostOp::EnterEdit)?;
        if !session.is_editing_assembly() {
            return Err(HostError::EditContext(
                "already editing a component".to_string(),
            ));
        }
        if doc.component(handle).is_none() {
            return Err(HostError::UnknownEntity(handle.to_string()));
        }
        session.set_edit_context(EditContext::Component(handle));
        Ok(())
    }

    fn exit_edit_context(&mut self, session: &mut Session) -> HostResult<()> {
        self.faults.check(HostOp::ExitEdit)?;
        session.set_edit_context(EditContext::Assembly);
        Ok(())
    }

    fn find_local_frame(
        &self,
        _session: &Session,
        handle: ComponentHandle,
        name: &str,
    ) -> HostResult<Option<FrameRef>> {
        self.faults.check(HostOp::FindLocalFrame)?;
        let component = self
            .document()?
            .component(handle)
            .ok_or_else(|| HostError::UnknownEntity(handle.to_string()))?;
        Ok(component
            .local_frames
            .iter()
            .find(|f| f.name == name)
            .map(|f| FrameRef(f.id)))
    }

    fn local_frames(&self, _session: &Session, handle: ComponentHandle) -> HostResult<Vec<NamedFrame>> {
        self.faults.check(HostOp::FindLocalFrame)?;
        let component = self
            .document()?
            .component(handle)
            .ok_or_else(|| HostError::UnknownEntity(handle.to_string()))?;
        Ok(component
            .local_frames
            .iter()
            .map(|f| NamedFrame {
                frame: FrameRef(f.id),
                name: f.name.clone(),
            })
            .collect())
    }

    fn rename_frame(&mut self, session: &mut Session, frame: FrameRef, name: &str) -> HostResult<()> {
        let doc = self.doc_for(HostOp::RenameFrame)?;
        if let Some(owner) = doc.local_frame_owner(frame) {
            if session.edit_context() != EditContext::Component(owner) {
                return Err(HostError::EditContext(format!(
                    "renaming a frame of {} requires editing it",
                    owner
                )));
            }
            let component = doc.component_mut(owner)?;
            if let Some(local) = component.local_frames.iter_mut().find(|f| f.id == frame.0) {
                local.name = name.to_string();
            }
            return Ok(());
        }

        if doc.frames.iter().any(|f| f.id != frame.0 && f.name == name) {
            return Err(HostError::DuplicateName(name.to_string()));
        }
        let record = doc
            .frames
            .iter_mut()
            .find(|f| f.id == frame.0)
            .ok_or_else(|| HostError::UnknownEntity(frame.to_string()))?;
        record.name = name.to_string();
        Ok(())
    }

    fn set_frame_rotation(
        &mut self,
        session: &mut Session,
        frame: FrameRef,
        angles: Orientation,
    ) -> HostResult<()> {
        let doc = self.doc_for(HostOp::SetFrameRotation)?;
        let owner = doc
            .local_frame_owner(frame)
            .ok_or_else(|| HostError::UnknownEntity(frame.to_string()))?;
        if session.edit_context() != EditContext::Component(owner) {
            return Err(HostError::EditContext(format!(
                "rotating a frame of {} requires editing it",
                owner
            )));
        }
        let component = doc.component_mut(owner)?;
        if let Some(local) = component.local_frames.iter_mut().find(|f| f.id == frame.0) {
            local.orientation = angles;
        }
        Ok(())
    }

    fn set_color(&mut self, _session: &mut Session, handle: ComponentHandle, rgb: Rgb) -> HostResult<()> {
        if !self.capabilities.colors {
            return Err(HostError::Unsupported("set_color"));
        }
        self.doc_for(HostOp::SetColor)?.component_mut(handle)?.color = Some(rgb);
        Ok(())
    }

    fn set_visibility(
        &mut self,
        _session: &mut Session,
        handle: ComponentHandle,
        visible: bool,
    ) -> HostResult<()> {
        if !self.capabilities.visibility {
            return Err(HostError::Unsupported("set_visibility"));
        }
        self.doc_for(HostOp::SetVisibility)?.component_mut(handle)?.visible = visible;
        Ok(())
    }

    fn set_feature_visibility(
        &mut self,
        _session: &mut Session,
        feature: FeatureRef,
        visible: bool,
    ) -> HostResult<()> {
        if !self.capabilities.visibility {
            return Err(HostError::Unsupported("set_visibility"));
        }
        let doc = self.doc_for(HostOp::SetVisibility)?;
        match feature {
            FeatureRef::Frame(frame) => {
                let record = doc
                    .frames
                    .iter_mut()
                    .find(|f| f.id == frame.0)
                    .ok_or_else(|| HostError::UnknownEntity(frame.to_string()))?;
                record.visible = visible;
            }
            FeatureRef::Folder(folder) => {
                let record = doc.folder_mut(folder)?;
                record.visible = visible;
                let members = record.members.clone();
                for member in members {
                    match member {
                        EntityRef::Component { handle } => {
                            if let Ok(c) = doc.component_mut(handle) {
                                c.visible = visible;
                            }
                        }
                        EntityRef::Frame { frame } => {
                            if let Some(f) = doc.frames.iter_mut().find(|f| f.id == frame.0) {
                                f.visible = visible;
                            }
                        }
                        EntityRef::LocalFrame { .. } | EntityRef::Folder { .. } => {}
                    }
                }
            }
            FeatureRef::Constraint(_) => return Err(HostError::Unsupported("constraint visibility")),
        }
        Ok(())
    }

    fn select_by_name(
        &mut self,
        session: &mut Session,
        name: &str,
        kind: EntityKind,
        append: bool,
    ) -> HostResult<bool> {
        let doc = self.doc_for(HostOp::Select)?;
        let entity = match kind {
            EntityKind::Component => doc
                .component_by_name(name)
                .map(|c| EntityRef::Component { handle: c.handle() }),
            EntityKind::Frame => doc.frame_by_name(name).map(|f| EntityRef::Frame {
                frame: FrameRef(f.id),
            }),
            EntityKind::Folder => doc.folder_by_name(name).map(|f| EntityRef::Folder {
                folder: FolderRef(f.id),
            }),
        };
        match entity {
            Some(entity) => {
                session.select(entity, append);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn select_entity(&mut self, session: &mut Session, entity: EntityRef, append: bool) -> HostResult<()> {
        let doc = self.doc_for(HostOp::Select)?;
        if !doc.entity_exists(&entity) {
            return Err(HostError::UnknownEntity(entity.to_string()));
        }
        session.select(entity, append);
        Ok(())
    }

    fn create_container(&mut self, session: &mut Session, name: &str) -> HostResult<FolderRef> {
        if !self.capabilities.folders {
            return Err(HostError::Unsupported("create_container"));
        }
        let doc = self.doc_for(HostOp::CreateContainer)?;
        if session.selection().is_empty() {
            return Err(HostError::Failed {
                operation: HostOp::CreateContainer.as_str(),
                message: "nothing selected".to_string(),
            });
        }
        if doc.folder_by_name(name).is_some() {
            return Err(HostError::DuplicateName(name.to_string()));
        }
        let members = session.take_selection();
        doc.detach_from_folders(&members);
        let id = doc.allocate_id();
        doc.folders.push(FolderRecord {
            id,
            name: name.to_string(),
            members,
            scope: None,
            visible: true,
        });
        Ok(FolderRef(id))
    }

    fn add_to_container(&mut self, session: &mut Session, folder: FolderRef) -> HostResult<()> {
        if !self.capabilities.folders {
            return Err(HostError::Unsupported("add_to_container"));
        }
        let doc = self.doc_for(HostOp::CreateContainer)?;
        let members = session.take_selection();
        doc.detach_from_folders(&members);
        doc.folder_mut(folder)?.members.extend(members);
        Ok(())
    }

    fn find_container(&self, name: &str) -> HostResult<Option<FolderRef>> {
        Ok(self.document()?.folder_by_name(name).map(|f| FolderRef(f.id)))
    }

    fn container_members(&self, folder: FolderRef) -> HostResult<Vec<EntityRef>> {
        self.document()?
            .folders
            .iter()
            .find(|f| f.id == folder.0)
            .map(|f| f.members.clone())
            .ok_or_else(|| HostError::UnknownEntity(folder.to_string()))
    }

    fn containers(&self) -> HostResult<Vec<NamedFolder>> {
        Ok(self
            .document()?
            .folders
            .iter()
            .map(|f| NamedFolder {
                folder: FolderRef(f.id),
                name: f.name.clone(),
            })
            .collect())
    }

    fn find_frame(&self, name: &str) -> HostResult<Option<FrameRef>> {
        Ok(self.document()?.frame_by_name(name).map(|f| FrameRef(f.id)))
    }

    fn create_frame(
        &mut self,
        _session: &mut Session,
        name: &str,
        position: Position,
        angles: Orientation,
    ) -> HostResult<FrameRef> {
        let doc = self.doc_for(HostOp::CreateFrame)?;
        if doc.frame_by_name(name).is_some() {
            return Err(HostError::DuplicateName(name.to_string()));
        }
        let id = doc.allocate_id();
        doc.frames.push(FrameRecord {
            id,
            name: name.to_string(),
            position,
            orientation: angles,
            reference: None,
            scope: None,
            visible: true,
        });
        Ok(FrameRef(id))
    }

    fn update_frame(
        &mut self,
        _session: &mut Session,
        frame: FrameRef,
        position: Position,
        angles: Orientation,
    ) -> HostResult<()> {
        let doc = self.doc_for(HostOp::UpdateFrame)?;
        let record = doc
            .frames
            .iter_mut()
            .find(|f| f.id == frame.0)
            .ok_or_else(|| HostError::UnknownEntity(frame.to_string()))?;
        record.reference = None;
        record.position = position;
        record.orientation = angles;
        Ok(())
    }

    fn find_constraint(
        &self,
        kind: ConstraintKind,
        a: EntityRef,
        b: EntityRef,
    ) -> HostResult<Option<ConstraintRef>> {
        Ok(self
            .document()?
            .constraints
            .iter()
            .find(|c| c.kind == kind && c.connects(a, b))
            .map(|c| ConstraintRef(c.id)))
    }

    fn constraints_on(&self, entity: EntityRef) -> HostResult<Vec<ConstraintRef>> {
        Ok(self
            .document()?
            .constraints
            .iter()
            .filter(|c| c.a == entity || c.b == entity)
            .map(|c| ConstraintRef(c.id))
            .collect())
    }

    fn delete_feature(&mut self, session: &mut Session, feature: FeatureRef) -> HostResult<()> {
        let doc = self.doc_for(HostOp::Delete)?;
        match feature {
            FeatureRef::Frame(frame) => {
                let index = doc
                    .frames
                    .iter()
                    .position(|f| f.id == frame.0)
                    .ok_or_else(|| HostError::UnknownEntity(frame.to_string()))?;
                doc.frames.remove(index);
                let entity = EntityRef::Frame { frame };
                doc.constraints.retain(|c| c.a != entity && c.b != entity);
                doc.detach_from_folders(&[entity]);
            }
            FeatureRef::Constraint(constraint) => {
                let index = doc
                    .constraints
                    .iter()
                    .position(|c| c.id == constraint.0)
                    .ok_or_else(|| HostError::UnknownEntity(constraint.to_string()))?;
                doc.constraints.remove(index);
            }
            FeatureRef::Folder(folder) => {
                let index = doc
                    .folders
                    .iter()
                    .position(|f| f.id == folder.0)
                    .ok_or_else(|| HostError::UnknownEntity(folder.to_string()))?;
                doc.folders.remove(index);
                doc.detach_from_folders(&[EntityRef::Folder { folder }]);
            }
        }
        session.clear_selection();
        debug!(?feature, "feature deleted");
        Ok(())
    }

    fn create_coincident_constraint(
        &mut self,
        _session: &mut Session,
        a: EntityRef,
        b: EntityRef,
        configuration: &str,
    ) -> HostResult<ConstraintRef> {
        self.create_constraint(ConstraintKind::Coincident, a, b, configuration)
    }

    fn create_alignment_constraint(
        &mut self,
        _session: &mut Session,
        a: EntityRef,
        b: EntityRef,
        configuration: &str,
    ) -> HostResult<ConstraintRef> {
        if !self.capabilities.alignment_constraints {
            return Err(HostError::Unsupported("create_alignment_constraint"));
        }
        self.create_constraint(ConstraintKind::Aligned, a, b, configuration)
    }

    fn set_configuration_scope(
        &mut self,
        _session: &mut Session,
        feature: FeatureRef,
        configuration: &str,
    ) -> HostResult<()> {
        if !self.capabilities.configuration_scope {
            return Err(HostError::Unsupported("set_configuration_scope"));
        }
        let doc = self.doc_for(HostOp::ConfigurationScope)?;
        doc.require_configuration(configuration)?;
        let scope = Some(configuration.to_string());
        match feature {
            FeatureRef::Frame(frame) => {
                doc.frames
                    .iter_mut()
                    .find(|f| f.id == frame.0)
                    .ok_or_else(|| HostError::UnknownEntity(frame.to_string()))?
                    .scope = scope;
            }
            FeatureRef::Constraint(constraint) => {
                doc.constraints
                    .iter_mut()
                    .find(|c| c.id == constraint.0)
                    .ok_or_else(|| HostError::UnknownEntity(constraint.to_string()))?
                    .scope = scope;
            }
            FeatureRef::Folder(folder) => doc.folder_mut(folder)?.scope = scope,
        }
        Ok(())
    }

    fn rebuild(&mut self, _session: &mut Session) -> HostResult<()> {
        let doc = self.doc_for(HostOp::Rebuild)?;
        doc.solve();
        doc.rebuilds += 1;
        debug!(rebuilds = doc.rebuilds, "document rebuilt");
        Ok(())
    }
}

/// Next free instance number for `name`, ignoring `except`
fn next_instance(components: &[ComponentRecord], name: &str, except: Option<ComponentHandle>) -> u32 {
    components
        .iter()
        .filter(|c| Some(c.handle()) != except && c.name == name)
        .map(|c| c.instance)
        .max()
        .unwrap_or(0)
        + 1
}
