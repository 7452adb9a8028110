//! Explicit host session state

use super::{ComponentHandle, EntityRef};

/// Which part of the document edits apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditContext {
    #[default]
    Assembly,
    /// Editing one component in place
    Component(ComponentHandle),
}

/// Selection and edit context shared between a caller and a host
///
/// Hosts update this as a side effect of the calls documented on
/// [`super::CadHost`]; callers read it to check where they are.
#[derive(Debug, Clone, Default)]
pub struct Session {
    selection: Vec<EntityRef>,
    edit_context: EditContext,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session a host kept between clients
    pub fn restore(selection: Vec<EntityRef>, edit_context: EditContext) -> Self {
        Self {
            selection,
            edit_context,
        }
    }

    pub fn selection(&self) -> &[EntityRef] {
        &self.selection
    }

    /// Add to or replace the selection; duplicates are ignored
    pub fn select(&mut self, entity: EntityRef, append: bool) {
        if !append {
            self.selection.clear();
        }
        if !self.selection.contains(&entity) {
            self.selection.push(entity);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Take the selection, leaving it empty
    pub fn take_selection(&mut self) -> Vec<EntityRef> {
        std::mem::take(&mut self.selection)
    }

    pub fn edit_context(&self) -> EditContext {
        self.edit_context
    }

    pub fn is_editing_assembly(&self) -> bool {
        self.edit_context == EditContext::Assembly
    }

    pub(crate) fn set_edit_context(&mut self, context: EditContext) {
        self.edit_context = context;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(id: u64) -> EntityRef {
        EntityRef::Component {
            handle: ComponentHandle(id),
        }
    }

    #[test]
    fn test_select_append_and_replace() {
        let mut session = Session::new();
        session.select(component(1), true);
        session.select(component(2), true);
        session.select(component(2), true);
        assert_eq!(session.selection().len(), 2);

        session.select(component(3), false);
        assert_eq!(session.selection(), &[component(3)]);
    }

    #[test]
    fn test_take_selection_empties_it() {
        let mut session = Session::new();
        session.select(component(1), false);
        let taken = session.take_selection();
        assert_eq!(taken.len(), 1);
        assert!(session.selection().is_empty());
        assert!(session.is_editing_assembly());
    }
}
