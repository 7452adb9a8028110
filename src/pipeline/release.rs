//! Recover host command state after an aborted run

use serde::Serialize;
use tracing::info;

use crate::cad::{CadHost, EditContext, HostError, Session};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseOutcome {
    pub exited_edit_context: bool,
    pub cleared_selection: usize,
}

impl ReleaseOutcome {
    pub fn summary(&self) -> String {
        match (self.exited_edit_context, self.cleared_selection) {
            (false, 0) => "nothing to release".to_string(),
            (exited, cleared) => {
                let mut parts = Vec::new();
                if exited {
                    parts.push("left component edit".to_string());
                }
                if cleared > 0 {
                    parts.push(format!("cleared {} selected", cleared));
                }
                parts.join(", ")
            }
        }
    }
}

/// Leave any component edit and drop the selection. Safe to repeat.
pub fn release<H: CadHost + ?Sized>(host: &mut H, session: &mut Session) -> Result<ReleaseOutcome, HostError> {
    let mut outcome = ReleaseOutcome::default();

    if let EditContext::Component(handle) = session.edit_context() {
        host.exit_edit_context(session)?;
        info!(component = %handle, "left component edit");
        outcome.exited_edit_context = true;
    }

    outcome.cleared_selection = session.selection().len();
    host.clear_selection(session);
    Ok(outcome)
}
