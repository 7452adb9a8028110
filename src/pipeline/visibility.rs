//! Show/hide markers by selector

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::{check_assembly, PipelineError};
use crate::cad::{CadHost, FeatureRef, Session};
use crate::core::hardpoint::{is_wheel_name, Suffix};
use crate::core::naming::normalize;
use crate::core::progress::{ProgressReporter, Stage};

/// Which markers a visibility change applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Front,
    Rear,
    Wheels,
    FrontWheels,
    RearWheels,
    Chassis,
    /// Hardpoint markers that are neither chassis points nor wheels
    NonChassis,
    /// Case-insensitive substring of the normalized name
    Substring(String),
    /// Normalized name equality
    Name(String),
    /// One assembly frame or folder, by exact name
    Feature(String),
}

impl Target {
    /// Build from a target keyword and its optional filter value
    pub fn parse(kind: &str, filter: Option<&str>) -> Result<Self, PipelineError> {
        let needs_filter = |make: fn(String) -> Target| match filter.map(str::trim) {
            Some(f) if !f.is_empty() => Ok(make(f.to_string())),
            _ => Err(PipelineError::MissingFilter(kind.to_string())),
        };
        match kind.to_lowercase().as_str() {
            "all" => Ok(Target::All),
            "front" => Ok(Target::Front),
            "rear" => Ok(Target::Rear),
            "wheels" => Ok(Target::Wheels),
            "frontwheels" => Ok(Target::FrontWheels),
            "rearwheels" => Ok(Target::RearWheels),
            "chassis" => Ok(Target::Chassis),
            "nonchassis" => Ok(Target::NonChassis),
            "substring" => needs_filter(Target::Substring),
            "name" => needs_filter(Target::Name),
            "feature" => needs_filter(Target::Feature),
            _ => Err(PipelineError::UnknownTarget(kind.to_string())),
        }
    }

    /// Whether a normalized component name is selected
    pub fn matches(&self, normalized: &str) -> bool {
        let upper = normalized.to_uppercase();
        let front = upper.ends_with(Suffix::Front.as_str());
        let rear = upper.ends_with(Suffix::Rear.as_str());
        let wheel = is_wheel_name(normalized);
        let chassis = upper.contains("CHAS_");
        match self {
            Target::All => true,
            Target::Front => front,
            Target::Rear => rear,
            Target::Wheels => wheel,
            Target::FrontWheels => wheel && front,
            Target::RearWheels => wheel && rear,
            Target::Chassis => chassis,
            Target::NonChassis => (front || rear) && !chassis && !wheel,
            Target::Substring(text) => upper.contains(&text.to_uppercase()),
            Target::Name(name) => normalized == normalize(name),
            Target::Feature(_) => false,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => write!(f, "all"),
            Target::Front => write!(f, "front"),
            Target::Rear => write!(f, "rear"),
            Target::Wheels => write!(f, "wheels"),
            Target::FrontWheels => write!(f, "frontwheels"),
            Target::RearWheels => write!(f, "rearwheels"),
            Target::Chassis => write!(f, "chassis"),
            Target::NonChassis => write!(f, "nonchassis"),
            Target::Substring(text) => write!(f, "substring {}", text),
            Target::Name(name) => write!(f, "name {}", name),
            Target::Feature(name) => write!(f, "feature {}", name),
        }
    }
}

/// Keyword targets only (`all`, `front`, ...), as stored in profiles
impl FromStr for Target {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s, None)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VisibilityOutcome {
    pub matched: usize,
    pub changed: usize,
    pub failed: usize,
}

impl VisibilityOutcome {
    pub fn summary(&self) -> String {
        format!("changed {} components", self.changed)
    }

    pub(crate) fn absorb(&mut self, other: VisibilityOutcome) {
        self.matched += other.matched;
        self.changed += other.changed;
        self.failed += other.failed;
    }
}

/// Show or hide everything `target` selects
pub fn apply_visibility<H: CadHost + ?Sized>(
    host: &mut H,
    session: &mut Session,
    target: &Target,
    visible: bool,
    progress: &mut ProgressReporter,
) -> Result<VisibilityOutcome, PipelineError> {
    check_assembly(host)?;
    progress.stage(Stage::UpdatingVisibility);

    if let Target::Feature(name) = target {
        let feature = match host.find_frame(name)? {
            Some(frame) => FeatureRef::Frame(frame),
            None => match host.find_container(name)? {
                Some(folder) => FeatureRef::Folder(folder),
                None => return Err(PipelineError::FeatureNotFound(name.clone())),
            },
        };
        progress.set_total(1);
        host.set_feature_visibility(session, feature, visible)?;
        progress.advance();
        progress.stage(Stage::Complete);
        return Ok(VisibilityOutcome {
            matched: 1,
            changed: 1,
            failed: 0,
        });
    }

    let selected: Vec<_> = host
        .components()?
        .into_iter()
        .filter(|c| target.matches(&normalize(&c.name)))
        .collect();
    progress.set_total(selected.len() as u64);

    let mut outcome = VisibilityOutcome {
        matched: selected.len(),
        ..Default::default()
    };
    for component in selected {
        if component.visible == visible {
            debug!(component = %component.name, "already in requested state");
        } else {
            match host.set_visibility(session, component.handle, visible) {
                Ok(()) => outcome.changed += 1,
                Err(e) => {
                    warn!(component = %component.name, error = %e, "visibility change failed");
                    outcome.failed += 1;
                }
            }
        }
        progress.advance();
    }
    progress.stage(Stage::Complete);

    info!(selector = %target, visible, "{}", outcome.summary());
    Ok(outcome)
}
