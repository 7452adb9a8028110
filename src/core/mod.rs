//! Core module - hardpoint data, naming rules and shared utilities

pub mod color;
pub mod config;
pub mod extract;
pub mod hardpoint;
pub mod naming;
pub mod progress;
pub mod suspension;
pub mod wheel;

pub use color::{color_for, Rgb};
pub use config::{Config, ConfigError};
pub use extract::{DataWarning, Extraction};
pub use hardpoint::{HardpointSpec, Orientation, Position, Suffix};
pub use naming::{find_match, normalize, MatchTier, NameMatch};
pub use progress::{ProgressEvent, ProgressReporter, Stage};
pub use suspension::{LoadError, SuspensionSet};
pub use wheel::WheelGeometryParams;
