//! Suspension input set: front, rear and vehicle setup documents

use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::extract::{as_number, extract_into, DataWarning, Extraction};
use crate::core::hardpoint::Suffix;
use crate::core::wheel::extract_wheels_into;

/// Vehicle setup key holding the rear axle's longitudinal position
pub const REFERENCE_DISTANCE: &str = "Reference distance";

/// Errors loading suspension input files
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No suspension file given (use --front and/or --rear)")]
    NoSuspension,

    #[error("'Reference distance' in {0} is not a number")]
    BadReferenceDistance(PathBuf),
}

/// Read and parse one JSON document, keeping key order
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// The parsed documents describing one vehicle
#[derive(Debug, Clone, Default)]
pub struct SuspensionSet {
    pub front: Option<Value>,
    pub rear: Option<Value>,
    /// Rear axle X offset (mm) from the vehicle setup document
    pub reference_distance: f64,
}

impl SuspensionSet {
    /// Load from disk
    ///
    /// At least one of `front` / `rear` is required. Without a vehicle setup
    /// document the rear is placed at X = 0.
    pub fn load(
        front: Option<&Path>,
        rear: Option<&Path>,
        vehicle: Option<&Path>,
    ) -> Result<Self, LoadError> {
        if front.is_none() && rear.is_none() {
            return Err(LoadError::NoSuspension);
        }

        let front = front.map(load_json).transpose()?;
        let rear = rear.map(load_json).transpose()?;

        let reference_distance = match vehicle {
            Some(path) => {
                let setup = load_json(path)?;
                match setup.get(REFERENCE_DISTANCE) {
                    Some(v) => as_number(v)
                        .ok_or_else(|| LoadError::BadReferenceDistance(path.to_path_buf()))?,
                    None => {
                        warn!(file = %path.display(), "no '{}' in vehicle setup, using 0", REFERENCE_DISTANCE);
                        0.0
                    }
                }
            }
            None => {
                if rear.is_some() {
                    warn!("rear suspension given without vehicle setup; rear reference distance is 0");
                }
                0.0
            }
        };
        debug!(reference_distance, "suspension set loaded");

        Ok(Self {
            front,
            rear,
            reference_distance,
        })
    }

    pub fn from_values(front: Option<Value>, rear: Option<Value>, reference_distance: f64) -> Self {
        Self {
            front,
            rear,
            reference_distance,
        }
    }

    /// All hardpoints: front points, front wheels, rear points, rear wheels
    pub fn hardpoints(&self) -> Extraction {
        let mut out = Extraction::new();
        if let Some(front) = &self.front {
            extract_into(front, Suffix::Front, 0.0, &mut out);
            extract_wheels_into(front, Suffix::Front, false, 0.0, &mut out);
        }
        if let Some(rear) = &self.rear {
            extract_into(rear, Suffix::Rear, self.reference_distance, &mut out);
            extract_wheels_into(rear, Suffix::Rear, true, self.reference_distance, &mut out);
        }
        dedupe(out)
    }

    /// Wheel centers only
    pub fn wheel_hardpoints(&self) -> Extraction {
        let mut out = Extraction::new();
        if let Some(front) = &self.front {
            extract_wheels_into(front, Suffix::Front, false, 0.0, &mut out);
        }
        if let Some(rear) = &self.rear {
            extract_wheels_into(rear, Suffix::Rear, true, self.reference_distance, &mut out);
        }
        out
    }
}

/// Keep the first hardpoint of each identity
fn dedupe(extraction: Extraction) -> Extraction {
    let Extraction {
        hardpoints,
        warnings,
    } = extraction;
    let mut out = Extraction {
        hardpoints: Vec::with_capacity(hardpoints.len()),
        warnings,
    };
    let mut seen = HashSet::new();
    for hp in hardpoints {
        let identity = hp.identity();
        if seen.insert(identity.clone()) {
            out.hardpoints.push(hp);
        } else {
            out.warn(DataWarning::DuplicateIdentity { identity });
        }
    }
    out
}
