//! Saved visibility profiles
//!
//! A profile is a JSON file `<profiles dir>/<name>.json`:
//!
//! ```json
//! {
//!   "name": "Front only",
//!   "settings": {
//!     "suspension": { "front": true, "rear": false },
//!     "categories": { "TIEPNT": false }
//!   },
//!   "created": "2024-05-01T10:00:00Z"
//! }
//! ```
//!
//! Applying a profile runs the suspension targets first, then each category
//! as a substring selector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use super::visibility::{apply_visibility, Target, VisibilityOutcome};
use super::PipelineError;
use crate::cad::{CadHost, Session};
use crate::core::progress::ProgressReporter;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Invalid profile name '{0}'")]
    InvalidName(String),

    #[error("Profile '{profile}' has an unknown target '{target}'")]
    UnknownTarget { profile: String, target: String },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid profile {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Keyword targets (`front`, `wheels`, ...) and whether to show them
    #[serde(default)]
    pub suspension: BTreeMap<String, bool>,
    /// Name fragments and whether to show matching markers
    #[serde(default)]
    pub categories: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityProfile {
    pub name: String,
    pub settings: ProfileSettings,
    pub created: DateTime<Utc>,
}

impl VisibilityProfile {
    pub fn new(name: impl Into<String>, settings: ProfileSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            created: Utc::now(),
        }
    }

    /// Suspension targets must all be known keywords
    pub fn validate(&self) -> Result<(), ProfileError> {
        for key in self.settings.suspension.keys() {
            if key.parse::<Target>().is_err() {
                return Err(ProfileError::UnknownTarget {
                    profile: self.name.clone(),
                    target: key.clone(),
                });
            }
        }
        Ok(())
    }

    /// Apply every setting in order
    pub fn apply<H: CadHost + ?Sized>(
        &self,
        host: &mut H,
        session: &mut Session,
        progress: &mut ProgressReporter,
    ) -> Result<VisibilityOutcome, PipelineError> {
        let mut total = VisibilityOutcome::default();
        for (key, visible) in &self.settings.suspension {
            let target = key.parse::<Target>()?;
            total.absorb(apply_visibility(host, session, &target, *visible, progress)?);
        }
        for (text, visible) in &self.settings.categories {
            let target = Target::Substring(text.clone());
            total.absorb(apply_visibility(host, session, &target, *visible, progress)?);
        }
        Ok(total)
    }
}

/// Listing entry
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub name: String,
    pub path: PathBuf,
    pub created: Option<DateTime<Utc>>,
    pub settings: usize,
}

/// Profiles stored as JSON files in one directory
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, ProfileError> {
        let trimmed = name.trim();
        let bad = trimmed.is_empty()
            || trimmed.starts_with('.')
            || trimmed.contains(['/', '\\', '<', '>', ':', '"', '|', '?', '*']);
        if bad {
            return Err(ProfileError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", trimmed)))
    }

    /// Write a profile, replacing one with the same name
    pub fn save(&self, profile: &VisibilityProfile) -> Result<PathBuf, ProfileError> {
        profile.validate()?;
        let path = self.path_for(&profile.name)?;
        fs::create_dir_all(&self.dir).map_err(|source| ProfileError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let json = serde_json::to_string_pretty(profile).map_err(|source| ProfileError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "profile saved");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<VisibilityProfile, ProfileError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(ProfileError::NotFound(name.to_string()));
        }
        Self::read(&path)
    }

    fn read(path: &Path) -> Result<VisibilityProfile, ProfileError> {
        let content = fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ProfileError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All readable profiles, sorted by name; unreadable files are skipped
    pub fn list(&self) -> Vec<ProfileSummary> {
        if !self.dir.exists() {
            return Vec::new();
        }
        let mut summaries: Vec<ProfileSummary> = WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|e| match Self::read(e.path()) {
                Ok(profile) => Some(ProfileSummary {
                    settings: profile.settings.suspension.len() + profile.settings.categories.len(),
                    name: profile.name,
                    path: e.path().to_path_buf(),
                    created: Some(profile.created),
                }),
                Err(err) => {
                    debug!(path = %e.path().display(), error = %err, "skipping unreadable profile");
                    None
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        summaries
    }
}
