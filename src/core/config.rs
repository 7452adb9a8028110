//! Layered configuration
//!
//! Precedence, lowest first: built-in defaults, the user config file
//! (`<config dir>/hpt/config.yaml`), the project file (`./hpt.yaml` or the
//! path given with `--config`), then `HPT_*` environment variables. CLI flags
//! are applied last by the commands themselves.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Project-level config file name
pub const PROJECT_FILE: &str = "hpt.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {message}")]
    Parse { path: String, message: String },
}

/// Effective configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Marker template part inserted for every hardpoint
    pub template: Option<PathBuf>,

    /// Accepted template file extensions (case-insensitive, no dot)
    pub template_extensions: Vec<String>,

    /// Folder grouping the inserted markers
    pub hardpoints_folder: String,

    /// Name of the coordinate frame inside the marker template
    pub local_frame_name: String,

    /// Rename and rotate each marker's local frame during insertion
    pub orient_local_frames: bool,

    /// Detach inserted markers from the template file
    pub make_virtual: bool,

    /// Assembly document to operate on
    pub document: Option<PathBuf>,

    /// Where visibility profiles are stored
    pub profiles_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template: None,
            template_extensions: vec!["sldprt".to_string()],
            hardpoints_folder: "Hardpoints".to_string(),
            local_frame_name: "Coordinate System1".to_string(),
            orient_local_frames: true,
            make_virtual: true,
            document: None,
            profiles_dir: None,
        }
    }
}

/// One config file; every key optional, unknown keys rejected
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigLayer {
    template: Option<PathBuf>,
    template_extensions: Option<Vec<String>>,
    hardpoints_folder: Option<String>,
    local_frame_name: Option<String>,
    orient_local_frames: Option<bool>,
    make_virtual: Option<bool>,
    document: Option<PathBuf>,
    profiles_dir: Option<PathBuf>,
}

impl Config {
    /// Load all layers
    ///
    /// `explicit` replaces the project file lookup and must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(user) = Self::user_config_path() {
            if user.exists() {
                config.merge_file(&user)?;
            }
        }

        match explicit {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => config.merge_file(path)?,
            None => {
                let project = Path::new(PROJECT_FILE);
                if project.exists() {
                    config.merge_file(project)?;
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// `<config dir>/hpt/config.yaml` for the current user
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hpt").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Parse one YAML layer on top of `self`
    pub fn merge_yaml(&mut self, content: &str, filename: &str) -> Result<(), ConfigError> {
        let layer: ConfigLayer = serde_yml::from_str(content).map_err(|e| ConfigError::Parse {
            path: filename.to_string(),
            message: e.to_string(),
        })?;
        self.merge(layer);
        Ok(())
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        debug!(path = %path.display(), "loading config layer");
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_yaml(&content, &path.display().to_string())
    }

    fn merge(&mut self, layer: ConfigLayer) {
        if layer.template.is_some() {
            self.template = layer.template;
        }
        if let Some(v) = layer.template_extensions {
            self.template_extensions = v;
        }
        if let Some(v) = layer.hardpoints_folder {
            self.hardpoints_folder = v;
        }
        if let Some(v) = layer.local_frame_name {
            self.local_frame_name = v;
        }
        if let Some(v) = layer.orient_local_frames {
            self.orient_local_frames = v;
        }
        if let Some(v) = layer.make_virtual {
            self.make_virtual = v;
        }
        if layer.document.is_some() {
            self.document = layer.document;
        }
        if layer.profiles_dir.is_some() {
            self.profiles_dir = layer.profiles_dir;
        }
    }

    /// Apply `HPT_TEMPLATE`, `HPT_DOCUMENT` and `HPT_PROFILES_DIR`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("HPT_TEMPLATE") {
            self.template = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("HPT_DOCUMENT") {
            self.document = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("HPT_PROFILES_DIR") {
            self.profiles_dir = Some(PathBuf::from(v));
        }
    }

    /// Whether `path` has one of the accepted template extensions
    pub fn accepts_template(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.template_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Profiles directory, defaulting to the user data dir
    pub fn profiles_dir(&self) -> PathBuf {
        if let Some(dir) = &self.profiles_dir {
            return dir.clone();
        }
        ProjectDirs::from("", "", "hpt")
            .map(|dirs| dirs.data_dir().join("profiles"))
            .unwrap_or_else(|| PathBuf::from("visualization_profiles"))
    }
}
