//! Shared test helpers for integration tests
//!
//! Every test runs in its own temp directory holding an `hpt.yaml`, a marker
//! template, the suspension fixtures and an empty assembly document.

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use hpt::core::progress::ProgressEvent;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const FRONT_JSON: &str = r#"{
  "A-Arm": {
    "CHAS_LowFor": [100, 200, 50],
    "UPRI_LowPnt": [0, 600, 150]
  },
  "Tie Rod": {
    "CHAS_TiePnt": [50, 250, 120]
  },
  "Wheels": {
    "Half Track": {"left": 600},
    "Tire Diameter": {"left": 500},
    "Lateral Offset": {"left": 0},
    "Vertical Offset": {"left": 0},
    "Longitudinal Offset": {"left": 0},
    "Static Camber": {"left": 0},
    "Static Toe": {"left": 0}
  }
}"#;

pub const REAR_JSON: &str = r#"{
  "Push Pull": {
    "CHAS_Push": [10, 220, 300]
  },
  "Wheels": {
    "Half Track": {"left": 580},
    "Tire Diameter": {"left": 520},
    "Lateral Offset": {"left": 0},
    "Vertical Offset": {"left": 0},
    "Longitudinal Offset": {"left": 0},
    "Static Camber": {"left": -1.5},
    "Static Toe": {"left": 0.1}
  }
}"#;

pub const VEHICLE_JSON: &str = r#"{"Reference distance": -2500}"#;

/// Hardpoints the fixtures produce (front, front wheels, rear, rear wheels)
pub const FIXTURE_HARDPOINTS: usize = 8;

/// Helper to get an hpt command isolated from the caller's environment
pub fn hpt() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("hpt"));
    cmd.env_remove("HPT_DOCUMENT")
        .env_remove("HPT_TEMPLATE")
        .env_remove("HPT_PROFILES_DIR")
        .env_remove("RUST_LOG");
    cmd
}

pub struct Workspace {
    pub tmp: TempDir,
}

impl Workspace {
    pub fn path(&self) -> PathBuf {
        self.tmp.path().to_path_buf()
    }

    pub fn document(&self) -> PathBuf {
        self.tmp.path().join("assembly.json")
    }

    pub fn profiles(&self) -> PathBuf {
        self.tmp.path().join("profiles")
    }

    /// hpt running inside the workspace (picks up its `hpt.yaml`)
    pub fn hpt(&self) -> Command {
        let mut cmd = hpt();
        cmd.current_dir(self.tmp.path())
            .env("XDG_CONFIG_HOME", self.tmp.path().join("xdg-config"))
            .env("XDG_DATA_HOME", self.tmp.path().join("xdg-data"));
        cmd
    }

    /// The persisted document
    pub fn read_document(&self) -> Value {
        let content = fs::read_to_string(self.document()).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    pub fn write_document(&self, doc: &Value) {
        fs::write(self.document(), serde_json::to_string_pretty(doc).unwrap()).unwrap();
    }

    /// `hardpoints add` over the full fixture set
    pub fn insert_all(&self) {
        self.hpt()
            .args(["hardpoints", "add"])
            .args(source_args())
            .arg("--no-progress")
            .assert()
            .success();
    }
}

/// `--front/--rear/--vehicle` for the fixture files
pub fn source_args() -> [&'static str; 6] {
    [
        "--front",
        "front.json",
        "--rear",
        "rear.json",
        "--vehicle",
        "vehicle.json",
    ]
}

/// Fixtures plus config, without a document
pub fn setup_files() -> Workspace {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(root.join("front.json"), FRONT_JSON).unwrap();
    fs::write(root.join("rear.json"), REAR_JSON).unwrap();
    fs::write(root.join("vehicle.json"), VEHICLE_JSON).unwrap();
    fs::write(root.join("marker.SLDPRT"), b"marker").unwrap();
    fs::write(
        root.join("hpt.yaml"),
        "template: marker.SLDPRT\ndocument: assembly.json\nprofiles_dir: profiles\n",
    )
    .unwrap();
    Workspace { tmp }
}

/// Fixtures, config and an empty assembly with two configurations
pub fn setup_workspace() -> Workspace {
    let ws = setup_files();
    ws.hpt()
        .args(["doc", "new", "assembly.json", "-c", "Static", "-c", "Bump"])
        .assert()
        .success();
    ws
}

/// Parse the progress stream out of captured stdout
pub fn progress_events(stdout: &[u8]) -> Vec<ProgressEvent> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter_map(ProgressEvent::parse)
        .collect()
}

/// `(total, progress lines)` for each `TOTAL` segment of the stream
pub fn progress_segments(events: &[ProgressEvent]) -> Vec<(u64, u64)> {
    let mut segments = Vec::new();
    for event in events {
        match event {
            ProgressEvent::Total(n) => segments.push((*n, 0)),
            ProgressEvent::Progress(_) => {
                if let Some(last) = segments.last_mut() {
                    last.1 += 1;
                }
            }
            ProgressEvent::State(_) => {}
        }
    }
    segments
}

/// A component in the persisted document by its decorated name
pub fn component<'a>(doc: &'a Value, decorated: &str) -> Option<&'a Value> {
    doc["components"].as_array()?.iter().find(|c| {
        format!(
            "{}-{}",
            c["name"].as_str().unwrap_or_default(),
            c["instance"]
        ) == decorated
    })
}
