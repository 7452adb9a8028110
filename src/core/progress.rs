//! Line-oriented progress stream
//!
//! Long runs report `STATE:<name>`, `TOTAL:<n>` and `PROGRESS:<n>` lines so an
//! external driver can show a progress bar. The same events are kept in
//! memory for callers that want to inspect them afterwards.

use std::io::Write;
use tracing::debug;

/// Named phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initializing,
    LoadingJson,
    LoadingMarkerPart,
    InsertingBodies,
    CreatingHardpointsFolder,
    CreatingCoordinateSystems,
    CreatingTransforms,
    CreatingTransformsFolder,
    UpdatingVisibility,
    Rebuilding,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing",
            Stage::LoadingJson => "LoadingJson",
            Stage::LoadingMarkerPart => "LoadingMarkerPart",
            Stage::InsertingBodies => "InsertingBodies",
            Stage::CreatingHardpointsFolder => "CreatingHardpointsFolder",
            Stage::CreatingCoordinateSystems => "CreatingCoordinateSystems",
            Stage::CreatingTransforms => "CreatingTransforms",
            Stage::CreatingTransformsFolder => "CreatingTransformsFolder",
            Stage::UpdatingVisibility => "UpdatingVisibility",
            Stage::Rebuilding => "Rebuilding",
            Stage::Complete => "Complete",
        }
    }

    /// Human-readable description for driver UIs
    pub fn describe(name: &str) -> &str {
        match name {
            "Initializing" => "Starting...",
            "LoadingJson" => "Loading JSON data...",
            "LoadingMarkerPart" => "Loading marker part...",
            "InsertingBodies" => "Inserting marker bodies...",
            "CreatingHardpointsFolder" => "Creating Hardpoints folder...",
            "CreatingCoordinateSystems" => "Creating coordinate systems...",
            "CreatingTransforms" => "Creating transform features...",
            "CreatingTransformsFolder" => "Creating Transforms folder...",
            "UpdatingVisibility" => "Updating visibility...",
            "Rebuilding" => "Rebuilding model...",
            "Complete" => "Complete",
            other => other,
        }
    }
}

/// One line of the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    State(String),
    Total(u64),
    Progress(u64),
}

impl ProgressEvent {
    /// Parse a stream line; anything else (log output) yields `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("STATE:") {
            return Some(ProgressEvent::State(rest.trim().to_string()));
        }
        if let Some(rest) = line.strip_prefix("TOTAL:") {
            return rest.trim().parse().ok().map(ProgressEvent::Total);
        }
        if let Some(rest) = line.strip_prefix("PROGRESS:") {
            return rest.trim().parse().ok().map(ProgressEvent::Progress);
        }
        None
    }
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressEvent::State(s) => write!(f, "STATE:{}", s),
            ProgressEvent::Total(n) => write!(f, "TOTAL:{}", n),
            ProgressEvent::Progress(n) => write!(f, "PROGRESS:{}", n),
        }
    }
}

/// Emits the progress stream and counts units
pub struct ProgressReporter {
    out: Option<Box<dyn Write>>,
    events: Vec<ProgressEvent>,
    total: u64,
    current: u64,
}

impl ProgressReporter {
    /// Report to a writer (normally stdout)
    pub fn new(out: impl Write + 'static) -> Self {
        Self {
            out: Some(Box::new(out)),
            events: Vec::new(),
            total: 0,
            current: 0,
        }
    }

    /// Record events without writing them anywhere
    pub fn silent() -> Self {
        Self {
            out: None,
            events: Vec::new(),
            total: 0,
            current: 0,
        }
    }

    pub fn stage(&mut self, stage: Stage) {
        debug!(stage = stage.as_str(), "{}", Stage::describe(stage.as_str()));
        self.emit(ProgressEvent::State(stage.as_str().to_string()));
    }

    /// Announce the unit count and restart the counter
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
        self.current = 0;
        self.emit(ProgressEvent::Total(total));
    }

    /// One unit done
    pub fn advance(&mut self) {
        self.current += 1;
        let current = self.current;
        self.emit(ProgressEvent::Progress(current));
    }

    /// Several units done, reported one line each
    pub fn advance_by(&mut self, units: u64) {
        for _ in 0..units {
            self.advance();
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    /// Number of `PROGRESS` lines emitted since the last `TOTAL`
    pub fn units_reported(&self) -> u64 {
        let start = self
            .events
            .iter()
            .rposition(|e| matches!(e, ProgressEvent::Total(_)))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.events[start..]
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Progress(_)))
            .count() as u64
    }

    fn emit(&mut self, event: ProgressEvent) {
        if let Some(out) = self.out.as_mut() {
            let written = writeln!(out, "{}", event).and_then(|_| out.flush());
            if let Err(e) = written {
                debug!(error = %e, "progress stream write failed");
            }
        }
        self.events.push(event);
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("total", &self.total)
            .field("current", &self.current)
            .field("events", &self.events.len())
            .finish()
    }
}
