//! CLI command implementations

pub mod colors;
pub mod completions;
pub mod doc;
pub mod hardpoints;
pub mod profile;
pub mod release;
pub mod vis;
