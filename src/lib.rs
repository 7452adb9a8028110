//! HPT: Hardpoint Toolkit
//!
//! Turns suspension hardpoint JSON files into positioned, colored marker
//! components in a CAD assembly, binds them to named poses, and manages
//! marker visibility.

pub mod cad;
pub mod cli;
pub mod core;
pub mod pipeline;
