// src/lib.rs

//! Redrive
//!
//! Automatic dependency triage and rebuild loop for sandboxed RPM
//! builds. Redrive runs the sandbox build tool, classifies the failure
//! transcript against an ordered rule set, records the missing
//! build-/run-time requirements and unpackaged files it can infer, and
//! redrives the build until it succeeds or no automatic progress
//! remains.
//!
//! # Architecture
//!
//! - Session-scoped state: counters and requirement sets live on an
//!   explicit `BuildSession`, never in ambient globals
//! - Configuration-driven detection: the failure patterns and lookup
//!   tables are data, not code
//! - Narrow seams: the sandbox process and its transcripts are reached
//!   only through the `ProcessRunner`/`TextSource` traits

pub mod build;
pub mod config;
pub mod detect;
mod error;
pub mod files;
pub mod requirements;
pub mod util;

pub use build::{
    BuildSession, RoundStatus, SessionOutcome, SessionReport, WorkingDirs, SANDBOX_BIN,
};
pub use config::{FailureRule, PkgconfigRule, PlainRule, RebuildConfig};
pub use detect::{Ecosystem, LogScanner};
pub use error::{Error, Result};
pub use files::{FileManager, BANNED_PREFIXES};
pub use requirements::RequirementStore;
pub use util::{FsTextSource, ProcessRunner, SystemRunner, TextSource};
