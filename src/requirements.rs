// src/requirements.rs

//! Requirement bookkeeping for one build session
//!
//! Two coordinate sets are tracked: build-time requirements (needed to
//! compile the package) and run-time requirements (needed by the
//! installed package). Membership in one does not imply the other.
//! Insertion is idempotent and reports newness so that callers can count
//! independently discovered facts.

use std::collections::HashSet;
use tracing::debug;

/// Build-time and run-time dependency coordinates discovered so far
///
/// Owned by a single build session; there is no removal, coordinates
/// persist for the session lifetime. No ordering is guaranteed -
/// consumers (manifest generation) sort at render time.
#[derive(Debug, Default)]
pub struct RequirementStore {
    build_requirements: HashSet<String>,
    run_requirements: HashSet<String>,
}

impl RequirementStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a build-time requirement, returning whether it was new
    pub fn add_build_requirement(&mut self, coordinate: &str) -> bool {
        let added = self.build_requirements.insert(coordinate.to_string());
        if added {
            debug!("New build requirement: {}", coordinate);
        }
        added
    }

    /// Add a run-time requirement, returning whether it was new
    pub fn add_run_requirement(&mut self, coordinate: &str) -> bool {
        let added = self.run_requirements.insert(coordinate.to_string());
        if added {
            debug!("New runtime requirement: {}", coordinate);
        }
        added
    }

    /// Add a pkg-config coordinate, with the 32-bit variant when requested
    ///
    /// Both insertions are attempted; the return value reports whether
    /// *any* of them was new, so a detection event counts at most once.
    pub fn add_pkgconfig_requirement(&mut self, package: &str, want_32bit: bool) -> bool {
        let mut added = self.add_build_requirement(&format!("pkgconfig({})", package));
        if want_32bit {
            added |= self.add_build_requirement(&format!("pkgconfig(32{})", package));
        }
        added
    }

    /// The build-time requirement set
    pub fn build_requirements(&self) -> &HashSet<String> {
        &self.build_requirements
    }

    /// The run-time requirement set
    pub fn run_requirements(&self) -> &HashSet<String> {
        &self.run_requirements
    }

    pub fn contains_build(&self, coordinate: &str) -> bool {
        self.build_requirements.contains(coordinate)
    }

    pub fn contains_run(&self, coordinate: &str) -> bool {
        self.run_requirements.contains(coordinate)
    }
}
