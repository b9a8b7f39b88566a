// src/detect.rs

//! Failure-signature detection over build transcripts
//!
//! The scanner walks a captured transcript line by line and applies every
//! registered rule: plain patterns emit a literal requirement, pkg-config
//! patterns emit `pkgconfig(...)` coordinates, and failure patterns route
//! a captured identifier through the per-ecosystem dispatch below. A
//! fourth detector collects the sandbox's "Installed (but unpackaged)
//! file(s) found" report.
//!
//! Every detector is pure with respect to its declared side effects: the
//! same line against the same tables produces the same set mutations and
//! the same restart delta. Facts that change no set never count as
//! progress, so re-scanning an unchanged transcript is a no-op.

use crate::config::{FailureRule, PkgconfigRule, PlainRule, RebuildConfig};
use crate::files::FileManager;
use crate::requirements::RequirementStore;
use strum_macros::{Display, EnumString};
use tracing::{debug, info};

/// Marker opening an unpackaged-files report block
pub const UNPACKAGED_FILES_MARKER: &str = "Installed (but unpackaged) file(s) found:";

/// Marker terminating an unpackaged-files report block
pub const BUILD_ERRORS_MARKER: &str = "RPM build errors";

/// Language/package ecosystem a detected identifier belongs to
///
/// Drives namespace-specific coordinate construction. `Ruby` falls back
/// to a best-guess `rubygem-<name>` when the gems table has no entry;
/// `RubyTable` acts only on curated mappings because a guess in its
/// contexts would likely be wrong. `Maven` guesses like `Ruby` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Ecosystem {
    #[strum(serialize = "pkgconfig")]
    Pkgconfig,
    #[strum(serialize = "R")]
    R,
    #[strum(serialize = "perl")]
    Perl,
    #[strum(serialize = "pypi")]
    Pypi,
    #[strum(serialize = "ruby")]
    Ruby,
    #[strum(serialize = "ruby table")]
    RubyTable,
    #[strum(serialize = "maven")]
    Maven,
}

/// One full scan of one transcript against the registered rule set
///
/// Borrows the session's requirement store and file manager; the restart
/// count accumulates the number of independent new facts discovered
/// during this pass.
pub struct LogScanner<'a> {
    config: &'a RebuildConfig,
    store: &'a mut RequirementStore,
    files: &'a mut FileManager,
    restarts: u32,
    in_file_block: bool,
}

impl<'a> LogScanner<'a> {
    pub fn new(
        config: &'a RebuildConfig,
        store: &'a mut RequirementStore,
        files: &'a mut FileManager,
    ) -> Self {
        Self {
            config,
            store,
            files,
            restarts: 0,
            in_file_block: false,
        }
    }

    /// Independent new facts discovered so far in this pass
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Scan a whole transcript
    pub fn scan(&mut self, transcript: &str) {
        for line in transcript.lines() {
            self.scan_line(line);
        }
    }

    /// Apply every registered rule to one line
    pub fn scan_line(&mut self, line: &str) {
        let config = self.config;
        for rule in &config.plain_rules {
            self.plain_pattern(line, rule);
        }
        for rule in &config.pkgconfig_rules {
            self.pkgconfig_pattern(line, rule);
        }
        for rule in &config.failure_rules {
            self.failure_pattern(line, rule);
        }
        self.unpackaged_files(line);
    }

    /// Plain pattern: on match, insert the configured literal
    pub fn plain_pattern(&mut self, line: &str, rule: &PlainRule) {
        if !rule.pattern.is_match(line) {
            return;
        }
        if self.store.add_build_requirement(&rule.requirement) {
            self.restarts += 1;
        }
    }

    /// Pkg-config pattern: on match, insert `pkgconfig(<name>)` and the
    /// 32-bit variant when configured
    ///
    /// The restart count moves by at most 1 per detection event, not per
    /// inserted coordinate.
    pub fn pkgconfig_pattern(&mut self, line: &str, rule: &PkgconfigRule) {
        if !rule.pattern.is_match(line) {
            return;
        }
        if self
            .store
            .add_pkgconfig_requirement(&rule.package, self.config.want_32bit)
        {
            self.restarts += 1;
        }
    }

    /// Ecosystem-failure pattern: route the captured identifier through
    /// the dispatch table
    pub fn failure_pattern(&mut self, line: &str, rule: &FailureRule) {
        let Some(captures) = rule.pattern.captures(line) else {
            return;
        };
        let Some(identifier) = captures.get(1).map(|m| m.as_str()) else {
            return;
        };

        let newly_added = match rule.ecosystem {
            None => match self.config.failed_commands.get(identifier) {
                Some(package) => {
                    let package = package.clone();
                    if rule.verbose {
                        info!("Missing build command '{}' -> {}", identifier, package);
                    }
                    self.store.add_build_requirement(&package)
                }
                None => {
                    debug!("No substitute known for failed command '{}'", identifier);
                    false
                }
            },
            Some(Ecosystem::Pkgconfig) => self
                .store
                .add_pkgconfig_requirement(identifier, self.config.want_32bit),
            Some(Ecosystem::R) => {
                let coordinate = format!("R-{}", identifier);
                // R libraries are needed at run time as well as build time
                let added = self.store.add_build_requirement(&coordinate);
                if added {
                    self.store.add_run_requirement(&coordinate);
                }
                added
            }
            Some(Ecosystem::Perl) => self
                .store
                .add_build_requirement(&format!("perl({})", identifier)),
            Some(Ecosystem::Pypi) => self
                .store
                .add_build_requirement(&format!("{}-python", identifier)),
            Some(Ecosystem::Ruby) => {
                let name = self
                    .config
                    .gems
                    .get(identifier)
                    .map(String::as_str)
                    .unwrap_or(identifier);
                self.store
                    .add_build_requirement(&format!("rubygem-{}", name))
            }
            Some(Ecosystem::RubyTable) => match self.config.gems.get(identifier) {
                Some(name) => {
                    let coordinate = format!("rubygem-{}", name);
                    self.store.add_build_requirement(&coordinate)
                }
                None => {
                    // The table is authoritative here; a guessed gem name
                    // would likely be wrong
                    if rule.verbose {
                        info!("No gem mapping for '{}', skipping", identifier);
                    }
                    false
                }
            },
            Some(Ecosystem::Maven) => {
                let name = self
                    .config
                    .maven_jars
                    .get(identifier)
                    .map(String::as_str)
                    .unwrap_or(identifier);
                self.store.add_build_requirement(&format!("mvn-{}", name))
            }
        };

        if newly_added {
            self.restarts += 1;
        }
    }

    /// Unpackaged-files block detector
    ///
    /// The block opens at the marker line and closes at a blank line or a
    /// build-errors marker. Each file accepted by the manager counts as
    /// its own new fact: every missing file requires a distinct manifest
    /// edit.
    pub fn unpackaged_files(&mut self, line: &str) {
        if self.in_file_block {
            if line.trim().is_empty() || line.contains(BUILD_ERRORS_MARKER) {
                self.in_file_block = false;
                return;
            }
            let candidate = line.trim();
            if candidate.starts_with('/') && self.files.push_file(candidate) {
                self.restarts += 1;
            }
            return;
        }
        if line.contains(UNPACKAGED_FILES_MARKER) {
            self.in_file_block = true;
        }
    }
}
