// src/build.rs

//! Build session orchestration
//!
//! A `BuildSession` drives the sandbox build tool through as many rounds
//! as it takes: invoke the tool, capture its transcripts, classify the
//! failure signatures, and redrive while new dependency facts keep
//! turning up. The session owns the round/restart/success counters and
//! the requirement store; the file manager is supplied by the caller the
//! same way the manifest generator consumes it afterwards.

use crate::config::RebuildConfig;
use crate::detect::LogScanner;
use crate::error::{Error, Result};
use crate::files::FileManager;
use crate::requirements::RequirementStore;
use crate::util::{FsTextSource, ProcessRunner, SystemRunner, TextSource};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// Well-known path of the sandbox build tool
pub const SANDBOX_BIN: &str = "/usr/bin/mock";

/// Privilege-broker helper some distributions route the sandbox tool
/// through; when present, the tool manages its own elevation
pub const PRIVILEGE_BROKER: &str = "consolehelper";

/// Setup-transcript signature for a baseline package the sandbox itself
/// could not install
const MISSING_ROOT_PACKAGE: &str = r"No matching package to install: '([^']*)'";

/// Working directories for one build session, derived once from the
/// session base directory and the source archive name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirs {
    pub base: PathBuf,
    pub download: PathBuf,
}

impl WorkingDirs {
    /// Pure path construction; no I/O beyond joining components
    pub fn derive(base: &Path, archive_name: &str) -> Self {
        Self {
            base: base.to_path_buf(),
            download: base.join(archive_name),
        }
    }

    /// Directory the sandbox writes its transcripts into
    pub fn results(&self) -> PathBuf {
        self.download.join("results")
    }
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The sandbox build exited cleanly and parsing found nothing new
    Success,
    /// A banned install location was reported; requires human remediation
    BannedPath,
    /// The sandbox could not provision its own baseline packages
    FatalEnvironment,
    /// The build failed and no new dependency facts were found
    NoProgress,
    /// The round budget ran out before a clean build
    RoundsExhausted,
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::BannedPath => "banned install location found",
            Self::FatalEnvironment => "sandbox environment failure",
            Self::NoProgress => "no automatic progress possible",
            Self::RoundsExhausted => "round budget exhausted",
        };
        f.write_str(text)
    }
}

/// Classification of a single completed round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    /// New facts were recorded; rebuild
    Retry,
    /// The session is over for the given reason
    Done(SessionOutcome),
}

/// Final report of a session
#[derive(Debug, Clone, Copy)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub rounds: u32,
}

impl SessionReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == SessionOutcome::Success
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} round(s)", self.outcome, self.rounds)
    }
}

/// One build session: counters, requirement store and collaborators
///
/// Sessions are single-threaded and synchronous; each round blocks on
/// the sandbox process before analysis begins. State never leaks across
/// sessions - start a fresh `BuildSession` for an unrelated build.
pub struct BuildSession {
    config: RebuildConfig,
    runner: Box<dyn ProcessRunner>,
    source: Box<dyn TextSource>,
    store: RequirementStore,
    dirs: Option<WorkingDirs>,
    sandbox_cmd: Option<Vec<String>>,
    missing_root_package: Regex,
    round: u32,
    restarts: u32,
    success: bool,
}

impl BuildSession {
    /// Create a session with the production runner and text source
    pub fn new(config: RebuildConfig) -> Self {
        Self {
            config,
            runner: Box::new(SystemRunner),
            source: Box::new(FsTextSource),
            store: RequirementStore::new(),
            dirs: None,
            sandbox_cmd: None,
            missing_root_package: Regex::new(MISSING_ROOT_PACKAGE)
                .expect("missing-root-package pattern is valid"),
            round: 0,
            restarts: 0,
            success: false,
        }
    }

    /// Swap in a different process runner
    pub fn with_runner(mut self, runner: Box<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Swap in a different transcript source
    pub fn with_source(mut self, source: Box<dyn TextSource>) -> Self {
        self.source = source;
        self
    }

    pub fn config(&self) -> &RebuildConfig {
        &self.config
    }

    /// Requirements discovered so far, for manifest regeneration
    pub fn requirements(&self) -> &RequirementStore {
        &self.store
    }

    /// Attempts made so far
    pub fn round(&self) -> u32 {
        self.round
    }

    /// New facts found by the most recent parse pass
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Whether the most recent completed attempt exited cleanly
    pub fn succeeded(&self) -> bool {
        self.success
    }

    /// Derive and record the session working directories
    pub fn setup_workingdir(&mut self, base: &Path, archive_name: &str) -> &WorkingDirs {
        self.dirs.insert(WorkingDirs::derive(base, archive_name))
    }

    pub fn working_dirs(&self) -> Option<&WorkingDirs> {
        self.dirs.as_ref()
    }

    /// Sandbox invocation prefix, probed once per session
    ///
    /// When the well-known binary resolves (through any symlink
    /// indirection) to the privilege broker, the tool is invoked
    /// directly; otherwise the invocation is prefixed with sudo.
    pub fn sandbox_command(&mut self) -> Vec<String> {
        if let Some(cmd) = &self.sandbox_cmd {
            return cmd.clone();
        }

        let binary = if Path::new(SANDBOX_BIN).exists() {
            PathBuf::from(SANDBOX_BIN)
        } else {
            which::which("mock").unwrap_or_else(|_| PathBuf::from(SANDBOX_BIN))
        };
        let resolved = fs::canonicalize(&binary).unwrap_or_else(|_| binary.clone());
        let cmd = sandbox_command_for(&binary, &resolved);

        debug!("Sandbox command: {:?}", cmd);
        self.sandbox_cmd = Some(cmd.clone());
        cmd
    }

    /// Parse the sandbox-setup transcript covering chroot preparation
    ///
    /// Returns `Ok(true)` when the build may proceed. With `inspect`
    /// unset the setup is trivially successful and no transcript is
    /// opened. Otherwise any missing-baseline-package signature is fatal
    /// for this pass: these are environment-provisioning failures, not
    /// package dependency failures, so neither the requirement store nor
    /// the restart counter is touched.
    pub fn parse_buildroot_log(&mut self, log: &Path, inspect: bool) -> Result<bool> {
        if !inspect {
            return Ok(true);
        }

        self.flush_disk();
        let transcript = self.source.read_to_string(log)?;

        let mut clean = true;
        for line in transcript.lines() {
            if let Some(captures) = self.missing_root_package.captures(line) {
                let name = captures.get(1).map(|m| m.as_str()).unwrap_or("?");
                error!("Cannot resolve dependency name: {}", name);
                clean = false;
            }
        }
        Ok(clean)
    }

    /// Parse the build-results transcript
    ///
    /// Resets the restart counter, scans every line against the full
    /// rule set regardless of exit status, and records whether this
    /// attempt exited cleanly. The decision whether to loop belongs to
    /// the caller, which reads the counters afterwards.
    pub fn parse_build_results(
        &mut self,
        log: &Path,
        exit_status: i32,
        files: &mut FileManager,
    ) -> Result<()> {
        self.flush_disk();
        let transcript = self.source.read_to_string(log)?;

        self.restarts = 0;
        let mut scanner = LogScanner::new(&self.config, &mut self.store, files);
        scanner.scan(&transcript);
        self.restarts = scanner.restarts();

        self.success = exit_status == 0;
        debug!(
            "Parse pass done: exit {}, {} new fact(s)",
            exit_status, self.restarts
        );
        Ok(())
    }

    /// Run one build round: invoke the sandbox, parse its transcripts,
    /// classify the result
    pub fn build_round(
        &mut self,
        name: &str,
        srpm: &Path,
        files: &mut FileManager,
    ) -> Result<RoundStatus> {
        let dirs = self
            .dirs
            .clone()
            .ok_or_else(|| Error::Config("working directories not set up".to_string()))?;
        let results = dirs.results();

        self.round += 1;
        info!("Building {} round {}", name, self.round);

        let mut argv = self.sandbox_command();
        argv.push(format!("--root={}", self.config.sandbox_root));
        argv.push(format!("--resultdir={}", results.display()));
        argv.push("--rebuild".to_string());
        argv.push(srpm.display().to_string());
        argv.extend(self.config.sandbox_opts.iter().cloned());

        let exit_status =
            self.runner
                .run(&argv, Some(&results.join("mock.log")), self.config.timeout)?;

        // Setup failures only need inspection when the invocation failed
        if !self.parse_buildroot_log(&results.join("root.log"), exit_status != 0)? {
            return Ok(RoundStatus::Done(SessionOutcome::FatalEnvironment));
        }

        self.parse_build_results(&results.join("build.log"), exit_status, files)?;

        if files.has_banned() {
            return Ok(RoundStatus::Done(SessionOutcome::BannedPath));
        }
        if self.success && self.restarts == 0 {
            return Ok(RoundStatus::Done(SessionOutcome::Success));
        }
        if self.restarts > 0 {
            return Ok(RoundStatus::Retry);
        }
        Ok(RoundStatus::Done(SessionOutcome::NoProgress))
    }

    /// Drive rounds until success, a terminal condition, or the round
    /// budget runs out
    pub fn run(&mut self, name: &str, srpm: &Path, files: &mut FileManager) -> Result<SessionReport> {
        loop {
            let status = self.build_round(name, srpm, files)?;
            match status {
                RoundStatus::Done(outcome) => {
                    let report = SessionReport {
                        outcome,
                        rounds: self.round,
                    };
                    info!("Session over: {}", report);
                    return Ok(report);
                }
                RoundStatus::Retry => {
                    if self.round >= self.config.max_rounds {
                        let report = SessionReport {
                            outcome: SessionOutcome::RoundsExhausted,
                            rounds: self.round,
                        };
                        info!("Session over: {}", report);
                        return Ok(report);
                    }
                    info!(
                        "Found {} new fact(s), rebuilding {}",
                        self.restarts, name
                    );
                }
            }
        }
    }

    /// Best-effort flush of pending sandbox log writes before reading
    fn flush_disk(&self) {
        let _ = self
            .runner
            .run(&["sync".to_string()], None, Duration::from_secs(60));
    }
}

/// Compute the sandbox invocation for a binary and its symlink target
fn sandbox_command_for(binary: &Path, resolved: &Path) -> Vec<String> {
    if resolved
        .file_name()
        .is_some_and(|name| name == PRIVILEGE_BROKER)
    {
        vec![binary.display().to_string()]
    } else {
        vec!["sudo".to_string(), binary.display().to_string()]
    }
}
