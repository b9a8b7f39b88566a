// src/util.rs

//! Process-invocation and transcript-reading seams
//!
//! The build loop talks to the outside world through two narrow
//! capabilities: running an external command to completion and reading a
//! captured transcript back. Both are traits so that sessions can be
//! exercised against scripted implementations instead of a live sandbox.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Runs an external command to completion
pub trait ProcessRunner {
    /// Run `argv` to completion and return its exit code.
    ///
    /// Captured stdout/stderr is appended to `log_path` when one is given.
    /// The command is killed and an error returned if it outlives
    /// `timeout`.
    fn run(&self, argv: &[String], log_path: Option<&Path>, timeout: Duration) -> Result<i32>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<T> {
    fn run(&self, argv: &[String], log_path: Option<&Path>, timeout: Duration) -> Result<i32> {
        (**self).run(argv, log_path, timeout)
    }
}

/// Reads a captured transcript as text
pub trait TextSource {
    /// Read the file at `path`, replacing invalid UTF-8 rather than
    /// failing on it (build logs routinely contain mixed encodings).
    fn read_to_string(&self, path: &Path) -> Result<String>;
}

/// Production runner: spawns the command on the host
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, argv: &[String], log_path: Option<&Path>, timeout: Duration) -> Result<i32> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Sandbox("empty command line".to_string()))?;

        debug!("Running command: {:?}", argv);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null()) // CRITICAL: Prevent stdin hangs
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Sandbox(format!("Failed to spawn {}: {}", program, e)))?;

        match child.wait_timeout(timeout)? {
            Some(status) => {
                let output = child.wait_with_output()?;

                if let Some(path) = log_path {
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    let mut file = File::options().create(true).append(true).open(path)?;
                    file.write_all(&output.stdout)?;
                    file.write_all(&output.stderr)?;
                }

                Ok(status.code().unwrap_or(-1))
            }
            None => {
                let _ = child.kill();
                Err(Error::Sandbox(format!(
                    "{} timed out after {} seconds",
                    program,
                    timeout.as_secs()
                )))
            }
        }
    }
}

/// Production text source: reads transcripts from the filesystem
pub struct FsTextSource;

impl TextSource for FsTextSource {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| Error::Transcript {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Scripted runner for tests: replays queued exit codes and records
/// every invocation
#[derive(Default)]
pub struct ScriptedRunner {
    exits: Mutex<VecDeque<i32>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the exit code returned by the next invocation
    pub fn push_exit(&self, code: i32) {
        self.exits.lock().unwrap().push_back(code);
    }

    /// Every command line this runner has seen, in order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, argv: &[String], _log_path: Option<&Path>, _timeout: Duration) -> Result<i32> {
        self.calls.lock().unwrap().push(argv.to_vec());
        // Best-effort flushes always succeed and do not consume the
        // script; queued exits line up with sandbox invocations only
        if argv.len() == 1 && argv[0] == "sync" {
            return Ok(0);
        }
        let code = self.exits.lock().unwrap().pop_front().unwrap_or(0);
        if code == i32::MIN {
            return Err(Error::Sandbox("scripted spawn failure".to_string()));
        }
        Ok(code)
    }
}

/// In-memory text source for tests: serves transcripts by path
#[derive(Default)]
pub struct StaticTextSource {
    texts: HashMap<PathBuf, String>,
}

impl StaticTextSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transcript served for `path`
    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.texts.insert(path.into(), content.into());
    }
}

impl TextSource for StaticTextSource {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.texts.get(path) {
            Some(text) => Ok(text.clone()),
            None => {
                warn!("No scripted transcript for {}", path.display());
                Err(Error::Transcript {
                    path: path.display().to_string(),
                    reason: "no such transcript".to_string(),
                })
            }
        }
    }
}
