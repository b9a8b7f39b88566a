// tests/common/mod.rs

//! Shared fixtures for session-level tests

use redrive::util::{ScriptedRunner, StaticTextSource};
use redrive::{BuildSession, RebuildConfig};
use std::path::PathBuf;
use std::sync::Arc;

pub const BASE_DIR: &str = "/work";
pub const ARCHIVE: &str = "testball";

pub fn root_log() -> PathBuf {
    PathBuf::from(BASE_DIR).join(ARCHIVE).join("results/root.log")
}

pub fn build_log() -> PathBuf {
    PathBuf::from(BASE_DIR).join(ARCHIVE).join("results/build.log")
}

/// A session wired to scripted collaborators, with the runner handle
/// kept for inspection
pub fn scripted_session(
    config: RebuildConfig,
    exits: &[i32],
    root_log_content: &str,
    build_log_content: &str,
) -> (BuildSession, Arc<ScriptedRunner>) {
    let runner = Arc::new(ScriptedRunner::new());
    for exit in exits {
        runner.push_exit(*exit);
    }

    let mut source = StaticTextSource::new();
    source.insert(root_log(), root_log_content);
    source.insert(build_log(), build_log_content);

    let mut session = BuildSession::new(config)
        .with_runner(Box::new(runner.clone()))
        .with_source(Box::new(source));
    session.setup_workingdir(PathBuf::from(BASE_DIR).as_path(), ARCHIVE);
    (session, runner)
}

pub fn patterned_config() -> RebuildConfig {
    let mut config = RebuildConfig::new();
    config.setup_patterns().unwrap();
    config
}
