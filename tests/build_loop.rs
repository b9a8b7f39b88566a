// tests/build_loop.rs

//! End-to-end session tests: sandbox invocation, transcript parsing and
//! the round/retry state machine, driven through scripted collaborators.

mod common;

use common::{build_log, patterned_config, scripted_session, ARCHIVE};
use redrive::{FileManager, SessionOutcome};
use std::path::Path;

#[test]
fn test_session_recovers_missing_dependency() {
    // Round 1 fails with a missing qmake; the retry succeeds once the
    // requirement is known
    let mut config = patterned_config();
    config.want_32bit = true;

    let (mut session, runner) = scripted_session(
        config,
        &[1, 0],
        "chroot init ok\n",
        "line 1\nwhich: no qmake\nexiting\n",
    );
    let mut files = FileManager::new();

    let report = session
        .run(ARCHIVE, Path::new("/srpms/testball-1.src.rpm"), &mut files)
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.outcome, SessionOutcome::Success);
    assert_eq!(report.rounds, 2);
    assert!(session.requirements().contains_build("pkgconfig(Qt)"));
    assert!(session.requirements().contains_build("pkgconfig(32Qt)"));

    // Two sandbox invocations, each a full rebuild command line
    let sandbox_calls: Vec<_> = runner
        .calls()
        .into_iter()
        .filter(|argv| argv.iter().any(|arg| arg == "--rebuild"))
        .collect();
    assert_eq!(sandbox_calls.len(), 2);
    assert!(sandbox_calls[0]
        .iter()
        .any(|arg| arg.ends_with("testball-1.src.rpm")));
}

#[test]
fn test_session_stops_on_banned_path() {
    let (mut session, _runner) = scripted_session(
        patterned_config(),
        &[1],
        "chroot init ok\n",
        "Installed (but unpackaged) file(s) found:\n\
         /opt/testball/bin/tool\n\
         RPM build errors\n",
    );
    let mut files = FileManager::new();

    let report = session
        .run(ARCHIVE, Path::new("/srpms/testball-1.src.rpm"), &mut files)
        .unwrap();

    assert_eq!(report.outcome, SessionOutcome::BannedPath);
    assert_eq!(report.rounds, 1);
    assert!(files.has_banned());
    assert!(files.files().is_empty());
}

#[test]
fn test_session_stops_on_fatal_environment() {
    let (mut session, _runner) = scripted_session(
        patterned_config(),
        &[1],
        "DEBUG util.py:399:  No matching package to install: 'foobar'\n",
        "this log is never consulted\n",
    );
    let mut files = FileManager::new();

    let report = session
        .run(ARCHIVE, Path::new("/srpms/testball-1.src.rpm"), &mut files)
        .unwrap();

    assert_eq!(report.outcome, SessionOutcome::FatalEnvironment);
    assert_eq!(report.rounds, 1);
    // Environment failures are outside this engine's remediation
    // authority: nothing gets recorded
    assert!(session.requirements().build_requirements().is_empty());
    assert_eq!(session.restarts(), 0);
}

#[test]
fn test_session_stops_without_progress() {
    // A failing build whose transcript matches nothing leaves no
    // automatic fix to try
    let (mut session, _runner) = scripted_session(
        patterned_config(),
        &[1],
        "chroot init ok\n",
        "gcc: internal compiler error\n",
    );
    let mut files = FileManager::new();

    let report = session
        .run(ARCHIVE, Path::new("/srpms/testball-1.src.rpm"), &mut files)
        .unwrap();

    assert_eq!(report.outcome, SessionOutcome::NoProgress);
    assert_eq!(report.rounds, 1);
    assert!(!report.succeeded());
}

#[test]
fn test_session_respects_round_budget() {
    let mut config = patterned_config();
    config.max_rounds = 1;

    let (mut session, _runner) = scripted_session(
        config,
        &[1, 1],
        "chroot init ok\n",
        "which: no qmake\n",
    );
    let mut files = FileManager::new();

    let report = session
        .run(ARCHIVE, Path::new("/srpms/testball-1.src.rpm"), &mut files)
        .unwrap();

    // The first round found a new fact but the budget forbids a redrive
    assert_eq!(report.outcome, SessionOutcome::RoundsExhausted);
    assert_eq!(report.rounds, 1);
    assert!(session.requirements().contains_build("pkgconfig(Qt)"));
}

#[test]
fn test_session_collects_unpackaged_files() {
    let (mut session, _runner) = scripted_session(
        patterned_config(),
        &[1, 0],
        "chroot init ok\n",
        "Installed (but unpackaged) file(s) found:\n\
         /usr/bin/testball\n\
         /usr/share/man/man1/testball.1\n\
         \n\
         trailing noise\n",
    );
    let mut files = FileManager::new();

    let report = session
        .run(ARCHIVE, Path::new("/srpms/testball-1.src.rpm"), &mut files)
        .unwrap();

    // Round 1 records both files; round 2 rereads the same transcript,
    // finds nothing new and the clean exit ends the session
    assert_eq!(report.outcome, SessionOutcome::Success);
    assert_eq!(report.rounds, 2);
    assert_eq!(files.files().len(), 2);
    assert!(files.files().contains("/usr/bin/testball"));
    assert!(files.files().contains("/usr/share/man/man1/testball.1"));
}

#[test]
fn test_session_errors_on_missing_transcript() {
    use redrive::util::{ScriptedRunner, StaticTextSource};
    use redrive::{BuildSession, Error};
    use std::path::PathBuf;

    // No transcripts registered at all: the build-results read must
    // abort the round rather than count as "no matches"
    let runner = ScriptedRunner::new();
    runner.push_exit(0);
    let mut session = BuildSession::new(patterned_config())
        .with_runner(Box::new(runner))
        .with_source(Box::new(StaticTextSource::new()));
    session.setup_workingdir(PathBuf::from("/work").as_path(), ARCHIVE);
    let mut files = FileManager::new();

    let err = session
        .run(ARCHIVE, Path::new("/srpms/testball-1.src.rpm"), &mut files)
        .unwrap_err();
    assert!(matches!(err, Error::Transcript { .. }));
}

#[test]
fn test_build_round_requires_working_dirs() {
    use redrive::util::{ScriptedRunner, StaticTextSource};
    use redrive::{BuildSession, Error};

    let mut session = BuildSession::new(patterned_config())
        .with_runner(Box::new(ScriptedRunner::new()))
        .with_source(Box::new(StaticTextSource::new()));
    let mut files = FileManager::new();

    let err = session
        .build_round(ARCHIVE, Path::new("/srpms/testball-1.src.rpm"), &mut files)
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_second_pass_over_same_transcript_finds_nothing() {
    let (mut session, _runner) = scripted_session(
        patterned_config(),
        &[],
        "chroot init ok\n",
        "which: no qmake\nchecking for Apache test module support\n",
    );
    let mut files = FileManager::new();

    session
        .parse_build_results(&build_log(), 1, &mut files)
        .unwrap();
    assert_eq!(session.restarts(), 2);

    session
        .parse_build_results(&build_log(), 1, &mut files)
        .unwrap();
    assert_eq!(session.restarts(), 0);
}
