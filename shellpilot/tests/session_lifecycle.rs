//! Session-level tests against real `sh` processes.
//!
//! The oracle and the operator are scripted; commands and generated artifacts
//! run for real inside a temporary workspace.

use std::fs;

use shellpilot::core::types::SessionOutcome;
use shellpilot::io::runner::SystemRunner;
use shellpilot::plan::PlanEvent;
use shellpilot::session::{SessionConfig, run_session};
use shellpilot::test_support::{ScriptedOperator, ScriptedOracle, workspace};

/// Plan creates a directory, generates a broken script, repairs it, then uses its output.
///
/// Sequence:
/// 1. `cd app` creates `app/` and moves there.
/// 2. `touch build.sh` generates `exit 3`, which fails under `sh`.
/// 3. The repaired script writes `built.txt` and passes.
/// 4. `cat built.txt` runs in `app/` and sees the file.
#[test]
fn broken_artifact_is_repaired_within_one_attempt() {
    let temp = workspace();
    let oracle = ScriptedOracle::new(vec![
        Ok("```bash\ncd app\ntouch build.sh\ncat built.txt\n```".to_string()),
        Ok("exit 3".to_string()),
        Ok("```sh\necho built > built.txt\n```".to_string()),
    ]);
    let operator = ScriptedOperator::new("produce built.txt");
    let mut events = Vec::new();

    let report = run_session(
        &oracle,
        &SystemRunner,
        &operator,
        &SessionConfig::default(),
        temp.path().to_path_buf(),
        |event: &PlanEvent| events.push(event.clone()),
    )
    .expect("session");

    assert_eq!(report.outcome, SessionOutcome::Completed { attempt: 1 });
    let app = temp.path().join("app");
    assert_eq!(
        fs::read_to_string(app.join("build.sh")).expect("read script"),
        "echo built > built.txt"
    );
    assert_eq!(
        report.state.executed_commands,
        vec!["cd app", "touch build.sh", "cat built.txt"]
    );
    assert_eq!(report.state.project_root.as_deref(), Some(app.as_path()));
    assert!(events.contains(&PlanEvent::ArtifactRepaired {
        path: app.join("build.sh"),
        repair: 1,
    }));
    assert!(events.contains(&PlanEvent::CommandSucceeded {
        command: "cat built.txt".to_string(),
        stdout: "built\n".to_string(),
        stderr: String::new(),
    }));
}

#[test]
fn commands_from_earlier_attempts_are_not_repeated() {
    let temp = workspace();
    let oracle = ScriptedOracle::new(vec![
        Ok("mkdir made\ntest -f missing".to_string()),
        // A second `mkdir made` would fail because the directory exists.
        Ok("mkdir made\ntest -d made".to_string()),
    ]);
    let operator = ScriptedOperator::new("make a dir").with_feedback(&["check the dir instead"]);

    let report = run_session(
        &oracle,
        &SystemRunner,
        &operator,
        &SessionConfig::default(),
        temp.path().to_path_buf(),
        |_| {},
    )
    .expect("session");

    assert_eq!(report.outcome, SessionOutcome::Completed { attempt: 2 });
    assert_eq!(
        report.state.executed_commands,
        vec!["mkdir made", "test -d made"]
    );
    let failures = operator.failures_seen();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].command, "test -f missing");
    assert_eq!(failures[0].diagnostic, "exited with status 1");
}

#[test]
fn attempt_ceiling_ends_session_cleanly() {
    let temp = workspace();
    let oracle = ScriptedOracle::new(
        (0..5)
            .map(|n| Ok(format!("echo try{n} 1>&2; exit 1")))
            .collect(),
    );
    let operator = ScriptedOperator::new("never works").with_feedback(&["one", "two", "three"]);

    let report = run_session(
        &oracle,
        &SystemRunner,
        &operator,
        &SessionConfig::default(),
        temp.path().to_path_buf(),
        |_| {},
    )
    .expect("session");

    assert_eq!(report.outcome, SessionOutcome::Exhausted { attempts: 3 });
    assert_eq!(oracle.requests().len(), 3);
    assert_eq!(
        report.task.as_str(),
        "never works\nError: one\nError: two\nError: three"
    );
    let diagnostics: Vec<String> = operator
        .failures_seen()
        .into_iter()
        .map(|failure| failure.diagnostic)
        .collect();
    assert_eq!(diagnostics, vec!["try0", "try1", "try2"]);
}

#[test]
fn exit_sentinel_touches_nothing() {
    let temp = workspace();
    let oracle = ScriptedOracle::new(Vec::new());
    let operator = ScriptedOperator::new("EXIT");

    let report = run_session(
        &oracle,
        &SystemRunner,
        &operator,
        &SessionConfig::default(),
        temp.path().to_path_buf(),
        |_| {},
    )
    .expect("session");

    assert_eq!(report.outcome, SessionOutcome::Exited);
    assert!(oracle.requests().is_empty());
    assert_eq!(fs::read_dir(temp.path()).expect("read dir").count(), 0);
}
