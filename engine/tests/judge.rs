//! End-to-end judge scenarios: rule files on disk, a real database, and
//! raw request JSON in.

use std::path::PathBuf;

use tyr_config::TyrConfig;
use tyr_engine::{Engine, JudgeOptions};
use tyr_store::{LogFilter, Store};
use tyr_types::record::{LogDecision, RunMode};

struct Fixture {
    _dir: tempfile::TempDir,
    engine: Engine,
    db_path: PathBuf,
}

/// Build an engine over temp rule files, highest-precedence scope first.
fn fixture(rule_files: &[&str]) -> Fixture {
    fixture_with(rule_files, TyrConfig::default())
}

fn fixture_with(rule_files: &[&str], config: TyrConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for (i, json) in rule_files.iter().enumerate() {
        let path = dir.path().join(format!("scope{i}.json"));
        std::fs::write(&path, json).unwrap();
        paths.push(path);
    }
    let db_path = dir.path().join("tyr.db");
    Fixture {
        engine: Engine {
            config,
            rule_paths: Some(paths),
            db_path: db_path.clone(),
        },
        _dir: dir,
        db_path,
    }
}

fn request_json(command: &str) -> String {
    serde_json::json!({
        "session_id": "sess-1",
        "transcript_path": "/tmp/transcript.jsonl",
        "cwd": "/work/project",
        "permission_mode": "default",
        "hook_event_name": "PermissionRequest",
        "tool_name": "Bash",
        "tool_input": { "command": command }
    })
    .to_string()
}

fn behavior_of(stdout: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(stdout).unwrap();
    assert_eq!(
        value["hookSpecificOutput"]["hookEventName"],
        "PermissionRequest"
    );
    value["hookSpecificOutput"]["decision"]["behavior"]
        .as_str()
        .unwrap()
        .to_string()
}

fn logs_in(db_path: &PathBuf) -> Vec<tyr_types::record::LogEntry> {
    let store = Store::open(db_path).unwrap();
    store.query_logs(&LogFilter::default()).unwrap()
}

#[tokio::test]
async fn allowed_chain_produces_allow_response() {
    let fx = fixture(&[
        r#"{"permissions": {"allow": ["Bash(git *)", "Bash(npm test)"]}}"#,
    ]);
    let out = fx
        .engine
        .judge(&request_json("git status && npm test"), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(behavior_of(&out.unwrap()), "allow");

    let logs = logs_in(&fx.db_path);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].decision, LogDecision::Allow);
    assert_eq!(logs[0].provider.as_deref(), Some("chained-commands"));
    assert_eq!(logs[0].mode, None);
}

#[tokio::test]
async fn denied_link_produces_deny_response() {
    let fx = fixture(&[
        r#"{"permissions": {"allow": ["Bash(git *)"], "deny": ["Bash(rm *)"]}}"#,
    ]);
    let out = fx
        .engine
        .judge(&request_json("git status && rm -rf /"), &JudgeOptions::new())
        .await
        .unwrap();
    let stdout = out.unwrap();
    assert_eq!(behavior_of(&stdout), "deny");

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let message = value["hookSpecificOutput"]["decision"]["message"]
        .as_str()
        .unwrap();
    assert!(message.contains("rm -rf /"));
}

#[tokio::test]
async fn unknown_link_produces_empty_stdout() {
    let fx = fixture(&[r#"{"permissions": {"allow": ["Bash(git *)"]}}"#]);
    let out = fx
        .engine
        .judge(
            &request_json("git status && curl example.com"),
            &JudgeOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(out, None);

    let logs = logs_in(&fx.db_path);
    assert_eq!(logs[0].decision, LogDecision::Abstain);
    assert_eq!(logs[0].provider, None);
}

#[tokio::test]
async fn scopes_merge_for_allow() {
    // Project-local allows the narrow pattern, project-shared the broad
    // one; either way the push is covered.
    let fx = fixture(&[
        r#"{"permissions": {"allow": ["Bash(git push *)"]}}"#,
        r#"{"permissions": {"allow": ["Bash(git *)"]}}"#,
    ]);
    let out = fx
        .engine
        .judge(&request_json("git push origin main"), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(behavior_of(&out.unwrap()), "allow");
}

#[tokio::test]
async fn higher_scope_deny_beats_lower_scope_allow() {
    let fx = fixture(&[
        r#"{"permissions": {"deny": ["Bash(git push *)"]}}"#,
        r#"{"permissions": {"allow": ["Bash(git *)"]}}"#,
    ]);
    let out = fx
        .engine
        .judge(&request_json("git push origin main"), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(behavior_of(&out.unwrap()), "deny");
}

#[tokio::test]
async fn deny_inside_pipe_denies() {
    let fx = fixture(&[
        r#"{"permissions": {"allow": ["Bash(echo *)"], "deny": ["Bash(rm *)"]}}"#,
    ]);
    let out = fx
        .engine
        .judge(&request_json("echo hello | rm -rf /"), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(behavior_of(&out.unwrap()), "deny");
}

#[tokio::test]
async fn fail_open_converts_abstain_to_allow() {
    let mut config = TyrConfig::default();
    config.fail_open = true;
    let fx = fixture_with(
        &[r#"{"permissions": {"allow": ["Bash(git *)"], "deny": ["Bash(git push --force *)"]}}"#],
        config,
    );
    let out = fx
        .engine
        .judge(
            &request_json("git status && some-unknown-cmd"),
            &JudgeOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(behavior_of(&out.unwrap()), "allow");

    let logs = logs_in(&fx.db_path);
    assert_eq!(logs[0].decision, LogDecision::Allow);
    assert_eq!(logs[0].provider.as_deref(), Some("fail-open"));

    // Synthetic allows are not memoised.
    let store = Store::open(&fx.db_path).unwrap();
    assert_eq!(store.cache_size().unwrap(), 0);
}

#[tokio::test]
async fn audit_mode_only_records() {
    let fx = fixture(&[r#"{"permissions": {"deny": ["Bash(rm *)"]}}"#]);
    let mut options = JudgeOptions::new();
    options.audit = true;

    let out = fx
        .engine
        .judge(&request_json("rm -rf /"), &options)
        .await
        .unwrap();
    assert_eq!(out, None);

    let logs = logs_in(&fx.db_path);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].mode, Some(RunMode::Audit));
    assert_eq!(logs[0].decision, LogDecision::Abstain);
    assert_eq!(logs[0].provider, None);

    let store = Store::open(&fx.db_path).unwrap();
    assert_eq!(store.cache_size().unwrap(), 0);
}

#[tokio::test]
async fn shadow_mode_logs_the_real_decision_without_stdout() {
    let fx = fixture(&[r#"{"permissions": {"deny": ["Bash(rm *)"]}}"#]);
    let mut options = JudgeOptions::new();
    options.shadow = true;

    let out = fx
        .engine
        .judge(&request_json("rm -rf /tmp/x"), &options)
        .await
        .unwrap();
    assert_eq!(out, None);

    let logs = logs_in(&fx.db_path);
    assert_eq!(logs[0].mode, Some(RunMode::Shadow));
    assert_eq!(logs[0].decision, LogDecision::Deny);
    assert_eq!(logs[0].provider.as_deref(), Some("chained-commands"));
}

#[tokio::test]
async fn malformed_input_errors_without_log_row() {
    let fx = fixture(&[r#"{"permissions": {"allow": ["Bash"]}}"#]);
    assert!(fx
        .engine
        .judge("{definitely not json", &JudgeOptions::new())
        .await
        .is_err());

    let wrong_event = serde_json::json!({
        "session_id": "s", "transcript_path": "/t", "cwd": "/w",
        "permission_mode": "default", "hook_event_name": "PostToolUse",
        "tool_name": "Bash", "tool_input": {"command": "ls"}
    });
    assert!(fx
        .engine
        .judge(&wrong_event.to_string(), &JudgeOptions::new())
        .await
        .is_err());

    // Malformed input is rejected before any logging.
    assert!(logs_in(&fx.db_path).is_empty());
}

#[tokio::test]
async fn second_identical_request_is_served_from_cache() {
    let fx = fixture(&[r#"{"permissions": {"allow": ["Bash(git *)"]}}"#]);

    let first = fx
        .engine
        .judge(&request_json("git status"), &JudgeOptions::new())
        .await
        .unwrap();
    let second = fx
        .engine
        .judge(&request_json("git status"), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(behavior_of(&first.unwrap()), "allow");
    assert_eq!(behavior_of(&second.unwrap()), "allow");

    let logs = logs_in(&fx.db_path);
    assert_eq!(logs.len(), 2);
    assert!(!logs[0].cached);
    assert!(logs[1].cached);
    // The cache surfaces the provider that originally decided.
    assert_eq!(logs[1].provider.as_deref(), Some("chained-commands"));
}

#[tokio::test]
async fn rule_change_invalidates_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let rule_path = dir.path().join("settings.json");
    std::fs::write(
        &rule_path,
        r#"{"permissions": {"allow": ["Bash(git *)"]}}"#,
    )
    .unwrap();
    let db_path = dir.path().join("tyr.db");
    let engine = Engine {
        config: TyrConfig::default(),
        rule_paths: Some(vec![rule_path.clone()]),
        db_path: db_path.clone(),
    };

    let first = engine
        .judge(&request_json("git status"), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(behavior_of(&first.unwrap()), "allow");

    // Rules flip underneath: the old allow row must not be served.
    std::fs::write(
        &rule_path,
        r#"{"permissions": {"deny": ["Bash(git *)"]}}"#,
    )
    .unwrap();

    let second = engine
        .judge(&request_json("git status"), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(behavior_of(&second.unwrap()), "deny");

    let logs = logs_in(&db_path);
    assert!(!logs[1].cached);
}

#[tokio::test]
async fn cache_disabled_by_flag() {
    let fx = fixture(&[r#"{"permissions": {"allow": ["Bash(git *)"]}}"#]);
    let mut options = JudgeOptions::new();
    options.cache_checks = Some(false);

    for _ in 0..2 {
        fx.engine
            .judge(&request_json("git status"), &options)
            .await
            .unwrap();
    }
    let logs = logs_in(&fx.db_path);
    assert!(logs.iter().all(|l| !l.cached));

    let store = Store::open(&fx.db_path).unwrap();
    assert_eq!(store.cache_size().unwrap(), 0);
}

#[tokio::test]
async fn chained_provider_can_be_disabled() {
    let fx = fixture(&[r#"{"permissions": {"allow": ["Bash(git *)"]}}"#]);
    let mut options = JudgeOptions::new();
    options.allow_chained_commands = false;

    let out = fx
        .engine
        .judge(&request_json("git status"), &options)
        .await
        .unwrap();
    assert_eq!(out, None);
}

#[tokio::test]
async fn non_bash_tools_abstain() {
    let fx = fixture(&[r#"{"permissions": {"allow": ["Bash"]}}"#]);
    let raw = serde_json::json!({
        "session_id": "s", "transcript_path": "/t", "cwd": "/w",
        "permission_mode": "default", "hook_event_name": "PermissionRequest",
        "tool_name": "Write", "tool_input": {"file_path": "/x", "content": "y"}
    });
    let out = fx
        .engine
        .judge(&raw.to_string(), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(out, None);
}

#[tokio::test]
async fn boundary_commands_abstain_quietly() {
    let fx = fixture(&[r#"{"permissions": {"allow": ["Bash"]}}"#]);
    for command in ["", "   \t  ", "> /tmp/only-redirect"] {
        let out = fx
            .engine
            .judge(&request_json(command), &JudgeOptions::new())
            .await
            .unwrap();
        assert_eq!(out, None, "command {command:?} should abstain");
    }

    // A null byte inside the command is data, not a protocol problem:
    // the request must evaluate cleanly (exit 0) whatever the verdict.
    fx.engine
        .judge(&request_json("echo 'a\u{0}b'"), &JudgeOptions::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn huge_command_is_judged() {
    let fx = fixture(&[r#"{"permissions": {"allow": ["Bash(echo *)"]}}"#]);
    let mut command = String::from("echo ");
    command.push_str(&"a".repeat(100_000));
    let out = fx
        .engine
        .judge(&request_json(&command), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(behavior_of(&out.unwrap()), "allow");
}

#[tokio::test]
async fn broken_database_still_judges() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tyr.db");
    // Not a SQLite database at all.
    std::fs::write(&db_path, "this is not a database").unwrap();

    let rule_path = dir.path().join("settings.json");
    std::fs::write(
        &rule_path,
        r#"{"permissions": {"allow": ["Bash(git *)"]}}"#,
    )
    .unwrap();

    let engine = Engine {
        config: TyrConfig::default(),
        rule_paths: Some(vec![rule_path]),
        db_path,
    };
    let out = engine
        .judge(&request_json("git status"), &JudgeOptions::new())
        .await
        .unwrap();
    assert_eq!(behavior_of(&out.unwrap()), "allow");
}
