#![cfg(unix)]
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const GOOD: &str = r#"
echo '{"entry_point": true, "names": {"PLAYER_NAME": "Shell Pigs"}}'
while read own opp; do echo '{"value": 4}'; done
"#;

const NO_ENTRY: &str = "echo '{\"entry_point\": false}'\n";

const SHELL_CONFIG: &str = r#"
goal: 4
timeout_secs: 10
runner:
  program: sh
  args: ["{submission}"]
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("hogconv.yaml"), SHELL_CONFIG).unwrap();
        fs::create_dir_all(dir.path().join("subs")).unwrap();
        Self { dir }
    }

    fn submission(&self, id: &str, body: &str) {
        let d = self.subs().join(id);
        fs::create_dir_all(&d).unwrap();
        fs::write(d.join("hog_contest.py"), body).unwrap();
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn subs(&self) -> PathBuf {
        self.path("subs")
    }

    fn convert(&self) -> Command {
        let mut cmd = Command::cargo_bin("hogconv").unwrap();
        cmd.env_remove("HOGCONV_RUNNER")
            .arg("convert")
            .arg(self.subs())
            .arg("--session")
            .arg(self.path("session"))
            .arg("--config")
            .arg(self.path("hogconv.yaml"));
        cmd
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn convert_reports_issues_and_writes_session() {
    let ws = Workspace::new();
    ws.submission("alice", GOOD);
    ws.submission("bob", NO_ENTRY);

    ws.convert()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ERRORS occurred during conversion:"))
        .stdout(predicate::str::contains("Team bo...: [Skipped] Missing final_strategy."))
        .stdout(predicate::str::contains("converted a total of 1 strategy."));

    let strategies = read_json(&ws.path("session/strategies.json"));
    let list = strategies.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], "alice");
    assert_eq!(list[0]["name"], "Shell Pigs");

    let store = read_json(&ws.path("session/config.json"));
    let blob = store["hogconv.sync_cache"].as_str().unwrap();
    let record: Value = serde_json::from_str(blob).unwrap();
    assert!(record["entries"]["alice"].is_string());
    assert!(record["entries"].get("bob").is_none());
}

#[test]
fn second_run_reuses_unchanged_submissions() {
    let ws = Workspace::new();
    ws.submission("alice", GOOD);

    ws.convert()
        .assert()
        .success()
        .stdout(predicate::str::contains("converted a total of 1 strategy."));
    let first = fs::read_to_string(ws.path("session/strategies.json")).unwrap();

    ws.convert()
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "converted a total of 0 strategies. reused 1 unchanged.",
        ));
    let second = fs::read_to_string(ws.path("session/strategies.json")).unwrap();
    assert_eq!(first, second);

    ws.convert()
        .arg("--no-cache")
        .assert()
        .success()
        .stdout(predicate::str::contains("converted a total of 1 strategy."));
}

#[test]
fn json_output_and_exports() {
    let ws = Workspace::new();
    ws.submission("alice", GOOD);

    let out = ws
        .convert()
        .arg("--json")
        .arg("--export-legacy")
        .arg(ws.path("legacy"))
        .arg("--export-python")
        .arg(ws.path("py"))
        .output()
        .unwrap();
    assert!(out.status.success());

    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["summary"]["converted"], 1);
    assert_eq!(report["issues"].as_array().unwrap().len(), 0);

    let legacy = fs::read_to_string(ws.path("legacy/alice.strat")).unwrap();
    assert!(legacy.starts_with("strategy alice\n"));
    assert!(legacy.contains("4 4 4 4"));
    let py = fs::read_to_string(ws.path("py/alice.py")).unwrap();
    assert!(py.contains("PLAYER_NAME = 'Shell Pigs'"));
    assert!(py.contains("def final_strategy(score, opponent_score):"));
}

#[test]
fn invalid_config_exits_with_config_error() {
    let ws = Workspace::new();
    fs::write(ws.path("hogconv.yaml"), "goal: 4\nmin_rolls: 9\nmax_rolls: 1\n").unwrap();
    ws.submission("alice", GOOD);

    ws.convert()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Config error"));
    assert!(!ws.path("session/strategies.json").exists());
}

#[test]
fn unknown_config_key_is_rejected() {
    let ws = Workspace::new();
    fs::write(ws.path("hogconv.yaml"), "gaol: 4\n").unwrap();

    ws.convert().assert().code(2);
}

#[test]
fn config_command_prints_effective_config() {
    let ws = Workspace::new();

    Command::cargo_bin("hogconv")
        .unwrap()
        .env_remove("HOGCONV_CONFIG")
        .env_remove("HOGCONV_RUNNER")
        .args(["config", "--timeout", "9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("goal: 100"))
        .stdout(predicate::str::contains("timeout_secs: 9"))
        .stdout(predicate::str::is_match("# fingerprint: [0-9a-f]{64}").unwrap());

    Command::cargo_bin("hogconv")
        .unwrap()
        .env_remove("HOGCONV_RUNNER")
        .arg("config")
        .env("HOGCONV_CONFIG", ws.path("hogconv.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("goal: 4"))
        .stdout(predicate::str::contains("program: sh"));
}
