use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use assert_cmd::Command;
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary homes live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Creates an isolated application home for one test.
pub fn test_home() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let home = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    home
}

/// The CLI binary pointed at `home`, with colour disabled.
pub fn cli(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("circle_ledger_cli").expect("binary");
    cmd.env("CIRCLE_LEDGER_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

/// Runs `script` through stdin and returns stdout.
pub fn run_script(home: &Path, script: &str) -> String {
    let output = cli(home)
        .write_stdin(script.to_string())
        .output()
        .expect("run script");
    assert!(output.status.success(), "script failed: {output:?}");
    String::from_utf8(output.stdout).expect("utf8 stdout")
}
