//! Shared integration-test harness for spawning `navicue` as a child
//! process and reading its JSONL event stream.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// Default timeout for reading a single event.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running `navicue cue run` process.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
#[allow(clippy::missing_panics_doc)]
pub struct NaviCueProcess {
    child: Child,
    stdin: Option<tokio::process::ChildStdin>,
    reader: BufReader<tokio::process::ChildStdout>,
}

impl NaviCueProcess {
    /// Spawns `cue run` for `cue` from the catalog at `config`.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_run(config: &str, cue: &str) -> Self {
        let path = fixture_path(config);
        let mut child = Command::new(env!("CARGO_BIN_EXE_navicue"))
            .args([
                "cue",
                "run",
                "--config",
                path.to_str().expect("non-UTF-8 fixture path"),
                "--cue",
                cue,
                "--quiet",
            ])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn navicue");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");

        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
        }
    }

    /// Sends one action line.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send_action(&mut self, action: &str) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin
            .write_all(format!("{action}\n").as_bytes())
            .await
            .expect("failed to write to stdin");
        stdin.flush().await.expect("failed to flush stdin");
    }

    /// Closes stdin so the player sees EOF.
    pub fn close_input(&mut self) {
        self.stdin.take();
    }

    /// Reads the next event.
    ///
    /// Panics on EOF, I/O error, or if no event arrives within `timeout`.
    #[allow(clippy::missing_panics_doc)]
    pub async fn read_event(&mut self, timeout: Duration) -> Value {
        let mut line = String::new();
        let result = tokio::time::timeout(timeout, async {
            loop {
                line.clear();
                let n = self
                    .reader
                    .read_line(&mut line)
                    .await
                    .expect("read_line I/O error");
                assert!(n > 0, "unexpected EOF from navicue");
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    return serde_json::from_str::<Value>(trimmed)
                        .unwrap_or_else(|e| panic!("invalid JSON event: {e}\nline: {line}"));
                }
            }
        })
        .await;
        result.expect("timed out waiting for event")
    }

    /// Reads the next event and asserts its type.
    #[allow(clippy::missing_panics_doc)]
    pub async fn expect_event(&mut self, expected_type: &str) -> Value {
        let event = self.read_event(DEFAULT_TIMEOUT).await;
        assert_eq!(
            event.get("type").and_then(Value::as_str),
            Some(expected_type),
            "unexpected event: {event}"
        );
        event
    }

    /// Waits for the process to exit and returns its exit code.
    #[allow(clippy::missing_panics_doc)]
    pub async fn wait(mut self) -> Option<i32> {
        self.close_input();
        let status = tokio::time::timeout(DEFAULT_TIMEOUT, self.child.wait())
            .await
            .expect("navicue did not exit")
            .expect("failed to wait for navicue");
        status.code()
    }
}

/// Runs `navicue` to completion with stdin closed.
#[allow(clippy::missing_panics_doc)]
#[must_use]
pub fn spawn_command(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_navicue"))
        .args(args)
        .stdin(std::process::Stdio::null())
        .output()
        .expect("failed to run navicue")
}

/// Returns the path to a test fixture.
#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Returns a fixture path as an owned string for command arguments.
#[allow(clippy::missing_panics_doc)]
#[must_use]
pub fn fixture_arg(name: &str) -> String {
    fixture_path(name)
        .to_str()
        .expect("non-UTF-8 fixture path")
        .to_string()
}
