//! Common test utilities for lookout integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/lookout/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates three temporary directories:
/// - `project_dir`: The project lookout runs in (passed via `-C`)
/// - `data_dir`: Holds lookout's data (via `LOOKOUT_DATA_DIR`)
/// - `config_dir`: System config location (via `LOOKOUT_CONFIG_DIR`)
///
/// Everything is set per-command, so tests are parallel-safe.
pub struct TestEnv {
    pub project_dir: TempDir,
    pub data_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            project_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the lookout binary with isolated directories,
    /// pointed at the project directory with `-C`.
    pub fn lookout(&self) -> Command {
        let mut cmd = self.lookout_bare();
        cmd.arg("-C").arg(self.project_dir.path());
        cmd
    }

    /// Like [`TestEnv::lookout`] but without `-C`, for tests that pass their
    /// own project path.
    pub fn lookout_bare(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_lookout"));
        cmd.current_dir(self.project_dir.path());
        cmd.env("LOOKOUT_DATA_DIR", self.data_dir.path());
        cmd.env("LOOKOUT_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("LOOKOUT_SESSION");
        cmd.env_remove("LOOKOUT_PROJECT");
        cmd.env_remove("LOOKOUT_LOG");
        cmd
    }

    /// Run a command expected to succeed and parse its JSON stdout.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.lookout().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "lookout {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    pub fn project_path(&self) -> &std::path::Path {
        self.project_dir.path()
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    pub fn config_path(&self) -> &std::path::Path {
        self.config_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
