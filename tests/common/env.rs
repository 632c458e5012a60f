//! Test environment for driving the `tether` binary.
//!
//! Every run gets its own temp directory as working directory, HOME and
//! XDG config home, so no user configuration leaks in.

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;
use tether::infrastructure::StateFile;
use tether::InMemoryCloud;

use super::fixtures::FAST_CONFIG;

/// Result of running a Tether CLI command
#[derive(Debug)]
pub struct TestResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl TestResult {
    /// Combine stdout and stderr
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}):\n{}", self.stdout))
    }
}

pub struct TestEnv {
    pub dir: TempDir,
    bin: PathBuf,
}

impl TestEnv {
    /// Temp dir holding `tether.toml` with fast retry settings
    pub fn new() -> Self {
        let env = Self {
            dir: tempfile::tempdir().unwrap(),
            bin: PathBuf::from(env!("CARGO_BIN_EXE_tether")),
        };
        env.write("tether.toml", FAST_CONFIG);
        env
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn state_path(&self) -> PathBuf {
        self.path("cloud.json")
    }

    /// Persist `cloud` as the simulated state
    pub fn seed(&self, cloud: &InMemoryCloud) {
        StateFile::open(self.state_path()).unwrap().save(cloud).unwrap();
    }

    /// Reload the simulated state written by the last run
    pub fn cloud(&self) -> InMemoryCloud {
        StateFile::open(self.state_path()).unwrap().load().unwrap()
    }

    pub fn run(&self, args: &[&str]) -> TestResult {
        self.run_with_env(args, &[])
    }

    /// Run with `--simulate cloud.json` appended
    pub fn run_sim(&self, args: &[&str]) -> TestResult {
        let state = self.state_path();
        let mut full: Vec<&str> = args.to_vec();
        full.push("--simulate");
        full.push(state.to_str().unwrap());
        self.run(&full)
    }

    pub fn run_with_env(&self, args: &[&str], env_vars: &[(&str, &str)]) -> TestResult {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .current_dir(self.dir.path())
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join(".config"))
            .env_remove("RUST_LOG")
            .env_remove("TETHER_CONCURRENCY")
            .env_remove("TETHER_MAX_ATTEMPTS")
            .env_remove("TETHER_TAG_PREFIX")
            .env_remove("TETHER_OUTPUT");
        for (key, value) in env_vars {
            cmd.env(key, value);
        }
        output_to_result(cmd.output().unwrap())
    }
}

fn output_to_result(output: Output) -> TestResult {
    TestResult {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}
