// file: src/system/exec.rs
// version: 1.0.0
// guid: 715417de-61f7-48d3-8c79-440319e88ad7

//! External command execution

use crate::error::{MeshError, Result};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::debug;

/// Result of one command execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout and stderr joined, for error messages
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }
}

/// Trait for running external programs
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program to completion. Spawn failures are errors; a non-zero
    /// exit is reported through [`ExecResult`].
    async fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run and turn a non-zero exit into an error
    async fn run_checked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let result = self.run(program, args).await?;
        if !result.success() {
            return Err(MeshError::system(format!(
                "{} {} exited with {}: {}",
                program,
                args.join(" "),
                result.exit_code,
                result.combined_output()
            )));
        }
        Ok(result)
    }
}

/// Runs commands on the local host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait::async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        debug!(command = %program, args = ?args, "Executing command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MeshError::system(format!("Failed to execute {}: {}", program, e)))?;

        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Records invocations and answers with canned results. Commands without a
/// canned result succeed with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    responses: Mutex<Vec<(String, ExecResult)>>,
    unavailable: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `result`
    pub fn respond(self, prefix: impl Into<String>, result: ExecResult) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push((prefix.into(), result));
        }
        self
    }

    /// Shorthand for a failing command
    pub fn fail(self, prefix: impl Into<String>, exit_code: i32, stderr: &str) -> Self {
        self.respond(
            prefix,
            ExecResult {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        )
    }

    /// Make commands starting with `prefix` fail to spawn
    pub fn unavailable(self, prefix: impl Into<String>) -> Self {
        if let Ok(mut unavailable) = self.unavailable.lock() {
            unavailable.push(prefix.into());
        }
        self
    }

    /// Command lines seen so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        let spawn_fails = self
            .unavailable
            .lock()
            .map(|u| u.iter().any(|prefix| line.starts_with(prefix.as_str())))
            .unwrap_or(false);
        if spawn_fails {
            return Err(MeshError::system(format!("Failed to execute {}: not found", program)));
        }

        let responses = self
            .responses
            .lock()
            .map_err(|_| MeshError::system("recording runner poisoned"))?;
        Ok(responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let result = SystemRunner.run("sh", &["-c", "echo out; echo err >&2; exit 3"]).await;
        if let Ok(result) = result {
            assert_eq!(result.exit_code, 3);
            assert_eq!(result.stdout.trim(), "out");
            assert_eq!(result.combined_output(), "out\nerr");
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let result = SystemRunner.run("/nonexistent/pve-mesh-test-binary", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recording_runner() {
        let runner = RecordingRunner::new().fail("ifreload", 1, "boom");
        let ok = runner.run("systemctl", &["restart", "frr.service"]).await.unwrap();
        assert!(ok.success());

        let err = runner.run_checked("ifreload", &["-a"]).await.unwrap_err();
        assert!(err.to_string().contains("ifreload -a exited with 1: boom"));

        assert_eq!(
            runner.calls(),
            vec!["systemctl restart frr.service".to_string(), "ifreload -a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_recording_runner_unavailable_program() {
        let runner = RecordingRunner::new().unavailable("vtysh");
        assert!(runner.run("vtysh", &["-c", "show version"]).await.is_err());
        assert!(runner.run("ip", &["link"]).await.is_ok());
        assert_eq!(runner.calls().len(), 2);
    }
}
