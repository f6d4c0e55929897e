//! Host command execution and identifier minting
//!
//! Every component talks to the host through a [`CommandRunner`] handed to it
//! at construction, so tests can substitute a scripted runner.

use crate::error::{Error, Result};
use std::process::Command;

/// Exit status and captured streams of one host command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Render a command line for logs and error messages
pub fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.contains(char::is_whitespace) || arg.contains(';') {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Port for running host tools
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion without judging its exit status
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command and return stdout, failing on non-zero exit
    fn sh(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = self.run(program, args)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            let command = command_line(program, args);
            tracing::warn!(%command, status = output.status, "host command failed");
            Err(Error::CommandFailed {
                command,
                status: output.status,
                stderr: output.stderr,
            })
        }
    }

    /// Run a command, returning Ok(true) if it succeeds, Ok(false) if it fails
    fn succeeds(&self, program: &str, args: &[&str]) -> Result<bool> {
        Ok(self.run(program, args)?.success())
    }
}

/// Runs commands on the local host via `std::process`
#[derive(Debug)]
pub struct HostRunner;

impl HostRunner {
    /// Create a runner; the SmartOS tools need root
    pub fn new() -> Result<Self> {
        if !nix::unistd::geteuid().is_root() {
            return Err(Error::PermissionDenied);
        }
        Ok(HostRunner)
    }
}

impl CommandRunner for HostRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        tracing::debug!(command = %command_line(program, args), "running host command");
        let output = Command::new(program).args(args).output()?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Source of fresh unique identifiers
pub trait IdSource: Send + Sync {
    fn mint(&self) -> String;
}

/// Random v4 uuids
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn mint(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
