// prep-aio/src/process.rs
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Output as StdOutput, Stdio};

use prep_common::error::{PrepError, Result};
use tracing::{debug, error};

/// A command line to run: program and arguments.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Human-readable rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn to_command(&self) -> Command {
        debug!("Running command: {}", self.display());
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null()); // Prevent hanging on stdin
        cmd
    }
}

/// Runs a command and captures its output. A non-zero exit is not an error
/// here; callers inspect `output.status`.
pub fn run_command_captured(spec: &CommandSpec) -> Result<StdOutput> {
    let mut cmd = spec.to_command();
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    match cmd.output() {
        Ok(output) => {
            if !output.status.success() {
                debug!("Command failed with status: {}", output.status);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    debug!("Stdout:\n{}", stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Command finished successfully.");
            }
            Ok(output)
        }
        Err(e) => {
            error!("Failed to execute {}: {}", spec.display(), e);
            Err(PrepError::CommandExec(format!("{}: {e}", spec.display())))
        }
    }
}

/// Runs a command with stdout/stderr attached to the terminal so the operator
/// sees installer progress live.
pub fn run_command_inherit(spec: &CommandSpec) -> Result<ExitStatus> {
    let mut cmd = spec.to_command();
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());
    match cmd.status() {
        Ok(status) => {
            debug!("{} exited with {}", spec.display(), status);
            Ok(status)
        }
        Err(e) => {
            error!("Failed to execute {}: {}", spec.display(), e);
            Err(PrepError::CommandExec(format!("{}: {e}", spec.display())))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captured_output_keeps_stdout_and_status() {
        let out = run_command_captured(&CommandSpec::new("sh").args(["-c", "echo hi; exit 3"]))
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hi");
        assert_eq!(out.status.code(), Some(3));
    }

    #[test]
    fn missing_program_is_command_exec_error() {
        let err = run_command_captured(&CommandSpec::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, PrepError::CommandExec(_)));
    }

    #[test]
    fn display_joins_arguments() {
        let spec = CommandSpec::new("python").args(["-m", "pip", "list"]);
        assert_eq!(spec.display(), "python -m pip list");
    }
}
