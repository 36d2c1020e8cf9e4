//! Package update listing backed by `pacman`.

use std::io;
use std::process::Command;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{METHODS_TARGET, Method, MethodError, MethodResult, expect_arity};

const PACMAN: &str = "pacman";
const SYNC_ARGS: &[&str] = &["-Sy"];
const QUERY_ARGS: &[&str] = &["-Sup"];

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub status: Option<i32>,
    /// Standard output decoded lossily as UTF-8.
    pub stdout: String,
    /// Standard error decoded lossily as UTF-8.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the process exited with status zero.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external programs on behalf of a method.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`, waiting for it to exit.
    fn run(&self, program: &str, args: &[&'static str]) -> io::Result<CommandOutput>;
}

/// Runs programs with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&'static str]) -> io::Result<CommandOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Refreshes the package databases and reports pending upgrades.
///
/// Success yields `{"success": true, "updates": <pacman -Sup output>}`. When
/// either `pacman` invocation exits non-zero the method still succeeds at the
/// protocol level and reports `{"success": false, "exit_code": .., "error":
/// <stderr>}` so waybar modules can render the failure.
#[derive(Debug, Clone, Default)]
pub struct ListUpdates<R = SystemCommandRunner> {
    runner: R,
}

impl<R> ListUpdates<R> {
    /// Name the method is registered under.
    pub const NAME: &'static str = "list_updates";

    /// Creates the method around `runner`.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> ListUpdates<R> {
    fn run_step(&self, args: &[&'static str]) -> Result<CommandOutput, MethodError> {
        debug!(target: METHODS_TARGET, program = PACMAN, ?args, "running package manager");
        self.runner.run(PACMAN, args).map_err(|error| {
            warn!(
                target: METHODS_TARGET,
                program = PACMAN,
                ?args,
                %error,
                "failed to start package manager"
            );
            MethodError::failed(format!("failed to run {PACMAN}: {error}"))
        })
    }
}

impl<R: CommandRunner> Method for ListUpdates<R> {
    fn call(&self, args: &[Value]) -> MethodResult {
        expect_arity(args, 0)?;

        let sync = self.run_step(SYNC_ARGS)?;
        if !sync.succeeded() {
            return Ok(command_failure(&sync));
        }

        let query = self.run_step(QUERY_ARGS)?;
        if !query.succeeded() {
            return Ok(command_failure(&query));
        }

        let mut body = Map::new();
        body.insert("success".to_owned(), Value::Bool(true));
        body.insert("updates".to_owned(), Value::String(query.stdout));
        Ok(body)
    }
}

fn command_failure(output: &CommandOutput) -> Map<String, Value> {
    warn!(
        target: METHODS_TARGET,
        exit_code = ?output.status,
        stderr = %output.stderr.trim_end(),
        "package manager exited unsuccessfully"
    );
    let mut body = Map::new();
    body.insert("success".to_owned(), Value::Bool(false));
    body.insert("exit_code".to_owned(), json!(output.status));
    body.insert("error".to_owned(), Value::String(output.stderr.clone()));
    body
}
