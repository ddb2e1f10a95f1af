//! External process execution.
//!
//! The lifecycle manager only ever needs "run this argv and tell me how it
//! exited". [`ProcessRunner`] captures exactly that so tests can swap in a
//! recording fake.

#[cfg(any(test, feature = "test-util"))]
use std::collections::HashMap;
use std::fmt;
#[cfg(any(test, feature = "test-util"))]
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split an argv list into program and arguments. `None` if empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a process ended. `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Runs an external command to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync + 'static {
    async fn run(&self, command: &CommandSpec) -> std::io::Result<ExitOutcome>;
}

/// Spawns real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> std::io::Result<ExitOutcome> {
        debug!(%command, "spawning");
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let outcome = ExitOutcome {
            code: output.status.code(),
        };
        if !outcome.is_success() {
            warn!(
                %command,
                %outcome,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "command failed"
            );
        }
        Ok(outcome)
    }
}

/// Records every command instead of running it.
///
/// Commands exit 0 unless a different code was scripted for their program
/// or for their full command line. Available with the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    calls: Arc<Mutex<Vec<CommandSpec>>>,
    outcomes: Arc<Mutex<HashMap<String, ExitOutcome>>>,
}

#[cfg(any(test, feature = "test-util"))]
impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every run of `program` (or of an exact command line) end with `outcome`.
    pub fn script(&self, program_or_line: &str, outcome: ExitOutcome) {
        self.outcomes
            .lock()
            .expect("scripted outcomes")
            .insert(program_or_line.to_string(), outcome);
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("scripted calls").clone()
    }

    /// Calls rendered as command lines, in order.
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> std::io::Result<ExitOutcome> {
        self.calls.lock().expect("scripted calls").push(command.clone());
        let outcomes = self.outcomes.lock().expect("scripted outcomes");
        Ok(outcomes
            .get(&command.to_string())
            .or_else(|| outcomes.get(&command.program))
            .copied()
            .unwrap_or_else(ExitOutcome::success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_argv_splits_program() {
        let argv = vec!["service".to_string(), "nginx".to_string(), "reload".to_string()];
        let cmd = CommandSpec::from_argv(&argv).unwrap();
        assert_eq!(cmd.program, "service");
        assert_eq!(cmd.args, vec!["nginx", "reload"]);
        assert_eq!(cmd.to_string(), "service nginx reload");
        assert!(CommandSpec::from_argv(&[]).is_none());
    }

    #[test]
    fn outcome_display() {
        assert_eq!(ExitOutcome::code(2).to_string(), "exit code 2");
        assert_eq!(ExitOutcome { code: None }.to_string(), "terminated by signal");
        assert!(ExitOutcome::success().is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_reports_exit_codes() {
        let ok = SystemRunner.run(&CommandSpec::new("true", vec![])).await.unwrap();
        assert!(ok.is_success());

        let failed = SystemRunner
            .run(&CommandSpec::new("sh", vec!["-c".to_string(), "exit 3".to_string()]))
            .await
            .unwrap();
        assert_eq!(failed, ExitOutcome::code(3));
    }

    #[tokio::test]
    async fn scripted_runner_records_and_scripts() {
        let runner = ScriptedRunner::new();
        runner.script("certbot", ExitOutcome::code(1));
        runner.script("service nginx stop", ExitOutcome::code(7));

        let certbot = runner.run(&CommandSpec::new("certbot", vec!["certonly".to_string()])).await.unwrap();
        let stop = runner
            .run(&CommandSpec::new("service", vec!["nginx".to_string(), "stop".to_string()]))
            .await
            .unwrap();
        let start = runner
            .run(&CommandSpec::new("service", vec!["nginx".to_string(), "start".to_string()]))
            .await
            .unwrap();

        assert_eq!(certbot, ExitOutcome::code(1));
        assert_eq!(stop, ExitOutcome::code(7));
        assert!(start.is_success());
        assert_eq!(runner.lines(), vec!["certbot certonly", "service nginx stop", "service nginx start"]);
    }

    #[tokio::test]
    async fn system_runner_surfaces_spawn_errors() {
        let err = SystemRunner
            .run(&CommandSpec::new("definitely-not-a-real-binary-berth", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
