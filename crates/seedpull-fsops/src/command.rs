//! Subordinate process invocation.
//!
//! # Design
//! - Commands are explicit argument vectors; no shell is ever involved.
//! - Secrets travel through the environment, and `Display` redacts env values
//!   so a command can be logged as-is.
//! - `CommandRunner` is the seam tests replace with a simulated runner.

use std::fmt;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{FsOpsError, FsOpsResult};

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name resolved through `PATH`.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Start a command without arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, _) in &self.env {
            write!(f, "{key}=<redacted> ")?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '\'') {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Executes commands to completion.
pub trait CommandRunner: Send + Sync {
    /// Run `spec` and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::CommandSpawn`] when the program cannot be started
    /// and [`FsOpsError::CommandFailed`] when it exits unsuccessfully.
    fn run(&self, operation: &'static str, spec: &CommandSpec) -> FsOpsResult<()>;
}

/// Runs commands with [`std::process::Command`], inheriting stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, operation: &'static str, spec: &CommandSpec) -> FsOpsResult<()> {
        debug!(operation, command = %spec, "running command");
        let status = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| FsOpsError::CommandSpawn {
                operation,
                program: spec.program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(FsOpsError::CommandFailed {
                operation,
                program: spec.program.clone(),
                status: status.code(),
            })
        }
    }
}

/// Quote `value` as a single word for lftp's command parser.
#[must_use]
pub fn lftp_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Reverse of [`lftp_quote`] for a single quoted word; `None` when `word` is not quoted.
#[must_use]
pub fn lftp_unquote(word: &str) -> Option<String> {
    let inner = word.strip_prefix('"')?.strip_suffix('"')?;
    let mut value = String::with_capacity(inner.len());
    let mut escaped = false;
    for ch in inner.chars() {
        if escaped {
            value.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            value.push(ch);
        }
    }
    Some(value)
}
