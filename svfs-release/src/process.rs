//! Structured invocation of external tools.
//!
//! Every compiler and packager call goes through [`Cmd`], which passes an
//! explicit argument vector to the OS (no shell) and captures the exit status
//! and output of the process.

use std::ffi::OsString;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use crate::error::{ReleaseError, Result};

/// Outcome of one external command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: ExitStatus,
    /// Raw standard output; archive tools write binary data here.
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 when the process was killed by a signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// The most useful diagnostic output: stderr, or stdout when stderr is empty.
    pub fn diagnostics(&self) -> String {
        if self.stderr.trim().is_empty() {
            String::from_utf8_lossy(&self.stdout).trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// Builder for an external command.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    input: Option<Vec<u8>>,
}

impl Cmd {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            input: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the working directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Feed `input` to the process on stdin. Without it stdin is closed.
    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    /// Run to completion, capturing output. A non-zero exit is not an error
    /// here; callers decide which failure it maps to.
    pub fn run(&self) -> Result<CommandResult> {
        tracing::debug!("Running: {}", self);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        let stdin = if self.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        cmd.stdin(stdin).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| ReleaseError::ToolNotFound {
            program: self.program(),
            source,
        })?;

        // stdin is fed while stdout drains
        let writer = match (child.stdin.take(), self.input.clone()) {
            (Some(mut stdin), Some(input)) => {
                Some(thread::spawn(move || stdin.write_all(&input)))
            }
            _ => None,
        };

        let output = child.wait_with_output()?;

        if let Some(writer) = writer {
            // a child that stops reading early fails through its status
            if let Ok(Err(e)) = writer.join() {
                if output.status.success() {
                    return Err(e.into());
                }
            }
        }

        let result = CommandResult {
            status: output.status,
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            tracing::debug!("'{}' exited with code {}", self.program(), result.code());
        }

        Ok(result)
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.envs {
            write!(f, "{key}={value} ")?;
        }
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}
