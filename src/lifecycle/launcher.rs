//! Launching a detached replacement of the current process.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::info;

use crate::error::LifecycleError;

/// How the current process was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable path.
    pub program: PathBuf,
    /// Arguments, without the program name.
    pub args: Vec<OsString>,
    /// Full environment.
    pub env: Vec<(OsString, OsString)>,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Invocation {
    /// Capture the running process's invocation.
    pub fn current() -> Result<Self, LifecycleError> {
        Ok(Self {
            program: std::env::current_exe().map_err(LifecycleError::Invocation)?,
            args: std::env::args_os().skip(1).collect(),
            env: std::env::vars_os().collect(),
            cwd: std::env::current_dir().map_err(LifecycleError::Invocation)?,
        })
    }

    /// Build a command reproducing this invocation.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env_clear()
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&self.cwd)
            .stdin(Stdio::null());
        command
    }
}

/// Starts a replacement process.
pub trait ProcessLauncher: Send + Sync {
    /// Launch the replacement and return its pid. The child must outlive us.
    fn launch(&self) -> Result<u32, LifecycleError>;
}

/// Re-executes the captured invocation as a detached child.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    invocation: Invocation,
}

impl CommandLauncher {
    /// Launcher for `invocation`.
    pub fn new(invocation: Invocation) -> Self {
        Self { invocation }
    }

    /// Launcher for the running process.
    pub fn current() -> Result<Self, LifecycleError> {
        Ok(Self::new(Invocation::current()?))
    }
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&self) -> Result<u32, LifecycleError> {
        let mut command = self.invocation.command();

        // Own process group so a signal to ours does not reach the child.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        // The child handle is dropped without waiting.
        let child = command.spawn().map_err(LifecycleError::Spawn)?;
        let pid = child.id();
        info!(
            pid,
            program = %self.invocation.program.display(),
            "Replacement process launched"
        );
        Ok(pid)
    }
}
