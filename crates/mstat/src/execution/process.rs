//! Process plumbing shared by the supervisor and the bootstrap hop

use std::ffi::{OsStr, OsString};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Child;

use log::warn;
use mstat_core::{MstatError, Result};
use nix::unistd::{AccessFlags, Pid, access};

const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Host environment with `overrides` applied on top; an override replaces an
/// inherited variable of the same name in place.
///
/// Names and values are kept as raw bytes, so variables that are not UTF-8
/// pass through to the target untouched.
pub fn prepare_environment(overrides: &[(String, String)]) -> Vec<(OsString, OsString)> {
    let mut combined: Vec<(OsString, OsString)> = std::env::vars_os().collect();

    for (key, value) in overrides {
        let key = OsStr::new(key);
        if let Some((_, existing)) = combined.iter_mut().find(|(k, _)| k.as_os_str() == key) {
            *existing = OsString::from(value);
        } else {
            combined.push((key.to_os_string(), OsString::from(value)));
        }
    }

    combined
}

/// Resolve a program name to an executable path using PATH semantics.
pub fn resolve_program_path(
    program: &str,
    env: &[(OsString, OsString)],
) -> std::result::Result<PathBuf, String> {
    if program.contains('/') {
        return if access(program, AccessFlags::X_OK).is_ok() {
            Ok(PathBuf::from(program))
        } else {
            Err(format!("{}: not an executable file", program))
        };
    }

    let path_value = env
        .iter()
        .find(|(key, _)| key == "PATH")
        .map(|(_, value)| value.as_os_str())
        .unwrap_or(OsStr::new(DEFAULT_PATH));

    for entry in std::env::split_paths(path_value) {
        let dir = if entry.as_os_str().is_empty() {
            Path::new(".")
        } else {
            entry.as_path()
        };
        let candidate = dir.join(program);

        if candidate.is_file() && access(&candidate, AccessFlags::X_OK).is_ok() {
            return Ok(candidate);
        }
    }

    Err(format!("command not found: {}", program))
}

/// How the measured command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited normally with this status
    Exited(i32),
    /// Killed by this signal
    Signaled(i32),
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }

    /// Shell-style exit code: the status itself, or 128 + signal
    pub fn code(&self) -> i32 {
        match *self {
            ExitOutcome::Exited(code) => code,
            ExitOutcome::Signaled(signal) => 128 + signal,
        }
    }

    /// Treat anything but a clean exit as an error
    pub fn into_result(self) -> Result<()> {
        match self {
            ExitOutcome::Exited(0) => Ok(()),
            ExitOutcome::Exited(code) => Err(MstatError::TargetExit { code }),
            ExitOutcome::Signaled(signal) => Err(MstatError::TargetSignal { signal }),
        }
    }

    /// Record a non-clean exit in the log
    pub fn log(&self) {
        match *self {
            ExitOutcome::Exited(0) => {}
            ExitOutcome::Exited(code) => warn!("command exited with code {}", code),
            ExitOutcome::Signaled(signal) => warn!("command killed by signal {}", signal),
        }
    }
}

impl TryFrom<std::process::ExitStatus> for ExitOutcome {
    type Error = MstatError;

    fn try_from(status: std::process::ExitStatus) -> Result<Self> {
        if let Some(code) = status.code() {
            return Ok(ExitOutcome::Exited(code));
        }
        if let Some(signal) = status.signal() {
            return Ok(ExitOutcome::Signaled(signal));
        }
        Err(MstatError::Wait(format!("unrecognized exit status: {}", status)))
    }
}

/// A spawned child the supervisor can register, wait for, and kill
pub trait LaunchedChild {
    fn pid(&self) -> Pid;

    /// Block until the child exits
    fn wait(&mut self) -> Result<ExitOutcome>;

    /// Kill the child; used only on internal error paths
    fn kill(&mut self) -> Result<()>;
}

impl LaunchedChild for Child {
    fn pid(&self) -> Pid {
        Pid::from_raw(self.id() as i32)
    }

    fn wait(&mut self) -> Result<ExitOutcome> {
        let status = Child::wait(self).map_err(|e| MstatError::Wait(e.to_string()))?;
        ExitOutcome::try_from(status)
    }

    fn kill(&mut self) -> Result<()> {
        Child::kill(self).map_err(|e| MstatError::Wait(format!("kill: {}", e)))
    }
}
