//! Entry-point dispatch between the supervisor and the bootstrap hop
//!
//! The supervisor re-executes its own binary with a private marker argument
//! in front of the user's command. The marker names the descriptor the
//! handshake pipe was installed on. Nothing else distinguishes the two runs,
//! so the choice is made exactly once, here.

use std::os::unix::io::RawFd;

use mstat_core::{MstatError, Result};

use crate::config::LaunchConfig;

/// Prefix of the private marker argument
pub const INTERNAL_FD_PREFIX: &str = "--INTERNAL_FD=";

/// Descriptor the handshake pipe's read end is installed on in the bootstrap hop
pub const HANDSHAKE_FD: RawFd = 3;

/// Marker argument for descriptor `fd`
pub fn internal_marker(fd: RawFd) -> String {
    format!("{}{}", INTERNAL_FD_PREFIX, fd)
}

/// What the bootstrap hop needs to finish the handshake and exec the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Inherited read end of the handshake pipe
    pub fd: RawFd,
    pub program: String,
    pub args: Vec<String>,
    /// Environment overrides forwarded by the supervisor
    pub env: Vec<(String, String)>,
}

/// How this process was asked to behave
#[derive(Debug, Clone)]
pub enum Mode {
    /// Launch and measure the command
    Supervisor(LaunchConfig),
    /// Wait for the handshake, then become the command
    Bootstrap(BootstrapConfig),
}

impl Mode {
    /// Pick the mode from a config parsed off the command line.
    ///
    /// A program of the form `--INTERNAL_FD=<fd>` selects bootstrap mode; the
    /// real program and its arguments follow it.
    pub fn select(config: LaunchConfig) -> Result<Self> {
        let Some(fd) = config.program.strip_prefix(INTERNAL_FD_PREFIX) else {
            return Ok(Mode::Supervisor(config));
        };

        let fd: RawFd = fd.parse().map_err(|e| {
            MstatError::Handshake(format!("bad descriptor in {:?}: {}", config.program, e))
        })?;
        if fd < 0 {
            return Err(MstatError::Handshake(format!(
                "expected a non-negative descriptor, not {}",
                fd
            )));
        }

        let mut rest = config.args.into_iter();
        let Some(program) = rest.next() else {
            return Err(MstatError::Handshake(
                "no command after the internal marker".to_string(),
            ));
        };

        Ok(Mode::Bootstrap(BootstrapConfig {
            fd,
            program,
            args: rest.collect(),
            env: config.env,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(program: &str, args: &[&str]) -> LaunchConfig {
        LaunchConfig::new(program, args.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn plain_command_selects_supervisor() {
        let mode = Mode::select(launch("sleep", &["1"])).unwrap();
        match mode {
            Mode::Supervisor(config) => {
                assert_eq!(config.program, "sleep");
                assert_eq!(config.args, vec!["1"]);
            }
            Mode::Bootstrap(_) => panic!("expected supervisor mode"),
        }
    }

    #[test]
    fn marker_selects_bootstrap() {
        let mut config = launch(&internal_marker(3), &["python3", "-c", "pass"]);
        config.env.push(("K".to_string(), "V".to_string()));

        let mode = Mode::select(config).unwrap();
        let Mode::Bootstrap(bootstrap) = mode else {
            panic!("expected bootstrap mode")
        };
        assert_eq!(
            bootstrap,
            BootstrapConfig {
                fd: 3,
                program: "python3".to_string(),
                args: vec!["-c".to_string(), "pass".to_string()],
                env: vec![("K".to_string(), "V".to_string())],
            }
        );
    }

    #[test]
    fn malformed_markers_are_protocol_errors() {
        for (program, args) in [
            ("--INTERNAL_FD=three", vec!["true"]),
            ("--INTERNAL_FD=-1", vec!["true"]),
            ("--INTERNAL_FD=", vec!["true"]),
            ("--INTERNAL_FD=3", vec![]),
        ] {
            let err = Mode::select(launch(program, &args)).unwrap_err();
            assert!(err.is_protocol_bug(), "{} {:?}: {}", program, args, err);
        }
    }

    #[test]
    fn marker_format() {
        assert_eq!(internal_marker(HANDSHAKE_FD), "--INTERNAL_FD=3");
    }
}
