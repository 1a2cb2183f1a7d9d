//! Child side of a measurement run
//!
//! Order of operations:
//! 1. Drop to the real uid/gid (before anything else)
//! 2. Block on the inherited handshake pipe until the supervisor has placed
//!    us in the cgroup
//! 3. Close the pipe
//! 4. Replace this process with the target, streams and environment inherited
//!
//! Any failure means the launcher is broken, not the target, and the hop
//! exits without ever exec'ing.

use std::convert::Infallible;
use std::os::unix::process::CommandExt;
use std::process::Command;

use log::debug;
use mstat_core::privilege::drop_to_real_ids;
use mstat_core::{MstatError, Result};

use crate::execution::handshake::HandshakeReader;
use crate::execution::process::{prepare_environment, resolve_program_path};
use crate::mode::BootstrapConfig;

/// Run the bootstrap hop. Only returns on failure.
pub fn run(config: BootstrapConfig) -> Result<Infallible> {
    drop_to_real_ids()?;

    let reader = HandshakeReader::from_inherited_fd(config.fd)?;
    reader.wait()?;

    exec_target(&config)
}

/// Replace the current process image with the target command
fn exec_target(config: &BootstrapConfig) -> Result<Infallible> {
    let env = prepare_environment(&config.env);
    let program = resolve_program_path(&config.program, &env).map_err(MstatError::Spawn)?;
    debug!("exec {} {:?}", program.display(), config.args);

    let err = Command::new(&program)
        .arg0(&config.program)
        .args(&config.args)
        .env_clear()
        .envs(env)
        .exec();

    Err(MstatError::Spawn(format!("exec {}: {}", program.display(), err)))
}
