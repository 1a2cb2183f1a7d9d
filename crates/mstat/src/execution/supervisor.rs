//! Parent side of a measurement run
//!
//! Order of operations:
//! 1. Validate the configuration (before any cgroup exists)
//! 2. Create the cgroup (deleted on every exit path by `Drop`)
//! 3. Open the handshake pipe and re-exec ourselves as the bootstrap hop
//! 4. Add the child's pid to the cgroup
//! 5. Start the sampler (baseline sample)
//! 6. Release the handshake; only now may the child exec the target
//! 7. Wait for the child, stop the sampler, return the series

use std::io::Write;
use std::os::fd::RawFd;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::Arc;

use log::{debug, info};
use mstat_cgroup::{Cgroup, ResourceContext, cgroup_root_path};
use mstat_core::{MstatError, Result};

use crate::config::{LaunchConfig, SamplerConfig};
use crate::execution::handshake::{self, HandshakeReader, HandshakeWriter};
use crate::execution::process::{
    ExitOutcome, LaunchedChild, prepare_environment, resolve_program_path,
};
use crate::mode::{HANDSHAKE_FD, internal_marker};
use crate::monitoring::{Clock, Sampler, SeriesSnapshot, SystemClock};

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub series: SeriesSnapshot,
    pub exit: ExitOutcome,
}

/// Launches a command in a resource context and samples it until exit
pub struct Supervisor<R: ResourceContext, C: Clock + Clone = SystemClock> {
    context: Arc<R>,
    clock: C,
}

impl Supervisor<Cgroup> {
    /// Run `config.program` in a fresh cgroup and record its memory usage.
    ///
    /// The cgroup is deleted before this returns, whatever the outcome.
    pub fn launch(config: &LaunchConfig) -> Result<LaunchOutcome> {
        Self::launch_in(&cgroup_root_path(), config)
    }

    /// Like `launch`, with the cgroup created under `root`
    pub fn launch_in(root: &Path, config: &LaunchConfig) -> Result<LaunchOutcome> {
        config.validate()?;

        let cgroup = Cgroup::create_in(root, &Cgroup::unique_name(), &config.cgroup)?;
        info!(
            "created cgroup {} (memory limit: {:?})",
            cgroup.path().display(),
            config.cgroup.memory_limit
        );

        Supervisor::new(Arc::new(cgroup)).run(config)
    }
}

impl<R: ResourceContext> Supervisor<R> {
    pub fn new(context: Arc<R>) -> Self {
        Self::with_clock(context, SystemClock)
    }
}

impl<R: ResourceContext, C: Clock + Clone> Supervisor<R, C> {
    pub fn with_clock(context: Arc<R>, clock: C) -> Self {
        Self { context, clock }
    }

    /// Spawn the bootstrap hop for `config` and supervise it
    pub fn run(&self, config: &LaunchConfig) -> Result<LaunchOutcome> {
        config.validate()?;

        let env = prepare_environment(&config.env);
        let program = resolve_program_path(&config.program, &env).map_err(MstatError::Spawn)?;
        debug!("resolved {} to {}", config.program, program.display());

        let (reader, writer) = handshake::channel()?;
        let child = spawn_bootstrap(config, reader)?;

        self.supervise(child, writer, &config.sampler)
    }

    /// The ordering-critical part of a run, for an already spawned child
    /// that is blocked on the other end of `release`.
    pub fn supervise<K: LaunchedChild, W: Write>(
        &self,
        mut child: K,
        release: HandshakeWriter<W>,
        sampler: &SamplerConfig,
    ) -> Result<LaunchOutcome> {
        let pid = child.pid();

        let sampler = match self.admit(&child, release, sampler) {
            Ok(sampler) => sampler,
            Err(e) => {
                debug!("aborting child {}: {}", pid, e);
                abort_child(&mut child);
                return Err(e);
            }
        };

        let exit = match child.wait() {
            Ok(exit) => exit,
            Err(e) => {
                drop(sampler.shutdown());
                return Err(e);
            }
        };
        exit.log();
        info!("command exited: {:?}", exit);

        let series = sampler.shutdown();
        Ok(LaunchOutcome { series, exit })
    }

    /// Register the child, start sampling, then let it exec.
    fn admit<K: LaunchedChild, W: Write>(
        &self,
        child: &K,
        release: HandshakeWriter<W>,
        config: &SamplerConfig,
    ) -> Result<Sampler> {
        let pid = child.pid();

        self.context.add_process(pid)?;
        debug!("added pid {} to {}", pid, self.context.name());

        let sampler = Sampler::start(Arc::clone(&self.context), config, self.clock.clone())?;

        // Sampler is dropped (and its thread joined) if the release fails
        release.release()?;
        Ok(sampler)
    }
}

fn abort_child<K: LaunchedChild>(child: &mut K) {
    if let Err(e) = child.kill() {
        debug!("kill child: {}", e);
    }
    if let Err(e) = child.wait() {
        debug!("reap child: {}", e);
    }
}

/// Arguments for the bootstrap hop: env overrides as flags, then the marker
/// and the user's command after `--`
pub fn bootstrap_args(config: &LaunchConfig) -> Vec<String> {
    let mut args = Vec::with_capacity(config.env.len() * 2 + config.args.len() + 3);
    for (key, value) in &config.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push("--".to_string());
    args.push(internal_marker(HANDSHAKE_FD));
    args.push(config.program.clone());
    args.extend(config.args.iter().cloned());
    args
}

fn bootstrap_exe(config: &LaunchConfig) -> Result<PathBuf> {
    match &config.bootstrap_exe {
        Some(path) => Ok(path.clone()),
        None => std::env::current_exe()
            .map_err(|e| MstatError::Spawn(format!("cannot locate own executable: {}", e))),
    }
}

/// Re-exec ourselves with the read end of the pipe on `HANDSHAKE_FD`.
///
/// Our copy of the read end is closed once the child holds its own, so the
/// child sees end of file if we die before releasing it.
fn spawn_bootstrap(config: &LaunchConfig, reader: HandshakeReader) -> Result<Child> {
    let exe = bootstrap_exe(config)?;
    let read_fd = reader.as_raw_fd();

    let mut cmd = Command::new(&exe);
    cmd.args(bootstrap_args(config));
    // SAFETY: the closure only issues async-signal-safe syscalls
    unsafe {
        cmd.pre_exec(move || install_fd(read_fd, HANDSHAKE_FD));
    }

    let child = cmd
        .spawn()
        .map_err(|e| MstatError::Spawn(format!("{}: {}", exe.display(), e)))?;
    drop(reader);

    debug!("spawned bootstrap hop pid {}", child.id());
    Ok(child)
}

/// Child side of `spawn_bootstrap`: make `src` available as `dst` across exec
fn install_fd(src: RawFd, dst: RawFd) -> std::io::Result<()> {
    // SAFETY: plain descriptor syscalls in the forked child
    let rc = unsafe {
        if src == dst {
            // dup2 would be a no-op and leave close-on-exec set
            libc::fcntl(dst, libc::F_SETFD, 0)
        } else {
            libc::dup2(src, dst)
        }
    };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_args_layout() {
        let mut config = LaunchConfig::new("python3", vec!["-c".to_string(), "pass".to_string()]);
        config.env = vec![
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "x=y".to_string()),
        ];
        assert_eq!(
            bootstrap_args(&config),
            vec![
                "--env",
                "A=1",
                "--env",
                "B=x=y",
                "--",
                "--INTERNAL_FD=3",
                "python3",
                "-c",
                "pass",
            ]
        );
    }

    #[test]
    fn bootstrap_args_without_env() {
        let config = LaunchConfig::new("true", vec![]);
        assert_eq!(bootstrap_args(&config), vec!["--", "--INTERNAL_FD=3", "true"]);
    }

    #[test]
    fn bootstrap_exe_defaults_to_current_exe() {
        let config = LaunchConfig::new("true", vec![]);
        assert_eq!(bootstrap_exe(&config).unwrap(), std::env::current_exe().unwrap());

        let mut config = LaunchConfig::new("true", vec![]);
        config.bootstrap_exe = Some(PathBuf::from("/usr/bin/mstat"));
        assert_eq!(bootstrap_exe(&config).unwrap(), PathBuf::from("/usr/bin/mstat"));
    }

    #[test]
    fn spawned_child_sees_handshake_on_fd_3() {
        let (reader, writer) = handshake::channel().unwrap();
        let read_fd = reader.as_raw_fd();

        // The child checks that fd 3 carries the sentinel and then EOF
        let mut cmd = Command::new("sh");
        cmd.args(["-c", r#"[ "$(cat <&3)" = ok ]"#]);
        unsafe {
            cmd.pre_exec(move || install_fd(read_fd, HANDSHAKE_FD));
        }
        let mut child = cmd.spawn().unwrap();
        drop(reader);

        writer.release().unwrap();
        assert_eq!(LaunchedChild::wait(&mut child).unwrap(), ExitOutcome::Exited(0));
    }
}
