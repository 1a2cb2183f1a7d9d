//! Single-use parent to child "all clear to exec" pipe
//!
//! The supervisor keeps the write end and the bootstrap hop inherits the read
//! end. The bootstrap blocks reading until the supervisor has placed it in
//! the cgroup and writes [`SENTINEL`]. Both ends are consumed by their one
//! operation, so the pipe is closed on each side as soon as it has been used.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use log::debug;
use mstat_core::{MstatError, Result};
use nix::fcntl::{FcntlArg, OFlag, fcntl};

/// The only message ever sent over the pipe
pub const SENTINEL: &[u8; 2] = b"ok";

/// Open the pipe. Both ends are close-on-exec; the supervisor installs the
/// read end on a fixed descriptor in the child explicitly.
pub fn channel() -> Result<(HandshakeReader, HandshakeWriter)> {
    let (read, write) = nix::unistd::pipe2(OFlag::O_CLOEXEC)
        .map_err(|e| MstatError::Handshake(format!("pipe: {}", e)))?;
    Ok((
        HandshakeReader::new(File::from(read)),
        HandshakeWriter::new(File::from(write)),
    ))
}

/// Supervisor side of the handshake
#[derive(Debug)]
pub struct HandshakeWriter<W: Write = File> {
    inner: W,
}

impl<W: Write> HandshakeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Tell the child it may exec. Consumes and closes the write end.
    ///
    /// The sentinel is written with a single `write`; anything short of the
    /// full two bytes is a protocol error rather than something to retry.
    pub fn release(mut self) -> Result<()> {
        let written = self
            .inner
            .write(SENTINEL)
            .map_err(|e| MstatError::Handshake(format!("pipe write: {}", e)))?;
        if written != SENTINEL.len() {
            return Err(MstatError::Handshake(format!(
                "short write: {}/{} bytes",
                written,
                SENTINEL.len()
            )));
        }
        self.inner
            .flush()
            .map_err(|e| MstatError::Handshake(format!("pipe flush: {}", e)))?;
        debug!("handshake released");
        Ok(())
    }
}

/// Bootstrap side of the handshake
#[derive(Debug)]
pub struct HandshakeReader<R: Read = File> {
    inner: R,
}

impl HandshakeReader<File> {
    /// Adopt an inherited descriptor.
    ///
    /// Fails if `fd` is not open, which means the supervisor did not set up
    /// the pipe the way the marker claims.
    pub fn from_inherited_fd(fd: RawFd) -> Result<Self> {
        fcntl(fd, FcntlArg::F_GETFD)
            .map_err(|e| MstatError::Handshake(format!("descriptor {} not inherited: {}", fd, e)))?;
        // SAFETY: the descriptor is open and nothing else in this process owns it;
        // the supervisor installed it for the bootstrap hop alone.
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self::new(File::from(owned)))
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl<R: Read> HandshakeReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Block until the supervisor releases us. Consumes and closes the read end.
    ///
    /// A sentinel split over several writes is reassembled; end of file
    /// before both bytes, different bytes, or anything after the sentinel
    /// is a protocol error and the caller must not exec.
    pub fn wait(mut self) -> Result<()> {
        let mut buf = [0u8; 2];
        self.inner.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                MstatError::Handshake("short read: pipe closed before the sentinel".to_string())
            }
            _ => MstatError::Handshake(format!("pipe read: {}", e)),
        })?;
        if &buf != SENTINEL {
            return Err(MstatError::Handshake(format!(
                "unexpected sentinel {:?}",
                String::from_utf8_lossy(&buf)
            )));
        }

        let mut trailing = [0u8; 1];
        loop {
            match self.inner.read(&mut trailing) {
                Ok(0) => break,
                Ok(_) => {
                    return Err(MstatError::Handshake(
                        "unexpected data after the sentinel".to_string(),
                    ));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(MstatError::Handshake(format!("pipe read: {}", e))),
            }
        }

        debug!("handshake received");
        Ok(())
    }
}
