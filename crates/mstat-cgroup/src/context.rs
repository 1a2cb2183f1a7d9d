//! The operations the supervisor and sampler need from a resource group

use mstat_core::Result;
use nix::unistd::Pid;

use crate::stats::MemoryStats;

/// A kernel resource group a process can be placed in and measured through.
///
/// The supervisor is the only caller of [`ResourceContext::add_process`];
/// the sampler only ever calls [`ResourceContext::memory_stats`], from its
/// own thread, so implementations must be shareable across threads.
pub trait ResourceContext: Send + Sync + 'static {
    /// Name the group was created under
    fn name(&self) -> &str;

    /// Move `pid` into the group
    fn add_process(&self, pid: Pid) -> Result<()>;

    /// Read the group's current memory statistics
    fn memory_stats(&self) -> Result<MemoryStats>;
}
