//! mstat-cgroup: memory accounting via cgroup v2
//!
//! Creates a throwaway cgroup with a memory ceiling, moves a process into it
//! and reads point-in-time memory statistics while the process runs.

pub mod cgroup;
pub mod context;
pub mod stats;

pub use cgroup::{Cgroup, CgroupConfig, DEFAULT_MEMORY_LIMIT, cgroup_root_path};
pub use context::ResourceContext;
pub use stats::MemoryStats;
