//! mstat: run a command inside a memory cgroup and record its memory usage over time
//!
//! The command is started through a short re-exec hop of the calling binary.
//! The hop blocks on a pipe until the parent has moved it into a fresh cgroup,
//! so not a single instruction of the target runs unaccounted. While the
//! target runs a background sampler reads the cgroup's memory statistics at a
//! fixed frequency; when it exits the series is handed back to the caller.
//!
//! # Modules
//!
//! - **execution**: Supervisor, bootstrap hop, handshake pipe
//! - **monitoring**: Sampler and the recorded series
//! - **mode**: Selecting supervisor or bootstrap behavior at entry
//! - **report**: TSV and JSON output
//!
//! # Example
//!
//! ```ignore
//! use mstat::{LaunchConfig, Supervisor};
//!
//! let config = LaunchConfig::new("python3", vec!["script.py".to_string()]);
//! let outcome = Supervisor::launch(&config)?;
//! println!("{} samples, exit code {}", outcome.series.len(), outcome.exit.code());
//! ```

pub mod config;
pub mod execution;
pub mod mode;
pub mod monitoring;
pub mod report;

pub use config::{LaunchConfig, SamplerConfig, parse_env_assignment};
pub use execution::{ExitOutcome, LaunchOutcome, LaunchedChild, Supervisor};
pub use mode::{BootstrapConfig, Mode};
pub use monitoring::{Clock, Record, Sampler, SamplerState, SeriesSnapshot, SystemClock};

pub use mstat_cgroup::{Cgroup, CgroupConfig, MemoryStats, ResourceContext, cgroup_root_path};
pub use mstat_core::{MstatError, Result, capabilities::SystemCapabilities, privilege, util};
