//! Cgroup v2 management for memory accounting

use log::{debug, warn};
use mstat_core::capabilities::CGROUP_V2_ROOT;
use mstat_core::{MstatError, Result};
use nix::unistd::Pid;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::context::ResourceContext;
use crate::stats::MemoryStats;

/// Memory ceiling applied when none is configured: 4 GiB
pub const DEFAULT_MEMORY_LIMIT: u64 = 4 * 1024 * 1024 * 1024;

/// Cgroup v2 resource limits configuration
#[derive(Debug, Clone)]
pub struct CgroupConfig {
    pub memory_limit: Option<u64>,
}

impl Default for CgroupConfig {
    fn default() -> Self {
        Self {
            memory_limit: Some(DEFAULT_MEMORY_LIMIT),
        }
    }
}

impl CgroupConfig {
    pub fn with_memory(limit: u64) -> Self {
        Self {
            memory_limit: Some(limit),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(limit) = self.memory_limit
            && limit == 0
        {
            return Err(MstatError::Config(
                "Memory limit must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A cgroup v2 directory owned by this process.
///
/// The directory is removed when the value is dropped.
#[derive(Debug)]
pub struct Cgroup {
    name: String,
    path: PathBuf,
}

/// Root of the cgroup v2 hierarchy; `MSTAT_CGROUP_ROOT` overrides it
pub fn cgroup_root_path() -> PathBuf {
    std::env::var("MSTAT_CGROUP_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(CGROUP_V2_ROOT))
}

impl Cgroup {
    /// A fresh group name: `mstat-` followed by 8 random bytes, hex-encoded
    pub fn unique_name() -> String {
        let (hi, lo) = Uuid::new_v4().as_u64_pair();
        format!("mstat-{:016x}", hi ^ lo)
    }

    /// Create a cgroup under the configured root
    pub fn create(name: &str, config: &CgroupConfig) -> Result<Self> {
        Self::create_in(&cgroup_root_path(), name, config)
    }

    /// Create a cgroup under `root` and apply `config` to it
    pub fn create_in(root: &Path, name: &str, config: &CgroupConfig) -> Result<Self> {
        config.validate()?;

        enable_memory_controller(root);

        let path = root.join(name);
        fs::create_dir(&path).map_err(|e| {
            MstatError::ResourceContext(format!(
                "Failed to create cgroup directory {}: {}",
                path.display(),
                e
            ))
        })?;
        let cgroup = Self {
            name: name.to_string(),
            path,
        };

        // on failure the half-configured directory is removed by Drop
        cgroup.apply_config(config)?;
        debug!("created cgroup {}", cgroup.path.display());
        Ok(cgroup)
    }

    pub fn apply_config(&self, config: &CgroupConfig) -> Result<()> {
        config.validate()?;
        if let Some(memory) = config.memory_limit {
            self.set_memory_limit(memory)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn set_memory_limit(&self, limit: u64) -> Result<()> {
        self.write_file(&self.path.join("memory.max"), &limit.to_string())
    }

    /// Pids currently in the group
    pub fn procs(&self) -> Result<Vec<Pid>> {
        let content = self.read_file(&self.path.join("cgroup.procs"))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.trim()
                    .parse::<i32>()
                    .map(Pid::from_raw)
                    .map_err(|e| MstatError::ResourceContext(format!("Failed to parse pid: {}", e)))
            })
            .collect()
    }

    pub fn delete(&self) -> Result<()> {
        match fs::remove_dir(&self.path) {
            Ok(()) => {
                debug!("deleted cgroup {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MstatError::ResourceContext(format!(
                "Failed to delete cgroup {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new().write(true).open(path).map_err(|e| {
            MstatError::ResourceContext(format!("Failed to open {}: {}", path.display(), e))
        })?;
        write!(file, "{}", content).map_err(|e| {
            MstatError::ResourceContext(format!("Failed to write to {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| {
            MstatError::ResourceContext(format!("Failed to read {}: {}", path.display(), e))
        })
    }

    /// Create a Cgroup backed by an arbitrary directory path (for testing)
    #[doc(hidden)]
    pub fn for_testing(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }
}

/// Make sure children of `root` get memory accounting.
///
/// Best effort: on the real root this is normally already enabled, and when
/// it is not the later `memory.max` write reports the actual failure.
fn enable_memory_controller(root: &Path) {
    let control = root.join("cgroup.subtree_control");
    let enabled = match fs::read_to_string(&control) {
        Ok(content) => content.split_whitespace().any(|c| c == "memory"),
        Err(e) => {
            debug!("cannot read {}: {}", control.display(), e);
            return;
        }
    };
    if enabled {
        return;
    }
    let result = fs::OpenOptions::new()
        .write(true)
        .open(&control)
        .and_then(|mut f| f.write_all(b"+memory"));
    if let Err(e) = result {
        warn!("failed to enable memory controller in {}: {}", control.display(), e);
    }
}

impl ResourceContext for Cgroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_process(&self, pid: Pid) -> Result<()> {
        let procs_file = self.path.join("cgroup.procs");
        self.write_file(&procs_file, &pid.as_raw().to_string())
    }

    fn memory_stats(&self) -> Result<MemoryStats> {
        let current = self.read_file(&self.path.join("memory.current"))?;
        let max = match fs::read_to_string(self.path.join("memory.max")) {
            Ok(max) => Some(max),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(MstatError::ResourceContext(format!(
                    "Failed to read memory.max: {}",
                    e
                )));
            }
        };
        let stat = self.read_file(&self.path.join("memory.stat"))?;
        MemoryStats::parse(&current, max.as_deref(), &stat)
    }
}

impl Drop for Cgroup {
    fn drop(&mut self) {
        if let Err(e) = self.delete() {
            warn!("{}", e);
        }
    }
}
