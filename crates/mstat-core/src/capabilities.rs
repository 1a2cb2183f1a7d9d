//! Runtime detection of what mstat needs from the system
//!
//! Probes the cgroup hierarchy so `mstat --check` can explain why a run
//! would fail before any cgroup is created.

use std::path::Path;

/// Default mount point of the cgroup v2 unified hierarchy
pub const CGROUP_V2_ROOT: &str = "/sys/fs/cgroup";

/// Detected system capabilities
#[derive(Debug, Clone)]
pub struct SystemCapabilities {
    /// Running as root (euid == 0)
    pub has_root: bool,
    /// Cgroup v2 unified hierarchy is mounted at the probed root
    pub has_cgroup_v2: bool,
    /// The memory controller is available at the probed root
    pub has_memory_controller: bool,
    /// Current user may create child cgroups under the probed root
    pub has_cgroup_write_access: bool,
}

impl SystemCapabilities {
    /// Detect capabilities against the default cgroup root
    pub fn detect() -> Self {
        Self::detect_at(Path::new(CGROUP_V2_ROOT))
    }

    /// Detect capabilities against an arbitrary cgroup root
    pub fn detect_at(root: &Path) -> Self {
        Self {
            has_root: detect_root(),
            has_cgroup_v2: detect_cgroup_v2(root),
            has_memory_controller: detect_memory_controller(root),
            has_cgroup_write_access: detect_write_access(root),
        }
    }

    /// Everything a measurement run needs is present
    pub fn can_measure(&self) -> bool {
        self.has_cgroup_v2 && self.has_memory_controller && self.has_cgroup_write_access
    }

    /// Get a human-readable summary of capabilities
    pub fn summary(&self) -> String {
        let check = |available: bool| if available { "[ok]" } else { "[--]" };

        [
            format!("{} Root privileges", check(self.has_root)),
            format!("{} Cgroup v2", check(self.has_cgroup_v2)),
            format!("{} Memory controller", check(self.has_memory_controller)),
            format!("{} Cgroup write access", check(self.has_cgroup_write_access)),
        ]
        .join("\n")
    }
}

fn detect_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

fn detect_cgroup_v2(root: &Path) -> bool {
    root.join("cgroup.controllers").exists()
}

fn detect_memory_controller(root: &Path) -> bool {
    std::fs::read_to_string(root.join("cgroup.controllers"))
        .map(|content| content.split_whitespace().any(|c| c == "memory"))
        .unwrap_or(false)
}

fn detect_write_access(root: &Path) -> bool {
    let probe = root.join(format!("mstat-probe-{}", std::process::id()));
    match std::fs::create_dir(&probe) {
        Ok(()) => {
            let _ = std::fs::remove_dir(&probe);
            true
        }
        Err(_) => false,
    }
}
