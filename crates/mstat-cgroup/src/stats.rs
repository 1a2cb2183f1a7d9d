//! Memory statistics snapshot of a cgroup

use std::collections::BTreeMap;

use mstat_core::{MstatError, Result};
use serde::Serialize;

/// `memory.stat` keys that make up kernel memory on kernels that predate
/// the aggregated `kernel` entry
const KERNEL_COMPONENTS: &[&str] = &["kernel_stack", "pagetables", "percpu", "sock", "slab"];

/// One raw reading of a cgroup's memory files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Total memory charged to the group (`memory.current`), in bytes
    pub usage: u64,
    /// Hard limit (`memory.max`); `None` when unlimited
    pub limit: Option<u64>,
    /// Kernel memory charged to the group, in bytes
    pub kernel: u64,
    /// Every counter from `memory.stat`
    pub stat: BTreeMap<String, u64>,
}

impl MemoryStats {
    /// Build a snapshot from the contents of `memory.current`, `memory.max`
    /// and `memory.stat`
    pub fn parse(current: &str, max: Option<&str>, stat: &str) -> Result<Self> {
        let usage = parse_u64("memory.current", current)?;
        let limit = match max.map(str::trim) {
            None | Some("max") => None,
            Some(value) => Some(parse_u64("memory.max", value)?),
        };
        let stat = parse_flat_keyed(stat)?;
        let kernel = kernel_usage(&stat);

        Ok(Self {
            usage,
            limit,
            kernel,
            stat,
        })
    }
}

fn kernel_usage(stat: &BTreeMap<String, u64>) -> u64 {
    if let Some(kernel) = stat.get("kernel") {
        return *kernel;
    }
    KERNEL_COMPONENTS
        .iter()
        .filter_map(|key| stat.get(*key))
        .fold(0u64, |acc, v| acc.saturating_add(*v))
}

fn parse_u64(what: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| MstatError::ResourceContext(format!("Failed to parse {}: {}", what, e)))
}

/// Parse a cgroup "flat keyed" file: one `key value` pair per line
fn parse_flat_keyed(content: &str) -> Result<BTreeMap<String, u64>> {
    let mut map = BTreeMap::new();
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let value = parse_u64(key, value)?;
        map.insert(key.to_string(), value);
    }
    Ok(map)
}
