//! Run configuration, built once at startup and never mutated

use std::path::PathBuf;
use std::time::Duration;

use mstat_cgroup::CgroupConfig;
use mstat_core::{MstatError, Result};

/// Default sampling frequency in Hz
pub const DEFAULT_FREQUENCY_HZ: u32 = 10;

/// Sampler configuration
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Samples per second
    pub frequency_hz: u32,
    /// Keep every raw statistics snapshot alongside the records
    pub keep_raw_stats: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            keep_raw_stats: false,
        }
    }
}

impl SamplerConfig {
    pub fn with_frequency(frequency_hz: u32) -> Self {
        Self {
            frequency_hz,
            ..Default::default()
        }
    }

    /// Time between two ticks
    pub fn interval(&self) -> Result<Duration> {
        if self.frequency_hz == 0 {
            return Err(MstatError::Config(
                "non-positive sampling interval (frequency is 0 Hz)".to_string(),
            ));
        }
        let nanos = 1_000_000_000u64 / u64::from(self.frequency_hz);
        if nanos == 0 {
            return Err(MstatError::Config(format!(
                "non-positive sampling interval ({} Hz is too fast)",
                self.frequency_hz
            )));
        }
        Ok(Duration::from_nanos(nanos))
    }
}

/// Everything the supervisor needs to launch and measure one command
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Program to execute
    pub program: String,
    /// Program arguments
    pub args: Vec<String>,
    /// Environment overrides, applied on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub sampler: SamplerConfig,
    pub cgroup: CgroupConfig,
    /// Binary re-executed as the bootstrap hop; the running executable when unset
    pub bootstrap_exe: Option<PathBuf>,
}

impl LaunchConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            sampler: SamplerConfig::default(),
            cgroup: CgroupConfig::default(),
            bootstrap_exe: None,
        }
    }

    /// Reject anything that would fail only after a cgroup exists
    pub fn validate(&self) -> Result<()> {
        if self.program.is_empty() {
            return Err(MstatError::Config("No program specified".to_string()));
        }
        for (key, _) in &self.env {
            if key.is_empty() || key.contains('=') {
                return Err(MstatError::Config(format!(
                    "Invalid environment variable name: {:?}",
                    key
                )));
            }
        }
        self.sampler.interval()?;
        self.cgroup.validate()
    }
}

/// Split a `KEY=VALUE` assignment
pub fn parse_env_assignment(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(MstatError::Config(format!(
            "Expected KEY=VALUE, got {:?}",
            s
        ))),
    }
}
