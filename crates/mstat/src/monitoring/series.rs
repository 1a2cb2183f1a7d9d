//! Recorded memory series

use std::time::{Duration, Instant};

use mstat_cgroup::MemoryStats;

/// One memory observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub timestamp: Instant,
    /// Memory charged to the cgroup, in bytes
    pub rss: u64,
    /// Kernel memory charged to the cgroup, in bytes
    pub kernel_memory: u64,
}

/// Everything the sampler recorded, handed over at shutdown
#[derive(Debug, Clone, Default)]
pub struct SeriesSnapshot {
    /// Chronological; the first entry is the baseline taken before the target ran
    pub samples: Vec<Record>,
    /// Raw statistics, one per record, when raw retention was enabled
    pub raw_stats: Vec<MemoryStats>,
}

impl SeriesSnapshot {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn baseline(&self) -> Option<&Record> {
        self.samples.first()
    }

    pub fn last_raw_stats(&self) -> Option<&MemoryStats> {
        self.raw_stats.last()
    }

    /// Time between the first and the last sample
    pub fn duration(&self) -> Duration {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp.duration_since(first.timestamp),
            _ => Duration::ZERO,
        }
    }

    pub fn peak_rss(&self) -> u64 {
        self.samples.iter().map(|r| r.rss).max().unwrap_or(0)
    }

    pub fn peak_kernel_memory(&self) -> u64 {
        self.samples.iter().map(|r| r.kernel_memory).max().unwrap_or(0)
    }

    /// True when every timestamp is strictly later than the previous one
    pub fn is_strictly_increasing(&self) -> bool {
        self.samples
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: Instant, ms: u64, rss: u64) -> Record {
        Record {
            timestamp: start + Duration::from_millis(ms),
            rss,
            kernel_memory: rss / 10,
        }
    }

    #[test]
    fn empty_series() {
        let series = SeriesSnapshot::default();
        assert!(series.is_empty());
        assert_eq!(series.duration(), Duration::ZERO);
        assert_eq!(series.peak_rss(), 0);
        assert!(series.baseline().is_none());
        assert!(series.is_strictly_increasing());
    }

    #[test]
    fn series_accessors() {
        let start = Instant::now();
        let series = SeriesSnapshot {
            samples: vec![record(start, 0, 100), record(start, 100, 500), record(start, 200, 300)],
            raw_stats: Vec::new(),
        };
        assert_eq!(series.len(), 3);
        assert_eq!(series.baseline().unwrap().rss, 100);
        assert_eq!(series.duration(), Duration::from_millis(200));
        assert_eq!(series.peak_rss(), 500);
        assert_eq!(series.peak_kernel_memory(), 50);
        assert!(series.is_strictly_increasing());
        assert!(series.last_raw_stats().is_none());
    }

    #[test]
    fn repeated_timestamp_is_not_strictly_increasing() {
        let start = Instant::now();
        let series = SeriesSnapshot {
            samples: vec![record(start, 10, 1), record(start, 10, 2)],
            raw_stats: Vec::new(),
        };
        assert!(!series.is_strictly_increasing());
    }
}
