//! Output formats for a recorded series

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use mstat_cgroup::MemoryStats;
use mstat_core::{MstatError, Result};
use serde::Serialize;

use crate::monitoring::SeriesSnapshot;

/// Write the series as TSV: a `time\trss` header, then one row per sample
/// with nanoseconds since the first sample and the byte count.
pub fn write_tsv<W: Write>(series: &SeriesSnapshot, mut out: W) -> io::Result<()> {
    out.write_all(b"time\trss\n")?;
    let Some(first) = series.baseline() else {
        return out.flush();
    };
    for record in &series.samples {
        let offset = record.timestamp.duration_since(first.timestamp).as_nanos();
        writeln!(out, "{}\t{}", offset, record.rss)?;
    }
    out.flush()
}

/// Write the TSV report to `path` in one go
pub fn write_tsv_file(series: &SeriesSnapshot, path: &Path) -> Result<()> {
    let mut buf = Vec::with_capacity(16 + series.len() * 24);
    write_tsv(series, &mut buf)?;
    fs::write(path, buf).map_err(|e| {
        MstatError::Io(io::Error::new(
            e.kind(),
            format!("writing output to '{}' failed: {}", path.display(), e),
        ))
    })
}

/// Pretty-print a raw statistics snapshot as JSON, indented by four spaces
pub fn write_raw_stats_json<W: Write>(stats: &MemoryStats, mut out: W) -> Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    stats
        .serialize(&mut serializer)
        .map_err(|e| MstatError::Io(io::Error::other(e)))?;
    writeln!(out)?;
    Ok(())
}

/// Headline numbers of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesSummary {
    pub samples: usize,
    pub peak_rss: u64,
    pub peak_kernel: u64,
    pub duration: Duration,
}

/// Sample count, peaks and covered time span of `series`
pub fn summary(series: &SeriesSnapshot) -> SeriesSummary {
    SeriesSummary {
        samples: series.len(),
        peak_rss: series.peak_rss(),
        peak_kernel: series.peak_kernel_memory(),
        duration: series.duration(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::Record;
    use std::time::Instant;

    fn series() -> SeriesSnapshot {
        let start = Instant::now();
        let at = |ms: u64, rss: u64| Record {
            timestamp: start + Duration::from_millis(ms),
            rss,
            kernel_memory: 8,
        };
        SeriesSnapshot {
            samples: vec![at(0, 1000), at(100, 5000), at(250, 3000)],
            raw_stats: Vec::new(),
        }
    }

    #[test]
    fn tsv_rows_are_offsets_from_first_sample() {
        let mut out = Vec::new();
        write_tsv(&series(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "time\trss\n0\t1000\n100000000\t5000\n250000000\t3000\n"
        );
    }

    #[test]
    fn tsv_of_empty_series_is_header_only() {
        let mut out = Vec::new();
        write_tsv(&SeriesSnapshot::default(), &mut out).unwrap();
        assert_eq!(out, b"time\trss\n");
    }

    #[test]
    fn tsv_file_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        write_tsv_file(&series(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("time\trss\n"));
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn tsv_file_error_names_the_path() {
        let err = write_tsv_file(&series(), Path::new("/nonexistent/dir/out.tsv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dir/out.tsv"));
    }

    #[test]
    fn raw_stats_json_is_indented() {
        let mut stats = MemoryStats {
            usage: 4096,
            limit: Some(8192),
            kernel: 512,
            ..Default::default()
        };
        stats.stat.insert("anon".to_string(), 2048);

        let mut out = Vec::new();
        write_raw_stats_json(&stats, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\n    \"usage\": 4096"));
        assert!(text.contains("\n        \"anon\": 2048"));

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["limit"], 8192);
    }

    #[test]
    fn summary_of_series() {
        let summary = summary(&series());
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.peak_rss, 5000);
        assert_eq!(summary.peak_kernel, 8);
        assert_eq!(summary.duration, Duration::from_millis(250));
    }
}
