use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::inventory::FileEntry;
use crate::runner::Rusage;
use crate::units::{to_mib, KIB};

/// Everything one run of the packer cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackResult {
    /// Peak resident memory, in bytes.
    pub memory: u64,
    pub wtime: Duration,
    pub stime: Duration,
    pub utime: Duration,
    pub files: Vec<FileEntry>,
    /// Sum of `files` sizes, in bytes.
    pub file_size: u64,
}

impl PackResult {
    pub fn build(rusage: &Rusage, wall: Duration, files: Vec<FileEntry>) -> Self {
        let file_size = files.iter().map(|f| f.size).sum();

        Self {
            memory: rusage.maxrss.saturating_mul(KIB),
            wtime: wall,
            stime: rusage.stime,
            utime: rusage.utime,
            files,
            file_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub binary: String,
    pub subcommand: String,
    pub timeout_secs: u64,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

/// Flat, unit-labelled view of a [`PackResult`] for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub memory_mib: f64,
    pub wtime_s: f64,
    pub stime_s: f64,
    pub utime_s: f64,
    pub file_size_mib: f64,
    pub file_count: usize,
}

impl From<&PackResult> for Metrics {
    fn from(r: &PackResult) -> Self {
        Self {
            memory_mib: to_mib(r.memory),
            wtime_s: r.wtime.as_secs_f64(),
            stime_s: r.stime.as_secs_f64(),
            utime_s: r.utime.as_secs_f64(),
            file_size_mib: to_mib(r.file_size),
            file_count: r.files.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run: RunMeta,
    pub metrics: Metrics,
    pub files: Vec<FileEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(name: &str, size: u64) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            size,
            is_dir: false,
            modified: None,
        }
    }

    #[test]
    fn build_normalizes_units() {
        let rusage = Rusage {
            utime: Duration::from_millis(1200),
            stime: Duration::from_millis(300),
            maxrss: 2048,
        };
        let files = vec![entry("a.siva", 1024), entry("b.siva", 3072)];

        let r = PackResult::build(&rusage, Duration::from_secs(3), files);

        assert_eq!(r.memory, 2 * 1024 * 1024);
        assert_eq!(r.wtime, Duration::from_secs(3));
        assert_eq!(r.stime, Duration::from_millis(300));
        assert_eq!(r.utime, Duration::from_millis(1200));
        assert_eq!(r.file_size, 4096);
        assert_eq!(r.files.len(), 2);
    }

    #[test]
    fn metrics_view() {
        let rusage = Rusage {
            maxrss: 1024,
            ..Default::default()
        };
        let r = PackResult::build(&rusage, Duration::from_millis(1500), vec![entry("x", 512 * 1024)]);
        let m = Metrics::from(&r);

        assert_eq!(m.memory_mib, 1.0);
        assert_eq!(m.wtime_s, 1.5);
        assert_eq!(m.file_size_mib, 0.5);
        assert_eq!(m.file_count, 1);
    }

    proptest! {
        #[test]
        fn file_size_is_sum_of_files(sizes in proptest::collection::vec(0u64..1 << 40, 0..32)) {
            let files: Vec<_> = sizes.iter().enumerate().map(|(i, s)| entry(&i.to_string(), *s)).collect();
            let r = PackResult::build(&Rusage::default(), Duration::ZERO, files);
            prop_assert_eq!(r.file_size, sizes.iter().sum::<u64>());
            prop_assert_eq!(r.file_size, r.files.iter().map(|f| f.size).sum::<u64>());
        }
    }
}
