//! Percentage deltas between two pack results and the allowance gate.
//!
//! Every comparison takes a *reference* result first and a *candidate* second;
//! a positive delta means the candidate costs more than the reference.

use std::fmt::{self, Write as _};
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::schema::PackResult;
use crate::units::to_mib;

/// Percentage change from `reference` to `candidate`.
///
/// A zero reference gives `0.0` when the candidate is also zero and
/// `f64::INFINITY` otherwise, so any growth from nothing fails a finite
/// allowance.
pub fn percent(reference: u64, candidate: u64) -> f64 {
    if reference == 0 {
        return if candidate == 0 { 0.0 } else { f64::INFINITY };
    }
    (candidate as f64 - reference as f64) / reference as f64 * 100.0
}

fn percent_duration(reference: Duration, candidate: Duration) -> f64 {
    let r = u64::try_from(reference.as_nanos()).unwrap_or(u64::MAX);
    let c = u64::try_from(candidate.as_nanos()).unwrap_or(u64::MAX);
    percent(r, c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Memory,
    Wtime,
    Stime,
    Utime,
    FileSize,
}

impl Metric {
    /// Report order.
    pub const ALL: [Metric; 5] = [
        Metric::Memory,
        Metric::Wtime,
        Metric::Stime,
        Metric::Utime,
        Metric::FileSize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Memory => "Memory",
            Metric::Wtime => "Wtime",
            Metric::Stime => "Stime",
            Metric::Utime => "Utime",
            Metric::FileSize => "FileSize",
        }
    }

    /// Whether this metric can fail a comparison. CPU split between user and
    /// system time is too noisy to gate on.
    pub fn gates(self) -> bool {
        matches!(self, Metric::Memory | Metric::Wtime | Metric::FileSize)
    }

    fn render(self, r: &PackResult) -> String {
        match self {
            Metric::Memory => format!("{:.3} MiB", to_mib(r.memory)),
            Metric::FileSize => format!("{:.3} MiB", to_mib(r.file_size)),
            Metric::Wtime => format!("{:?}", r.wtime),
            Metric::Stime => format!("{:?}", r.stime),
            Metric::Utime => format!("{:?}", r.utime),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub memory: f64,
    pub wtime: f64,
    pub stime: f64,
    pub utime: f64,
    pub file_size: f64,
}

impl Comparison {
    pub fn between(reference: &PackResult, candidate: &PackResult) -> Self {
        Self {
            memory: percent(reference.memory, candidate.memory),
            wtime: percent_duration(reference.wtime, candidate.wtime),
            stime: percent_duration(reference.stime, candidate.stime),
            utime: percent_duration(reference.utime, candidate.utime),
            file_size: percent(reference.file_size, candidate.file_size),
        }
    }

    pub fn delta(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Memory => self.memory,
            Metric::Wtime => self.wtime,
            Metric::Stime => self.stime,
            Metric::Utime => self.utime,
            Metric::FileSize => self.file_size,
        }
    }
}

/// Whether a delta stays inside the allowance. NaN never does.
pub fn within(delta: f64, allowance: f64) -> bool {
    delta <= allowance
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub comparison: Comparison,
    pub allowance: f64,
    pub passed: bool,
    pub report: String,
}

impl Evaluation {
    /// Metrics that exceeded the allowance and count against the verdict.
    pub fn failures(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| m.gates() && !within(self.comparison.delta(*m), self.allowance))
            .collect()
    }

    pub fn print(&self) {
        print!("{}", self.report);
    }
}

/// Compare `candidate` against `reference` and gate on memory, wall time and
/// output size. `allowance` is a percentage (`5.0` means 5%).
pub fn evaluate(reference: &PackResult, candidate: &PackResult, allowance: f64) -> Evaluation {
    let comparison = Comparison::between(reference, candidate);

    let mut passed = true;
    let mut report = String::new();
    for metric in Metric::ALL {
        let delta = comparison.delta(metric);
        let ok = within(delta, allowance);
        if metric.gates() && !ok {
            warn!(%metric, delta, allowance, "allowance exceeded");
            passed = false;
        }
        let _ = writeln!(
            report,
            "{}: {} -> {} ({:+.2}%), {}",
            metric,
            metric.render(reference),
            metric.render(candidate),
            delta,
            ok
        );
    }

    Evaluation {
        comparison,
        allowance,
        passed,
        report,
    }
}
