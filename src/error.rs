use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// How a benchmarked process ended when it did not exit cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own with a non-zero status code.
    Exited(i32),
    /// Killed by a signal.
    Signaled(i32),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exit status {code}"),
            Termination::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("failed to prepare benchmark workspace: {0}")]
    Setup(#[source] io::Error),

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("{binary} failed: {termination}")]
    Failed {
        binary: String,
        termination: Termination,
    },

    #[error("{binary} did not finish within {timeout:?}")]
    Timeout { binary: String, timeout: Duration },

    #[error("benchmark has not been executed")]
    NotExecuted,

    #[error("unsupported series: {0}")]
    UnsupportedSeries(String),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BenchError {
    /// True when the benchmarked binary itself failed (could not start, exited
    /// non-zero, was killed, or ran past its deadline).
    ///
    /// These are failed runs, not regressions; callers decide whether to retry.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            BenchError::Spawn { .. } | BenchError::Failed { .. } | BenchError::Timeout { .. }
        )
    }
}

pub type Result<T, E = BenchError> = std::result::Result<T, E>;
