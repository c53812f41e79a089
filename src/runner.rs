//! Subprocess execution under resource accounting.
//!
//! The harness talks to a [`ProcessRunner`]; [`Wait4Runner`] is the real one,
//! which reaps the child with `wait4(2)` so the kernel hands back the child's
//! own rusage instead of the aggregate for all children.

use std::io;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{BenchError, Result, Termination};

/// Resource usage of one finished process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rusage {
    /// User CPU time used.
    pub utime: Duration,
    /// System CPU time used.
    pub stime: Duration,
    /// Maximum resident set size, in kilobytes.
    pub maxrss: u64,
}

impl Rusage {
    fn from_raw(raw: &libc::rusage) -> Self {
        Self {
            utime: timeval_to_duration(raw.ru_utime),
            stime: timeval_to_duration(raw.ru_stime),
            maxrss: raw.ru_maxrss.max(0) as u64,
        }
    }
}

fn timeval_to_duration(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}

/// Something that can run a binary to completion and report what it cost.
///
/// `wall` and `rusage` only answer after a successful `run`; before that they
/// fail with [`BenchError::NotExecuted`].
pub trait ProcessRunner {
    fn run(&mut self, binary: &str, args: &[String], timeout: Duration) -> Result<()>;

    fn wall(&self) -> Result<Duration>;

    fn rusage(&self) -> Result<Rusage>;
}

#[derive(Debug, Clone, Copy)]
struct Finished {
    wall: Duration,
    rusage: Rusage,
}

/// Runs the binary as a child process and reaps it with `wait4`.
#[derive(Debug, Default)]
pub struct Wait4Runner {
    quiet: bool,
    finished: Option<Finished>,
}

impl Wait4Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the child's stdout instead of inheriting it.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

impl ProcessRunner for Wait4Runner {
    fn run(&mut self, binary: &str, args: &[String], timeout: Duration) -> Result<()> {
        self.finished = None;

        let stdout = if self.quiet {
            Stdio::null()
        } else {
            Stdio::inherit()
        };

        let start = Instant::now();
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .spawn()
            .map_err(|source| BenchError::Spawn {
                binary: binary.to_string(),
                source,
            })?;
        let pid = child.id() as libc::pid_t;
        debug!(pid, binary, "spawned");

        // The waiter stamps the exit instant itself so wall time is not
        // rounded up to whenever this thread gets around to looking.
        let (tx, rx) = mpsc::channel();
        let waiter = thread::spawn(move || {
            let reaped = wait_blocking(pid);
            let _ = tx.send((reaped, Instant::now()));
        });

        match rx.recv_timeout(timeout) {
            Ok((Ok((status, raw)), exited)) => {
                let _ = waiter.join();
                check_status(binary, status)?;
                self.finished = Some(Finished {
                    wall: exited.saturating_duration_since(start),
                    rusage: Rusage::from_raw(&raw),
                });
                Ok(())
            }
            Ok((Err(err), _)) => {
                let _ = child.kill();
                let _ = waiter.join();
                Err(BenchError::Io(err))
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(pid, binary, ?timeout, "deadline exceeded, killing");
                // The waiter may have reaped the child just now; do not
                // signal a pid that is no longer ours.
                if rx.try_recv().is_err() {
                    let _ = child.kill();
                }
                let _ = waiter.join();
                Err(BenchError::Timeout {
                    binary: binary.to_string(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = child.kill();
                let _ = waiter.join();
                Err(BenchError::Io(io::Error::other("process waiter exited early")))
            }
        }
    }

    fn wall(&self) -> Result<Duration> {
        self.finished.map(|f| f.wall).ok_or(BenchError::NotExecuted)
    }

    fn rusage(&self) -> Result<Rusage> {
        self.finished.map(|f| f.rusage).ok_or(BenchError::NotExecuted)
    }
}

/// Block until `pid` exits and collect its status and rusage.
fn wait_blocking(pid: libc::pid_t) -> io::Result<(libc::c_int, libc::rusage)> {
    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: rusage is plain old data; zeroed is a valid value.
        let mut raw: libc::rusage = unsafe { std::mem::zeroed() };
        // SAFETY: pid is our own unreaped child; both out-pointers are valid.
        let ret = unsafe { libc::wait4(pid, &mut status, 0, &mut raw) };
        if ret == pid {
            return Ok((status, raw));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn check_status(binary: &str, status: libc::c_int) -> Result<()> {
    let termination = if libc::WIFEXITED(status) {
        match libc::WEXITSTATUS(status) {
            0 => return Ok(()),
            code => Termination::Exited(code),
        }
    } else if libc::WIFSIGNALED(status) {
        Termination::Signaled(libc::WTERMSIG(status))
    } else {
        Termination::Exited(status)
    };

    Err(BenchError::Failed {
        binary: binary.to_string(),
        termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn accessors_fail_before_run() {
        let runner = Wait4Runner::new();
        assert!(matches!(runner.wall(), Err(BenchError::NotExecuted)));
        assert!(matches!(runner.rusage(), Err(BenchError::NotExecuted)));
    }

    #[test]
    fn successful_run_reports_usage() {
        let mut runner = Wait4Runner::new().quiet(true);
        runner
            .run("/bin/sh", &sh("exit 0"), Duration::from_secs(10))
            .unwrap();

        assert!(runner.wall().unwrap() > Duration::ZERO);
        assert!(runner.rusage().unwrap().maxrss > 0);
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let mut runner = Wait4Runner::new().quiet(true);
        let err = runner
            .run("/bin/sh", &sh("exit 3"), Duration::from_secs(10))
            .unwrap_err();

        assert!(matches!(
            err,
            BenchError::Failed {
                termination: Termination::Exited(3),
                ..
            }
        ));
        assert!(matches!(runner.wall(), Err(BenchError::NotExecuted)));
    }

    #[test]
    fn wall_time_tracks_exit_not_polling() {
        let mut runner = Wait4Runner::new().quiet(true);
        runner
            .run("/bin/true", &[], Duration::from_secs(10))
            .unwrap();

        let wall = runner.wall().unwrap();
        assert!(wall > Duration::ZERO);
        assert!(wall < Duration::from_millis(5), "wall was {wall:?}");
    }

    #[test]
    fn deadline_kills_child() {
        let mut runner = Wait4Runner::new().quiet(true);
        let start = Instant::now();
        let err = runner
            .run("/bin/sh", &sh("sleep 5"), Duration::from_millis(100))
            .unwrap_err();

        assert!(matches!(err, BenchError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let mut runner = Wait4Runner::new();
        let err = runner
            .run("/nonexistent/packer", &[], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, BenchError::Spawn { .. }));
    }

    #[test]
    fn timeval_conversion() {
        let tv = libc::timeval {
            tv_sec: 2,
            tv_usec: 500_000,
        };
        assert_eq!(timeval_to_duration(tv), Duration::from_millis(2500));
    }
}
