//! One benchmark run of the packer.
//!
//! [`PackRun`] owns the temporary repository list and output directory for
//! exactly the duration of [`PackRun::execute`]; both are dropped (and
//! deleted) on every return path, including unwinding.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

use crate::error::{BenchError, Result};
use crate::inventory::{self, FileEntry};
use crate::runner::{ProcessRunner, Rusage, Wait4Runner};
use crate::schema::PackResult;
use crate::units::format_timeout;

pub const DEFAULT_SUBCOMMAND: &str = "pack";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

const LIST_PREFIX: &str = "packer-list";
const DIR_PREFIX: &str = "packer-dir";

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub binary: String,
    /// Repository list handed to the packer, written verbatim to the list file.
    pub repos: String,
    pub subcommand: String,
    pub timeout: Duration,
}

impl RunConfig {
    pub fn new(binary: impl Into<String>, repos: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            repos: repos.into(),
            subcommand: DEFAULT_SUBCOMMAND.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_subcommand(mut self, subcommand: impl Into<String>) -> Self {
        self.subcommand = subcommand.into();
        self
    }

    pub fn args(&self, list: &Path, output_dir: &Path) -> Vec<String> {
        vec![
            self.subcommand.clone(),
            format!("--root-repositories-dir={}", output_dir.display()),
            format!("--timeout={}", format_timeout(self.timeout)),
            list.display().to_string(),
        ]
    }
}

#[derive(Debug)]
enum RunState {
    NotExecuted,
    Executed { files: Vec<FileEntry> },
}

pub struct PackRun<R = Wait4Runner> {
    config: RunConfig,
    runner: R,
    state: RunState,
}

impl<R: ProcessRunner> PackRun<R> {
    pub fn with_runner(config: RunConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            state: RunState::NotExecuted,
        }
    }

    /// Run the packer once. Failures are returned as-is; nothing is retried.
    pub fn execute(&mut self) -> Result<()> {
        self.state = RunState::NotExecuted;

        let list = create_list(&self.config.repos)?;
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir()
            .map_err(BenchError::Setup)?;

        let args = self.config.args(list.path(), dir.path());
        info!(
            binary = %self.config.binary,
            timeout = %format_timeout(self.config.timeout),
            "running benchmark"
        );
        debug!(?args, "invocation");

        self.runner
            .run(&self.config.binary, &args, self.config.timeout)?;

        let files = scan_output(&dir)?;
        let wall = self.runner.wall()?;
        info!(?wall, files = files.len(), "benchmark finished");

        self.state = RunState::Executed { files };
        Ok(())
    }

    pub fn is_executed(&self) -> bool {
        matches!(self.state, RunState::Executed { .. })
    }

    pub fn files(&self) -> Result<&[FileEntry]> {
        match &self.state {
            RunState::Executed { files } => Ok(files),
            RunState::NotExecuted => Err(BenchError::NotExecuted),
        }
    }

    pub fn wall(&self) -> Result<Duration> {
        match self.state {
            RunState::Executed { .. } => self.runner.wall(),
            RunState::NotExecuted => Err(BenchError::NotExecuted),
        }
    }

    pub fn rusage(&self) -> Result<Rusage> {
        match self.state {
            RunState::Executed { .. } => self.runner.rusage(),
            RunState::NotExecuted => Err(BenchError::NotExecuted),
        }
    }

    pub fn result(&self) -> Result<PackResult> {
        let files = self.files()?;
        let rusage = self.rusage()?;
        let wall = self.wall()?;
        Ok(PackResult::build(&rusage, wall, files.to_vec()))
    }
}

fn create_list(repos: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(LIST_PREFIX)
        .tempfile()
        .map_err(BenchError::Setup)?;
    file.write_all(repos.as_bytes()).map_err(BenchError::Setup)?;
    file.flush().map_err(BenchError::Setup)?;
    Ok(file)
}

fn scan_output(dir: &TempDir) -> Result<Vec<FileEntry>> {
    let files = inventory::scan(dir.path())?;
    for f in &files {
        debug!(name = %f.name, size = f.size, "output file");
    }
    Ok(files)
}
