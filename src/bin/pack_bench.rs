use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use pack_bench::compare;
use pack_bench::export::Series;
use pack_bench::harness::{PackRun, RunConfig, DEFAULT_SUBCOMMAND};
use pack_bench::runner::Wait4Runner;
use pack_bench::schema::{Metrics, PackResult, RunMeta, RunReport};
use pack_bench::units::parse_timeout;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
struct RepoArgs {
    /// Repository to pack. Can be provided multiple times.
    #[arg(long = "repo", value_name = "URL", num_args = 1.., action = clap::ArgAction::Append)]
    repos: Vec<String>,

    /// File holding the newline-separated repository list, passed through verbatim.
    #[arg(long, value_name = "FILE")]
    repos_file: Option<PathBuf>,
}

impl RepoArgs {
    fn payload(&self) -> anyhow::Result<String> {
        match &self.repos_file {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("reading repository list {}", path.display())),
            None => Ok(self.repos.join("\n")),
        }
    }
}

#[derive(ClapArgs, Debug)]
struct PackArgs {
    #[command(flatten)]
    repos: RepoArgs,

    /// Packer subcommand to invoke.
    #[arg(long, default_value = DEFAULT_SUBCOMMAND)]
    subcommand: String,

    /// Deadline for each packer run (e.g. 4h, 30m, 90s).
    #[arg(long, default_value = "4h", value_parser = parse_timeout_arg)]
    timeout: Duration,

    /// Write CSV series to `<PREFIX>memory.csv`, `<PREFIX>time.csv`, `<PREFIX>file_size.csv`.
    #[arg(long, value_name = "PREFIX")]
    csv_prefix: Option<String>,
}

impl PackArgs {
    fn config(&self, binary: &Path) -> anyhow::Result<RunConfig> {
        Ok(RunConfig::new(binary.display().to_string(), self.repos.payload()?)
            .with_subcommand(self.subcommand.clone())
            .with_timeout(self.timeout))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the packer once and print its resource usage as JSON.
    Run {
        /// Packer binary to benchmark.
        #[arg(long, value_name = "BIN")]
        binary: PathBuf,

        #[command(flatten)]
        pack: PackArgs,

        /// Only export these series (default: all).
        #[arg(long, value_enum, num_args = 1.., requires = "csv_prefix")]
        series: Vec<Series>,
    },

    /// Run a reference and a candidate packer and fail if the candidate regressed.
    Regress {
        /// Packer binary the candidate is measured against.
        #[arg(long, value_name = "BIN")]
        reference: PathBuf,

        /// Packer binary under test.
        #[arg(long, value_name = "BIN")]
        candidate: PathBuf,

        #[command(flatten)]
        pack: PackArgs,

        /// Tolerated growth, in percent, of memory, wall time and output size.
        #[arg(long, default_value_t = 5.0)]
        allowance: f64,
    },
}

#[derive(Parser, Debug)]
#[command(name = "pack-bench")]
#[command(about = "Resource regression harness for the repository packer")]
struct Args {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn parse_timeout_arg(s: &str) -> Result<Duration, String> {
    parse_timeout(s).map_err(|e| e.to_string())
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "pack_bench=debug"
    } else {
        "pack_bench=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    // Set by CI.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn bench(config: RunConfig) -> anyhow::Result<PackResult> {
    let binary = config.binary.clone();
    // Child stdout is dropped so ours stays machine-readable.
    let mut run = PackRun::with_runner(config, Wait4Runner::new().quiet(true));
    run.execute()
        .with_context(|| format!("benchmarking {binary}"))?;
    Ok(run.result()?)
}

fn export(result: &PackResult, prefix: Option<&str>, series: &[Series]) -> anyhow::Result<()> {
    let Some(prefix) = prefix else {
        return Ok(());
    };
    if series.is_empty() {
        result.save_all_csv(prefix)?;
    } else {
        for s in series {
            result.save_csv(*s, Path::new(&format!("{prefix}{s}.csv")))?;
        }
    }
    info!(prefix, "csv series written");
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    match &args.cmd {
        Command::Run {
            binary,
            pack,
            series,
        } => {
            let config = pack.config(binary)?;
            let meta = RunMeta {
                schema_version: 1,
                bench_version: env!("CARGO_PKG_VERSION").to_string(),
                binary: config.binary.clone(),
                subcommand: config.subcommand.clone(),
                timeout_secs: config.timeout.as_secs(),
                timestamp_utc: now_utc(),
                git_sha: git_sha_short(),
            };

            let result = bench(config)?;
            export(&result, pack.csv_prefix.as_deref(), series)?;

            let report = RunReport {
                run: meta,
                metrics: Metrics::from(&result),
                files: result.files,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Regress {
            reference,
            candidate,
            pack,
            allowance,
        } => {
            let reference = bench(pack.config(reference)?)?;
            let candidate = bench(pack.config(candidate)?)?;

            let evaluation = compare::evaluate(&reference, &candidate, *allowance);
            evaluation.print();
            export(&candidate, pack.csv_prefix.as_deref(), &[])?;

            if evaluation.passed {
                info!(allowance, "no regression");
                Ok(ExitCode::SUCCESS)
            } else {
                let failed: Vec<_> = evaluation.failures().iter().map(|m| m.name()).collect();
                warn!(allowance, ?failed, "regression detected");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
