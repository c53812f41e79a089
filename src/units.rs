//! Unit conversions shared by the result builder, the comparator and the CSV
//! exporter, plus the timeout syntax understood by the packer.

use std::fmt::Write as _;
use std::time::Duration;

use crate::error::{BenchError, Result};

/// Multiplier from the kilobyte units rusage reports `maxrss` in to bytes.
pub const KIB: u64 = 1024;

pub const MIB: u64 = 1024 * 1024;

pub fn to_mib(bytes: u64) -> f64 {
    bytes as f64 / MIB as f64
}

/// Parse a timeout such as `4h`, `1h30m`, `90s`, `1.5m` or `250ms`.
///
/// A bare number is taken as seconds.
pub fn parse_timeout(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(BenchError::InvalidTimeout("empty duration".into()));
    }
    if !s.chars().any(char::is_alphabetic) {
        return component(s, "s");
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (num_part, tail) = rest.split_at(num_end);
        let unit_end = tail
            .find(|c: char| !c.is_alphabetic())
            .unwrap_or(tail.len());
        let (unit_part, tail) = tail.split_at(unit_end);

        if num_part.is_empty() || unit_part.is_empty() {
            return Err(BenchError::InvalidTimeout(format!("malformed duration: {s}")));
        }
        total = total.saturating_add(component(num_part, unit_part)?);
        rest = tail;
    }

    Ok(total)
}

/// One `<number><unit>` piece of a timeout.
fn component(num_part: &str, unit_part: &str) -> Result<Duration> {
    let value: f64 = num_part
        .trim()
        .parse()
        .map_err(|_| BenchError::InvalidTimeout(format!("invalid number: {num_part}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(BenchError::InvalidTimeout(format!(
            "out of range: {num_part}"
        )));
    }

    let nanos_per_unit: f64 = match unit_part.to_ascii_lowercase().as_str() {
        "ns" => 1.0,
        "us" | "µs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" | "min" => 60e9,
        "h" => 3_600e9,
        _ => {
            return Err(BenchError::InvalidTimeout(format!(
                "unknown unit: {unit_part}"
            )))
        }
    };

    Ok(Duration::from_nanos((value * nanos_per_unit) as u64))
}

/// Render a timeout the way the packer's `--timeout` flag parses it
/// (`4h`, `1h30m`, `2.5s`, `500ms`).
pub fn format_timeout(d: Duration) -> String {
    let secs = d.as_secs();
    let nanos = d.subsec_nanos();

    if secs == 0 {
        return match nanos {
            0 => "0s".to_string(),
            n if n % 1_000_000 == 0 => format!("{}ms", n / 1_000_000),
            n if n % 1_000 == 0 => format!("{}us", n / 1_000),
            n => format!("{n}ns"),
        };
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    if nanos > 0 {
        let frac = format!("{nanos:09}");
        let _ = write!(out, "{seconds}.{}s", frac.trim_end_matches('0'));
    } else if seconds > 0 {
        let _ = write!(out, "{seconds}s");
    }
    out
}
