//! Two-line CSV series for archiving results across releases.
//!
//! ```text
//! memory.csv     memory             / <MiB>
//! time.csv       Wtime,Stime,Utime  / <s>,<s>,<s>
//! file_size.csv  file_size          / <MiB>
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::schema::PackResult;
use crate::units::to_mib;

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum Series {
    Memory,
    Time,
    FileSize,
}

impl Series {
    pub const ALL: [Series; 3] = [Series::Memory, Series::Time, Series::FileSize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Series::Memory => "memory",
            Series::Time => "time",
            Series::FileSize => "file_size",
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Series {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        Series::ALL
            .into_iter()
            .find(|series| series.as_str() == s)
            .ok_or_else(|| BenchError::UnsupportedSeries(s.to_string()))
    }
}

impl PackResult {
    pub fn write_csv<W: Write>(&self, series: Series, w: &mut W) -> io::Result<()> {
        match series {
            Series::Memory => writeln!(w, "memory\n{:.6}", to_mib(self.memory)),
            Series::Time => writeln!(
                w,
                "Wtime,Stime,Utime\n{:.6},{:.6},{:.6}",
                self.wtime.as_secs_f64(),
                self.stime.as_secs_f64(),
                self.utime.as_secs_f64()
            ),
            Series::FileSize => writeln!(w, "file_size\n{:.6}", to_mib(self.file_size)),
        }
    }

    pub fn series_csv(&self, series: Series) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_csv(series, &mut buf);
        buf
    }

    pub fn save_csv(&self, series: Series, path: &Path) -> Result<()> {
        let mut f = File::create(path)?;
        self.write_csv(series, &mut f)?;
        f.flush()?;
        debug!(%series, path = %path.display(), "wrote series");
        Ok(())
    }

    /// Like [`save_csv`](Self::save_csv) for a series named at runtime. An
    /// unknown name fails before anything is created on disk.
    pub fn save_csv_named(&self, series: &str, path: &Path) -> Result<()> {
        let series: Series = series.parse()?;
        self.save_csv(series, path)
    }

    /// Write `<prefix>memory.csv`, `<prefix>time.csv` and
    /// `<prefix>file_size.csv`, stopping at the first failure.
    pub fn save_all_csv(&self, prefix: &str) -> Result<()> {
        for series in Series::ALL {
            let path = format!("{prefix}{series}.csv");
            self.save_csv(series, Path::new(&path))?;
        }
        Ok(())
    }
}
