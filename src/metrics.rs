// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Timing results, and the CSV file they accumulate in.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::FractalError;

/// The header row of the results file.
pub const HEADER: &str = "fractal,count,width,height,block_size,cpu_seconds,gpu_seconds";

/// One benchmark run: what was generated and how long each strategy
/// took.  A strategy that wasn't run has no duration.
#[derive(Clone, Debug, PartialEq)]
pub struct RunRecord {
    /// The table or constant name.
    pub fractal: String,
    /// Points requested, or the iteration budget.
    pub count: usize,
    /// Image width.
    pub width: usize,
    /// Image height.
    pub height: usize,
    /// Lanes per device block.
    pub block_size: usize,
    /// Sequential duration.
    pub cpu: Option<Duration>,
    /// Parallel duration.
    pub gpu: Option<Duration>,
}

fn seconds(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:.6}", d.as_secs_f64()),
        None => String::new(),
    }
}

impl RunRecord {
    /// The record as a CSV line, without the newline.
    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.fractal,
            self.count,
            self.width,
            self.height,
            self.block_size,
            seconds(self.cpu),
            seconds(self.gpu)
        )
    }

    /// Sequential time over parallel time, when both ran.
    pub fn speedup(&self) -> Option<f64> {
        match (self.cpu, self.gpu) {
            (Some(cpu), Some(gpu)) if gpu > Duration::from_secs(0) => {
                Some(cpu.as_secs_f64() / gpu.as_secs_f64())
            }
            _ => None,
        }
    }
}

/// Where timing records go.
pub trait MetricsSink {
    /// Record one run.
    fn record(&mut self, record: &RunRecord) -> Result<(), FractalError>;
}

/// Appends records to a CSV file, writing the header only when the
/// file starts out empty.
#[derive(Clone, Debug)]
pub struct CsvMetrics {
    path: PathBuf,
}

impl CsvMetrics {
    /// Constructor.  Nothing touches the disk until the first record.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CsvMetrics {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The file records are appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> FractalError {
        FractalError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

impl MetricsSink for CsvMetrics {
    fn record(&mut self, record: &RunRecord) -> Result<(), FractalError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let fresh = file.metadata().map_err(|e| self.io_error(e))?.len() == 0;

        let mut lines = String::new();
        if fresh {
            lines.push_str(HEADER);
            lines.push('\n');
        }
        lines.push_str(&record.to_csv());
        lines.push('\n');
        file.write_all(lines.as_bytes())
            .map_err(|e| self.io_error(e))
    }
}

/// Keeps records in memory.  The harness tests use it, and it is
/// handy for callers that want to print a table at the end.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetrics {
    /// Everything recorded so far, in order.
    pub records: Vec<RunRecord>,
}

impl MetricsSink for MemoryMetrics {
    fn record(&mut self, record: &RunRecord) -> Result<(), FractalError> {
        self.records.push(record.clone());
        Ok(())
    }
}
