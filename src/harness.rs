// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Runs fractal jobs under one or both strategies, times the
//! generation step alone, and hands the results to the image and
//! metrics sinks.
//!
//! Every strategy of a job is generated before anything is written,
//! so a failing sink never costs a computed result, and a failing
//! strategy aborts the job before anything is written at all.  There
//! are no retries and no fallback from the parallel strategy to the
//! sequential one.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use itertools::iproduct;
use log::info;

use crate::chaos::{ChaosGame, ChaosSettings};
use crate::device::Device;
use crate::engine::{Engine, Strategy};
use crate::errors::FractalError;
use crate::julia::{self, EscapeSettings, EscapeTime};
use crate::metrics::{MetricsSink, RunRecord};
use crate::render::ImageSink;
use crate::transforms::{self, TransformTable};

/// What to generate.
#[derive(Clone, Debug)]
pub enum Fractal {
    /// A chaos-game attractor plotted into a `width × height` image.
    Ifs {
        /// Table name, for the records.
        name: String,
        /// The transforms.
        table: TransformTable,
        /// Point count and passes.
        settings: ChaosSettings,
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },
    /// An escape-time grid; the image is the grid.
    Julia {
        /// Constant name, for the records.
        name: String,
        /// Constant, bounds, and grid size.
        settings: EscapeSettings,
    },
}

fn check_image_size(width: usize, height: usize) -> Result<(), FractalError> {
    if width == 0 || height == 0 {
        return Err(FractalError::config(format!(
            "image size {}x{} has no pixels",
            width, height
        )));
    }
    Ok(())
}

impl Fractal {
    /// One of the registered IFS tables.  The image must have at
    /// least one pixel.
    pub fn ifs(
        name: &str,
        settings: ChaosSettings,
        width: usize,
        height: usize,
    ) -> Result<Self, FractalError> {
        check_image_size(width, height)?;
        Ok(Fractal::Ifs {
            name: name.to_string(),
            table: transforms::named(name)?,
            settings,
            width,
            height,
        })
    }

    /// One of the registered Julia constants, by number.  The
    /// constant in `settings` is replaced.
    pub fn julia(number: usize, settings: EscapeSettings) -> Result<Self, FractalError> {
        let constant = julia::numbered(number)?;
        Ok(Fractal::Julia {
            name: format!("set{}", number),
            settings: EscapeSettings {
                constant,
                ..settings
            },
        })
    }

    /// The identifier that goes into the records.
    pub fn name(&self) -> &str {
        match self {
            Fractal::Ifs { name, .. } | Fractal::Julia { name, .. } => name,
        }
    }
}

/// A fractal, the strategies to run it under, and where each
/// strategy's image goes.
#[derive(Clone, Debug)]
pub struct Job {
    /// What to generate.
    pub fractal: Fractal,
    /// Run in this order.
    pub strategies: Vec<Strategy>,
    /// Image for the sequential result, if any.
    pub cpu_output: Option<PathBuf>,
    /// Image for the parallel result, if any.
    pub gpu_output: Option<PathBuf>,
}

impl Job {
    /// Both strategies, no images.
    pub fn new(fractal: Fractal) -> Self {
        Job {
            fractal,
            strategies: vec![Strategy::Sequential, Strategy::Parallel],
            cpu_output: None,
            gpu_output: None,
        }
    }

    fn output(&self, strategy: Strategy) -> Option<&PathBuf> {
        match strategy {
            Strategy::Sequential => self.cpu_output.as_ref(),
            Strategy::Parallel => self.gpu_output.as_ref(),
        }
    }
}

/// The parameter grid of a sweep: every table × every point count ×
/// every square image size.
#[derive(Clone, Debug)]
pub struct Sweep {
    /// Tables to run.
    pub names: Vec<String>,
    /// Point counts to run.
    pub points: Vec<usize>,
    /// Square image sizes to run.
    pub sizes: Vec<usize>,
    /// Kernel passes for the parallel strategy.
    pub passes: usize,
    /// Where to put the images, or `None` to skip them.
    pub image_dir: Option<PathBuf>,
}

impl Default for Sweep {
    fn default() -> Self {
        Sweep {
            names: transforms::NAMES.iter().map(|n| n.to_string()).collect(),
            points: vec![10_000, 50_000, 100_000, 150_000, 200_000, 300_000],
            sizes: vec![300, 600, 1200],
            passes: ChaosSettings::default().passes,
            image_dir: None,
        }
    }
}

fn time<E: Engine>(
    engine: &E,
    strategy: Strategy,
    device: &Device,
) -> Result<(E::Output, Duration), FractalError> {
    let start = Instant::now();
    let output = engine.generate(strategy, device)?;
    Ok((output, start.elapsed()))
}

fn time_all<E: Engine>(
    engine: &E,
    strategies: &[Strategy],
    device: &Device,
) -> Result<Vec<(Strategy, E::Output, Duration)>, FractalError> {
    strategies
        .iter()
        .map(|&strategy| -> Result<(Strategy, E::Output, Duration), FractalError> {
            let (output, elapsed) = time(engine, strategy, device)?;
            info!("{} strategy finished in {:?}", strategy, elapsed);
            Ok((strategy, output, elapsed))
        })
        .collect()
}

/// Drives jobs against a device and a pair of sinks.
pub struct BenchmarkHarness<'a> {
    device: &'a Device,
    images: &'a mut dyn ImageSink,
    metrics: &'a mut dyn MetricsSink,
}

impl<'a> BenchmarkHarness<'a> {
    /// Constructor.
    pub fn new(
        device: &'a Device,
        images: &'a mut dyn ImageSink,
        metrics: &'a mut dyn MetricsSink,
    ) -> Self {
        BenchmarkHarness {
            device,
            images,
            metrics,
        }
    }

    /// Generate, time, write the images, record the timings.
    pub fn run(&mut self, job: &Job) -> Result<RunRecord, FractalError> {
        if job.strategies.is_empty() {
            return Err(FractalError::config("a job needs at least one strategy"));
        }

        let mut record = RunRecord {
            fractal: job.fractal.name().to_string(),
            count: 0,
            width: 0,
            height: 0,
            block_size: self.device.block_size(),
            cpu: None,
            gpu: None,
        };

        let timings: Vec<(Strategy, Duration)> = match &job.fractal {
            Fractal::Ifs {
                table,
                settings,
                width,
                height,
                ..
            } => {
                check_image_size(*width, *height)?;
                let game = ChaosGame::new(table.clone(), *settings)?;
                info!(
                    "{}: {} points into {}x{}",
                    record.fractal,
                    game.settings().num_points,
                    width,
                    height
                );
                let results = time_all(&game, &job.strategies, self.device)?;
                for (strategy, cloud, _) in &results {
                    if let Some(path) = job.output(*strategy) {
                        self.images.write_cloud(cloud, *width, *height, path)?;
                    }
                }
                record.count = settings.num_points;
                record.width = *width;
                record.height = *height;
                results.into_iter().map(|(s, _, d)| (s, d)).collect()
            }
            Fractal::Julia { settings, .. } => {
                let escape = EscapeTime::new(*settings)?;
                let checked = escape.settings();
                info!(
                    "{}: {} iterations over {}x{}",
                    record.fractal, checked.max_iterations, checked.width, checked.height
                );
                let results = time_all(&escape, &job.strategies, self.device)?;
                for (strategy, grid, _) in &results {
                    if let Some(path) = job.output(*strategy) {
                        self.images.write_grid(grid, path)?;
                    }
                }
                record.count = settings.max_iterations as usize;
                record.width = settings.width;
                record.height = settings.height;
                results.into_iter().map(|(s, _, d)| (s, d)).collect()
            }
        };

        for (strategy, elapsed) in timings {
            match strategy {
                Strategy::Sequential => record.cpu = Some(elapsed),
                Strategy::Parallel => record.gpu = Some(elapsed),
            }
        }
        self.metrics.record(&record)?;
        Ok(record)
    }

    /// Run every combination of a sweep with both strategies.
    pub fn sweep(&mut self, sweep: &Sweep) -> Result<Vec<RunRecord>, FractalError> {
        if let Some(dir) = &sweep.image_dir {
            fs::create_dir_all(dir).map_err(|e| FractalError::Io {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let mut records = vec![];
        for (&points, &size, name) in iproduct!(&sweep.points, &sweep.sizes, &sweep.names) {
            let settings = ChaosSettings {
                num_points: points,
                passes: sweep.passes,
                ..ChaosSettings::default()
            };
            let mut job = Job::new(Fractal::ifs(name, settings, size, size)?);
            if let Some(dir) = &sweep.image_dir {
                job.cpu_output = Some(dir.join(format!("cpu{}_{}_{}.png", name, points, size)));
                job.gpu_output = Some(dir.join(format!("gpu{}_{}_{}.png", name, points, size)));
            }
            records.push(self.run(&job)?);
        }
        Ok(records)
    }
}
