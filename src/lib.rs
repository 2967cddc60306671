#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fractal benchmark
//!
//! Two fractals, each generated two ways, with a stopwatch on both.
//!
//! The first is the attractor of an Iterated Function System, found by
//! the chaos game: keep pushing points through affine transforms
//! picked at random, weighted by how much of the attractor each
//! transform covers, and the points pile up on the attractor.  The
//! second is the escape-time Julia set of `z² + c`: count how long
//! each starting point takes to run off to infinity.
//!
//! Each fractal has a sequential strategy, one thread and a plain
//! loop, and a parallel strategy written the way a GPU kernel would
//! be: one lane per output slot, dispatched in blocks onto a
//! [`device::Device`].  The [`harness::BenchmarkHarness`] runs either
//! or both, times the generation alone, writes a PNG for each result
//! and appends the timings to a CSV file.

pub mod chaos;
pub mod device;
pub mod engine;
pub mod errors;
pub mod hammersley;
pub mod harness;
pub mod julia;
pub mod metrics;
pub mod planes;
pub mod render;
pub mod transforms;

pub use chaos::{ChaosGame, ChaosSettings, PointCloud};
pub use device::{Device, DeviceConfig};
pub use engine::{Engine, Strategy};
pub use errors::FractalError;
pub use harness::{BenchmarkHarness, Fractal, Job, Sweep};
pub use julia::{EscapeGrid, EscapeSettings, EscapeTime};
pub use transforms::{AffineTransform, Point, TransformTable};
