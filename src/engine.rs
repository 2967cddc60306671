// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The seam between the harness and the two fractal engines.

use std::fmt;
use std::str::FromStr;

use crate::device::Device;
use crate::errors::FractalError;

/// Which way to evaluate a fractal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// One thread, no synchronization, deterministic given a seed.
    Sequential,
    /// One lane per output slot on the device.
    Parallel,
}

impl Strategy {
    /// The short label used in file names and on the command line.
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Sequential => "cpu",
            Strategy::Parallel => "gpu",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Strategy {
    type Err = FractalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" | "sequential" => Ok(Strategy::Sequential),
            "gpu" | "parallel" => Ok(Strategy::Parallel),
            _ => Err(FractalError::config(format!("unknown strategy '{}'", s))),
        }
    }
}

/// A fractal generator with both evaluation strategies.  Engines are
/// validated at construction, so the strategy methods only fail at
/// runtime (a device fault, say).
pub trait Engine {
    /// What the engine produces.
    type Output;

    /// Evaluate on the calling thread.
    fn sequential(&self) -> Result<Self::Output, FractalError>;

    /// Evaluate on `device`.
    fn parallel(&self, device: &Device) -> Result<Self::Output, FractalError>;

    /// Evaluate with the strategy chosen by the caller.
    fn generate(&self, strategy: Strategy, device: &Device) -> Result<Self::Output, FractalError> {
        match strategy {
            Strategy::Sequential => self.sequential(),
            Strategy::Parallel => self.parallel(device),
        }
    }
}
