// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Escape-time Julia sets.
//!
//! Every cell of the grid is a starting point `z` on the complex
//! plane.  Iterate `z ← z² + c` and count how many steps it takes for
//! `|z|` to pass the divergence value; points that never get there
//! within the iteration budget record the budget itself.
//!
//! Counting convention: a step is taken only while `|z|` is still
//! within the divergence value and fewer than `max_iterations` steps
//! have been taken, so a start point already outside records `0` and
//! a bounded orbit records exactly `max_iterations`.  Both strategies
//! call the same [`escape_count`].

use itertools::iproduct;
use log::debug;
use num::Complex;

use crate::device::Device;
use crate::engine::Engine;
use crate::errors::FractalError;
use crate::planes::{GridMapper, Pixel};

/// The names accepted by [`named`].
pub const NAMES: [&str; 6] = ["set1", "set2", "set3", "set4", "set5", "set6"];

/// Look up one of the registered Julia constants, `set1` to `set6`.
pub fn named(name: &str) -> Result<Complex<f64>, FractalError> {
    match name {
        "set1" => Ok(Complex::new(-0.8, 0.156)),
        "set2" => Ok(Complex::new(0.285, 0.01)),
        "set3" => Ok(Complex::new(-0.4, 0.6)),
        "set4" => Ok(Complex::new(-0.835, -0.2321)),
        "set5" => Ok(Complex::new(-0.701_76, -0.3842)),
        "set6" => Ok(Complex::new(0.45, 0.1428)),
        _ => Err(FractalError::UnknownFractal(name.to_string())),
    }
}

/// The same lookup by number, as the command line takes it.
pub fn numbered(n: usize) -> Result<Complex<f64>, FractalError> {
    named(&format!("set{}", n))
}

/// See [`escape_count`] for how the counting works.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EscapeSettings {
    /// The `c` in `z² + c`.
    pub constant: Complex<f64>,
    /// The iteration budget per cell.
    pub max_iterations: u32,
    /// The magnitude past which a point has escaped.
    pub divergence: f64,
    /// Cells along the real axis.
    pub width: usize,
    /// Cells along the imaginary axis.
    pub height: usize,
}

impl Default for EscapeSettings {
    fn default() -> Self {
        EscapeSettings {
            constant: Complex::new(-0.8, 0.156),
            max_iterations: 200,
            divergence: 10.0,
            width: 300,
            height: 300,
        }
    }
}

/// The number of steps `z` takes to escape.
#[inline]
pub fn escape_count(z: Complex<f64>, c: Complex<f64>, max_iterations: u32, divergence: f64) -> u32 {
    let limit = divergence * divergence;
    let mut z = z;
    let mut count = 0;
    while count < max_iterations && z.norm_sqr() <= limit {
        z = z * z + c;
        count += 1;
    }
    count
}

/// A `width × height` grid of escape counts, stored one column (one
/// value of the real axis) after another.
#[derive(Clone, Debug, PartialEq)]
pub struct EscapeGrid {
    width: usize,
    height: usize,
    cells: Vec<u32>,
}

impl EscapeGrid {
    /// Cells along the real axis.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Cells along the imaginary axis.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The count for cell `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> u32 {
        self.cells[i * self.height + j]
    }

    /// All counts, column-major.
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }
}

/// A validated escape-time problem.
#[derive(Clone, Debug)]
pub struct EscapeTime {
    settings: EscapeSettings,
    mapper: GridMapper,
}

impl EscapeTime {
    /// Rejects empty grids, a zero iteration budget, and divergence
    /// values that aren't positive finite numbers.
    pub fn new(settings: EscapeSettings) -> Result<Self, FractalError> {
        if settings.width == 0 || settings.height == 0 {
            return Err(FractalError::config(format!(
                "grid must not be empty, got {}x{}",
                settings.width, settings.height
            )));
        }
        if settings.max_iterations == 0 {
            return Err(FractalError::config("iteration count must be at least 1"));
        }
        if !(settings.divergence.is_finite() && settings.divergence > 0.0) {
            return Err(FractalError::config(format!(
                "divergence value must be positive, got {}",
                settings.divergence
            )));
        }
        if !(settings.constant.re.is_finite() && settings.constant.im.is_finite()) {
            return Err(FractalError::config("Julia constant must be finite"));
        }
        Ok(EscapeTime {
            settings,
            mapper: GridMapper::new(settings.width, settings.height),
        })
    }

    /// The settings this problem was built with.
    pub fn settings(&self) -> &EscapeSettings {
        &self.settings
    }

    #[inline]
    fn count(&self, i: usize, j: usize) -> u32 {
        escape_count(
            self.mapper.cell_to_point(&Pixel(i, j)),
            self.settings.constant,
            self.settings.max_iterations,
            self.settings.divergence,
        )
    }

    fn grid(&self, cells: Vec<u32>) -> EscapeGrid {
        EscapeGrid {
            width: self.settings.width,
            height: self.settings.height,
            cells,
        }
    }
}

impl Engine for EscapeTime {
    type Output = EscapeGrid;

    fn sequential(&self) -> Result<EscapeGrid, FractalError> {
        let (width, height) = (self.settings.width, self.settings.height);
        let cells = iproduct!(0..width, 0..height)
            .map(|(i, j)| self.count(i, j))
            .collect();
        Ok(self.grid(cells))
    }

    fn parallel(&self, device: &Device) -> Result<EscapeGrid, FractalError> {
        let height = self.settings.height;
        let mut cells = vec![0u32; self.settings.width * height];
        device.launch(&mut cells, |index, slot| {
            *slot = self.count(index / height, index % height);
        })?;
        debug!("escape grid: {} cells", cells.len());
        Ok(self.grid(cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceConfig;

    fn device() -> Device {
        Device::new(DeviceConfig {
            block_size: 16,
            partitions: 3,
        })
        .unwrap()
    }

    fn settings(c: Complex<f64>, max_iterations: u32, divergence: f64, size: usize) -> EscapeSettings {
        EscapeSettings {
            constant: c,
            max_iterations,
            divergence,
            width: size,
            height: size,
        }
    }

    #[test]
    fn bad_settings_are_rejected() {
        let c = Complex::new(0.0, 0.0);
        assert!(EscapeTime::new(settings(c, 10, 2.0, 0)).is_err());
        assert!(EscapeTime::new(settings(c, 0, 2.0, 4)).is_err());
        assert!(EscapeTime::new(settings(c, 10, 0.0, 4)).is_err());
        assert!(EscapeTime::new(settings(c, 10, std::f64::NAN, 4)).is_err());
    }

    #[test]
    fn origin_is_a_fixed_point_of_z_squared() {
        let et = EscapeTime::new(settings(Complex::new(0.0, 0.0), 50, 2.0, 64)).unwrap();
        assert_eq!(et.sequential().unwrap().get(32, 32), 50);
        assert_eq!(et.parallel(&device()).unwrap().get(32, 32), 50);
    }

    #[test]
    fn start_outside_records_zero() {
        assert_eq!(escape_count(Complex::new(3.0, 0.0), Complex::new(0.0, 0.0), 10, 2.0), 0);
    }

    #[test]
    fn four_by_four_grid_for_c_minus_one() {
        // Worked by hand from re = 0.75·(i−2), im = 0.5·(j−2).
        let expected: Vec<u32> = vec![
            1, 2, 5, 2, // re = -1.5
            1, 3, 5, 3, // re = -0.75
            2, 5, 5, 5, // re = 0
            1, 3, 5, 3, // re = 0.75
        ];
        let et = EscapeTime::new(settings(Complex::new(-1.0, 0.0), 5, 2.0, 4)).unwrap();
        assert_eq!(et.sequential().unwrap().cells(), &expected[..]);
        assert_eq!(et.parallel(&device()).unwrap().cells(), &expected[..]);
    }

    #[test]
    fn larger_divergence_never_lowers_a_count() {
        let c = named("set1").unwrap();
        let grids: Vec<EscapeGrid> = [1.5, 2.0, 4.0, 10.0]
            .iter()
            .map(|&d| EscapeTime::new(settings(c, 100, d, 40)).unwrap().sequential().unwrap())
            .collect();
        for pair in grids.windows(2) {
            for (low, high) in pair[0].cells().iter().zip(pair[1].cells().iter()) {
                assert!(low <= high);
            }
        }
    }

    #[test]
    fn strategies_produce_identical_grids() {
        for name in NAMES.iter() {
            let c = named(name).unwrap();
            let et = EscapeTime::new(EscapeSettings {
                width: 37,
                height: 23,
                ..settings(c, 120, 10.0, 0)
            })
            .unwrap();
            assert_eq!(et.sequential().unwrap(), et.parallel(&device()).unwrap());
        }
    }

    #[test]
    fn constants_resolve_by_number() {
        assert_eq!(numbered(1).unwrap(), Complex::new(-0.8, 0.156));
        assert!(numbered(7).is_err());
        assert!(numbered(0).is_err());
    }
}
