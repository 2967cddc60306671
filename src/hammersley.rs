// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The Hammersley point set, used to seed the parallel chaos game.
//!
//! Seeding every slot at the origin would make the first few passes
//! of the parallel kernel redundant, and seeding them with a uniform
//! RNG clumps.  The Hammersley set covers the unit square evenly and
//! is a pure function of `(index, num_samples)`, so any lane can
//! compute its own seed without talking to anybody else.

use crate::transforms::Point;

/// Bits needed to address `num_samples` indices: `ceil(log2(n))`,
/// and zero for `n <= 1`.
pub fn num_bits(num_samples: usize) -> u32 {
    if num_samples <= 1 {
        return 0;
    }
    num_samples.next_power_of_two().trailing_zeros()
}

/// A Hammersley set of a fixed size.
#[derive(Copy, Clone, Debug)]
pub struct Hammersley {
    num_samples: usize,
    bits: u32,
}

impl Hammersley {
    /// Constructor.
    pub fn new(num_samples: usize) -> Self {
        Hammersley {
            num_samples,
            bits: num_bits(num_samples),
        }
    }

    /// The number of points in the set.
    pub fn len(&self) -> usize {
        self.num_samples
    }

    /// True when the set has no points.
    pub fn is_empty(&self) -> bool {
        self.num_samples == 0
    }

    /// The bit width used for the reversal.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The `index`th point.  `x` is the base-2 radical inverse of
    /// `index` (its low `bits` bits mirrored across the binary point),
    /// `y` is the same bits read in their natural order.
    pub fn sample(&self, index: usize) -> Point {
        if self.bits == 0 {
            return Point::new(0.0, 0.0);
        }
        let mask = if self.bits >= 64 {
            u64::max_value()
        } else {
            (1u64 << self.bits) - 1
        };
        let index = index as u64 & mask;
        let reversed = index.reverse_bits() >> (64 - self.bits);
        let scale = 2f64.powi(self.bits as i32);
        Point::new(reversed as f64 / scale, index as f64 / scale)
    }

    /// Every point of the set, in index order.
    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.num_samples).map(move |i| self.sample(i))
    }
}
