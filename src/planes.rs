// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mappings between the integral plane of an image or grid, with its
//! origin at 0,0, and the real (or complex) plane the fractals live
//! on.
use num::Complex;

use crate::chaos::Bounds;
use crate::transforms::Point;

/// Describes the width and height of an integral plane that is assumed to start at
/// 0,0 and all values are assumed to be non-negative integers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegralPlane(pub usize, pub usize);

/// Describes the x, y of a cell in an integral plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// The fixed mapping of escape-time grid cells onto the complex plane:
/// the grid always covers `[-1.5, 1.5)` on the real axis and `[-1, 1)`
/// on the imaginary axis, whatever its resolution.
#[derive(Copy, Clone, Debug)]
pub struct GridMapper {
    /// The size of the grid.
    pub integral_plane: IntegralPlane,
}

impl GridMapper {
    /// Constructor.
    pub fn new(width: usize, height: usize) -> Self {
        GridMapper {
            integral_plane: IntegralPlane(width, height),
        }
    }

    /// `re = 1.5·(i − w/2)/(0.5·w)`, `im = (j − h/2)/(0.5·h)`.
    #[inline]
    pub fn cell_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        let w = self.integral_plane.0 as f64;
        let h = self.integral_plane.1 as f64;
        Complex::new(
            1.5 * (pixel.0 as f64 - w / 2.0) / (0.5 * w),
            (pixel.1 as f64 - h / 2.0) / (0.5 * h),
        )
    }
}

/// Fits a point cloud into an image.  Both axes share one scale
/// factor, the smaller of the two that would fill the image, so the
/// attractor keeps its aspect ratio.  The image's y axis points down,
/// the cloud's points up.
#[derive(Copy, Clone, Debug)]
pub struct CloudMapper {
    /// The size of the image.
    pub integral_plane: IntegralPlane,
    origin: Point,
    scale: f64,
}

impl CloudMapper {
    /// A cloud with no extent on either axis maps every point to the
    /// bottom-left pixel instead of dividing by zero.
    pub fn new(bounds: &Bounds, width: usize, height: usize) -> Self {
        let candidates = [
            width as f64 / bounds.width(),
            height as f64 / bounds.height(),
        ];
        let scale = candidates
            .iter()
            .cloned()
            .filter(|s| s.is_finite())
            .fold(None, |best: Option<f64>, s| {
                Some(best.map_or(s, |b| b.min(s)))
            })
            .unwrap_or(0.0);
        CloudMapper {
            integral_plane: IntegralPlane(width, height),
            origin: bounds.min,
            scale,
        }
    }

    /// The factor between cloud units and pixels.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The pixel a point lands on, or `None` if it falls outside the
    /// image.  Points exactly on the far edge are pulled back in.
    pub fn point_to_pixel(&self, point: &Point) -> Option<Pixel> {
        let IntegralPlane(width, height) = self.integral_plane;
        if width == 0 || height == 0 {
            return None;
        }
        let left = (point.x - self.origin.x) * self.scale;
        let up = (point.y - self.origin.y) * self.scale;
        if !(left >= 0.0 && up >= 0.0 && left <= width as f64 && up <= height as f64) {
            return None;
        }
        let column = (left as usize).min(width - 1);
        let row = (height - 1) - (up as usize).min(height - 1);
        Some(Pixel(column, row))
    }
}
