// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turning engine output into PNG files.  Everything here runs after
//! the timed region; the engines never see an image.

use std::path::Path;

use image::{GrayImage, Luma};

use crate::chaos::PointCloud;
use crate::errors::FractalError;
use crate::julia::EscapeGrid;
use crate::planes::{CloudMapper, Pixel};

/// Added to every count before taking the log, so a zero count maps
/// to a finite value.
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Where finished fractals go.
pub trait ImageSink {
    /// Plot a point cloud into a `width × height` image at `path`.
    fn write_cloud(
        &mut self,
        cloud: &PointCloud,
        width: usize,
        height: usize,
        path: &Path,
    ) -> Result<(), FractalError>;

    /// Shade an escape grid, one pixel per cell, into `path`.
    fn write_grid(&mut self, grid: &EscapeGrid, path: &Path) -> Result<(), FractalError>;
}

/// Writes grayscale PNGs.
#[derive(Copy, Clone, Debug)]
pub struct PngSink {
    /// See [`DEFAULT_TOLERANCE`].
    pub tolerance: f64,
}

impl Default for PngSink {
    fn default() -> Self {
        PngSink {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ImageSink for PngSink {
    fn write_cloud(
        &mut self,
        cloud: &PointCloud,
        width: usize,
        height: usize,
        path: &Path,
    ) -> Result<(), FractalError> {
        save_png(&cloud_image(cloud, width, height), path)
    }

    fn write_grid(&mut self, grid: &EscapeGrid, path: &Path) -> Result<(), FractalError> {
        save_png(&grid_image(grid, self.tolerance), path)
    }
}

/// White points on black, scaled to fit with the aspect ratio kept.
pub fn cloud_image(cloud: &PointCloud, width: usize, height: usize) -> GrayImage {
    let mut img = GrayImage::new(width as u32, height as u32);
    if let Some(bounds) = cloud.bounds() {
        let mapper = CloudMapper::new(&bounds, width, height);
        for point in cloud.iter() {
            if let Some(Pixel(x, y)) = mapper.point_to_pixel(point) {
                img.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
    }
    img
}

/// `-log(count + tolerance)`, stretched over the full gray range.
/// The imaginary axis points up.
pub fn grid_image(grid: &EscapeGrid, tolerance: f64) -> GrayImage {
    let (width, height) = (grid.width(), grid.height());
    let values: Vec<f64> = grid
        .cells()
        .iter()
        .map(|&count| -(f64::from(count) + tolerance).ln())
        .collect();
    let low = values.iter().cloned().fold(std::f64::INFINITY, f64::min);
    let high = values.iter().cloned().fold(std::f64::NEG_INFINITY, f64::max);
    let span = high - low;

    let mut img = GrayImage::new(width as u32, height as u32);
    for i in 0..width {
        for j in 0..height {
            let v = values[i * height + j];
            let shade = if span > 0.0 {
                ((v - low) / span * 255.0).round() as u8
            } else {
                0
            };
            img.put_pixel(i as u32, (height - 1 - j) as u32, Luma([shade]));
        }
    }
    img
}

/// Encode as PNG, the format picked from the extension.
pub fn save_png(img: &GrayImage, path: &Path) -> Result<(), FractalError> {
    img.save(path).map_err(|e| FractalError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
