// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The chaos game.
//!
//! Pick a point, pick a transform from the IFS with the probability
//! its weight dictates, apply it, repeat.  The points visited trace
//! out the attractor of the IFS.
//!
//! The two strategies build their clouds differently and should only
//! be compared statistically:
//!
//! * The sequential game starts from the origin and, every round,
//!   pushes every point it already has through one random transform,
//!   keeping the whole history.  Points are kept in a set keyed by
//!   their exact coordinates, so orbits that land on a point already
//!   seen (fixed points, mostly) don't grow the cloud.
//!
//! * The parallel game allocates exactly `num_points` slots seeded
//!   from the Hammersley set, then runs `passes + 1` kernel passes.
//!   In each pass every lane reads a random slot from the previous
//!   pass, transforms it, and writes it into its own slot.  Only the
//!   last pass survives.

use std::collections::BTreeSet;
use std::mem;
use std::time::Instant;

use log::{debug, warn};
use rand::rngs::{SmallRng, StdRng};
use rand::{Rng, SeedableRng};

use crate::device::Device;
use crate::engine::Engine;
use crate::errors::FractalError;
use crate::hammersley::Hammersley;
use crate::transforms::{Point, TransformTable};

/// Extra kernel passes after the first, when nobody says otherwise.
pub const DEFAULT_PASSES: usize = 15;

/// Rounds without growth after which the sequential game gives up.
pub const DEFAULT_STALL_ROUNDS: usize = 64;

/// The knobs of a chaos-game run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChaosSettings {
    /// Sequential: grow until the cloud is larger than this.
    /// Parallel: the exact number of slots.
    pub num_points: usize,
    /// Parallel only: how many times the kernel is re-run after the
    /// first pass.
    pub passes: usize,
    /// Sequential only: consecutive rounds that add nothing before the
    /// cloud is declared closed under the table.
    pub stall_rounds: usize,
    /// Sequential only: RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ChaosSettings {
    fn default() -> Self {
        ChaosSettings {
            num_points: 100_000,
            passes: DEFAULT_PASSES,
            stall_rounds: DEFAULT_STALL_ROUNDS,
            seed: None,
        }
    }
}

/// The smallest axis-aligned rectangle containing a cloud.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    /// Lower-left corner.
    pub min: Point,
    /// Upper-right corner.
    pub max: Point,
}

impl Bounds {
    /// Horizontal extent.
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Vertical extent.
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// The output of either chaos-game strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct PointCloud {
    points: Vec<Point>,
}

impl PointCloud {
    /// Wrap a list of points.
    pub fn new(points: Vec<Point>) -> Self {
        PointCloud { points }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True for a cloud with no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The points themselves.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Iterate over the points.
    pub fn iter(&self) -> std::slice::Iter<Point> {
        self.points.iter()
    }

    /// Exact-equality membership test.
    pub fn contains(&self, p: &Point) -> bool {
        self.points.iter().any(|q| q == p)
    }

    /// Bounding box, or `None` for an empty cloud.
    pub fn bounds(&self) -> Option<Bounds> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold(
            Bounds {
                min: first,
                max: first,
            },
            |b, p| Bounds {
                min: Point::new(b.min.x.min(p.x), b.min.y.min(p.y)),
                max: Point::new(b.max.x.max(p.x), b.max.y.max(p.y)),
            },
        ))
    }

    /// Centroid, or `None` for an empty cloud.
    pub fn mean(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }
}

// Set key for exact-coordinate dedup.  Ordering is by bit pattern,
// which is total and exact; adding 0.0 folds -0.0 onto 0.0 first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PointKey(u64, u64);

impl From<Point> for PointKey {
    fn from(p: Point) -> Self {
        PointKey((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits())
    }
}

impl From<PointKey> for Point {
    fn from(k: PointKey) -> Self {
        Point::new(f64::from_bits(k.0), f64::from_bits(k.1))
    }
}

/// A validated chaos-game problem.
#[derive(Clone, Debug)]
pub struct ChaosGame {
    table: TransformTable,
    settings: ChaosSettings,
}

impl ChaosGame {
    /// Rejects a zero point count and a zero stall limit.
    pub fn new(table: TransformTable, settings: ChaosSettings) -> Result<Self, FractalError> {
        if settings.num_points == 0 {
            return Err(FractalError::config("the chaos game needs at least one point"));
        }
        if settings.stall_rounds == 0 {
            return Err(FractalError::config("stall rounds must be at least 1"));
        }
        Ok(ChaosGame { table, settings })
    }

    /// The settings this game was built with.
    pub fn settings(&self) -> &ChaosSettings {
        &self.settings
    }
}

// Lanes seed themselves from the clock and their index.  Two lanes can
// still collide; the parallel output is only ever compared
// statistically.
fn lane_rng(origin: Instant, index: usize) -> SmallRng {
    let tick = origin.elapsed().as_nanos() as u64;
    SmallRng::seed_from_u64(tick ^ (index as u64).rotate_left(32))
}

impl Engine for ChaosGame {
    type Output = PointCloud;

    fn sequential(&self) -> Result<PointCloud, FractalError> {
        let mut rng = match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let table = &self.table;
        let total = table.total_weight();

        let mut points: BTreeSet<PointKey> = BTreeSet::new();
        points.insert(PointKey::from(Point::new(0.0, 0.0)));

        let mut round = 0;
        let mut stalled = 0;
        while points.len() <= self.settings.num_points {
            let fresh: Vec<PointKey> = points
                .iter()
                .map(|&key| {
                    let r = rng.gen::<f64>() * total;
                    PointKey::from(table.select(r).apply(Point::from(key)))
                })
                .collect();

            let before = points.len();
            points.extend(fresh);
            round += 1;
            debug!("round {}: {} points", round, points.len());

            if points.len() == before {
                stalled += 1;
                if stalled >= self.settings.stall_rounds {
                    warn!(
                        "no new points in {} rounds, stopping at {} of {}",
                        stalled,
                        points.len(),
                        self.settings.num_points
                    );
                    break;
                }
            } else {
                stalled = 0;
            }
        }

        Ok(PointCloud::new(points.into_iter().map(Point::from).collect()))
    }

    fn parallel(&self, device: &Device) -> Result<PointCloud, FractalError> {
        let seeds = Hammersley::new(self.settings.num_points);
        let n = seeds.len();
        let mut front = vec![Point::default(); n];
        device.launch(&mut front, |index, slot| *slot = seeds.sample(index))?;

        let mut back = vec![Point::default(); n];
        let origin = Instant::now();
        let total = self.table.total_weight();
        let table = &self.table;

        for pass in 0..=self.settings.passes {
            {
                let source = &front;
                device.launch_shared(
                    &mut back,
                    || table.clone(),
                    |cache, index, slot| {
                        let mut rng = lane_rng(origin, index);
                        let random = rng.gen::<f64>() * total;
                        let start = source[rng.gen_range(0, n)];
                        *slot = cache.select(random).apply(start);
                    },
                )?;
            }
            mem::swap(&mut front, &mut back);
            debug!("pass {} of {}", pass + 1, self.settings.passes + 1);
        }

        Ok(PointCloud::new(front))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceConfig;
    use crate::transforms::{named, AffineTransform};

    fn device() -> Device {
        Device::new(DeviceConfig {
            block_size: 64,
            partitions: 4,
        })
        .unwrap()
    }

    fn settings(num_points: usize) -> ChaosSettings {
        ChaosSettings {
            num_points,
            seed: Some(1234),
            ..ChaosSettings::default()
        }
    }

    fn identity_table() -> TransformTable {
        TransformTable::new(vec![AffineTransform::new(
            1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0,
        )])
        .unwrap()
    }

    #[test]
    fn zero_points_is_rejected() {
        let e = ChaosGame::new(named("fern").unwrap(), settings(0)).unwrap_err();
        assert!(e.is_configuration());
    }

    #[test]
    fn identity_table_collapses_to_the_origin() {
        let game = ChaosGame::new(identity_table(), settings(100)).unwrap();
        let cloud = game.sequential().unwrap();
        assert_eq!(cloud.points(), &[Point::new(0.0, 0.0)]);
    }

    #[test]
    fn negative_zero_is_the_same_coordinate() {
        // x' = -x - y - 0 maps (0,0) to (-0,0), which must not count
        // as a new point.
        let flip = TransformTable::new(vec![AffineTransform::new(
            -1.0, -1.0, 0.0, 1.0, -0.0, 0.0, 1.0,
        )])
        .unwrap();
        let game = ChaosGame::new(
            flip,
            ChaosSettings {
                stall_rounds: 3,
                ..settings(10)
            },
        )
        .unwrap();
        assert_eq!(game.sequential().unwrap().len(), 1);
    }

    #[test]
    fn sequential_cloud_exceeds_request_without_duplicates() {
        let game = ChaosGame::new(named("fern").unwrap(), settings(5_000)).unwrap();
        let cloud = game.sequential().unwrap();
        assert!(cloud.len() > 5_000);

        let unique: BTreeSet<PointKey> = cloud.iter().map(|&p| PointKey::from(p)).collect();
        assert_eq!(unique.len(), cloud.len());
    }

    #[test]
    fn seeded_sequential_runs_repeat() {
        let game = ChaosGame::new(named("maple").unwrap(), settings(2_000)).unwrap();
        assert_eq!(game.sequential().unwrap(), game.sequential().unwrap());
    }

    #[test]
    fn parallel_cloud_has_exactly_the_requested_size() {
        let game = ChaosGame::new(named("dragon").unwrap(), settings(1_000)).unwrap();
        let cloud = game.parallel(&device()).unwrap();
        assert_eq!(cloud.len(), 1_000);
        assert!(cloud.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn parallel_identity_only_shuffles_the_seeds() {
        let n = 512;
        let game = ChaosGame::new(identity_table(), settings(n)).unwrap();
        let cloud = game.parallel(&device()).unwrap();
        let seeds: Vec<Point> = Hammersley::new(n).iter().collect();
        assert!(cloud.iter().all(|p| seeds.contains(p)));
    }

    #[test]
    fn parallel_sierpinski_stays_in_the_unit_square() {
        let game = ChaosGame::new(
            named("sierpinski").unwrap(),
            ChaosSettings {
                passes: 0,
                ..settings(2_000)
            },
        )
        .unwrap();
        let cloud = game.parallel(&device()).unwrap();
        let b = cloud.bounds().unwrap();
        assert!(b.min.x >= 0.0 && b.min.y >= 0.0);
        assert!(b.max.x <= 1.0 && b.max.y <= 1.0);
    }

    fn mean_and_variance(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        (mean, variance)
    }

    #[test]
    fn parallel_bounding_boxes_match_the_sequential_one() {
        let game = ChaosGame::new(named("fern").unwrap(), settings(20_000)).unwrap();
        let seq = game.sequential().unwrap().bounds().unwrap();
        let d = device();
        let boxes: Vec<Bounds> = (0..4)
            .map(|_| game.parallel(&d).unwrap().bounds().unwrap())
            .collect();

        // The sequential centroid sits near the origin because every
        // early orbit is kept, so only the extents are comparable.
        let corners: [(fn(&Bounds) -> f64, f64); 6] = [
            (|b| b.min.x, seq.min.x),
            (|b| b.max.x, seq.max.x),
            (|b| b.min.y, seq.min.y),
            (|b| b.max.y, seq.max.y),
            (|b| b.width(), seq.width()),
            (|b| b.height(), seq.height()),
        ];
        for (i, (extract, expected)) in corners.iter().enumerate() {
            let values: Vec<f64> = boxes.iter().map(extract).collect();
            let (mean, variance) = mean_and_variance(&values);
            assert!(
                (mean - expected).abs() < 0.6,
                "extent {}: mean {} vs {} over {:?}",
                i,
                mean,
                expected,
                boxes
            );
            assert!(variance < 0.25, "extent {}: variance {}", i, variance);
        }
    }

    #[test]
    fn bounds_and_mean_of_a_small_cloud() {
        let cloud = PointCloud::new(vec![
            Point::new(-1.0, 2.0),
            Point::new(3.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        let b = cloud.bounds().unwrap();
        assert_eq!(b.min, Point::new(-1.0, 0.0));
        assert_eq!(b.max, Point::new(3.0, 2.0));
        assert_eq!(cloud.mean().unwrap(), Point::new(1.0, 1.0));
        assert!(cloud.contains(&Point::new(3.0, 0.0)));
        assert!(PointCloud::new(vec![]).bounds().is_none());
    }
}
