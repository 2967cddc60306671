// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Probability-weighted affine transforms, the input of the chaos
//! game.  An Iterated Function System is nothing more than a short
//! list of contractions of the plane, each with a weight that says
//! how often it should be picked.  Apply a randomly picked one to a
//! point often enough and the point settles onto the attractor.

use crate::errors::FractalError;

/// A point on the real plane.  The chaos game works in plain `f64`
/// pairs; `Complex` is reserved for the escape-time side.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Constructor.
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// `x' = a·x + b·y + e`, `y' = c·x + d·y + f`, picked with relative
/// probability `weight`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AffineTransform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    weight: f64,
}

impl AffineTransform {
    /// Coefficients in the traditional `[a, b, c, d, e, f, p]` order
    /// IFS tables are published in.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64, weight: f64) -> Self {
        AffineTransform {
            a,
            b,
            c,
            d,
            e,
            f,
            weight,
        }
    }

    /// The relative probability of this transform being picked.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Map a point through the transform.
    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.b * p.y + self.e,
            y: self.c * p.x + self.d * p.y + self.f,
        }
    }

    fn coefficients(&self) -> [f64; 7] {
        [self.a, self.b, self.c, self.d, self.e, self.f, self.weight]
    }
}

/// An ordered, validated set of transforms.  Order matters: when two
/// running sums tie, the earlier transform wins.
#[derive(Clone, Debug)]
pub struct TransformTable {
    transforms: Vec<AffineTransform>,
    // cumulative[i] = w_0 + ... + w_i
    cumulative: Vec<f64>,
}

impl TransformTable {
    /// Validates and freezes a list of transforms.  Rejects empty
    /// tables, non-finite coefficients, negative weights, and tables
    /// whose weights sum to zero (there would be nothing to draw).
    pub fn new(transforms: Vec<AffineTransform>) -> Result<Self, FractalError> {
        if transforms.is_empty() {
            return Err(FractalError::config("transform table is empty"));
        }
        for (i, t) in transforms.iter().enumerate() {
            if t.coefficients().iter().any(|v| !v.is_finite()) {
                return Err(FractalError::config(format!(
                    "transform {} has a non-finite coefficient",
                    i
                )));
            }
            if t.weight < 0.0 {
                return Err(FractalError::config(format!(
                    "transform {} has a negative weight",
                    i
                )));
            }
        }

        let cumulative: Vec<f64> = transforms
            .iter()
            .scan(0.0, |sum, t| {
                *sum += t.weight;
                Some(*sum)
            })
            .collect();

        if cumulative[cumulative.len() - 1] <= 0.0 {
            return Err(FractalError::config("transform weights sum to zero"));
        }

        Ok(TransformTable {
            transforms,
            cumulative,
        })
    }

    /// Number of transforms in the table.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Always false for a constructed table; here to keep clippy quiet.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Sum of all weights.  Random draws are taken from
    /// `[0, total_weight)`.
    pub fn total_weight(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// The transforms, in table order.
    pub fn transforms(&self) -> &[AffineTransform] {
        &self.transforms
    }

    /// Index of the first transform whose running weight reaches `r`.
    /// If rounding leaves `r` above every running sum, the last
    /// transform takes it; no draw goes unmapped.
    #[inline]
    pub fn select_index(&self, r: f64) -> usize {
        self.cumulative
            .iter()
            .position(|&sum| sum >= r)
            .unwrap_or(self.transforms.len() - 1)
    }

    /// The transform picked by the draw `r`.
    #[inline]
    pub fn select(&self, r: f64) -> &AffineTransform {
        &self.transforms[self.select_index(r)]
    }
}

/// The names accepted by [`named`].
pub const NAMES: [&str; 5] = ["fern", "sierpinski", "maple", "tree", "dragon"];

fn table(rows: &[[f64; 7]]) -> Result<TransformTable, FractalError> {
    TransformTable::new(
        rows.iter()
            .map(|r| AffineTransform::new(r[0], r[1], r[2], r[3], r[4], r[5], r[6]))
            .collect(),
    )
}

/// Look up one of the built-in tables by name.
pub fn named(name: &str) -> Result<TransformTable, FractalError> {
    match name {
        "fern" => table(&[
            [0.0, 0.0, 0.0, 0.16, 0.0, 0.0, 0.01],
            [0.85, 0.04, -0.04, 0.85, 0.0, 1.6, 0.85],
            [0.2, -0.26, 0.23, 0.22, 0.0, 1.6, 0.07],
            [-0.15, 0.28, 0.26, 0.24, 0.0, 0.44, 0.07],
        ]),
        "sierpinski" => table(&[
            [0.5, 0.0, 0.0, 0.5, 0.0, 0.0, 0.33],
            [0.5, 0.0, 0.0, 0.5, 0.5, 0.0, 0.33],
            [0.5, 0.0, 0.0, 0.5, 0.25, 0.5, 0.34],
        ]),
        "maple" => table(&[
            [0.14, 0.01, 0.0, 0.51, -0.08, -1.31, 0.10],
            [0.43, 0.52, -0.45, 0.5, 1.49, -0.75, 0.35],
            [0.45, -0.49, 0.47, 0.47, -1.62, -0.74, 0.35],
            [0.49, 0.0, 0.0, 0.51, 0.02, 1.62, 0.20],
        ]),
        "tree" => table(&[
            [0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.05],
            [0.42, -0.42, 0.42, 0.42, 0.0, 0.2, 0.40],
            [0.42, 0.42, -0.42, 0.42, 0.0, 0.2, 0.40],
            [0.1, 0.0, 0.0, 0.1, 0.0, 0.2, 0.15],
        ]),
        "dragon" => table(&[
            [
                0.824_074, 0.281_482, -0.212_346, 0.864_198, -1.882_290, -0.110_607, 0.787_473,
            ],
            [
                0.088_272, 0.520_988, -0.463_889, -0.377_778, 0.785_360, 8.095_795, 0.212_527,
            ],
        ]),
        _ => Err(FractalError::UnknownFractal(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn identity(weight: f64) -> AffineTransform {
        AffineTransform::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0, weight)
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(TransformTable::new(vec![]).is_err());
    }

    #[test]
    fn zero_total_weight_is_rejected() {
        let e = TransformTable::new(vec![identity(0.0), identity(0.0)]).unwrap_err();
        assert!(e.is_configuration());
    }

    #[test]
    fn negative_and_non_finite_weights_are_rejected() {
        assert!(TransformTable::new(vec![identity(1.0), identity(-0.5)]).is_err());
        assert!(TransformTable::new(vec![identity(std::f64::NAN)]).is_err());
        let bad = AffineTransform::new(std::f64::INFINITY, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0);
        assert!(TransformTable::new(vec![bad]).is_err());
    }

    #[test]
    fn apply_uses_both_rows() {
        let t = AffineTransform::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 1.0);
        assert_eq!(t.apply(Point::new(1.0, 1.0)), Point::new(8.0, 13.0));
    }

    #[test]
    fn selection_takes_first_index_reaching_draw() {
        let table = TransformTable::new(vec![identity(1.0), identity(2.0), identity(1.0)]).unwrap();
        assert_eq!(table.total_weight(), 4.0);
        assert_eq!(table.select_index(0.0), 0);
        assert_eq!(table.select_index(1.0), 0);
        assert_eq!(table.select_index(1.5), 1);
        assert_eq!(table.select_index(3.0), 1);
        assert_eq!(table.select_index(3.5), 2);
    }

    #[test]
    fn selection_skips_zero_weight_entries_on_tie() {
        let table = TransformTable::new(vec![identity(1.0), identity(0.0), identity(1.0)]).unwrap();
        // The running sums are 1, 1, 2; a draw just above 1 lands on
        // the third transform, never the weightless second.
        assert_eq!(table.select_index(1.000_001), 2);
    }

    #[test]
    fn draws_past_the_total_fall_back_to_the_last_transform() {
        let table = TransformTable::new(vec![identity(0.1), identity(0.2)]).unwrap();
        assert_eq!(table.select_index(table.total_weight()), 1);
        assert_eq!(table.select_index(table.total_weight() + 1e-9), 1);
    }

    #[test]
    fn selection_frequencies_follow_weights() {
        let table = named("fern").unwrap();
        let total = table.total_weight();
        let trials = 20_000;
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts = vec![0usize; table.len()];
        for _ in 0..trials {
            let r = rng.gen::<f64>() * total;
            counts[table.select_index(r)] += 1;
        }

        // Chi-square goodness of fit against the weights; 16.27 is the
        // 0.1% critical value for three degrees of freedom.
        let chi: f64 = table
            .transforms()
            .iter()
            .zip(counts.iter())
            .map(|(t, &observed)| {
                let expected = trials as f64 * t.weight() / total;
                (observed as f64 - expected).powi(2) / expected
            })
            .sum();
        assert!(chi < 16.27, "chi-square {} too large: {:?}", chi, counts);
    }

    #[test]
    fn every_registered_name_resolves() {
        for name in NAMES.iter() {
            let table = named(name).unwrap();
            assert!(table.total_weight() > 0.0);
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        match named("mandelbrot") {
            Err(FractalError::UnknownFractal(name)) => assert_eq!(name, "mandelbrot"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
