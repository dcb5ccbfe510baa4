//! Source grids and their sampling strategies.
//!
//! A grid is the Cartesian product of an origin depth axis, a magnitude axis
//! and a set of source mechanisms. Index layout is row-major over
//! `[depth, magnitude, mechanism]` with the mechanism varying fastest:
//!
//! ```text
//! index = (depth_index * n_magnitudes + magnitude_index) * n_mechanisms + mechanism_index
//! ```
//!
//! Regular mechanism sets are themselves row-major over
//! `[strike, dip, rake, v, w]` (last axis fastest). Random mechanism sets are
//! drawn once at construction from a seeded ChaCha stream, so the same seed
//! always yields the same sequence.

use mt_types::{ConfigError, EvaluationError, SourceParameterVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use tracing::debug;

/// Family of moment tensors searched over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFamily {
    /// Strike, dip and rake.
    DoubleCouple,
    /// Strike, dip, rake and lune coordinates `v`, `w`.
    FullMomentTensor,
}

impl SourceFamily {
    fn mechanism_parameters(&self) -> &'static [Parameter] {
        match self {
            SourceFamily::DoubleCouple => &[Parameter::Strike, Parameter::Dip, Parameter::Rake],
            SourceFamily::FullMomentTensor => &[
                Parameter::Strike,
                Parameter::Dip,
                Parameter::Rake,
                Parameter::V,
                Parameter::W,
            ],
        }
    }
}

/// A named source parameter, in declared axis order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Depth,
    Magnitude,
    Strike,
    Dip,
    Rake,
    V,
    W,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Parameter::Depth => "depth",
            Parameter::Magnitude => "magnitude",
            Parameter::Strike => "strike",
            Parameter::Dip => "dip",
            Parameter::Rake => "rake",
            Parameter::V => "v",
            Parameter::W => "w",
        };
        write!(f, "{}", s)
    }
}

/// Half-open sampling interval `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub low: f64,
    pub high: f64,
}

impl AxisRange {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    fn validate(&self, parameter: Parameter) -> Result<(), ConfigError> {
        for value in [self.low, self.high] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite {
                    parameter: parameter.to_string(),
                    value,
                });
            }
        }
        if self.low >= self.high {
            return Err(ConfigError::EmptyRange {
                axis: parameter.to_string(),
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    /// Cell-centred point `k` of `n`.
    fn cell_center(&self, k: usize, n: usize) -> f64 {
        self.low + (k as f64 + 0.5) * (self.high - self.low) / n as f64
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.low..self.high)
    }
}

/// Bounds of the mechanism parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisRanges {
    pub strike: AxisRange,
    /// Dip in degrees; sampled uniformly in `cos(dip)`.
    pub dip: AxisRange,
    pub rake: AxisRange,
    pub v: AxisRange,
    pub w: AxisRange,
}

impl Default for AxisRanges {
    fn default() -> Self {
        Self {
            strike: AxisRange::new(0.0, 360.0),
            dip: AxisRange::new(0.0, 90.0),
            rake: AxisRange::new(-90.0, 90.0),
            v: AxisRange::new(-1.0 / 3.0, 1.0 / 3.0),
            w: AxisRange::new(-3.0 * PI / 8.0, 3.0 * PI / 8.0),
        }
    }
}

impl AxisRanges {
    fn validate(&self) -> Result<(), ConfigError> {
        self.strike.validate(Parameter::Strike)?;
        self.dip.validate(Parameter::Dip)?;
        self.rake.validate(Parameter::Rake)?;
        self.v.validate(Parameter::V)?;
        self.w.validate(Parameter::W)?;

        if self.dip.low < 0.0 || self.dip.high > 90.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: Parameter::Dip.to_string(),
                message: "dip bounds must lie within [0, 90]".to_string(),
            });
        }
        if self.v.low < -1.0 / 3.0 || self.v.high > 1.0 / 3.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: Parameter::V.to_string(),
                message: "v bounds must lie within [-1/3, 1/3]".to_string(),
            });
        }
        if self.w.low < -3.0 * PI / 8.0 || self.w.high > 3.0 * PI / 8.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: Parameter::W.to_string(),
                message: "w bounds must lie within [-3π/8, 3π/8]".to_string(),
            });
        }
        Ok(())
    }

    /// `cos(dip)` interval matching the dip bounds.
    fn h(&self) -> AxisRange {
        AxisRange::new(
            self.dip.high.to_radians().cos().max(0.0),
            self.dip.low.to_radians().cos(),
        )
    }
}

/// Orientation and source type of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mechanism {
    pub strike: f64,
    pub dip: f64,
    pub rake: f64,
    #[serde(default)]
    pub v: f64,
    #[serde(default)]
    pub w: f64,
}

impl Mechanism {
    pub fn double_couple(strike: f64, dip: f64, rake: f64) -> Self {
        Self {
            strike,
            dip,
            rake,
            v: 0.0,
            w: 0.0,
        }
    }
}

/// How mechanisms are generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Sampling {
    /// `count` mechanisms drawn independently from the uniform prior.
    Random { count: usize, seed: u64 },
    /// Cell-centred Cartesian grid with `points_per_axis` points on every
    /// mechanism axis.
    Regular { points_per_axis: usize },
    /// Explicitly listed mechanisms.
    List { mechanisms: Vec<Mechanism> },
}

/// Grid construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub family: SourceFamily,
    pub sampling: Sampling,
    /// Moment magnitudes; more than one value makes magnitude a free axis.
    pub magnitudes: Vec<f64>,
    /// Origin depths in metres; empty means the catalog depth of the event.
    #[serde(default)]
    pub depths_in_m: Vec<f64>,
    #[serde(default)]
    pub ranges: AxisRanges,
}

impl GridConfig {
    pub fn new(family: SourceFamily, sampling: Sampling, magnitude: f64) -> Self {
        Self {
            family,
            sampling,
            magnitudes: vec![magnitude],
            depths_in_m: Vec::new(),
            ranges: AxisRanges::default(),
        }
    }

    pub fn double_couple_random(count: usize, magnitude: f64, seed: u64) -> Self {
        Self::new(
            SourceFamily::DoubleCouple,
            Sampling::Random { count, seed },
            magnitude,
        )
    }

    pub fn double_couple_regular(points_per_axis: usize, magnitude: f64) -> Self {
        Self::new(
            SourceFamily::DoubleCouple,
            Sampling::Regular { points_per_axis },
            magnitude,
        )
    }

    pub fn full_moment_tensor_random(count: usize, magnitude: f64, seed: u64) -> Self {
        Self::new(
            SourceFamily::FullMomentTensor,
            Sampling::Random { count, seed },
            magnitude,
        )
    }

    pub fn with_magnitudes(mut self, magnitudes: Vec<f64>) -> Self {
        self.magnitudes = magnitudes;
        self
    }

    pub fn with_depths(mut self, depths_in_m: Vec<f64>) -> Self {
        self.depths_in_m = depths_in_m;
        self
    }

    pub fn with_ranges(mut self, ranges: AxisRanges) -> Self {
        self.ranges = ranges;
        self
    }

    /// Reject configurations that cannot produce a usable grid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.sampling {
            Sampling::Random { count, .. } if *count == 0 => return Err(ConfigError::EmptyGrid),
            Sampling::Regular { points_per_axis } if *points_per_axis == 0 => {
                return Err(ConfigError::NoPointsPerAxis)
            }
            Sampling::List { mechanisms } if mechanisms.is_empty() => {
                return Err(ConfigError::EmptyGrid)
            }
            Sampling::List { mechanisms } => {
                for m in mechanisms {
                    for (parameter, value) in [
                        (Parameter::Strike, m.strike),
                        (Parameter::Dip, m.dip),
                        (Parameter::Rake, m.rake),
                        (Parameter::V, m.v),
                        (Parameter::W, m.w),
                    ] {
                        if !value.is_finite() {
                            return Err(ConfigError::NonFinite {
                                parameter: parameter.to_string(),
                                value,
                            });
                        }
                    }
                }
            }
            _ => {}
        }

        self.ranges.validate()?;

        if self.magnitudes.is_empty() {
            return Err(ConfigError::NoValues {
                axis: Parameter::Magnitude.to_string(),
            });
        }
        for &value in &self.magnitudes {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite {
                    parameter: Parameter::Magnitude.to_string(),
                    value,
                });
            }
        }
        for &value in &self.depths_in_m {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidParameter {
                    parameter: Parameter::Depth.to_string(),
                    message: format!("depth must be finite and non-negative, got {value}"),
                });
            }
        }

        self.grid_size().map(|_| ())
    }

    /// Number of mechanisms before crossing with depth and magnitude.
    pub fn mechanism_count(&self) -> Result<usize, ConfigError> {
        match &self.sampling {
            Sampling::Random { count, .. } => Ok(*count),
            Sampling::List { mechanisms } => Ok(mechanisms.len()),
            Sampling::Regular { points_per_axis } => {
                let dims = self.family.mechanism_parameters().len() as u32;
                points_per_axis
                    .checked_pow(dims)
                    .ok_or(ConfigError::GridTooLarge)
            }
        }
    }

    /// Total number of grid points.
    pub fn grid_size(&self) -> Result<usize, ConfigError> {
        self.mechanism_count()?
            .checked_mul(self.magnitudes.len())
            .and_then(|n| n.checked_mul(self.depths_in_m.len().max(1)))
            .ok_or(ConfigError::GridTooLarge)
    }

    /// Parameters that vary across the grid, in declared axis order.
    pub fn free_parameters(&self) -> Vec<Parameter> {
        let mut free = Vec::new();
        if self.depths_in_m.len() > 1 {
            free.push(Parameter::Depth);
        }
        if self.magnitudes.len() > 1 {
            free.push(Parameter::Magnitude);
        }
        free.extend_from_slice(self.family.mechanism_parameters());
        free
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Mechanisms {
    Sampled(Vec<Mechanism>),
    Regular {
        points_per_axis: usize,
        family: SourceFamily,
        ranges: AxisRanges,
    },
}

impl Mechanisms {
    fn len(&self) -> usize {
        match self {
            Mechanisms::Sampled(list) => list.len(),
            Mechanisms::Regular {
                points_per_axis,
                family,
                ..
            } => points_per_axis.pow(family.mechanism_parameters().len() as u32),
        }
    }

    fn get(&self, k: usize) -> Mechanism {
        match self {
            Mechanisms::Sampled(list) => list[k],
            Mechanisms::Regular {
                points_per_axis,
                family,
                ranges,
            } => {
                let n = *points_per_axis;
                let dims = family.mechanism_parameters().len();

                // Row-major digits, last axis fastest.
                let mut digits = [0usize; 5];
                let mut rest = k;
                for d in (0..dims).rev() {
                    digits[d] = rest % n;
                    rest /= n;
                }

                let h = ranges.h().cell_center(digits[1], n);
                let mut mechanism = Mechanism::double_couple(
                    ranges.strike.cell_center(digits[0], n),
                    h.clamp(0.0, 1.0).acos().to_degrees(),
                    ranges.rake.cell_center(digits[2], n),
                );
                if *family == SourceFamily::FullMomentTensor {
                    mechanism.v = ranges.v.cell_center(digits[3], n);
                    mechanism.w = ranges.w.cell_center(digits[4], n);
                }
                mechanism
            }
        }
    }
}

fn sample_mechanisms(
    family: SourceFamily,
    ranges: &AxisRanges,
    count: usize,
    seed: u64,
) -> Vec<Mechanism> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let h = ranges.h();

    (0..count)
        .map(|_| {
            let strike = ranges.strike.sample(&mut rng);
            let dip = h.sample(&mut rng).clamp(0.0, 1.0).acos().to_degrees();
            let rake = ranges.rake.sample(&mut rng);
            let mut mechanism = Mechanism::double_couple(strike, dip, rake);
            if family == SourceFamily::FullMomentTensor {
                mechanism.v = ranges.v.sample(&mut rng);
                mechanism.w = ranges.w.sample(&mut rng);
            }
            mechanism
        })
        .collect()
}

/// Ordered, indexable collection of candidate sources
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    config: GridConfig,
    mechanisms: Mechanisms,
    size: usize,
}

impl Grid {
    /// Build a grid, failing fast on invalid configuration.
    pub fn new(config: GridConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let size = config.grid_size()?;

        let mechanisms = match &config.sampling {
            Sampling::Random { count, seed } => Mechanisms::Sampled(sample_mechanisms(
                config.family,
                &config.ranges,
                *count,
                *seed,
            )),
            Sampling::Regular { points_per_axis } => Mechanisms::Regular {
                points_per_axis: *points_per_axis,
                family: config.family,
                ranges: config.ranges,
            },
            Sampling::List { mechanisms } => Mechanisms::Sampled(
                mechanisms
                    .iter()
                    .map(|m| match config.family {
                        SourceFamily::DoubleCouple => Mechanism::double_couple(m.strike, m.dip, m.rake),
                        SourceFamily::FullMomentTensor => *m,
                    })
                    .collect(),
            ),
        };

        debug!(
            size,
            mechanisms = mechanisms.len(),
            free = config.free_parameters().len(),
            "Constructed source grid"
        );

        Ok(Self {
            config,
            mechanisms,
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn family(&self) -> SourceFamily {
        self.config.family
    }

    pub fn free_parameters(&self) -> Vec<Parameter> {
        self.config.free_parameters()
    }

    /// Origin depths searched over; empty means the catalog depth.
    pub fn depths(&self) -> &[f64] {
        &self.config.depths_in_m
    }

    /// Number of distinct origins (at least one).
    pub fn origin_count(&self) -> usize {
        self.config.depths_in_m.len().max(1)
    }

    pub fn magnitudes(&self) -> &[f64] {
        &self.config.magnitudes
    }

    /// Candidate at grid index `i`.
    pub fn at(&self, i: usize) -> Result<SourceParameterVector, EvaluationError> {
        if i >= self.size {
            return Err(EvaluationError::IndexOutOfRange {
                index: i,
                size: self.size,
            });
        }

        let n_mech = self.mechanisms.len();
        let n_mag = self.config.magnitudes.len();
        let mechanism = self.mechanisms.get(i % n_mech);
        let outer = i / n_mech;
        let magnitude_index = outer % n_mag;
        let origin_index = outer / n_mag;

        Ok(SourceParameterVector {
            index: i,
            strike: mechanism.strike,
            dip: mechanism.dip,
            rake: mechanism.rake,
            v: mechanism.v,
            w: mechanism.w,
            magnitude: self.config.magnitudes[magnitude_index],
            magnitude_index,
            depth_in_m: self.config.depths_in_m.get(origin_index).copied(),
            origin_index,
        })
    }

    /// Iterate all candidates in index order.
    pub fn iter(&self) -> impl Iterator<Item = SourceParameterVector> + '_ {
        (0..self.size).filter_map(move |i| self.at(i).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_grid_is_reproducible_for_a_seed() {
        let a = Grid::new(GridConfig::double_couple_random(200, 4.5, 7)).unwrap();
        let b = Grid::new(GridConfig::double_couple_random(200, 4.5, 7)).unwrap();
        let c = Grid::new(GridConfig::double_couple_random(200, 4.5, 8)).unwrap();

        let va: Vec<_> = a.iter().collect();
        let vb: Vec<_> = b.iter().collect();
        let vc: Vec<_> = c.iter().collect();
        assert_eq!(va, vb);
        assert_ne!(va, vc);
    }

    #[test]
    fn random_grid_respects_bounds() {
        let grid = Grid::new(GridConfig::full_moment_tensor_random(500, 4.0, 1)).unwrap();
        assert_eq!(grid.size(), 500);
        for source in grid.iter() {
            assert!((0.0..360.0).contains(&source.strike));
            assert!((0.0..=90.0).contains(&source.dip));
            assert!((-90.0..90.0).contains(&source.rake));
            assert!(source.v >= -1.0 / 3.0 && source.v < 1.0 / 3.0);
            assert!(source.w >= -3.0 * PI / 8.0 && source.w < 3.0 * PI / 8.0);
            assert_eq!(source.magnitude, 4.0);
            assert_eq!(source.depth_in_m, None);
        }
    }

    #[test]
    fn double_couple_random_has_no_source_type() {
        let grid = Grid::new(GridConfig::double_couple_random(50, 4.5, 3)).unwrap();
        assert!(grid.iter().all(|s| s.is_double_couple()));
    }

    #[test]
    fn regular_grid_enumerates_row_major() {
        let grid = Grid::new(GridConfig::double_couple_regular(2, 4.5)).unwrap();
        assert_eq!(grid.size(), 8);

        let points: Vec<_> = grid.iter().collect();
        // rake varies fastest, then dip, then strike
        assert_eq!(points[0].strike, 90.0);
        assert_eq!(points[0].rake, -45.0);
        assert_eq!(points[1].rake, 45.0);
        assert_eq!(points[1].dip, points[0].dip);
        assert_ne!(points[2].dip, points[0].dip);
        assert_eq!(points[4].strike, 270.0);
        assert_eq!(points[4].rake, -45.0);

        let again: Vec<_> = Grid::new(GridConfig::double_couple_regular(2, 4.5))
            .unwrap()
            .iter()
            .collect();
        assert_eq!(points, again);
    }

    #[test]
    fn regular_dip_is_uniform_in_cosine() {
        let grid = Grid::new(GridConfig::double_couple_regular(2, 4.5)).unwrap();
        let first = grid.at(0).unwrap();
        let second_dip = grid.at(2).unwrap();
        // h = 0.25 and 0.75
        assert!((first.dip.to_radians().cos() - 0.25).abs() < 1e-12);
        assert!((second_dip.dip.to_radians().cos() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn depth_and_magnitude_axes_are_outermost() {
        let config = GridConfig::double_couple_random(10, 4.5, 0)
            .with_magnitudes(vec![4.0, 4.5, 5.0])
            .with_depths(vec![5_000.0, 10_000.0]);
        let grid = Grid::new(config).unwrap();
        assert_eq!(grid.size(), 60);
        assert_eq!(
            grid.free_parameters(),
            vec![
                Parameter::Depth,
                Parameter::Magnitude,
                Parameter::Strike,
                Parameter::Dip,
                Parameter::Rake
            ]
        );

        let s = grid.at(0).unwrap();
        assert_eq!((s.magnitude, s.depth_in_m, s.origin_index), (4.0, Some(5_000.0), 0));
        let s = grid.at(10).unwrap();
        assert_eq!((s.magnitude, s.magnitude_index, s.origin_index), (4.5, 1, 0));
        let s = grid.at(29).unwrap();
        assert_eq!((s.magnitude, s.magnitude_index, s.origin_index), (5.0, 2, 0));
        let s = grid.at(30).unwrap();
        assert_eq!((s.magnitude, s.depth_in_m, s.origin_index), (4.0, Some(10_000.0), 1));

        // same mechanism across the outer axes
        assert_eq!(grid.at(3).unwrap().strike, grid.at(33).unwrap().strike);
    }

    #[test]
    fn free_parameter_counts() {
        let dc = GridConfig::double_couple_random(10, 4.5, 0);
        assert_eq!(dc.free_parameters().len(), 3);
        let dc5 = dc
            .clone()
            .with_magnitudes(vec![4.4, 4.5])
            .with_depths(vec![1_000.0, 2_000.0]);
        assert_eq!(dc5.free_parameters().len(), 5);
        let fmt = GridConfig::full_moment_tensor_random(10, 4.5, 0);
        assert_eq!(fmt.free_parameters().len(), 5);
        let fmt6 = fmt.with_magnitudes(vec![4.4, 4.5]);
        assert_eq!(fmt6.free_parameters().len(), 6);
    }

    #[test]
    fn zero_count_is_configuration_error() {
        assert_eq!(
            Grid::new(GridConfig::double_couple_random(0, 4.5, 0)),
            Err(ConfigError::EmptyGrid)
        );
        assert_eq!(
            Grid::new(GridConfig::double_couple_regular(0, 4.5)),
            Err(ConfigError::NoPointsPerAxis)
        );
    }

    #[test]
    fn empty_range_is_configuration_error() {
        let mut ranges = AxisRanges::default();
        ranges.strike = AxisRange::new(10.0, 10.0);
        let err = Grid::new(GridConfig::double_couple_regular(3, 4.5).with_ranges(ranges));
        assert!(matches!(err, Err(ConfigError::EmptyRange { .. })));

        let err = Grid::new(GridConfig::double_couple_random(3, 4.5, 0).with_magnitudes(vec![]));
        assert!(matches!(err, Err(ConfigError::NoValues { .. })));
    }

    #[test]
    fn oversized_regular_grid_is_rejected() {
        let config = GridConfig::new(
            SourceFamily::FullMomentTensor,
            Sampling::Regular {
                points_per_axis: usize::MAX / 2,
            },
            4.5,
        );
        assert_eq!(Grid::new(config), Err(ConfigError::GridTooLarge));
    }

    #[test]
    fn index_out_of_range_is_an_error() {
        let grid = Grid::new(GridConfig::double_couple_random(4, 4.5, 0)).unwrap();
        assert!(grid.at(3).is_ok());
        assert_eq!(
            grid.at(4),
            Err(EvaluationError::IndexOutOfRange { index: 4, size: 4 })
        );
    }

    #[test]
    fn listed_mechanisms_keep_their_order() {
        let config = GridConfig::new(
            SourceFamily::DoubleCouple,
            Sampling::List {
                mechanisms: vec![
                    Mechanism::double_couple(10.0, 20.0, 30.0),
                    Mechanism::double_couple(40.0, 50.0, 60.0),
                ],
            },
            4.5,
        );
        let grid = Grid::new(config).unwrap();
        assert_eq!(grid.size(), 2);
        assert_eq!(grid.at(1).unwrap().strike, 40.0);
    }

    #[test]
    fn grid_config_deserializes_from_json() {
        let json = r#"{
            "family": "double_couple",
            "sampling": { "mode": "random", "count": 50000, "seed": 11 },
            "magnitudes": [4.5]
        }"#;
        let config: GridConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.grid_size(), Ok(50_000));
        assert_eq!(config.ranges, AxisRanges::default());
    }
}
