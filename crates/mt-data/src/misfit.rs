//! Waveform difference misfit with per-group cross-correlation time shifts.

use mt_types::{
    internal_error, Component, ConfigError, GreensTensor, MisfitFunctional, MomentTensor, MtResult,
    Stream, Trace,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    L1,
    L2,
}

/// Misfit parameters for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisfitConfig {
    #[serde(default = "default_norm")]
    pub norm: Norm,
    /// Largest time shift in seconds applied to synthetics.
    #[serde(default)]
    pub time_shift_max: f64,
    /// Components sharing a time shift, e.g. `["ZR", "T"]`. Components not
    /// listed in any group are not scored.
    #[serde(default = "default_groups")]
    pub time_shift_groups: Vec<String>,
}

fn default_norm() -> Norm {
    Norm::L2
}

fn default_groups() -> Vec<String> {
    vec!["ZRT".to_string()]
}

impl Default for MisfitConfig {
    fn default() -> Self {
        Self {
            norm: Norm::L2,
            time_shift_max: 0.0,
            time_shift_groups: default_groups(),
        }
    }
}

impl MisfitConfig {
    pub fn new(time_shift_max: f64, groups: &[&str]) -> Self {
        Self {
            norm: Norm::L2,
            time_shift_max,
            time_shift_groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    pub fn with_norm(mut self, norm: Norm) -> Self {
        self.norm = norm;
        self
    }
}

/// Reference misfit functional
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformMisfit {
    norm: Norm,
    time_shift_max: f64,
    groups: Vec<Vec<Component>>,
}

impl WaveformMisfit {
    pub fn new(config: &MisfitConfig) -> Result<Self, ConfigError> {
        if !config.time_shift_max.is_finite() || config.time_shift_max < 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "time_shift_max".into(),
                message: format!("must be finite and non-negative, got {}", config.time_shift_max),
            });
        }

        let mut groups = Vec::with_capacity(config.time_shift_groups.len());
        let mut seen = Vec::new();
        for group in &config.time_shift_groups {
            let mut components = Vec::new();
            for c in group.chars() {
                let component = Component::from_char(c).ok_or_else(|| ConfigError::InvalidParameter {
                    parameter: "time_shift_groups".into(),
                    message: format!("unknown component '{}' in group '{}'", c, group),
                })?;
                if seen.contains(&component) {
                    return Err(ConfigError::InvalidParameter {
                        parameter: "time_shift_groups".into(),
                        message: format!("component {} appears in more than one group", component),
                    });
                }
                seen.push(component);
                components.push(component);
            }
            if !components.is_empty() {
                groups.push(components);
            }
        }
        if groups.is_empty() {
            return Err(ConfigError::InvalidParameter {
                parameter: "time_shift_groups".into(),
                message: "at least one component group is required".into(),
            });
        }

        Ok(Self {
            norm: config.norm,
            time_shift_max: config.time_shift_max,
            groups,
        })
    }

    fn residual(&self, d: f64, s: f64) -> f64 {
        match self.norm {
            Norm::L1 => (d - s).abs(),
            Norm::L2 => (d - s) * (d - s),
        }
    }

    /// Misfit of one station, each group at its best shift.
    fn station_misfit(&self, data: &Stream, synthetics: &Stream) -> MtResult<f64> {
        let mut total = 0.0;

        for group in &self.groups {
            let mut pairs: Vec<(&Trace, &Trace)> = Vec::with_capacity(group.len());
            for component in group {
                let Some(observed) = data.trace(*component) else {
                    continue;
                };
                if observed.weight == 0.0 {
                    continue;
                }
                let synthetic = synthetics.trace(*component).ok_or_else(|| {
                    internal_error!("no {} Green's functions for {}", component, data.station)
                })?;
                if synthetic.len() != observed.len() {
                    return Err(internal_error!(
                        "{} {} has {} data samples but {} synthetic samples",
                        data.station,
                        component,
                        observed.len(),
                        synthetic.len()
                    ));
                }
                pairs.push((observed, synthetic));
            }
            let Some((first, _)) = pairs.first() else {
                continue;
            };

            let dt = first.dt;
            let max_lag = (self.time_shift_max / dt).floor() as isize;
            let lag = best_lag(&pairs, max_lag);

            for (observed, synthetic) in &pairs {
                let mut sum = 0.0;
                for (k, d) in observed.samples.iter().enumerate() {
                    sum += self.residual(*d, synthetic.sample_or_zero(k as isize - lag));
                }
                total += observed.weight * sum * dt;
            }
        }

        Ok(total)
    }
}

/// Shift of the synthetics, in samples, maximizing the weighted cross-correlation.
///
/// Ties go to the smallest absolute shift, then to the negative one.
fn best_lag(pairs: &[(&Trace, &Trace)], max_lag: isize) -> isize {
    if max_lag <= 0 {
        return 0;
    }
    let correlation = |lag: isize| -> f64 {
        pairs
            .iter()
            .map(|(observed, synthetic)| {
                observed.weight
                    * observed
                        .samples
                        .iter()
                        .enumerate()
                        .map(|(k, d)| d * synthetic.sample_or_zero(k as isize - lag))
                        .sum::<f64>()
            })
            .sum()
    };

    let mut best = 0;
    let mut best_value = correlation(0);
    for magnitude in 1..=max_lag {
        for lag in [-magnitude, magnitude] {
            let value = correlation(lag);
            if value > best_value {
                best = lag;
                best_value = value;
            }
        }
    }
    best
}

impl MisfitFunctional for WaveformMisfit {
    fn evaluate(&self, data: &[Stream], greens: &[GreensTensor], mt: &MomentTensor) -> MtResult<f64> {
        if data.len() != greens.len() {
            return Err(internal_error!(
                "{} data streams but {} Green's tensors",
                data.len(),
                greens.len()
            ));
        }

        let mut total = 0.0;
        for (stream, tensor) in data.iter().zip(greens) {
            let synthetics = tensor.synthetics(mt);
            total += self.station_misfit(stream, &synthetics)?;
        }
        Ok(total)
    }
}
