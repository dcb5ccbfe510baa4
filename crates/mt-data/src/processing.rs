//! Reference waveform processing: demean, bandpass, window, taper, weight.
//!
//! Every step is linear in the samples, so processing Green's functions and
//! processing the data they predict commute with the moment tensor sum.

use mt_types::{AcquisitionError, Category, Component, DataProcessor, Stream, Trace};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::picks::PickTable;
use crate::weights::WeightTable;

/// Frequency filter applied before windowing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    None,
    /// Zero-phase bandpass built from `passes` forward-backward biquad sections.
    Bandpass {
        freq_min: f64,
        freq_max: f64,
        #[serde(default = "default_passes")]
        passes: usize,
    },
}

fn default_passes() -> usize {
    2
}

/// Reference time of the processing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnchor {
    /// Origin time.
    Origin,
    /// P arrival from the pick file.
    P,
    /// S arrival from the pick file.
    S,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub anchor: WindowAnchor,
    /// Seconds relative to the anchor at which the window starts.
    #[serde(default)]
    pub offset: f64,
    pub window_length: f64,
    /// Extra seconds kept on both sides of the window.
    #[serde(default)]
    pub padding_length: f64,
}

/// Per-category processing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub filter: FilterConfig,
    pub window: WindowConfig,
    /// Components kept in the processed stream.
    #[serde(default = "all_components")]
    pub components: Vec<Component>,
    /// Fraction of the window tapered at each end.
    #[serde(default = "default_taper")]
    pub taper_fraction: f64,
}

fn all_components() -> Vec<Component> {
    Component::ALL.to_vec()
}

fn default_taper() -> f64 {
    0.05
}

impl ProcessConfig {
    /// Body-wave defaults: 0.1–0.333 Hz, 15 s window from the P pick.
    pub fn body_waves() -> Self {
        Self {
            filter: FilterConfig::Bandpass {
                freq_min: 0.1,
                freq_max: 0.333,
                passes: 2,
            },
            window: WindowConfig {
                anchor: WindowAnchor::P,
                offset: -2.0,
                window_length: 15.0,
                padding_length: 2.0,
            },
            components: vec![Component::Z, Component::R],
            taper_fraction: 0.05,
        }
    }

    /// Surface-wave defaults: 0.025–0.0625 Hz, 150 s window from the S pick.
    pub fn surface_waves() -> Self {
        Self {
            filter: FilterConfig::Bandpass {
                freq_min: 0.025,
                freq_max: 0.0625,
                passes: 2,
            },
            window: WindowConfig {
                anchor: WindowAnchor::S,
                offset: -20.0,
                window_length: 150.0,
                padding_length: 10.0,
            },
            components: Component::ALL.to_vec(),
            taper_fraction: 0.05,
        }
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }
}

/// Data processor driven by a [`ProcessConfig`]
#[derive(Debug, Clone)]
pub struct ProcessData {
    category: Category,
    config: ProcessConfig,
    picks: Option<Arc<PickTable>>,
    weights: Option<Arc<WeightTable>>,
    name: String,
}

impl ProcessData {
    pub fn new(category: Category, config: ProcessConfig) -> Self {
        let name = format!("process_{}", category);
        Self {
            category,
            config,
            picks: None,
            weights: None,
            name,
        }
    }

    pub fn with_picks(mut self, picks: Arc<PickTable>) -> Self {
        self.picks = Some(picks);
        self
    }

    pub fn with_weights(mut self, weights: Arc<WeightTable>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    fn window_start(&self, stream: &Stream) -> Result<f64, AcquisitionError> {
        let window = &self.config.window;
        let anchor = match window.anchor {
            WindowAnchor::Origin => 0.0,
            WindowAnchor::P | WindowAnchor::S => {
                let picks = self
                    .picks
                    .as_ref()
                    .and_then(|table| table.get(&stream.station))
                    .ok_or_else(|| AcquisitionError::ProcessingFailed {
                        station: stream.station.id(),
                        message: "no pick available for window anchor".to_string(),
                    })?;
                if window.anchor == WindowAnchor::P {
                    picks.p
                } else {
                    picks.s
                }
            }
        };
        Ok(anchor + window.offset - window.padding_length)
    }

    fn process_trace(&self, stream: &Stream, trace: &Trace, start: f64) -> Result<Trace, AcquisitionError> {
        if trace.dt <= 0.0 || !trace.dt.is_finite() {
            return Err(AcquisitionError::ProcessingFailed {
                station: stream.station.id(),
                message: format!("invalid sampling interval {} on {}", trace.dt, trace.component),
            });
        }

        let mut samples = trace.samples.clone();
        demean(&mut samples);

        if let FilterConfig::Bandpass {
            freq_min,
            freq_max,
            passes,
        } = self.config.filter
        {
            let nyquist = 0.5 / trace.dt;
            if freq_min <= 0.0 || freq_min >= freq_max || freq_max >= nyquist {
                return Err(AcquisitionError::ProcessingFailed {
                    station: stream.station.id(),
                    message: format!(
                        "bandpass {freq_min}-{freq_max} Hz invalid for Nyquist {nyquist} Hz"
                    ),
                });
            }
            let section = Biquad::bandpass(freq_min, freq_max, trace.dt);
            for _ in 0..passes.max(1) {
                section.filter_zero_phase(&mut samples);
            }
        }

        let window = &self.config.window;
        let length = window.window_length + 2.0 * window.padding_length;
        let npts = (length / trace.dt).round() as usize + 1;
        let first = ((start - trace.start_offset) / trace.dt).round() as isize;
        let source = Trace::new(trace.component, trace.start_offset, trace.dt, samples);
        let mut windowed: Vec<f64> = (0..npts as isize)
            .map(|k| source.sample_or_zero(first + k))
            .collect();
        taper(&mut windowed, self.config.taper_fraction);

        let mut out = Trace::new(
            trace.component,
            trace.start_offset + first as f64 * trace.dt,
            trace.dt,
            windowed,
        );
        out.weight = match &self.weights {
            Some(table) => table
                .get(&stream.station)
                .map(|w| w.weight(self.category, trace.component))
                .unwrap_or(0.0),
            None => trace.weight,
        };
        Ok(out)
    }
}

impl DataProcessor for ProcessData {
    fn process(&self, stream: &Stream) -> Result<Stream, AcquisitionError> {
        let start = self.window_start(stream)?;
        let mut traces = Vec::with_capacity(self.config.components.len());
        for component in &self.config.components {
            if let Some(trace) = stream.trace(*component) {
                traces.push(self.process_trace(stream, trace, start)?);
            }
        }
        Ok(Stream::new(stream.station.clone(), traces))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn demean(samples: &mut [f64]) {
    if samples.is_empty() {
        return;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter_mut().for_each(|x| *x -= mean);
}

/// Cosine taper over `fraction` of the samples at each end.
fn taper(samples: &mut [f64], fraction: f64) {
    let n = samples.len();
    let width = ((n as f64) * fraction.clamp(0.0, 0.5)).floor() as usize;
    if width == 0 {
        return;
    }
    for k in 0..width {
        let w = 0.5 * (1.0 - (PI * k as f64 / width as f64).cos());
        samples[k] *= w;
        samples[n - 1 - k] *= w;
    }
}

/// Second-order IIR section
#[derive(Debug, Clone, Copy, PartialEq)]
struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    /// Constant-peak bandpass centred on the geometric mean of the corners.
    fn bandpass(freq_min: f64, freq_max: f64, dt: f64) -> Self {
        let f0 = (freq_min * freq_max).sqrt();
        let q = f0 / (freq_max - freq_min);
        let w0 = 2.0 * PI * f0 * dt;
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b: [alpha / a0, 0.0, -alpha / a0],
            a: [-2.0 * w0.cos() / a0, (1.0 - alpha) / a0],
        }
    }

    fn filter(&self, samples: &mut [f64]) {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        for x in samples.iter_mut() {
            let y = self.b[0] * *x + self.b[1] * x1 + self.b[2] * x2 - self.a[0] * y1 - self.a[1] * y2;
            x2 = x1;
            x1 = *x;
            y2 = y1;
            y1 = y;
            *x = y;
        }
    }

    fn filter_zero_phase(&self, samples: &mut [f64]) {
        self.filter(samples);
        samples.reverse();
        self.filter(samples);
        samples.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_types::Station;

    fn stream_with(samples: Vec<f64>, dt: f64) -> Stream {
        Stream::new(
            Station::new("AK", "BPAW", 64.0, -150.0),
            vec![
                Trace::new(Component::Z, 0.0, dt, samples.clone()),
                Trace::new(Component::T, 0.0, dt, samples),
            ],
        )
    }

    fn origin_window(length: f64) -> WindowConfig {
        WindowConfig {
            anchor: WindowAnchor::Origin,
            offset: 0.0,
            window_length: length,
            padding_length: 0.0,
        }
    }

    #[test]
    fn window_has_expected_length_and_start() {
        let config = ProcessConfig::surface_waves()
            .with_filter(FilterConfig::None)
            .with_window(WindowConfig {
                anchor: WindowAnchor::Origin,
                offset: 10.0,
                window_length: 20.0,
                padding_length: 5.0,
            });
        let processor = ProcessData::new(Category::SurfaceWaves, config);
        let out = processor.process(&stream_with(vec![1.0; 200], 0.5)).unwrap();

        let z = out.trace(Component::Z).unwrap();
        assert_eq!(z.start_offset, 5.0);
        assert_eq!(z.len(), 61);
    }

    #[test]
    fn components_are_selected() {
        let config = ProcessConfig::body_waves()
            .with_filter(FilterConfig::None)
            .with_window(origin_window(10.0));
        let out = ProcessData::new(Category::SurfaceWaves, config)
            .process(&stream_with(vec![0.0; 50], 1.0))
            .unwrap();
        assert!(out.trace(Component::Z).is_some());
        assert!(out.trace(Component::T).is_none());
    }

    #[test]
    fn pick_anchor_requires_picks() {
        let processor = ProcessData::new(Category::BodyWaves, ProcessConfig::body_waves());
        let err = processor.process(&stream_with(vec![0.0; 50], 0.1)).unwrap_err();
        assert!(matches!(err, AcquisitionError::ProcessingFailed { .. }));

        let picks = PickTable::parse("AK.BPAW 3.0 5.0", "picks").unwrap();
        let processor =
            ProcessData::new(Category::BodyWaves, ProcessConfig::body_waves().with_filter(FilterConfig::None))
                .with_picks(Arc::new(picks));
        let out = processor.process(&stream_with(vec![0.0; 500], 0.1)).unwrap();
        // P pick 3 s, offset -2 s, padding 2 s
        assert!((out.traces[0].start_offset - -1.0).abs() < 1e-9);
    }

    #[test]
    fn weights_are_applied_per_component() {
        let weights = WeightTable::parse("AK.BPAW 300 1 0.5 2 2 3", "w").unwrap();
        let config = ProcessConfig::surface_waves()
            .with_filter(FilterConfig::None)
            .with_window(origin_window(10.0));
        let out = ProcessData::new(Category::SurfaceWaves, config)
            .with_weights(Arc::new(weights))
            .process(&stream_with(vec![0.0; 50], 1.0))
            .unwrap();
        assert_eq!(out.trace(Component::Z).unwrap().weight, 2.0);
        assert_eq!(out.trace(Component::T).unwrap().weight, 3.0);
    }

    #[test]
    fn bandpass_removes_constant_offset() {
        let config = ProcessConfig::surface_waves()
            .with_filter(FilterConfig::Bandpass {
                freq_min: 0.05,
                freq_max: 0.2,
                passes: 2,
            })
            .with_window(origin_window(99.0));
        let out = ProcessData::new(Category::SurfaceWaves, config)
            .process(&stream_with(vec![5.0; 100], 1.0))
            .unwrap();
        let peak = out.traces[0]
            .samples
            .iter()
            .fold(0.0f64, |m, x| m.max(x.abs()));
        assert!(peak < 1e-9);
    }

    #[test]
    fn bandpass_above_nyquist_is_rejected() {
        let config = ProcessConfig::body_waves()
            .with_filter(FilterConfig::Bandpass {
                freq_min: 0.1,
                freq_max: 2.0,
                passes: 1,
            })
            .with_window(origin_window(10.0));
        let err = ProcessData::new(Category::SurfaceWaves, config)
            .process(&stream_with(vec![0.0; 50], 1.0))
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::ProcessingFailed { .. }));
    }

    #[test]
    fn processing_is_linear() {
        let config = ProcessConfig::surface_waves().with_window(origin_window(60.0));
        let processor = ProcessData::new(Category::SurfaceWaves, config);
        let a: Vec<f64> = (0..100).map(|k| (k as f64 * 0.3).sin()).collect();
        let b: Vec<f64> = (0..100).map(|k| (k as f64 * 0.11).cos()).collect();
        let sum: Vec<f64> = a.iter().zip(&b).map(|(x, y)| 2.0 * x + y).collect();

        let pa = processor.process(&stream_with(a, 1.0)).unwrap();
        let pb = processor.process(&stream_with(b, 1.0)).unwrap();
        let ps = processor.process(&stream_with(sum, 1.0)).unwrap();
        for k in 0..ps.traces[0].len() {
            let expected = 2.0 * pa.traces[0].samples[k] + pb.traces[0].samples[k];
            assert!((ps.traces[0].samples[k] - expected).abs() < 1e-9);
        }
    }
}
