use serde::{Deserialize, Serialize};

use crate::event::Station;
use crate::source::MomentTensor;
use crate::waveform::{Component, Stream, Trace};

/// Number of independent moment tensor elements
pub const ELEMENTARY_SOURCES: usize = 6;

/// Responses of one component to the six elementary moment tensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreensTrace {
    pub component: Component,
    pub start_offset: f64,
    pub dt: f64,
    /// One series per element `[Mrr, Mtt, Mpp, Mrt, Mrp, Mtp]`, all of equal length.
    pub responses: Vec<Vec<f64>>,
}

impl GreensTrace {
    pub fn len(&self) -> usize {
        self.responses.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear combination of the elementary responses.
    pub fn synthesize(&self, mt: &MomentTensor) -> Trace {
        let mut samples = vec![0.0; self.len()];
        for (weight, response) in mt.components().iter().zip(&self.responses) {
            for (out, g) in samples.iter_mut().zip(response) {
                *out += weight * g;
            }
        }
        Trace::new(self.component, self.start_offset, self.dt, samples)
    }
}

/// Green's function tensor between the source and one station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreensTensor {
    pub station: Station,
    pub traces: Vec<GreensTrace>,
}

impl GreensTensor {
    pub fn new(station: Station, traces: Vec<GreensTrace>) -> Self {
        Self { station, traces }
    }

    /// Check that every component carries six equal-length responses.
    pub fn is_well_formed(&self) -> bool {
        self.traces.iter().all(|t| {
            t.responses.len() == ELEMENTARY_SOURCES
                && t.responses.iter().all(|r| r.len() == t.len())
        })
    }

    /// Synthetic seismograms for a trial moment tensor.
    pub fn synthetics(&self, mt: &MomentTensor) -> Stream {
        Stream::new(
            self.station.clone(),
            self.traces.iter().map(|t| t.synthesize(mt)).collect(),
        )
    }

    /// Convolve every response with a source-time function.
    pub fn convolve(&mut self, wavelet: &SourceWavelet) {
        for trace in &mut self.traces {
            let kernel = wavelet.sample(trace.dt);
            for response in &mut trace.responses {
                *response = convolve_causal(response, &kernel);
            }
        }
    }

    /// Pass each elementary response through a stream-processing function.
    ///
    /// The `k`-th elementary responses of all components are processed together
    /// as one stream so the function sees the same station metadata as it does
    /// for observed data.
    pub fn map<F, E>(&self, mut f: F) -> Result<GreensTensor, E>
    where
        F: FnMut(&Stream) -> Result<Stream, E>,
    {
        let mut processed: Vec<GreensTrace> = Vec::with_capacity(self.traces.len());

        for k in 0..ELEMENTARY_SOURCES {
            let stream = Stream::new(
                self.station.clone(),
                self.traces
                    .iter()
                    .map(|t| {
                        Trace::new(
                            t.component,
                            t.start_offset,
                            t.dt,
                            t.responses.get(k).cloned().unwrap_or_default(),
                        )
                    })
                    .collect(),
            );
            let out = f(&stream)?;

            for trace in out.traces {
                match processed.iter_mut().find(|g| g.component == trace.component) {
                    Some(existing) => existing.responses.push(trace.samples),
                    None => processed.push(GreensTrace {
                        component: trace.component,
                        start_offset: trace.start_offset,
                        dt: trace.dt,
                        responses: vec![trace.samples],
                    }),
                }
            }
        }

        Ok(GreensTensor::new(self.station.clone(), processed))
    }
}

/// Full-length causal convolution truncated to the input length.
fn convolve_causal(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; signal.len()];
    for (i, value) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for (j, k) in kernel.iter().enumerate().take(i + 1) {
            acc += k * signal[i - j];
        }
        *value = acc;
    }
    out
}

/// Source-time function applied to Green's functions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SourceWavelet {
    /// Linear ramp of `rise_time`, flat top of `rise_time`, linear decay of `rise_time`.
    Trapezoid { rise_time: f64 },
    /// Identity.
    Impulse,
}

/// Rise time (s) used for a trapezoidal source of magnitude `mw`.
pub fn trapezoid_rise_time(mw: f64) -> f64 {
    0.5 * 10f64.powf((mw - 4.5) / 2.0)
}

impl SourceWavelet {
    pub fn trapezoid(mw: f64) -> Self {
        SourceWavelet::Trapezoid {
            rise_time: trapezoid_rise_time(mw),
        }
    }

    /// Discrete kernel at sampling interval `dt`, normalized to unit sum.
    pub fn sample(&self, dt: f64) -> Vec<f64> {
        match *self {
            SourceWavelet::Impulse => vec![1.0],
            SourceWavelet::Trapezoid { rise_time } => {
                let duration = 3.0 * rise_time;
                let n = ((duration / dt).ceil() as usize).max(1) + 1;
                let mut kernel: Vec<f64> = (0..n)
                    .map(|k| {
                        let t = k as f64 * dt;
                        if t <= rise_time {
                            t / rise_time
                        } else if t <= 2.0 * rise_time {
                            1.0
                        } else if t <= duration {
                            (duration - t) / rise_time
                        } else {
                            0.0
                        }
                    })
                    .collect();
                let total: f64 = kernel.iter().sum();
                if total > 0.0 {
                    kernel.iter_mut().for_each(|k| *k /= total);
                    kernel
                } else {
                    vec![1.0]
                }
            }
        }
    }
}
