use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::{Origin, Station};

/// Seismogram component in the ray-aligned frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Component {
    Z,
    R,
    T,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Z, Component::R, Component::T];

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'Z' => Some(Component::Z),
            'R' => Some(Component::R),
            'T' => Some(Component::T),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Component::Z => 'Z',
            Component::R => 'R',
            Component::T => 'T',
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Single-component time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub component: Component,
    /// Time of the first sample, seconds after origin time.
    pub start_offset: f64,
    /// Sampling interval in seconds.
    pub dt: f64,
    pub samples: Vec<f64>,
    /// Relative weight applied by misfit functionals.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Trace {
    pub fn new(component: Component, start_offset: f64, dt: f64, samples: Vec<f64>) -> Self {
        Self {
            component,
            start_offset,
            dt,
            samples,
            weight: 1.0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time of the last sample, seconds after origin time.
    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.dt * self.samples.len().saturating_sub(1) as f64
    }

    /// Index of the sample nearest to `offset` (may fall outside the trace).
    pub fn sample_index(&self, offset: f64) -> isize {
        ((offset - self.start_offset) / self.dt).round() as isize
    }

    /// Sample at `index`, zero outside the recorded window.
    pub fn sample_or_zero(&self, index: isize) -> f64 {
        if index < 0 {
            return 0.0;
        }
        self.samples.get(index as usize).copied().unwrap_or(0.0)
    }
}

/// All traces recorded at one station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub station: Station,
    pub traces: Vec<Trace>,
}

impl Stream {
    pub fn new(station: Station, traces: Vec<Trace>) -> Self {
        Self { station, traces }
    }

    pub fn trace(&self, component: Component) -> Option<&Trace> {
        self.traces.iter().find(|t| t.component == component)
    }

    pub fn trace_mut(&mut self, component: Component) -> Option<&mut Trace> {
        self.traces.iter_mut().find(|t| t.component == component)
    }
}

/// Raw waveforms for one event, as produced by a waveform reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub event_id: String,
    pub origin: Origin,
    pub streams: Vec<Stream>,
}

impl Dataset {
    pub fn stations(&self) -> Vec<Station> {
        self.streams.iter().map(|s| s.station.clone()).collect()
    }

    /// Fill in station distances and sort streams nearest first.
    pub fn sort_by_distance(&mut self) {
        let origin = self.origin.clone();
        for stream in &mut self.streams {
            stream.station.locate(&origin);
        }
        self.streams.sort_by(|a, b| {
            a.station
                .distance_in_m
                .total_cmp(&b.station.distance_in_m)
                .then_with(|| a.station.id().cmp(&b.station.id()))
        });
    }

    /// Keep only streams whose station id satisfies `keep`.
    pub fn retain_stations<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Station) -> bool,
    {
        self.streams.retain(|s| keep(&s.station));
    }
}
