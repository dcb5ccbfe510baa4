//! Station weight tables in the CAP layout.
//!
//! Each non-comment line reads
//!
//! ```text
//! <station id> <distance km> <body Z> <body R> <surface Z> <surface R> <surface T> [ignored...]
//! ```
//!
//! Stations whose five weights are all zero are considered unused.

use mt_types::{AcquisitionError, Category, Component, Dataset, Station};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Per-component weights of one station
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationWeights {
    pub distance_km: f64,
    pub body_z: f64,
    pub body_r: f64,
    pub surface_z: f64,
    pub surface_r: f64,
    pub surface_t: f64,
}

impl StationWeights {
    pub fn is_used(&self) -> bool {
        [
            self.body_z,
            self.body_r,
            self.surface_z,
            self.surface_r,
            self.surface_t,
        ]
        .iter()
        .any(|w| *w > 0.0)
    }

    /// Weight for one trace; body waves carry no transverse weight.
    pub fn weight(&self, category: Category, component: Component) -> f64 {
        match (category, component) {
            (Category::BodyWaves, Component::Z) => self.body_z,
            (Category::BodyWaves, Component::R) => self.body_r,
            (Category::BodyWaves, Component::T) => 0.0,
            (Category::SurfaceWaves, Component::Z) => self.surface_z,
            (Category::SurfaceWaves, Component::R) => self.surface_r,
            (Category::SurfaceWaves, Component::T) => self.surface_t,
        }
    }
}

/// Weights for all stations of an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub stations: BTreeMap<String, StationWeights>,
}

impl WeightTable {
    pub fn parse(text: &str, source: &str) -> Result<Self, AcquisitionError> {
        let mut stations = BTreeMap::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 7 {
                return Err(AcquisitionError::InvalidFormat {
                    path: source.to_string(),
                    message: format!("line {}: expected at least 7 columns", line_no + 1),
                });
            }
            let mut values = [0.0f64; 6];
            for (slot, field) in values.iter_mut().zip(&fields[1..7]) {
                *slot = field.parse().map_err(|_| AcquisitionError::InvalidFormat {
                    path: source.to_string(),
                    message: format!("line {}: invalid number '{}'", line_no + 1, field),
                })?;
            }
            stations.insert(
                fields[0].to_string(),
                StationWeights {
                    distance_km: values[0],
                    body_z: values[1],
                    body_r: values[2],
                    surface_z: values[3],
                    surface_r: values[4],
                    surface_t: values[5],
                },
            );
        }

        Ok(Self { stations })
    }

    pub fn load(path: &Path) -> Result<Self, AcquisitionError> {
        let text = fs::read_to_string(path).map_err(|e| AcquisitionError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Weights of a station, matched on its full id or its station code.
    pub fn get(&self, station: &Station) -> Option<&StationWeights> {
        self.stations
            .get(&station.id())
            .or_else(|| self.stations.get(&station.station))
    }

    pub fn is_used(&self, station: &Station) -> bool {
        self.get(station).map(StationWeights::is_used).unwrap_or(false)
    }

    /// Drop streams of stations that are absent or fully zero-weighted.
    pub fn remove_unused_stations(&self, dataset: &mut Dataset) {
        let before = dataset.streams.len();
        dataset.retain_stations(|s| self.is_used(s));
        info!(
            "Kept {} of {} stations after applying weights",
            dataset.streams.len(),
            before
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mt_types::{Origin, Stream};

    const WEIGHTS: &str = "\
# station dist bz br sz sr st
AK.BPAW    305  1 1 1 1 1  34.1 0
AK.CAST    435  0 0 1 1 1
IU.COLA    519  0 0 0 0 0
";

    #[test]
    fn parses_weight_lines() {
        let table = WeightTable::parse(WEIGHTS, "weights.dat").unwrap();
        assert_eq!(table.stations.len(), 3);
        let cast = table.stations["AK.CAST"];
        assert_eq!(cast.distance_km, 435.0);
        assert_eq!(cast.weight(Category::BodyWaves, Component::Z), 0.0);
        assert_eq!(cast.weight(Category::SurfaceWaves, Component::T), 1.0);
    }

    #[test]
    fn rejects_short_lines() {
        let err = WeightTable::parse("AK.BPAW 305 1 1", "w").unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidFormat { .. }));
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = WeightTable::parse("AK.BPAW 305 1 x 1 1 1", "w").unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidFormat { .. }));
    }

    #[test]
    fn removes_zero_weight_and_unlisted_stations() {
        let table = WeightTable::parse(WEIGHTS, "weights.dat").unwrap();
        let origin = Origin::new(61.45, -149.74, 33_000.0, Utc::now());
        let mut dataset = Dataset {
            event_id: "evt".into(),
            origin,
            streams: ["BPAW", "CAST", "COLA", "NONE"]
                .iter()
                .map(|code| {
                    let network = if *code == "COLA" { "IU" } else { "AK" };
                    Stream::new(Station::new(network, code, 64.0, -150.0), vec![])
                })
                .collect(),
        };

        table.remove_unused_stations(&mut dataset);
        let kept: Vec<_> = dataset.streams.iter().map(|s| s.station.id()).collect();
        assert_eq!(kept, vec!["AK.BPAW", "AK.CAST"]);
    }
}
