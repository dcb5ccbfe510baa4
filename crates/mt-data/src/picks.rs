//! Phase arrival picks, one line per station:
//! `<station id> <P seconds after origin> <S seconds after origin>`.

use mt_types::{AcquisitionError, Station};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Picks {
    pub p: f64,
    pub s: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PickTable {
    pub stations: BTreeMap<String, Picks>,
}

impl PickTable {
    pub fn parse(text: &str, source: &str) -> Result<Self, AcquisitionError> {
        let mut stations = BTreeMap::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(AcquisitionError::InvalidFormat {
                    path: source.to_string(),
                    message: format!("line {}: expected 3 columns", line_no + 1),
                });
            }
            let parse = |field: &str| {
                field.parse::<f64>().map_err(|_| AcquisitionError::InvalidFormat {
                    path: source.to_string(),
                    message: format!("line {}: invalid number '{}'", line_no + 1, field),
                })
            };
            stations.insert(
                fields[0].to_string(),
                Picks {
                    p: parse(fields[1])?,
                    s: parse(fields[2])?,
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

    pub fn get(&self, station: &Station) -> Option<Picks> {
        self.stations
            .get(&station.id())
            .or_else(|| self.stations.get(&station.station))
            .copied()
    }
}
