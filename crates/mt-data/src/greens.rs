use mt_types::{AcquisitionError, GreensProvider, GreensTensor, GreensTrace, Origin, Station};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Precomputed Green's functions stored on disk
///
/// Layout: `<root>/<model>/<depth in m>/<station id>.json`, each file holding
/// the station's `Vec<GreensTrace>`. Depths are rounded to the nearest metre.
#[derive(Debug, Clone)]
pub struct GreensLibrary {
    root: PathBuf,
    model: String,
}

impl GreensLibrary {
    pub fn new(root: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn depth_dir(&self, depth_in_m: f64) -> PathBuf {
        self.root
            .join(&self.model)
            .join(format!("{}", depth_in_m.round() as i64))
    }

    pub fn station_path(&self, station: &Station, depth_in_m: f64) -> PathBuf {
        self.depth_dir(depth_in_m)
            .join(format!("{}.json", station.id()))
    }

    fn read_station(&self, station: &Station, depth_in_m: f64) -> Result<GreensTensor, AcquisitionError> {
        let path = self.station_path(station, depth_in_m);
        let unavailable = |message: String| AcquisitionError::GreensUnavailable {
            station: station.id(),
            depth_in_m,
            message,
        };

        let text = fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("{}: {}", path.display(), e)))?;
        let traces: Vec<GreensTrace> = serde_json::from_str(&text)
            .map_err(|e| unavailable(format!("{}: {}", path.display(), e)))?;

        let tensor = GreensTensor::new(station.clone(), traces);
        if !tensor.is_well_formed() {
            return Err(unavailable(format!(
                "{}: expected six equal-length responses per component",
                path.display()
            )));
        }
        Ok(tensor)
    }

    /// Store one station's Green's functions at `depth_in_m`.
    pub fn write(&self, tensor: &GreensTensor, depth_in_m: f64) -> std::io::Result<()> {
        let dir = self.depth_dir(depth_in_m);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string(&tensor.traces)?;
        fs::write(self.station_path(&tensor.station, depth_in_m), json)
    }
}

impl GreensProvider for GreensLibrary {
    fn fetch(&self, stations: &[Station], origin: &Origin) -> Result<Vec<GreensTensor>, AcquisitionError> {
        debug!(
            "Loading {} Green's tensors from {} at {} m",
            stations.len(),
            self.model,
            origin.depth_in_m
        );
        stations
            .iter()
            .map(|station| self.read_station(station, origin.depth_in_m))
            .collect()
    }
}
