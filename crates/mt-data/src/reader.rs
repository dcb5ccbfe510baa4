use mt_types::{AcquisitionError, Dataset, Origin, Stream, WaveformReader};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File holding the event origin inside a data set directory
pub const ORIGIN_FILE: &str = "origin.json";

/// Reads a data set directory of JSON files
///
/// Layout: `origin.json` holds the [`Origin`]; every other `*.json` file
/// holds one station [`Stream`]. Streams are returned in file-name order.
#[derive(Debug, Clone, Default)]
pub struct JsonDatasetReader;

impl JsonDatasetReader {
    pub fn new() -> Self {
        Self
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AcquisitionError> {
        let text = fs::read_to_string(path).map_err(|e| AcquisitionError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| AcquisitionError::InvalidFormat {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn stream_files(dir: &Path) -> Result<Vec<PathBuf>, AcquisitionError> {
        let entries = fs::read_dir(dir).map_err(|e| AcquisitionError::ReadFailed {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| AcquisitionError::ReadFailed {
                    path: dir.display().to_string(),
                    message: e.to_string(),
                })?
                .path();
            let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
            let is_origin = path
                .file_name()
                .map(|n| n == ORIGIN_FILE)
                .unwrap_or(false);
            if path.is_file() && is_json && !is_origin {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl WaveformReader for JsonDatasetReader {
    fn read(&self, path: &Path, event_id: &str) -> Result<Dataset, AcquisitionError> {
        if !path.is_dir() {
            return Err(AcquisitionError::DataNotFound {
                path: path.display().to_string(),
            });
        }

        let origin: Origin = Self::read_json(&path.join(ORIGIN_FILE))?;
        let mut streams = Vec::new();
        for file in Self::stream_files(path)? {
            let stream: Stream = Self::read_json(&file)?;
            debug!("Read {} traces for {}", stream.traces.len(), stream.station);
            streams.push(stream);
        }

        info!("Read {} streams for event {}", streams.len(), event_id);
        Ok(Dataset {
            event_id: event_id.to_string(),
            origin,
            streams,
        })
    }
}

/// Write a data set in the layout understood by [`JsonDatasetReader`].
pub fn write_dataset(dir: &Path, dataset: &Dataset) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let origin = serde_json::to_string_pretty(&dataset.origin)?;
    fs::write(dir.join(ORIGIN_FILE), origin)?;
    for stream in &dataset.streams {
        let json = serde_json::to_string(stream)?;
        fs::write(dir.join(format!("{}.json", stream.station.id())), json)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mt_types::{Component, Station, Trace};

    fn sample_dataset() -> Dataset {
        let origin = Origin::new(61.45, -149.74, 33_000.0, Utc::now());
        let streams = ["BBB", "AAA"]
            .iter()
            .map(|code| {
                Stream::new(
                    Station::new("AK", code, 62.0, -150.0),
                    vec![Trace::new(Component::Z, 0.0, 0.5, vec![1.0, 2.0, 3.0])],
                )
            })
            .collect();
        Dataset {
            event_id: "evt".into(),
            origin,
            streams,
        }
    }

    #[test]
    fn reads_back_written_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = sample_dataset();
        write_dataset(dir.path(), &dataset).unwrap();

        let read = JsonDatasetReader::new().read(dir.path(), "evt").unwrap();
        assert_eq!(read.origin, dataset.origin);
        assert_eq!(read.streams.len(), 2);
        // file-name order
        assert_eq!(read.streams[0].station.station, "AAA");
        assert_eq!(read.streams[1].station.station, "BBB");
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = JsonDatasetReader::new()
            .read(Path::new("/nonexistent/mtgrid/data"), "evt")
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::DataNotFound { .. }));
    }

    #[test]
    fn malformed_stream_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &sample_dataset()).unwrap();
        fs::write(dir.path().join("AK.ZZZ.json"), "{ not json").unwrap();

        let err = JsonDatasetReader::new().read(dir.path(), "evt").unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidFormat { .. }));
    }
}
