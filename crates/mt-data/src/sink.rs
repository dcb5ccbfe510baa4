use mt_types::{BestFit, MtError, MtResult, ResultSink};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Writes the best fit as pretty-printed JSON
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    /// Drop the full misfit vector from the written file.
    summary_only: bool,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            summary_only: false,
        }
    }

    pub fn summary_only(mut self) -> Self {
        self.summary_only = true;
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ResultSink for JsonFileSink {
    fn consume(&mut self, best: &BestFit) -> MtResult<()> {
        let json = if self.summary_only {
            let summary = BestFit {
                misfits: Vec::new(),
                ..best.clone()
            };
            serde_json::to_string_pretty(&summary)?
        } else {
            serde_json::to_string_pretty(best)?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| MtError::Sink(format!("{}: {}", parent.display(), e)))?;
            }
        }
        fs::write(&self.path, json)
            .map_err(|e| MtError::Sink(format!("{}: {}", self.path.display(), e)))?;

        info!("Wrote best fit for {} to {}", best.event_id, self.path.display());
        Ok(())
    }
}

/// Keeps results in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub results: Vec<BestFit>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&BestFit> {
        self.results.last()
    }
}

impl ResultSink for MemorySink {
    fn consume(&mut self, best: &BestFit) -> MtResult<()> {
        self.results.push(best.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_types::{CategoryMap, SourceParameterVector};

    fn best_fit() -> BestFit {
        let source = SourceParameterVector::double_couple(30.0, 60.0, -45.0, 4.5);
        BestFit {
            event_id: "evt".into(),
            index: 2,
            moment_tensor: source.moment_tensor(),
            source,
            misfit: 0.1,
            category_misfits: CategoryMap::new(),
            misfits: vec![0.3, 0.2, 0.1],
        }
    }

    #[test]
    fn json_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("best.json");
        let mut sink = JsonFileSink::new(&path);
        sink.consume(&best_fit()).unwrap();

        let back: BestFit = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, best_fit());
    }

    #[test]
    fn json_sink_preserves_every_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        let mut best = best_fit();
        best.misfits = vec![9.904215581973673, 0.1 + 0.2, 1.0 / 3.0, 2.2250738585072014e-308];
        best.misfit = best.misfits[3];
        best.index = 3;
        JsonFileSink::new(&path).consume(&best).unwrap();

        let back: BestFit = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back.misfits), bits(&best.misfits));
        assert_eq!(back.misfit.to_bits(), best.misfit.to_bits());
    }

    #[test]
    fn summary_sink_omits_misfits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        let mut sink = JsonFileSink::new(&path).summary_only();
        sink.consume(&best_fit()).unwrap();

        let back: BestFit = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.index, 2);
        assert!(back.misfits.is_empty());
    }

    #[test]
    fn unwritable_path_is_a_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonFileSink::new(dir.path());
        let err = sink.consume(&best_fit()).unwrap_err();
        assert!(matches!(err, MtError::Sink(_)));
    }

    #[test]
    fn memory_sink_collects() {
        let mut sink = MemorySink::new();
        sink.consume(&best_fit()).unwrap();
        assert_eq!(sink.last().unwrap().index, 2);
    }
}
