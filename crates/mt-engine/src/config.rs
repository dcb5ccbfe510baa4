//! JSON run configuration and the collaborators it describes.

use mt_data::{
    GreensLibrary, JsonDatasetReader, MisfitConfig, PickTable, ProcessConfig, ProcessData,
    SyntheticGreens, SyntheticReader, WaveformMisfit, WeightTable,
};
use mt_search::{GridConfig, SearchConfig};
use mt_types::{
    Category, CategoryMap, ConfigError, DataProcessor, GreensProvider, MisfitFunctional, MtResult,
    Origin, SourceParameterVector, SourceWavelet, Station, WaveformReader,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::evaluator::MisfitMap;
use crate::role::RunInputs;

/// Where observed waveforms come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSource {
    /// Directory read by [`JsonDatasetReader`].
    Directory { path: PathBuf },
    /// Waveforms predicted by a known source, for dry runs.
    Synthetic {
        origin: Origin,
        stations: Vec<Station>,
        source: SyntheticSource,
        #[serde(default)]
        noise: f64,
    },
}

/// Mechanism used to generate synthetic data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSource {
    pub strike: f64,
    pub dip: f64,
    pub rake: f64,
    #[serde(default)]
    pub v: f64,
    #[serde(default)]
    pub w: f64,
    pub magnitude: f64,
    #[serde(default)]
    pub depth_in_m: Option<f64>,
}

impl SyntheticSource {
    pub fn to_source(&self) -> SourceParameterVector {
        SourceParameterVector {
            v: self.v,
            w: self.w,
            depth_in_m: self.depth_in_m,
            ..SourceParameterVector::double_couple(self.strike, self.dip, self.rake, self.magnitude)
        }
    }
}

/// Where Green's functions come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GreensSource {
    Library { root: PathBuf, model: String },
    Synthetic {
        #[serde(default)]
        seed: u64,
        #[serde(default = "default_dt")]
        dt: f64,
        #[serde(default = "default_npts")]
        npts: usize,
    },
}

fn default_dt() -> f64 {
    0.5
}

fn default_npts() -> usize {
    256
}

/// Processing and misfit settings of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub process: ProcessConfig,
    #[serde(default)]
    pub misfit: MisfitConfig,
}

/// Complete description of one grid-search run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub event_id: String,
    pub data: DataSource,
    pub greens: GreensSource,
    pub grid: GridConfig,
    pub categories: CategoryMap<CategoryConfig>,
    #[serde(default)]
    pub weights_path: Option<PathBuf>,
    #[serde(default)]
    pub picks_path: Option<PathBuf>,
    /// Best-fit JSON destination; printed to stdout when unset.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// Write the best fit without the full misfit vector.
    #[serde(default)]
    pub summary_only: bool,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub wavelet: Option<SourceWavelet>,
}

impl RunConfig {
    pub fn load(path: &Path) -> MtResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        info!("Loaded run configuration for {} from {}", config.event_id, path.display());
        Ok(config)
    }

    /// Checks that need no file access.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_id.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                parameter: "event_id".into(),
                message: "must not be empty".into(),
            });
        }
        if self.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        if self.workers == Some(0) {
            return Err(ConfigError::NoWorkers);
        }
        self.grid.validate()?;
        self.misfits().map(|_| ())
    }

    pub fn search_config(&self, workers: usize) -> SearchConfig {
        SearchConfig::new(self.event_id.clone(), self.grid.clone()).with_workers(workers)
    }

    pub fn misfits(&self) -> Result<MisfitMap, ConfigError> {
        let mut misfits = MisfitMap::new();
        for (category, config) in &self.categories {
            let functional: Arc<dyn MisfitFunctional> = Arc::new(WaveformMisfit::new(&config.misfit)?);
            misfits.insert(*category, functional);
        }
        Ok(misfits)
    }

    pub fn load_weights(&self) -> MtResult<Option<Arc<WeightTable>>> {
        match &self.weights_path {
            Some(path) => Ok(Some(Arc::new(WeightTable::load(path)?))),
            None => Ok(None),
        }
    }

    pub fn load_picks(&self) -> MtResult<Option<Arc<PickTable>>> {
        match &self.picks_path {
            Some(path) => Ok(Some(Arc::new(PickTable::load(path)?))),
            None => Ok(None),
        }
    }

    pub fn processors(
        &self,
        weights: Option<&Arc<WeightTable>>,
        picks: Option<&Arc<PickTable>>,
    ) -> CategoryMap<Box<dyn DataProcessor>> {
        let mut processors: CategoryMap<Box<dyn DataProcessor>> = CategoryMap::new();
        for (category, config) in &self.categories {
            let mut processor = ProcessData::new(*category, config.process.clone());
            if let Some(weights) = weights {
                processor = processor.with_weights(Arc::clone(weights));
            }
            if let Some(picks) = picks {
                processor = processor.with_picks(Arc::clone(picks));
            }
            processors.insert(*category, Box::new(processor));
        }
        processors
    }

    pub fn reader(&self) -> Box<dyn WaveformReader> {
        match &self.data {
            DataSource::Directory { .. } => Box::new(JsonDatasetReader::new()),
            DataSource::Synthetic {
                origin,
                stations,
                source,
                noise,
            } => {
                let greens = self.synthetic_greens().unwrap_or_default();
                let wavelet = self
                    .wavelet
                    .unwrap_or_else(|| SourceWavelet::trapezoid(source.magnitude));
                Box::new(
                    SyntheticReader::new(greens, origin.clone(), stations.clone(), source.to_source())
                        .with_wavelet(wavelet)
                        .with_noise(*noise),
                )
            }
        }
    }

    fn synthetic_greens(&self) -> Option<SyntheticGreens> {
        match &self.greens {
            GreensSource::Synthetic { seed, dt, npts } => {
                Some(SyntheticGreens::new(*seed).with_sampling(*dt, *npts))
            }
            GreensSource::Library { .. } => None,
        }
    }

    pub fn greens_provider(&self) -> Box<dyn GreensProvider> {
        match &self.greens {
            GreensSource::Library { root, model } => Box::new(GreensLibrary::new(root, model.clone())),
            GreensSource::Synthetic { .. } => Box::new(self.synthetic_greens().unwrap_or_default()),
        }
    }

    pub fn inputs(&self, weights: Option<Arc<WeightTable>>) -> RunInputs {
        let data_path = match &self.data {
            DataSource::Directory { path } => path.clone(),
            DataSource::Synthetic { .. } => PathBuf::from("synthetic"),
        };
        RunInputs {
            data_path,
            weights,
            wavelet: self.wavelet,
        }
    }
}

/// Category configuration with the reference defaults for `category`.
pub fn default_category_config(category: Category) -> CategoryConfig {
    match category {
        Category::BodyWaves => CategoryConfig {
            process: ProcessConfig::body_waves(),
            misfit: MisfitConfig::new(2.0, &["ZR"]),
        },
        Category::SurfaceWaves => CategoryConfig {
            process: ProcessConfig::surface_waves(),
            misfit: MisfitConfig::new(10.0, &["ZR", "T"]),
        },
    }
}
