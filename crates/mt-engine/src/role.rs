use mt_data::WeightTable;
use mt_types::{CategoryMap, DataProcessor, GreensProvider, ResultSink, SourceWavelet, WaveformReader};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// What a rank does in a run
pub enum Role<'a> {
    /// Performs acquisition, reduction and result delivery.
    Coordinator(CoordinatorIo<'a>),
    /// Evaluates its share of the grid and contributes a segment.
    Worker,
}

impl Role<'_> {
    pub fn is_coordinator(&self) -> bool {
        matches!(self, Role::Coordinator(_))
    }
}

impl fmt::Debug for Role<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator(io) => f
                .debug_struct("Coordinator")
                .field("data_path", &io.inputs.data_path)
                .field("categories", &io.processors.keys().collect::<Vec<_>>())
                .finish(),
            Role::Worker => f.write_str("Worker"),
        }
    }
}

/// Run inputs consumed only by the coordinator's collaborators
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub data_path: PathBuf,
    /// Stations absent from or zero-weighted in this table are dropped.
    pub weights: Option<Arc<WeightTable>>,
    /// Source-time function for Green's functions; a trapezoid at the first
    /// grid magnitude when unset.
    pub wavelet: Option<SourceWavelet>,
}

impl RunInputs {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            ..Self::default()
        }
    }

    pub fn with_weights(mut self, weights: Arc<WeightTable>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_wavelet(mut self, wavelet: SourceWavelet) -> Self {
        self.wavelet = Some(wavelet);
        self
    }
}

/// Collaborators owned by the coordinator
pub struct CoordinatorIo<'a> {
    pub reader: &'a dyn WaveformReader,
    pub processors: &'a CategoryMap<Box<dyn DataProcessor>>,
    pub greens: &'a dyn GreensProvider,
    pub sink: &'a mut dyn ResultSink,
    pub inputs: RunInputs,
}
