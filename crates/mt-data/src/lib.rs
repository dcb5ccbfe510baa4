//! # mt-data
//!
//! Concrete collaborators for the grid-search engine: JSON waveform and
//! Green's function readers, station weight and pick files, reference
//! processing and misfit, result sinks and seeded synthetic providers.

pub mod greens;
pub mod misfit;
pub mod picks;
pub mod processing;
pub mod reader;
pub mod sink;
pub mod synthetic;
pub mod weights;

pub use greens::GreensLibrary;
pub use misfit::{MisfitConfig, Norm, WaveformMisfit};
pub use picks::{PickTable, Picks};
pub use processing::{FilterConfig, ProcessConfig, ProcessData, WindowAnchor, WindowConfig};
pub use reader::{write_dataset, JsonDatasetReader, ORIGIN_FILE};
pub use sink::{JsonFileSink, MemorySink};
pub use synthetic::{SyntheticGreens, SyntheticReader};
pub use weights::{StationWeights, WeightTable};
