//! # mt-engine
//!
//! Distributed grid-search engine for seismic moment tensors.
//!
//! The coordinator (rank 0) reads and processes waveforms and Green's
//! functions, broadcasts them once, and every rank evaluates a contiguous
//! slice of the grid. Segments are gathered in rank order, reduced to the
//! best-fitting source and handed to a result sink.
//!
//! ```no_run
//! use mt_engine::{run_threaded, CoordinatorIo, GridSearchEngine, RunConfig};
//! use std::path::Path;
//!
//! # fn main() -> mt_types::MtResult<()> {
//! let config = RunConfig::load(Path::new("run.json"))?;
//! let engine = GridSearchEngine::new(config.search_config(4), config.misfits()?);
//! let weights = config.load_weights()?;
//! let picks = config.load_picks()?;
//! let processors = config.processors(weights.as_ref(), picks.as_ref());
//! let reader = config.reader();
//! let greens = config.greens_provider();
//! let mut sink = mt_data::MemorySink::new();
//! let outcome = run_threaded(
//!     &engine,
//!     4,
//!     CoordinatorIo {
//!         reader: reader.as_ref(),
//!         processors: &processors,
//!         greens: greens.as_ref(),
//!         sink: &mut sink,
//!         inputs: config.inputs(weights),
//!     },
//! )?;
//! println!(
//!     "best index {} after {} points",
//!     outcome.best.index, outcome.status.points_evaluated
//! );
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod comm;
pub mod config;
pub mod driver;
pub mod engine;
pub mod evaluator;
pub mod role;

pub use comm::{Communicator, SerialComm, ThreadComm, ThreadWorld, COORDINATOR};
pub use config::{
    default_category_config, CategoryConfig, DataSource, GreensSource, RunConfig, SyntheticSource,
};
pub use driver::{run_serial, run_threaded};
pub use engine::{GridSearchEngine, SearchOutcome};
pub use evaluator::{Evaluator, MisfitMap};
pub use role::{CoordinatorIo, Role, RunInputs};
