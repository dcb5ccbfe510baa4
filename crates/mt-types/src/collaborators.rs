//! Interfaces the grid-search engine needs from its collaborators.
//!
//! Readers, processors and Green's providers run on the coordinator only.
//! Misfit functionals run on every worker and must be shareable across
//! threads. Result sinks are written to and never read back.

use std::path::Path;

use crate::errors::{AcquisitionError, MtResult};
use crate::event::{Origin, Station};
use crate::greens::GreensTensor;
use crate::result::BestFit;
use crate::source::MomentTensor;
use crate::waveform::{Dataset, Stream};

/// Produces per-station raw waveforms and the event origin
pub trait WaveformReader: Send + Sync {
    fn read(&self, path: &Path, event_id: &str) -> Result<Dataset, AcquisitionError>;
}

/// Pure mapping from a raw stream to a processed stream
pub trait DataProcessor: Send + Sync {
    fn process(&self, stream: &Stream) -> Result<Stream, AcquisitionError>;

    /// Human-readable processor name.
    fn name(&self) -> &str {
        "processor"
    }
}

/// Supplies one Green's tensor per station for a given origin
pub trait GreensProvider: Send + Sync {
    fn fetch(&self, stations: &[Station], origin: &Origin)
        -> Result<Vec<GreensTensor>, AcquisitionError>;
}

/// Scores synthetics from `greens` and `mt` against processed `data`
///
/// `data` and `greens` are aligned by station. The returned value must be a
/// finite, non-negative number.
pub trait MisfitFunctional: Send + Sync {
    fn evaluate(&self, data: &[Stream], greens: &[GreensTensor], mt: &MomentTensor)
        -> MtResult<f64>;
}

/// Consumes the final result of a run
pub trait ResultSink {
    fn consume(&mut self, best: &BestFit) -> MtResult<()>;
}

impl<F> MisfitFunctional for F
where
    F: Fn(&[Stream], &[GreensTensor], &MomentTensor) -> MtResult<f64> + Send + Sync,
{
    fn evaluate(
        &self,
        data: &[Stream],
        greens: &[GreensTensor],
        mt: &MomentTensor,
    ) -> MtResult<f64> {
        self(data, greens, mt)
    }
}
