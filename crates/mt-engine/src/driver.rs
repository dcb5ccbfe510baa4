//! Launchers that run every rank of a search to completion.

use mt_types::{internal_error, ConfigError, MtResult};
use std::thread;
use tracing::{debug, warn};

use crate::comm::{Communicator, SerialComm, ThreadWorld};
use crate::engine::{GridSearchEngine, SearchOutcome};
use crate::role::{CoordinatorIo, Role};

/// Run the whole search on the calling thread.
pub fn run_serial(engine: &GridSearchEngine, io: CoordinatorIo<'_>) -> MtResult<SearchOutcome> {
    engine
        .run(&SerialComm, Role::Coordinator(io))?
        .ok_or_else(|| internal_error!("coordinator finished without a result"))
}

/// Run the search on `workers` ranks, one OS thread each.
///
/// The calling thread is the coordinator; the other ranks are scoped
/// threads that only evaluate.
pub fn run_threaded(
    engine: &GridSearchEngine,
    workers: usize,
    io: CoordinatorIo<'_>,
) -> MtResult<SearchOutcome> {
    if workers == 0 {
        return Err(ConfigError::NoWorkers.into());
    }
    if workers == 1 {
        return run_serial(engine, io);
    }

    let mut comms = ThreadWorld::new(workers);
    let coordinator = comms.remove(0);

    let result = thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                thread::Builder::new()
                    .name(format!("mt-worker-{}", comm.rank()))
                    .spawn_scoped(s, move || engine.run(&comm, Role::Worker))
            })
            .collect();

        let result = engine.run(&coordinator, Role::Coordinator(io));
        // unblocks workers still waiting for a broadcast
        drop(coordinator);

        for (rank, handle) in handles.into_iter().enumerate() {
            let rank = rank + 1;
            match handle {
                Ok(handle) => match handle.join() {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => debug!("Worker {} finished with error: {}", rank, e),
                    Err(_) => warn!("Worker {} panicked", rank),
                },
                Err(e) => warn!("Failed to spawn worker {}: {}", rank, e),
            }
        }
        result
    })?;

    result.ok_or_else(|| internal_error!("coordinator finished without a result"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::MisfitMap;
    use crate::role::RunInputs;
    use mt_data::MemorySink;
    use mt_search::{GridConfig, SearchConfig};
    use mt_types::{
        AcquisitionError, BestFit, Category, CategoryMap, DataProcessor, Dataset, GreensProvider,
        GreensTensor, MisfitFunctional, MomentTensor, MtError, Origin, Station, Stream,
        WaveformReader,
    };
    use chrono::Utc;
    use std::path::Path;
    use std::sync::Arc;

    struct OneStation;

    impl WaveformReader for OneStation {
        fn read(&self, _: &Path, event_id: &str) -> Result<Dataset, AcquisitionError> {
            Ok(Dataset {
                event_id: event_id.to_string(),
                origin: Origin::new(0.0, 0.0, 10_000.0, Utc::now()),
                streams: vec![Stream::new(Station::new("XX", "AAA", 1.0, 1.0), vec![])],
            })
        }
    }

    struct Missing;

    impl WaveformReader for Missing {
        fn read(&self, path: &Path, _: &str) -> Result<Dataset, AcquisitionError> {
            Err(AcquisitionError::DataNotFound {
                path: path.display().to_string(),
            })
        }
    }

    struct Passthrough;

    impl DataProcessor for Passthrough {
        fn process(&self, stream: &Stream) -> Result<Stream, AcquisitionError> {
            Ok(stream.clone())
        }
    }

    struct EmptyGreens;

    impl GreensProvider for EmptyGreens {
        fn fetch(&self, stations: &[Station], _: &Origin) -> Result<Vec<GreensTensor>, AcquisitionError> {
            Ok(stations
                .iter()
                .map(|s| GreensTensor::new(s.clone(), vec![]))
                .collect())
        }
    }

    /// Deterministic, irregular function of the moment tensor
    fn analytic_misfit() -> Arc<dyn MisfitFunctional> {
        Arc::new(
            |_: &[Stream], _: &[GreensTensor], mt: &MomentTensor| -> MtResult<f64> {
                let m0 = mt.scalar_moment();
                let c = mt.components();
                Ok(c.iter()
                    .enumerate()
                    .map(|(k, x)| ((k as f64 + 1.0) * x / m0).sin().abs())
                    .sum())
            },
        )
    }

    fn processors() -> CategoryMap<Box<dyn DataProcessor>> {
        let mut map: CategoryMap<Box<dyn DataProcessor>> = CategoryMap::new();
        map.insert(Category::SurfaceWaves, Box::new(Passthrough));
        map
    }

    fn engine(count: usize) -> GridSearchEngine {
        let mut misfits = MisfitMap::new();
        misfits.insert(Category::SurfaceWaves, analytic_misfit());
        GridSearchEngine::new(
            SearchConfig::new("evt", GridConfig::double_couple_random(count, 4.5, 2024)),
            misfits,
        )
    }

    fn run(engine: &GridSearchEngine, workers: usize) -> MtResult<BestFit> {
        let processors = processors();
        let mut sink = MemorySink::new();
        let io = CoordinatorIo {
            reader: &OneStation,
            processors: &processors,
            greens: &EmptyGreens,
            sink: &mut sink,
            inputs: RunInputs::new("data"),
        };
        run_threaded(engine, workers, io).map(|outcome| outcome.best)
    }

    #[test]
    fn serial_and_parallel_runs_are_bit_identical() {
        let engine = engine(1_003);
        let serial = run(&engine, 1).unwrap();
        let parallel = run(&engine, 4).unwrap();

        assert_eq!(serial.misfits.len(), 1_003);
        let serial_bits: Vec<u64> = serial.misfits.iter().map(|x| x.to_bits()).collect();
        let parallel_bits: Vec<u64> = parallel.misfits.iter().map(|x| x.to_bits()).collect();
        assert_eq!(serial_bits, parallel_bits);
        assert_eq!(serial.index, parallel.index);
        assert_eq!(serial.misfit.to_bits(), parallel.misfit.to_bits());
    }

    #[test]
    fn status_counts_every_rank() {
        let engine = engine(10);
        let processors = processors();
        let mut sink = MemorySink::new();
        let io = CoordinatorIo {
            reader: &OneStation,
            processors: &processors,
            greens: &EmptyGreens,
            sink: &mut sink,
            inputs: RunInputs::new("data"),
        };
        let outcome = run_threaded(&engine, 3, io).unwrap();
        assert_eq!(outcome.status.workers, 3);
        assert_eq!(outcome.status.points_evaluated, 10);
        assert_eq!(outcome.status.best_index, Some(outcome.best.index));
    }

    #[test]
    fn more_workers_than_points() {
        let engine = engine(3);
        let serial = run(&engine, 1).unwrap();
        let parallel = run(&engine, 8).unwrap();
        assert_eq!(serial.misfits, parallel.misfits);
    }

    #[test]
    fn zero_workers_is_a_config_error() {
        let err = run(&engine(3), 0).unwrap_err();
        assert!(matches!(err, MtError::Config(ConfigError::NoWorkers)));
    }

    #[test]
    fn acquisition_failure_releases_workers() {
        let engine = engine(10);
        let processors = processors();
        let mut sink = MemorySink::new();
        let io = CoordinatorIo {
            reader: &Missing,
            processors: &processors,
            greens: &EmptyGreens,
            sink: &mut sink,
            inputs: RunInputs::new("nowhere"),
        };
        let err = run_threaded(&engine, 4, io).unwrap_err();
        assert!(matches!(
            err,
            MtError::Acquisition(AcquisitionError::DataNotFound { .. })
        ));
        assert!(sink.results.is_empty());
    }

    #[test]
    fn invalid_grid_releases_workers() {
        let err = run(&engine(0), 3).unwrap_err();
        assert!(matches!(err, MtError::Config(ConfigError::EmptyGrid)));
    }
}
