//! Grid-search engine: the protocol each rank runs.
//!
//! ```text
//! validate -> [coordinator] acquire -> broadcast -> evaluate own range
//!          -> gather -> [coordinator] reduce -> sink
//! ```

use mt_search::{reduce, Grid, RunStatus, SearchConfig, WorkPartition};
use mt_types::{
    internal_error, validate_categories, BestFit, CategoryMap, ConfigError, EvaluationError,
    MtError, MtResult, ReplicatedInputs,
};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::acquire::acquire;
use crate::comm::Communicator;
use crate::evaluator::{Evaluator, MisfitMap};
use crate::role::Role;

/// Segment each rank contributes to the gather
type Segment = Result<Vec<f64>, EvaluationError>;

/// What the coordinator returns from a completed search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best: BestFit,
    pub status: RunStatus,
}

/// Runs one grid search on one rank
pub struct GridSearchEngine {
    config: SearchConfig,
    misfits: MisfitMap,
}

impl GridSearchEngine {
    pub fn new(config: SearchConfig, misfits: MisfitMap) -> Self {
        Self { config, misfits }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn misfits(&self) -> &MisfitMap {
        &self.misfits
    }

    /// Checks that need no I/O; every rank runs them identically.
    fn prepare<C: Communicator>(&self, comm: &C, role: &Role<'_>) -> MtResult<Grid> {
        self.config.validate()?;
        let grid = Grid::new(self.config.grid.clone())?;

        match role {
            Role::Coordinator(io) => validate_categories(io.processors, &self.misfits)?,
            Role::Worker if self.misfits.is_empty() => return Err(ConfigError::NoCategories.into()),
            Role::Worker => {}
        }
        if role.is_coordinator() != comm.is_coordinator() {
            return Err(internal_error!(
                "rank {} was given the {:?} role",
                comm.rank(),
                role
            ));
        }
        Ok(grid)
    }

    /// Run the protocol on this rank.
    ///
    /// The coordinator returns the best fit, after handing it to the sink,
    /// together with the final run status. Workers return `None` once their
    /// segment has been gathered.
    pub fn run<C: Communicator>(&self, comm: &C, role: Role<'_>) -> MtResult<Option<SearchOutcome>> {
        let grid = match self.prepare(comm, &role) {
            Ok(grid) => grid,
            Err(e) => {
                error!("Rank {} rejected the configuration: {}", comm.rank(), e);
                if comm.is_coordinator() {
                    comm.abort(&e.to_string());
                }
                return Err(e);
            }
        };

        match role {
            Role::Coordinator(io) => {
                let mut status = RunStatus::new(&self.config, grid.size());
                status.workers = comm.size();
                info!(
                    "Starting grid search {} for {}: {} points, {} workers, free parameters {:?}",
                    self.config.id,
                    self.config.event_id,
                    grid.size(),
                    comm.size(),
                    grid.free_parameters()
                );

                status.mark_acquiring();
                let inputs = match acquire(&io, &grid, &self.config.event_id) {
                    Ok(inputs) => Arc::new(inputs),
                    Err(e) => {
                        comm.abort(&e.to_string());
                        status.mark_failed(e.to_string());
                        error!(?status, "Acquisition failed: {}", e);
                        return Err(e);
                    }
                };
                let inputs = comm.broadcast(Some(inputs))?;

                status.mark_evaluating();
                let result = self.evaluate_and_reduce(comm, &grid, &inputs, &mut status);
                let best = match result {
                    Ok(best) => best,
                    Err(e) => {
                        status.mark_failed(e.to_string());
                        error!(?status, "Grid search {} failed during {}: {}", status.id, e.phase(), e);
                        return Err(e);
                    }
                };

                if let Err(e) = io.sink.consume(&best) {
                    status.mark_failed(e.to_string());
                    error!(?status, "Result sink failed: {}", e);
                    return Err(e);
                }

                info!(
                    "Grid search {} completed in {:.3}s: best index {} misfit {:.6e} ({})",
                    status.id,
                    status.elapsed_seconds().unwrap_or(0.0),
                    best.index,
                    best.misfit,
                    best.moment_tensor
                );
                debug!(?status, "Final run status");
                Ok(Some(SearchOutcome { best, status }))
            }
            Role::Worker => {
                let inputs: Arc<ReplicatedInputs> = comm.broadcast(None)?;
                let partition = WorkPartition::new(grid.size(), comm.size())?;
                let segment = self.evaluate_segment(comm, &grid, &inputs, &partition)?;
                let failure = segment.as_ref().err().cloned();
                comm.gather(segment)?;
                match failure {
                    Some(e) => Err(e.into()),
                    None => Ok(None),
                }
            }
        }
    }

    fn evaluate_segment<C: Communicator>(
        &self,
        comm: &C,
        grid: &Grid,
        inputs: &ReplicatedInputs,
        partition: &WorkPartition,
    ) -> MtResult<Segment> {
        let range = partition
            .range(comm.rank())
            .ok_or_else(|| internal_error!("no work range for rank {}", comm.rank()))?;
        let evaluator = Evaluator::new(grid, inputs, &self.misfits);
        let segment = evaluator.evaluate_range(range);
        match &segment {
            Ok(values) => debug!("Rank {} evaluated {} points", comm.rank(), values.len()),
            Err(e) => error!("Rank {} failed at grid index {}: {}", comm.rank(), e.index(), e),
        }
        Ok(segment)
    }

    fn evaluate_and_reduce<C: Communicator>(
        &self,
        comm: &C,
        grid: &Grid,
        inputs: &ReplicatedInputs,
        status: &mut RunStatus,
    ) -> MtResult<BestFit> {
        let partition = WorkPartition::new(grid.size(), comm.size())?;
        partition.validate()?;

        let own = self.evaluate_segment(comm, grid, inputs, &partition)?;
        let gathered = comm
            .gather(own)?
            .ok_or_else(|| internal_error!("coordinator gather returned no segments"))?;

        let mut segments = Vec::with_capacity(gathered.len());
        for segment in gathered {
            let values = segment.map_err(MtError::from)?;
            status.record_segment(values.len());
            segments.push(values);
        }

        let reduction = reduce(&partition, segments)?;
        status.mark_completed(&reduction);

        let evaluator = Evaluator::new(grid, inputs, &self.misfits);
        let category_misfits: CategoryMap<f64> = evaluator.category_misfits(reduction.best_index)?;
        let source = grid.at(reduction.best_index)?;

        Ok(BestFit {
            event_id: self.config.event_id.clone(),
            index: reduction.best_index,
            moment_tensor: source.moment_tensor(),
            source,
            misfit: reduction.best_misfit,
            category_misfits,
            misfits: reduction.misfits,
        })
    }
}
