//! Search run configuration and lifecycle tracking.

use chrono::{DateTime, Utc};
use mt_types::ConfigError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grid::GridConfig;
use crate::reduce::Reduction;

/// Unique search run identifier.
pub type RunId = Uuid;

/// Top-level configuration of one grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub id: RunId,
    pub event_id: String,
    pub grid: GridConfig,

    /// Size of the worker pool, fixed for the lifetime of the run.
    pub workers: usize,

    pub created_at: DateTime<Utc>,
}

impl SearchConfig {
    pub fn new(event_id: impl Into<String>, grid: GridConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: event_id.into(),
            grid,
            workers: 1,
            created_at: Utc::now(),
        }
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        self.grid.validate()
    }
}

/// Lifecycle state of a search run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Acquiring,
    Evaluating,
    Completed,
    Failed,
}

/// Aggregate status of a search run, tracked by the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub id: RunId,
    pub event_id: String,
    pub state: RunState,
    pub grid_size: usize,
    pub workers: usize,
    pub points_evaluated: usize,
    pub best_index: Option<usize>,
    pub best_misfit: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl RunStatus {
    pub fn new(config: &SearchConfig, grid_size: usize) -> Self {
        Self {
            id: config.id,
            event_id: config.event_id.clone(),
            state: RunState::Pending,
            grid_size,
            workers: config.workers,
            points_evaluated: 0,
            best_index: None,
            best_misfit: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_acquiring(&mut self) {
        self.state = RunState::Acquiring;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_evaluating(&mut self) {
        self.state = RunState::Evaluating;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn record_segment(&mut self, len: usize) {
        self.points_evaluated += len;
    }

    pub fn mark_completed(&mut self, reduction: &Reduction) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
        self.best_index = Some(reduction.best_index);
        self.best_misfit = Some(reduction.best_misfit);
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = RunState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Wall-clock duration, once the run has finished.
    pub fn elapsed_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SearchConfig {
        SearchConfig::new("20090407201255351", GridConfig::double_couple_random(100, 4.5, 0))
            .with_workers(4)
    }

    #[test]
    fn run_status_lifecycle() {
        let config = sample_config();
        let mut status = RunStatus::new(&config, 100);
        assert_eq!(status.state, RunState::Pending);
        assert!(status.started_at.is_none());

        status.mark_acquiring();
        assert_eq!(status.state, RunState::Acquiring);
        assert!(status.started_at.is_some());

        status.mark_evaluating();
        status.record_segment(60);
        status.record_segment(40);
        assert_eq!(status.points_evaluated, 100);

        let reduction = Reduction {
            misfits: vec![0.3; 100],
            best_index: 0,
            best_misfit: 0.3,
        };
        status.mark_completed(&reduction);
        assert_eq!(status.state, RunState::Completed);
        assert_eq!(status.best_index, Some(0));
        assert!(status.elapsed_seconds().is_some());
    }

    #[test]
    fn run_failure_keeps_message() {
        let mut status = RunStatus::new(&sample_config(), 100);
        status.mark_evaluating();
        status.mark_failed("grid index 17 failed".into());
        assert_eq!(status.state, RunState::Failed);
        assert_eq!(status.error.as_deref(), Some("grid index 17 failed"));
    }

    #[test]
    fn zero_workers_rejected() {
        let config = sample_config().with_workers(0);
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn search_config_round_trip() {
        let config = sample_config();
        let json = serde_json::to_string(&config).unwrap();
        let back: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
