use thiserror::Error;

use crate::category::Category;

/// Main error type for a grid-search run
#[derive(Error, Debug)]
pub enum MtError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Partition invariant violated: {0}")]
    Partition(String),

    #[error("Communication error: {0}")]
    Comm(#[from] CommError),

    #[error("Result sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stage of a run in which an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configuration,
    Acquisition,
    Broadcast,
    Evaluation,
    Gather,
    Reduction,
    Sink,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Configuration => "configuration",
            Phase::Acquisition => "acquisition",
            Phase::Broadcast => "broadcast",
            Phase::Evaluation => "evaluation",
            Phase::Gather => "gather",
            Phase::Reduction => "reduction",
            Phase::Sink => "sink",
        };
        write!(f, "{}", s)
    }
}

impl MtError {
    pub fn phase(&self) -> Phase {
        match self {
            MtError::Config(_) => Phase::Configuration,
            MtError::Acquisition(_) | MtError::Io(_) | MtError::Serialization(_) => {
                Phase::Acquisition
            }
            MtError::Evaluation(_) => Phase::Evaluation,
            MtError::Partition(_) => Phase::Reduction,
            MtError::Comm(CommError::Aborted { .. }) => Phase::Broadcast,
            MtError::Comm(CommError::Disconnected { during, .. }) => *during,
            MtError::Comm(CommError::TypeMismatch { during, .. }) => *during,
            MtError::Comm(CommError::Peer { .. }) => Phase::Gather,
            MtError::Sink(_) => Phase::Sink,
            MtError::Internal(_) => Phase::Reduction,
        }
    }

    /// Grid index that caused the failure, if any.
    pub fn grid_index(&self) -> Option<usize> {
        match self {
            MtError::Evaluation(e) => Some(e.index()),
            _ => None,
        }
    }
}

/// Configuration errors, detected before any I/O or broadcast
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Grid point count must be positive")]
    EmptyGrid,

    #[error("Points per axis must be positive")]
    NoPointsPerAxis,

    #[error("Empty range for axis {axis}: [{low}, {high})")]
    EmptyRange { axis: String, low: f64, high: f64 },

    #[error("Axis {axis} has no values")]
    NoValues { axis: String },

    #[error("Non-finite value for {parameter}: {value}")]
    NonFinite { parameter: String, value: f64 },

    #[error("Grid size overflows the index space")]
    GridTooLarge,

    #[error("Worker count must be positive")]
    NoWorkers,

    #[error("Category {category} has a misfit functional but no data processor")]
    MissingProcessor { category: Category },

    #[error("Category {category} has a data processor but no misfit functional")]
    MissingMisfit { category: Category },

    #[error("No categories configured")]
    NoCategories,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid parameter {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },
}

/// Coordinator-side data and Green's function acquisition errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    #[error("Data set not found: {path}")]
    DataNotFound { path: String },

    #[error("Failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("Invalid data format in {path}: {message}")]
    InvalidFormat { path: String, message: String },

    #[error("No stations left after curation")]
    NoStations,

    #[error("Processing failed for station {station}: {message}")]
    ProcessingFailed { station: String, message: String },

    #[error("Green's functions unavailable for station {station} at depth {depth_in_m} m: {message}")]
    GreensUnavailable {
        station: String,
        depth_in_m: f64,
        message: String,
    },
}

/// Failure evaluating misfit at a specific grid index
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Grid index {index} out of range (grid size {size})")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Invalid misfit {value} at grid index {index} ({category})")]
    InvalidMisfit {
        index: usize,
        category: Category,
        value: f64,
    },

    #[error("Missing {what} at grid index {index}")]
    MissingInput { index: usize, what: String },

    #[error("Misfit functional failed at grid index {index} ({category}): {message}")]
    Functional {
        index: usize,
        category: Category,
        message: String,
    },
}

impl EvaluationError {
    pub fn index(&self) -> usize {
        match self {
            EvaluationError::IndexOutOfRange { index, .. }
            | EvaluationError::InvalidMisfit { index, .. }
            | EvaluationError::MissingInput { index, .. }
            | EvaluationError::Functional { index, .. } => *index,
        }
    }
}

/// Broadcast/gather failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommError {
    #[error("Run aborted by coordinator: {reason}")]
    Aborted { reason: String },

    #[error("Peer disconnected during {during} (rank {rank})")]
    Disconnected { during: Phase, rank: usize },

    #[error("Unexpected payload type during {during} from rank {rank}")]
    TypeMismatch { during: Phase, rank: usize },

    #[error("Worker {rank} failed: {message}")]
    Peer { rank: usize, message: String },
}

/// Result type alias for grid-search operations
pub type MtResult<T> = Result<T, MtError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::MtError::Internal(format!($($arg)*))
    };
}
