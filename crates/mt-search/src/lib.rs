//! # mt-search
//!
//! Grid construction and the pure parts of the distributed search protocol.
//!
//! Provides source grids (random, regular and listed mechanisms crossed with
//! magnitude and depth axes), the contiguous work partitioner, misfit
//! reduction with lowest-index tie breaking, and run status tracking.

mod grid;
mod partition;
mod reduce;
mod run;

pub use grid::{
    AxisRange, AxisRanges, Grid, GridConfig, Mechanism, Parameter, Sampling, SourceFamily,
};
pub use partition::{WorkPartition, WorkRange};
pub use reduce::{argmin, concatenate, reduce, Reduction};
pub use run::{RunId, RunState, RunStatus, SearchConfig};
