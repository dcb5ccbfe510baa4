use serde::{Deserialize, Serialize};

use crate::category::CategoryMap;
use crate::source::{MomentTensor, SourceParameterVector};

/// Terminal artifact of a run: the minimizing grid point and all misfits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestFit {
    pub event_id: String,
    pub index: usize,
    pub source: SourceParameterVector,
    pub moment_tensor: MomentTensor,
    pub misfit: f64,
    /// Contribution of each category at `index`.
    pub category_misfits: CategoryMap<f64>,
    /// Misfit for every grid index, in grid order.
    pub misfits: Vec<f64>,
}

impl BestFit {
    pub fn grid_size(&self) -> usize {
        self.misfits.len()
    }
}
