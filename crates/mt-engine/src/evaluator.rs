use mt_search::{Grid, WorkRange};
use mt_types::{
    Category, CategoryMap, EvaluationError, MisfitFunctional, ReplicatedInputs,
    SourceParameterVector,
};
use std::sync::Arc;
use tracing::debug;

/// Misfit functionals keyed by category, shared by every rank
pub type MisfitMap = CategoryMap<Arc<dyn MisfitFunctional>>;

/// Evaluates grid points against the replicated inputs
pub struct Evaluator<'a> {
    grid: &'a Grid,
    inputs: &'a ReplicatedInputs,
    misfits: &'a MisfitMap,
}

impl<'a> Evaluator<'a> {
    pub fn new(grid: &'a Grid, inputs: &'a ReplicatedInputs, misfits: &'a MisfitMap) -> Self {
        Self {
            grid,
            inputs,
            misfits,
        }
    }

    fn category_misfit(
        &self,
        source: &SourceParameterVector,
        category: Category,
        functional: &dyn MisfitFunctional,
    ) -> Result<f64, EvaluationError> {
        let index = source.index;
        let data = self
            .inputs
            .data
            .get(category)
            .ok_or_else(|| EvaluationError::MissingInput {
                index,
                what: format!("{} data", category),
            })?;
        let greens = self
            .inputs
            .greens
            .get(category, source.origin_index, source.magnitude_index)
            .ok_or_else(|| EvaluationError::MissingInput {
                index,
                what: format!(
                    "{} Green's functions for origin {} magnitude {}",
                    category, source.origin_index, source.magnitude_index
                ),
            })?;
        if greens.len() != data.len() {
            return Err(EvaluationError::MissingInput {
                index,
                what: format!(
                    "{} Green's tensors for {} stations ({} available)",
                    category,
                    data.len(),
                    greens.len()
                ),
            });
        }

        let value = functional
            .evaluate(data, greens, &source.moment_tensor())
            .map_err(|e| EvaluationError::Functional {
                index,
                category,
                message: e.to_string(),
            })?;
        if !value.is_finite() || value < 0.0 {
            return Err(EvaluationError::InvalidMisfit {
                index,
                category,
                value,
            });
        }
        Ok(value)
    }

    /// Per-category misfits of one grid point.
    pub fn category_misfits(&self, index: usize) -> Result<CategoryMap<f64>, EvaluationError> {
        let source = self.grid.at(index)?;
        let mut out = CategoryMap::new();
        for (category, functional) in self.misfits {
            let value = self.category_misfit(&source, *category, functional.as_ref())?;
            out.insert(*category, value);
        }
        Ok(out)
    }

    /// Total misfit of one grid point, summed in category order.
    pub fn evaluate(&self, index: usize) -> Result<f64, EvaluationError> {
        Ok(self.category_misfits(index)?.values().sum())
    }

    /// Misfits of a contiguous range, stopping at the first failure.
    pub fn evaluate_range(&self, range: &WorkRange) -> Result<Vec<f64>, EvaluationError> {
        debug!(
            "Worker {} evaluating [{}, {})",
            range.worker, range.start, range.end
        );
        range.indices().map(|i| self.evaluate(i)).collect()
    }
}
