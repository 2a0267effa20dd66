use super::Dataset;
use crate::backend::{Backend, Tensor1D, Tensor2D};
use crate::error::{QgError, Result};
use crate::table::JetTable;
use std::ops::Range;

/// Row-major feature matrix and targets held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryDataset {
    features: Vec<f32>,
    n_features: usize,
    targets: Vec<f32>,
}

impl InMemoryDataset {
    pub fn new(features: Vec<f32>, n_features: usize, targets: Vec<f32>) -> Result<Self> {
        if n_features == 0 {
            return Err(QgError::InvalidParameter("dataset needs at least one feature".into()));
        }
        if features.len() != targets.len() * n_features {
            return Err(QgError::FeatureMismatch {
                expected: targets.len() * n_features,
                got: features.len(),
            });
        }
        Ok(Self {
            features,
            n_features,
            targets,
        })
    }

    /// Selects `variables` from `table` as features and `label` as target.
    pub fn from_table(table: &JetTable, variables: &[String], label: &str) -> Result<Self> {
        Self::new(table.select(variables)?, variables.len(), table.targets(label)?)
    }

    pub fn targets(&self) -> &[f32] {
        &self.targets
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.features[i * self.n_features..(i + 1) * self.n_features]
    }

    /// Fraction of rows with target 1.
    pub fn positive_fraction(&self) -> f64 {
        if self.targets.is_empty() {
            return 0.0;
        }
        let positives = self.targets.iter().filter(|&&t| t > 0.5).count();
        positives as f64 / self.targets.len() as f64
    }

    fn check(&self, row: usize) -> Result<()> {
        if row >= self.len() {
            return Err(QgError::InvalidParameter(format!(
                "row {row} out of range for {} rows",
                self.len()
            )));
        }
        Ok(())
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.targets.len()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn get_batch<B: Backend>(&self, range: Range<usize>) -> Result<(Tensor2D<B>, Tensor1D<B>)> {
        if range.start > range.end || range.end > self.len() {
            return Err(QgError::InvalidParameter(format!(
                "batch {range:?} out of range for {} rows",
                self.len()
            )));
        }
        let w = self.n_features;
        let x = self.features[range.start * w..range.end * w].to_vec();
        let y = self.targets[range.clone()].to_vec();
        Ok((Tensor2D::new(x, range.len(), w), Tensor1D::new(y)))
    }

    fn get_rows<B: Backend>(&self, rows: &[usize]) -> Result<(Tensor2D<B>, Tensor1D<B>)> {
        let mut x = Vec::with_capacity(rows.len() * self.n_features);
        let mut y = Vec::with_capacity(rows.len());
        for &r in rows {
            self.check(r)?;
            x.extend_from_slice(self.row(r));
            y.push(self.targets[r]);
        }
        Ok((Tensor2D::new(x, rows.len(), self.n_features), Tensor1D::new(y)))
    }
}
