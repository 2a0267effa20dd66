//! Datasets feeding the trainer and the appliers.
//!
//! A [`Dataset`] serves `(X, y)` pairs where `X` is a `(n_jets, n_features)`
//! matrix and `y` the per-jet target. Sequential access goes through
//! [`Dataset::batches`]; stochastic training draws from [`ShuffledBatches`].
//!
//! ```rust
//! use qg_tagger::dataset::{Dataset, InMemoryDataset};
//! use qg_tagger::backend::CpuBackend;
//!
//! let ds = InMemoryDataset::new(vec![1.0, 2.0, 3.0, 4.0], 2, vec![0.0, 1.0]).unwrap();
//! let batches: Vec<_> = ds.batches::<CpuBackend>(1).collect();
//! assert_eq!(batches.len(), 2);
//! ```

use crate::backend::{Backend, Tensor1D, Tensor2D};
use crate::error::Result;
use std::marker::PhantomData;
use std::ops::Range;

pub mod memory;
pub mod shuffle;

pub use memory::InMemoryDataset;
pub use shuffle::ShuffledBatches;

/// A source of feature rows and targets.
pub trait Dataset {
    /// Number of rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of feature columns per row.
    fn n_features(&self) -> usize;

    /// Rows `range` as tensors.
    fn get_batch<B: Backend>(&self, range: Range<usize>) -> Result<(Tensor2D<B>, Tensor1D<B>)>;

    /// Arbitrary rows, in the order given.
    fn get_rows<B: Backend>(&self, rows: &[usize]) -> Result<(Tensor2D<B>, Tensor1D<B>)>;

    /// Consecutive batches of `batch_size` rows; the last one may be shorter.
    fn batches<B: Backend>(&self, batch_size: usize) -> DatasetBatchIter<'_, B, Self>
    where
        Self: Sized,
    {
        DatasetBatchIter {
            dataset: self,
            batch_size: batch_size.max(1),
            current: 0,
            _backend: PhantomData,
        }
    }
}

/// Iterator returned by [`Dataset::batches`].
pub struct DatasetBatchIter<'a, B: Backend, D: ?Sized> {
    dataset: &'a D,
    batch_size: usize,
    current: usize,
    _backend: PhantomData<B>,
}

impl<B: Backend, D: Dataset> Iterator for DatasetBatchIter<'_, B, D> {
    type Item = Result<(Tensor2D<B>, Tensor1D<B>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.dataset.len();
        if self.current >= total {
            return None;
        }
        let end = (self.current + self.batch_size).min(total);
        let range = self.current..end;
        self.current = end;
        Some(self.dataset.get_batch::<B>(range))
    }
}
