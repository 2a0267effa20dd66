use super::Dataset;
use crate::backend::{Backend, Tensor1D, Tensor2D};
use crate::error::{QgError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::marker::PhantomData;

/// Endless stream of shuffled mini-batches.
///
/// The row order is reshuffled at the start of every pass over the data.
/// Only full batches are produced: rows left over at the end of a pass are
/// skipped for that pass.
pub struct ShuffledBatches<'a, B: Backend, D> {
    dataset: &'a D,
    batch_size: usize,
    order: Vec<usize>,
    pos: usize,
    epoch: usize,
    rng: StdRng,
    _backend: PhantomData<B>,
}

impl<'a, B: Backend, D: Dataset> ShuffledBatches<'a, B, D> {
    pub fn new(dataset: &'a D, batch_size: usize, seed: u64) -> Result<Self> {
        if batch_size == 0 {
            return Err(QgError::InvalidParameter("batch size must be positive".into()));
        }
        if dataset.len() < batch_size {
            return Err(QgError::InvalidParameter(format!(
                "dataset has {} rows, fewer than one batch of {batch_size}",
                dataset.len()
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        order.shuffle(&mut rng);
        Ok(Self {
            dataset,
            batch_size,
            order,
            pos: 0,
            epoch: 0,
            rng,
            _backend: PhantomData,
        })
    }

    /// Completed passes over the data.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Row indices of the next batch.
    pub fn next_indices(&mut self) -> &[usize] {
        if self.pos + self.batch_size > self.order.len() {
            self.order.shuffle(&mut self.rng);
            self.pos = 0;
            self.epoch += 1;
        }
        let start = self.pos;
        self.pos += self.batch_size;
        &self.order[start..self.pos]
    }
}

impl<B: Backend, D: Dataset> Iterator for ShuffledBatches<'_, B, D> {
    type Item = Result<(Tensor2D<B>, Tensor1D<B>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let dataset = self.dataset;
        let rows = self.next_indices().to_vec();
        Some(dataset.get_rows::<B>(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::dataset::InMemoryDataset;
    use std::collections::HashSet;

    fn ds(n: usize) -> InMemoryDataset {
        InMemoryDataset::new((0..n).map(|i| i as f32).collect(), 1, vec![0.0; n]).unwrap()
    }

    #[test]
    fn test_rejects_dataset_smaller_than_batch() {
        let d = ds(3);
        assert!(ShuffledBatches::<CpuBackend, _>::new(&d, 4, 0).is_err());
        assert!(ShuffledBatches::<CpuBackend, _>::new(&d, 0, 0).is_err());
        assert!(ShuffledBatches::<CpuBackend, _>::new(&d, 3, 0).is_ok());
    }

    #[test]
    fn test_each_pass_is_a_permutation() {
        let d = ds(10);
        let mut it = ShuffledBatches::<CpuBackend, _>::new(&d, 5, 7).unwrap();
        let mut seen = HashSet::new();
        for _ in 0..2 {
            let (x, _) = it.next().unwrap().unwrap();
            assert_eq!(x.shape(), (5, 1));
            seen.extend(x.to_vec().into_iter().map(|v| v as usize));
        }
        assert_eq!(seen.len(), 10);
        assert_eq!(it.epoch(), 0);
        it.next().unwrap().unwrap();
        assert_eq!(it.epoch(), 1);
    }

    #[test]
    fn test_only_full_batches() {
        let d = ds(7);
        let it = ShuffledBatches::<CpuBackend, _>::new(&d, 3, 1).unwrap();
        for batch in it.take(20) {
            assert_eq!(batch.unwrap().1.len(), 3);
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let d = ds(50);
        let mut a = ShuffledBatches::<CpuBackend, _>::new(&d, 10, 42).unwrap();
        let mut b = ShuffledBatches::<CpuBackend, _>::new(&d, 10, 42).unwrap();
        for _ in 0..8 {
            assert_eq!(a.next_indices().to_vec(), b.next_indices().to_vec());
        }
    }
}
