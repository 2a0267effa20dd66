//! Iteration-based training loop.
//!
//! A [`Trainer`] draws shuffled mini-batches, weights them with a
//! [`SampleWeighting`], and applies one optimizer step per batch. The loss
//! is logged every `log_every` steps; checkpoints of the model are written
//! every `checkpoint_every` steps and after the last one.

use crate::{
    backend::{Backend, Tensor1D, Tensor2D},
    dataset::{Dataset, ShuffledBatches},
    error::{QgError, Result},
    loss::Loss,
    model::{InferenceModel, ParamOps, TrainableModel},
    optimizer::Optimizer,
    weighting::SampleWeighting,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the file pointing at the most recent checkpoint in a directory.
pub const CHECKPOINT_POINTER: &str = "checkpoint";

/// Logged losses of one training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// `(step, loss)` pairs.
    pub losses: Vec<(usize, f64)>,
    /// Checkpoint files written, oldest first.
    pub checkpoints: Vec<PathBuf>,
}

impl TrainingHistory {
    pub fn last_loss(&self) -> Option<f64> {
        self.losses.last().map(|&(_, l)| l)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Training loop configuration plus the loss and optimizer prototypes.
///
/// The optimizer is cloned at the start of every [`fit`](Trainer::fit), so a
/// trainer can be reused for several models.
pub struct Trainer<B, L, O, M, P>
where
    B: Backend,
    L: Loss<B>,
    M: TrainableModel<B, Params = P, Gradients = P>,
    O: Optimizer<B, P>,
{
    pub(crate) batch_size: usize,
    pub(crate) iterations: usize,
    pub(crate) log_every: usize,
    pub(crate) checkpoint_every: usize,
    pub(crate) checkpoint_dir: Option<PathBuf>,
    pub(crate) prefix: String,
    pub(crate) seed: u64,
    pub(crate) verbose: bool,
    pub(crate) loss_fn: L,
    pub(crate) optimizer: O,
    _phantom_backend: PhantomData<B>,
    _phantom_model: PhantomData<M>,
}

/// Fluent builder for [`Trainer`].
///
/// Defaults:
/// - `batch_size`: 100
/// - `iterations`: 100 000
/// - `log_every`: 500
/// - `checkpoint_every`: 10 000
/// - no checkpoint directory, prefix `model`, seed 0, verbose
pub struct TrainerBuilder<B, L, O, M, P>
where
    B: Backend,
    L: Loss<B>,
    M: TrainableModel<B, Params = P, Gradients = P>,
    O: Optimizer<B, P>,
{
    trainer: Trainer<B, L, O, M, P>,
}

impl<B, L, O, M, P> TrainerBuilder<B, L, O, M, P>
where
    B: Backend,
    L: Loss<B>,
    M: TrainableModel<B, Params = P, Gradients = P>,
    O: Optimizer<B, P>,
{
    pub fn new(loss_fn: L, optimizer: O) -> Self {
        Self {
            trainer: Trainer {
                batch_size: 100,
                iterations: 100_000,
                log_every: 500,
                checkpoint_every: 10_000,
                checkpoint_dir: None,
                prefix: "model".to_string(),
                seed: 0,
                verbose: true,
                loss_fn,
                optimizer,
                _phantom_backend: PhantomData,
                _phantom_model: PhantomData,
            },
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.trainer.batch_size = size;
        self
    }

    pub fn iterations(mut self, n: usize) -> Self {
        self.trainer.iterations = n;
        self
    }

    /// Steps between loss logs; 0 disables logging.
    pub fn log_every(mut self, n: usize) -> Self {
        self.trainer.log_every = n;
        self
    }

    /// Steps between checkpoints; 0 keeps only the final one.
    pub fn checkpoint_every(mut self, n: usize) -> Self {
        self.trainer.checkpoint_every = n;
        self
    }

    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trainer.checkpoint_dir = Some(dir.into());
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.trainer.prefix = prefix.to_string();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.trainer.seed = seed;
        self
    }

    /// When `false`, loss lines are logged at debug instead of info level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.trainer.verbose = verbose;
        self
    }

    pub fn build(self) -> Trainer<B, L, O, M, P> {
        self.trainer
    }
}

impl<B, L, O, M, P> Trainer<B, L, O, M, P>
where
    B: Backend,
    L: Loss<B>,
    M: TrainableModel<B, Params = P, Gradients = P>,
    O: Optimizer<B, P>,
{
    pub fn builder(loss_fn: L, optimizer: O) -> TrainerBuilder<B, L, O, M, P> {
        TrainerBuilder::new(loss_fn, optimizer)
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn is_checkpoint_step(&self, step: usize) -> bool {
        let last = step + 1 == self.iterations;
        let periodic = self.checkpoint_every > 0 && (step + 1) % self.checkpoint_every == 0;
        last || periodic
    }

    fn checkpoint_path(&self, dir: &Path, step: usize) -> PathBuf {
        dir.join(format!("{}-{step}.bin", self.prefix))
    }
}

impl<B, L, O, M, P> Trainer<B, L, O, M, P>
where
    B: Backend,
    L: Loss<B>,
    M: TrainableModel<
        B,
        Input = Tensor2D<B>,
        Prediction = Tensor1D<B>,
        Params = P,
        Gradients = P,
    >,
    M::Output: InferenceModel<B>,
    O: Optimizer<B, P> + Clone,
    P: ParamOps<B>,
{
    /// Trains `model` for the configured number of iterations.
    ///
    /// # Errors
    /// - the dataset holds fewer rows than one batch
    /// - the loss becomes non-finite
    /// - a checkpoint cannot be written
    pub fn fit<D: Dataset>(
        &self,
        mut model: M,
        dataset: &D,
        weighting: &dyn SampleWeighting<B>,
    ) -> Result<(M::Output, TrainingHistory)> {
        let mut batches = ShuffledBatches::<B, D>::new(dataset, self.batch_size, self.seed)?;
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        let mut optimizer = self.optimizer.clone();
        let mut history = TrainingHistory::default();

        if let Some(dir) = &self.checkpoint_dir {
            std::fs::create_dir_all(dir)?;
        }
        info!(
            rows = dataset.len(),
            features = dataset.n_features(),
            batch_size = self.batch_size,
            iterations = self.iterations,
            "start training"
        );

        for step in 0..self.iterations {
            let (x, y) = match batches.next() {
                Some(batch) => batch?,
                None => return Err(QgError::EmptyData("batch stream exhausted".into())),
            };
            let w = weighting.weights(&x, &y);
            let (p, trace) = model.forward_train(&x, &mut rng);

            if self.log_every > 0 && step % self.log_every == 0 {
                let loss = self.loss_fn.loss(&p, &y, &w).to_f64();
                if !loss.is_finite() {
                    return Err(QgError::Numerical(format!("loss is {loss} at step {step}")));
                }
                if self.verbose {
                    info!(step, loss, "training");
                } else {
                    debug!(step, loss, "training");
                }
                history.losses.push((step, loss));
            }

            let grad = self.loss_fn.grad_wrt_prediction(&p, &y, &w);
            let grads = model.backward(&trace, &grad);
            let next = optimizer.step(model.params(), &grads);
            model.update_params(&next);

            if let Some(dir) = &self.checkpoint_dir {
                if self.is_checkpoint_step(step) {
                    let path = self.checkpoint_path(dir, step);
                    model.snapshot().save_to_file(&path)?;
                    write_checkpoint_pointer(dir, &path)?;
                    info!("Save model {}", path.display());
                    history.checkpoints.push(path);
                }
            }
        }

        Ok((model.into_fitted(), history))
    }
}

fn write_checkpoint_pointer(dir: &Path, checkpoint: &Path) -> Result<()> {
    let name = checkpoint
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    std::fs::write(dir.join(CHECKPOINT_POINTER), format!("{name}\n"))?;
    Ok(())
}

/// Most recent checkpoint recorded in `dir`, if any.
pub fn latest_checkpoint(dir: &Path) -> Result<Option<PathBuf>> {
    let pointer = dir.join(CHECKPOINT_POINTER);
    if !pointer.exists() {
        return Ok(None);
    }
    let name = std::fs::read_to_string(pointer)?;
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    Ok(Some(dir.join(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::dataset::InMemoryDataset;
    use crate::loss::WeightedBinaryCrossEntropy;
    use crate::model::{FeedForwardNet, Fitted, LinearModel, LinearParams, MlpParams, Unfitted};
    use crate::optimizer::{Adam, SGD};
    use crate::weighting::UniformWeights;

    type B = CpuBackend;
    type Net = FeedForwardNet<B, Unfitted>;

    /// Two well-separated 2D clusters, label 1 for `x0 + x1 > 0`.
    fn clusters(n: usize) -> InMemoryDataset {
        let mut x = Vec::with_capacity(2 * n);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            let jitter = (i % 7) as f32 * 0.05;
            x.extend_from_slice(&[sign * (1.0 + jitter), sign * (0.8 - jitter)]);
            y.push(if sign > 0.0 { 1.0 } else { 0.0 });
        }
        InMemoryDataset::new(x, 2, y).unwrap()
    }

    fn accuracy(p: &[f64], y: &[f32]) -> f64 {
        let hits = p
            .iter()
            .zip(y)
            .filter(|(p, y)| (**p > 0.5) == (**y > 0.5))
            .count();
        hits as f64 / y.len() as f64
    }

    #[test]
    fn test_builder_defaults() {
        let t = TrainerBuilder::<B, _, _, Net, MlpParams<B>>::new(
            WeightedBinaryCrossEntropy::default(),
            Adam::<B, MlpParams<B>>::default(),
        )
        .build();
        assert_eq!(t.batch_size, 100);
        assert_eq!(t.iterations, 100_000);
        assert_eq!(t.log_every, 500);
        assert_eq!(t.checkpoint_every, 10_000);
        assert!(t.checkpoint_dir.is_none());
        assert_eq!(t.prefix, "model");
    }

    #[test]
    fn test_checkpoint_schedule() {
        let t = TrainerBuilder::<B, _, _, Net, MlpParams<B>>::new(
            WeightedBinaryCrossEntropy::default(),
            Adam::<B, MlpParams<B>>::default(),
        )
        .iterations(25)
        .checkpoint_every(10)
        .build();
        let steps: Vec<usize> = (0..25).filter(|&s| t.is_checkpoint_step(s)).collect();
        assert_eq!(steps, vec![9, 19, 24]);
    }

    #[test]
    fn test_fit_network_separates_clusters() {
        let data = clusters(200);
        let trainer = Trainer::<B, _, _, Net, MlpParams<B>>::builder(
            WeightedBinaryCrossEntropy::default(),
            Adam::new(0.01),
        )
            .batch_size(20)
            .iterations(600)
            .log_every(50)
            .seed(3)
            .verbose(false)
            .build();
        let (fitted, history) = trainer
            .fit(Net::new(2, &[8], 1).unwrap(), &data, &UniformWeights)
            .unwrap();

        assert_eq!(history.losses.len(), 12);
        let first = history.losses[0].1;
        let last = history.last_loss().unwrap();
        assert!(last < first, "loss did not decrease: {first} -> {last}");

        let (x, y) = data.get_batch::<B>(0..data.len()).unwrap();
        let p = fitted.predict_batch(&x).to_vec();
        let y: Vec<f32> = y.to_vec().into_iter().map(|v| v as f32).collect();
        assert!(accuracy(&p, &y) > 0.95);
    }

    #[test]
    fn test_fit_logistic_regression_with_sgd() {
        let data = clusters(100);
        let trainer = Trainer::<B, _, _, LinearModel<B, Unfitted>, LinearParams<B>>::builder(
            WeightedBinaryCrossEntropy::default(),
            SGD::new(0.5),
        )
            .batch_size(10)
            .iterations(300)
            .log_every(0)
            .build();
        let (fitted, history) = trainer
            .fit(LinearModel::<B, Unfitted>::zeros(2), &data, &UniformWeights)
            .unwrap();
        assert!(history.losses.is_empty());
        let w = fitted.params().weights.to_vec();
        assert!(w[0] > 0.0 && w[1] > 0.0);
    }

    #[test]
    fn test_checkpoints_written_and_reloadable() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("boost");
        let data = clusters(40);
        let trainer = Trainer::<B, _, _, Net, MlpParams<B>>::builder(
            WeightedBinaryCrossEntropy::default(),
            Adam::new(1e-3),
        )
            .batch_size(10)
            .iterations(25)
            .checkpoint_every(10)
            .checkpoint_dir(&dir)
            .prefix("boost")
            .build();
        let (fitted, history) = trainer
            .fit(Net::new(2, &[4], 0).unwrap(), &data, &UniformWeights)
            .unwrap();

        for step in [9, 19, 24] {
            assert!(dir.join(format!("boost-{step}.bin")).exists());
        }
        assert_eq!(history.checkpoints.len(), 3);
        let latest = latest_checkpoint(&dir).unwrap().unwrap();
        assert_eq!(latest, dir.join("boost-24.bin"));

        let reloaded = FeedForwardNet::<B, Fitted>::load_from_file(&latest).unwrap();
        let (x, _) = data.get_batch::<B>(0..5).unwrap();
        let a = fitted.predict_batch(&x).to_vec();
        let b = reloaded.predict_batch(&x).to_vec();
        for (a, b) in a.iter().zip(&b) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_latest_checkpoint_missing_pointer() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(latest_checkpoint(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_fit_rejects_dataset_smaller_than_batch() {
        let data = clusters(5);
        let trainer = Trainer::<B, _, _, Net, MlpParams<B>>::builder(
            WeightedBinaryCrossEntropy::default(),
            Adam::new(1e-3),
        )
            .batch_size(10)
            .iterations(1)
            .build();
        assert!(trainer
            .fit(Net::new(2, &[4], 0).unwrap(), &data, &UniformWeights)
            .is_err());
    }

    #[test]
    fn test_history_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.json");
        let h = TrainingHistory {
            losses: vec![(0, 0.7), (500, 0.4)],
            checkpoints: vec![],
        };
        h.save_json(&path).unwrap();
        let back: TrainingHistory =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, h);
    }
}
