//! Models with the training state encoded in their type.
//!
//! A model is built as `Model<B, Unfitted>`, trained through
//! [`TrainableModel`], and converted into `Model<B, Fitted>`, which only
//! implements [`InferenceModel`]. Fitted models carry no optimizer state or
//! training hyperparameters (dropout is a training-only concern).
//!
//! - [`mlp::FeedForwardNet`]: sigmoid feed-forward network used for both the
//!   boost and the inference stage.
//! - [`linear::LinearModel`]: logistic-link linear model, produced by the
//!   Fisher discriminant.

pub mod linear;
pub mod mlp;
pub mod state;

pub use linear::{LinearModel, LinearParams};
pub use mlp::{DenseParams, FeedForwardNet, MlpParams};
pub use state::{Fitted, Unfitted};

use crate::backend::{Backend, Scalar};
use crate::error::Result;
use crate::serialization::{load_bincode, save_bincode};
use rand::Rng;
use std::path::Path;

/// Training-time interface.
///
/// `forward_train` returns, next to the prediction, whatever the backward
/// pass needs (layer inputs, activations, dropout masks). Stochastic layers
/// draw from the supplied RNG so runs are reproducible from a seed.
pub trait TrainableModel<B: Backend> {
    type Input;
    type Prediction;
    type Params;
    type Gradients;
    type Output;
    type Trace;

    /// Deterministic forward pass.
    fn forward(&self, input: &Self::Input) -> Self::Prediction;

    fn forward_train<R: Rng + ?Sized>(
        &self,
        input: &Self::Input,
        rng: &mut R,
    ) -> (Self::Prediction, Self::Trace);

    /// Gradients of the loss w.r.t. the parameters, given `∂L/∂prediction`.
    fn backward(&self, trace: &Self::Trace, grad_output: &Self::Prediction) -> Self::Gradients;

    fn params(&self) -> &Self::Params;

    fn update_params(&mut self, new_params: &Self::Params);

    fn into_fitted(self) -> Self::Output;

    /// Fitted copy of the current parameters, for checkpoints.
    fn snapshot(&self) -> Self::Output;
}

/// Element-wise arithmetic over a parameter set, as needed by optimizers.
pub trait ParamOps<B: Backend>: Clone {
    fn add(&self, other: &Self) -> Self;
    fn scale(&self, scalar: Scalar<B>) -> Self;
    fn mul(&self, other: &Self) -> Self;
    fn div(&self, other: &Self) -> Self;
    fn sqrt(&self) -> Self;
    fn add_scalar(&self, scalar: Scalar<B>) -> Self;
}

/// Prediction interface of fitted models.
pub trait InferenceModel<B: Backend>: Sized {
    type InputSingle;
    type OutputSingle;
    type InputBatch;
    type OutputBatch;
    /// Host-side parameter representation written to disk.
    type ParamsRepr: serde::Serialize + for<'de> serde::Deserialize<'de>;

    fn predict(&self, input: &Self::InputSingle) -> Self::OutputSingle;

    fn predict_batch(&self, input: &Self::InputBatch) -> Self::OutputBatch;

    fn extract_params(&self) -> Self::ParamsRepr;

    fn from_params(params: Self::ParamsRepr) -> Result<Self>;

    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_bincode(&self.extract_params(), path.as_ref())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_params(load_bincode(path.as_ref())?)
    }
}
