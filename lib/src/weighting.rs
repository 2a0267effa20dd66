//! Per-sample training weights.
//!
//! The weighted loss takes one weight per jet of a batch. Weightings are
//! composable: the inference stage multiplies the boost reweighting with a
//! class balance.

use crate::backend::{Backend, Scalar, Tensor1D, Tensor2D};
use crate::error::{QgError, Result};
use crate::model::{FeedForwardNet, Fitted, InferenceModel};

pub trait SampleWeighting<B: Backend> {
    /// Weights for a batch with features `x` and targets `y`.
    fn weights(&self, x: &Tensor2D<B>, y: &Tensor1D<B>) -> Tensor1D<B>;
}

/// Every sample weighs 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformWeights;

impl<B: Backend> SampleWeighting<B> for UniformWeights {
    fn weights(&self, _x: &Tensor2D<B>, y: &Tensor1D<B>) -> Tensor1D<B> {
        Tensor1D::filled(y.len(), 1.0)
    }
}

/// Compensates an unbalanced signal fraction `f`.
///
/// Label-1 samples weigh `½(1 + (1-f)/f)`, label-0 samples `½(1 + f/(1-f))`,
/// so both classes contribute equally to the loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassBalance {
    signal_fraction: f64,
}

impl ClassBalance {
    pub fn new(signal_fraction: f64) -> Result<Self> {
        if !(signal_fraction > 0.0 && signal_fraction < 1.0) {
            return Err(QgError::InvalidParameter(format!(
                "signal fraction {signal_fraction} not in (0, 1)"
            )));
        }
        Ok(Self { signal_fraction })
    }

    /// Balance for the fraction of positive `targets`.
    pub fn from_targets(targets: &[f32]) -> Result<Self> {
        if targets.is_empty() {
            return Err(QgError::EmptyData("no targets to measure a class fraction".into()));
        }
        let positives = targets.iter().filter(|&&t| t > 0.5).count();
        Self::new(positives as f64 / targets.len() as f64)
    }

    pub fn signal_fraction(&self) -> f64 {
        self.signal_fraction
    }

    pub fn signal_weight(&self) -> f64 {
        let f = self.signal_fraction;
        0.5 * (1.0 + (1.0 - f) / f)
    }

    pub fn background_weight(&self) -> f64 {
        let f = self.signal_fraction;
        0.5 * (1.0 + f / (1.0 - f))
    }
}

impl<B: Backend> SampleWeighting<B> for ClassBalance {
    fn weights(&self, _x: &Tensor2D<B>, y: &Tensor1D<B>) -> Tensor1D<B> {
        let ws = self.signal_weight();
        let wb = self.background_weight();
        // y·ws + (1-y)·wb
        y.scale(&Scalar::new(ws - wb)).add_scalar(&Scalar::new(wb))
    }
}

/// Importance weights from a fitted boost network: `w = (p+ε)/(1-p+ε)`.
///
/// `p` estimates the probability that a jet comes from the modified
/// simulation, so `w` approximates the density ratio modified/standard.
pub struct BoostReweighting<B: Backend> {
    net: FeedForwardNet<B, Fitted>,
    epsilon: f64,
}

impl<B: Backend> BoostReweighting<B> {
    pub fn new(net: FeedForwardNet<B, Fitted>, epsilon: f64) -> Self {
        Self { net, epsilon }
    }

    pub fn network(&self) -> &FeedForwardNet<B, Fitted> {
        &self.net
    }

    pub fn ratio(&self, p: &Tensor1D<B>) -> Tensor1D<B> {
        let eps = Scalar::new(self.epsilon);
        p.add_scalar(&eps).div(&p.one_minus().add_scalar(&eps))
    }
}

impl<B: Backend> SampleWeighting<B> for BoostReweighting<B> {
    fn weights(&self, x: &Tensor2D<B>, _y: &Tensor1D<B>) -> Tensor1D<B> {
        self.ratio(&self.net.predict_batch(x))
    }
}

/// Element-wise product of several weightings.
pub struct Product<B: Backend>(pub Vec<Box<dyn SampleWeighting<B>>>);

impl<B: Backend> SampleWeighting<B> for Product<B> {
    fn weights(&self, x: &Tensor2D<B>, y: &Tensor1D<B>) -> Tensor1D<B> {
        self.0
            .iter()
            .fold(Tensor1D::filled(y.len(), 1.0), |acc, w| acc.mul(&w.weights(x, y)))
    }
}
