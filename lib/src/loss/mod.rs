//! Differentiable losses on predicted probabilities.

use crate::backend::{Backend, Scalar, Tensor1D};

/// A per-sample weighted loss.
///
/// `grad_wrt_prediction` returns `∂L/∂prediction`, which is handed to the
/// model's backward pass.
pub trait Loss<B: Backend> {
    fn loss(&self, prediction: &Tensor1D<B>, target: &Tensor1D<B>, weights: &Tensor1D<B>)
        -> Scalar<B>;

    fn grad_wrt_prediction(
        &self,
        prediction: &Tensor1D<B>,
        target: &Tensor1D<B>,
        weights: &Tensor1D<B>,
    ) -> Tensor1D<B>;
}

/// Weighted binary cross-entropy on probabilities:
///
/// ```text
/// L = -Σ wᵢ (yᵢ ln(pᵢ + ε) + (1 - yᵢ) ln(1 - pᵢ + ε)) / Σ wᵢ
/// ```
///
/// `ε` keeps the logarithms finite for saturated outputs.
#[derive(Debug, Clone, Copy)]
pub struct WeightedBinaryCrossEntropy {
    pub epsilon: f64,
}

impl Default for WeightedBinaryCrossEntropy {
    fn default() -> Self {
        Self { epsilon: 1e-5 }
    }
}

impl WeightedBinaryCrossEntropy {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }
}

impl<B: Backend> Loss<B> for WeightedBinaryCrossEntropy {
    fn loss(&self, p: &Tensor1D<B>, y: &Tensor1D<B>, w: &Tensor1D<B>) -> Scalar<B> {
        let eps = Scalar::new(self.epsilon);
        let log_p = p.add_scalar(&eps).log();
        let log_q = p.one_minus().add_scalar(&eps).log();
        let ll = y.mul(&log_p).add(&y.one_minus().mul(&log_q));
        Scalar::new(-1.0) * w.dot(&ll) / w.sum()
    }

    fn grad_wrt_prediction(&self, p: &Tensor1D<B>, y: &Tensor1D<B>, w: &Tensor1D<B>) -> Tensor1D<B> {
        let eps = Scalar::new(self.epsilon);
        let pos = y.div(&p.add_scalar(&eps));
        let neg = y.one_minus().div(&p.one_minus().add_scalar(&eps));
        let norm = Scalar::new(-1.0) / w.sum();
        w.mul(&pos.sub(&neg)).scale(&norm)
    }
}
