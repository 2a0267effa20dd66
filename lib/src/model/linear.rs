//! Linear model with a logistic link: `p = σ(w·x + b)`.
//!
//! [`LinearModel<B, Fitted>`] is what the Fisher discriminant produces.
//! The unfitted form is trainable with the same [`Trainer`] as the network,
//! which makes it a logistic-regression baseline.
//!
//! [`Trainer`]: crate::trainer::Trainer

use super::{Fitted, InferenceModel, ParamOps, TrainableModel, Unfitted};
use crate::backend::{Backend, Scalar, Tensor1D, Tensor2D};
use crate::error::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

#[derive(Clone)]
pub struct LinearParams<B: Backend> {
    pub weights: Tensor1D<B>,
    pub bias: Scalar<B>,
}

/// On-disk form of [`LinearParams`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableLinearParams {
    pub weights: Vec<f32>,
    pub bias: f32,
}

impl<B: Backend> From<&LinearParams<B>> for SerializableLinearParams {
    fn from(params: &LinearParams<B>) -> Self {
        Self {
            weights: params.weights.to_vec().into_iter().map(|x| x as f32).collect(),
            bias: params.bias.to_f64() as f32,
        }
    }
}

impl<B: Backend> From<SerializableLinearParams> for LinearParams<B> {
    fn from(value: SerializableLinearParams) -> Self {
        Self {
            weights: Tensor1D::new(value.weights),
            bias: Scalar::new(value.bias as f64),
        }
    }
}

impl<B: Backend> ParamOps<B> for LinearParams<B> {
    fn add(&self, other: &Self) -> Self {
        Self {
            weights: self.weights.add(&other.weights),
            bias: self.bias + other.bias,
        }
    }

    fn scale(&self, scalar: Scalar<B>) -> Self {
        Self {
            weights: self.weights.scale(&scalar),
            bias: self.bias * scalar,
        }
    }

    fn mul(&self, other: &Self) -> Self {
        Self {
            weights: self.weights.mul(&other.weights),
            bias: self.bias * other.bias,
        }
    }

    fn div(&self, other: &Self) -> Self {
        Self {
            weights: self.weights.div(&other.weights),
            bias: self.bias / other.bias,
        }
    }

    fn sqrt(&self) -> Self {
        Self {
            weights: self.weights.sqrt(),
            bias: self.bias.sqrt(),
        }
    }

    fn add_scalar(&self, scalar: Scalar<B>) -> Self {
        Self {
            weights: self.weights.add_scalar(&scalar),
            bias: self.bias + scalar,
        }
    }
}

pub struct LinearModel<B: Backend, S> {
    params: LinearParams<B>,
    _state: PhantomData<S>,
}

impl<B: Backend, S> LinearModel<B, S> {
    pub fn n_features(&self) -> usize {
        self.params.weights.len()
    }

    fn probabilities(&self, x: &Tensor2D<B>) -> Tensor1D<B> {
        x.dot(&self.params.weights)
            .add_scalar(&self.params.bias)
            .sigmoid()
    }
}

impl<B: Backend> LinearModel<B, Fitted> {
    pub fn new(params: LinearParams<B>) -> Self {
        Self {
            params,
            _state: PhantomData,
        }
    }

    pub fn params(&self) -> &LinearParams<B> {
        &self.params
    }

    /// The discriminant `w·x + b` before the logistic link.
    pub fn decision_function(&self, x: &Tensor2D<B>) -> Tensor1D<B> {
        x.dot(&self.params.weights).add_scalar(&self.params.bias)
    }
}

impl<B: Backend> LinearModel<B, Unfitted> {
    /// Zero-initialised model over `n_features` inputs.
    pub fn zeros(n_features: usize) -> Self {
        Self {
            params: LinearParams {
                weights: Tensor1D::zeros(n_features),
                bias: Scalar::new(0.0),
            },
            _state: PhantomData,
        }
    }
}

impl<B: Backend> InferenceModel<B> for LinearModel<B, Fitted> {
    type InputSingle = Tensor1D<B>;
    type OutputSingle = Scalar<B>;
    type InputBatch = Tensor2D<B>;
    type OutputBatch = Tensor1D<B>;
    type ParamsRepr = SerializableLinearParams;

    fn predict(&self, input: &Tensor1D<B>) -> Scalar<B> {
        let z = self.params.weights.dot(input) + self.params.bias;
        Scalar::new(1.0 / (1.0 + (-z.to_f64()).exp()))
    }

    fn predict_batch(&self, input: &Tensor2D<B>) -> Tensor1D<B> {
        self.probabilities(input)
    }

    fn extract_params(&self) -> SerializableLinearParams {
        (&self.params).into()
    }

    fn from_params(params: SerializableLinearParams) -> Result<Self> {
        Ok(Self::new(params.into()))
    }
}

/// Forward: `σ(Xw + b)`. Backward: `∂z = g ⊙ p(1-p)`, `∇w = Xᵀ∂z`, `∇b = Σ∂z`.
impl<B: Backend> TrainableModel<B> for LinearModel<B, Unfitted> {
    type Input = Tensor2D<B>;
    type Prediction = Tensor1D<B>;
    type Params = LinearParams<B>;
    type Gradients = LinearParams<B>;
    type Output = LinearModel<B, Fitted>;
    type Trace = (Tensor2D<B>, Tensor1D<B>);

    fn forward(&self, x: &Tensor2D<B>) -> Tensor1D<B> {
        self.probabilities(x)
    }

    fn forward_train<R: Rng + ?Sized>(
        &self,
        x: &Tensor2D<B>,
        _rng: &mut R,
    ) -> (Tensor1D<B>, Self::Trace) {
        let p = self.probabilities(x);
        (p.clone(), (x.clone(), p))
    }

    fn backward(&self, (x, p): &Self::Trace, grad_output: &Tensor1D<B>) -> LinearParams<B> {
        let dz = grad_output.mul(&p.mul(&p.one_minus()));
        LinearParams {
            weights: x.tmatmul(&dz.to_column()).ravel(),
            bias: dz.sum(),
        }
    }

    fn params(&self) -> &LinearParams<B> {
        &self.params
    }

    fn update_params(&mut self, new_params: &LinearParams<B>) {
        self.params = new_params.clone();
    }

    fn into_fitted(self) -> LinearModel<B, Fitted> {
        LinearModel::new(self.params)
    }

    fn snapshot(&self) -> LinearModel<B, Fitted> {
        LinearModel::new(self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    fn params(w: &[f32], b: f64) -> LinearParams<CpuBackend> {
        LinearParams {
            weights: Tensor1D::new(w.to_vec()),
            bias: Scalar::new(b),
        }
    }

    #[test]
    fn test_param_ops() {
        let p = params(&[1.0, 4.0], 9.0);
        let q = params(&[0.5, 2.0], 3.0);
        assert_eq!(p.add(&q).weights.to_vec(), vec![1.5, 6.0]);
        assert_eq!(p.div(&q).bias.to_f64(), 3.0);
        assert_eq!(p.sqrt().weights.to_vec(), vec![1.0, 2.0]);
        assert_eq!(p.scale(Scalar::new(-1.0)).bias.to_f64(), -9.0);
        assert_eq!(p.mul(&q).weights.to_vec(), vec![0.5, 8.0]);
        assert_eq!(p.add_scalar(Scalar::new(1.0)).bias.to_f64(), 10.0);
    }

    #[test]
    fn test_fitted_logistic_link() {
        let m = LinearModel::<CpuBackend, Fitted>::new(params(&[1.0, -1.0], 0.0));
        let x = Tensor2D::new(vec![2.0, 2.0, 3.0, 1.0], 2, 2);
        let p = m.predict_batch(&x).to_vec();
        assert!((p[0] - 0.5).abs() < 1e-12);
        let expected = 1.0 / (1.0 + (-2.0f64).exp());
        assert!((p[1] - expected).abs() < 1e-12);
        let single = m.predict(&Tensor1D::new(vec![3.0, 1.0])).to_f64();
        assert!((single - expected).abs() < 1e-12);
        assert_eq!(m.decision_function(&x).to_vec(), vec![0.0, 2.0]);
    }

    #[test]
    fn test_backward_bias_gradient() {
        let m = LinearModel::<CpuBackend, Unfitted>::zeros(2);
        let x = Tensor2D::new(vec![1.0, 0.0, 0.0, 1.0], 2, 2);
        let mut rng = rand::thread_rng();
        let (p, trace) = m.forward_train(&x, &mut rng);
        assert_eq!(p.to_vec(), vec![0.5, 0.5]);
        let g = m.backward(&trace, &Tensor1D::new(vec![1.0, -1.0]));
        assert_eq!(g.weights.to_vec(), vec![0.25, -0.25]);
        assert_eq!(g.bias.to_f64(), 0.0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fisher.bin");
        let m = LinearModel::<CpuBackend, Fitted>::new(params(&[0.25, -2.0], 1.5));
        m.save_to_file(&path).unwrap();
        let loaded = LinearModel::<CpuBackend, Fitted>::load_from_file(&path).unwrap();
        assert_eq!(loaded.params().weights.to_vec(), vec![0.25, -2.0]);
        assert_eq!(loaded.params().bias.to_f64(), 1.5);
        assert_eq!(loaded.n_features(), 2);
    }
}
