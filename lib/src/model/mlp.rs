//! Dense sigmoid network.
//!
//! Every layer, including the single-unit output, applies a logistic
//! sigmoid, so the network maps a `(n, n_features)` batch to `n`
//! probabilities in `(0, 1)`.
//!
//! ```rust
//! use qg_tagger::backend::{CpuBackend, Tensor2D};
//! use qg_tagger::model::{FeedForwardNet, TrainableModel, Unfitted};
//!
//! let net = FeedForwardNet::<CpuBackend, Unfitted>::new(3, &[8, 8], 0).unwrap();
//! let x = Tensor2D::new(vec![0.1; 6], 2, 3);
//! let p = net.forward(&x).to_vec();
//! assert!(p.iter().all(|&v| v > 0.0 && v < 1.0));
//! ```

use super::{Fitted, InferenceModel, ParamOps, TrainableModel, Unfitted};
use crate::backend::{Backend, Scalar, Tensor1D, Tensor2D};
use crate::error::{QgError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Hidden layer widths of the baseline recipe.
pub const DEFAULT_HIDDEN: [usize; 4] = [200, 200, 200, 200];

/// Weights `(fan_in, fan_out)` and bias `(fan_out)` of one dense layer.
#[derive(Clone)]
pub struct DenseParams<B: Backend> {
    pub weights: Tensor2D<B>,
    pub bias: Tensor1D<B>,
}

impl<B: Backend> DenseParams<B> {
    fn zip(
        &self,
        other: &Self,
        f2: impl Fn(&Tensor2D<B>, &Tensor2D<B>) -> Tensor2D<B>,
        f1: impl Fn(&Tensor1D<B>, &Tensor1D<B>) -> Tensor1D<B>,
    ) -> Self {
        Self {
            weights: f2(&self.weights, &other.weights),
            bias: f1(&self.bias, &other.bias),
        }
    }

    fn map(
        &self,
        f2: impl Fn(&Tensor2D<B>) -> Tensor2D<B>,
        f1: impl Fn(&Tensor1D<B>) -> Tensor1D<B>,
    ) -> Self {
        Self {
            weights: f2(&self.weights),
            bias: f1(&self.bias),
        }
    }
}

/// All layer parameters, input layer first.
#[derive(Clone)]
pub struct MlpParams<B: Backend> {
    pub layers: Vec<DenseParams<B>>,
}

impl<B: Backend> ParamOps<B> for MlpParams<B> {
    fn add(&self, other: &Self) -> Self {
        self.zip_layers(other, |a, b| a.zip(b, Tensor2D::add, Tensor1D::add))
    }

    fn scale(&self, s: Scalar<B>) -> Self {
        self.map_layers(|l| l.map(|w| w.scale(&s), |b| b.scale(&s)))
    }

    fn mul(&self, other: &Self) -> Self {
        self.zip_layers(other, |a, b| a.zip(b, Tensor2D::mul, Tensor1D::mul))
    }

    fn div(&self, other: &Self) -> Self {
        self.zip_layers(other, |a, b| a.zip(b, Tensor2D::div, Tensor1D::div))
    }

    fn sqrt(&self) -> Self {
        self.map_layers(|l| l.map(Tensor2D::sqrt, Tensor1D::sqrt))
    }

    fn add_scalar(&self, s: Scalar<B>) -> Self {
        self.map_layers(|l| l.map(|w| w.add_scalar(&s), |b| b.add_scalar(&s)))
    }
}

impl<B: Backend> MlpParams<B> {
    fn zip_layers(
        &self,
        other: &Self,
        f: impl Fn(&DenseParams<B>, &DenseParams<B>) -> DenseParams<B>,
    ) -> Self {
        Self {
            layers: self
                .layers
                .iter()
                .zip(&other.layers)
                .map(|(a, b)| f(a, b))
                .collect(),
        }
    }

    fn map_layers(&self, f: impl Fn(&DenseParams<B>) -> DenseParams<B>) -> Self {
        Self {
            layers: self.layers.iter().map(f).collect(),
        }
    }
}

/// On-disk form of a dense layer.
///
/// Values are stored as `f32`, the precision of the input tables, while the
/// backends compute in `f64`. Saving a trained network therefore rounds each
/// parameter to the nearest `f32`; predictions of a reloaded network agree
/// to about 1e-6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseRepr {
    pub fan_in: usize,
    pub fan_out: usize,
    /// Row-major `(fan_in, fan_out)`.
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpRepr {
    pub layers: Vec<DenseRepr>,
}

impl<B: Backend> From<&MlpParams<B>> for MlpRepr {
    fn from(params: &MlpParams<B>) -> Self {
        let layers = params
            .layers
            .iter()
            .map(|l| {
                let (fan_in, fan_out) = l.weights.shape();
                DenseRepr {
                    fan_in,
                    fan_out,
                    weights: l.weights.to_vec().into_iter().map(|v| v as f32).collect(),
                    bias: l.bias.to_vec().into_iter().map(|v| v as f32).collect(),
                }
            })
            .collect();
        Self { layers }
    }
}

impl<B: Backend> TryFrom<MlpRepr> for MlpParams<B> {
    type Error = QgError;

    fn try_from(repr: MlpRepr) -> Result<Self> {
        if repr.layers.is_empty() {
            return Err(QgError::InvalidParameter("network has no layers".into()));
        }
        for (i, l) in repr.layers.iter().enumerate() {
            if l.weights.len() != l.fan_in * l.fan_out || l.bias.len() != l.fan_out {
                return Err(QgError::InvalidParameter(format!(
                    "layer {i}: {} weights and {} biases for shape {}x{}",
                    l.weights.len(),
                    l.bias.len(),
                    l.fan_in,
                    l.fan_out
                )));
            }
        }
        for pair in repr.layers.windows(2) {
            if pair[0].fan_out != pair[1].fan_in {
                return Err(QgError::FeatureMismatch {
                    expected: pair[0].fan_out,
                    got: pair[1].fan_in,
                });
            }
        }
        let last = repr.layers.len() - 1;
        if repr.layers[last].fan_out != 1 {
            return Err(QgError::InvalidParameter("output layer must have one unit".into()));
        }
        Ok(Self {
            layers: repr
                .layers
                .into_iter()
                .map(|l| DenseParams {
                    weights: Tensor2D::new(l.weights, l.fan_in, l.fan_out),
                    bias: Tensor1D::new(l.bias),
                })
                .collect(),
        })
    }
}

/// Normal draw with standard deviation `std`, redrawn beyond two deviations.
fn truncated_normal<R: Rng + ?Sized>(rng: &mut R, normal: &Normal<f64>, std: f64) -> f32 {
    loop {
        let v = normal.sample(rng);
        if v.abs() <= 2.0 * std {
            return v as f32;
        }
    }
}

fn init_layer<B: Backend, R: Rng + ?Sized>(
    rng: &mut R,
    fan_in: usize,
    fan_out: usize,
) -> Result<DenseParams<B>> {
    let std = 1.0 / (fan_in as f64).sqrt();
    let normal = Normal::new(0.0, std).map_err(|e| QgError::InvalidParameter(e.to_string()))?;
    let weights = (0..fan_in * fan_out)
        .map(|_| truncated_normal(rng, &normal, std))
        .collect();
    Ok(DenseParams {
        weights: Tensor2D::new(weights, fan_in, fan_out),
        bias: Tensor1D::zeros(fan_out),
    })
}

fn sigmoid_derivative<B: Backend>(s: &Tensor2D<B>) -> Tensor2D<B> {
    let one_minus = s.scale(&Scalar::new(-1.0)).add_scalar(&Scalar::new(1.0));
    s.mul(&one_minus)
}

/// What [`FeedForwardNet::forward_train`] keeps for the backward pass.
pub struct MlpTrace<B: Backend> {
    /// Input of every layer; `inputs[0]` is the batch.
    inputs: Vec<Tensor2D<B>>,
    /// Sigmoid output of every layer, before dropout.
    activations: Vec<Tensor2D<B>>,
    /// Scaled keep masks of the hidden layers when dropout is active.
    masks: Vec<Option<Tensor2D<B>>>,
}

/// Feed-forward sigmoid network.
pub struct FeedForwardNet<B: Backend, S> {
    params: MlpParams<B>,
    keep_prob: f64,
    _state: PhantomData<S>,
}

impl<B: Backend, S> Clone for FeedForwardNet<B, S> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            keep_prob: self.keep_prob,
            _state: PhantomData,
        }
    }
}

impl<B: Backend, S> FeedForwardNet<B, S> {
    /// Number of input features.
    pub fn n_features(&self) -> usize {
        self.params.layers.first().map_or(0, |l| l.weights.shape().0)
    }

    /// `[n_features, hidden..., 1]`.
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.n_features()];
        sizes.extend(self.params.layers.iter().map(|l| l.weights.shape().1));
        sizes
    }

    fn forward_eval(&self, x: &Tensor2D<B>) -> Tensor1D<B> {
        let mut a = x.clone();
        for layer in &self.params.layers {
            a = a.matmul(&layer.weights).add_row(&layer.bias).sigmoid();
        }
        a.ravel()
    }
}

impl<B: Backend> FeedForwardNet<B, Unfitted> {
    /// Network `[n_features, hidden..., 1]` with seeded truncated-normal
    /// weights of standard deviation `1/sqrt(fan_in)` and zero biases.
    pub fn new(n_features: usize, hidden: &[usize], seed: u64) -> Result<Self> {
        let mut sizes = vec![n_features];
        sizes.extend_from_slice(hidden);
        sizes.push(1);
        if sizes.contains(&0) {
            return Err(QgError::InvalidParameter(format!(
                "layer sizes must be positive: {sizes:?}"
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let layers = sizes
            .windows(2)
            .map(|w| init_layer(&mut rng, w[0], w[1]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            params: MlpParams { layers },
            keep_prob: 1.0,
            _state: PhantomData,
        })
    }

    /// Enables inverted dropout on hidden layers with keep probability `keep`.
    pub fn with_dropout(mut self, keep: f64) -> Result<Self> {
        if !(keep > 0.0 && keep <= 1.0) {
            return Err(QgError::InvalidParameter(format!(
                "keep probability {keep} not in (0, 1]"
            )));
        }
        self.keep_prob = keep;
        Ok(self)
    }

    pub fn keep_prob(&self) -> f64 {
        self.keep_prob
    }

    fn dropout_mask<R: Rng + ?Sized>(&self, rng: &mut R, rows: usize, cols: usize) -> Tensor2D<B> {
        let scale = (1.0 / self.keep_prob) as f32;
        let mask = (0..rows * cols)
            .map(|_| if rng.gen_bool(self.keep_prob) { scale } else { 0.0 })
            .collect();
        Tensor2D::new(mask, rows, cols)
    }
}

impl<B: Backend> TrainableModel<B> for FeedForwardNet<B, Unfitted> {
    type Input = Tensor2D<B>;
    type Prediction = Tensor1D<B>;
    type Params = MlpParams<B>;
    type Gradients = MlpParams<B>;
    type Output = FeedForwardNet<B, Fitted>;
    type Trace = MlpTrace<B>;

    fn forward(&self, x: &Tensor2D<B>) -> Tensor1D<B> {
        self.forward_eval(x)
    }

    fn forward_train<R: Rng + ?Sized>(
        &self,
        x: &Tensor2D<B>,
        rng: &mut R,
    ) -> (Tensor1D<B>, MlpTrace<B>) {
        let n_layers = self.params.layers.len();
        let mut trace = MlpTrace {
            inputs: Vec::with_capacity(n_layers),
            activations: Vec::with_capacity(n_layers),
            masks: Vec::with_capacity(n_layers),
        };
        let mut a = x.clone();
        for (i, layer) in self.params.layers.iter().enumerate() {
            let s = a.matmul(&layer.weights).add_row(&layer.bias).sigmoid();
            trace.inputs.push(a);
            let hidden = i + 1 < n_layers;
            if hidden && self.keep_prob < 1.0 {
                let (rows, cols) = s.shape();
                let mask = self.dropout_mask(rng, rows, cols);
                a = s.mul(&mask);
                trace.masks.push(Some(mask));
            } else {
                a = s.clone();
                trace.masks.push(None);
            }
            trace.activations.push(s);
        }
        (a.ravel(), trace)
    }

    fn backward(&self, trace: &MlpTrace<B>, grad_output: &Tensor1D<B>) -> MlpParams<B> {
        let mut grads = Vec::with_capacity(self.params.layers.len());
        let mut d_a = grad_output.to_column();
        for (i, layer) in self.params.layers.iter().enumerate().rev() {
            let d_s = match &trace.masks[i] {
                Some(mask) => d_a.mul(mask),
                None => d_a,
            };
            let d_z = d_s.mul(&sigmoid_derivative(&trace.activations[i]));
            grads.push(DenseParams {
                weights: trace.inputs[i].tmatmul(&d_z),
                bias: d_z.col_sum(),
            });
            d_a = d_z.matmul_t(&layer.weights);
        }
        grads.reverse();
        MlpParams { layers: grads }
    }

    fn params(&self) -> &MlpParams<B> {
        &self.params
    }

    fn update_params(&mut self, new_params: &MlpParams<B>) {
        self.params = new_params.clone();
    }

    fn into_fitted(self) -> FeedForwardNet<B, Fitted> {
        FeedForwardNet::from_trained(self.params)
    }

    fn snapshot(&self) -> FeedForwardNet<B, Fitted> {
        FeedForwardNet::from_trained(self.params.clone())
    }
}

impl<B: Backend> FeedForwardNet<B, Fitted> {
    fn from_trained(params: MlpParams<B>) -> Self {
        Self {
            params,
            keep_prob: 1.0,
            _state: PhantomData,
        }
    }
}

impl<B: Backend> InferenceModel<B> for FeedForwardNet<B, Fitted> {
    type InputSingle = Tensor1D<B>;
    type OutputSingle = Scalar<B>;
    type InputBatch = Tensor2D<B>;
    type OutputBatch = Tensor1D<B>;
    type ParamsRepr = MlpRepr;

    fn predict(&self, input: &Tensor1D<B>) -> Scalar<B> {
        self.forward_eval(&input.to_row()).sum()
    }

    fn predict_batch(&self, input: &Tensor2D<B>) -> Tensor1D<B> {
        self.forward_eval(input)
    }

    fn extract_params(&self) -> MlpRepr {
        (&self.params).into()
    }

    fn from_params(params: MlpRepr) -> Result<Self> {
        Ok(Self::from_trained(params.try_into()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    type Net = FeedForwardNet<CpuBackend, Unfitted>;

    fn batch() -> Tensor2D<CpuBackend> {
        Tensor2D::new(vec![0.5, -1.0, 2.0, 0.0, 1.5, -0.5], 3, 2)
    }

    /// Loss `Σ c_i p_i` so that `∂L/∂p = c`.
    fn linear_loss(p: &[f64], c: &[f64]) -> f64 {
        p.iter().zip(c).map(|(a, b)| a * b).sum()
    }

    #[test]
    fn test_topology_and_init() {
        let net = Net::new(5, &[4, 3], 1).unwrap();
        assert_eq!(net.layer_sizes(), vec![5, 4, 3, 1]);
        let first = &net.params().layers[0];
        let std = 1.0 / 5f64.sqrt();
        assert!(first.weights.to_vec().iter().all(|w| w.abs() <= 2.0 * std + 1e-6));
        assert!(first.bias.to_vec().iter().all(|&b| b == 0.0));
        assert!(Net::new(0, &[4], 1).is_err());
        assert!(Net::new(3, &[0], 1).is_err());
    }

    #[test]
    fn test_seeded_init_reproducible() {
        let a = Net::new(3, &[4], 9).unwrap();
        let b = Net::new(3, &[4], 9).unwrap();
        let c = Net::new(3, &[4], 10).unwrap();
        assert_eq!(a.params().layers[0].weights.to_vec(), b.params().layers[0].weights.to_vec());
        assert_ne!(a.params().layers[0].weights.to_vec(), c.params().layers[0].weights.to_vec());
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let net = Net::new(2, &[3], 3).unwrap();
        let x = batch();
        let c = [0.3, -1.2, 0.7];
        let mut rng = StdRng::seed_from_u64(0);
        let (_, trace) = net.forward_train(&x, &mut rng);
        let grads = net.backward(&trace, &Tensor1D::new(c.iter().map(|&v| v as f32).collect()));

        let h = 1e-3;
        for (li, layer) in net.params().layers.iter().enumerate() {
            let (rows, cols) = layer.weights.shape();
            let w = layer.weights.to_vec();
            let analytic = grads.layers[li].weights.to_vec();
            for k in 0..w.len() {
                let eval = |delta: f64| {
                    let mut shifted = w.clone();
                    shifted[k] += delta;
                    let mut params = net.params().clone();
                    params.layers[li].weights =
                        Tensor2D::new(shifted.iter().map(|&v| v as f32).collect(), rows, cols);
                    let mut probe = Net::new(2, &[3], 3).unwrap();
                    probe.update_params(&params);
                    linear_loss(&probe.forward(&x).to_vec(), &c)
                };
                let numeric = (eval(h) - eval(-h)) / (2.0 * h);
                assert!(
                    (numeric - analytic[k]).abs() < 1e-3,
                    "layer {li} weight {k}: numeric {numeric} analytic {}",
                    analytic[k]
                );
            }
        }
        // bias gradient of the output layer is Σ c_i p_i (1 - p_i)
        let p = net.forward(&x).to_vec();
        // targets went through f32 on the way into the backward pass
        let expected: f64 = p
            .iter()
            .zip(&c)
            .map(|(p, c)| (*c as f32) as f64 * p * (1.0 - p))
            .sum();
        assert!((grads.layers[1].bias.to_vec()[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_dropout_only_in_training() {
        let net = Net::new(2, &[50], 4).unwrap().with_dropout(0.5).unwrap();
        let x = batch();
        let mut rng = StdRng::seed_from_u64(1);
        let (p_train, trace) = net.forward_train(&x, &mut rng);
        let mask = trace.masks[0].as_ref().unwrap().to_vec();
        assert!(mask.iter().all(|&m| m == 0.0 || (m - 2.0).abs() < 1e-12));
        assert!(mask.iter().any(|&m| m == 0.0));
        assert!(trace.masks[1].is_none());
        assert_ne!(p_train.to_vec(), net.forward(&x).to_vec());

        let fitted = net.into_fitted();
        assert_eq!(fitted.predict_batch(&x).to_vec(), fitted.predict_batch(&x).to_vec());
        assert!(Net::new(2, &[3], 0).unwrap().with_dropout(0.0).is_err());
        assert!(Net::new(2, &[3], 0).unwrap().with_dropout(1.5).is_err());
    }

    #[test]
    fn test_predict_single_matches_batch() {
        let fitted = Net::new(2, &[3, 3], 5).unwrap().into_fitted();
        let batch = fitted.predict_batch(&batch()).to_vec();
        let single = fitted.predict(&Tensor1D::new(vec![2.0, 0.0])).to_f64();
        assert!((single - batch[1]).abs() < 1e-12);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("net.bin");
        let fitted = Net::new(2, &[4], 6).unwrap().into_fitted();
        fitted.save_to_file(&path).unwrap();
        let loaded = FeedForwardNet::<CpuBackend, Fitted>::load_from_file(&path).unwrap();
        assert_eq!(loaded.layer_sizes(), vec![2, 4, 1]);
        let a = fitted.predict_batch(&batch()).to_vec();
        let b = loaded.predict_batch(&batch()).to_vec();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_saved_params_are_rounded_to_f32() {
        let mut net = Net::new(2, &[4], 6).unwrap();
        let third = net.params().scale(Scalar::new(1.0 / 3.0));
        net.update_params(&third);
        let repr = net.into_fitted().extract_params();
        for (layer, saved) in third.layers.iter().zip(&repr.layers) {
            let exact = layer.weights.to_vec();
            assert!(exact.iter().any(|&v| (v as f32) as f64 != v));
            let rounded: Vec<f32> = exact.iter().map(|&v| v as f32).collect();
            assert_eq!(saved.weights, rounded);
            let bias: Vec<f32> = layer.bias.to_vec().iter().map(|&v| v as f32).collect();
            assert_eq!(saved.bias, bias);
        }
    }

    #[test]
    fn test_from_params_rejects_bad_shapes() {
        let mut repr = Net::new(2, &[4], 6).unwrap().into_fitted().extract_params();
        repr.layers[1].fan_in = 3;
        repr.layers[1].weights.pop();
        assert!(FeedForwardNet::<CpuBackend, Fitted>::from_params(repr).is_err());
        assert!(FeedForwardNet::<CpuBackend, Fitted>::from_params(MlpRepr { layers: vec![] }).is_err());
    }
}
