//! Gradient-based parameter updates.
//!
//! Optimizers are decoupled from models: any parameter set implementing
//! [`ParamOps`] can be driven by [`SGD`] or [`Adam`].

use crate::backend::{Backend, Scalar};
use crate::model::ParamOps;
use std::marker::PhantomData;

/// Trait for gradient-based optimizers.
///
/// `step` returns the updated parameters; stateful optimizers (Adam) update
/// their moment estimates in place.
pub trait Optimizer<B: Backend, P> {
    fn step(&mut self, params: &P, gradients: &P) -> P;

    fn learning_rate(&self) -> f64;
}

/// Plain gradient descent: `θ ← θ - η·∇L`.
#[derive(Debug, Clone, Copy)]
pub struct SGD<B: Backend> {
    lr: f64,
    _backend: PhantomData<B>,
}

impl<B: Backend> SGD<B> {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            _backend: PhantomData,
        }
    }
}

impl<B: Backend, P: ParamOps<B>> Optimizer<B, P> for SGD<B> {
    fn step(&mut self, params: &P, gradients: &P) -> P {
        params.add(&gradients.scale(Scalar::new(-self.lr)))
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}

/// Adam with bias correction folded into the step size:
///
/// ```text
/// m ← β₁m + (1-β₁)g
/// v ← β₂v + (1-β₂)g²
/// θ ← θ - η·sqrt(1-β₂ᵗ)/(1-β₁ᵗ) · m / (sqrt(v) + ε)
/// ```
#[derive(Clone)]
pub struct Adam<B: Backend, P> {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: u64,
    m: Option<P>,
    v: Option<P>,
    _backend: PhantomData<B>,
}

impl<B: Backend, P> Adam<B, P> {
    /// Adam with β₁ = 0.9, β₂ = 0.999, ε = 1e-8.
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            m: None,
            v: None,
            _backend: PhantomData,
        }
    }

    /// Steps taken so far.
    pub fn iterations(&self) -> u64 {
        self.t
    }
}

impl<B: Backend, P> Default for Adam<B, P> {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

impl<B: Backend, P: ParamOps<B>> Optimizer<B, P> for Adam<B, P> {
    fn step(&mut self, params: &P, g: &P) -> P {
        self.t += 1;
        let g_sq = g.mul(g);
        let m = match &self.m {
            Some(m) => m
                .scale(Scalar::new(self.beta1))
                .add(&g.scale(Scalar::new(1.0 - self.beta1))),
            None => g.scale(Scalar::new(1.0 - self.beta1)),
        };
        let v = match &self.v {
            Some(v) => v
                .scale(Scalar::new(self.beta2))
                .add(&g_sq.scale(Scalar::new(1.0 - self.beta2))),
            None => g_sq.scale(Scalar::new(1.0 - self.beta2)),
        };

        let t = self.t as i32;
        let lr_t = self.lr * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t));
        let update = m.div(&v.sqrt().add_scalar(Scalar::new(self.epsilon)));
        let next = params.add(&update.scale(Scalar::new(-lr_t)));

        self.m = Some(m);
        self.v = Some(v);
        next
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}
