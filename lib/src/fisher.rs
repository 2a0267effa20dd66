//! Fisher linear discriminant, the baseline the networks are compared to.
//!
//! Two-class LDA with pooled within-class covariance `Σ` and class priors:
//!
//! ```text
//! w = Σ⁻¹(μ₁ - μ₀)
//! b = -½(μ₁ᵀΣ⁻¹μ₁ - μ₀ᵀΣ⁻¹μ₀) + ln(π₁/π₀)
//! p = σ(w·x + b)
//! ```
//!
//! Zero-padded slots are constant columns, so `Σ` is shrunk towards a
//! multiple of the identity before the Cholesky solve.

use crate::backend::{Backend, Scalar, Tensor1D};
use crate::dataset::{Dataset, InMemoryDataset};
use crate::error::{QgError, Result};
use crate::model::{Fitted, LinearModel, LinearParams};
use tracing::{debug, info};

/// Added to the diagonal on top of the shrinkage term.
const DIAGONAL_FLOOR: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FisherDiscriminant {
    /// Fraction of the mean variance added to every diagonal entry.
    pub shrinkage: f64,
}

impl Default for FisherDiscriminant {
    fn default() -> Self {
        Self { shrinkage: 1e-3 }
    }
}

impl FisherDiscriminant {
    pub fn new(shrinkage: f64) -> Result<Self> {
        if !(shrinkage >= 0.0 && shrinkage.is_finite()) {
            return Err(QgError::InvalidParameter(format!(
                "shrinkage {shrinkage} must be a non-negative number"
            )));
        }
        Ok(Self { shrinkage })
    }

    pub fn fit<B: Backend>(&self, data: &InMemoryDataset) -> Result<LinearModel<B, Fitted>> {
        let d = data.n_features();
        let n = data.len();
        let targets = data.targets();

        let mut counts = [0usize; 2];
        let mut means = [vec![0.0f64; d], vec![0.0f64; d]];
        for i in 0..n {
            let c = usize::from(targets[i] > 0.5);
            counts[c] += 1;
            for (m, &x) in means[c].iter_mut().zip(data.row(i)) {
                *m += x as f64;
            }
        }
        if counts[0] == 0 || counts[1] == 0 {
            return Err(QgError::InvalidParameter(
                "Fisher discriminant needs both classes".into(),
            ));
        }
        for c in 0..2 {
            means[c].iter_mut().for_each(|m| *m /= counts[c] as f64);
        }

        // pooled within-class scatter, upper triangle first
        let mut cov = vec![0.0f64; d * d];
        let mut centred = vec![0.0f64; d];
        for i in 0..n {
            let c = usize::from(targets[i] > 0.5);
            for ((dst, &x), m) in centred.iter_mut().zip(data.row(i)).zip(&means[c]) {
                *dst = x as f64 - m;
            }
            for a in 0..d {
                let ca = centred[a];
                if ca == 0.0 {
                    continue;
                }
                let row = &mut cov[a * d..(a + 1) * d];
                for b in a..d {
                    row[b] += ca * centred[b];
                }
            }
        }
        let dof = if n > 2 { (n - 2) as f64 } else { n as f64 };
        for a in 0..d {
            for b in a..d {
                let v = cov[a * d + b] / dof;
                cov[a * d + b] = v;
                cov[b * d + a] = v;
            }
        }

        let trace: f64 = (0..d).map(|a| cov[a * d + a]).sum();
        let ridge = self.shrinkage * trace / d as f64 + DIAGONAL_FLOOR;
        for a in 0..d {
            cov[a * d + a] += ridge;
        }
        debug!(features = d, ridge, "regularised covariance");

        let chol = cholesky(&cov, d)?;
        let v0 = cholesky_solve(&chol, d, &means[0]);
        let v1 = cholesky_solve(&chol, d, &means[1]);

        let weights: Vec<f32> = v1.iter().zip(&v0).map(|(a, b)| (a - b) as f32).collect();
        let prior = (counts[1] as f64 / counts[0] as f64).ln();
        let bias = -0.5 * (dot(&means[1], &v1) - dot(&means[0], &v0)) + prior;
        info!(
            rows = n,
            features = d,
            positives = counts[1],
            "fitted Fisher discriminant"
        );

        Ok(LinearModel::new(LinearParams {
            weights: Tensor1D::new(weights),
            bias: Scalar::new(bias),
        }))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Lower-triangular `L` with `A = LLᵀ`, row-major.
fn cholesky(a: &[f64], d: usize) -> Result<Vec<f64>> {
    let mut l = vec![0.0f64; d * d];
    for i in 0..d {
        for j in 0..=i {
            let s = dot(&l[i * d..i * d + j], &l[j * d..j * d + j]);
            if i == j {
                let diag = a[i * d + i] - s;
                if !(diag > 0.0) {
                    return Err(QgError::Numerical(format!(
                        "covariance is not positive definite at column {i}"
                    )));
                }
                l[i * d + i] = diag.sqrt();
            } else {
                l[i * d + j] = (a[i * d + j] - s) / l[j * d + j];
            }
        }
    }
    Ok(l)
}

/// Solves `LLᵀx = b`.
fn cholesky_solve(l: &[f64], d: usize, b: &[f64]) -> Vec<f64> {
    let mut y = vec![0.0f64; d];
    for i in 0..d {
        y[i] = (b[i] - dot(&l[i * d..i * d + i], &y[..i])) / l[i * d + i];
    }
    let mut x = vec![0.0f64; d];
    for i in (0..d).rev() {
        let s: f64 = ((i + 1)..d).map(|k| l[k * d + i] * x[k]).sum();
        x[i] = (y[i] - s) / l[i * d + i];
    }
    x
}
