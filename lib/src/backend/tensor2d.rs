use super::scalar::Scalar;
use super::tensor1d::Tensor1D;
use crate::backend::Backend;
use std::marker::PhantomData;

/// Backend-typed row-major matrix.
///
/// Batches of jets are `(n_jets, n_features)` matrices; layer weights are
/// `(fan_in, fan_out)` matrices.
#[derive(Clone)]
pub struct Tensor2D<B: Backend> {
    pub(crate) data: B::Tensor2D,
    pub(crate) backend: PhantomData<B>,
}

impl<B: Backend> Tensor2D<B> {
    pub(crate) fn wrap(data: B::Tensor2D) -> Self {
        Self {
            data,
            backend: PhantomData,
        }
    }

    /// # Panics
    /// If `data.len() != rows * cols`.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Self {
        Self::wrap(B::from_vec_2d(data, rows, cols))
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::wrap(B::zeros_2d(rows, cols))
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::wrap(B::add_2d(&self.data, &other.data))
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self::wrap(B::sub_2d(&self.data, &other.data))
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self::wrap(B::mul_2d(&self.data, &other.data))
    }

    pub fn div(&self, other: &Self) -> Self {
        Self::wrap(B::div_2d(&self.data, &other.data))
    }

    pub fn scale(&self, a: &Scalar<B>) -> Self {
        Self::wrap(B::mul_scalar_2d(&self.data, &a.data))
    }

    pub fn add_scalar(&self, a: &Scalar<B>) -> Self {
        Self::wrap(B::add_scalar_2d(&self.data, &a.data))
    }

    pub fn sum(&self) -> Scalar<B> {
        Scalar {
            data: B::sum_all_2d(&self.data),
            backend: PhantomData,
        }
    }

    pub fn sigmoid(&self) -> Self {
        Self::wrap(B::sigmoid_2d(&self.data))
    }

    pub fn sqrt(&self) -> Self {
        Self::wrap(B::sqrt_2d(&self.data))
    }

    /// `A · x`
    pub fn dot(&self, other: &Tensor1D<B>) -> Tensor1D<B> {
        Tensor1D::wrap(B::matvec(&self.data, &other.data))
    }

    /// `A · B`
    pub fn matmul(&self, other: &Self) -> Self {
        Self::wrap(B::matmul(&self.data, &other.data))
    }

    /// `Aᵀ · B`
    pub fn tmatmul(&self, other: &Self) -> Self {
        Self::wrap(B::matmul_transposed_lhs(&self.data, &other.data))
    }

    /// `A · Bᵀ`
    pub fn matmul_t(&self, other: &Self) -> Self {
        Self::wrap(B::matmul_transposed_rhs(&self.data, &other.data))
    }

    /// Adds `v` to every row.
    pub fn add_row(&self, v: &Tensor1D<B>) -> Self {
        Self::wrap(B::broadcast_add_1d_to_2d_rows(&self.data, &v.data))
    }

    pub fn col_sum(&self) -> Tensor1D<B> {
        Tensor1D::wrap(B::col_sum_2d(&self.data))
    }

    pub fn col_mean(&self) -> Tensor1D<B> {
        Tensor1D::wrap(B::col_mean_2d(&self.data))
    }

    /// Row-major flattening.
    pub fn ravel(&self) -> Tensor1D<B> {
        Tensor1D::wrap(B::ravel_2d(&self.data))
    }

    pub fn shape(&self) -> (usize, usize) {
        B::shape(&self.data)
    }

    /// Row-major copy to host memory.
    pub fn to_vec(&self) -> Vec<f64> {
        B::to_vec_2d(&self.data)
    }
}
