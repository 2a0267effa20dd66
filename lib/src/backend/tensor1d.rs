use super::scalar::Scalar;
use super::tensor2d::Tensor2D;
use crate::backend::Backend;
use std::marker::PhantomData;

/// Backend-typed 1D tensor.
///
/// Wraps a backend's native vector (`B::Tensor1D`). Constructors take `f32`
/// host data, which is widened to the backend's precision; [`to_vec`]
/// returns `f64` values.
///
/// ```
/// use qg_tagger::backend::{CpuBackend, Scalar, Tensor1D};
///
/// let x: Tensor1D<CpuBackend> = Tensor1D::new(vec![1.0f32, 2.0, 3.0]);
/// let y = x.scale(&Scalar::<CpuBackend>::new(2.0));
/// assert_eq!(y.to_vec(), vec![2.0, 4.0, 6.0]);
/// ```
///
/// [`to_vec`]: Tensor1D::to_vec
#[derive(Clone)]
pub struct Tensor1D<B: Backend> {
    pub(crate) data: B::Tensor1D,
    pub(crate) backend: PhantomData<B>,
}

impl<B: Backend> Tensor1D<B> {
    pub(crate) fn wrap(data: B::Tensor1D) -> Self {
        Self {
            data,
            backend: PhantomData,
        }
    }

    pub fn new(data: Vec<f32>) -> Self {
        Self::wrap(B::from_vec_1d(data))
    }

    pub fn zeros(len: usize) -> Self {
        Self::wrap(B::zeros_1d(len))
    }

    /// Tensor of `len` copies of `value`.
    pub fn filled(len: usize, value: f64) -> Self {
        Self::zeros(len).add_scalar(&Scalar::new(value))
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::wrap(B::add_1d(&self.data, &other.data))
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self::wrap(B::sub_1d(&self.data, &other.data))
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self::wrap(B::mul_1d(&self.data, &other.data))
    }

    pub fn div(&self, other: &Self) -> Self {
        Self::wrap(B::div_1d(&self.data, &other.data))
    }

    pub fn scale(&self, a: &Scalar<B>) -> Self {
        Self::wrap(B::mul_scalar_1d(&self.data, &a.data))
    }

    pub fn add_scalar(&self, a: &Scalar<B>) -> Self {
        Self::wrap(B::add_scalar_1d(&self.data, &a.data))
    }

    /// `1 - x`, element-wise.
    pub fn one_minus(&self) -> Self {
        self.scale(&Scalar::new(-1.0)).add_scalar(&Scalar::new(1.0))
    }

    pub fn sum(&self) -> Scalar<B> {
        Scalar {
            data: B::sum_all_1d(&self.data),
            backend: PhantomData,
        }
    }

    pub fn mean(&self) -> Scalar<B> {
        Scalar {
            data: B::mean_all_1d(&self.data),
            backend: PhantomData,
        }
    }

    /// Inner product of two vectors.
    pub fn dot(&self, other: &Self) -> Scalar<B> {
        self.mul(other).sum()
    }

    pub fn log(&self) -> Self {
        Self::wrap(B::log_1d(&self.data))
    }

    pub fn sigmoid(&self) -> Self {
        Self::wrap(B::sigmoid_1d(&self.data))
    }

    pub fn sqrt(&self) -> Self {
        Self::wrap(B::sqrt_1d(&self.data))
    }

    /// Reinterprets the vector as a single-column matrix.
    pub fn to_column(&self) -> Tensor2D<B> {
        Tensor2D::wrap(B::reshape_1d_to_2d(&self.data, self.len(), 1))
    }

    /// Reinterprets the vector as a single-row matrix.
    pub fn to_row(&self) -> Tensor2D<B> {
        Tensor2D::wrap(B::reshape_1d_to_2d(&self.data, 1, self.len()))
    }

    pub fn len(&self) -> usize {
        B::len_1d(&self.data)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        B::to_vec_1d(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    #[test]
    fn test_tensor1d_new_and_zeros() {
        let t = Tensor1D::<CpuBackend>::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(t.to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(t.len(), 3);

        let z = Tensor1D::<CpuBackend>::zeros(0);
        assert!(z.is_empty());
    }

    #[test]
    fn test_tensor1d_filled() {
        let t = Tensor1D::<CpuBackend>::filled(3, 0.25);
        assert_eq!(t.to_vec(), vec![0.25, 0.25, 0.25]);
    }

    #[test]
    fn test_tensor1d_elementwise() {
        let a = Tensor1D::<CpuBackend>::new(vec![1.0, 4.0]);
        let b = Tensor1D::<CpuBackend>::new(vec![2.0, 2.0]);
        assert_eq!(a.add(&b).to_vec(), vec![3.0, 6.0]);
        assert_eq!(a.sub(&b).to_vec(), vec![-1.0, 2.0]);
        assert_eq!(a.mul(&b).to_vec(), vec![2.0, 8.0]);
        assert_eq!(a.div(&b).to_vec(), vec![0.5, 2.0]);
        assert_eq!(a.sqrt().to_vec(), vec![1.0, 2.0]);
        assert_eq!(a.one_minus().to_vec(), vec![0.0, -3.0]);
    }

    #[test]
    fn test_tensor1d_reductions() {
        let a = Tensor1D::<CpuBackend>::new(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(a.sum().to_f64(), 10.0);
        assert_eq!(a.mean().to_f64(), 2.5);
        assert_eq!(a.dot(&a).to_f64(), 30.0);
    }

    #[test]
    fn test_tensor1d_reshape() {
        let a = Tensor1D::<CpuBackend>::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(a.to_column().shape(), (3, 1));
        assert_eq!(a.to_row().shape(), (1, 3));
    }

    #[test]
    fn test_tensor1d_sigmoid_log() {
        let t = Tensor1D::<CpuBackend>::new(vec![0.0]);
        assert_eq!(t.sigmoid().to_vec(), vec![0.5]);
        let one = Tensor1D::<CpuBackend>::new(vec![1.0]);
        assert_eq!(one.log().to_vec(), vec![0.0]);
    }
}
