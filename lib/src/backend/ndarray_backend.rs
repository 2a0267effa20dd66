use super::Backend;
use ndarray::{Array1, Array2, Axis};

/// Tensor backend implemented on top of the `ndarray` crate.
///
/// # Type mappings
/// - `Scalar`: `f64`
/// - `Tensor1D`: `ndarray::Array1<f64>`
/// - `Tensor2D`: [`NdarrayTensor2D`] wrapper around `ndarray::Array2<f64>`
///
/// Matrix products delegate to ndarray's `dot`, which is where this backend
/// pays off against [`CpuBackend`](super::CpuBackend) for the wide hidden
/// layers of the tagging networks.
#[derive(Clone, Debug, Copy)]
pub struct NdarrayBackend;

/// Wrapper type for 2D tensors using ndarray's `Array2<f64>`.
#[derive(Debug, Clone)]
pub struct NdarrayTensor2D(pub Array2<f64>);

impl From<&[Vec<f64>]> for NdarrayTensor2D {
    /// Converts a slice of row vectors into a 2D tensor.
    ///
    /// # Panics
    /// Panics if rows have inconsistent lengths.
    fn from(x: &[Vec<f64>]) -> Self {
        let rows = x.len();
        let cols = x.first().map_or(0, |r| r.len());
        assert!(
            x.iter().all(|row| row.len() == cols),
            "All rows must have same length"
        );
        let data: Vec<f64> = x.iter().flat_map(|row| row.iter()).copied().collect();
        NdarrayTensor2D(shaped(data, rows, cols))
    }
}

fn shaped(data: Vec<f64>, rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_vec((rows, cols), data)
        .unwrap_or_else(|e| panic!("Inconsistent shape ({rows}x{cols}): {e}"))
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}

impl Backend for NdarrayBackend {
    type Scalar = f64;
    type Tensor1D = Array1<f64>;
    type Tensor2D = NdarrayTensor2D;

    fn zeros_1d(len: usize) -> Self::Tensor1D {
        Array1::zeros(len)
    }

    fn zeros_2d(rows: usize, cols: usize) -> Self::Tensor2D {
        NdarrayTensor2D(Array2::zeros((rows, cols)))
    }

    fn from_vec_1d(data: Vec<f32>) -> Self::Tensor1D {
        data.into_iter().map(f64::from).collect()
    }

    fn from_vec_2d(data: Vec<f32>, rows: usize, cols: usize) -> Self::Tensor2D {
        NdarrayTensor2D(shaped(
            data.into_iter().map(f64::from).collect(),
            rows,
            cols,
        ))
    }

    fn add_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D {
        a + b
    }

    fn sub_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D {
        a - b
    }

    fn mul_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D {
        a * b
    }

    fn div_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D {
        a / b
    }

    fn mul_scalar_1d(t: &Self::Tensor1D, s: &Self::Scalar) -> Self::Tensor1D {
        t * *s
    }

    fn add_scalar_1d(t: &Self::Tensor1D, s: &Self::Scalar) -> Self::Tensor1D {
        t + *s
    }

    fn add_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(&a.0 + &b.0)
    }

    fn sub_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(&a.0 - &b.0)
    }

    fn mul_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(&a.0 * &b.0)
    }

    fn div_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(&a.0 / &b.0)
    }

    fn mul_scalar_2d(t: &Self::Tensor2D, s: &Self::Scalar) -> Self::Tensor2D {
        NdarrayTensor2D(&t.0 * *s)
    }

    fn add_scalar_2d(t: &Self::Tensor2D, s: &Self::Scalar) -> Self::Tensor2D {
        NdarrayTensor2D(&t.0 + *s)
    }

    fn mean_all_1d(t: &Self::Tensor1D) -> Self::Scalar {
        t.mean().unwrap_or(f64::NAN)
    }

    fn sum_all_1d(t: &Self::Tensor1D) -> Self::Scalar {
        t.sum()
    }

    fn sum_all_2d(t: &Self::Tensor2D) -> Self::Scalar {
        t.0.sum()
    }

    fn col_sum_2d(t: &Self::Tensor2D) -> Self::Tensor1D {
        t.0.sum_axis(Axis(0))
    }

    fn col_mean_2d(t: &Self::Tensor2D) -> Self::Tensor1D {
        t.0.mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(t.0.ncols()))
    }

    fn scalar_f64(value: f64) -> Self::Scalar {
        value
    }

    fn to_vec_1d(t: &Self::Tensor1D) -> Vec<f64> {
        t.to_vec()
    }

    fn to_vec_2d(t: &Self::Tensor2D) -> Vec<f64> {
        t.0.iter().copied().collect()
    }

    fn len_1d(t: &Self::Tensor1D) -> usize {
        t.len()
    }

    fn shape(t: &Self::Tensor2D) -> (usize, usize) {
        t.0.dim()
    }

    fn log_1d(x: &Self::Tensor1D) -> Self::Tensor1D {
        x.mapv(f64::ln)
    }

    fn sigmoid_1d(x: &Self::Tensor1D) -> Self::Tensor1D {
        x.mapv(sigmoid)
    }

    fn sigmoid_2d(x: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(x.0.mapv(sigmoid))
    }

    fn sqrt_1d(t: &Self::Tensor1D) -> Self::Tensor1D {
        t.mapv(f64::sqrt)
    }

    fn sqrt_2d(t: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(t.0.mapv(f64::sqrt))
    }

    fn matvec(a: &Self::Tensor2D, x: &Self::Tensor1D) -> Self::Tensor1D {
        assert_eq!(a.0.ncols(), x.len(), "matvec: A.cols() != x.len()");
        a.0.dot(x)
    }

    fn matmul(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(a.0.dot(&b.0))
    }

    fn matmul_transposed_lhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(a.0.t().dot(&b.0))
    }

    fn matmul_transposed_rhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(a.0.dot(&b.0.t()))
    }

    fn broadcast_add_1d_to_2d_rows(t: &Self::Tensor2D, v: &Self::Tensor1D) -> Self::Tensor2D {
        NdarrayTensor2D(&t.0 + v)
    }

    fn ravel_2d(x: &Self::Tensor2D) -> Self::Tensor1D {
        x.0.iter().copied().collect()
    }

    fn reshape_1d_to_2d(t: &Self::Tensor1D, rows: usize, cols: usize) -> Self::Tensor2D {
        NdarrayTensor2D(shaped(t.to_vec(), rows, cols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-10, "{x} != {y}");
        }
    }

    #[test]
    fn test_matmul_matches_cpu() {
        let a = vec![1.0f32, 2.0, 0.0, -1.0, 3.0, 0.5];
        let b = vec![2.0f32, 1.0, 0.0, 1.0, -1.0, 4.0];

        let nd = NdarrayBackend::matmul(
            &NdarrayBackend::from_vec_2d(a.clone(), 2, 3),
            &NdarrayBackend::from_vec_2d(b.clone(), 3, 2),
        );
        let cpu = CpuBackend::matmul(
            &CpuBackend::from_vec_2d(a, 2, 3),
            &CpuBackend::from_vec_2d(b, 3, 2),
        );
        assert_eq!(NdarrayBackend::shape(&nd), CpuBackend::shape(&cpu));
        assert_close(&NdarrayBackend::to_vec_2d(&nd), &CpuBackend::to_vec_2d(&cpu));
    }

    #[test]
    fn test_transposed_products_match_cpu() {
        let a = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = vec![0.5f32, -1.0, 2.0, 1.0, 0.0, 3.0];
        let (na, nb) = (
            NdarrayBackend::from_vec_2d(a.clone(), 3, 2),
            NdarrayBackend::from_vec_2d(b.clone(), 3, 2),
        );
        let (ca, cb) = (
            CpuBackend::from_vec_2d(a, 3, 2),
            CpuBackend::from_vec_2d(b, 3, 2),
        );

        assert_close(
            &NdarrayBackend::to_vec_2d(&NdarrayBackend::matmul_transposed_lhs(&na, &nb)),
            &CpuBackend::to_vec_2d(&CpuBackend::matmul_transposed_lhs(&ca, &cb)),
        );
        assert_close(
            &NdarrayBackend::to_vec_2d(&NdarrayBackend::matmul_transposed_rhs(&na, &nb)),
            &CpuBackend::to_vec_2d(&CpuBackend::matmul_transposed_rhs(&ca, &cb)),
        );
    }

    #[test]
    fn test_column_ops_and_broadcast() {
        let t = NdarrayBackend::from_vec_2d(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        assert_eq!(NdarrayBackend::to_vec_1d(&NdarrayBackend::col_sum_2d(&t)), vec![4.0, 6.0]);
        assert_eq!(NdarrayBackend::to_vec_1d(&NdarrayBackend::col_mean_2d(&t)), vec![2.0, 3.0]);

        let shifted =
            NdarrayBackend::broadcast_add_1d_to_2d_rows(&t, &NdarrayBackend::from_vec_1d(vec![1.0, -1.0]));
        assert_eq!(NdarrayBackend::to_vec_2d(&shifted), vec![2.0, 1.0, 4.0, 3.0]);
    }

    #[test]
    fn test_reshape_and_ravel() {
        let v = NdarrayBackend::from_vec_1d(vec![1.0, 2.0, 3.0]);
        let col = NdarrayBackend::reshape_1d_to_2d(&v, 3, 1);
        assert_eq!(NdarrayBackend::shape(&col), (3, 1));
        assert_eq!(NdarrayBackend::to_vec_1d(&NdarrayBackend::ravel_2d(&col)), vec![1.0, 2.0, 3.0]);
    }
}
