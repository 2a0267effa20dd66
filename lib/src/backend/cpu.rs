use super::Backend;

/// Pure-Rust backend storing tensors as `Vec<f64>`.
#[derive(Clone, Debug, Copy)]
pub struct CpuBackend;

/// Row-major matrix: (data, rows, cols).
#[derive(Debug, Clone)]
pub struct CpuTensor2D(pub Vec<f64>, pub usize, pub usize);

impl CpuTensor2D {
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "Inconsistent shape");
        Self(data, rows, cols)
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self(self.0.iter().map(|&x| f(x)).collect(), self.1, self.2)
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        assert_eq!(
            (self.1, self.2),
            (other.1, other.2),
            "Shape mismatch in element-wise operation"
        );
        Self(
            self.0.iter().zip(other.0.iter()).map(|(&a, &b)| f(a, b)).collect(),
            self.1,
            self.2,
        )
    }
}

impl From<&[Vec<f64>]> for CpuTensor2D {
    fn from(x: &[Vec<f64>]) -> Self {
        if x.is_empty() {
            return CpuTensor2D::new(Vec::new(), 0, 0);
        }
        let rows = x.len();
        let cols = x[0].len();
        assert!(
            x.iter().all(|row| row.len() == cols),
            "All rows must have same length"
        );
        let data: Vec<f64> = x.iter().flat_map(|row| row.iter()).copied().collect();
        CpuTensor2D::new(data, rows, cols)
    }
}

fn zip_1d(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "Length mismatch in element-wise operation");
    a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect()
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}

impl Backend for CpuBackend {
    type Scalar = f64;
    type Tensor1D = Vec<f64>;
    type Tensor2D = CpuTensor2D;

    fn zeros_1d(len: usize) -> Self::Tensor1D {
        vec![0.; len]
    }

    fn zeros_2d(rows: usize, cols: usize) -> Self::Tensor2D {
        CpuTensor2D::new(vec![0.; rows * cols], rows, cols)
    }

    fn from_vec_1d(data: Vec<f32>) -> Self::Tensor1D {
        data.into_iter().map(|x| x as f64).collect()
    }

    fn from_vec_2d(data: Vec<f32>, rows: usize, cols: usize) -> Self::Tensor2D {
        CpuTensor2D::new(data.into_iter().map(|x| x as f64).collect(), rows, cols)
    }

    fn add_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D {
        zip_1d(a, b, |x, y| x + y)
    }

    fn sub_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D {
        zip_1d(a, b, |x, y| x - y)
    }

    fn mul_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D {
        zip_1d(a, b, |x, y| x * y)
    }

    fn div_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D {
        zip_1d(a, b, |x, y| x / y)
    }

    fn mul_scalar_1d(t: &Self::Tensor1D, s: &Self::Scalar) -> Self::Tensor1D {
        t.iter().map(|x| x * s).collect()
    }

    fn add_scalar_1d(t: &Self::Tensor1D, s: &Self::Scalar) -> Self::Tensor1D {
        t.iter().map(|x| x + s).collect()
    }

    fn add_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        a.zip_with(b, |x, y| x + y)
    }

    fn sub_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        a.zip_with(b, |x, y| x - y)
    }

    fn mul_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        a.zip_with(b, |x, y| x * y)
    }

    fn div_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        a.zip_with(b, |x, y| x / y)
    }

    fn mul_scalar_2d(t: &Self::Tensor2D, s: &Self::Scalar) -> Self::Tensor2D {
        t.map(|x| x * s)
    }

    fn add_scalar_2d(t: &Self::Tensor2D, s: &Self::Scalar) -> Self::Tensor2D {
        t.map(|x| x + s)
    }

    fn mean_all_1d(t: &Self::Tensor1D) -> Self::Scalar {
        t.iter().sum::<f64>() / t.len() as f64
    }

    fn sum_all_1d(t: &Self::Tensor1D) -> Self::Scalar {
        t.iter().sum::<f64>()
    }

    fn sum_all_2d(t: &Self::Tensor2D) -> Self::Scalar {
        t.0.iter().sum::<f64>()
    }

    fn col_sum_2d(t: &Self::Tensor2D) -> Self::Tensor1D {
        let CpuTensor2D(data, _, cols) = t;
        let mut out = vec![0.0; *cols];
        if *cols == 0 {
            return out;
        }
        for row in data.chunks_exact(*cols) {
            for (acc, v) in out.iter_mut().zip(row) {
                *acc += v;
            }
        }
        out
    }

    fn col_mean_2d(t: &Self::Tensor2D) -> Self::Tensor1D {
        let rows = t.1;
        let sums = Self::col_sum_2d(t);
        if rows == 0 {
            return sums;
        }
        sums.into_iter().map(|s| s / rows as f64).collect()
    }

    fn scalar_f64(value: f64) -> Self::Scalar {
        value
    }

    fn to_vec_1d(t: &Self::Tensor1D) -> Vec<f64> {
        t.clone()
    }

    fn to_vec_2d(t: &Self::Tensor2D) -> Vec<f64> {
        t.0.clone()
    }

    fn len_1d(t: &Self::Tensor1D) -> usize {
        t.len()
    }

    fn shape(t: &Self::Tensor2D) -> (usize, usize) {
        (t.1, t.2)
    }

    fn log_1d(x: &Self::Tensor1D) -> Self::Tensor1D {
        x.iter().map(|&v| v.ln()).collect()
    }

    fn sigmoid_1d(x: &Self::Tensor1D) -> Self::Tensor1D {
        x.iter().map(|&z| sigmoid(z)).collect()
    }

    fn sigmoid_2d(x: &Self::Tensor2D) -> Self::Tensor2D {
        x.map(sigmoid)
    }

    fn sqrt_1d(t: &Self::Tensor1D) -> Self::Tensor1D {
        t.iter().map(|v| v.sqrt()).collect()
    }

    fn sqrt_2d(t: &Self::Tensor2D) -> Self::Tensor2D {
        t.map(f64::sqrt)
    }

    fn matvec(a: &Self::Tensor2D, x: &Self::Tensor1D) -> Self::Tensor1D {
        let CpuTensor2D(data, rows, cols) = a;
        assert_eq!(*cols, x.len(), "matvec: A.cols() != x.len()");
        if *cols == 0 {
            return vec![0.0; *rows];
        }
        data.chunks_exact(*cols)
            .map(|row| row.iter().zip(x).map(|(a, b)| a * b).sum())
            .collect()
    }

    fn matmul(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        let CpuTensor2D(ad, m, k) = a;
        let CpuTensor2D(bd, k2, n) = b;
        assert_eq!(k, k2, "matmul: inner dimensions differ");
        let mut out = vec![0.0; m * n];
        for i in 0..*m {
            let out_row = &mut out[i * n..(i + 1) * n];
            for p in 0..*k {
                let a_ip = ad[i * k + p];
                if a_ip == 0.0 {
                    continue;
                }
                let b_row = &bd[p * n..(p + 1) * n];
                for (o, bv) in out_row.iter_mut().zip(b_row) {
                    *o += a_ip * bv;
                }
            }
        }
        CpuTensor2D::new(out, *m, *n)
    }

    fn matmul_transposed_lhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        let CpuTensor2D(ad, k, m) = a;
        let CpuTensor2D(bd, k2, n) = b;
        assert_eq!(k, k2, "matmul_transposed_lhs: row counts differ");
        let mut out = vec![0.0; m * n];
        for p in 0..*k {
            let a_row = &ad[p * m..(p + 1) * m];
            let b_row = &bd[p * n..(p + 1) * n];
            for (i, &a_pi) in a_row.iter().enumerate() {
                if a_pi == 0.0 {
                    continue;
                }
                let out_row = &mut out[i * n..(i + 1) * n];
                for (o, bv) in out_row.iter_mut().zip(b_row) {
                    *o += a_pi * bv;
                }
            }
        }
        CpuTensor2D::new(out, *m, *n)
    }

    fn matmul_transposed_rhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        let CpuTensor2D(ad, m, k) = a;
        let CpuTensor2D(bd, n, k2) = b;
        assert_eq!(k, k2, "matmul_transposed_rhs: column counts differ");
        let mut out = Vec::with_capacity(m * n);
        for i in 0..*m {
            let a_row = &ad[i * k..(i + 1) * k];
            for j in 0..*n {
                let b_row = &bd[j * k..(j + 1) * k];
                out.push(a_row.iter().zip(b_row).map(|(x, y)| x * y).sum());
            }
        }
        CpuTensor2D::new(out, *m, *n)
    }

    fn broadcast_add_1d_to_2d_rows(t: &Self::Tensor2D, v: &Self::Tensor1D) -> Self::Tensor2D {
        let CpuTensor2D(data, rows, cols) = t;
        assert_eq!(*cols, v.len(), "broadcast: row length mismatch");
        let mut out = data.clone();
        if *cols > 0 {
            for row in out.chunks_exact_mut(*cols) {
                for (x, b) in row.iter_mut().zip(v) {
                    *x += b;
                }
            }
        }
        CpuTensor2D::new(out, *rows, *cols)
    }

    fn ravel_2d(x: &Self::Tensor2D) -> Self::Tensor1D {
        x.0.clone()
    }

    fn reshape_1d_to_2d(t: &Self::Tensor1D, rows: usize, cols: usize) -> Self::Tensor2D {
        CpuTensor2D::new(t.clone(), rows, cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_matmul(a: &CpuTensor2D, b: &CpuTensor2D) -> Vec<f64> {
        let mut out = vec![0.0; a.1 * b.2];
        for i in 0..a.1 {
            for j in 0..b.2 {
                for p in 0..a.2 {
                    out[i * b.2 + j] += a.0[i * a.2 + p] * b.0[p * b.2 + j];
                }
            }
        }
        out
    }

    fn transpose(t: &CpuTensor2D) -> CpuTensor2D {
        let mut out = Vec::with_capacity(t.0.len());
        for c in 0..t.2 {
            for r in 0..t.1 {
                out.push(t.0[r * t.2 + c]);
            }
        }
        CpuTensor2D::new(out, t.2, t.1)
    }

    #[test]
    fn test_matvec() {
        // [[1, 2], [3, 4], [5, 6]] @ [1, 0.5] = [2, 5, 8]
        let a = CpuTensor2D::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);
        let out = CpuBackend::matvec(&a, &vec![1.0, 0.5]);
        assert_eq!(out, vec![2.0, 5.0, 8.0]);
    }

    #[test]
    fn test_matmul_against_naive() {
        let a = CpuTensor2D::new(vec![1.0, 2.0, 0.0, -1.0, 3.0, 0.5], 2, 3);
        let b = CpuTensor2D::new(vec![2.0, 1.0, 0.0, 1.0, -1.0, 4.0], 3, 2);
        let out = CpuBackend::matmul(&a, &b);
        assert_eq!(out.1, 2);
        assert_eq!(out.2, 2);
        assert_eq!(out.0, naive_matmul(&a, &b));
    }

    #[test]
    fn test_matmul_transposed_variants_consistent() {
        let a = CpuTensor2D::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);
        let b = CpuTensor2D::new(vec![0.5, -1.0, 2.0, 1.0, 0.0, 3.0], 3, 2);

        let lhs = CpuBackend::matmul_transposed_lhs(&a, &b);
        let expected_lhs = naive_matmul(&transpose(&a), &b);
        assert_eq!((lhs.1, lhs.2), (2, 2));
        for (x, y) in lhs.0.iter().zip(expected_lhs.iter()) {
            assert!((x - y).abs() < 1e-12);
        }

        let rhs = CpuBackend::matmul_transposed_rhs(&a, &b);
        let expected_rhs = naive_matmul(&a, &transpose(&b));
        assert_eq!((rhs.1, rhs.2), (3, 3));
        for (x, y) in rhs.0.iter().zip(expected_rhs.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_column_reductions() {
        let t = CpuTensor2D::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);
        assert_eq!(CpuBackend::col_sum_2d(&t), vec![9.0, 12.0]);
        assert_eq!(CpuBackend::col_mean_2d(&t), vec![3.0, 4.0]);

        let empty = CpuTensor2D::new(vec![], 0, 3);
        assert_eq!(CpuBackend::col_mean_2d(&empty), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_broadcast_add_rows() {
        let t = CpuTensor2D::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let out = CpuBackend::broadcast_add_1d_to_2d_rows(&t, &vec![10.0, 20.0]);
        assert_eq!(out.0, vec![11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn test_sigmoid_stable() {
        let out = CpuBackend::sigmoid_1d(&vec![-1000.0, 0.0, 1000.0]);
        assert!(out.iter().all(|v| v.is_finite()));
        assert_eq!(out[1], 0.5);
        assert!(out[0] < 1e-300);
        assert!((out[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "Inconsistent shape")]
    fn test_from_vec_2d_rejects_bad_shape() {
        CpuBackend::from_vec_2d(vec![1.0, 2.0, 3.0], 2, 2);
    }
}
