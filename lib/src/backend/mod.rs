//! # Backend Abstraction
//!
//! Numerical code in this crate (network layers, losses, optimizers, the
//! Fisher discriminant) is written against the [`Backend`] trait rather than
//! a concrete array library.
//!
//! ## Available Backends
//!
//! | Backend          | Feature   | Use Case                          |
//! |------------------|-----------|-----------------------------------|
//! | `CpuBackend`     | `cpu`     | Default, pure-Rust implementation |
//! | `NdarrayBackend` | `ndarray` | Faster matrix products via ndarray |
//!
//! ## Example
//!
//! ```rust
//! use qg_tagger::backend::{CpuBackend, Tensor1D, Tensor2D};
//!
//! let x: Tensor1D<CpuBackend> = Tensor1D::new(vec![1.0, 2.0]);
//! let w: Tensor2D<CpuBackend> = Tensor2D::new(vec![0.5, 0.5, 0.5, 0.5], 2, 2);
//! let y = w.dot(&x);
//! assert_eq!(y.to_vec(), vec![1.5, 1.5]);
//! ```

#[cfg(feature = "cpu")]
mod cpu;
#[cfg(feature = "cpu")]
/// Pure-Rust CPU backend implementation with zero external dependencies.
pub use cpu::{CpuBackend, CpuTensor2D};

#[cfg(feature = "ndarray")]
mod ndarray_backend;
#[cfg(feature = "ndarray")]
/// Backend backed by the `ndarray` crate.
pub use ndarray_backend::{NdarrayBackend, NdarrayTensor2D};

/// Scalar value representation and arithmetic operations.
pub mod scalar;
/// One-dimensional tensor abstraction.
pub mod tensor1d;
/// Two-dimensional tensor abstraction.
pub mod tensor2d;

pub use scalar::{Scalar, ScalarOps};
pub use tensor1d::Tensor1D;
pub use tensor2d::Tensor2D;

/// Backend used by the command-line driver and the pipeline defaults.
#[cfg(feature = "ndarray")]
pub type DefaultBackend = NdarrayBackend;

/// Backend used by the command-line driver and the pipeline defaults.
#[cfg(all(feature = "cpu", not(feature = "ndarray")))]
pub type DefaultBackend = CpuBackend;

/// Abstraction over computation devices and tensor operations.
///
/// The trait carries the minimal set of operations needed to train and apply
/// dense sigmoid networks and linear discriminants. Implementations provide
/// concrete tensor types while the typed wrappers ([`Tensor1D`], [`Tensor2D`],
/// [`Scalar`]) keep tensors from different backends apart at compile time.
///
/// Constructors take `f32` host data; storage and arithmetic are in the
/// backend's native precision (`f64` for both shipped backends).
///
/// # Panics
///
/// Shape mismatches in element-wise operations and matrix products are
/// programming errors and panic.
pub trait Backend: Clone + Copy + 'static {
    /// Scalar type supporting arithmetic operations.
    type Scalar: ScalarOps + Clone;

    /// One-dimensional tensor type.
    type Tensor1D: Clone + Send + Sync;

    /// Two-dimensional tensor type.
    type Tensor2D: Clone + Send + Sync;

    // --- Constructors ---

    /// Creates a 1D tensor filled with zeros of given length.
    fn zeros_1d(len: usize) -> Self::Tensor1D;

    /// Creates a 2D tensor filled with zeros of given dimensions.
    fn zeros_2d(rows: usize, cols: usize) -> Self::Tensor2D;

    /// Constructs a 1D tensor from owned data.
    fn from_vec_1d(data: Vec<f32>) -> Self::Tensor1D;

    /// Constructs a 2D tensor from row-major ordered data.
    ///
    /// # Panics
    /// If `data.len() != rows * cols`.
    fn from_vec_2d(data: Vec<f32>, rows: usize, cols: usize) -> Self::Tensor2D;

    // --- Element-wise operations (1D) ---

    fn add_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D;
    fn sub_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D;
    fn mul_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D;
    fn div_1d(a: &Self::Tensor1D, b: &Self::Tensor1D) -> Self::Tensor1D;
    fn mul_scalar_1d(t: &Self::Tensor1D, s: &Self::Scalar) -> Self::Tensor1D;
    fn add_scalar_1d(t: &Self::Tensor1D, s: &Self::Scalar) -> Self::Tensor1D;

    // --- Element-wise operations (2D) ---

    fn add_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;
    fn sub_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;
    fn mul_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;
    fn div_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;
    fn mul_scalar_2d(t: &Self::Tensor2D, s: &Self::Scalar) -> Self::Tensor2D;
    fn add_scalar_2d(t: &Self::Tensor2D, s: &Self::Scalar) -> Self::Tensor2D;

    // --- Reductions ---

    /// Arithmetic mean of all elements; `NaN` for an empty tensor.
    fn mean_all_1d(t: &Self::Tensor1D) -> Self::Scalar;

    fn sum_all_1d(t: &Self::Tensor1D) -> Self::Scalar;

    fn sum_all_2d(t: &Self::Tensor2D) -> Self::Scalar;

    /// Sum of each column; length `cols`.
    fn col_sum_2d(t: &Self::Tensor2D) -> Self::Tensor1D;

    /// Mean of each column; length `cols`. Zeros for a tensor without rows.
    fn col_mean_2d(t: &Self::Tensor2D) -> Self::Tensor1D;

    // --- Scalars and data access ---

    /// Creates a backend-specific scalar from an f64 value.
    fn scalar_f64(value: f64) -> Self::Scalar;

    /// Copies a 1D tensor to host memory.
    fn to_vec_1d(t: &Self::Tensor1D) -> Vec<f64>;

    /// Copies a 2D tensor to host memory in row-major order.
    fn to_vec_2d(t: &Self::Tensor2D) -> Vec<f64>;

    fn len_1d(t: &Self::Tensor1D) -> usize;

    /// Returns the shape of a 2D tensor as (rows, cols).
    fn shape(t: &Self::Tensor2D) -> (usize, usize);

    // --- Mathematical functions ---

    /// Element-wise natural logarithm.
    fn log_1d(x: &Self::Tensor1D) -> Self::Tensor1D;

    /// Element-wise sigmoid, numerically stable for large `|x|`.
    fn sigmoid_1d(x: &Self::Tensor1D) -> Self::Tensor1D;

    fn sigmoid_2d(x: &Self::Tensor2D) -> Self::Tensor2D;

    fn sqrt_1d(t: &Self::Tensor1D) -> Self::Tensor1D;

    fn sqrt_2d(t: &Self::Tensor2D) -> Self::Tensor2D;

    // --- Linear algebra ---

    /// Computes `A · x` for `A` of shape (m × n) and `x` of length n.
    ///
    /// # Panics
    /// If `A.cols() != x.len()`.
    fn matvec(a: &Self::Tensor2D, x: &Self::Tensor1D) -> Self::Tensor1D;

    /// Computes `A · B` for (m × k) and (k × n) operands.
    fn matmul(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    /// Computes `Aᵀ · B` for (k × m) and (k × n) operands without
    /// materialising the transpose.
    fn matmul_transposed_lhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    /// Computes `A · Bᵀ` for (m × k) and (n × k) operands.
    fn matmul_transposed_rhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    // --- Broadcasting and reshaping ---

    /// Result[i, j] = t[i, j] + v[j]
    fn broadcast_add_1d_to_2d_rows(t: &Self::Tensor2D, v: &Self::Tensor1D) -> Self::Tensor2D;

    /// Flattens a 2D tensor in row-major order.
    fn ravel_2d(x: &Self::Tensor2D) -> Self::Tensor1D;

    /// Reinterprets a 1D tensor as a (rows × cols) matrix.
    ///
    /// # Panics
    /// If `t.len() != rows * cols`.
    fn reshape_1d_to_2d(t: &Self::Tensor1D, rows: usize, cols: usize) -> Self::Tensor2D;
}
