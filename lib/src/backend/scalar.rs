use crate::backend::Backend;
use std::marker::PhantomData;

/// Scalar operations required by numerical backends.
///
/// Implemented for the primitive floating-point type used by the shipped
/// backends (`f64`).
///
/// # Example
/// ```
/// use qg_tagger::backend::ScalarOps;
///
/// let x = 4.0f64;
/// assert_eq!(ScalarOps::sqrt(x), 2.0);
/// assert_eq!(f64::zero(), 0.0);
/// assert_eq!(f64::one(), 1.0);
/// ```
pub trait ScalarOps:
    Clone
    + Copy
    + Send
    + Sync
    + std::ops::Add<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Div<Output = Self>
{
    /// Square root; `NaN` for negative values.
    fn sqrt(self) -> Self;

    fn abs(self) -> Self;

    fn zero() -> Self;

    fn one() -> Self;

    fn from_f64(v: f64) -> Self;

    fn to_f64(self) -> f64;
}

impl ScalarOps for f64 {
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn from_f64(v: f64) -> Self {
        v
    }

    fn to_f64(self) -> f64 {
        self
    }
}

/// Backend-typed scalar wrapper.
///
/// Carries the originating backend in its type so that scalars (losses,
/// learning rates, bias terms) cannot be mixed across backends.
///
/// ```
/// use qg_tagger::backend::{CpuBackend, Scalar};
///
/// let s: Scalar<CpuBackend> = Scalar::new(2.0);
/// let squared = s * s;
/// assert_eq!(squared.to_f64(), 4.0);
/// ```
#[derive(Clone, Debug, Copy)]
pub struct Scalar<B: Backend> {
    pub(crate) data: B::Scalar,
    pub(crate) backend: PhantomData<B>,
}

impl<B: Backend> Scalar<B> {
    /// Creates a new scalar from an `f64` host value.
    pub fn new(f: f64) -> Self {
        Self {
            data: B::scalar_f64(f),
            backend: PhantomData,
        }
    }

    /// Converts this backend scalar to a host `f64` value.
    pub fn to_f64(&self) -> f64 {
        self.data.to_f64()
    }

    pub fn sqrt(&self) -> Self {
        Self {
            data: self.data.sqrt(),
            backend: PhantomData,
        }
    }
}

impl<B: Backend> std::ops::Add for Scalar<B> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            data: self.data + rhs.data,
            backend: PhantomData,
        }
    }
}

impl<B: Backend> std::ops::Sub for Scalar<B> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            data: self.data - rhs.data,
            backend: PhantomData,
        }
    }
}

impl<B: Backend> std::ops::Mul for Scalar<B> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            data: self.data * rhs.data,
            backend: PhantomData,
        }
    }
}

/// # Panics
/// Division by zero follows the backend scalar semantics (IEEE 754 for `f64`).
impl<B: Backend> std::ops::Div for Scalar<B> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self {
            data: self.data / rhs.data,
            backend: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    #[test]
    fn test_scalar_ops_f64() {
        let a = 4.0f64;
        assert_eq!(ScalarOps::sqrt(a), 2.0);
        assert_eq!(ScalarOps::abs(-4.0f64), 4.0);
        assert_eq!(f64::zero(), 0.0);
        assert_eq!(f64::one(), 1.0);
        assert_eq!(f64::from_f64(3.25), 3.25);
        assert_eq!(3.25f64.to_f64(), 3.25);
    }

    #[test]
    fn test_scalar_arithmetic() {
        let a: Scalar<CpuBackend> = Scalar::new(5.0);
        let b: Scalar<CpuBackend> = Scalar::new(2.0);

        let sum = a + b;
        assert_eq!(sum.data, 7.0);

        let diff = sum - Scalar::new(3.0);
        assert_eq!(diff.data, 4.0);

        let prod = diff * Scalar::new(0.5);
        assert_eq!(prod.data, 2.0);

        let quot = prod / Scalar::new(4.0);
        assert_eq!(quot.data, 0.5);

        assert_eq!(Scalar::<CpuBackend>::new(9.0).sqrt().to_f64(), 3.0);
    }
}
