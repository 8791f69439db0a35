//! Small dense linear-algebra helpers on top of `ndarray`.
//!
//! Only what least squares needs: a pivoted Gauss-Jordan inverse and the
//! normal-equation products. Kept dependency-free beyond `ndarray` so the
//! crate does not require a BLAS/LAPACK installation.
pub mod matrix;

pub use matrix::{gram, invert};
