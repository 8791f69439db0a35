use anyhow::Result;
use ndarray::Array2;

use crate::error::StepwiseError;

/// Pivots smaller than this (relative to the largest diagonal entry) are
/// treated as zero.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// `X^T X` for a row-major design matrix.
pub fn gram(x: &Array2<f64>) -> Array2<f64> {
    x.t().dot(x)
}

/// Invert a square matrix with Gauss-Jordan elimination and partial pivoting.
///
/// Returns `StepwiseError::SingularMatrix` when a pivot vanishes, which for a
/// Gram matrix means the design columns are linearly dependent, and
/// `LengthMismatch` when `a` is not square.
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(StepwiseError::LengthMismatch {
            expected: n,
            found: a.ncols(),
        }
        .into());
    }

    let scale = a
        .diag()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(1.0);

    let mut work = a.to_owned();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        // Partial pivoting: bring the largest remaining entry onto the diagonal.
        let mut pivot_row = col;
        for row in (col + 1)..n {
            if work[(row, col)].abs() > work[(pivot_row, col)].abs() {
                pivot_row = row;
            }
        }
        let pivot = work[(pivot_row, col)];
        if !pivot.is_finite() || pivot.abs() <= PIVOT_TOLERANCE * scale {
            return Err(StepwiseError::SingularMatrix.into());
        }
        if pivot_row != col {
            swap_rows(&mut work, pivot_row, col);
            swap_rows(&mut inv, pivot_row, col);
        }

        for j in 0..n {
            work[(col, j)] /= pivot;
            inv[(col, j)] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[(row, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                let (w, v) = (work[(col, j)], inv[(col, j)]);
                work[(row, j)] -= factor * w;
                inv[(row, j)] -= factor * v;
            }
        }
    }

    Ok(inv)
}

fn swap_rows(m: &mut Array2<f64>, a: usize, b: usize) {
    for j in 0..m.ncols() {
        m.swap((a, j), (b, j));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_invert_roundtrips_to_identity() {
        let a = array![[4.0, 7.0, 2.0], [3.0, 6.0, 1.0], [2.0, 5.0, 3.0]];
        let inv = invert(&a).unwrap();
        let id = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((id[(i, j)] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_invert_needs_pivoting() {
        // Zero on the leading diagonal forces a row swap.
        let a = array![[0.0, 1.0], [2.0, 0.0]];
        let inv = invert(&a).unwrap();
        assert!((inv[(0, 1)] - 0.5).abs() < 1e-12);
        assert!((inv[(1, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invert_singular() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let err = invert(&a).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StepwiseError>(),
            Some(&StepwiseError::SingularMatrix)
        );
    }

    #[test]
    fn test_invert_rejects_non_square() {
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let err = invert(&a).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StepwiseError>(),
            Some(&StepwiseError::LengthMismatch {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_gram() {
        let x = array![[1.0, 2.0], [1.0, 3.0]];
        let g = gram(&x);
        assert_eq!(g, array![[2.0, 5.0], [5.0, 13.0]]);
    }
}
