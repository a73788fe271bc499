//! Small dense linear algebra for Hermitian operators
//!
//! Observable eigenvalues and reduced-density-matrix entropies both need
//! the spectrum of a small complex Hermitian matrix. A cyclic Jacobi
//! iteration is exact enough and has no external dependencies; matrices
//! here are at most `2^k x 2^k` for a handful of wires.

use crate::error::{CoreError, Result};
use num_complex::Complex64;

const MAX_SWEEPS: usize = 100;
const OFF_DIAGONAL_TOL: f64 = 1e-14;

/// Eigendecomposition of a Hermitian matrix via cyclic Jacobi rotations
///
/// # Arguments
/// * `matrix` - row-major `dim x dim` Hermitian matrix
/// * `dim` - matrix dimension
///
/// # Returns
/// `(eigenvalues, eigenvectors)` with eigenvalues in ascending order and
/// eigenvectors as the columns of a row-major `dim x dim` matrix, in the
/// same order as the eigenvalues.
pub fn eigh(matrix: &[Complex64], dim: usize) -> Result<(Vec<f64>, Vec<Complex64>)> {
    if matrix.len() != dim * dim {
        return Err(CoreError::InvalidMatrix {
            elements: matrix.len(),
            wires: dim,
        });
    }

    let mut a = matrix.to_vec();
    let mut v = identity(dim);

    let scale: f64 = a.iter().map(|x| x.norm_sqr()).sum::<f64>().sqrt().max(1.0);
    let tol = OFF_DIAGONAL_TOL * scale;

    let mut converged = false;
    for _ in 0..MAX_SWEEPS {
        if off_diagonal_norm(&a, dim) < tol {
            converged = true;
            break;
        }
        for p in 0..dim {
            for q in (p + 1)..dim {
                rotate(&mut a, &mut v, dim, p, q);
            }
        }
    }
    if !converged && off_diagonal_norm(&a, dim) >= tol {
        return Err(CoreError::EigendecompositionFailed { sweeps: MAX_SWEEPS });
    }

    // Sort ascending, permuting the eigenvector columns alongside.
    let mut order: Vec<usize> = (0..dim).collect();
    let diag: Vec<f64> = (0..dim).map(|i| a[i * dim + i].re).collect();
    order.sort_by(|&i, &j| diag[i].total_cmp(&diag[j]));

    let eigenvalues: Vec<f64> = order.iter().map(|&i| diag[i]).collect();
    let mut eigenvectors = vec![Complex64::new(0.0, 0.0); dim * dim];
    for (new_col, &old_col) in order.iter().enumerate() {
        for row in 0..dim {
            eigenvectors[row * dim + new_col] = v[row * dim + old_col];
        }
    }

    Ok((eigenvalues, eigenvectors))
}

/// Eigenvalues of a Hermitian matrix, ascending
pub fn eigvalsh(matrix: &[Complex64], dim: usize) -> Result<Vec<f64>> {
    eigh(matrix, dim).map(|(vals, _)| vals)
}

/// Conjugate transpose of a row-major square matrix
pub fn conjugate_transpose(matrix: &[Complex64], dim: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); dim * dim];
    for i in 0..dim {
        for j in 0..dim {
            out[j * dim + i] = matrix[i * dim + j].conj();
        }
    }
    out
}

/// Whether a row-major square matrix is Hermitian within `tol`
pub fn is_hermitian(matrix: &[Complex64], dim: usize, tol: f64) -> bool {
    if matrix.len() != dim * dim {
        return false;
    }
    for i in 0..dim {
        for j in i..dim {
            if (matrix[i * dim + j] - matrix[j * dim + i].conj()).norm() > tol {
                return false;
            }
        }
    }
    true
}

fn identity(dim: usize) -> Vec<Complex64> {
    let mut m = vec![Complex64::new(0.0, 0.0); dim * dim];
    for i in 0..dim {
        m[i * dim + i] = Complex64::new(1.0, 0.0);
    }
    m
}

fn off_diagonal_norm(a: &[Complex64], dim: usize) -> f64 {
    let mut sum = 0.0;
    for i in 0..dim {
        for j in (i + 1)..dim {
            sum += a[i * dim + j].norm_sqr();
        }
    }
    (2.0 * sum).sqrt()
}

/// One Jacobi rotation zeroing the (p, q) element of a Hermitian matrix
///
/// Uses the unitary R with R[p][p] = c, R[p][q] = s, R[q][p] = -conj(s),
/// R[q][q] = c where c = cos(phi) and s = exp(i*theta) sin(phi); the
/// rotation updates A <- R^H A R and accumulates V <- V R.
fn rotate(a: &mut [Complex64], v: &mut [Complex64], dim: usize, p: usize, q: usize) {
    let apq = a[p * dim + q];
    let r = apq.norm();
    if r < f64::EPSILON {
        return;
    }
    let theta = apq.im.atan2(apq.re);
    let app = a[p * dim + p].re;
    let aqq = a[q * dim + q].re;

    let phi = 0.5 * (2.0 * r).atan2(aqq - app);
    let c = phi.cos();
    let sigma = phi.sin();
    let s = Complex64::from_polar(sigma, theta);

    // Off-pair rows and columns.
    for k in 0..dim {
        if k == p || k == q {
            continue;
        }
        let akp = a[k * dim + p];
        let akq = a[k * dim + q];
        let new_kp = akp * c - akq * s.conj();
        let new_kq = akp * s + akq * c;
        a[k * dim + p] = new_kp;
        a[k * dim + q] = new_kq;
        a[p * dim + k] = new_kp.conj();
        a[q * dim + k] = new_kq.conj();
    }

    // The 2x2 pivot block; s.conj() * apq = sigma * r is real by
    // construction, which is what makes the rotation diagonalizing.
    let cross = 2.0 * c * sigma * r;
    a[p * dim + p] = Complex64::new(c * c * app + sigma * sigma * aqq - cross, 0.0);
    a[q * dim + q] = Complex64::new(sigma * sigma * app + c * c * aqq + cross, 0.0);
    a[p * dim + q] = Complex64::new(0.0, 0.0);
    a[q * dim + p] = Complex64::new(0.0, 0.0);

    for k in 0..dim {
        let vkp = v[k * dim + p];
        let vkq = v[k * dim + q];
        v[k * dim + p] = vkp * c - vkq * s.conj();
        v[k * dim + q] = vkp * s + vkq * c;
    }
}
