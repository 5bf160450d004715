//! Restarted Lanczos for the lowest eigenpair of a Hermitian operator given
//! only as a matrix-vector product.

use crate::error::{TnError, TnResult};
use crate::mps::C64;
use nalgebra::DMatrix;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LanczosParams {
    /// Krylov vectors built before each restart.
    pub krylov_dim: usize,
    pub restarts: usize,
    /// Residual norm below which the iteration stops early.
    pub tol: f64,
}

impl Default for LanczosParams {
    fn default() -> Self {
        Self {
            krylov_dim: 10,
            restarts: 2,
            tol: 1e-10,
        }
    }
}

fn dot(a: &[C64], b: &[C64]) -> C64 {
    a.iter().zip(b).map(|(x, y)| x.conj() * y).sum()
}

fn norm(a: &[C64]) -> f64 {
    a.iter().map(|x| x.norm_sqr()).sum::<f64>().sqrt()
}

/// Lowest eigenvalue and normalized eigenvector of `apply`, starting from
/// `start`. Every new Krylov vector is reorthogonalized against all previous
/// ones.
pub fn lowest_eigenpair<F>(
    apply: F,
    start: &[C64],
    params: &LanczosParams,
) -> TnResult<(f64, Vec<C64>)>
where
    F: Fn(&[C64]) -> Vec<C64>,
{
    let n0 = norm(start);
    if n0 == 0.0 || !n0.is_finite() {
        return Err(TnError::Numerical("Lanczos start vector is null".into()));
    }
    let mut x: Vec<C64> = start.iter().map(|v| v / n0).collect();
    let mut energy = f64::INFINITY;
    let krylov_dim = params.krylov_dim.max(1).min(start.len());

    for _ in 0..params.restarts.max(1) {
        let mut basis: Vec<Vec<C64>> = vec![x.clone()];
        let mut alpha: Vec<f64> = Vec::with_capacity(krylov_dim);
        let mut beta: Vec<f64> = Vec::with_capacity(krylov_dim);
        let mut tail = 0.0;

        for j in 0..krylov_dim {
            let mut w = apply(&basis[j]);
            if w.len() != x.len() {
                return Err(TnError::Shape("Lanczos operator changed the vector length".into()));
            }
            alpha.push(dot(&basis[j], &w).re);
            // two passes of Gram-Schmidt
            for _ in 0..2 {
                for v in &basis {
                    let c = dot(v, &w);
                    for (wi, vi) in w.iter_mut().zip(v) {
                        *wi -= c * vi;
                    }
                }
            }
            let b = norm(&w);
            if !b.is_finite() {
                return Err(TnError::Numerical("non-finite Lanczos vector".into()));
            }
            tail = b;
            if j + 1 == krylov_dim || b < 1e-12 {
                break;
            }
            beta.push(b);
            basis.push(w.iter().map(|v| v / b).collect());
        }

        let m = alpha.len();
        let t = DMatrix::<f64>::from_fn(m, m, |i, j| {
            if i == j {
                alpha[i]
            } else if i + 1 == j {
                beta[i]
            } else if j + 1 == i {
                beta[j]
            } else {
                0.0
            }
        });
        let eig = t.symmetric_eigen();
        let mut lowest = 0;
        for k in 1..m {
            if eig.eigenvalues[k] < eig.eigenvalues[lowest] {
                lowest = k;
            }
        }
        energy = eig.eigenvalues[lowest];
        if !energy.is_finite() {
            return Err(TnError::Numerical("non-finite Ritz value".into()));
        }

        let y = eig.eigenvectors.column(lowest);
        let mut next = vec![C64::new(0.0, 0.0); x.len()];
        for (k, v) in basis.iter().take(m).enumerate() {
            for (ni, vi) in next.iter_mut().zip(v) {
                *ni += vi * y[k];
            }
        }
        let nn = norm(&next);
        if nn == 0.0 || !nn.is_finite() {
            return Err(TnError::Numerical("Ritz vector vanished".into()));
        }
        x = next.iter().map(|v| v / nn).collect();

        let residual = tail * y[m - 1].abs();
        if residual < params.tol {
            break;
        }
    }

    Ok((energy, x))
}
