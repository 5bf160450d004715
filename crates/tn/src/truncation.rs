use crate::error::{TnError, TnResult};
use crate::mps::C64;
use faer::Mat;
use std::collections::BTreeMap;

/// Bond truncation policy.
///
/// `cutoff` bounds the discarded weight: the smallest singular values are
/// dropped while the sum of their squares stays below `cutoff` times the total.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Truncation {
    pub max_bond: usize,
    pub cutoff: f64,
}

impl Truncation {
    /// Keep every non-vanishing singular value.
    pub fn exact() -> Self {
        Self {
            max_bond: usize::MAX,
            cutoff: 0.0,
        }
    }
}

/// Singular values below this fraction of the largest are treated as zero.
const ZERO_SV: f64 = 1e-14;

/// Result of a (block-wise) truncated SVD `M ≈ U diag(s) Vh`.
pub struct Factorization {
    pub u: Mat<C64>,
    pub s: Vec<f64>,
    pub vh: Mat<C64>,
    /// Charge label of every kept singular vector, when labels were given.
    pub labels: Option<Vec<usize>>,
    /// Discarded weight relative to the total.
    pub discarded: f64,
}

impl Factorization {
    pub fn kept(&self) -> usize {
        self.s.len()
    }

    /// `diag(s) Vh`
    pub fn s_vh(&self) -> Mat<C64> {
        Mat::from_fn(self.vh.nrows(), self.vh.ncols(), |i, j| {
            self.vh.read(i, j) * self.s[i]
        })
    }

    /// `U diag(s)`
    pub fn u_s(&self) -> Mat<C64> {
        Mat::from_fn(self.u.nrows(), self.u.ncols(), |i, j| {
            self.u.read(i, j) * self.s[j]
        })
    }
}

struct Candidate {
    value: f64,
    block: usize,
    index: usize,
}

struct Block {
    label: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    u: Mat<C64>,
    v: Mat<C64>,
}

/// Truncated SVD of `m`.
///
/// With `labels = Some((row_labels, col_labels))` the matrix is treated as
/// block diagonal: only entries whose row and column labels agree take part,
/// and each kept singular vector inherits the label of its block. Without
/// labels the whole matrix is one block.
pub fn factorize(
    m: &Mat<C64>,
    labels: Option<(&[usize], &[usize])>,
    trunc: Truncation,
) -> TnResult<Factorization> {
    let nrows = m.nrows();
    let ncols = m.ncols();

    let (row_labels, col_labels) = match labels {
        Some((r, c)) => {
            if r.len() != nrows || c.len() != ncols {
                return Err(TnError::Shape(format!(
                    "labels {}x{} for a {}x{} matrix",
                    r.len(),
                    c.len(),
                    nrows,
                    ncols
                )));
            }
            (r.to_vec(), c.to_vec())
        }
        None => (vec![0; nrows], vec![0; ncols]),
    };

    let mut row_groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &q) in row_labels.iter().enumerate() {
        row_groups.entry(q).or_default().push(i);
    }
    let mut col_groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (j, &q) in col_labels.iter().enumerate() {
        col_groups.entry(q).or_default().push(j);
    }

    let mut blocks = Vec::new();
    let mut candidates = Vec::new();
    for (label, rows) in row_groups {
        let Some(cols) = col_groups.get(&label) else {
            continue;
        };
        let sub = Mat::from_fn(rows.len(), cols.len(), |i, j| m.read(rows[i], cols[j]));
        let svd = sub.thin_svd();
        let s = svd.s_diagonal();
        for index in 0..s.nrows() {
            let value = s.read(index).re;
            if !value.is_finite() {
                return Err(TnError::Numerical("non-finite singular value".into()));
            }
            candidates.push(Candidate {
                value,
                block: blocks.len(),
                index,
            });
        }
        blocks.push(Block {
            label,
            rows,
            cols: cols.clone(),
            u: svd.u().to_owned(),
            v: svd.v().to_owned(),
        });
    }

    if candidates.is_empty() {
        return Err(TnError::Charges(
            "no charge sector shared by rows and columns".into(),
        ));
    }

    candidates.sort_by(|a, b| b.value.total_cmp(&a.value));
    let largest = candidates[0].value;
    let total: f64 = candidates.iter().map(|c| c.value * c.value).sum();

    let mut kept = candidates
        .iter()
        .take_while(|c| c.value > ZERO_SV * largest)
        .count()
        .min(trunc.max_bond)
        .max(1);

    let mut discarded: f64 = candidates[kept..].iter().map(|c| c.value * c.value).sum();
    if total > 0.0 {
        while kept > 1 {
            let w = candidates[kept - 1].value.powi(2);
            if (discarded + w) / total > trunc.cutoff {
                break;
            }
            discarded += w;
            kept -= 1;
        }
    }

    let mut u = Mat::<C64>::zeros(nrows, kept);
    let mut vh = Mat::<C64>::zeros(kept, ncols);
    let mut s = Vec::with_capacity(kept);
    let mut out_labels = Vec::with_capacity(kept);
    for (n, c) in candidates[..kept].iter().enumerate() {
        let block = &blocks[c.block];
        for (i, &row) in block.rows.iter().enumerate() {
            u.write(row, n, block.u.read(i, c.index));
        }
        for (j, &col) in block.cols.iter().enumerate() {
            vh.write(n, col, block.v.read(j, c.index).conj());
        }
        s.push(c.value);
        out_labels.push(block.label);
    }

    Ok(Factorization {
        u,
        s,
        vh,
        labels: labels.map(|_| out_labels),
        discarded: if total > 0.0 { discarded / total } else { 0.0 },
    })
}

#[cfg(test)]
mod tests {
    use super::{factorize, Truncation};
    use crate::mps::C64;
    use faer::Mat;

    fn reconstruct(f: &super::Factorization) -> Mat<C64> {
        let us = f.u_s();
        Mat::from_fn(us.nrows(), f.vh.ncols(), |i, j| {
            (0..f.kept()).map(|k| us.read(i, k) * f.vh.read(k, j)).sum()
        })
    }

    #[test]
    fn exact_factorization_reconstructs() {
        let m = Mat::from_fn(3, 4, |i, j| C64::new((i + 2 * j) as f64, (i * j) as f64 - 1.0));
        let f = factorize(&m, None, Truncation::exact()).unwrap();
        let r = reconstruct(&f);
        for i in 0..3 {
            for j in 0..4 {
                assert!((r.read(i, j) - m.read(i, j)).norm() < 1e-10);
            }
        }
        assert!(f.labels.is_none());
    }

    #[test]
    fn max_bond_limits_rank() {
        let m = Mat::from_fn(4, 4, |i, j| C64::new(if i == j { (4 - i) as f64 } else { 0.0 }, 0.0));
        let f = factorize(
            &m,
            None,
            Truncation {
                max_bond: 2,
                cutoff: 0.0,
            },
        )
        .unwrap();
        assert_eq!(f.kept(), 2);
        assert!((f.s[0] - 4.0).abs() < 1e-12);
        assert!((f.s[1] - 3.0).abs() < 1e-12);
        assert!((f.discarded - 5.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn blocks_keep_their_labels() {
        // rows/cols labelled 0,1,0,1: two independent 2x2 blocks
        let m = Mat::from_fn(4, 4, |i, j| {
            if i % 2 == j % 2 {
                C64::new(1.0 + (i + j) as f64, 0.0)
            } else {
                C64::new(0.0, 0.0)
            }
        });
        let labels = [0, 1, 0, 1];
        let f = factorize(&m, Some((&labels, &labels)), Truncation::exact()).unwrap();
        let out = f.labels.as_ref().unwrap();
        for (n, &q) in out.iter().enumerate() {
            for i in 0..4 {
                if labels[i] != q {
                    assert!(f.u.read(i, n).norm() < 1e-14);
                    assert!(f.vh.read(n, i).norm() < 1e-14);
                }
            }
        }
        let r = reconstruct(&f);
        for i in 0..4 {
            for j in 0..4 {
                assert!((r.read(i, j) - m.read(i, j)).norm() < 1e-10);
            }
        }
    }

    #[test]
    fn cutoff_drops_small_weight() {
        let m = Mat::from_fn(3, 3, |i, j| {
            C64::new(if i == j { [1.0, 1e-4, 1e-7][i] } else { 0.0 }, 0.0)
        });
        let f = factorize(
            &m,
            None,
            Truncation {
                max_bond: 10,
                cutoff: 1e-10,
            },
        )
        .unwrap();
        assert_eq!(f.kept(), 2);
    }
}
