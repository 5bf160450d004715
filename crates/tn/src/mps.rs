use crate::charges::ChargeLayout;
use crate::error::{TnError, TnResult};
use crate::truncation::{factorize, Factorization, Truncation};
use faer::Mat;
use num_complex::Complex64;

pub type C64 = Complex64;

#[derive(Clone, Debug)]
pub struct Tensor3 {
    pub data: Vec<C64>,
    pub dl: usize,
    pub dp: usize,
    pub dr: usize,
}

impl Tensor3 {
    pub fn zeros(dl: usize, dp: usize, dr: usize) -> Self {
        Self {
            data: vec![C64::new(0.0, 0.0); dl * dp * dr],
            dl,
            dp,
            dr,
        }
    }

    #[inline]
    fn idx(&self, l: usize, p: usize, r: usize) -> usize {
        (l * self.dp + p) * self.dr + r
    }

    pub fn get(&self, l: usize, p: usize, r: usize) -> C64 {
        self.data[self.idx(l, p, r)]
    }

    pub fn set(&mut self, l: usize, p: usize, r: usize, v: C64) {
        let i = self.idx(l, p, r);
        self.data[i] = v;
    }

    pub fn add(&mut self, l: usize, p: usize, r: usize, v: C64) {
        let i = self.idx(l, p, r);
        self.data[i] += v;
    }

    pub fn norm_sqr(&self) -> f64 {
        self.data.iter().map(|x| x.norm_sqr()).sum()
    }

    pub fn scale(&mut self, f: C64) {
        for x in self.data.iter_mut() {
            *x *= f;
        }
    }

    /// Rows `(l, p)`, columns `r`.
    pub fn to_left_matrix(&self) -> Mat<C64> {
        Mat::from_fn(self.dl * self.dp, self.dr, |i, r| {
            self.get(i / self.dp, i % self.dp, r)
        })
    }

    /// Rows `l`, columns `(p, r)`.
    pub fn to_right_matrix(&self) -> Mat<C64> {
        Mat::from_fn(self.dl, self.dp * self.dr, |l, j| {
            self.get(l, j / self.dr, j % self.dr)
        })
    }

    pub fn from_left_matrix(m: &Mat<C64>, dl: usize, dp: usize) -> Self {
        let mut t = Self::zeros(dl, dp, m.ncols());
        for i in 0..m.nrows() {
            for r in 0..m.ncols() {
                t.set(i / dp, i % dp, r, m.read(i, r));
            }
        }
        t
    }

    pub fn from_right_matrix(m: &Mat<C64>, dp: usize, dr: usize) -> Self {
        let mut t = Self::zeros(m.nrows(), dp, dr);
        for l in 0..m.nrows() {
            for j in 0..m.ncols() {
                t.set(l, j / dr, j % dr, m.read(l, j));
            }
        }
        t
    }
}

/// Per-bond flux labels of a charge-conserving MPS (`len + 1` bonds).
#[derive(Clone, Debug)]
pub(crate) struct BondCharges {
    pub layout: ChargeLayout,
    pub bonds: Vec<Vec<usize>>,
}

/// A finite matrix product state.
///
/// Site `k` holds `A[l, s, r]` with bond dimension 1 at both chain ends. The
/// state tracks its orthogonality center: every site left of the center is
/// left-orthonormal and every site right of it right-orthonormal. Any local
/// contraction moves the center first with [`MPS::position`]; code that edits
/// site tensors directly must call [`MPS::invalidate_center`].
#[derive(Clone, Debug)]
pub struct MPS {
    pub(crate) sites: Vec<Tensor3>,
    pub(crate) center: Option<usize>,
    pub(crate) charges: Option<BondCharges>,
}

impl MPS {
    /// Product state from one local amplitude vector per site.
    pub fn product(vectors: Vec<Vec<C64>>) -> TnResult<Self> {
        if vectors.is_empty() {
            return Err(TnError::EmptySystem);
        }
        let mut sites = Vec::with_capacity(vectors.len());
        for (k, v) in vectors.into_iter().enumerate() {
            let norm = v.iter().map(|x| x.norm_sqr()).sum::<f64>().sqrt();
            if v.is_empty() || norm == 0.0 || !norm.is_finite() {
                return Err(TnError::Shape(format!("site {} has a null local vector", k)));
            }
            let mut t = Tensor3::zeros(1, v.len(), 1);
            for (p, x) in v.iter().enumerate() {
                t.set(0, p, 0, x / norm);
            }
            sites.push(t);
        }
        Ok(Self {
            sites,
            center: Some(0),
            charges: None,
        })
    }

    /// Computational basis state `|s_0 s_1 ...⟩`.
    pub fn basis_state(dims: &[usize], states: &[usize]) -> TnResult<Self> {
        if dims.len() != states.len() {
            return Err(TnError::Shape(format!(
                "{} states for {} sites",
                states.len(),
                dims.len()
            )));
        }
        let vectors = dims
            .iter()
            .zip(states)
            .enumerate()
            .map(|(k, (&d, &s))| {
                if s >= d {
                    return Err(TnError::Shape(format!(
                        "state {} out of range on site {} (dim {})",
                        s, k, d
                    )));
                }
                let mut v = vec![C64::new(0.0, 0.0); d];
                v[s] = C64::new(1.0, 0.0);
                Ok(v)
            })
            .collect::<TnResult<Vec<_>>>()?;
        Self::product(vectors)
    }

    /// Basis state carrying charge labels; its total charge is fixed from
    /// here on by every operation that preserves the labels.
    pub fn basis_state_with_charges(layout: &ChargeLayout, states: &[usize]) -> TnResult<Self> {
        let bonds = layout.product_fluxes(states)?;
        let dims: Vec<usize> = (0..layout.len()).map(|k| layout.dim(k)).collect();
        let mut mps = Self::basis_state(&dims, states)?;
        mps.charges = Some(BondCharges {
            layout: layout.clone(),
            bonds,
        });
        Ok(mps)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn site(&self, k: usize) -> &Tensor3 {
        &self.sites[k]
    }

    pub fn sites(&self) -> &[Tensor3] {
        &self.sites
    }

    pub fn phys_dims(&self) -> Vec<usize> {
        self.sites.iter().map(|s| s.dp).collect()
    }

    /// Dimensions of the `len - 1` internal bonds.
    pub fn bond_dims(&self) -> Vec<usize> {
        self.sites[..self.len() - 1].iter().map(|s| s.dr).collect()
    }

    pub fn max_bond(&self) -> usize {
        self.sites
            .iter()
            .map(|s| s.dl.max(s.dr))
            .max()
            .unwrap_or(1)
    }

    pub fn center(&self) -> Option<usize> {
        self.center
    }

    pub fn invalidate_center(&mut self) {
        self.center = None;
    }

    pub fn charge_layout(&self) -> Option<&ChargeLayout> {
        self.charges.as_ref().map(|c| &c.layout)
    }

    /// Total charge, when the state carries charge labels.
    pub fn total_charge(&self) -> Option<usize> {
        self.charges
            .as_ref()
            .and_then(|c| c.bonds.last())
            .and_then(|b| b.first().copied())
    }

    pub(crate) fn bond_labels(&self, bond: usize) -> Option<&[usize]> {
        self.charges.as_ref().map(|c| c.bonds[bond].as_slice())
    }

    pub(crate) fn set_bond_labels(&mut self, bond: usize, labels: Option<Vec<usize>>) {
        if let (Some(c), Some(l)) = (self.charges.as_mut(), labels) {
            c.bonds[bond] = l;
        }
    }

    /// Row labels of site `k` seen as a `(l, s) x r` matrix.
    pub(crate) fn left_row_labels(&self, k: usize) -> Option<Vec<usize>> {
        let c = self.charges.as_ref()?;
        let t = &self.sites[k];
        let mut out = Vec::with_capacity(t.dl * t.dp);
        for l in 0..t.dl {
            for p in 0..t.dp {
                out.push(c.layout.add(c.bonds[k][l], c.layout.charge(k, p)));
            }
        }
        Some(out)
    }

    /// Column labels of site `k` seen as an `l x (s, r)` matrix.
    pub(crate) fn right_col_labels(&self, k: usize) -> Option<Vec<usize>> {
        let c = self.charges.as_ref()?;
        let t = &self.sites[k];
        let mut out = Vec::with_capacity(t.dp * t.dr);
        for p in 0..t.dp {
            for r in 0..t.dr {
                out.push(c.layout.sub(c.bonds[k + 1][r], c.layout.charge(k, p)));
            }
        }
        Some(out)
    }

    fn check_site(&self, k: usize) -> TnResult<()> {
        if k >= self.len() {
            return Err(TnError::SiteOutOfRange {
                site: k,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Moves the orthogonality center to site `k`.
    pub fn position(&mut self, k: usize) -> TnResult<()> {
        self.check_site(k)?;
        match self.center {
            Some(c) => {
                for i in c..k {
                    self.shift_right(i)?;
                }
                for i in (k + 1..=c).rev() {
                    self.shift_left(i)?;
                }
            }
            None => {
                for i in 0..k {
                    self.shift_right(i)?;
                }
                for i in (k + 1..self.len()).rev() {
                    self.shift_left(i)?;
                }
            }
        }
        self.center = Some(k);
        Ok(())
    }

    /// Left-orthonormalizes site `i` and pushes the remainder into `i + 1`.
    fn shift_right(&mut self, i: usize) -> TnResult<()> {
        let m = self.sites[i].to_left_matrix();
        let rows = self.left_row_labels(i);
        let cols = self.bond_labels(i + 1).map(|l| l.to_vec());
        let f = factorize_labelled(&m, rows, cols, Truncation::exact())?;

        let dl = self.sites[i].dl;
        let dp = self.sites[i].dp;
        self.sites[i] = Tensor3::from_left_matrix(&f.u, dl, dp);

        let carry = f.s_vh();
        let next = &self.sites[i + 1];
        let mut out = Tensor3::zeros(carry.nrows(), next.dp, next.dr);
        for a in 0..carry.nrows() {
            for m in 0..carry.ncols() {
                let c = carry.read(a, m);
                if c == C64::new(0.0, 0.0) {
                    continue;
                }
                for p in 0..next.dp {
                    for r in 0..next.dr {
                        out.add(a, p, r, c * next.get(m, p, r));
                    }
                }
            }
        }
        self.sites[i + 1] = out;
        self.set_bond_labels(i + 1, f.labels);
        Ok(())
    }

    /// Right-orthonormalizes site `i` and pushes the remainder into `i - 1`.
    fn shift_left(&mut self, i: usize) -> TnResult<()> {
        let m = self.sites[i].to_right_matrix();
        let rows = self.bond_labels(i).map(|l| l.to_vec());
        let cols = self.right_col_labels(i);
        let f = factorize_labelled(&m, rows, cols, Truncation::exact())?;

        let dp = self.sites[i].dp;
        let dr = self.sites[i].dr;
        self.sites[i] = Tensor3::from_right_matrix(&f.vh, dp, dr);

        let carry = f.u_s();
        let prev = &self.sites[i - 1];
        let mut out = Tensor3::zeros(prev.dl, prev.dp, carry.ncols());
        for l in 0..prev.dl {
            for p in 0..prev.dp {
                for m in 0..prev.dr {
                    let a = prev.get(l, p, m);
                    if a == C64::new(0.0, 0.0) {
                        continue;
                    }
                    for r in 0..carry.ncols() {
                        out.add(l, p, r, a * carry.read(m, r));
                    }
                }
            }
        }
        self.sites[i - 1] = out;
        self.set_bond_labels(i, f.labels);
        Ok(())
    }

    /// ⟨self|other⟩
    pub fn overlap(&self, other: &MPS) -> TnResult<C64> {
        if self.len() != other.len() {
            return Err(TnError::Shape(format!(
                "overlap of chains with {} and {} sites",
                self.len(),
                other.len()
            )));
        }
        let mut env = vec![C64::new(1.0, 0.0)];
        for (a, b) in self.sites.iter().zip(&other.sites) {
            if a.dp != b.dp {
                return Err(TnError::Shape("physical dimensions differ".into()));
            }
            env = crate::env::overlap_left_step(&env, a, b);
        }
        Ok(env[0])
    }

    pub fn norm(&self) -> f64 {
        match self.center {
            Some(c) => self.sites[c].norm_sqr().sqrt(),
            None => self
                .overlap(self)
                .map(|x| x.re.max(0.0).sqrt())
                .unwrap_or(0.0),
        }
    }

    pub fn normalize(&mut self) -> TnResult<()> {
        if self.center.is_none() {
            self.position(0)?;
        }
        let c = self.center.unwrap_or(0);
        let n = self.sites[c].norm_sqr().sqrt();
        if n == 0.0 || !n.is_finite() {
            return Err(TnError::Numerical("cannot normalize a null state".into()));
        }
        self.sites[c].scale(C64::new(1.0 / n, 0.0));
        Ok(())
    }

    /// `op` is a `d x d` row-major matrix, rows = output state.
    pub fn apply_site_op(&mut self, k: usize, op: &[C64]) -> TnResult<()> {
        self.check_site(k)?;
        let s = &self.sites[k];
        let d = s.dp;
        if op.len() != d * d {
            return Err(TnError::Shape(format!(
                "operator of {} entries on a site of dimension {}",
                op.len(),
                d
            )));
        }
        if let Some(c) = &self.charges {
            for out in 0..d {
                for inp in 0..d {
                    if op[out * d + inp] != C64::new(0.0, 0.0)
                        && c.layout.charge(k, out) != c.layout.charge(k, inp)
                    {
                        return Err(TnError::Charges(format!(
                            "operator on site {} changes the charge",
                            k
                        )));
                    }
                }
            }
        }

        let mut out = Tensor3::zeros(s.dl, d, s.dr);
        for l in 0..s.dl {
            for r in 0..s.dr {
                for p in 0..d {
                    let mut acc = C64::new(0.0, 0.0);
                    for pp in 0..d {
                        acc += op[p * d + pp] * s.get(l, pp, r);
                    }
                    out.set(l, p, r, acc);
                }
            }
        }
        self.sites[k] = out;
        if self.center != Some(k) {
            self.center = None;
        }
        Ok(())
    }

    /// ⟨ψ| O_first O_{first+1} ... |ψ⟩ for a run of single-site operators
    /// starting at `first`; `None` stands for the identity.
    ///
    /// The center is moved to `first` so that everything outside the run
    /// contracts to the identity; the state is assumed normalized.
    pub fn expect_string(&mut self, first: usize, ops: &[Option<&[C64]>]) -> TnResult<C64> {
        if ops.is_empty() {
            return Err(TnError::Shape("empty operator string".into()));
        }
        let last = first + ops.len() - 1;
        self.check_site(last)?;
        self.position(first)?;

        let dl = self.sites[first].dl;
        let mut env = vec![C64::new(0.0, 0.0); dl * dl];
        for l in 0..dl {
            env[l * dl + l] = C64::new(1.0, 0.0);
        }
        for (k, op) in ops.iter().enumerate() {
            let a = &self.sites[first + k];
            if let Some(op) = op {
                if op.len() != a.dp * a.dp {
                    return Err(TnError::Shape(format!(
                        "operator of {} entries on a site of dimension {}",
                        op.len(),
                        a.dp
                    )));
                }
            }
            env = crate::env::string_step(&env, a, *op);
        }
        let dr = self.sites[last].dr;
        Ok((0..dr).map(|r| env[r * dr + r]).sum())
    }

    /// Schmidt values across the cut with `cut` sites on the left.
    pub fn schmidt_values(&mut self, cut: usize) -> TnResult<Vec<f64>> {
        if cut == 0 || cut >= self.len() {
            return Err(TnError::SiteOutOfRange {
                site: cut,
                len: self.len(),
            });
        }
        self.position(cut - 1)?;
        let m = self.sites[cut - 1].to_left_matrix();
        let rows = self.left_row_labels(cut - 1);
        let cols = self.bond_labels(cut).map(|l| l.to_vec());
        let f = factorize_labelled(&m, rows, cols, Truncation::exact())?;
        Ok(f.s)
    }

    /// Full state vector, site 0 most significant. Exponential in size.
    pub fn to_dense(&self) -> Vec<C64> {
        let mut psi = vec![C64::new(1.0, 0.0)];
        let mut bond = 1;
        for t in &self.sites {
            let mut next = vec![C64::new(0.0, 0.0); psi.len() / bond * t.dp * t.dr];
            let configs = psi.len() / bond;
            for c in 0..configs {
                for l in 0..t.dl {
                    let x = psi[c * bond + l];
                    if x == C64::new(0.0, 0.0) {
                        continue;
                    }
                    for p in 0..t.dp {
                        for r in 0..t.dr {
                            next[(c * t.dp + p) * t.dr + r] += x * t.get(l, p, r);
                        }
                    }
                }
            }
            psi = next;
            bond = t.dr;
        }
        psi
    }
}

pub(crate) fn factorize_labelled(
    m: &Mat<C64>,
    rows: Option<Vec<usize>>,
    cols: Option<Vec<usize>>,
    trunc: Truncation,
) -> TnResult<Factorization> {
    match (rows, cols) {
        (Some(r), Some(c)) => factorize(m, Some((&r, &c)), trunc),
        _ => factorize(m, None, trunc),
    }
}

#[cfg(test)]
mod tests {
    use super::{C64, MPS};
    use crate::charges::ChargeLayout;

    fn c(re: f64, im: f64) -> C64 {
        C64::new(re, im)
    }

    fn ghz_like(n: usize) -> MPS {
        // (|00..0> + i|11..1>)/sqrt(2) with bond dimension 2
        let mut mps = MPS::basis_state(&vec![2; n], &vec![0; n]).unwrap();
        for k in 0..n {
            let dl = if k == 0 { 1 } else { 2 };
            let dr = if k == n - 1 { 1 } else { 2 };
            let mut t = super::Tensor3::zeros(dl, 2, dr);
            for b in 0..2 {
                let l = if k == 0 { 0 } else { b };
                let r = if k == n - 1 { 0 } else { b };
                let mut v = c(1.0, 0.0);
                if k == 0 {
                    v = if b == 0 { c(0.5f64.sqrt(), 0.0) } else { c(0.0, 0.5f64.sqrt()) };
                }
                t.set(l, b, r, v);
            }
            mps.sites[k] = t;
        }
        mps.invalidate_center();
        mps
    }

    #[test]
    fn position_preserves_state_and_norm() {
        let mut mps = ghz_like(5);
        let before = mps.to_dense();
        mps.position(3).unwrap();
        let after = mps.to_dense();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).norm() < 1e-12);
        }
        assert!((mps.norm() - 1.0).abs() < 1e-12);
        assert_eq!(mps.center(), Some(3));
    }

    #[test]
    fn sites_left_of_center_are_left_orthonormal() {
        let mut mps = ghz_like(4);
        mps.position(2).unwrap();
        for k in 0..2 {
            let t = mps.site(k);
            for r in 0..t.dr {
                for rp in 0..t.dr {
                    let mut acc = c(0.0, 0.0);
                    for l in 0..t.dl {
                        for p in 0..t.dp {
                            acc += t.get(l, p, r).conj() * t.get(l, p, rp);
                        }
                    }
                    let expect = if r == rp { 1.0 } else { 0.0 };
                    assert!((acc - c(expect, 0.0)).norm() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn string_expectation_on_ghz() {
        let mut mps = ghz_like(4);
        let z = [c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(-1.0, 0.0)];
        let zz = mps.expect_string(1, &[Some(&z), None, Some(&z)]).unwrap();
        assert!((zz - c(1.0, 0.0)).norm() < 1e-12);
        let z1 = mps.expect_string(0, &[Some(&z)]).unwrap();
        assert!(z1.norm() < 1e-12);
    }

    #[test]
    fn schmidt_values_of_ghz() {
        let mut mps = ghz_like(4);
        let s = mps.schmidt_values(2).unwrap();
        assert_eq!(s.len(), 2);
        for x in s {
            assert!((x - 0.5f64.sqrt()).abs() < 1e-12);
        }
    }

    #[test]
    fn overlap_of_orthogonal_basis_states() {
        let a = MPS::basis_state(&[3, 3], &[0, 1]).unwrap();
        let b = MPS::basis_state(&[3, 3], &[1, 0]).unwrap();
        assert!(a.overlap(&b).unwrap().norm() < 1e-15);
        assert!((a.overlap(&a).unwrap() - c(1.0, 0.0)).norm() < 1e-15);
    }

    #[test]
    fn charged_state_keeps_its_total() {
        let layout = ChargeLayout::cyclic(3, 4).unwrap();
        let mut mps = MPS::basis_state_with_charges(&layout, &[2, 1, 0, 2]).unwrap();
        assert_eq!(mps.total_charge(), Some(2));
        mps.position(3).unwrap();
        assert_eq!(mps.total_charge(), Some(2));
    }

    #[test]
    fn charge_changing_operator_is_rejected() {
        let layout = ChargeLayout::cyclic(2, 2).unwrap();
        let mut mps = MPS::basis_state_with_charges(&layout, &[0, 0]).unwrap();
        let flip = [c(0.0, 0.0), c(1.0, 0.0), c(1.0, 0.0), c(0.0, 0.0)];
        assert!(mps.apply_site_op(0, &flip).is_err());
    }
}
