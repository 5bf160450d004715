//! Two-site DMRG.
//!
//! Each sweep runs left to right and back. The local problem is solved
//! matrix-free with [`lowest_eigenpair`]; a non-zero sweep noise widens the
//! kept basis with the perturbed reduced density matrix
//! `ρ + noise · Σ_w (H_w θ)(H_w θ)†`, built as one SVD of the augmented matrix
//! `[θ | sqrt(noise) · H_w θ]`.
//!
//! With charge labels on the state every local vector is projected onto the
//! allowed blocks after each product, so the total charge never drifts.

use crate::env::{left_step, overlap_left_step, overlap_right_step, right_step};
use crate::error::{TnError, TnResult};
use crate::lanczos::{lowest_eigenpair, LanczosParams};
use crate::mpo::{Tensor4, MPO};
use crate::mps::{Tensor3, C64, MPS};
use crate::sweeps::{SweepParams, Sweeps};
use crate::truncation::{factorize, Factorization, Truncation};
use faer::Mat;

const ZERO: C64 = C64::new(0.0, 0.0);

#[derive(Clone, Debug, PartialEq)]
pub struct DmrgOptions {
    /// Suppresses the per-sweep report.
    pub quiet: bool,
    /// Energy penalty applied to each state passed to [`dmrg_deflated`].
    pub weight: f64,
    pub krylov_dim: usize,
    pub eigen_tol: f64,
}

impl Default for DmrgOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            weight: 20.0,
            krylov_dim: 10,
            eigen_tol: 1e-10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DmrgResult {
    /// `⟨ψ|H|ψ⟩` of the final state, penalty excluded.
    pub energy: f64,
    pub state: MPS,
    /// Local eigenvalue at the end of every sweep.
    pub sweep_energies: Vec<f64>,
    /// Largest discarded weight seen in the last sweep.
    pub truncation_error: f64,
}

pub fn dmrg(h: &MPO, psi0: MPS, sweeps: &Sweeps, opts: &DmrgOptions) -> TnResult<DmrgResult> {
    dmrg_deflated(h, &[], psi0, sweeps, opts)
}

/// Lowest state of `H + weight · Σ_φ |φ⟩⟨φ|` over the `orthogonal` states.
pub fn dmrg_deflated(
    h: &MPO,
    orthogonal: &[MPS],
    psi0: MPS,
    sweeps: &Sweeps,
    opts: &DmrgOptions,
) -> TnResult<DmrgResult> {
    check_inputs(h, orthogonal, &psi0)?;
    if sweeps.is_empty() {
        return Err(TnError::Shape("empty sweep schedule".into()));
    }

    let mut solver = Solver::new(h, orthogonal, psi0, opts)?;
    let n = solver.psi.len();
    let mut sweep_energies = Vec::with_capacity(sweeps.len());
    let mut truncation_error = 0.0;

    for (sweep, params) in sweeps.iter().enumerate() {
        let mut energy = f64::NAN;
        truncation_error = 0.0f64;
        for i in 0..n - 1 {
            let (e, err) = solver.update_bond(i, Direction::Right, params)?;
            energy = e;
            truncation_error = truncation_error.max(err);
        }
        for i in (0..n - 1).rev() {
            let (e, err) = solver.update_bond(i, Direction::Left, params)?;
            energy = e;
            truncation_error = truncation_error.max(err);
        }
        sweep_energies.push(energy);
        if !opts.quiet {
            println!(
                "    sweep {}/{}  E = {:.12}  max bond = {}  trunc = {:.3e}",
                sweep + 1,
                sweeps.len(),
                energy,
                solver.psi.max_bond(),
                truncation_error
            );
        }
    }

    let mut state = solver.psi;
    state.center = Some(0);
    let norm2 = state.overlap(&state)?.re;
    if norm2 <= 0.0 || !norm2.is_finite() {
        return Err(TnError::Numerical("DMRG produced a null state".into()));
    }
    let energy = h.expect(&state)?.re / norm2;
    if !energy.is_finite() {
        return Err(TnError::Numerical("non-finite energy".into()));
    }

    Ok(DmrgResult {
        energy,
        state,
        sweep_energies,
        truncation_error,
    })
}

fn check_inputs(h: &MPO, orthogonal: &[MPS], psi: &MPS) -> TnResult<()> {
    if psi.len() < 2 {
        return Err(TnError::Shape("two-site DMRG needs at least two sites".into()));
    }
    if h.len() != psi.len() || h.phys_dims() != psi.phys_dims() {
        return Err(TnError::Shape("Hamiltonian and state live on different chains".into()));
    }
    for phi in orthogonal {
        if phi.phys_dims() != psi.phys_dims() {
            return Err(TnError::Shape("deflated state lives on a different chain".into()));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Right,
    Left,
}

struct Solver<'a> {
    h: &'a MPO,
    orthogonal: &'a [MPS],
    psi: MPS,
    opts: &'a DmrgOptions,
    /// `lenv[k]` covers sites `0..k`, `renv[k]` sites `k..len`.
    lenv: Vec<Vec<C64>>,
    renv: Vec<Vec<C64>>,
    /// Same layout per deflated state, `[ψ, φ]`.
    lo: Vec<Vec<Vec<C64>>>,
    ro: Vec<Vec<Vec<C64>>>,
}

impl<'a> Solver<'a> {
    fn new(
        h: &'a MPO,
        orthogonal: &'a [MPS],
        mut psi: MPS,
        opts: &'a DmrgOptions,
    ) -> TnResult<Self> {
        let n = psi.len();
        psi.position(0)?;
        psi.normalize()?;

        let one = vec![C64::new(1.0, 0.0)];
        let mut lenv = vec![Vec::new(); n + 1];
        let mut renv = vec![Vec::new(); n + 1];
        lenv[0] = one.clone();
        renv[n] = one.clone();
        for k in (1..n).rev() {
            renv[k] = right_step(&renv[k + 1], &psi.sites[k], &h.sites[k]);
        }

        let mut lo = Vec::with_capacity(orthogonal.len());
        let mut ro = Vec::with_capacity(orthogonal.len());
        for phi in orthogonal {
            let mut l = vec![Vec::new(); n + 1];
            let mut r = vec![Vec::new(); n + 1];
            l[0] = one.clone();
            r[n] = one.clone();
            for k in (1..n).rev() {
                r[k] = overlap_right_step(&r[k + 1], &psi.sites[k], &phi.sites[k]);
            }
            lo.push(l);
            ro.push(r);
        }

        Ok(Self {
            h,
            orthogonal,
            psi,
            opts,
            lenv,
            renv,
            lo,
            ro,
        })
    }

    /// Optimizes sites `(i, i + 1)` and moves the center one step along
    /// `dir`. Returns the local eigenvalue and the discarded weight.
    fn update_bond(
        &mut self,
        i: usize,
        dir: Direction,
        params: &SweepParams,
    ) -> TnResult<(f64, f64)> {
        let a = &self.psi.sites[i];
        let b = &self.psi.sites[i + 1];
        let (dl, d1, d2, dr) = (a.dl, a.dp, b.dp, b.dr);
        let theta0 = two_site(a, b);

        let mask = self.charge_mask(i, dl, d1, d2, dr);
        let penalties = self
            .orthogonal
            .iter()
            .enumerate()
            .map(|(j, phi)| {
                let mut v = deflation_vector(
                    &self.lo[j][i],
                    &self.ro[j][i + 2],
                    &phi.sites[i],
                    &phi.sites[i + 1],
                    dl,
                    dr,
                );
                project(&mut v, mask.as_deref());
                v
            })
            .collect();

        let eff = Effective {
            left: &self.lenv[i],
            right: &self.renv[i + 2],
            w1: &self.h.sites[i],
            w2: &self.h.sites[i + 1],
            dl,
            d1,
            d2,
            dr,
            mask,
            penalties,
            weight: self.opts.weight,
        };

        let mut start = theta0;
        project(&mut start, eff.mask.as_deref());
        let lanczos = LanczosParams {
            krylov_dim: self.opts.krylov_dim,
            restarts: params.niter,
            tol: self.opts.eigen_tol,
        };
        let (energy, theta) = lowest_eigenpair(|x| eff.apply(x), &start, &lanczos)?;

        let m = Mat::from_fn(dl * d1, d2 * dr, |row, col| theta[row * d2 * dr + col]);
        let (row_labels, col_labels) = self.split_labels(i, dl, d1, d2, dr);
        let trunc = params.truncation();

        let discarded = match dir {
            Direction::Right => {
                let extra = (params.noise > 0.0).then(|| {
                    let t = eff.left_half(&theta);
                    let cols = t.len() / (dl * d1);
                    Mat::from_fn(dl * d1, cols, |row, col| t[row * cols + col])
                });
                let f = row_basis(
                    &m,
                    extra.as_ref().map(|x| (x, params.noise)),
                    row_labels.as_deref(),
                    col_labels.as_deref(),
                    trunc,
                )?;
                let mut carry = adjoint_times(&f.u, &m);
                normalize_mat(&mut carry)?;
                self.psi.sites[i] = Tensor3::from_left_matrix(&f.u, dl, d1);
                self.psi.sites[i + 1] = Tensor3::from_right_matrix(&carry, d2, dr);
                self.psi.set_bond_labels(i + 1, f.labels.clone());
                self.psi.center = Some(i + 1);

                self.lenv[i + 1] = left_step(&self.lenv[i], &self.psi.sites[i], &self.h.sites[i]);
                for (j, phi) in self.orthogonal.iter().enumerate() {
                    self.lo[j][i + 1] =
                        overlap_left_step(&self.lo[j][i], &self.psi.sites[i], &phi.sites[i]);
                }
                f.discarded
            }
            Direction::Left => {
                let m_adj = Mat::from_fn(d2 * dr, dl * d1, |row, col| m.read(col, row).conj());
                let extra = (params.noise > 0.0).then(|| {
                    // rows (l, s1, w), columns (s2, r); stored adjoint
                    let t = eff.right_half(&theta);
                    let rows = t.len() / (d2 * dr);
                    Mat::from_fn(d2 * dr, rows, |row, col| t[col * d2 * dr + row].conj())
                });
                let f = row_basis(
                    &m_adj,
                    extra.as_ref().map(|x| (x, params.noise)),
                    col_labels.as_deref(),
                    row_labels.as_deref(),
                    trunc,
                )?;
                let vh =
                    Mat::from_fn(f.u.ncols(), f.u.nrows(), |row, col| f.u.read(col, row).conj());
                let mut carry = times(&m, &f.u);
                normalize_mat(&mut carry)?;
                self.psi.sites[i + 1] = Tensor3::from_right_matrix(&vh, d2, dr);
                self.psi.sites[i] = Tensor3::from_left_matrix(&carry, dl, d1);
                self.psi.set_bond_labels(i + 1, f.labels.clone());
                self.psi.center = Some(i);

                self.renv[i + 1] = right_step(
                    &self.renv[i + 2],
                    &self.psi.sites[i + 1],
                    &self.h.sites[i + 1],
                );
                for (j, phi) in self.orthogonal.iter().enumerate() {
                    self.ro[j][i + 1] = overlap_right_step(
                        &self.ro[j][i + 2],
                        &self.psi.sites[i + 1],
                        &phi.sites[i + 1],
                    );
                }
                f.discarded
            }
        };

        Ok((energy, discarded))
    }

    /// Entries of the two-site tensor allowed by the charge labels.
    fn charge_mask(
        &self,
        i: usize,
        dl: usize,
        d1: usize,
        d2: usize,
        dr: usize,
    ) -> Option<Vec<bool>> {
        let layout = self.psi.charge_layout()?;
        let left = self.psi.bond_labels(i)?;
        let right = self.psi.bond_labels(i + 2)?;
        let mut mask = Vec::with_capacity(dl * d1 * d2 * dr);
        for &fl in left {
            for s1 in 0..d1 {
                let q1 = layout.add(fl, layout.charge(i, s1));
                for s2 in 0..d2 {
                    let q2 = layout.add(q1, layout.charge(i + 1, s2));
                    mask.extend(right.iter().map(|&fr| fr == q2));
                }
            }
        }
        Some(mask)
    }

    /// Row labels `(l, s1)` and column labels `(s2, r)` of the two-site
    /// matrix, both expressed as the flux of the middle bond.
    fn split_labels(
        &self,
        i: usize,
        dl: usize,
        d1: usize,
        d2: usize,
        dr: usize,
    ) -> (Option<Vec<usize>>, Option<Vec<usize>>) {
        let (Some(layout), Some(left), Some(right)) = (
            self.psi.charge_layout(),
            self.psi.bond_labels(i),
            self.psi.bond_labels(i + 2),
        ) else {
            return (None, None);
        };
        let mut rows = Vec::with_capacity(dl * d1);
        for &fl in left {
            for s1 in 0..d1 {
                rows.push(layout.add(fl, layout.charge(i, s1)));
            }
        }
        let mut cols = Vec::with_capacity(d2 * dr);
        for s2 in 0..d2 {
            for &fr in right {
                cols.push(layout.sub(fr, layout.charge(i + 1, s2)));
            }
        }
        (Some(rows), Some(cols))
    }
}

/// Matrix-free two-site effective Hamiltonian, penalties included.
struct Effective<'a> {
    left: &'a [C64],
    right: &'a [C64],
    w1: &'a Tensor4,
    w2: &'a Tensor4,
    dl: usize,
    d1: usize,
    d2: usize,
    dr: usize,
    mask: Option<Vec<bool>>,
    penalties: Vec<Vec<C64>>,
    weight: f64,
}

impl Effective<'_> {
    /// `T[l', s1', wm, s2, r] = Σ L[l, wl, l'] W1[wl, s1', s1, wm] θ[l, s1, s2, r]`
    fn left_half(&self, theta: &[C64]) -> Vec<C64> {
        let (dl, d1, d2, dr) = (self.dl, self.d1, self.d2, self.dr);
        let (wl, wm) = (self.w1.dl, self.w1.dr);
        let tail = d2 * dr;
        let rest = d1 * tail;

        // T1[wl, l', s1, s2, r]
        let mut t1 = vec![ZERO; wl * dl * rest];
        for l in 0..dl {
            for wi in 0..wl {
                for lp in 0..dl {
                    let e = self.left[(l * wl + wi) * dl + lp];
                    if e == ZERO {
                        continue;
                    }
                    let dst = (wi * dl + lp) * rest;
                    let src = l * rest;
                    for j in 0..rest {
                        t1[dst + j] += e * theta[src + j];
                    }
                }
            }
        }

        let mut t2 = vec![ZERO; dl * d1 * wm * tail];
        for wi in 0..wl {
            for s1p in 0..d1 {
                for s1 in 0..d1 {
                    for wo in 0..wm {
                        let w = self.w1.get(wi, s1p, s1, wo);
                        if w == ZERO {
                            continue;
                        }
                        for lp in 0..dl {
                            let dst = ((lp * d1 + s1p) * wm + wo) * tail;
                            let src = (wi * dl + lp) * rest + s1 * tail;
                            for t in 0..tail {
                                t2[dst + t] += w * t1[src + t];
                            }
                        }
                    }
                }
            }
        }
        t2
    }

    /// `Y[l, s1, wm, s2', r'] = Σ W2[wm, s2', s2, wr] R[r, wr, r'] θ[l, s1, s2, r]`
    fn right_half(&self, theta: &[C64]) -> Vec<C64> {
        let (dl, d1, d2, dr) = (self.dl, self.d1, self.d2, self.dr);
        let (wm, wr) = (self.w2.dl, self.w2.dr);
        let head = dl * d1;

        // Q[l, s1, s2, wr, r']
        let mut q = vec![ZERO; head * d2 * wr * dr];
        for a in 0..head {
            for s2 in 0..d2 {
                for r in 0..dr {
                    let x = theta[(a * d2 + s2) * dr + r];
                    if x == ZERO {
                        continue;
                    }
                    for wo in 0..wr {
                        for rp in 0..dr {
                            q[((a * d2 + s2) * wr + wo) * dr + rp] +=
                                x * self.right[(r * wr + wo) * dr + rp];
                        }
                    }
                }
            }
        }

        let mut y = vec![ZERO; head * wm * d2 * dr];
        for wi in 0..wm {
            for s2p in 0..d2 {
                for s2 in 0..d2 {
                    for wo in 0..wr {
                        let w = self.w2.get(wi, s2p, s2, wo);
                        if w == ZERO {
                            continue;
                        }
                        for a in 0..head {
                            let dst = ((a * wm + wi) * d2 + s2p) * dr;
                            let src = ((a * d2 + s2) * wr + wo) * dr;
                            for rp in 0..dr {
                                y[dst + rp] += w * q[src + rp];
                            }
                        }
                    }
                }
            }
        }
        y
    }

    fn apply(&self, theta: &[C64]) -> Vec<C64> {
        let (dl, d1, d2, dr) = (self.dl, self.d1, self.d2, self.dr);
        let (wm, wr) = (self.w2.dl, self.w2.dr);
        let head = dl * d1;
        let tail = d2 * dr;
        let t2 = self.left_half(theta);

        // T3[a, s2', wr, r]
        let mut t3 = vec![ZERO; head * d2 * wr * dr];
        for wi in 0..wm {
            for s2p in 0..d2 {
                for s2 in 0..d2 {
                    for wo in 0..wr {
                        let w = self.w2.get(wi, s2p, s2, wo);
                        if w == ZERO {
                            continue;
                        }
                        for a in 0..head {
                            let dst = ((a * d2 + s2p) * wr + wo) * dr;
                            let src = (a * wm + wi) * tail + s2 * dr;
                            for r in 0..dr {
                                t3[dst + r] += w * t2[src + r];
                            }
                        }
                    }
                }
            }
        }

        let mut out = vec![ZERO; head * tail];
        for a in 0..head {
            for s2p in 0..d2 {
                for wo in 0..wr {
                    for r in 0..dr {
                        let x = t3[((a * d2 + s2p) * wr + wo) * dr + r];
                        if x == ZERO {
                            continue;
                        }
                        let dst = (a * d2 + s2p) * dr;
                        for rp in 0..dr {
                            out[dst + rp] += x * self.right[(r * wr + wo) * dr + rp];
                        }
                    }
                }
            }
        }

        for v in &self.penalties {
            let c: C64 = v.iter().zip(theta).map(|(a, b)| a.conj() * b).sum();
            let c = c * self.weight;
            for (o, x) in out.iter_mut().zip(v) {
                *o += c * x;
            }
        }
        project(&mut out, self.mask.as_deref());
        out
    }
}

fn project(v: &mut [C64], mask: Option<&[bool]>) {
    if let Some(mask) = mask {
        for (x, &keep) in v.iter_mut().zip(mask) {
            if !keep {
                *x = ZERO;
            }
        }
    }
}

/// `θ[l, s1, s2, r] = Σ_m A[l, s1, m] B[m, s2, r]`
fn two_site(a: &Tensor3, b: &Tensor3) -> Vec<C64> {
    let tail = b.dp * b.dr;
    let mut theta = vec![ZERO; a.dl * a.dp * tail];
    for l in 0..a.dl {
        for s1 in 0..a.dp {
            for m in 0..a.dr {
                let x = a.get(l, s1, m);
                if x == ZERO {
                    continue;
                }
                let dst = (l * a.dp + s1) * tail;
                let src = m * tail;
                for t in 0..tail {
                    theta[dst + t] += x * b.data[src + t];
                }
            }
        }
    }
    theta
}

/// Projection of a deflated state onto the current two-site basis,
/// `v[l, s1, s2, r] = ⟨l s1 s2 r|φ⟩`.
fn deflation_vector(
    left: &[C64],
    right: &[C64],
    p1: &Tensor3,
    p2: &Tensor3,
    dl: usize,
    dr: usize,
) -> Vec<C64> {
    let phi = two_site(p1, p2);
    let mid = p1.dp * p2.dp;
    let (fl, fr) = (p1.dl, p2.dr);

    // A[l, s1 s2, rφ]
    let mut a = vec![ZERO; dl * mid * fr];
    for l in 0..dl {
        for lf in 0..fl {
            let e = left[l * fl + lf];
            if e == ZERO {
                continue;
            }
            for j in 0..mid * fr {
                a[l * mid * fr + j] += e * phi[lf * mid * fr + j];
            }
        }
    }

    let mut v = vec![ZERO; dl * mid * dr];
    for lm in 0..dl * mid {
        for rf in 0..fr {
            let x = a[lm * fr + rf];
            if x == ZERO {
                continue;
            }
            for r in 0..dr {
                v[lm * dr + r] += x * right[r * fr + rf];
            }
        }
    }
    v
}

/// Kept orthonormal basis of the column space of `m`, widened by
/// `sqrt(noise) · extra` when given. With labels, each extra column is split
/// into its row-label blocks so the factorization stays block diagonal.
fn row_basis(
    m: &Mat<C64>,
    extra: Option<(&Mat<C64>, f64)>,
    rows: Option<&[usize]>,
    cols: Option<&[usize]>,
    trunc: Truncation,
) -> TnResult<Factorization> {
    let Some((x, noise)) = extra else {
        return match (rows, cols) {
            (Some(r), Some(c)) => factorize(m, Some((r, c)), trunc),
            _ => factorize(m, None, trunc),
        };
    };
    let scale = noise.sqrt();
    let (nr, nc, xc) = (m.nrows(), m.ncols(), x.ncols());

    match (rows, cols) {
        (Some(r), Some(c)) => {
            let mut blocks: Vec<usize> = r.to_vec();
            blocks.sort_unstable();
            blocks.dedup();
            let a = Mat::from_fn(nr, nc + blocks.len() * xc, |i, j| {
                if j < nc {
                    m.read(i, j)
                } else {
                    let (b, k) = ((j - nc) / xc, (j - nc) % xc);
                    if r[i] == blocks[b] {
                        x.read(i, k) * scale
                    } else {
                        ZERO
                    }
                }
            });
            let mut labels = c.to_vec();
            for &q in &blocks {
                labels.extend(std::iter::repeat(q).take(xc));
            }
            factorize(&a, Some((r, &labels)), trunc)
        }
        _ => {
            let a = Mat::from_fn(nr, nc + xc, |i, j| {
                if j < nc {
                    m.read(i, j)
                } else {
                    x.read(i, j - nc) * scale
                }
            });
            factorize(&a, None, trunc)
        }
    }
}

/// `U† M`
fn adjoint_times(u: &Mat<C64>, m: &Mat<C64>) -> Mat<C64> {
    Mat::from_fn(u.ncols(), m.ncols(), |i, j| {
        (0..u.nrows()).map(|k| u.read(k, i).conj() * m.read(k, j)).sum()
    })
}

/// `M U`
fn times(m: &Mat<C64>, u: &Mat<C64>) -> Mat<C64> {
    Mat::from_fn(m.nrows(), u.ncols(), |i, j| {
        (0..m.ncols()).map(|k| m.read(i, k) * u.read(k, j)).sum()
    })
}

fn normalize_mat(m: &mut Mat<C64>) -> TnResult<()> {
    let mut n2 = 0.0;
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            n2 += m.read(i, j).norm_sqr();
        }
    }
    let n = n2.sqrt();
    if n == 0.0 || !n.is_finite() {
        return Err(TnError::Numerical("truncation removed the whole state".into()));
    }
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            let v = m.read(i, j) / n;
            m.write(i, j, v);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{dmrg, dmrg_deflated, DmrgOptions};
    use crate::charges::ChargeLayout;
    use crate::error::TnError;
    use crate::mps::{C64, MPS};
    use crate::opsum::{LocalOp, OpSum, SiteSet};
    use crate::sweeps::Sweeps;
    use nalgebra::DMatrix;

    struct Spins {
        len: usize,
        charges: bool,
    }

    impl SiteSet for Spins {
        type Error = TnError;

        fn len(&self) -> usize {
            self.len
        }

        fn dim(&self, _site: usize) -> usize {
            2
        }

        fn op(&self, name: &str, site: usize) -> Result<LocalOp, TnError> {
            let z = C64::new(0.0, 0.0);
            let o = C64::new(1.0, 0.0);
            match name {
                "Sz" => Ok(vec![o, z, z, -o]),
                "Sx" => Ok(vec![z, o, o, z]),
                _ => Err(TnError::UnknownOperator {
                    name: name.to_string(),
                    site,
                }),
            }
        }

        fn charge_layout(&self) -> Option<ChargeLayout> {
            self.charges.then(|| ChargeLayout::cyclic(2, self.len).unwrap())
        }
    }

    /// Transverse-field Ising chain written in the X basis so that the
    /// spin-flip parity is the diagonal charge.
    fn ising(len: usize, g: f64) -> OpSum {
        let mut sum = OpSum::new();
        for i in 0..len - 1 {
            sum.add(-1.0, &[("Sx", i), ("Sx", i + 1)]);
        }
        for i in 0..len {
            sum.add(-g, &[("Sz", i)]);
        }
        sum
    }

    fn spectrum(dense: &[C64], dim: usize, keep: impl Fn(usize) -> bool) -> Vec<f64> {
        let idx: Vec<usize> = (0..dim).filter(|&c| keep(c)).collect();
        let m = DMatrix::<f64>::from_fn(idx.len(), idx.len(), |i, j| {
            dense[idx[i] * dim + idx[j]].re
        });
        let mut e: Vec<f64> = m.symmetric_eigen().eigenvalues.iter().cloned().collect();
        e.sort_by(|a, b| a.total_cmp(b));
        e
    }

    fn schedule() -> Sweeps {
        Sweeps::new(6)
            .max_bond(&[10, 20, 40])
            .cutoff(&[1e-12])
            .noise(&[1e-6, 1e-8, 0.0])
            .niter(&[4])
    }

    fn quiet() -> DmrgOptions {
        DmrgOptions {
            quiet: true,
            ..DmrgOptions::default()
        }
    }

    #[test]
    fn ground_energy_matches_exact_diagonalization() {
        let sites = Spins { len: 6, charges: false };
        let h = ising(6, 0.8).to_mpo(&sites).unwrap();
        let exact = spectrum(&h.to_dense(), 64, |_| true)[0];

        let psi0 = MPS::basis_state(&[2; 6], &[0, 1, 0, 0, 1, 0]).unwrap();
        let res = dmrg(&h, psi0, &schedule(), &quiet()).unwrap();
        assert!((res.energy - exact).abs() < 1e-8, "{} vs {}", res.energy, exact);
        assert!((res.state.norm() - 1.0).abs() < 1e-10);
        assert_eq!(res.sweep_energies.len(), 6);
    }

    #[test]
    fn charged_state_stays_in_its_sector() {
        let sites = Spins { len: 6, charges: true };
        let h = ising(6, 0.5).to_mpo(&sites).unwrap();
        let layout = sites.charge_layout().unwrap();
        let dense = h.to_dense();
        let odd = spectrum(&dense, 64, |c| c.count_ones() % 2 == 1)[0];

        let psi0 = MPS::basis_state_with_charges(&layout, &[1, 0, 0, 0, 0, 0]).unwrap();
        let res = dmrg(&h, psi0, &schedule(), &quiet()).unwrap();
        assert_eq!(res.state.total_charge(), Some(1));
        assert!((res.energy - odd).abs() < 1e-8, "{} vs {}", res.energy, odd);
    }

    #[test]
    fn deflation_reaches_the_first_excited_level() {
        let sites = Spins { len: 5, charges: false };
        let h = ising(5, 1.3).to_mpo(&sites).unwrap();
        let exact = spectrum(&h.to_dense(), 32, |_| true);

        let start = MPS::basis_state(&[2; 5], &[0; 5]).unwrap();
        let gs = dmrg(&h, start, &schedule(), &quiet()).unwrap();
        let psi0 = MPS::basis_state(&[2; 5], &[1, 0, 1, 0, 0]).unwrap();
        let ex = dmrg_deflated(&h, &[gs.state.clone()], psi0, &schedule(), &quiet()).unwrap();
        assert!((gs.energy - exact[0]).abs() < 1e-8);
        assert!((ex.energy - exact[1]).abs() < 1e-6, "{} vs {}", ex.energy, exact[1]);
        assert!(gs.state.overlap(&ex.state).unwrap().norm() < 1e-3);
    }

    #[test]
    fn single_site_chain_is_rejected() {
        let sites = Spins { len: 1, charges: false };
        let mut sum = OpSum::new();
        sum.add(1.0, &[("Sz", 0)]);
        let h = sum.to_mpo(&sites).unwrap();
        let psi0 = MPS::basis_state(&[2], &[0]).unwrap();
        assert!(dmrg(&h, psi0, &schedule(), &quiet()).is_err());
    }
}
