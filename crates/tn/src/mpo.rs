use crate::env::left_step;
use crate::error::{TnError, TnResult};
use crate::mps::{C64, MPS};

/// MPO site tensor `W[wl, s_out, s_in, wr]`.
#[derive(Clone, Debug)]
pub struct Tensor4 {
    pub data: Vec<C64>,
    pub dl: usize,
    pub dp: usize,
    pub dr: usize,
}

impl Tensor4 {
    pub fn zeros(dl: usize, dp: usize, dr: usize) -> Self {
        Self {
            data: vec![C64::new(0.0, 0.0); dl * dp * dp * dr],
            dl,
            dp,
            dr,
        }
    }

    #[inline]
    fn idx(&self, l: usize, out: usize, inp: usize, r: usize) -> usize {
        ((l * self.dp + out) * self.dp + inp) * self.dr + r
    }

    pub fn get(&self, l: usize, out: usize, inp: usize, r: usize) -> C64 {
        self.data[self.idx(l, out, inp, r)]
    }

    pub fn set(&mut self, l: usize, out: usize, inp: usize, r: usize, v: C64) {
        let i = self.idx(l, out, inp, r);
        self.data[i] = v;
    }

    /// Adds `coef * op` into the `(l, r)` operator slot.
    pub fn add_op(&mut self, l: usize, r: usize, coef: C64, op: &[C64]) {
        for out in 0..self.dp {
            for inp in 0..self.dp {
                let i = self.idx(l, out, inp, r);
                self.data[i] += coef * op[out * self.dp + inp];
            }
        }
    }
}

/// A matrix product operator with bond dimension 1 at both chain ends.
#[derive(Clone, Debug)]
pub struct MPO {
    pub(crate) sites: Vec<Tensor4>,
}

impl MPO {
    pub fn from_sites(sites: Vec<Tensor4>) -> TnResult<Self> {
        if sites.is_empty() {
            return Err(TnError::EmptySystem);
        }
        let n = sites.len();
        if sites[0].dl != 1 || sites[n - 1].dr != 1 {
            return Err(TnError::Shape("MPO boundary bonds must have dimension 1".into()));
        }
        for k in 1..n {
            if sites[k - 1].dr != sites[k].dl {
                return Err(TnError::Shape(format!("MPO bond mismatch at site {}", k)));
            }
        }
        Ok(Self { sites })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn site(&self, k: usize) -> &Tensor4 {
        &self.sites[k]
    }

    pub fn phys_dims(&self) -> Vec<usize> {
        self.sites.iter().map(|w| w.dp).collect()
    }

    pub fn bond_dims(&self) -> Vec<usize> {
        self.sites[..self.len() - 1].iter().map(|w| w.dr).collect()
    }

    pub fn max_bond(&self) -> usize {
        self.sites.iter().map(|w| w.dl.max(w.dr)).max().unwrap_or(1)
    }

    /// `⟨ψ|O|ψ⟩`, not divided by the norm of `ψ`.
    pub fn expect(&self, psi: &MPS) -> TnResult<C64> {
        if psi.len() != self.len() {
            return Err(TnError::Shape(format!(
                "MPO of {} sites applied to an MPS of {} sites",
                self.len(),
                psi.len()
            )));
        }
        let mut env = vec![C64::new(1.0, 0.0)];
        for (a, w) in psi.sites().iter().zip(&self.sites) {
            if a.dp != w.dp {
                return Err(TnError::Shape("physical dimensions differ".into()));
            }
            env = left_step(&env, a, w);
        }
        Ok(env[0])
    }

    /// Dense matrix (row = output configuration), site 0 most significant.
    /// Exponential in size.
    pub fn to_dense(&self) -> Vec<C64> {
        // T[(co, ci), w]
        let mut t = vec![C64::new(1.0, 0.0)];
        let mut rows = 1usize;
        let mut bond = 1usize;
        for w in &self.sites {
            let d = w.dp;
            let new_rows = rows * d;
            let mut next = vec![C64::new(0.0, 0.0); new_rows * new_rows * w.dr];
            for co in 0..rows {
                for ci in 0..rows {
                    for wl in 0..bond {
                        let x = t[(co * rows + ci) * bond + wl];
                        if x == C64::new(0.0, 0.0) {
                            continue;
                        }
                        for so in 0..d {
                            for si in 0..d {
                                for wr in 0..w.dr {
                                    let v = w.get(wl, so, si, wr);
                                    if v == C64::new(0.0, 0.0) {
                                        continue;
                                    }
                                    let r = co * d + so;
                                    let c = ci * d + si;
                                    next[(r * new_rows + c) * w.dr + wr] += x * v;
                                }
                            }
                        }
                    }
                }
            }
            t = next;
            rows = new_rows;
            bond = w.dr;
        }
        t
    }
}
