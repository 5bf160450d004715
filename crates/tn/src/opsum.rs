//! Operator sums and their compilation into MPOs.
//!
//! Each multi-site term gets its own MPO channel on every bond it spans, so
//! the compiled MPO is exact with bond dimension `2 + (terms crossing the
//! bond)`. This is plenty for nearest-neighbour chains with an optional
//! wrap-around pair.

use crate::charges::ChargeLayout;
use crate::error::TnError;
use crate::mpo::{Tensor4, MPO};
use crate::mps::C64;

/// A `d x d` row-major local operator; rows index the output state.
pub type LocalOp = Vec<C64>;

/// A chain of local Hilbert spaces that can name its operators.
pub trait SiteSet {
    type Error: From<TnError>;

    fn len(&self) -> usize;

    fn dim(&self, site: usize) -> usize;

    /// Operator `name` on 0-indexed `site`.
    fn op(&self, name: &str, site: usize) -> Result<LocalOp, Self::Error>;

    fn charge_layout(&self) -> Option<ChargeLayout> {
        None
    }

    fn dims(&self) -> Vec<usize> {
        (0..self.len()).map(|k| self.dim(k)).collect()
    }
}

/// `coef * op_1(site_1) op_2(site_2) ...`, sites 0-indexed. Operators on the
/// same site multiply in the order written.
#[derive(Clone, Debug, PartialEq)]
pub struct OpTerm {
    pub coef: C64,
    pub ops: Vec<(String, usize)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OpSum {
    terms: Vec<OpTerm>,
}

struct Resolved {
    coef: C64,
    ops: Vec<(usize, LocalOp)>,
}

impl Resolved {
    fn first(&self) -> usize {
        self.ops[0].0
    }

    fn last(&self) -> usize {
        self.ops[self.ops.len() - 1].0
    }

    fn op_at(&self, site: usize) -> Option<&LocalOp> {
        self.ops.iter().find(|(k, _)| *k == site).map(|(_, op)| op)
    }
}

#[derive(Clone, Copy)]
enum Channel {
    NotStarted,
    Finished,
    Term(usize),
}

/// Row/column of a channel on `bond` (bond `k` sits left of site `k`).
fn channel_index(bond: usize, n: usize, ch: Channel) -> Option<usize> {
    match ch {
        Channel::NotStarted => (bond != n).then_some(0),
        Channel::Finished => match bond {
            0 => None,
            b if b == n => Some(0),
            _ => Some(1),
        },
        Channel::Term(slot) => (bond != 0 && bond != n).then_some(2 + slot),
    }
}

fn matmul(a: &[C64], b: &[C64], d: usize) -> LocalOp {
    let mut out = vec![C64::new(0.0, 0.0); d * d];
    for i in 0..d {
        for k in 0..d {
            let x = a[i * d + k];
            if x == C64::new(0.0, 0.0) {
                continue;
            }
            for j in 0..d {
                out[i * d + j] += x * b[k * d + j];
            }
        }
    }
    out
}

fn identity(d: usize) -> LocalOp {
    let mut out = vec![C64::new(0.0, 0.0); d * d];
    for i in 0..d {
        out[i * d + i] = C64::new(1.0, 0.0);
    }
    out
}

impl OpSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, coef: impl Into<C64>, ops: &[(&str, usize)]) -> &mut Self {
        self.terms.push(OpTerm {
            coef: coef.into(),
            ops: ops.iter().map(|(name, k)| (name.to_string(), *k)).collect(),
        });
        self
    }

    pub fn terms(&self) -> &[OpTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn to_mpo<S: SiteSet>(&self, sites: &S) -> Result<MPO, S::Error> {
        let n = sites.len();
        if n == 0 {
            return Err(TnError::EmptySystem.into());
        }

        let mut resolved: Vec<Resolved> = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            if term.coef == C64::new(0.0, 0.0) {
                continue;
            }
            if term.ops.is_empty() {
                return Err(TnError::Shape("operator term without operators".into()).into());
            }
            let mut ops: Vec<(usize, LocalOp)> = Vec::with_capacity(term.ops.len());
            for (name, site) in &term.ops {
                if *site >= n {
                    return Err(TnError::SiteOutOfRange { site: *site, len: n }.into());
                }
                let d = sites.dim(*site);
                let op = sites.op(name, *site)?;
                if op.len() != d * d {
                    return Err(TnError::Shape(format!(
                        "operator \"{}\" has {} entries on a site of dimension {}",
                        name,
                        op.len(),
                        d
                    ))
                    .into());
                }
                match ops.iter_mut().find(|(k, _)| k == site) {
                    Some((_, existing)) => *existing = matmul(existing, &op, d),
                    None => ops.push((*site, op)),
                }
            }
            ops.sort_by_key(|(k, _)| *k);
            resolved.push(Resolved {
                coef: term.coef,
                ops,
            });
        }

        // slots[t][bond] = channel slot of term t on an internal bond it spans
        let mut crossing = vec![0usize; n + 1];
        let mut slots: Vec<Vec<Option<usize>>> = Vec::with_capacity(resolved.len());
        for t in &resolved {
            let mut s = vec![None; n + 1];
            for (bond, slot) in s.iter_mut().enumerate().take(t.last() + 1).skip(t.first() + 1) {
                *slot = Some(crossing[bond]);
                crossing[bond] += 1;
            }
            slots.push(s);
        }

        let bond_dim = |bond: usize| -> usize {
            if bond == 0 || bond == n {
                1
            } else {
                2 + crossing[bond]
            }
        };

        let mut ws = Vec::with_capacity(n);
        for k in 0..n {
            let d = sites.dim(k);
            let id = identity(d);
            let mut w = Tensor4::zeros(bond_dim(k), d, bond_dim(k + 1));
            let one = C64::new(1.0, 0.0);

            if let (Some(a), Some(b)) = (
                channel_index(k, n, Channel::NotStarted),
                channel_index(k + 1, n, Channel::NotStarted),
            ) {
                w.add_op(a, b, one, &id);
            }
            if let (Some(a), Some(b)) = (
                channel_index(k, n, Channel::Finished),
                channel_index(k + 1, n, Channel::Finished),
            ) {
                w.add_op(a, b, one, &id);
            }

            for (t, term) in resolved.iter().enumerate() {
                let (first, last) = (term.first(), term.last());
                if k < first || k > last {
                    continue;
                }
                let from = if k == first {
                    Channel::NotStarted
                } else {
                    Channel::Term(slots[t][k].unwrap_or_default())
                };
                let to = if k == last {
                    Channel::Finished
                } else {
                    Channel::Term(slots[t][k + 1].unwrap_or_default())
                };
                let coef = if k == first { term.coef } else { one };
                let op = term.op_at(k).unwrap_or(&id);
                let (a, b) = (channel_index(k, n, from), channel_index(k + 1, n, to));
                if let (Some(a), Some(b)) = (a, b) {
                    w.add_op(a, b, coef, op);
                }
            }
            ws.push(w);
        }

        Ok(MPO::from_sites(ws)?)
    }
}
