//! Order, disorder and correlator expectation values.
//!
//! The `*_c` functions return the complex value; the plain ones return its
//! real part only. Intervals are 1-indexed and closed.

use crate::error::{ClockError, ClockResult};
use crate::lattice::ClockLattice;
use crate::site::OperatorName;
use tn::{OpSum, SiteSet, C64, MPO, MPS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub begin: usize,
    pub end: usize,
}

impl Interval {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// `1 <= begin < end <= len`
    pub fn check(&self, len: usize) -> ClockResult<()> {
        if self.begin == 0 || self.begin >= self.end || self.end > len {
            return Err(ClockError::InvalidInterval {
                begin: self.begin,
                end: self.end,
                len,
            });
        }
        Ok(())
    }

    /// Number of sites covered.
    pub fn width(&self) -> usize {
        self.end + 1 - self.begin
    }
}

/// `(1/L) Σ_i 0.5 (op_i + op_i†)` for `op_type` in {"X", "Z"}.
pub fn order_mpo(lattice: &ClockLattice, op_type: &str) -> ClockResult<MPO> {
    let op = match op_type {
        "X" => OperatorName::X,
        "Z" => OperatorName::Z,
        other => return Err(ClockError::UnrecognizedOperator(other.to_string())),
    };
    let len = lattice.len();
    let w = 0.5 / len as f64;
    let mut sum = OpSum::new();
    for i in 0..len {
        sum.add(w, &[(op.as_str(), i)]);
        sum.add(w, &[(op.adjoint().as_str(), i)]);
    }
    sum.to_mpo(lattice)
}

pub fn order_c(lattice: &ClockLattice, psi: &MPS, op_type: &str) -> ClockResult<C64> {
    Ok(order_mpo(lattice, op_type)?.expect(psi)?)
}

pub fn order(lattice: &ClockLattice, psi: &MPS, op_type: &str) -> ClockResult<f64> {
    Ok(order_c(lattice, psi, op_type)?.re)
}

/// String operator `⟨op_begin op_{begin+1} ... op_end⟩`.
pub fn disorder_c(
    lattice: &ClockLattice,
    psi: &mut MPS,
    op_type: &str,
    interval: Interval,
) -> ClockResult<C64> {
    interval.check(lattice.len())?;
    let op = lattice.site().op(op_type)?;
    let ops: Vec<Option<&[C64]>> = vec![Some(op.as_slice()); interval.width()];
    Ok(psi.expect_string(interval.begin - 1, &ops)?)
}

pub fn disorder(
    lattice: &ClockLattice,
    psi: &mut MPS,
    op_type: &str,
    interval: Interval,
) -> ClockResult<f64> {
    Ok(disorder_c(lattice, psi, op_type, interval)?.re)
}

/// Two-point function `⟨op1_begin op2_end⟩`, identity in between.
pub fn correlator_c(
    lattice: &ClockLattice,
    psi: &mut MPS,
    op1: &str,
    op2: &str,
    interval: Interval,
) -> ClockResult<C64> {
    interval.check(lattice.len())?;
    let a = lattice.site().op(op1)?;
    let b = lattice.site().op(op2)?;
    let mut ops: Vec<Option<&[C64]>> = vec![None; interval.width()];
    ops[0] = Some(a.as_slice());
    ops[interval.width() - 1] = Some(b.as_slice());
    Ok(psi.expect_string(interval.begin - 1, &ops)?)
}

pub fn correlator(
    lattice: &ClockLattice,
    psi: &mut MPS,
    op1: &str,
    op2: &str,
    interval: Interval,
) -> ClockResult<f64> {
    Ok(correlator_c(lattice, psi, op1, op2, interval)?.re)
}

/// Squared Schmidt values below this are left out of the entropy.
pub const ENTROPY_CUTOFF: f64 = 1e-12;

/// Von Neumann entropy across the bond with `cut` sites on its left.
pub fn entanglement_entropy(psi: &mut MPS, cut: usize) -> ClockResult<f64> {
    let s = psi.schmidt_values(cut)?;
    let total: f64 = s.iter().map(|x| x * x).sum();
    if total <= 0.0 {
        return Ok(0.0);
    }
    Ok(s.iter()
        .map(|x| x * x / total)
        .filter(|&p| p > ENTROPY_CUTOFF)
        .map(|p| -p * p.ln())
        .sum())
}

#[cfg(test)]
mod tests {
    use super::Interval;
    use crate::error::ClockError;

    #[test]
    fn interval_bounds() {
        assert!(Interval::new(1, 4).check(4).is_ok());
        assert_eq!(
            Interval::new(3, 3).check(4),
            Err(ClockError::InvalidInterval { begin: 3, end: 3, len: 4 })
        );
        assert!(Interval::new(0, 2).check(4).is_err());
        assert!(Interval::new(2, 5).check(4).is_err());
        assert_eq!(Interval::new(2, 4).width(), 3);
    }
}
