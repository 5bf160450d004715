//! Local Z_N clock degree of freedom.
//!
//! Basis states `|0⟩ .. |N-1⟩`. With `ω = exp(2πi/N)`:
//!
//! * `Z|k⟩ = |k+1 mod N⟩` (cyclic shift),
//! * `X|k⟩ = ω^k |k⟩` (clock phase),
//!
//! and `Zdag`, `Xdag` their adjoints. Matrices are row-major with rows
//! indexing the output state. For `N = 2` this gives `Z = σx`, `X = σz`.

use crate::error::{ClockError, ClockResult};
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;
use tn::{LocalOp, C64};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperatorName {
    Z,
    Zdag,
    X,
    Xdag,
}

impl OperatorName {
    pub const ALL: [OperatorName; 4] = [Self::Z, Self::Zdag, Self::X, Self::Xdag];

    pub fn adjoint(self) -> Self {
        match self {
            Self::Z => Self::Zdag,
            Self::Zdag => Self::Z,
            Self::X => Self::Xdag,
            Self::Xdag => Self::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Z => "Z",
            Self::Zdag => "Zdag",
            Self::X => "X",
            Self::Xdag => "Xdag",
        }
    }
}

impl fmt::Display for OperatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorName {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Z" => Ok(Self::Z),
            "Zdag" => Ok(Self::Zdag),
            "X" => Ok(Self::X),
            "Xdag" => Ok(Self::Xdag),
            other => Err(ClockError::UnrecognizedOperator(other.to_string())),
        }
    }
}

/// `exp(2πi k / n)` with round-off below 1e-15 snapped to zero, so that
/// `N = 2` and `N = 4` give exact real/imaginary units.
pub fn root_of_unity(k: usize, n: usize) -> C64 {
    let angle = TAU * (k % n) as f64 / n as f64;
    let snap = |x: f64| if x.abs() < 1e-15 { 0.0 } else { x };
    C64::new(snap(angle.cos()), snap(angle.sin()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockSite {
    order: usize,
    charges: bool,
}

impl ClockSite {
    /// Largest order for which charge-resolved sites are provided.
    pub const MAX_CHARGED_ORDER: usize = 6;

    pub fn new(order: usize) -> ClockResult<Self> {
        if order < 2 {
            return Err(ClockError::UnsupportedOrder(order));
        }
        Ok(Self {
            order,
            charges: false,
        })
    }

    /// Site whose basis state `k` carries the conserved charge `k mod N`.
    pub fn with_charges(order: usize) -> ClockResult<Self> {
        if !(2..=Self::MAX_CHARGED_ORDER).contains(&order) {
            return Err(ClockError::UnsupportedOrder(order));
        }
        Ok(Self {
            order,
            charges: true,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn dim(&self) -> usize {
        self.order
    }

    pub fn conserves_charge(&self) -> bool {
        self.charges
    }

    pub fn omega(&self) -> C64 {
        root_of_unity(1, self.order)
    }

    /// Eigenvalue of `X` on `|k⟩`.
    pub fn phase(&self, k: usize) -> C64 {
        root_of_unity(k, self.order)
    }

    pub fn charge(&self, k: usize) -> usize {
        k % self.order
    }

    pub fn operator(&self, name: OperatorName) -> LocalOp {
        let n = self.order;
        let mut m = vec![C64::new(0.0, 0.0); n * n];
        for k in 0..n {
            let up = (k + 1) % n;
            match name {
                OperatorName::Z => m[up * n + k] = C64::new(1.0, 0.0),
                OperatorName::Zdag => m[k * n + up] = C64::new(1.0, 0.0),
                OperatorName::X => m[k * n + k] = self.phase(k),
                OperatorName::Xdag => m[k * n + k] = self.phase(k).conj(),
            }
        }
        m
    }

    pub fn op(&self, name: &str) -> ClockResult<LocalOp> {
        Ok(self.operator(name.parse()?))
    }

    /// Basis index of a state label: `"0"` .. `"N-1"`, plus `"Up"`/`"Dn"`
    /// for `N = 2`.
    pub fn state(&self, label: &str) -> ClockResult<usize> {
        if self.order == 2 {
            match label {
                "Up" => return Ok(0),
                "Dn" => return Ok(1),
                _ => {}
            }
        }
        match label.parse::<usize>() {
            Ok(k) if k < self.order && label == k.to_string() => Ok(k),
            _ => Err(ClockError::UnrecognizedState(label.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockSite, OperatorName};
    use crate::error::ClockError;
    use proptest::prelude::*;
    use tn::C64;

    fn apply(op: &[C64], v: &[C64]) -> Vec<C64> {
        let n = v.len();
        (0..n).map(|i| (0..n).map(|j| op[i * n + j] * v[j]).sum()).collect()
    }

    fn basis(n: usize, k: usize) -> Vec<C64> {
        let mut v = vec![C64::new(0.0, 0.0); n];
        v[k] = C64::new(1.0, 0.0);
        v
    }

    fn adjoint(op: &[C64], n: usize) -> Vec<C64> {
        let mut out = vec![C64::new(0.0, 0.0); n * n];
        for i in 0..n {
            for j in 0..n {
                out[j * n + i] = op[i * n + j].conj();
            }
        }
        out
    }

    proptest! {
        #[test]
        fn shift_and_phase_act_on_basis_states(n in 2usize..9, k in 0usize..9) {
            let k = k % n;
            let site = ClockSite::new(n).unwrap();
            let z = site.op("Z").unwrap();
            let x = site.op("X").unwrap();

            let shifted = apply(&z, &basis(n, k));
            let target = basis(n, (k + 1) % n);
            for (a, b) in shifted.iter().zip(&target) {
                prop_assert!((a - b).norm() < 1e-14);
            }

            let phased = apply(&x, &basis(n, k));
            let w = site.omega().powu(k as u32);
            prop_assert!((phased[k] - w).norm() < 1e-12);
        }

        #[test]
        fn dag_is_the_adjoint(n in 2usize..9) {
            let site = ClockSite::new(n).unwrap();
            for name in OperatorName::ALL {
                let op = site.operator(name);
                let dag = site.operator(name.adjoint());
                let expect = adjoint(&op, n);
                for (a, b) in dag.iter().zip(&expect) {
                    prop_assert!((a - b).norm() < 1e-14);
                }
            }
        }
    }

    #[test]
    fn order_two_operators_are_real_and_self_adjoint() {
        let site = ClockSite::new(2).unwrap();
        assert_eq!(site.op("Z").unwrap(), site.op("Zdag").unwrap());
        assert_eq!(site.op("X").unwrap(), site.op("Xdag").unwrap());
        let x = site.op("X").unwrap();
        let (one, zero) = (C64::new(1.0, 0.0), C64::new(0.0, 0.0));
        assert_eq!(x, vec![one, zero, zero, -one]);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let site = ClockSite::new(3).unwrap();
        assert_eq!(
            site.op("Y"),
            Err(ClockError::UnrecognizedOperator("Y".to_string()))
        );
        assert!(matches!(site.state("3"), Err(ClockError::UnrecognizedState(_))));
        assert!(matches!(site.state("Up"), Err(ClockError::UnrecognizedState(_))));
        assert!(matches!(site.state("01"), Err(ClockError::UnrecognizedState(_))));
        assert_eq!(site.state("2"), Ok(2));
    }

    #[test]
    fn up_and_down_labels_for_order_two() {
        let site = ClockSite::new(2).unwrap();
        assert_eq!(site.state("Up"), Ok(0));
        assert_eq!(site.state("Dn"), Ok(1));
        assert_eq!(site.state("1"), Ok(1));
    }

    #[test]
    fn charged_sites_stop_at_order_six() {
        assert!(ClockSite::with_charges(6).is_ok());
        assert_eq!(ClockSite::with_charges(7), Err(ClockError::UnsupportedOrder(7)));
        assert_eq!(ClockSite::new(1), Err(ClockError::UnsupportedOrder(1)));
        assert!(ClockSite::new(12).is_ok());
    }
}
