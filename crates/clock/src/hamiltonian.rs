//! Clock-chain Hamiltonians as operator sums.
//!
//! ```text
//! H = Σ_i  κ Zdag_{i+1} Z_i + conj(κ) Z_{i+1} Zdag_i
//!   + Σ_i  τ X_i + conj(τ) Xdag_i
//!   + Σ_i  λ Z_i + conj(λ) Zdag_i
//! ```
//!
//! Sites are 1-indexed here and shifted to the 0-indexed operator sum.

use crate::error::{ClockError, ClockResult};
use crate::lattice::ClockLattice;
use crate::site::root_of_unity;
use tn::{OpSum, SiteSet, C64, MPO};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Couplings {
    pub kinetic: C64,
    pub transverse: C64,
    pub longitudinal: C64,
    /// Adds the wrap-around kinetic pair `(L, 1)`.
    pub pbc: bool,
}

impl Couplings {
    pub fn real(kinetic: f64, transverse: f64, longitudinal: f64) -> Self {
        Self::chiral(kinetic.into(), transverse.into(), longitudinal.into())
    }

    pub fn chiral(kinetic: C64, transverse: C64, longitudinal: C64) -> Self {
        Self {
            kinetic,
            transverse,
            longitudinal,
            pbc: false,
        }
    }

    pub fn with_pbc(mut self, pbc: bool) -> Self {
        self.pbc = pbc;
        self
    }

    /// Any coupling with an imaginary part.
    pub fn is_chiral(&self) -> bool {
        [self.kinetic, self.transverse, self.longitudinal]
            .iter()
            .any(|c| c.im != 0.0)
    }
}

pub fn hamiltonian_terms(lattice: &ClockLattice, c: &Couplings) -> ClockResult<OpSum> {
    let zero = C64::new(0.0, 0.0);
    if lattice.conserves_charge() && c.longitudinal != zero {
        return Err(ClockError::ChargeNotConserved);
    }
    let len = lattice.len();
    let mut sum = OpSum::new();

    let mut bonds: Vec<(usize, usize)> = (1..len).map(|i| (i, i + 1)).collect();
    if c.pbc {
        bonds.push((len, 1));
    }
    for (i, j) in bonds {
        sum.add(c.kinetic, &[("Zdag", j - 1), ("Z", i - 1)]);
        sum.add(c.kinetic.conj(), &[("Z", j - 1), ("Zdag", i - 1)]);
    }

    if c.transverse != zero {
        for i in 0..len {
            sum.add(c.transverse, &[("X", i)]);
            sum.add(c.transverse.conj(), &[("Xdag", i)]);
        }
    }

    if c.longitudinal != zero {
        for i in 0..len {
            sum.add(c.longitudinal, &[("Z", i)]);
            sum.add(c.longitudinal.conj(), &[("Zdag", i)]);
        }
    }
    Ok(sum)
}

pub fn hamiltonian(lattice: &ClockLattice, c: &Couplings) -> ClockResult<MPO> {
    hamiltonian_terms(lattice, c)?.to_mpo(lattice)
}

/// Dual clock model at `coupling` in `sector`:
/// `κ = -coupling`, `τ = -1`, `λ = -coupling (1 + ω^sector)`.
pub fn dual_couplings(
    order: usize,
    coupling: f64,
    sector: usize,
    pbc: bool,
) -> ClockResult<Couplings> {
    if order < 2 {
        return Err(ClockError::UnsupportedOrder(order));
    }
    if sector >= order {
        return Err(ClockError::InvalidSector { sector, order });
    }
    let factor = C64::new(1.0, 0.0) + root_of_unity(sector, order);
    Ok(Couplings::chiral(
        C64::new(-coupling, 0.0),
        C64::new(-1.0, 0.0),
        factor * -coupling,
    )
    .with_pbc(pbc))
}

pub fn dual_hamiltonian(
    lattice: &ClockLattice,
    coupling: f64,
    sector: usize,
    pbc: bool,
) -> ClockResult<MPO> {
    hamiltonian(lattice, &dual_couplings(lattice.order(), coupling, sector, pbc)?)
}

/// Charge-conserving clock model: `κ = -1`, `τ = -coupling`, no
/// longitudinal field.
pub fn clock_couplings(coupling: f64, pbc: bool) -> Couplings {
    Couplings::real(-1.0, -coupling, 0.0).with_pbc(pbc)
}
