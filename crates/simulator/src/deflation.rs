use crate::error::SimResult;
use clock::ClockLattice;
use rng::StreamRng;
use tn::{dmrg_deflated, DmrgOptions, Sweeps, MPO, MPS};

/// Ladder of excited states by penalizing overlap with the states already
/// found, starting from the ground state.
#[derive(Clone, Debug, PartialEq)]
pub struct ExcitedStateDeflator {
    pub levels: usize,
    pub weight: f64,
    pub krylov_dim: usize,
}

impl Default for ExcitedStateDeflator {
    fn default() -> Self {
        Self {
            levels: 2,
            weight: 20.0,
            krylov_dim: 10,
        }
    }
}

impl ExcitedStateDeflator {
    /// Energies `E1 .. E_levels` above `ground`. Each level starts from a
    /// fresh random state drawn from `rng`, constrained to `sector` when the
    /// lattice conserves charge.
    pub fn run(
        &self,
        h: &MPO,
        lattice: &ClockLattice,
        ground: &MPS,
        sweeps: &Sweeps,
        sector: usize,
        rng: &mut StreamRng,
    ) -> SimResult<Vec<f64>> {
        let opts = DmrgOptions {
            quiet: true,
            weight: self.weight,
            krylov_dim: self.krylov_dim,
            ..DmrgOptions::default()
        };

        let mut found = Vec::with_capacity(self.levels + 1);
        found.push(ground.clone());
        let mut energies = Vec::with_capacity(self.levels);

        for _ in 0..self.levels {
            let psi0 = initial_state(lattice, sector, rng)?;
            let res = dmrg_deflated(h, &found, psi0, sweeps, &opts)?;
            energies.push(res.energy);
            found.push(res.state);
        }
        Ok(energies)
    }
}

/// Random starting state for `sector`.
pub(crate) fn initial_state(
    lattice: &ClockLattice,
    sector: usize,
    rng: &mut StreamRng,
) -> SimResult<MPS> {
    let psi = if lattice.conserves_charge() {
        lattice.random_charge_state(sector, rng)?
    } else {
        lattice.random_state(rng)?
    };
    Ok(psi)
}
