use clock::{dual_hamiltonian, ClockLattice};
use rng::StreamRng;
use tn::{dmrg, DmrgOptions, Sweeps};

/// Ground energy of the Z2 dual chain, L = 10, open ends, coupling 1,
/// sector 0, from exact diagonalization.
const Z2_L10_G1: f64 = -60.6445400353969;

fn campaign_schedule() -> Sweeps {
    Sweeps::new(5)
        .max_bond(&[10, 20, 50, 100, 150])
        .cutoff(&[1e-12])
        .noise(&[1e-7, 1e-8, 0.0])
        .niter(&[4])
}

#[test]
fn z2_sweep_energies_never_rise() {
    let lattice = ClockLattice::new(2, 10).unwrap();
    let opts = DmrgOptions {
        quiet: true,
        ..DmrgOptions::default()
    };
    for &g in &[0.5, 1.0, 1.5] {
        let h = dual_hamiltonian(&lattice, g, 0, false).unwrap();
        let label = g.to_string();
        let mut rng = StreamRng::labelled("sweeps", &[label.as_str()]);
        let psi0 = lattice.random_state(&mut rng).unwrap();
        let res = dmrg(&h, psi0, &campaign_schedule(), &opts).unwrap();

        assert_eq!(res.sweep_energies.len(), 5);
        // noise may lift a sweep by round-off
        for w in res.sweep_energies.windows(2) {
            assert!(w[1] <= w[0] + 1e-8, "g = {}: {:?}", g, res.sweep_energies);
        }
        let last = res.sweep_energies[4];
        assert!((res.energy - last).abs() < 1e-8);
    }
}

#[test]
fn z2_l10_matches_recorded_energy() {
    let lattice = ClockLattice::new(2, 10).unwrap();
    let h = dual_hamiltonian(&lattice, 1.0, 0, false).unwrap();
    let mut rng = StreamRng::labelled("sweeps", &["reference"]);
    let psi0 = lattice.random_state(&mut rng).unwrap();
    let opts = DmrgOptions {
        quiet: true,
        ..DmrgOptions::default()
    };
    let res = dmrg(&h, psi0, &campaign_schedule(), &opts).unwrap();
    assert!(
        (res.energy - Z2_L10_G1).abs() < 1e-8,
        "DMRG {} vs recorded {}",
        res.energy,
        Z2_L10_G1
    );
}
