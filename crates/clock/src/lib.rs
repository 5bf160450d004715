//! Z_N clock chains: site algebra, lattices, Hamiltonians and observables
//! on top of the `tn` matrix-product toolkit.

pub mod error;
pub mod hamiltonian;
pub mod lattice;
pub mod observables;
pub mod site;

pub use error::{ClockError, ClockResult};
pub use hamiltonian::{
    clock_couplings, dual_couplings, dual_hamiltonian, hamiltonian, hamiltonian_terms, Couplings,
};
pub use lattice::{random_ints_modulo, ClockLattice};
pub use observables::{
    correlator, correlator_c, disorder, disorder_c, entanglement_entropy, order, order_c, Interval,
};
pub use site::{ClockSite, OperatorName};
