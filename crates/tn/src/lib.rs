//! Minimal matrix-product toolkit for finite chains: MPS/MPO storage,
//! operator-sum compilation, and two-site DMRG with optional Z_N charge
//! labels and deflation against previously found states.

pub mod charges;
pub mod dmrg;
pub mod env;
pub mod error;
pub mod lanczos;
pub mod mpo;
pub mod mps;
pub mod opsum;
pub mod sweeps;
pub mod truncation;

pub use charges::ChargeLayout;
pub use dmrg::{dmrg, dmrg_deflated, DmrgOptions, DmrgResult};
pub use error::{TnError, TnResult};
pub use mpo::MPO;
pub use mps::{C64, MPS};
pub use opsum::{LocalOp, OpSum, OpTerm, SiteSet};
pub use sweeps::{SweepParams, Sweeps};
pub use truncation::Truncation;
