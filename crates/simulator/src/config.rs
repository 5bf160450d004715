use crate::error::{SimError, SimResult};
use crate::output::CsvFormat;
use crate::ranges::CouplingRange;
use clock::{ClockLattice, ClockSite};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tn::Sweeps;

/// YAML-configurable parameters of a sweep campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Clock order N.
    #[serde(default = "default_order")]
    pub order: usize,
    /// Chain lengths, run one after the other.
    #[serde(default = "default_lengths")]
    pub lengths: Vec<usize>,
    #[serde(default)]
    pub couplings: CouplingRange,
    /// Explicit sector list; when absent, see [`CampaignConfig::sectors`].
    #[serde(default)]
    pub sectors: Option<Vec<usize>>,
    /// Resolve sectors by conserved charge instead of the dual field.
    #[serde(default)]
    pub conserve_charge: bool,
    #[serde(default)]
    pub pbc: bool,
    /// Phase `φ` of the kinetic coupling, `κ → κ e^{iφ}`. Non-zero makes
    /// the model chiral.
    #[serde(default)]
    pub chiral_angle: f64,
    #[serde(default)]
    pub sweeps: SweepSchedule,
    /// Number of excited levels per sample.
    #[serde(default = "default_excited_levels")]
    pub excited_levels: usize,
    /// Penalty weight on states already found.
    #[serde(default = "default_deflation_weight")]
    pub deflation_weight: f64,
    #[serde(default)]
    pub initial_state: InitialState,
    #[serde(default)]
    pub compute: ComputeFlags,
    /// "X" or "Z".
    #[serde(default = "default_order_operator")]
    pub order_operator: String,
    #[serde(default)]
    pub output: OutputConfig,
    /// Master seed of the random initial states.
    #[serde(default = "default_seed")]
    pub seed: String,
    /// Worker threads; 0 keeps rayon's default.
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "default_krylov_dim")]
    pub krylov_dim: usize,
    /// Prints the per-sweep DMRG report.
    #[serde(default)]
    pub verbose_dmrg: bool,
}

fn default_order() -> usize {
    2
}

fn default_lengths() -> Vec<usize> {
    vec![10, 20, 30]
}

fn default_excited_levels() -> usize {
    2
}

fn default_deflation_weight() -> f64 {
    20.0
}

fn default_order_operator() -> String {
    "Z".to_string()
}

fn default_seed() -> String {
    "clock-sweep".to_string()
}

fn default_krylov_dim() -> usize {
    10
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            lengths: default_lengths(),
            couplings: CouplingRange::default(),
            sectors: None,
            conserve_charge: false,
            pbc: false,
            chiral_angle: 0.0,
            sweeps: SweepSchedule::default(),
            excited_levels: default_excited_levels(),
            deflation_weight: default_deflation_weight(),
            initial_state: InitialState::default(),
            compute: ComputeFlags::default(),
            order_operator: default_order_operator(),
            output: OutputConfig::default(),
            seed: default_seed(),
            threads: 0,
            krylov_dim: default_krylov_dim(),
            verbose_dmrg: false,
        }
    }
}

/// Per-sweep DMRG parameters; shorter lists repeat their last value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSchedule {
    pub nsweeps: usize,
    pub max_bond: Vec<usize>,
    pub cutoff: Vec<f64>,
    pub noise: Vec<f64>,
    pub niter: Vec<usize>,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            nsweeps: 5,
            max_bond: vec![10, 20, 50, 100, 150],
            cutoff: vec![1e-12],
            noise: vec![1e-7, 1e-8, 0.0],
            niter: vec![4],
        }
    }
}

impl SweepSchedule {
    pub fn build(&self) -> Sweeps {
        Sweeps::new(self.nsweeps)
            .max_bond(&self.max_bond)
            .cutoff(&self.cutoff)
            .noise(&self.noise)
            .niter(&self.niter)
    }
}

/// How the ground-state solve of each coupling is started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    /// Fresh random state per coupling, seeded from (seed, L, sector,
    /// index); couplings run in parallel.
    #[default]
    Random,
    /// Each coupling starts from the previous converged state; couplings
    /// run sequentially.
    WarmStart,
}

/// Optional per-sample observables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeFlags {
    #[serde(default = "yes")]
    pub disorder: bool,
    #[serde(default = "yes")]
    pub half_chain_correlator: bool,
    #[serde(default = "yes")]
    pub correlator: bool,
    #[serde(default)]
    pub order: bool,
    #[serde(default = "yes")]
    pub excited_levels: bool,
    #[serde(default)]
    pub entropy: bool,
}

fn yes() -> bool {
    true
}

impl Default for ComputeFlags {
    fn default() -> Self {
        Self {
            disorder: true,
            half_chain_correlator: true,
            correlator: true,
            order: false,
            excited_levels: true,
            entropy: false,
        }
    }
}

impl ComputeFlags {
    /// Whether any observable over a sub-interval of the chain is requested.
    pub fn needs_intervals(&self) -> bool {
        self.disorder || self.half_chain_correlator || self.correlator
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Appended to every file name.
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub format: CsvFormat,
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            suffix: None,
            format: CsvFormat::default(),
        }
    }
}

impl CampaignConfig {
    pub fn from_yaml_str(text: &str) -> SimResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_path(path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn is_chiral(&self) -> bool {
        self.chiral_angle.rem_euclid(std::f64::consts::TAU) != 0.0
    }

    /// Configured sectors, else `0..=N/2` for real couplings (sectors `s`
    /// and `N - s` are complex conjugates) and `0..N` for chiral ones.
    pub fn sectors(&self) -> Vec<usize> {
        match &self.sectors {
            Some(s) => s.clone(),
            None if self.is_chiral() => (0..self.order).collect(),
            None => (0..=self.order / 2).collect(),
        }
    }

    pub fn lattice(&self, len: usize) -> SimResult<ClockLattice> {
        let lattice = if self.conserve_charge {
            ClockLattice::with_charges(self.order, len)?
        } else {
            ClockLattice::new(self.order, len)?
        };
        Ok(lattice)
    }

    /// Checks everything that would otherwise fail in the middle of a run.
    pub fn validate(&self) -> SimResult<()> {
        if self.conserve_charge {
            ClockSite::with_charges(self.order)?;
        } else {
            ClockSite::new(self.order)?;
        }

        if self.lengths.is_empty() {
            return Err(SimError::Config("no chain lengths given".into()));
        }
        let min_len = if self.compute.needs_intervals() { 4 } else { 2 };
        if let Some(&len) = self.lengths.iter().find(|&&l| l < min_len) {
            return Err(SimError::Config(format!(
                "chain length {} too short, need at least {}",
                len, min_len
            )));
        }

        let couplings = self.couplings.values();
        if couplings.is_empty() {
            return Err(SimError::Config("no coupling values given".into()));
        }
        if couplings.iter().any(|c| !c.is_finite()) || !self.chiral_angle.is_finite() {
            return Err(SimError::Config("couplings must be finite".into()));
        }

        let sectors = self.sectors();
        if sectors.is_empty() {
            return Err(SimError::Config("empty sector list".into()));
        }
        if let Some(&s) = sectors.iter().find(|&&s| s >= self.order) {
            return Err(clock::ClockError::InvalidSector {
                sector: s,
                order: self.order,
            }
            .into());
        }

        let s = &self.sweeps;
        if s.nsweeps == 0
            || s.max_bond.is_empty()
            || s.cutoff.is_empty()
            || s.noise.is_empty()
            || s.niter.is_empty()
        {
            return Err(SimError::Config(
                "sweep schedule needs nsweeps > 0 and non-empty lists".into(),
            ));
        }
        if s.max_bond.contains(&0) || s.niter.contains(&0) {
            return Err(SimError::Config("max_bond and niter must be positive".into()));
        }
        if s.cutoff.iter().chain(&s.noise).any(|x| !x.is_finite() || *x < 0.0) {
            return Err(SimError::Config("cutoff and noise must be finite and non-negative".into()));
        }

        let deflating = self.compute.excited_levels && self.excited_levels > 0;
        if deflating && !(self.deflation_weight > 0.0) {
            return Err(SimError::Config("deflation weight must be positive".into()));
        }
        if self.compute.order && !matches!(self.order_operator.as_str(), "X" | "Z") {
            return Err(clock::ClockError::UnrecognizedOperator(self.order_operator.clone()).into());
        }
        if self.krylov_dim < 2 {
            return Err(SimError::Config("krylov_dim must be at least 2".into()));
        }
        if self.output.format.separator.is_empty() {
            return Err(SimError::Config("empty CSV separator".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CampaignConfig, InitialState};
    use crate::error::SimError;
    use clock::ClockError;

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg = CampaignConfig::from_yaml_str(
            "order: 3\nlengths: [8]\ninitial_state: warm_start\ncompute: {correlator: false}\n",
        )
        .unwrap();
        assert_eq!(cfg.order, 3);
        assert_eq!(cfg.initial_state, InitialState::WarmStart);
        assert!(!cfg.compute.correlator);
        assert!(cfg.compute.disorder);
        assert_eq!(cfg.deflation_weight, 20.0);
        assert_eq!(cfg.sectors(), vec![0, 1]);
        assert_eq!(cfg.sweeps.build().len(), 5);
        cfg.validate().unwrap();
    }

    #[test]
    fn shipped_config_is_valid() {
        let text = include_str!("../../../configs/z3_dual.yaml");
        let cfg = CampaignConfig::from_yaml_str(text).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.couplings.values().len(), 41);
        assert_eq!(cfg.output.suffix.as_deref(), Some("obc"));
        assert_eq!(cfg.sweeps.build().len(), 6);
    }

    #[test]
    fn chiral_runs_cover_every_sector() {
        let cfg = CampaignConfig {
            order: 5,
            chiral_angle: 0.1,
            ..CampaignConfig::default()
        };
        assert_eq!(cfg.sectors(), vec![0, 1, 2, 3, 4]);
        let real = CampaignConfig {
            order: 5,
            ..CampaignConfig::default()
        };
        assert_eq!(real.sectors(), vec![0, 1, 2]);
    }

    #[test]
    fn validation_catches_bad_setups() {
        let charged = CampaignConfig {
            order: 7,
            conserve_charge: true,
            ..CampaignConfig::default()
        };
        assert!(matches!(
            charged.validate(),
            Err(SimError::Clock(ClockError::UnsupportedOrder(7)))
        ));

        let short = CampaignConfig {
            lengths: vec![3],
            ..CampaignConfig::default()
        };
        assert!(matches!(short.validate(), Err(SimError::Config(_))));

        let sector = CampaignConfig {
            sectors: Some(vec![2]),
            ..CampaignConfig::default()
        };
        assert!(matches!(
            sector.validate(),
            Err(SimError::Clock(ClockError::InvalidSector { sector: 2, order: 2 }))
        ));

        let empty = CampaignConfig {
            couplings: crate::ranges::CouplingRange::List(vec![]),
            ..CampaignConfig::default()
        };
        assert!(empty.validate().is_err());
    }
}
