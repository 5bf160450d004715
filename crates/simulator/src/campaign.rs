//! Coupling sweeps over chain lengths and sectors.
//!
//! Every coupling of one sector is an independent task: Hamiltonian,
//! ground-state DMRG, then the requested observables. Rows are placed by
//! coupling index, so the table never depends on worker scheduling.

use crate::config::{CampaignConfig, InitialState};
use crate::deflation::{initial_state, ExcitedStateDeflator};
use crate::error::SimResult;
use crate::output::{output_csv_filename, write_csv};
use crate::table::ResultTable;
use clock::{
    clock_couplings, correlator_c, disorder_c, dual_couplings, entanglement_entropy, hamiltonian,
    order, ClockLattice, Couplings, Interval,
};
use rayon::prelude::*;
use rng::StreamRng;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tn::{dmrg, DmrgOptions, SiteSet, Sweeps, TnError, C64, MPO, MPS};

/// One row of results. Optional fields are `None` when switched off.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observables {
    pub gs_energy: f64,
    pub disorder: Option<f64>,
    pub corr_half: Option<f64>,
    pub excited: Vec<f64>,
    pub correlator: Vec<f64>,
    pub order: Option<f64>,
    pub entropy: Option<f64>,
}

impl Observables {
    fn cells(&self) -> Vec<(String, f64)> {
        let mut cells = vec![("gs_energy".to_string(), self.gs_energy)];
        if let Some(d) = self.disorder {
            cells.push(("disorder".to_string(), d));
        }
        if let Some(c) = self.corr_half {
            cells.push(("corr_half".to_string(), c));
        }
        for (n, e) in self.excited.iter().enumerate() {
            cells.push((format!("E{}", n + 1), *e));
        }
        for (r, c) in self.correlator.iter().enumerate() {
            cells.push((format!("corr_R_{}", r + 1), *c));
        }
        if let Some(o) = self.order {
            cells.push(("order".to_string(), o));
        }
        if let Some(s) = self.entropy {
            cells.push(("entropy".to_string(), s));
        }
        cells
    }
}

/// A coupling whose row stayed NaN.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleFailure {
    pub len: usize,
    pub sector: usize,
    pub index: usize,
    pub coupling: f64,
    pub error: String,
}

impl fmt::Display for SampleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L = {}, sector {}, coupling #{} ({}): {}",
            self.len, self.sector, self.index, self.coupling, self.error
        )
    }
}

#[derive(Clone, Debug)]
pub struct SectorRun {
    pub len: usize,
    pub sector: usize,
    pub table: ResultTable,
    pub failures: Vec<SampleFailure>,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct CampaignReport {
    pub files: Vec<PathBuf>,
    pub failures: Vec<SampleFailure>,
    pub elapsed: Duration,
}

impl CampaignReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SweepCampaign {
    config: CampaignConfig,
    couplings: Vec<f64>,
    sweeps: Sweeps,
    deflator: ExcitedStateDeflator,
}

impl SweepCampaign {
    /// Validates `config` up front; nothing fails on configuration later.
    pub fn new(config: CampaignConfig) -> SimResult<Self> {
        config.validate()?;
        let couplings = config.couplings.values();
        let sweeps = config.sweeps.build();
        let deflator = ExcitedStateDeflator {
            levels: if config.compute.excited_levels { config.excited_levels } else { 0 },
            weight: config.deflation_weight,
            krylov_dim: config.krylov_dim,
        };
        Ok(Self {
            config,
            couplings,
            sweeps,
            deflator,
        })
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    pub fn couplings(&self) -> &[f64] {
        &self.couplings
    }

    /// Runs every length and sector and writes one CSV per pair into the
    /// output directory.
    pub fn run(&self) -> SimResult<CampaignReport> {
        let start = Instant::now();
        let out = &self.config.output;
        std::fs::create_dir_all(&out.dir)?;

        let mut report = CampaignReport::default();
        for &len in &self.config.lengths {
            println!("Z{} clock chain, L = {}", self.config.order, len);
            for sector in self.config.sectors() {
                let run = self.run_sector(len, sector)?;
                let name =
                    output_csv_filename(self.config.order, len, sector, out.suffix.as_deref());
                let path = out.dir.join(name);
                write_csv(&path, &run.table, &out.format)?;
                for failure in &run.failures {
                    eprintln!("   sample failed: {}", failure);
                }
                report.failures.extend(run.failures);
                report.files.push(path);
            }
        }
        report.elapsed = start.elapsed();
        println!(
            "Campaign finished in {:.2} s: {} files, {} failed samples",
            report.elapsed.as_secs_f64(),
            report.files.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// All couplings of one sector at chain length `len`.
    pub fn run_sector(&self, len: usize, sector: usize) -> SimResult<SectorRun> {
        self.run_sector_from(len, sector, |lattice, _, rng| {
            initial_state(lattice, sector, rng)
        })
    }

    /// [`Self::run_sector`] with `start_state(lattice, index, rng)` supplying the
    /// random starting states.
    pub(crate) fn run_sector_from<F>(
        &self,
        len: usize,
        sector: usize,
        start_state: F,
    ) -> SimResult<SectorRun>
    where
        F: Fn(&ClockLattice, usize, &mut StreamRng) -> SimResult<MPS> + Sync,
    {
        let lattice = self.config.lattice(len)?;
        lattice.check_sector(sector)?;
        let mut table = self.new_table(len)?;
        let total = self.couplings.len();
        let done = AtomicUsize::new(0);
        let start = Instant::now();

        println!(" * Computing sector n. {}", sector);
        let progress = || {
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            print!("\x1b[2K\r   In progress [{}/{}]", n, total);
            let _ = std::io::stdout().flush();
        };

        let results: Vec<SimResult<Observables>> = match self.config.initial_state {
            InitialState::Random => (0..total)
                .into_par_iter()
                .map(|i| {
                    let mut rng = self.sample_rng(len, sector, i);
                    let coupling = self.couplings[i];
                    let res = start_state(&lattice, i, &mut rng)
                        .and_then(|psi0| {
                            self.observables_at(&lattice, psi0, coupling, sector, &mut rng)
                        })
                        .map(|(obs, _)| obs);
                    progress();
                    res
                })
                .collect(),
            InitialState::WarmStart => {
                let mut results = Vec::with_capacity(total);
                let mut previous: Option<MPS> = None;
                for i in 0..total {
                    let mut rng = self.sample_rng(len, sector, i);
                    let psi0 = match previous.take() {
                        Some(psi) => Ok(psi),
                        None => start_state(&lattice, i, &mut rng),
                    };
                    let res = psi0.and_then(|psi0| {
                        self.observables_at(&lattice, psi0, self.couplings[i], sector, &mut rng)
                    });
                    results.push(res.map(|(obs, psi)| {
                        previous = Some(psi);
                        obs
                    }));
                    progress();
                }
                results
            }
        };

        let mut failures = Vec::new();
        for (i, res) in results.into_iter().enumerate() {
            match res {
                Ok(obs) => table.write_row(i, &obs.cells())?,
                Err(e) => failures.push(SampleFailure {
                    len,
                    sector,
                    index: i,
                    coupling: self.couplings[i],
                    error: e.to_string(),
                }),
            }
        }
        let elapsed = start.elapsed();
        println!(" Done! ({:.2} s)", elapsed.as_secs_f64());

        Ok(SectorRun {
            len,
            sector,
            table,
            failures,
            elapsed,
        })
    }

    /// Ground state and observables at one coupling, starting DMRG from
    /// `psi0`. Returns the converged ground state alongside.
    pub fn observables_at(
        &self,
        lattice: &ClockLattice,
        psi0: MPS,
        coupling: f64,
        sector: usize,
        rng: &mut StreamRng,
    ) -> SimResult<(Observables, MPS)> {
        let h = self.hamiltonian(lattice, coupling, sector)?;
        let opts = DmrgOptions {
            quiet: !self.config.verbose_dmrg,
            krylov_dim: self.config.krylov_dim,
            ..DmrgOptions::default()
        };
        let gs = dmrg(&h, psi0, &self.sweeps, &opts)?;
        if !gs.energy.is_finite() {
            return Err(TnError::Numerical(format!("ground energy {}", gs.energy)).into());
        }
        let mut psi = gs.state;
        let len = lattice.len();
        let flags = &self.config.compute;
        let half = Interval::new(1, len / 2);

        let mut obs = Observables {
            gs_energy: gs.energy,
            ..Observables::default()
        };
        if flags.disorder {
            let d = disorder_c(lattice, &mut psi, "X", half)?
                + disorder_c(lattice, &mut psi, "Xdag", half)?;
            obs.disorder = Some(0.5 * d.norm());
        }
        if flags.half_chain_correlator {
            obs.corr_half = Some(correlator_c(lattice, &mut psi, "Z", "Zdag", half)?.norm());
        }
        if flags.correlator {
            let (begin, end) = correlator_range(len);
            obs.correlator = (begin + 1..end)
                .map(|pos| {
                    let pair = Interval::new(begin, pos);
                    Ok(correlator_c(lattice, &mut psi, "Z", "Zdag", pair)?.norm())
                })
                .collect::<SimResult<Vec<_>>>()?;
        }
        if flags.order {
            obs.order = Some(order(lattice, &psi, &self.config.order_operator)?);
        }
        if flags.entropy {
            obs.entropy = Some(entanglement_entropy(&mut psi, len / 2)?);
        }
        let mut excited_rng = rng.fork("excited");
        obs.excited =
            self.deflator.run(&h, lattice, &psi, &self.sweeps, sector, &mut excited_rng)?;
        Ok((obs, psi))
    }

    /// Dual model in `sector`, or the charge-conserving clock model when
    /// the lattice carries charges. The chiral angle rotates the kinetic
    /// coupling.
    pub fn hamiltonian(
        &self,
        lattice: &ClockLattice,
        coupling: f64,
        sector: usize,
    ) -> SimResult<MPO> {
        let mut c: Couplings = if lattice.conserves_charge() {
            clock_couplings(coupling, self.config.pbc)
        } else {
            dual_couplings(lattice.order(), coupling, sector, self.config.pbc)?
        };
        if self.config.chiral_angle != 0.0 {
            c.kinetic *= C64::from_polar(1.0, self.config.chiral_angle);
        }
        Ok(hamiltonian(lattice, &c)?)
    }

    fn sample_rng(&self, len: usize, sector: usize, index: usize) -> StreamRng {
        let (len, sector, index) = (len.to_string(), sector.to_string(), index.to_string());
        StreamRng::labelled(&self.config.seed, &[len.as_str(), sector.as_str(), index.as_str()])
    }

    fn new_table(&self, len: usize) -> SimResult<ResultTable> {
        let flags = &self.config.compute;
        let mut table = ResultTable::new(self.couplings.len());
        table.with_values("couplings", self.couplings.clone())?;
        table.add_column("gs_energy")?;
        if flags.disorder {
            table.add_column("disorder")?;
        }
        if flags.half_chain_correlator {
            table.add_column("corr_half")?;
        }
        for n in 0..self.deflator.levels {
            table.add_column(&format!("E{}", n + 1))?;
        }
        if flags.correlator {
            let (begin, end) = correlator_range(len);
            for r in 1..end - begin {
                table.add_column(&format!("corr_R_{}", r))?;
            }
        }
        if flags.order {
            table.add_column("order")?;
        }
        if flags.entropy {
            table.add_column("entropy")?;
        }
        Ok(table)
    }
}

/// `[max(1, L/4), 3L/4]`, the bulk of the chain away from the edges.
pub fn correlator_range(len: usize) -> (usize, usize) {
    ((len / 4).max(1), 3 * len / 4)
}
