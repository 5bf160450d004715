use clap::{Parser, ValueEnum};
use simulator::{
    CampaignConfig, CouplingRange, InitialState, SimError, SimResult, SweepCampaign,
};
use std::path::PathBuf;

/// DMRG coupling sweeps of Z_N clock chains
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML campaign configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Clock order N
    #[arg(long)]
    order: Option<usize>,

    /// Comma-separated chain lengths
    #[arg(long, value_delimiter = ',')]
    lengths: Option<Vec<usize>>,

    /// Comma-separated sectors (default: 0..=N/2, all N when chiral)
    #[arg(long, value_delimiter = ',')]
    sectors: Option<Vec<usize>>,

    /// Coupling range as start,stop,points
    #[arg(long, value_delimiter = ',', num_args = 3)]
    linspace: Option<Vec<f64>>,

    /// Resolve sectors by conserved charge
    #[arg(long)]
    conserve_charge: bool,

    /// Periodic boundary conditions
    #[arg(long)]
    pbc: bool,

    /// Phase of the kinetic coupling in radians
    #[arg(long)]
    chiral_angle: Option<f64>,

    /// Number of excited levels
    #[arg(long)]
    excited: Option<usize>,

    /// Initial state of each ground-state solve
    #[arg(long, value_enum)]
    initial_state: Option<Start>,

    /// RNG seed (full reproducibility)
    #[arg(long)]
    seed: Option<String>,

    /// Output directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Suffix appended to every output file name
    #[arg(long)]
    suffix: Option<String>,

    /// Number of Rayon worker threads (0 = Rayon default)
    #[arg(long)]
    threads: Option<usize>,

    /// Print the per-sweep DMRG report
    #[arg(long)]
    verbose_dmrg: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Start {
    Random,
    WarmStart,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    if config.threads > 0 {
        if let Err(err) = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
        {
            eprintln!("Failed to build Rayon thread pool: {}", err);
            std::process::exit(1);
        }
    }

    let report = match SweepCampaign::new(config).and_then(|campaign| campaign.run()) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    for path in &report.files {
        println!("  wrote {}", path.display());
    }
    if !report.is_success() {
        eprintln!("{} samples failed", report.failures.len());
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> SimResult<CampaignConfig> {
    let mut config = match &args.config {
        Some(path) => CampaignConfig::from_yaml_path(path)?,
        None => CampaignConfig::default(),
    };

    if let Some(order) = args.order {
        config.order = order;
    }
    if let Some(lengths) = &args.lengths {
        config.lengths = lengths.clone();
    }
    if let Some(sectors) = &args.sectors {
        config.sectors = Some(sectors.clone());
    }
    if let Some(values) = &args.linspace {
        config.couplings = linspace_override(values)?;
    }
    config.conserve_charge |= args.conserve_charge;
    config.pbc |= args.pbc;
    config.verbose_dmrg |= args.verbose_dmrg;
    if let Some(angle) = args.chiral_angle {
        config.chiral_angle = angle;
    }
    if let Some(k) = args.excited {
        config.excited_levels = k;
    }
    if let Some(start) = args.initial_state {
        config.initial_state = match start {
            Start::Random => InitialState::Random,
            Start::WarmStart => InitialState::WarmStart,
        };
    }
    if let Some(seed) = &args.seed {
        config.seed = seed.clone();
    }
    if let Some(dir) = &args.out_dir {
        config.output.dir = dir.clone();
    }
    if let Some(suffix) = &args.suffix {
        config.output.suffix = Some(suffix.clone());
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    Ok(config)
}

/// `--linspace start,stop,points`; the point count must be a whole number.
fn linspace_override(values: &[f64]) -> SimResult<CouplingRange> {
    let &[start, stop, points] = values else {
        return Err(SimError::Config(format!(
            "--linspace takes start,stop,points, got {} values",
            values.len()
        )));
    };
    if !points.is_finite() || points < 0.0 || points.fract() != 0.0 {
        return Err(SimError::Config(format!(
            "--linspace point count must be a whole number, got {}",
            points
        )));
    }
    Ok(CouplingRange::Linspace {
        start,
        stop,
        points: points as usize,
    })
}
