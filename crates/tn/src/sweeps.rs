use crate::truncation::Truncation;

/// Parameters of one DMRG sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepParams {
    pub max_bond: usize,
    /// Discarded-weight cutoff.
    pub cutoff: f64,
    /// Density-matrix perturbation strength; 0 disables it.
    pub noise: f64,
    /// Lanczos restarts per local update.
    pub niter: usize,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            max_bond: 50,
            cutoff: 1e-12,
            noise: 0.0,
            niter: 2,
        }
    }
}

impl SweepParams {
    pub fn truncation(&self) -> Truncation {
        Truncation {
            max_bond: self.max_bond,
            cutoff: self.cutoff,
        }
    }
}

/// Ordered sweep schedule.
///
/// The setters take one value per sweep; a list shorter than the schedule
/// repeats its last value:
///
/// ```
/// use tn::Sweeps;
/// let s = Sweeps::new(4).max_bond(&[10, 20]).noise(&[1e-7, 0.0]);
/// assert_eq!(s.get(3).unwrap().max_bond, 20);
/// assert_eq!(s.get(2).unwrap().noise, 0.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Sweeps {
    params: Vec<SweepParams>,
}

fn spread<T: Copy>(values: &[T], n: usize) -> impl Iterator<Item = T> + '_ {
    (0..n).filter_map(move |i| values.get(i).or(values.last()).copied())
}

impl Sweeps {
    pub fn new(nsweeps: usize) -> Self {
        Self {
            params: vec![SweepParams::default(); nsweeps],
        }
    }

    pub fn max_bond(mut self, values: &[usize]) -> Self {
        let n = self.len();
        for (p, v) in self.params.iter_mut().zip(spread(values, n)) {
            p.max_bond = v;
        }
        self
    }

    pub fn cutoff(mut self, values: &[f64]) -> Self {
        let n = self.len();
        for (p, v) in self.params.iter_mut().zip(spread(values, n)) {
            p.cutoff = v;
        }
        self
    }

    pub fn noise(mut self, values: &[f64]) -> Self {
        let n = self.len();
        for (p, v) in self.params.iter_mut().zip(spread(values, n)) {
            p.noise = v;
        }
        self
    }

    pub fn niter(mut self, values: &[usize]) -> Self {
        let n = self.len();
        for (p, v) in self.params.iter_mut().zip(spread(values, n)) {
            p.niter = v;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, sweep: usize) -> Option<&SweepParams> {
        self.params.get(sweep)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SweepParams> {
        self.params.iter()
    }
}
