use crate::error::{ClockError, ClockResult};
use crate::site::ClockSite;
use rng::StreamRng;
use tn::{ChargeLayout, LocalOp, SiteSet, C64, MPS};

/// A chain of identical clock sites. Immutable once built and shared
/// read-only between worker threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockLattice {
    site: ClockSite,
    len: usize,
}

impl ClockLattice {
    pub fn new(order: usize, len: usize) -> ClockResult<Self> {
        Self::from_site(ClockSite::new(order)?, len)
    }

    /// Lattice whose states carry the conserved total charge mod N.
    pub fn with_charges(order: usize, len: usize) -> ClockResult<Self> {
        Self::from_site(ClockSite::with_charges(order)?, len)
    }

    pub fn from_site(site: ClockSite, len: usize) -> ClockResult<Self> {
        if len < 2 {
            return Err(ClockError::InvalidLength(len));
        }
        Ok(Self { site, len })
    }

    pub fn site(&self) -> &ClockSite {
        &self.site
    }

    pub fn order(&self) -> usize {
        self.site.order()
    }

    pub fn conserves_charge(&self) -> bool {
        self.site.conserves_charge()
    }

    /// Number of sites.
    pub fn size(&self) -> usize {
        self.len
    }

    /// Operator `name` on the 1-indexed `site`.
    pub fn op_at(&self, name: &str, site: usize) -> ClockResult<LocalOp> {
        if site == 0 || site > self.len {
            return Err(tn::TnError::SiteOutOfRange { site, len: self.len }.into());
        }
        self.site.op(name)
    }

    pub fn check_sector(&self, sector: usize) -> ClockResult<()> {
        if sector >= self.order() {
            return Err(ClockError::InvalidSector {
                sector,
                order: self.order(),
            });
        }
        Ok(())
    }

    /// Product of labelled basis states, one label per site (see
    /// [`ClockSite::state`]). Carries charge labels on a charge-conserving
    /// lattice.
    pub fn basis_state(&self, labels: &[&str]) -> ClockResult<MPS> {
        if labels.len() != self.len {
            return Err(ClockError::InvalidLength(labels.len()));
        }
        let states = labels
            .iter()
            .map(|l| self.site.state(l))
            .collect::<ClockResult<Vec<_>>>()?;
        self.product_of(&states)
    }

    fn product_of(&self, states: &[usize]) -> ClockResult<MPS> {
        match self.charge_layout() {
            Some(layout) => Ok(MPS::basis_state_with_charges(&layout, states)?),
            None => Ok(MPS::basis_state(&self.dims(), states)?),
        }
    }

    /// Random product state with Gaussian complex amplitudes on every site.
    /// Carries no charge labels.
    pub fn random_state(&self, rng: &mut StreamRng) -> ClockResult<MPS> {
        let n = self.order();
        let vectors = (0..self.len)
            .map(|_| {
                (0..n)
                    .map(|_| C64::new(rng.next_normal(b"re"), rng.next_normal(b"im")))
                    .collect()
            })
            .collect();
        Ok(MPS::product(vectors)?)
    }

    /// Random basis state whose total charge equals `sector`.
    pub fn random_charge_state(&self, sector: usize, rng: &mut StreamRng) -> ClockResult<MPS> {
        self.check_sector(sector)?;
        let states = random_ints_modulo(self.len, self.order(), sector, rng);
        self.product_of(&states)
    }
}

/// `len` uniform integers in `0..modulus` whose sum is `sum` mod `modulus`;
/// the last entry is fixed by the constraint.
pub fn random_ints_modulo(
    len: usize,
    modulus: usize,
    sum: usize,
    rng: &mut StreamRng,
) -> Vec<usize> {
    if len == 0 || modulus == 0 {
        return Vec::new();
    }
    let mut out: Vec<usize> = (0..len - 1).map(|_| rng.next_below(modulus, b"state")).collect();
    let partial = out.iter().sum::<usize>() % modulus;
    out.push((sum % modulus + modulus - partial) % modulus);
    out
}

impl SiteSet for ClockLattice {
    type Error = ClockError;

    fn len(&self) -> usize {
        self.len
    }

    fn dim(&self, _site: usize) -> usize {
        self.site.dim()
    }

    fn op(&self, name: &str, _site: usize) -> ClockResult<LocalOp> {
        self.site.op(name)
    }

    fn charge_layout(&self) -> Option<ChargeLayout> {
        if !self.conserves_charge() {
            return None;
        }
        ChargeLayout::new(
            self.order(),
            vec![(0..self.order()).map(|k| self.site.charge(k)).collect(); self.len],
        )
        .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{random_ints_modulo, ClockLattice};
    use crate::error::ClockError;
    use rng::StreamRng;
    use tn::{SiteSet, TnError};

    #[test]
    fn random_ints_hit_the_requested_sum() {
        let mut rng = StreamRng::labelled("lattice", &["ints"]);
        for sum in 0..5 {
            let v = random_ints_modulo(7, 5, sum, &mut rng);
            assert_eq!(v.len(), 7);
            assert!(v.iter().all(|&x| x < 5));
            assert_eq!(v.iter().sum::<usize>() % 5, sum);
        }
    }

    #[test]
    fn random_charge_state_lands_in_sector() {
        let lattice = ClockLattice::with_charges(3, 6).unwrap();
        let mut rng = StreamRng::labelled("lattice", &["qn"]);
        for sector in 0..3 {
            let psi = lattice.random_charge_state(sector, &mut rng).unwrap();
            assert_eq!(psi.total_charge(), Some(sector));
        }
        assert_eq!(
            lattice.random_charge_state(3, &mut rng).unwrap_err(),
            ClockError::InvalidSector { sector: 3, order: 3 }
        );
    }

    #[test]
    fn random_state_is_normalized_and_reproducible() {
        let lattice = ClockLattice::new(4, 5).unwrap();
        let a = lattice.random_state(&mut StreamRng::labelled("s", &["1"])).unwrap();
        let b = lattice.random_state(&mut StreamRng::labelled("s", &["1"])).unwrap();
        assert!((a.norm() - 1.0).abs() < 1e-12);
        assert!((a.overlap(&b).unwrap().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn lattice_rejects_short_chains() {
        assert_eq!(ClockLattice::new(3, 1), Err(ClockError::InvalidLength(1)));
    }

    #[test]
    fn op_at_checks_site_and_name() {
        let lattice = ClockLattice::new(3, 4).unwrap();
        assert_eq!(
            lattice.op_at("Z", 0),
            Err(TnError::SiteOutOfRange { site: 0, len: 4 }.into())
        );
        assert_eq!(
            lattice.op_at("Z", 5),
            Err(TnError::SiteOutOfRange { site: 5, len: 4 }.into())
        );
        assert_eq!(
            lattice.op_at("Y", 2),
            Err(ClockError::UnrecognizedOperator("Y".to_string()))
        );
        assert_eq!(lattice.op_at("Zdag", 1), lattice.site().op("Zdag"));
        assert_eq!(lattice.op_at("X", 4), lattice.site().op("X"));
    }

    #[test]
    fn basis_state_uses_site_labels() {
        let lattice = ClockLattice::with_charges(2, 3).unwrap();
        let psi = lattice.basis_state(&["Up", "Dn", "1"]).unwrap();
        assert_eq!(psi.total_charge(), Some(0));
        assert!(lattice.charge_layout().is_some());
        assert!(lattice.basis_state(&["Up", "Left", "1"]).is_err());
    }
}
