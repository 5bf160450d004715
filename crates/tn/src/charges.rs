//! Z_N charge bookkeeping.
//!
//! Every local basis state carries an additive charge modulo `modulus`. An MPS
//! that conserves charge labels each virtual bond state with the total charge
//! of the sites to its left (the "flux"); a site tensor entry `A[l, s, r]` may
//! only be non-zero when `flux(l) + charge(s) == flux(r)` (mod `modulus`).

use crate::error::{TnError, TnResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChargeLayout {
    modulus: usize,
    site_charges: Vec<Vec<usize>>,
}

impl ChargeLayout {
    pub fn new(modulus: usize, site_charges: Vec<Vec<usize>>) -> TnResult<Self> {
        if modulus == 0 {
            return Err(TnError::Charges("modulus must be positive".into()));
        }
        if site_charges.is_empty() {
            return Err(TnError::EmptySystem);
        }
        let site_charges = site_charges
            .into_iter()
            .map(|qs| qs.into_iter().map(|q| q % modulus).collect())
            .collect();
        Ok(Self { modulus, site_charges })
    }

    /// `len` sites of dimension `modulus`, state `k` carrying charge `k`.
    pub fn cyclic(modulus: usize, len: usize) -> TnResult<Self> {
        Self::new(modulus, vec![(0..modulus).collect(); len])
    }

    pub fn modulus(&self) -> usize {
        self.modulus
    }

    pub fn len(&self) -> usize {
        self.site_charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.site_charges.is_empty()
    }

    pub fn dim(&self, site: usize) -> usize {
        self.site_charges[site].len()
    }

    pub fn charge(&self, site: usize, state: usize) -> usize {
        self.site_charges[site][state]
    }

    pub fn add(&self, a: usize, b: usize) -> usize {
        (a + b) % self.modulus
    }

    pub fn sub(&self, a: usize, b: usize) -> usize {
        (a % self.modulus + self.modulus - b % self.modulus) % self.modulus
    }

    /// Total charge of a product of basis states.
    pub fn total(&self, states: &[usize]) -> TnResult<usize> {
        self.check_states(states)?;
        Ok(states
            .iter()
            .enumerate()
            .fold(0, |acc, (site, &s)| self.add(acc, self.charge(site, s))))
    }

    /// Bond fluxes of a product state: one label per bond, `len + 1` bonds
    /// including both boundaries.
    pub(crate) fn product_fluxes(&self, states: &[usize]) -> TnResult<Vec<Vec<usize>>> {
        self.check_states(states)?;
        let mut bonds = Vec::with_capacity(states.len() + 1);
        let mut flux = 0;
        bonds.push(vec![0]);
        for (site, &s) in states.iter().enumerate() {
            flux = self.add(flux, self.charge(site, s));
            bonds.push(vec![flux]);
        }
        Ok(bonds)
    }

    fn check_states(&self, states: &[usize]) -> TnResult<()> {
        if states.len() != self.len() {
            return Err(TnError::Shape(format!(
                "{} states for {} sites",
                states.len(),
                self.len()
            )));
        }
        for (site, &s) in states.iter().enumerate() {
            if s >= self.dim(site) {
                return Err(TnError::Shape(format!(
                    "state {} out of range on site {} (dim {})",
                    s,
                    site,
                    self.dim(site)
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ChargeLayout;

    #[test]
    fn total_charge_is_sum_mod_n() {
        let layout = ChargeLayout::cyclic(3, 4).unwrap();
        assert_eq!(layout.total(&[1, 2, 2, 0]).unwrap(), 2);
        assert_eq!(layout.total(&[0, 0, 0, 0]).unwrap(), 0);
    }

    #[test]
    fn product_fluxes_accumulate_from_the_left() {
        let layout = ChargeLayout::cyclic(4, 3).unwrap();
        let bonds = layout.product_fluxes(&[3, 2, 1]).unwrap();
        assert_eq!(bonds, vec![vec![0], vec![3], vec![1], vec![2]]);
    }

    #[test]
    fn sub_wraps_around() {
        let layout = ChargeLayout::cyclic(5, 1).unwrap();
        assert_eq!(layout.sub(1, 3), 3);
        assert_eq!(layout.sub(3, 1), 2);
    }

    #[test]
    fn rejects_bad_states() {
        let layout = ChargeLayout::cyclic(2, 2).unwrap();
        assert!(layout.total(&[0, 2]).is_err());
        assert!(layout.total(&[0]).is_err());
    }
}
