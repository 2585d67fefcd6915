// Fission bank: the ordered set of fission sites produced by one cycle
// and consumed as the next cycle's source.
//
// At cycle close every banked entry is split by weight and the running
// k-eff estimate: an entry of weight w becomes max(1, floor(w/k)) copies
// of weight (w/k)/split, so the population stays near the nominal size
// while total weight is preserved through the 1/k normalization.

use crate::particle::CellParticle;

#[derive(Debug, Default)]
pub struct FissionBank {
    sites: Vec<CellParticle>,
}

impl FissionBank {
    pub fn new() -> Self {
        Self { sites: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { sites: Vec::with_capacity(capacity) }
    }

    pub fn from_sites(sites: Vec<CellParticle>) -> Self {
        Self { sites }
    }

    pub fn push(&mut self, site: CellParticle) {
        self.sites.push(site);
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn sites(&self) -> &[CellParticle] {
        &self.sites
    }

    /// Split discipline at cycle close. Entry order is preserved; a
    /// non-positive k empties the bank (nothing multiplied this cycle).
    pub fn split(self, keff: f64) -> FissionBank {
        if keff <= 0.0 {
            return FissionBank::new();
        }
        let mut next = FissionBank::with_capacity(self.sites.len());
        for (cell, particle) in self.sites {
            let amplitude = particle.weight / keff;
            let split = (amplitude as usize).max(1);
            let mut copy = particle;
            copy.weight = amplitude / split as f64;
            for _ in 0..split {
                next.push((cell, copy.clone()));
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;

    fn site(weight: f64) -> CellParticle {
        let mut particle = Particle::default();
        particle.weight = weight;
        (0, particle)
    }

    #[test]
    fn test_split_discipline() {
        // w = 2.7 at k = 1 becomes 2 copies of weight 1.35
        let mut bank = FissionBank::new();
        bank.push(site(2.7));
        let next = bank.split(1.0);

        assert_eq!(next.len(), 2);
        for (_, particle) in next.sites() {
            assert!((particle.weight - 1.35).abs() < 1e-12);
        }
    }

    #[test]
    fn test_split_keeps_low_weight_entries() {
        // w/k < 1 still yields one copy, with the renormalized weight
        let mut bank = FissionBank::new();
        bank.push(site(0.4));
        let next = bank.split(2.0);
        assert_eq!(next.len(), 1);
        assert!((next.sites()[0].1.weight - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_split_preserves_total_weight() {
        let mut bank = FissionBank::new();
        for w in [0.3, 1.0, 2.7, 5.2] {
            bank.push(site(w));
        }
        let keff = 1.3;
        let expected: f64 = [0.3, 1.0, 2.7, 5.2].iter().map(|w| w / keff).sum();
        let next = bank.split(keff);
        let total: f64 = next.sites().iter().map(|(_, p)| p.weight).sum();
        assert!((total - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_keff_empties_the_bank() {
        let mut bank = FissionBank::new();
        bank.push(site(1.0));
        assert!(bank.split(0.0).is_empty());
    }
}
