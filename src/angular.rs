// Scattering-cosine samplers.
//
// Each reaction's angular data provides one cosine table per tabulated
// incident energy; the sampler picks the bracketing table stochastically
// by the interpolation factor, then samples a cosine from it. Three table
// forms cover what the nuclear data gives: isotropic, 32 equiprobable
// bins, and a tabulated pdf/cdf inverted analytically (histogram or
// lin-lin).

use rand::{Rng, RngCore};

use crate::ace::{AngularData, AngularTable};
use crate::error::BuildError;

#[derive(Debug, Clone)]
pub enum CosineTable {
    Isotropic,
    /// 33 cosine boundaries delimiting 32 equiprobable bins.
    EquiBins(Vec<f64>),
    Tabular {
        interpolation: Interpolation,
        mu: Vec<f64>,
        pdf: Vec<f64>,
        cdf: Vec<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Histogram,
    LinLin,
}

impl Interpolation {
    pub fn from_flag(flag: u8) -> Result<Self, BuildError> {
        match flag {
            1 => Ok(Interpolation::Histogram),
            2 => Ok(Interpolation::LinLin),
            other => Err(BuildError::Sampler(format!(
                "interpolation flag {} is not histogram (1) or lin-lin (2)",
                other
            ))),
        }
    }
}

impl CosineTable {
    fn from_data(data: &AngularTable) -> Result<Self, BuildError> {
        match data {
            AngularTable::Isotropic => Ok(CosineTable::Isotropic),
            AngularTable::EquiBins { bins } => {
                if bins.len() != 33 {
                    return Err(BuildError::Sampler(format!(
                        "equiprobable cosine table has {} boundaries, expected 33",
                        bins.len()
                    )));
                }
                Ok(CosineTable::EquiBins(bins.clone()))
            }
            AngularTable::Tabular { interpolation, mu, pdf, cdf } => {
                if mu.len() != pdf.len() || cdf.len() != pdf.len() {
                    return Err(BuildError::Sampler(
                        "tabular cosine table has mismatched mu/pdf/cdf lengths".into(),
                    ));
                }
                Ok(CosineTable::Tabular {
                    interpolation: Interpolation::from_flag(*interpolation)?,
                    mu: mu.clone(),
                    pdf: pdf.clone(),
                    cdf: cdf.clone(),
                })
            }
        }
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        let mu = match self {
            CosineTable::Isotropic => 1.0 - 2.0 * rng.gen::<f64>(),
            CosineTable::EquiBins(bins) => {
                let chi = rng.gen::<f64>();
                let pos = ((chi * 32.0) as usize).min(31);
                // Interpolated cosine within the sampled bin
                bins[pos] + (chi * 32.0 - pos as f64) * (bins[pos + 1] - bins[pos])
            }
            CosineTable::Tabular { interpolation, mu, pdf, cdf } => {
                let chi = rng.gen::<f64>();
                // cdf[k] accumulates up to mu[k]: invert within bin k
                let idx = cdf
                    .partition_point(|&c| c <= chi)
                    .saturating_sub(1)
                    .min(mu.len() - 2);
                match interpolation {
                    Interpolation::Histogram => {
                        if pdf[idx] > 0.0 {
                            mu[idx] + (chi - cdf[idx]) / pdf[idx]
                        } else {
                            mu[idx]
                        }
                    }
                    Interpolation::LinLin => {
                        let g = (pdf[idx + 1] - pdf[idx]) / (mu[idx + 1] - mu[idx]);
                        if g == 0.0 {
                            mu[idx] + (chi - cdf[idx]) / pdf[idx]
                        } else {
                            let h = (pdf[idx] * pdf[idx] + 2.0 * g * (chi - cdf[idx]))
                                .max(0.0)
                                .sqrt();
                            mu[idx] + (h - pdf[idx]) / g
                        }
                    }
                }
            }
        };
        mu.clamp(-1.0, 1.0)
    }
}

/// Energy-indexed cosine sampler: one table per tabulated incident energy.
#[derive(Debug, Clone)]
pub struct MuSampler {
    energies: Vec<f64>,
    tables: Vec<CosineTable>,
}

impl MuSampler {
    pub fn from_data(data: &AngularData) -> Result<Self, BuildError> {
        if data.energies.len() != data.tables.len() || data.tables.is_empty() {
            return Err(BuildError::Sampler(
                "angular distribution has mismatched energy and table counts".into(),
            ));
        }
        let tables = data
            .tables
            .iter()
            .map(CosineTable::from_data)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { energies: data.energies.clone(), tables })
    }

    pub fn isotropic() -> Self {
        Self { energies: vec![0.0], tables: vec![CosineTable::Isotropic] }
    }

    /// Sample a scattering cosine at the incident energy. The bracketing
    /// table is chosen stochastically by the interpolation factor.
    pub fn sample(&self, energy: f64, rng: &mut dyn RngCore) -> f64 {
        let table = self.pick_table(energy, rng);
        self.tables[table].sample(rng)
    }

    fn pick_table(&self, energy: f64, rng: &mut dyn RngCore) -> usize {
        let n = self.energies.len();
        if n == 1 || energy <= self.energies[0] {
            return 0;
        }
        if energy >= self.energies[n - 1] {
            return n - 1;
        }
        let i = self.energies.partition_point(|&e| e <= energy) - 1;
        let f = (energy - self.energies[i]) / (self.energies[i + 1] - self.energies[i]);
        if rng.gen::<f64>() < f {
            i + 1
        } else {
            i
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Prn;

    #[test]
    fn test_isotropic_range_and_mean() {
        let table = CosineTable::Isotropic;
        let mut rng = Prn::new(42);
        let mut sum = 0.0;
        let m = 100_000;
        for _ in 0..m {
            let mu = table.sample(&mut rng);
            assert!((-1.0..=1.0).contains(&mu));
            sum += mu;
        }
        let mean = sum / m as f64;
        assert!(mean.abs() < 0.01, "mean cosine {} not near zero", mean);
    }

    #[test]
    fn test_equibins_interpolates_within_bin() {
        // Uniform boundaries: the table reduces to an isotropic cosine
        let bins: Vec<f64> = (0..33).map(|i| -1.0 + i as f64 / 16.0).collect();
        let table = CosineTable::EquiBins(bins);
        let mut rng = Prn::new(7);
        let mut sum = 0.0;
        let m = 100_000;
        for _ in 0..m {
            let mu = table.sample(&mut rng);
            assert!((-1.0..=1.0).contains(&mu));
            sum += mu;
        }
        assert!((sum / m as f64).abs() < 0.01);
    }

    #[test]
    fn test_tabular_histogram_inversion() {
        // Two equal histogram bins over [-1, 1]
        let table = CosineTable::Tabular {
            interpolation: Interpolation::Histogram,
            mu: vec![-1.0, 0.0, 1.0],
            pdf: vec![0.5, 0.5, 0.5],
            cdf: vec![0.0, 0.5, 1.0],
        };
        let mut rng = Prn::new(3);
        let mut below = 0usize;
        let m = 100_000;
        for _ in 0..m {
            let mu = table.sample(&mut rng);
            assert!((-1.0..=1.0).contains(&mu));
            if mu < 0.0 {
                below += 1;
            }
        }
        let f = below as f64 / m as f64;
        assert!((f - 0.5).abs() < 0.01, "fraction below zero {}", f);
    }

    #[test]
    fn test_mu_sampler_brackets_by_energy() {
        // Forward-peaked table at high energy, backward at low
        let backward = AngularTable::Tabular {
            interpolation: 1,
            mu: vec![-1.0, 0.0],
            pdf: vec![1.0, 1.0],
            cdf: vec![0.0, 1.0],
        };
        let forward = AngularTable::Tabular {
            interpolation: 1,
            mu: vec![0.0, 1.0],
            pdf: vec![1.0, 1.0],
            cdf: vec![0.0, 1.0],
        };
        let sampler = MuSampler::from_data(&AngularData {
            energies: vec![1.0, 1e6],
            tables: vec![backward, forward],
        })
        .unwrap();

        let mut rng = Prn::new(5);
        for _ in 0..100 {
            assert!(sampler.sample(0.5, &mut rng) <= 0.0);
            assert!(sampler.sample(2e6, &mut rng) >= 0.0);
        }
    }
}
