// Secondary-energy law samplers.
//
// The set of laws is open (more of the ENDF catalogue can be wired in as
// data shows up), so the samplers live behind a trait object. Every law
// takes the incident energy and returns an outgoing energy; Kalbach-87
// also returns the scattering cosine, coupled to the sampled energy in
// the center-of-mass frame.

use std::fmt::Debug;

use rand::{Rng, RngCore};

use crate::ace::{EnergyLawData, KalbachSpectrum, TabularSpectrum};
use crate::angular::Interpolation;
use crate::error::BuildError;

pub trait EnergyLaw: Debug + Send + Sync {
    /// Sample an outgoing energy (and, for correlated laws, a
    /// center-of-mass cosine) for the given incident energy.
    fn sample(&self, e_in: f64, rng: &mut dyn RngCore) -> (f64, Option<f64>);
}

/// Build the sampler for one reaction's energy-law data.
pub fn build_law(data: &EnergyLawData, id: &str) -> Result<Box<dyn EnergyLaw>, BuildError> {
    match data {
        EnergyLawData::Level { threshold, mass_ratio } => {
            if *mass_ratio <= 0.0 {
                return Err(BuildError::cross_section(
                    id,
                    "level scattering law has a non-positive mass ratio",
                ));
            }
            Ok(Box::new(LevelScattering { threshold: *threshold, mass_ratio: *mass_ratio }))
        }
        EnergyLawData::Tabular { ein, tables } => {
            if ein.len() != tables.len() || tables.is_empty() {
                return Err(BuildError::cross_section(
                    id,
                    "continuous tabular law has mismatched energy and table counts",
                ));
            }
            let tables = tables
                .iter()
                .map(|t| OutgoingTable::new(t, id))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Box::new(ContinuousTabular { ein: ein.clone(), tables }))
        }
        EnergyLawData::Maxwellian { ein, temperature, restriction } => {
            if ein.len() != temperature.len() || ein.is_empty() {
                return Err(BuildError::cross_section(
                    id,
                    "Maxwellian law has mismatched energy and temperature counts",
                ));
            }
            Ok(Box::new(SimpleMaxwellian {
                ein: ein.clone(),
                temperature: temperature.clone(),
                restriction: *restriction,
            }))
        }
        EnergyLawData::Kalbach { ein, tables } => {
            if ein.len() != tables.len() || tables.is_empty() {
                return Err(BuildError::cross_section(
                    id,
                    "Kalbach law has mismatched energy and table counts",
                ));
            }
            let tables = tables
                .iter()
                .map(|t| KalbachTable::new(t, id))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Box::new(Kalbach87 { ein: ein.clone(), tables }))
        }
    }
}

/// Pick the outgoing table bracketing `e_in`, stochastically mixed by the
/// interpolation factor.
fn pick_table(ein: &[f64], e_in: f64, rng: &mut dyn RngCore) -> usize {
    let n = ein.len();
    if n == 1 || e_in <= ein[0] {
        return 0;
    }
    if e_in >= ein[n - 1] {
        return n - 1;
    }
    let i = ein.partition_point(|&e| e <= e_in) - 1;
    let f = (e_in - ein[i]) / (ein[i + 1] - ein[i]);
    if rng.gen::<f64>() < f {
        i + 1
    } else {
        i
    }
}

/// One outgoing-energy pdf/cdf table: discrete lines first, then the
/// continuous part inverted per the interpolation flag. Returns the bin
/// index alongside the energy so correlated laws can interpolate their
/// own parameters at the sampled point.
#[derive(Debug, Clone)]
struct OutgoingTable {
    interpolation: Interpolation,
    n_discrete: usize,
    e_out: Vec<f64>,
    pdf: Vec<f64>,
    cdf: Vec<f64>,
}

impl OutgoingTable {
    fn new(t: &TabularSpectrum, id: &str) -> Result<Self, BuildError> {
        if t.e_out.len() != t.pdf.len() || t.cdf.len() != t.pdf.len() || t.e_out.len() < 2 {
            return Err(BuildError::cross_section(
                id,
                "tabular spectrum has mismatched e_out/pdf/cdf lengths",
            ));
        }
        Ok(Self {
            interpolation: Interpolation::from_flag(t.interpolation)?,
            n_discrete: t.n_discrete,
            e_out: t.e_out.clone(),
            pdf: t.pdf.clone(),
            cdf: t.cdf.clone(),
        })
    }

    fn sample(&self, rng: &mut dyn RngCore) -> (f64, usize) {
        let chi = rng.gen::<f64>();

        // Discrete lines carry the head of the cumulative
        for k in 0..self.n_discrete {
            if chi < self.cdf[k] {
                return (self.e_out[k], k);
            }
        }

        // Continuous portion: bin k has cdf[k] <= chi < cdf[k+1]
        let k = self
            .cdf
            .partition_point(|&c| c <= chi)
            .saturating_sub(1)
            .max(self.n_discrete)
            .min(self.e_out.len() - 2);
        let e = match self.interpolation {
            Interpolation::Histogram => {
                if self.pdf[k] > 0.0 {
                    self.e_out[k] + (chi - self.cdf[k]) / self.pdf[k]
                } else {
                    self.e_out[k]
                }
            }
            Interpolation::LinLin => {
                let g = (self.pdf[k + 1] - self.pdf[k]) / (self.e_out[k + 1] - self.e_out[k]);
                if g == 0.0 {
                    self.e_out[k] + (chi - self.cdf[k]) / self.pdf[k]
                } else {
                    let h = (self.pdf[k] * self.pdf[k] + 2.0 * g * (chi - self.cdf[k]))
                        .max(0.0)
                        .sqrt();
                    self.e_out[k] + (h - self.pdf[k]) / g
                }
            }
        };
        (e, k)
    }
}

/// Law 3: discrete-level scattering. The outgoing center-of-mass energy
/// is fixed by the level kinematics, C (E_in - threshold) with
/// C = (A / (A + 1))^2; the cosine comes from the reaction's angular
/// table.
#[derive(Debug)]
struct LevelScattering {
    threshold: f64,
    mass_ratio: f64,
}

impl EnergyLaw for LevelScattering {
    fn sample(&self, e_in: f64, _rng: &mut dyn RngCore) -> (f64, Option<f64>) {
        ((self.mass_ratio * (e_in - self.threshold)).max(0.0), None)
    }
}

/// Law 4: continuous tabular distribution.
#[derive(Debug)]
struct ContinuousTabular {
    ein: Vec<f64>,
    tables: Vec<OutgoingTable>,
}

impl EnergyLaw for ContinuousTabular {
    fn sample(&self, e_in: f64, rng: &mut dyn RngCore) -> (f64, Option<f64>) {
        let table = pick_table(&self.ein, e_in, rng);
        let (e, _) = self.tables[table].sample(rng);
        (e, None)
    }
}

/// Laws 7 and 9: simple Maxwellian / evaporation spectrum. The nuclear
/// temperature is interpolated over incident energy; outgoing energies are
/// drawn from E = -T ln(x1 x2) and rejected above E_in - U. When the open
/// window is tiny compared to T the loop would almost never accept, so the
/// sample short-circuits to the window edge.
#[derive(Debug)]
struct SimpleMaxwellian {
    ein: Vec<f64>,
    temperature: Vec<f64>,
    restriction: f64,
}

impl SimpleMaxwellian {
    fn temperature_at(&self, e_in: f64) -> f64 {
        let n = self.ein.len();
        if n == 1 || e_in <= self.ein[0] {
            return self.temperature[0];
        }
        if e_in >= self.ein[n - 1] {
            return self.temperature[n - 1];
        }
        let i = self.ein.partition_point(|&e| e <= e_in) - 1;
        let f = (e_in - self.ein[i]) / (self.ein[i + 1] - self.ein[i]);
        self.temperature[i] + f * (self.temperature[i + 1] - self.temperature[i])
    }
}

impl EnergyLaw for SimpleMaxwellian {
    fn sample(&self, e_in: f64, rng: &mut dyn RngCore) -> (f64, Option<f64>) {
        let temp = self.temperature_at(e_in);
        let window = e_in - self.restriction;
        if window < 0.01 * temp {
            return (window.max(0.0), None);
        }
        loop {
            let energy = -temp * (rng.gen::<f64>() * rng.gen::<f64>()).ln();
            if energy <= window {
                return (energy, None);
            }
        }
    }
}

/// Law 44: Kalbach-87. The outgoing energy comes from a tabular spectrum;
/// the precompound fraction R and slope A are interpolated at the sampled
/// energy and couple the cosine to it in the center-of-mass frame.
#[derive(Debug, Clone)]
struct KalbachTable {
    spectrum: OutgoingTable,
    r: Vec<f64>,
    a: Vec<f64>,
}

impl KalbachTable {
    fn new(t: &KalbachSpectrum, id: &str) -> Result<Self, BuildError> {
        let spectrum = OutgoingTable::new(&t.spectrum, id)?;
        if t.r.len() != spectrum.e_out.len() || t.a.len() != spectrum.e_out.len() {
            return Err(BuildError::cross_section(
                id,
                "Kalbach R/A arrays do not match the outgoing energy grid",
            ));
        }
        Ok(Self { spectrum, r: t.r.clone(), a: t.a.clone() })
    }

    fn sample(&self, rng: &mut dyn RngCore) -> (f64, f64) {
        let (energy, idx) = self.spectrum.sample(rng);

        let (rk, ak) = match self.spectrum.interpolation {
            Interpolation::Histogram => (self.r[idx], self.a[idx]),
            Interpolation::LinLin => {
                let e = &self.spectrum.e_out;
                let f = (energy - e[idx]) / (e[idx + 1] - e[idx]);
                (
                    self.r[idx] + f * (self.r[idx + 1] - self.r[idx]),
                    self.a[idx] + f * (self.a[idx + 1] - self.a[idx]),
                )
            }
        };

        let chi = rng.gen::<f64>();
        let rho = rng.gen::<f64>();
        let mu = if ak.abs() < 1e-9 {
            1.0 - 2.0 * rho
        } else if chi > rk {
            let t = (2.0 * rho - 1.0) * ak.sinh();
            (t + (t * t + 1.0).sqrt()).ln() / ak
        } else {
            (rho * ak.exp() + (1.0 - rho) * (-ak).exp()).ln() / ak
        };
        (energy, mu.clamp(-1.0, 1.0))
    }
}

#[derive(Debug)]
struct Kalbach87 {
    ein: Vec<f64>,
    tables: Vec<KalbachTable>,
}

impl EnergyLaw for Kalbach87 {
    fn sample(&self, e_in: f64, rng: &mut dyn RngCore) -> (f64, Option<f64>) {
        let table = pick_table(&self.ein, e_in, rng);
        let (e, mu) = self.tables[table].sample(rng);
        (e, Some(mu))
    }
}
