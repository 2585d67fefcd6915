// Per-isotope cross-section engine.
//
// An isotope owns its child grid into the master energy grid, the ESZ
// arrays on its native grid, and the sampled reactions built from the
// table data. Branching probabilities are returned as fractions of the
// total cross section so the collision site needs a single uniform draw:
// `absorption_prob` covers disappearance plus fission, and the fission
// share is the upper slice of it.

use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::ace::{NeutronTable, CHANCE_FISSION_MTS};
use crate::angular::MuSampler;
use crate::energy_grid::{ChildGrid, MasterGrid};
use crate::energy_law::build_law;
use crate::error::BuildError;
use crate::particle::Energy;
use crate::reaction::{
    DelayedFissionReaction, DelayedGroupSampler, ElasticScattering, FissionReaction,
    InelasticScattering, Reaction,
};
use crate::sampler::ThresholdSampler;

#[derive(Debug, Clone, Copy)]
pub struct FreeGasThresholds {
    /// Free-gas target motion applies below this multiple of kT.
    pub energy: f64,
    /// Or below this atomic weight ratio at any energy.
    pub awr: f64,
}

impl Default for FreeGasThresholds {
    fn default() -> Self {
        Self { energy: 400.0, awr: 1.0 }
    }
}

#[derive(Debug)]
enum FissionTreatment {
    NonFissile,
    /// Every fission progeny gets the prompt spectrum.
    Prompt { reaction: Reaction },
    /// One extra uniform routes progeny between the prompt and delayed
    /// spectra using beta = nu_d / nu_p.
    Delayed { prompt: Reaction, delayed: Reaction },
}

#[derive(Debug, Default)]
struct NuPolicy {
    total: Option<crate::ace::NuData>,
    prompt: Option<crate::ace::NuData>,
    delayed: Option<crate::ace::NuData>,
}

impl NuPolicy {
    fn nu_bar(&self, energy: f64) -> f64 {
        if let Some(total) = &self.total {
            return total.nu_bar(energy);
        }
        self.prompt.as_ref().map_or(0.0, |n| n.nu_bar(energy))
            + self.delayed.as_ref().map_or(0.0, |n| n.nu_bar(energy))
    }

    fn prompt_nu(&self, energy: f64) -> f64 {
        match (&self.prompt, &self.total) {
            (Some(p), _) => p.nu_bar(energy),
            (None, Some(t)) => t.nu_bar(energy),
            (None, None) => 0.0,
        }
    }

    fn delayed_nu(&self, energy: f64) -> f64 {
        self.delayed.as_ref().map_or(0.0, |n| n.nu_bar(energy))
    }

    /// Delayed-neutron fraction nu_d / nu_p; zero where prompt production
    /// vanishes.
    fn beta(&self, energy: f64) -> f64 {
        let prompt = self.prompt_nu(energy);
        if prompt <= 0.0 {
            return 0.0;
        }
        self.delayed_nu(energy) / prompt
    }
}

#[derive(Debug)]
pub struct Isotope {
    name: String,
    internal_id: usize,
    awr: f64,
    kt: f64,
    fissile: bool,
    child: Arc<ChildGrid>,
    // Native-grid arrays; `disappearance` is capture without neutron out,
    // fission is tracked separately and densified over the full grid.
    total: Vec<f64>,
    disappearance: Vec<f64>,
    elastic_xs: Vec<f64>,
    fission_xs: Vec<f64>,
    inelastic_total: Vec<f64>,
    elastic: Reaction,
    inelastic: Vec<Reaction>,
    inelastic_sampler: Option<ThresholdSampler<usize>>,
    fission: FissionTreatment,
    nu: NuPolicy,
}

impl Isotope {
    pub fn from_table(
        table: &NeutronTable,
        grid: &MasterGrid,
        internal_id: usize,
        freegas: FreeGasThresholds,
    ) -> Result<Self, BuildError> {
        let id = table.name.clone();
        let n = table.energy.len();
        if n < 2 {
            return Err(BuildError::cross_section(&id, "energy grid has fewer than 2 points"));
        }
        for (label, arr) in [
            ("total", &table.total),
            ("absorption", &table.absorption),
            ("elastic", &table.elastic),
        ] {
            if arr.len() != n {
                return Err(BuildError::cross_section(
                    &id,
                    format!("{} array length {} does not match the energy grid ({})", label, arr.len(), n),
                ));
            }
        }

        let child = Arc::new(grid.child(&table.energy));

        let elastic = Reaction::Elastic(ElasticScattering::new(
            table.awr,
            table.kt,
            MuSampler::from_data(&table.elastic_angular)?,
            freegas.energy,
            freegas.awr,
        ));

        // Inelastic channels: everything that carries neutrons out and is
        // not a fission chance
        let mut inelastic = Vec::new();
        let mut entries = Vec::new();
        let mut inelastic_total = vec![0.0; n];
        for r in &table.reactions {
            if r.mt == 18 || CHANCE_FISSION_MTS.contains(&r.mt) || r.ty == 0 {
                continue;
            }
            let law = match &r.energy {
                Some(data) => build_law(data, &id)?,
                None => {
                    return Err(BuildError::cross_section(
                        &id,
                        format!("reaction MT {} has no supported secondary energy law", r.mt),
                    ))
                }
            };
            let mu = match &r.angular {
                Some(data) => Some(MuSampler::from_data(data)?),
                None => None,
            };
            let index = inelastic.len();
            inelastic.push(Reaction::Inelastic(InelasticScattering::new(
                r.mt,
                table.awr,
                mu,
                law,
                r.ty.unsigned_abs().min(10) as f64,
                r.ty < 0,
            )));
            for (i, v) in inelastic_total.iter_mut().enumerate() {
                *v += r.xs.at(i);
            }
            entries.push((index, r.xs.clone()));
        }
        let inelastic_sampler =
            if entries.is_empty() { None } else { Some(ThresholdSampler::new(entries)?) };

        // Fission treatment
        let fissile = table.has_fission();
        let nu = NuPolicy {
            total: table.nu_total.clone(),
            prompt: table.nu_prompt.clone(),
            delayed: table.nu_delayed.clone(),
        };
        let mut fission_xs = vec![0.0; n];
        let fission = if fissile {
            if nu.total.is_none() && nu.prompt.is_none() {
                return Err(BuildError::cross_section(&id, "fissile isotope has an empty NU block"));
            }
            let xs = table.fission_xs().unwrap();
            for (i, v) in fission_xs.iter_mut().enumerate() {
                *v = xs.at(i);
            }
            let prompt = Self::build_prompt_fission(table, &child, &id)?;
            if !table.delayed_groups.is_empty() && nu.delayed.is_some() {
                let groups = table
                    .delayed_groups
                    .iter()
                    .map(|g| {
                        Ok(DelayedGroupSampler {
                            decay_constant: g.decay_constant,
                            probability: g.probability.clone(),
                            law: build_law(&g.spectrum, &id)?,
                        })
                    })
                    .collect::<Result<Vec<_>, BuildError>>()?;
                FissionTreatment::Delayed {
                    prompt,
                    delayed: Reaction::DelayedFission(DelayedFissionReaction::new(groups)),
                }
            } else {
                FissionTreatment::Prompt { reaction: prompt }
            }
        } else {
            FissionTreatment::NonFissile
        };

        Ok(Self {
            name: table.name.clone(),
            internal_id,
            awr: table.awr,
            kt: table.kt,
            fissile,
            child,
            total: table.total.clone(),
            disappearance: table.absorption.clone(),
            elastic_xs: table.elastic.clone(),
            fission_xs,
            inelastic_total,
            elastic,
            inelastic,
            inelastic_sampler,
            fission,
            nu,
        })
    }

    fn build_prompt_fission(
        table: &NeutronTable,
        child: &Arc<ChildGrid>,
        id: &str,
    ) -> Result<Reaction, BuildError> {
        if let Some(r) = table.reaction(18) {
            let law = match &r.energy {
                Some(data) => build_law(data, id)?,
                None => {
                    return Err(BuildError::cross_section(
                        id,
                        "fission reaction has no secondary energy law",
                    ))
                }
            };
            return Ok(Reaction::Fission(FissionReaction::Single { law }));
        }

        // Multi-chance fission: one reaction whose spectrum is sampled from
        // the union of the chance distributions, weighted by their partial
        // cross sections at the incident energy
        let mut laws = Vec::new();
        let mut entries = Vec::new();
        for r in &table.reactions {
            if !CHANCE_FISSION_MTS.contains(&r.mt) {
                continue;
            }
            let law = match &r.energy {
                Some(data) => build_law(data, id)?,
                None => {
                    return Err(BuildError::cross_section(
                        id,
                        format!("chance fission MT {} has no secondary energy law", r.mt),
                    ))
                }
            };
            entries.push((laws.len(), r.xs.clone()));
            laws.push(law);
        }
        let total = table.fission_xs().unwrap();
        Ok(Reaction::Fission(FissionReaction::Chance {
            child: child.clone(),
            sampler: ThresholdSampler::new(entries)?,
            laws,
            total,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn internal_id(&self) -> usize {
        self.internal_id
    }

    pub fn awr(&self) -> f64 {
        self.awr
    }

    pub fn kt(&self) -> f64 {
        self.kt
    }

    pub fn is_fissile(&self) -> bool {
        self.fissile
    }

    pub fn total_xs(&self, energy: &Energy) -> f64 {
        self.child.interpolate(energy, &self.total)
    }

    pub fn fission_xs(&self, energy: &Energy) -> f64 {
        self.child.interpolate(energy, &self.fission_xs)
    }

    /// Probability that a collision with this isotope absorbs the neutron
    /// (disappearance plus fission), as a fraction of the total.
    pub fn absorption_prob(&self, energy: &Energy) -> f64 {
        let total = self.total_xs(energy);
        if total <= 0.0 {
            return 0.0;
        }
        (self.child.interpolate(energy, &self.disappearance)
            + self.child.interpolate(energy, &self.fission_xs))
            / total
    }

    /// Fission share of the total cross section.
    pub fn fission_prob(&self, energy: &Energy) -> f64 {
        let total = self.total_xs(energy);
        if total <= 0.0 {
            return 0.0;
        }
        self.child.interpolate(energy, &self.fission_xs) / total
    }

    /// Elastic share of the total cross section.
    pub fn elastic_prob(&self, energy: &Energy) -> f64 {
        let total = self.total_xs(energy);
        if total <= 0.0 {
            return 0.0;
        }
        self.child.interpolate(energy, &self.elastic_xs) / total
    }

    /// Average number of neutrons per fission at this energy.
    pub fn nu_bar(&self, energy: &Energy) -> f64 {
        self.nu.nu_bar(energy.value)
    }

    /// Delayed-neutron fraction at this energy.
    pub fn beta(&self, energy: &Energy) -> f64 {
        self.nu.beta(energy.value)
    }

    pub fn elastic(&self) -> &Reaction {
        &self.elastic
    }

    /// The fission reaction to apply for a progeny at this energy. With
    /// delayed data one extra uniform routes between the prompt and
    /// delayed spectra.
    pub fn fission(&self, energy: &Energy, rng: &mut dyn RngCore) -> Option<&Reaction> {
        match &self.fission {
            FissionTreatment::NonFissile => None,
            FissionTreatment::Prompt { reaction } => Some(reaction),
            FissionTreatment::Delayed { prompt, delayed } => {
                if rng.gen::<f64>() < self.nu.beta(energy.value) {
                    Some(delayed)
                } else {
                    Some(prompt)
                }
            }
        }
    }

    /// Pick an inelastic channel weighted by the partial cross sections at
    /// this energy. Falls back to elastic when the isotope has no
    /// inelastic data (the branch probabilities make this unreachable for
    /// consistent tables).
    pub fn inelastic(&self, energy: &Energy, rng: &mut dyn RngCore) -> &Reaction {
        let Some(sampler) = &self.inelastic_sampler else {
            return &self.elastic;
        };
        let (j, f) = self.child.locate(energy);
        let total = self.inelastic_total[j] + f * (self.inelastic_total[j + 1] - self.inelastic_total[j]);
        let value = total * rng.gen::<f64>();
        let index = *sampler.sample(j, value, f);
        &self.inelastic[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ace::{AngularData, EnergyLawData, NuData, ReactionData, Tabulated};
    use crate::rng::Prn;

    fn fission_law() -> EnergyLawData {
        EnergyLawData::Maxwellian {
            ein: vec![0.0, 2e7],
            temperature: vec![1.3e6, 1.3e6],
            restriction: 0.0,
        }
    }

    fn fissile_table(prompt_nu: f64, delayed_nu: f64) -> NeutronTable {
        NeutronTable {
            name: "fake235".into(),
            awr: 233.0,
            kt: 0.0253,
            energy: vec![1e-5, 2e7],
            total: vec![2.0, 2.0],
            absorption: vec![0.0, 0.0],
            elastic: vec![1.0, 1.0],
            elastic_angular: AngularData::isotropic(),
            reactions: vec![ReactionData {
                mt: 18,
                q: 0.0,
                ty: 19,
                xs: crate::ace::CrossSection::new(0, vec![1.0, 1.0]),
                angular: None,
                energy: Some(fission_law()),
            }],
            nu_total: None,
            nu_prompt: Some(NuData::Polynomial { coefficients: vec![prompt_nu] }),
            nu_delayed: if delayed_nu > 0.0 {
                Some(NuData::Polynomial { coefficients: vec![delayed_nu] })
            } else {
                None
            },
            delayed_groups: if delayed_nu > 0.0 {
                vec![crate::ace::DelayedGroup {
                    decay_constant: 0.08,
                    probability: Tabulated { x: vec![0.0, 2e7], y: vec![1.0, 1.0] },
                    spectrum: fission_law(),
                }]
            } else {
                vec![]
            },
        }
    }

    fn master_energy(table: &NeutronTable, value: f64) -> (MasterGrid, Energy) {
        let grid = MasterGrid::from_grids([table.energy.as_slice()]);
        let mut e = Energy::new(value);
        grid.interpolate(&mut e);
        (grid, e)
    }

    #[test]
    fn test_probability_decomposition() {
        let table = fissile_table(2.0, 0.0);
        let (grid, e) = master_energy(&table, 1e6);
        let iso = Isotope::from_table(&table, &grid, 0, FreeGasThresholds::default()).unwrap();

        assert!(iso.is_fissile());
        assert!((iso.total_xs(&e) - 2.0).abs() < 1e-12);
        assert!((iso.absorption_prob(&e) - 0.5).abs() < 1e-12);
        assert!((iso.fission_prob(&e) - 0.5).abs() < 1e-12);
        assert!((iso.elastic_prob(&e) - 0.5).abs() < 1e-12);
        assert!((iso.nu_bar(&e) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_fissile_without_nu_block_is_a_build_error() {
        let mut table = fissile_table(2.0, 0.0);
        table.nu_prompt = None;
        let grid = MasterGrid::from_grids([table.energy.as_slice()]);
        let err = Isotope::from_table(&table, &grid, 0, FreeGasThresholds::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_delayed_branching_fraction() {
        // beta = nu_d / nu_p = 0.01
        let table = fissile_table(2.0, 0.02);
        let (grid, e) = master_energy(&table, 1e6);
        let iso = Isotope::from_table(&table, &grid, 0, FreeGasThresholds::default()).unwrap();
        assert!((iso.beta(&e) - 0.01).abs() < 1e-12);

        let mut rng = Prn::new(31);
        let draws = 1_000_000;
        let mut delayed = 0usize;
        for _ in 0..draws {
            match iso.fission(&e, &mut rng).unwrap() {
                Reaction::DelayedFission(_) => delayed += 1,
                Reaction::Fission(_) => {}
                other => panic!("unexpected reaction {:?}", std::mem::discriminant(other)),
            }
        }
        let fraction = delayed as f64 / draws as f64;
        let tolerance = 3.0 * (0.01_f64 * 0.99 / draws as f64).sqrt();
        assert!(
            (fraction - 0.01).abs() < tolerance,
            "delayed fraction {} outside 0.01 +/- {}",
            fraction,
            tolerance
        );
    }

    #[test]
    fn test_inelastic_channel_selection() {
        let mut table = fissile_table(2.0, 0.0);
        table.reactions.push(ReactionData {
            mt: 91,
            q: -1e5,
            ty: -1,
            xs: crate::ace::CrossSection::new(0, vec![0.5, 0.5]),
            angular: None,
            energy: Some(EnergyLawData::Tabular {
                ein: vec![1e-5, 2e7],
                tables: vec![
                    crate::ace::TabularSpectrum {
                        interpolation: 1,
                        n_discrete: 0,
                        e_out: vec![1e4, 1e5],
                        pdf: vec![1.0 / 9e4, 1.0 / 9e4],
                        cdf: vec![0.0, 1.0],
                    };
                    2
                ],
            }),
        });
        let (grid, e) = master_energy(&table, 1e6);
        let iso = Isotope::from_table(&table, &grid, 0, FreeGasThresholds::default()).unwrap();
        let mut rng = Prn::new(2);
        match iso.inelastic(&e, &mut rng) {
            Reaction::Inelastic(rx) => assert_eq!(rx.mt, 91),
            other => panic!("expected the inelastic channel, got {:?}", std::mem::discriminant(other)),
        }
    }
}
