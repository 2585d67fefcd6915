// Materials: weighted collections of isotopes with their macroscopic
// total precomputed on the master grid.
//
// Construction normalizes the user fractions, derives the missing
// atom/weight interpretation through the average atomic weight, and
// precomputes Sigma_t(E) = sum_i N_i sigma_t,i(E) per master-grid point.
// Isotope selection at a collision samples the unnormalized partial
// totals with a value drawn in [0, Sigma_t(E)), interpolated between the
// bracketing grid rows.

use std::collections::BTreeMap;

use rand::{Rng, RngCore};

use crate::data::{AVOGADRO, NEUTRON_MASS_AMU};
use crate::energy_grid::MasterGrid;
use crate::error::BuildError;
use crate::isotope::Isotope;
use crate::objects::MaterialObject;
use crate::particle::Energy;
use crate::sampler::TableSampler;

#[derive(Debug, Clone, Copy)]
pub struct IsotopeFraction {
    /// Index into the isotope arena.
    pub isotope: usize,
    pub atomic_fraction: f64,
    pub mass_fraction: f64,
    /// Atomic density in atom/b-cm contributed by this isotope.
    pub density: f64,
}

#[derive(Debug)]
pub struct Material {
    user_id: String,
    internal_id: usize,
    isotopes: Vec<IsotopeFraction>,
    /// Mass density in g/cm3.
    rho: f64,
    /// Atomic density in atom/b-cm.
    atom: f64,
    fissile: bool,
    /// Macroscopic total on the master grid (1/cm).
    total_xs: Vec<f64>,
    /// Partial macroscopic totals per isotope, sampled raw against
    /// Sigma_t(E) * xi.
    isotope_sampler: TableSampler<usize>,
    /// nu * Sigma_f and average nu on the master grid, for fissile
    /// materials.
    nu_sigma_fission: Vec<f64>,
    nu_bar: Vec<f64>,
}

impl Material {
    pub fn new(
        definition: &MaterialObject,
        isotopes: &[Isotope],
        isotope_index: &BTreeMap<String, usize>,
        grid: &MasterGrid,
        internal_id: usize,
    ) -> Result<Self, BuildError> {
        let user_id = definition.id.clone();
        if definition.isotopes.is_empty() {
            return Err(BuildError::material(&user_id, "material does not contain any isotope"));
        }

        // Normalize the user fractions
        let total_fraction: f64 = definition.isotopes.values().sum();
        if total_fraction <= 0.0 {
            return Err(BuildError::material(&user_id, "isotope fractions sum to zero"));
        }

        // Average atomic weight, then the derived fraction per isotope
        let mut fractions: Vec<(usize, f64)> = Vec::with_capacity(definition.isotopes.len());
        let mut accum = 0.0;
        for (name, fraction) in &definition.isotopes {
            let index = *isotope_index.get(name).ok_or_else(|| {
                BuildError::material(&user_id, format!("isotope {} does not exist", name))
            })?;
            let fraction = fraction / total_fraction;
            let awr = isotopes[index].awr();
            match definition.fraction.as_str() {
                "atom" => accum += fraction * awr,
                "weight" => accum += fraction / awr,
                other => {
                    return Err(BuildError::material(
                        &user_id,
                        format!("fraction type {} not recognized", other),
                    ))
                }
            }
            fractions.push((index, fraction));
        }
        let average_awr = match definition.fraction.as_str() {
            "atom" => accum,
            _ => 1.0 / accum,
        };
        let average_atomic = average_awr * NEUTRON_MASS_AMU;

        let mut members: Vec<IsotopeFraction> = fractions
            .iter()
            .map(|&(index, fraction)| {
                let awr = isotopes[index].awr();
                let (atomic_fraction, mass_fraction) = match definition.fraction.as_str() {
                    "atom" => (fraction, fraction * awr / average_awr),
                    _ => (fraction * average_awr / awr, fraction),
                };
                IsotopeFraction { isotope: index, atomic_fraction, mass_fraction, density: 0.0 }
            })
            .collect();

        // Densities from whichever unit the user gave
        let (rho, atom) = match definition.units.as_str() {
            "g/cm3" => {
                let rho = definition.density;
                (rho, rho * AVOGADRO / average_atomic)
            }
            "atom/b-cm" => {
                let atom = definition.density;
                (atom * average_atomic / AVOGADRO, atom)
            }
            other => {
                return Err(BuildError::material(
                    &user_id,
                    format!("unit {} not recognized in density", other),
                ))
            }
        };
        for member in &mut members {
            member.density = member.atomic_fraction * atom;
        }

        // Macroscopic total and the per-isotope partials on the master grid
        let nenergy = grid.len();
        let mut total_xs = vec![0.0; nenergy];
        let mut partials: Vec<Vec<f64>> = vec![vec![0.0; nenergy]; members.len()];
        let mut fissile = false;
        for (k, member) in members.iter().enumerate() {
            let isotope = &isotopes[member.isotope];
            if isotope.is_fissile() {
                fissile = true;
            }
            let mut energy = Energy::new(0.0);
            for i in 0..nenergy {
                energy.index = i.min(nenergy - 2);
                energy.value = grid.energies()[i];
                let partial = member.density * isotope.total_xs(&energy);
                partials[k][i] = partial;
                total_xs[i] += partial;
            }
        }

        let choices: Vec<usize> = (0..members.len()).collect();
        let isotope_sampler = TableSampler::raw(choices, &partials)?;

        // For fissile materials, precompute the production curves
        let mut nu_sigma_fission = Vec::new();
        let mut nu_bar = Vec::new();
        if fissile {
            nu_sigma_fission.resize(nenergy, 0.0);
            nu_bar.resize(nenergy, 0.0);
            let mut energy = Energy::new(0.0);
            for i in 0..nenergy {
                energy.index = i.min(nenergy - 2);
                energy.value = grid.energies()[i];
                let mut nu_fission = 0.0;
                for member in &members {
                    let isotope = &isotopes[member.isotope];
                    if !isotope.is_fissile() {
                        continue;
                    }
                    nu_fission += member.density * isotope.nu_bar(&energy) * isotope.fission_xs(&energy);
                }
                nu_sigma_fission[i] = nu_fission;
                nu_bar[i] = if total_xs[i] > 0.0 { nu_fission / total_xs[i] } else { 0.0 };
            }
        }

        Ok(Self {
            user_id,
            internal_id,
            isotopes: members,
            rho,
            atom,
            fissile,
            total_xs,
            isotope_sampler,
            nu_sigma_fission,
            nu_bar,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn internal_id(&self) -> usize {
        self.internal_id
    }

    pub fn is_fissile(&self) -> bool {
        self.fissile
    }

    pub fn mass_density(&self) -> f64 {
        self.rho
    }

    pub fn atomic_density(&self) -> f64 {
        self.atom
    }

    pub fn isotopes(&self) -> &[IsotopeFraction] {
        &self.isotopes
    }

    /// Macroscopic total at an energy whose master index is current.
    pub fn total_xs(&self, energy: &Energy, factor: f64) -> f64 {
        let i = energy.index;
        self.total_xs[i] + factor * (self.total_xs[i + 1] - self.total_xs[i])
    }

    /// Mean free path 1 / Sigma_t(E); infinite in the zero-cross-section
    /// limit.
    pub fn mean_free_path(&self, energy: &Energy, factor: f64) -> f64 {
        let total = self.total_xs(energy, factor);
        if total <= 0.0 {
            f64::INFINITY
        } else {
            1.0 / total
        }
    }

    /// nu * Sigma_f at this energy (zero for non-fissile materials).
    pub fn nu_fission(&self, energy: &Energy, factor: f64) -> f64 {
        if !self.fissile {
            return 0.0;
        }
        let i = energy.index;
        self.nu_sigma_fission[i] + factor * (self.nu_sigma_fission[i + 1] - self.nu_sigma_fission[i])
    }

    /// Average nu at this energy (zero for non-fissile materials).
    pub fn nu_bar(&self, energy: &Energy, factor: f64) -> f64 {
        if !self.fissile {
            return 0.0;
        }
        let i = energy.index;
        self.nu_bar[i] + factor * (self.nu_bar[i + 1] - self.nu_bar[i])
    }

    /// Sample the collided isotope, weighted by the partial macroscopic
    /// totals at this energy. Returns an index into the isotope arena.
    pub fn sample_isotope(&self, energy: &Energy, factor: f64, rng: &mut dyn RngCore) -> usize {
        let total = self.total_xs(energy, factor);
        let member =
            *self.isotope_sampler.sample_factor(energy.index, total * rng.gen::<f64>(), factor);
        self.isotopes[member].isotope
    }
}

impl std::fmt::Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "material {} :", self.user_id)?;
        writeln!(f, " - density = {:9.6e} g/cm3", self.rho)?;
        writeln!(f, " - density = {:9.6e} atom/b-cm", self.atom)?;
        for member in &self.isotopes {
            writeln!(
                f,
                "  (mass fraction = {:9.6e} ; atomic fraction = {:9.6e}) isotope {}",
                member.mass_fraction, member.atomic_fraction, member.isotope
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ace::{AngularData, NeutronTable};
    use crate::isotope::FreeGasThresholds;
    use crate::rng::Prn;

    fn scatterer(name: &str, awr: f64, sigma: f64) -> NeutronTable {
        NeutronTable {
            name: name.into(),
            awr,
            kt: 0.0253,
            energy: vec![1e-5, 2e7],
            total: vec![sigma, sigma],
            absorption: vec![0.0, 0.0],
            elastic: vec![sigma, sigma],
            elastic_angular: AngularData::isotropic(),
            reactions: vec![],
            nu_total: None,
            nu_prompt: None,
            nu_delayed: None,
            delayed_groups: vec![],
        }
    }

    fn build(
        tables: &[NeutronTable],
        object: &MaterialObject,
    ) -> (MasterGrid, Vec<Isotope>, Material) {
        let grid = MasterGrid::from_grids(tables.iter().map(|t| t.energy.as_slice()));
        let isotopes: Vec<Isotope> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| Isotope::from_table(t, &grid, i, FreeGasThresholds::default()).unwrap())
            .collect();
        let index: BTreeMap<String, usize> =
            tables.iter().enumerate().map(|(i, t)| (t.name.clone(), i)).collect();
        let material = Material::new(object, &isotopes, &index, &grid, 0).unwrap();
        (grid, isotopes, material)
    }

    fn object(isotopes: &[(&str, f64)], fraction: &str, units: &str, density: f64) -> MaterialObject {
        MaterialObject {
            id: "fuel".into(),
            density,
            units: units.into(),
            fraction: fraction.into(),
            isotopes: isotopes.iter().map(|(n, f)| (n.to_string(), *f)).collect(),
        }
    }

    #[test]
    fn test_mean_free_path_inverts_macroscopic_total() {
        let tables = [scatterer("a", 10.0, 2.0), scatterer("b", 20.0, 4.0)];
        let object = object(&[("a", 1.0), ("b", 1.0)], "atom", "atom/b-cm", 0.5);
        let (grid, isotopes, material) = build(&tables, &object);

        // Sigma_t * lambda = 1 at every master-grid energy
        for &e in grid.energies() {
            let mut energy = Energy::new(e);
            let factor = grid.interpolate(&mut energy);
            let sigma: f64 = material
                .isotopes()
                .iter()
                .map(|m| m.density * isotopes[m.isotope].total_xs(&energy))
                .sum();
            let lambda = material.mean_free_path(&energy, factor);
            assert!((sigma * lambda - 1.0).abs() < 1e-12, "Sigma*lambda = {}", sigma * lambda);
        }
    }

    #[test]
    fn test_atom_and_weight_fractions_are_mutually_derived() {
        let tables = [scatterer("a", 1.0, 2.0), scatterer("b", 3.0, 4.0)];
        let atom_obj = object(&[("a", 0.5), ("b", 0.5)], "atom", "atom/b-cm", 1.0);
        let (_, _, by_atom) = build(&tables, &atom_obj);

        // Feed the derived mass fractions back in as a weight-typed
        // material: the atomic fractions must come back out
        let m0 = by_atom.isotopes()[0].mass_fraction;
        let m1 = by_atom.isotopes()[1].mass_fraction;
        let weight_obj = object(&[("a", m0), ("b", m1)], "weight", "atom/b-cm", 1.0);
        let (_, _, by_weight) = build(&tables, &weight_obj);

        for (x, y) in by_atom.isotopes().iter().zip(by_weight.isotopes()) {
            assert!((x.atomic_fraction - y.atomic_fraction).abs() < 1e-12);
            assert!((x.mass_fraction - y.mass_fraction).abs() < 1e-12);
        }
    }

    #[test]
    fn test_density_unit_conversion_roundtrip() {
        let tables = [scatterer("a", 10.0, 2.0)];
        let by_mass = object(&[("a", 1.0)], "atom", "g/cm3", 1.0);
        let (_, _, material) = build(&tables, &by_mass);
        let atom = material.atomic_density();

        let by_atom = object(&[("a", 1.0)], "atom", "atom/b-cm", atom);
        let (_, _, material2) = build(&tables, &by_atom);
        assert!((material2.mass_density() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_isotope_sampling_follows_partial_totals() {
        // Partial totals 1:3
        let tables = [scatterer("a", 10.0, 1.0), scatterer("b", 10.0, 3.0)];
        let object = object(&[("a", 1.0), ("b", 1.0)], "atom", "atom/b-cm", 1.0);
        let (grid, _, material) = build(&tables, &object);

        let mut energy = Energy::new(1e6);
        let factor = grid.interpolate(&mut energy);
        let mut rng = Prn::new(17);
        let m = 100_000;
        let mut first = 0usize;
        for _ in 0..m {
            if material.sample_isotope(&energy, factor, &mut rng) == 0 {
                first += 1;
            }
        }
        let fraction = first as f64 / m as f64;
        let tolerance = 5.0 * (0.25_f64 * 0.75 / m as f64).sqrt();
        assert!((fraction - 0.25).abs() < tolerance, "fraction {} expected 0.25", fraction);
    }

    #[test]
    fn test_missing_isotope_is_a_build_error() {
        let tables = [scatterer("a", 10.0, 2.0)];
        let object = object(&[("missing", 1.0)], "atom", "atom/b-cm", 1.0);
        let grid = MasterGrid::from_grids(tables.iter().map(|t| t.energy.as_slice()));
        let isotopes: Vec<Isotope> = tables
            .iter()
            .map(|t| Isotope::from_table(t, &grid, 0, FreeGasThresholds::default()).unwrap())
            .collect();
        let index: BTreeMap<String, usize> = [("a".to_string(), 0usize)].into_iter().collect();
        assert!(Material::new(&object, &isotopes, &index, &grid, 0).is_err());
    }

    #[test]
    fn test_empty_composition_is_a_build_error() {
        let tables = [scatterer("a", 10.0, 2.0)];
        let object = object(&[], "atom", "atom/b-cm", 1.0);
        let grid = MasterGrid::from_grids(tables.iter().map(|t| t.energy.as_slice()));
        let isotopes: Vec<Isotope> = tables
            .iter()
            .map(|t| Isotope::from_table(t, &grid, 0, FreeGasThresholds::default()).unwrap())
            .collect();
        let index: BTreeMap<String, usize> = [("a".to_string(), 0usize)].into_iter().collect();
        assert!(Material::new(&object, &isotopes, &index, &grid, 0).is_err());
    }
}
