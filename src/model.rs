// Model assembly and the run loop.
//
// The build pipeline consumes the typed record list in dependency order:
// settings, isotopes (which fix the master grid), materials, geometry,
// source. Every stage returns a Result; the first failure aborts the
// build with the offending id, and no partial engine ever reaches the
// driver.

use std::collections::BTreeMap;

use log::info;

use crate::energy_grid::MasterGrid;
use crate::error::{BuildError, RunError};
use crate::geometry::Geometry;
use crate::isotope::{FreeGasThresholds, Isotope};
use crate::material::Material;
use crate::objects::{
    CellObject, DistributionObject, IsotopeObject, MaterialObject, McObject, SamplerObject,
    SettingsObject, SourceObject, SurfaceObject,
};
use crate::settings::Settings;
use crate::simulation::KeffSimulation;
use crate::source::Source;
use crate::stats::KeffTally;

#[derive(Debug)]
pub struct Model {
    pub settings: Settings,
    pub grid: MasterGrid,
    pub isotopes: Vec<Isotope>,
    pub materials: Vec<Material>,
    pub geometry: Geometry,
    pub source: Source,
}

#[derive(Debug, Clone)]
pub struct RunResults {
    /// Per-cycle k, inactive cycles included.
    pub cycles: Vec<f64>,
    /// Mean of the active-cycle k values.
    pub active_mean: f64,
    /// Standard error of the active-cycle mean.
    pub std_error: f64,
}

#[derive(Default)]
struct Records {
    settings: Vec<SettingsObject>,
    surfaces: Vec<SurfaceObject>,
    cells: Vec<CellObject>,
    materials: Vec<MaterialObject>,
    isotopes: Vec<IsotopeObject>,
    distributions: Vec<DistributionObject>,
    samplers: Vec<SamplerObject>,
    sources: Vec<SourceObject>,
}

impl Model {
    pub fn build(objects: Vec<McObject>) -> Result<Self, BuildError> {
        let mut records = Records::default();
        for object in objects {
            match object {
                McObject::Settings(o) => records.settings.push(o),
                McObject::Surface(o) => records.surfaces.push(o),
                McObject::Cell(o) => records.cells.push(o),
                McObject::Material(o) => records.materials.push(o),
                McObject::Isotope(o) => records.isotopes.push(o),
                McObject::Distribution(o) => records.distributions.push(o),
                McObject::Sampler(o) => records.samplers.push(o),
                McObject::Source(o) => records.sources.push(o),
            }
        }

        let settings = Settings::from_objects(&records.settings)?;

        // The master grid is the union of every isotope's native grid; a
        // problem with no cross-section data (all void) gets a trivial
        // grid covering the source energies.
        let grid = if records.isotopes.is_empty() {
            MasterGrid::from_grids([[1e-11, 2e7].as_slice()])
        } else {
            MasterGrid::from_grids(records.isotopes.iter().map(|o| o.table.energy.as_slice()))
        };

        let freegas = FreeGasThresholds {
            energy: settings.energy_freegas_threshold,
            awr: settings.awr_freegas_threshold,
        };
        let mut isotopes = Vec::with_capacity(records.isotopes.len());
        let mut isotope_index = BTreeMap::new();
        for object in &records.isotopes {
            if isotope_index.contains_key(&object.name) {
                return Err(BuildError::cross_section(&object.name, "duplicated isotope"));
            }
            let internal_id = isotopes.len();
            isotopes.push(Isotope::from_table(&object.table, &grid, internal_id, freegas)?);
            isotope_index.insert(object.name.clone(), internal_id);
        }

        let mut materials = Vec::with_capacity(records.materials.len());
        let mut material_index = BTreeMap::new();
        for object in &records.materials {
            if material_index.contains_key(&object.id) {
                return Err(BuildError::material(&object.id, "duplicated id"));
            }
            let internal_id = materials.len();
            materials.push(Material::new(object, &isotopes, &isotope_index, &grid, internal_id)?);
            material_index.insert(object.id.clone(), internal_id);
        }

        let geometry = Geometry::build(&records.surfaces, &records.cells, &material_index)?;

        let source = Source::build(
            &records.distributions,
            &records.samplers,
            &records.sources,
            settings.max_source_samples,
        )?;

        info!(
            "model built: {} surfaces, {} cells, {} universes, {} materials, {} isotopes, master grid of {} points",
            geometry.surfaces.len(),
            geometry.cells.len(),
            geometry.universes.len(),
            materials.len(),
            isotopes.len(),
            grid.len()
        );
        log::debug!("flattened geometry:\n{}", geometry);
        for material in &materials {
            log::debug!("{}", material);
        }

        Ok(Model { settings, grid, isotopes, materials, geometry, source })
    }

    /// Run the inactive + active power iteration and report the per-cycle
    /// k values and the active statistics.
    pub fn run(&self) -> Result<RunResults, RunError> {
        let settings = &self.settings;
        info!(
            "launching simulation: seed {}, {} particles, {} inactive + {} active cycles",
            settings.seed,
            settings.particles,
            settings.inactive,
            settings.active()
        );

        let mut simulation = KeffSimulation::new(self)?;
        let mut cycles = Vec::with_capacity(settings.batches);
        let mut tally = KeffTally::new();

        for cycle in 0..settings.inactive {
            let keff = simulation.cycle(cycle)?;
            println!(
                " **** Cycle (Inactive) {:4} / {:<4} keff = {:.6}",
                cycle + 1,
                settings.inactive,
                keff
            );
            cycles.push(keff);
        }
        for cycle in 0..settings.active() {
            let keff = simulation.cycle(settings.inactive + cycle)?;
            println!(
                " **** Cycle (Active)   {:4} / {:<4} keff = {:.6}",
                cycle + 1,
                settings.active(),
                keff
            );
            cycles.push(keff);
            tally.add(keff);
        }

        Ok(RunResults { cycles, active_mean: tally.mean(), std_error: tally.std_error() })
    }
}
