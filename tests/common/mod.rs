// Shared fixtures: one-group-style tables with constant cross sections
// and the object records the end-to-end scenarios are assembled from.

use std::collections::BTreeMap;

use keff_mc::ace::{AngularData, CrossSection, EnergyLawData, NeutronTable, NuData, ReactionData};
use keff_mc::objects::{
    CellObject, DistributionObject, IsotopeObject, McObject, SamplerObject, SettingsObject,
    SourceObject, SurfaceObject,
};
use keff_mc::surface::Transformation;

pub fn fission_spectrum() -> EnergyLawData {
    EnergyLawData::Maxwellian {
        ein: vec![0.0, 2e7],
        temperature: vec![1.3e6, 1.3e6],
        restriction: 0.0,
    }
}

/// A table with constant cross sections: elastic + fission +
/// disappearance, fission carrying `nu` neutrons with a Maxwellian
/// spectrum.
pub fn constant_table(
    name: &str,
    sigma_elastic: f64,
    sigma_fission: f64,
    sigma_disappearance: f64,
    nu: f64,
) -> NeutronTable {
    let total = sigma_elastic + sigma_fission + sigma_disappearance;
    let reactions = if sigma_fission > 0.0 {
        vec![ReactionData {
            mt: 18,
            q: 0.0,
            ty: 19,
            xs: CrossSection::new(0, vec![sigma_fission, sigma_fission]),
            angular: None,
            energy: Some(fission_spectrum()),
        }]
    } else {
        vec![]
    };
    NeutronTable {
        name: name.into(),
        awr: 200.0,
        kt: 0.0253,
        energy: vec![1e-5, 2e7],
        total: vec![total, total],
        absorption: vec![sigma_disappearance, sigma_disappearance],
        elastic: vec![sigma_elastic, sigma_elastic],
        elastic_angular: AngularData::isotropic(),
        reactions,
        nu_total: None,
        nu_prompt: if sigma_fission > 0.0 {
            Some(NuData::Polynomial { coefficients: vec![nu] })
        } else {
            None
        },
        nu_delayed: None,
        delayed_groups: vec![],
    }
}

pub fn isotope(name: &str, table: NeutronTable) -> McObject {
    McObject::Isotope(IsotopeObject { name: name.into(), path: None, table })
}

pub fn material(id: &str, isotope_name: &str, atom_density: f64) -> McObject {
    McObject::Material(keff_mc::objects::MaterialObject {
        id: id.into(),
        density: atom_density,
        units: "atom/b-cm".into(),
        fraction: "atom".into(),
        isotopes: BTreeMap::from([(isotope_name.to_string(), 1.0)]),
    })
}

pub fn surface(id: u32, kind: &str, coeffs: Vec<f64>) -> McObject {
    McObject::Surface(SurfaceObject { id, kind: kind.into(), coeffs })
}

pub fn cell(id: u32, surfaces: Vec<i64>, material: Option<&str>, flag: &str) -> McObject {
    McObject::Cell(CellObject {
        id,
        universe: 0,
        surfaces,
        flag: flag.into(),
        material: material.map(|m| m.to_string()),
        fill: None,
        transformation: Transformation::identity(),
    })
}

pub fn point_isotropic_source(position: [f64; 3], energy: f64) -> Vec<McObject> {
    vec![
        McObject::Distribution(DistributionObject {
            id: "iso".into(),
            kind: "isotropic".into(),
            coeffs: vec![],
            distributions: vec![],
            weights: vec![],
        }),
        McObject::Sampler(SamplerObject {
            id: "center".into(),
            position,
            direction: [0.0, 0.0, 1.0],
            energy,
            distributions: vec!["iso".into()],
            cells: vec![],
        }),
        McObject::Source(SourceObject {
            samplers: vec!["center".into()],
            weights: vec![],
            strength: 1.0,
        }),
    ]
}

pub fn criticality_settings(
    seed: u64,
    particles: usize,
    inactive: usize,
    batches: usize,
    scheduler: &str,
) -> Vec<McObject> {
    vec![
        McObject::Settings(SettingsObject::new("seed", seed.to_string())),
        McObject::Settings(SettingsObject::new("multithread", scheduler)),
        McObject::Settings(SettingsObject::new("criticality.particles", particles.to_string())),
        McObject::Settings(SettingsObject::new("criticality.inactive", inactive.to_string())),
        McObject::Settings(SettingsObject::new("criticality.batches", batches.to_string())),
    ]
}
