// Typed input records: the object boundary between whatever parses the
// problem description and the engine builders. The records deserialize
// from JSON with serde; the parser layer that produces them is not part
// of the kernel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ace::NeutronTable;
use crate::surface::Transformation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceObject {
    pub id: u32,
    pub kind: String,
    pub coeffs: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellObject {
    pub id: u32,
    /// Universe this cell belongs to; 0 is the base universe.
    #[serde(default)]
    pub universe: u32,
    /// Signed surface references: the sign carries the sense.
    #[serde(default)]
    pub surfaces: Vec<i64>,
    /// "", "dead", "negated" or "void".
    #[serde(default)]
    pub flag: String,
    #[serde(default)]
    pub material: Option<String>,
    /// Universe id filling this cell.
    #[serde(default)]
    pub fill: Option<u32>,
    /// Applied to the filling universe's surfaces.
    #[serde(default)]
    pub transformation: Transformation,
}

/// Isotope fractions use a sorted map so that build order (and with it
/// the sampled random stream) is independent of input hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialObject {
    pub id: String,
    pub density: f64,
    /// "g/cm3" or "atom/b-cm".
    pub units: String,
    /// "atom" or "weight".
    #[serde(default = "default_fraction")]
    pub fraction: String,
    pub isotopes: BTreeMap<String, f64>,
}

fn default_fraction() -> String {
    "atom".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsotopeObject {
    pub name: String,
    /// Where the table came from; informational only, the reader that
    /// parses ACE files runs outside the kernel.
    #[serde(default)]
    pub path: Option<String>,
    pub table: NeutronTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionObject {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub coeffs: Vec<f64>,
    /// For custom mixtures: ids of the member distributions.
    #[serde(default)]
    pub distributions: Vec<String>,
    #[serde(default)]
    pub weights: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerObject {
    pub id: String,
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default = "default_direction")]
    pub direction: [f64; 3],
    #[serde(default = "default_energy")]
    pub energy: f64,
    #[serde(default)]
    pub distributions: Vec<String>,
    /// When non-empty the sampler rejects positions outside these cells.
    #[serde(default)]
    pub cells: Vec<u32>,
}

fn default_direction() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

fn default_energy() -> f64 {
    1e6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceObject {
    pub samplers: Vec<String>,
    #[serde(default)]
    pub weights: Vec<f64>,
    #[serde(default = "default_strength")]
    pub strength: f64,
}

fn default_strength() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsObject {
    pub key: String,
    pub value: String,
}

impl SettingsObject {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// The ordered, typed record list the kernel ingests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McObject {
    Surface(SurfaceObject),
    Cell(CellObject),
    Material(MaterialObject),
    Isotope(IsotopeObject),
    Distribution(DistributionObject),
    Sampler(SamplerObject),
    Source(SourceObject),
    Settings(SettingsObject),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_object_defaults() {
        let json = r#"{"type": "cell", "id": 4, "surfaces": [-1, 2]}"#;
        let object: McObject = serde_json::from_str(json).unwrap();
        match object {
            McObject::Cell(cell) => {
                assert_eq!(cell.id, 4);
                assert_eq!(cell.universe, 0);
                assert_eq!(cell.surfaces, vec![-1, 2]);
                assert!(cell.material.is_none());
                assert!(cell.transformation.is_identity());
            }
            other => panic!("expected a cell object, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_and_surface_records() {
        let json = r#"[
            {"type": "settings", "key": "seed", "value": "10"},
            {"type": "surface", "id": 1, "kind": "sphere", "coeffs": [0, 0, 0, 5.0]}
        ]"#;
        let objects: Vec<McObject> = serde_json::from_str(json).unwrap();
        assert_eq!(objects.len(), 2);
        assert!(matches!(&objects[0], McObject::Settings(s) if s.key == "seed"));
        assert!(matches!(&objects[1], McObject::Surface(s) if s.coeffs.len() == 4));
    }
}
