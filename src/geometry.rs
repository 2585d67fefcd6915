// Geometry: arena-owned surfaces, cells and universes, flattened at
// build time.
//
// User cells filled with a universe are instantiated recursively: the
// inner cells are cloned with their surfaces pushed through the summed
// transformation, get fresh internal ids and a path of the form
// `inner<outer<...`, and surfaces whose transformed coefficients match
// an existing clone exactly are deduplicated. Transport only ever walks
// this concrete flat graph; the logical universe tree is gone after the
// build.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::cell::{Cell, CellFlag};
use crate::data::SURFACE_NUDGE;
use crate::error::BuildError;
use crate::objects::{CellObject, SurfaceObject};
use crate::surface::{Surface, SurfaceKind, Transformation};

#[derive(Debug, Clone)]
pub struct Universe {
    pub user_id: u32,
    pub internal_id: usize,
    pub cells: Vec<usize>,
    /// Cell this universe instance fills; `None` only for the base
    /// universe.
    pub parent: Option<usize>,
}

#[derive(Debug)]
pub struct Geometry {
    pub surfaces: Vec<Surface>,
    pub cells: Vec<Cell>,
    pub universes: Vec<Universe>,
    root: usize,
}

/// The id of the base universe.
pub const BASE_UNIVERSE: u32 = 0;

struct Builder<'a> {
    prototypes: HashMap<u32, SurfaceKind>,
    groups: BTreeMap<u32, Vec<&'a CellObject>>,
    materials: &'a BTreeMap<String, usize>,
    surfaces: Vec<Surface>,
    cells: Vec<Cell>,
    universes: Vec<Universe>,
}

impl<'a> Builder<'a> {
    fn surface_index(&mut self, user_id: u32, kind: SurfaceKind) -> usize {
        // Exact coefficient match after transformation dedups clones
        if let Some(existing) =
            self.surfaces.iter().find(|s| s.user_id == user_id && s.kind == kind)
        {
            return existing.internal_id;
        }
        let internal_id = self.surfaces.len();
        self.surfaces.push(Surface { user_id, internal_id, kind });
        internal_id
    }

    fn instantiate(
        &mut self,
        universe_id: u32,
        parent: Option<usize>,
        parent_path: Option<&str>,
        transform: Transformation,
        chain: &mut Vec<u32>,
    ) -> Result<usize, BuildError> {
        if chain.contains(&universe_id) {
            return Err(BuildError::Geometry(format!(
                "universe {} fills itself through its own cells",
                universe_id
            )));
        }
        chain.push(universe_id);

        let definitions = self.groups.get(&universe_id).cloned().ok_or_else(|| {
            BuildError::Geometry(format!("universe {} has no cells", universe_id))
        })?;

        let universe_index = self.universes.len();
        self.universes.push(Universe {
            user_id: universe_id,
            internal_id: universe_index,
            cells: Vec::new(),
            parent,
        });

        for definition in definitions {
            let mut senses = Vec::with_capacity(definition.surfaces.len());
            for &signed in &definition.surfaces {
                let user_surface = signed.unsigned_abs() as u32;
                let sense = signed > 0;
                let prototype = self.prototypes.get(&user_surface).ok_or_else(|| {
                    BuildError::cell(
                        definition.id,
                        format!("surface number {} doesn't exist", user_surface),
                    )
                })?;
                let kind = prototype.transformed(&transform);
                let index = self.surface_index(user_surface, kind);
                senses.push((index, sense));
            }

            let flag = CellFlag::parse(definition.id, &definition.flag)?;
            let material = match (&definition.material, flag) {
                (_, CellFlag::Void) | (None, _) => None,
                (Some(name), _) => Some(*self.materials.get(name).ok_or_else(|| {
                    BuildError::cell(definition.id, format!("material {} does not exist", name))
                })?),
            };

            let path = match parent_path {
                Some(outer) => format!("{}<{}", definition.id, outer),
                None => definition.id.to_string(),
            };

            let internal_id = self.cells.len();
            self.cells.push(Cell {
                user_id: definition.id,
                internal_id,
                path: path.clone(),
                surfaces: senses,
                flag,
                material,
                fill: None,
                universe: universe_index,
            });
            self.universes[universe_index].cells.push(internal_id);

            if let Some(fill_id) = definition.fill {
                let inner = self.instantiate(
                    fill_id,
                    Some(internal_id),
                    Some(&path),
                    transform.compose(&definition.transformation),
                    chain,
                )?;
                self.cells[internal_id].fill = Some(inner);
            }
        }

        chain.pop();
        Ok(universe_index)
    }
}

impl Geometry {
    pub fn build(
        surface_objects: &[SurfaceObject],
        cell_objects: &[CellObject],
        materials: &BTreeMap<String, usize>,
    ) -> Result<Self, BuildError> {
        let mut prototypes = HashMap::new();
        for object in surface_objects {
            if prototypes.contains_key(&object.id) {
                return Err(BuildError::surface(object.id, "duplicated id"));
            }
            let kind = Surface::from_coefficients(object.id, &object.kind, &object.coeffs)?;
            prototypes.insert(object.id, kind);
        }

        let mut seen = HashMap::new();
        let mut groups: BTreeMap<u32, Vec<&CellObject>> = BTreeMap::new();
        for object in cell_objects {
            if seen.insert(object.id, ()).is_some() {
                return Err(BuildError::cell(object.id, "duplicated id"));
            }
            groups.entry(object.universe).or_default().push(object);
        }
        if !groups.contains_key(&BASE_UNIVERSE) {
            return Err(BuildError::Geometry(format!(
                "base universe {} has no cells",
                BASE_UNIVERSE
            )));
        }

        let mut builder =
            Builder { prototypes, groups, materials, surfaces: Vec::new(), cells: Vec::new(), universes: Vec::new() };
        let mut chain = Vec::new();
        let root =
            builder.instantiate(BASE_UNIVERSE, None, None, Transformation::identity(), &mut chain)?;

        Ok(Geometry {
            surfaces: builder.surfaces,
            cells: builder.cells,
            universes: builder.universes,
            root,
        })
    }

    /// Locate the deepest concrete cell containing a point, starting from
    /// the base universe. `None` means the point is outside the geometry.
    pub fn find_cell(&self, p: &[f64; 3]) -> Option<usize> {
        self.find_cell_skip(p, None)
    }

    /// Point location that ignores one surface's sense test, for callers
    /// that know the point sits on a just-crossed surface.
    pub fn find_cell_skip(&self, p: &[f64; 3], skip: Option<usize>) -> Option<usize> {
        self.find_in_universe(self.root, p, skip)
    }

    fn find_in_universe(&self, universe: usize, p: &[f64; 3], skip: Option<usize>) -> Option<usize> {
        for &c in &self.universes[universe].cells {
            let cell = &self.cells[c];
            if cell.contains(&self.surfaces, p, skip) {
                return match cell.fill {
                    Some(inner) => self.find_in_universe(inner, p, skip),
                    None => Some(c),
                };
            }
        }
        None
    }

    /// Nearest bounding surface from a point along a direction. Ancestor
    /// (fill-parent) cells are consulted first so that crossings from an
    /// inner fill back into outer cells are found. Returns the surface
    /// arena index, the sense stored on the bounding cell, and the
    /// distance.
    pub fn intersect(
        &self,
        cell: usize,
        p: &[f64; 3],
        direction: &[f64; 3],
    ) -> Option<(usize, bool, f64)> {
        let mut best = match self.universes[self.cells[cell].universe].parent {
            Some(parent_cell) => self.intersect(parent_cell, p, direction),
            None => None,
        };
        for &(s, sense) in &self.cells[cell].surfaces {
            if let Some(distance) = self.surfaces[s].intersect(p, direction, sense) {
                if best.map_or(true, |(_, _, d)| distance < d) {
                    best = Some((s, sense, distance));
                }
            }
        }
        best
    }

    /// Relocate after a crossing: the caller has already advanced the
    /// particle past the surface by the crossing nudge; this looks the
    /// new cell up from there. `None` means the particle left the
    /// geometry.
    pub fn cross(&self, p: &[f64; 3]) -> Option<usize> {
        self.find_cell(p)
    }

    /// The nudge used when stepping across a surface.
    pub fn nudge() -> f64 {
        SURFACE_NUDGE
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            write!(
                f,
                "cell = {} (internal = {}) ; path = {} ; universe = {}",
                cell.user_id,
                cell.internal_id,
                cell.path,
                self.universes[cell.universe].user_id
            )?;
            if let Some(fill) = cell.fill {
                write!(f, " ; fill = {}", self.universes[fill].user_id)?;
            }
            if let Some(material) = cell.material {
                write!(f, " ; material = {}", material)?;
            }
            writeln!(f, " ; flags = {:?}", cell.flag)?;
            for &(s, sense) in &cell.surfaces {
                writeln!(f, "  ({}) {}", if sense { '+' } else { '-' }, self.surfaces[s])?;
            }
        }
        Ok(())
    }
}
