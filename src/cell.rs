// Cells: simple intersections of surface half-spaces.
//
// A cell is an ordered list of (surface, sense) pairs interpreted as a
// conjunction: a point is inside iff its sense on every surface matches
// the stored one. The NEGATED flag inverts the whole predicate. Cells
// reference surfaces by arena index; universes and parents are arena
// indices too, so the fill hierarchy carries no owning cycles.

use crate::error::BuildError;
use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFlag {
    /// No special cell attributes
    None,
    /// Particles are killed when entering this cell
    Dead,
    /// The cell is everything but what is inside its bounds
    Negated,
    /// No material inside this cell
    Void,
}

impl CellFlag {
    pub fn parse(id: u32, s: &str) -> Result<Self, BuildError> {
        match s {
            "" | "none" => Ok(CellFlag::None),
            "dead" => Ok(CellFlag::Dead),
            "negated" => Ok(CellFlag::Negated),
            "void" => Ok(CellFlag::Void),
            other => Err(BuildError::cell(id, format!("unknown cell flag {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub user_id: u32,
    pub internal_id: usize,
    /// Flattened path through the fill hierarchy, `inner<outer<...`.
    pub path: String,
    /// Bounding expression: (surface arena index, sense) conjunction.
    pub surfaces: Vec<(usize, bool)>,
    pub flag: CellFlag,
    /// Material arena index; `None` for void cells.
    pub material: Option<usize>,
    /// Universe arena index filling this cell, if any.
    pub fill: Option<usize>,
    /// Universe arena index this cell belongs to.
    pub universe: usize,
}

impl Cell {
    /// Whether the point satisfies this cell's sense expression,
    /// optionally skipping one surface the caller knows it just crossed.
    pub fn contains(&self, surfaces: &[Surface], p: &[f64; 3], skip: Option<usize>) -> bool {
        let mut inside = true;
        for &(s, sense) in &self.surfaces {
            if skip == Some(s) {
                continue;
            }
            if surfaces[s].sense(p) != sense {
                inside = false;
                break;
            }
        }
        if self.flag == CellFlag::Negated {
            !inside
        } else {
            inside
        }
    }

    pub fn is_dead(&self) -> bool {
        self.flag == CellFlag::Dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceKind;

    fn sphere(internal_id: usize, radius: f64) -> Surface {
        Surface {
            user_id: internal_id as u32 + 1,
            internal_id,
            kind: SurfaceKind::Sphere { x0: 0.0, y0: 0.0, z0: 0.0, radius },
        }
    }

    fn cell(surfaces: Vec<(usize, bool)>, flag: CellFlag) -> Cell {
        Cell {
            user_id: 1,
            internal_id: 0,
            path: "1".into(),
            surfaces,
            flag,
            material: None,
            fill: None,
            universe: 0,
        }
    }

    #[test]
    fn test_conjunction_of_senses() {
        // Shell between two spheres: outside r=1, inside r=2
        let arena = vec![sphere(0, 1.0), sphere(1, 2.0)];
        let shell = cell(vec![(0, true), (1, false)], CellFlag::None);

        assert!(shell.contains(&arena, &[1.5, 0.0, 0.0], None));
        assert!(!shell.contains(&arena, &[0.5, 0.0, 0.0], None));
        assert!(!shell.contains(&arena, &[2.5, 0.0, 0.0], None));
    }

    #[test]
    fn test_negated_inverts_the_predicate() {
        let arena = vec![sphere(0, 1.0)];
        let inside = cell(vec![(0, false)], CellFlag::None);
        let negated = cell(vec![(0, false)], CellFlag::Negated);

        let p = [0.5, 0.0, 0.0];
        assert!(inside.contains(&arena, &p, None));
        assert!(!negated.contains(&arena, &p, None));

        let q = [1.5, 0.0, 0.0];
        assert!(!inside.contains(&arena, &q, None));
        assert!(negated.contains(&arena, &q, None));
    }

    #[test]
    fn test_skip_surface_ignores_its_sense() {
        let arena = vec![sphere(0, 1.0), sphere(1, 2.0)];
        let shell = cell(vec![(0, true), (1, false)], CellFlag::None);

        // A point just inside the inner sphere fails normally but passes
        // when the inner surface is skipped
        let p = [0.9, 0.0, 0.0];
        assert!(!shell.contains(&arena, &p, None));
        assert!(shell.contains(&arena, &p, Some(0)));
    }

    #[test]
    fn test_empty_expression_covers_all_space() {
        let arena: Vec<Surface> = vec![];
        let everywhere = cell(vec![], CellFlag::None);
        assert!(everywhere.contains(&arena, &[1e9, -1e9, 0.0], None));
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(CellFlag::parse(1, "").unwrap(), CellFlag::None);
        assert_eq!(CellFlag::parse(1, "dead").unwrap(), CellFlag::Dead);
        assert_eq!(CellFlag::parse(1, "void").unwrap(), CellFlag::Void);
        assert!(CellFlag::parse(1, "bogus").is_err());
    }
}
