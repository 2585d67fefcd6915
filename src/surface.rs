// Oriented surfaces for the constructive-solid geometry.
//
// The kinds form a closed set (axis-normal planes, general plane, sphere,
// axis-aligned cylinders, general quadric), so they are a tagged enum
// dispatched by match. The sense of a point is the sign of the surface
// function; intersections only ever return non-negative distances. A
// surface can be cloned through a transformation analytically: pure
// translations stay in kind, rotations promote planes to general planes
// and everything curved to a general quadric.

use std::fmt;

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::data::TINY_DISTANCE;
use crate::error::BuildError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SurfaceKind {
    /// x = x0
    PlaneX { x0: f64 },
    /// y = y0
    PlaneY { y0: f64 },
    /// z = z0
    PlaneZ { z0: f64 },
    /// a x + b y + c z - d = 0
    Plane { a: f64, b: f64, c: f64, d: f64 },
    Sphere { x0: f64, y0: f64, z0: f64, radius: f64 },
    /// Infinite cylinder along x through (y0, z0)
    CylinderX { y0: f64, z0: f64, radius: f64 },
    CylinderY { x0: f64, z0: f64, radius: f64 },
    CylinderZ { x0: f64, y0: f64, radius: f64 },
    /// a x^2 + b y^2 + c z^2 + d xy + e yz + f zx + g x + h y + i z + j = 0
    Quadric { a: f64, b: f64, c: f64, d: f64, e: f64, f: f64, g: f64, h: f64, i: f64, j: f64 },
}

/// Translation plus rotation angles (degrees) about the three axes.
/// Composition is the commutative vector sum of both parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub translation: [f64; 3],
    pub rotation: [f64; 3],
}

impl Default for Transformation {
    fn default() -> Self {
        Self { translation: [0.0; 3], rotation: [0.0; 3] }
    }
}

impl Transformation {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.translation == [0.0; 3] && self.rotation == [0.0; 3]
    }

    pub fn has_rotation(&self) -> bool {
        self.rotation != [0.0; 3]
    }

    /// Sum of translations and of rotation angles.
    pub fn compose(&self, other: &Transformation) -> Transformation {
        Transformation {
            translation: [
                self.translation[0] + other.translation[0],
                self.translation[1] + other.translation[1],
                self.translation[2] + other.translation[2],
            ],
            rotation: [
                self.rotation[0] + other.rotation[0],
                self.rotation[1] + other.rotation[1],
                self.rotation[2] + other.rotation[2],
            ],
        }
    }

    fn matrix(&self) -> Rotation3<f64> {
        let [rx, ry, rz] = self.rotation;
        Rotation3::from_euler_angles(rx.to_radians(), ry.to_radians(), rz.to_radians())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub user_id: u32,
    pub internal_id: usize,
    pub kind: SurfaceKind,
}

impl Surface {
    /// Create a surface from its type string and coefficient list.
    pub fn from_coefficients(user_id: u32, kind: &str, coeffs: &[f64]) -> Result<SurfaceKind, BuildError> {
        let expect = |n: usize| {
            if coeffs.len() == n {
                Ok(())
            } else {
                Err(BuildError::surface(
                    user_id,
                    format!("bad number of coefficients for {} ({} given, {} expected)", kind, coeffs.len(), n),
                ))
            }
        };
        match kind {
            "px" => {
                expect(1)?;
                Ok(SurfaceKind::PlaneX { x0: coeffs[0] })
            }
            "py" => {
                expect(1)?;
                Ok(SurfaceKind::PlaneY { y0: coeffs[0] })
            }
            "pz" => {
                expect(1)?;
                Ok(SurfaceKind::PlaneZ { z0: coeffs[0] })
            }
            "plane" => {
                expect(4)?;
                Ok(SurfaceKind::Plane { a: coeffs[0], b: coeffs[1], c: coeffs[2], d: coeffs[3] })
            }
            "sphere" => {
                expect(4)?;
                Ok(SurfaceKind::Sphere {
                    x0: coeffs[0],
                    y0: coeffs[1],
                    z0: coeffs[2],
                    radius: coeffs[3],
                })
            }
            "cx" => {
                expect(3)?;
                Ok(SurfaceKind::CylinderX { y0: coeffs[0], z0: coeffs[1], radius: coeffs[2] })
            }
            "cy" => {
                expect(3)?;
                Ok(SurfaceKind::CylinderY { x0: coeffs[0], z0: coeffs[1], radius: coeffs[2] })
            }
            "cz" => {
                expect(3)?;
                Ok(SurfaceKind::CylinderZ { x0: coeffs[0], y0: coeffs[1], radius: coeffs[2] })
            }
            "quadric" => {
                expect(10)?;
                Ok(SurfaceKind::Quadric {
                    a: coeffs[0],
                    b: coeffs[1],
                    c: coeffs[2],
                    d: coeffs[3],
                    e: coeffs[4],
                    f: coeffs[5],
                    g: coeffs[6],
                    h: coeffs[7],
                    i: coeffs[8],
                    j: coeffs[9],
                })
            }
            other => Err(BuildError::surface(user_id, format!("surface type {} is not defined", other))),
        }
    }

    /// Signed surface function at a point.
    pub fn evaluate(&self, p: &[f64; 3]) -> f64 {
        match &self.kind {
            SurfaceKind::PlaneX { x0 } => p[0] - x0,
            SurfaceKind::PlaneY { y0 } => p[1] - y0,
            SurfaceKind::PlaneZ { z0 } => p[2] - z0,
            SurfaceKind::Plane { a, b, c, d } => a * p[0] + b * p[1] + c * p[2] - d,
            SurfaceKind::Sphere { x0, y0, z0, radius } => {
                let dx = p[0] - x0;
                let dy = p[1] - y0;
                let dz = p[2] - z0;
                dx * dx + dy * dy + dz * dz - radius * radius
            }
            SurfaceKind::CylinderX { y0, z0, radius } => {
                let dy = p[1] - y0;
                let dz = p[2] - z0;
                dy * dy + dz * dz - radius * radius
            }
            SurfaceKind::CylinderY { x0, z0, radius } => {
                let dx = p[0] - x0;
                let dz = p[2] - z0;
                dx * dx + dz * dz - radius * radius
            }
            SurfaceKind::CylinderZ { x0, y0, radius } => {
                let dx = p[0] - x0;
                let dy = p[1] - y0;
                dx * dx + dy * dy - radius * radius
            }
            SurfaceKind::Quadric { a, b, c, d, e, f, g, h, i, j } => {
                let [x, y, z] = *p;
                a * x * x + b * y * y + c * z * z + d * x * y + e * y * z + f * z * x
                    + g * x + h * y + i * z + j
            }
        }
    }

    /// Side of the surface the point lies on: positive sense is
    /// `evaluate > 0`.
    pub fn sense(&self, p: &[f64; 3]) -> bool {
        self.evaluate(p) > 0.0
    }

    /// Distance along `dir` to the surface, given the side the ray starts
    /// on. `None` if the ray never reaches the surface. Distances are
    /// never negative.
    pub fn intersect(&self, p: &[f64; 3], dir: &[f64; 3], sense: bool) -> Option<f64> {
        match &self.kind {
            SurfaceKind::PlaneX { x0 } => plane_distance(p[0], dir[0], *x0, sense),
            SurfaceKind::PlaneY { y0 } => plane_distance(p[1], dir[1], *y0, sense),
            SurfaceKind::PlaneZ { z0 } => plane_distance(p[2], dir[2], *z0, sense),
            SurfaceKind::Plane { a, b, c, .. } => {
                let denom = a * dir[0] + b * dir[1] + c * dir[2];
                let value = self.evaluate(p);
                // Headed towards the surface only
                if (sense && denom >= -TINY_DISTANCE) || (!sense && denom <= TINY_DISTANCE) {
                    return None;
                }
                Some((-value / denom).max(0.0))
            }
            SurfaceKind::Sphere { x0, y0, z0, radius } => {
                let oc = [p[0] - x0, p[1] - y0, p[2] - z0];
                let qa = dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2];
                let qb = 2.0 * (oc[0] * dir[0] + oc[1] * dir[1] + oc[2] * dir[2]);
                let qc = oc[0] * oc[0] + oc[1] * oc[1] + oc[2] * oc[2] - radius * radius;
                smallest_positive_root(qa, qb, qc)
            }
            SurfaceKind::CylinderX { y0, z0, radius } => {
                let o = [p[1] - y0, p[2] - z0];
                let d = [dir[1], dir[2]];
                cylinder_root(o, d, *radius)
            }
            SurfaceKind::CylinderY { x0, z0, radius } => {
                let o = [p[0] - x0, p[2] - z0];
                let d = [dir[0], dir[2]];
                cylinder_root(o, d, *radius)
            }
            SurfaceKind::CylinderZ { x0, y0, radius } => {
                let o = [p[0] - x0, p[1] - y0];
                let d = [dir[0], dir[1]];
                cylinder_root(o, d, *radius)
            }
            SurfaceKind::Quadric { .. } => {
                let (mat, bv, scalar) = self.kind.quadric_parts();
                let pos = Vector3::from_row_slice(p);
                let u = Vector3::from_row_slice(dir);
                let qa = (u.transpose() * mat * u)[0];
                let qb = 2.0 * (pos.transpose() * mat * u)[0] + bv.dot(&u);
                let qc = (pos.transpose() * mat * pos)[0] + bv.dot(&pos) + scalar;
                smallest_positive_root(qa, qb, qc)
            }
        }
    }

    /// Clone this surface through a transformation.
    pub fn transform(&self, tr: &Transformation) -> SurfaceKind {
        self.kind.transformed(tr)
    }
}

impl SurfaceKind {
    /// Clone this surface through a transformation. Pure translations
    /// keep the kind; rotations promote planes to general planes and
    /// curved kinds to a general quadric.
    pub fn transformed(&self, tr: &Transformation) -> SurfaceKind {
        let t = Vector3::from_row_slice(&tr.translation);
        if !tr.has_rotation() {
            return match *self {
                SurfaceKind::PlaneX { x0 } => SurfaceKind::PlaneX { x0: x0 + t.x },
                SurfaceKind::PlaneY { y0 } => SurfaceKind::PlaneY { y0: y0 + t.y },
                SurfaceKind::PlaneZ { z0 } => SurfaceKind::PlaneZ { z0: z0 + t.z },
                SurfaceKind::Plane { a, b, c, d } => SurfaceKind::Plane {
                    a,
                    b,
                    c,
                    d: d + a * t.x + b * t.y + c * t.z,
                },
                SurfaceKind::Sphere { x0, y0, z0, radius } => SurfaceKind::Sphere {
                    x0: x0 + t.x,
                    y0: y0 + t.y,
                    z0: z0 + t.z,
                    radius,
                },
                SurfaceKind::CylinderX { y0, z0, radius } => {
                    SurfaceKind::CylinderX { y0: y0 + t.y, z0: z0 + t.z, radius }
                }
                SurfaceKind::CylinderY { x0, z0, radius } => {
                    SurfaceKind::CylinderY { x0: x0 + t.x, z0: z0 + t.z, radius }
                }
                SurfaceKind::CylinderZ { x0, y0, radius } => {
                    SurfaceKind::CylinderZ { x0: x0 + t.x, y0: y0 + t.y, radius }
                }
                SurfaceKind::Quadric { .. } => self.transform_quadric(Rotation3::identity(), t),
            };
        }

        let rot = tr.matrix();
        match *self {
            SurfaceKind::PlaneX { x0 } => rotated_plane(rot * Vector3::x(), x0, t),
            SurfaceKind::PlaneY { y0 } => rotated_plane(rot * Vector3::y(), y0, t),
            SurfaceKind::PlaneZ { z0 } => rotated_plane(rot * Vector3::z(), z0, t),
            SurfaceKind::Plane { a, b, c, d } => rotated_plane(rot * Vector3::new(a, b, c), d, t),
            SurfaceKind::Sphere { x0, y0, z0, radius } => {
                let center = rot * Vector3::new(x0, y0, z0) + t;
                SurfaceKind::Sphere { x0: center.x, y0: center.y, z0: center.z, radius }
            }
            _ => self.transform_quadric(rot, t),
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface {} (internal = {}) : {}", self.user_id, self.internal_id, self.kind)
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceKind::PlaneX { x0 } => write!(out, "px x0 = {}", x0),
            SurfaceKind::PlaneY { y0 } => write!(out, "py y0 = {}", y0),
            SurfaceKind::PlaneZ { z0 } => write!(out, "pz z0 = {}", z0),
            SurfaceKind::Plane { a, b, c, d } => {
                write!(out, "plane n = ({}, {}, {}) d = {}", a, b, c, d)
            }
            SurfaceKind::Sphere { x0, y0, z0, radius } => {
                write!(out, "sphere c = ({}, {}, {}) r = {}", x0, y0, z0, radius)
            }
            SurfaceKind::CylinderX { y0, z0, radius } => {
                write!(out, "cx c = ({}, {}) r = {}", y0, z0, radius)
            }
            SurfaceKind::CylinderY { x0, z0, radius } => {
                write!(out, "cy c = ({}, {}) r = {}", x0, z0, radius)
            }
            SurfaceKind::CylinderZ { x0, y0, radius } => {
                write!(out, "cz c = ({}, {}) r = {}", x0, y0, radius)
            }
            SurfaceKind::Quadric { a, b, c, d, e, f, g, h, i, j } => write!(
                out,
                "quadric ({}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
                a, b, c, d, e, f, g, h, i, j
            ),
        }
    }
}

fn plane_distance(coordinate: f64, direction: f64, plane: f64, sense: bool) -> Option<f64> {
    // Headed towards the surface when moving against the side we are on
    if (!sense && direction > 0.0) || (sense && direction < 0.0) {
        Some(((plane - coordinate) / direction).max(0.0))
    } else {
        None
    }
}

fn cylinder_root(o: [f64; 2], d: [f64; 2], radius: f64) -> Option<f64> {
    let qa = d[0] * d[0] + d[1] * d[1];
    let qb = 2.0 * (o[0] * d[0] + o[1] * d[1]);
    let qc = o[0] * o[0] + o[1] * o[1] - radius * radius;
    smallest_positive_root(qa, qb, qc)
}

fn smallest_positive_root(qa: f64, qb: f64, qc: f64) -> Option<f64> {
    if qa.abs() < TINY_DISTANCE {
        // Degenerate linear case
        if qb.abs() < TINY_DISTANCE {
            return None;
        }
        let t = -qc / qb;
        return if t > TINY_DISTANCE { Some(t) } else { None };
    }
    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t1 = (-qb - sqrt_disc) / (2.0 * qa);
    let t2 = (-qb + sqrt_disc) / (2.0 * qa);
    if t1 > TINY_DISTANCE {
        Some(t1)
    } else if t2 > TINY_DISTANCE {
        Some(t2)
    } else {
        None
    }
}

fn rotated_plane(normal: Vector3<f64>, d: f64, t: Vector3<f64>) -> SurfaceKind {
    SurfaceKind::Plane {
        a: normal.x,
        b: normal.y,
        c: normal.z,
        d: d + normal.dot(&t),
    }
}

impl SurfaceKind {
    /// Matrix form (A, b, c) with f(p) = p'Ap + b.p + c.
    fn quadric_parts(&self) -> (Matrix3<f64>, Vector3<f64>, f64) {
        let coeffs = self.quadric_coefficients();
        let [a, b, c, d, e, f, g, h, i, j] = coeffs;
        let mat = Matrix3::new(a, d / 2.0, f / 2.0, d / 2.0, b, e / 2.0, f / 2.0, e / 2.0, c);
        (mat, Vector3::new(g, h, i), j)
    }

    fn quadric_coefficients(&self) -> [f64; 10] {
        match *self {
            SurfaceKind::Quadric { a, b, c, d, e, f, g, h, i, j } => [a, b, c, d, e, f, g, h, i, j],
            SurfaceKind::CylinderX { y0, z0, radius } => {
                [0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, -2.0 * y0, -2.0 * z0, y0 * y0 + z0 * z0 - radius * radius]
            }
            SurfaceKind::CylinderY { x0, z0, radius } => {
                [1.0, 0.0, 1.0, 0.0, 0.0, 0.0, -2.0 * x0, 0.0, -2.0 * z0, x0 * x0 + z0 * z0 - radius * radius]
            }
            SurfaceKind::CylinderZ { x0, y0, radius } => {
                [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, -2.0 * x0, -2.0 * y0, 0.0, x0 * x0 + y0 * y0 - radius * radius]
            }
            SurfaceKind::Sphere { x0, y0, z0, radius } => [
                1.0,
                1.0,
                1.0,
                0.0,
                0.0,
                0.0,
                -2.0 * x0,
                -2.0 * y0,
                -2.0 * z0,
                x0 * x0 + y0 * y0 + z0 * z0 - radius * radius,
            ],
            _ => panic!("surface kind has no quadric form"),
        }
    }

    /// Transform in quadric space: with p_new = R p + t, the image surface
    /// is f(R^T (p - t)).
    fn transform_quadric(&self, rot: Rotation3<f64>, t: Vector3<f64>) -> SurfaceKind {
        let (mat, bv, scalar) = self.quadric_parts();
        let r = rot.matrix();
        let mat2 = r * mat * r.transpose();
        let rb = r * bv;
        let b2 = rb - 2.0 * mat2 * t;
        let c2 = (t.transpose() * mat2 * t)[0] - rb.dot(&t) + scalar;
        SurfaceKind::Quadric {
            a: mat2[(0, 0)],
            b: mat2[(1, 1)],
            c: mat2[(2, 2)],
            d: 2.0 * mat2[(0, 1)],
            e: 2.0 * mat2[(1, 2)],
            f: 2.0 * mat2[(0, 2)],
            g: b2.x,
            h: b2.y,
            i: b2.z,
            j: c2,
        }
    }
}
