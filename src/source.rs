// Particle source: a weighted mixture of samplers, each perturbing a
// reference phase-space point through an ordered list of distributions.
//
// Distribution constructors live in a registry owned by the build phase
// (transport never touches it); custom mixtures compose already-built
// distributions by id, so records are resolved in input order.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt::Debug;
use std::sync::Arc;

use once_cell::sync::Lazy;
use rand::{Rng, RngCore};

use crate::error::{BuildError, SamplingError};
use crate::geometry::Geometry;
use crate::objects::{DistributionObject, SamplerObject, SourceObject};
use crate::particle::{CellParticle, Particle};
use crate::reaction::rotate_angle;
use crate::sampler::TableSampler;

pub trait Distribution: Debug + Send + Sync {
    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore);
}

const X: usize = 0;
const Y: usize = 1;
const Z: usize = 2;

/// Transverse axes of a cylinder along `axis`, in the order the original
/// coefficients are given.
fn transverse(axis: usize) -> (usize, usize) {
    match axis {
        X => (Y, Z),
        Y => (Z, X),
        _ => (X, Y),
    }
}

/// Uniform position along one axis.
#[derive(Debug)]
struct Box1D {
    axis: usize,
    low: f64,
    high: f64,
}

impl Distribution for Box1D {
    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        particle.position[self.axis] = self.low + rng.gen::<f64>() * (self.high - self.low);
    }
}

/// Uniform position in an axis-aligned box.
#[derive(Debug)]
struct Box3D {
    low: [f64; 3],
    high: [f64; 3],
}

impl Distribution for Box3D {
    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        for axis in 0..3 {
            particle.position[axis] =
                self.low[axis] + rng.gen::<f64>() * (self.high[axis] - self.low[axis]);
        }
    }
}

/// Uniform position on an annulus perpendicular to an axis; the axial
/// coordinate is left alone.
#[derive(Debug)]
struct Cyl2D {
    axis: usize,
    center: [f64; 2],
    rmin: f64,
    rmax: f64,
}

impl Distribution for Cyl2D {
    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let r2 = self.rmin * self.rmin
            + rng.gen::<f64>() * (self.rmax * self.rmax - self.rmin * self.rmin);
        let r = r2.sqrt();
        let theta = 2.0 * PI * rng.gen::<f64>();
        let (u, v) = transverse(self.axis);
        particle.position[u] = self.center[0] + r * theta.cos();
        particle.position[v] = self.center[1] + r * theta.sin();
    }
}

/// Isotropic flight direction.
#[derive(Debug)]
struct IsotropicDirection;

impl Distribution for IsotropicDirection {
    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        particle.direction = crate::reaction::isotropic_direction(rng);
    }
}

/// Direction uniform in the cone of half-angle cosine `mu_min` about a
/// reference axis.
#[derive(Debug)]
struct Cone {
    axis: nalgebra::Vector3<f64>,
    mu_min: f64,
}

impl Distribution for Cone {
    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let mu = self.mu_min + rng.gen::<f64>() * (1.0 - self.mu_min);
        let d = rotate_angle(self.axis, mu, rng);
        particle.direction = [d.x, d.y, d.z];
    }
}

/// Energy histogram: bins delimited by `edges`, bin weights from the
/// record, uniform within the sampled bin.
#[derive(Debug)]
struct EnergyHistogram {
    edges: Vec<f64>,
    bins: TableSampler<usize>,
}

impl Distribution for EnergyHistogram {
    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let bin = *self.bins.sample(0, rng.gen());
        particle.energy.value =
            self.edges[bin] + rng.gen::<f64>() * (self.edges[bin + 1] - self.edges[bin]);
    }
}

/// Weighted mixture of other distributions.
#[derive(Debug)]
struct Custom {
    members: TableSampler<Arc<dyn Distribution>>,
}

impl Distribution for Custom {
    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let member = self.members.sample(0, rng.gen()).clone();
        member.apply(particle, rng);
    }
}

type Built = HashMap<String, Arc<dyn Distribution>>;
type Constructor = fn(&DistributionObject, &Built) -> Result<Arc<dyn Distribution>, BuildError>;

fn expect_coeffs(object: &DistributionObject, n: usize) -> Result<(), BuildError> {
    if object.coeffs.len() == n {
        Ok(())
    } else {
        Err(BuildError::Source(format!(
            "distribution {}: {} expects {} coefficients, {} given",
            object.id,
            object.kind,
            n,
            object.coeffs.len()
        )))
    }
}

fn box1d(axis: usize) -> impl Fn(&DistributionObject, &Built) -> Result<Arc<dyn Distribution>, BuildError> {
    move |object, _| {
        expect_coeffs(object, 2)?;
        Ok(Arc::new(Box1D { axis, low: object.coeffs[0], high: object.coeffs[1] }))
    }
}

fn cyl2d(axis: usize) -> impl Fn(&DistributionObject, &Built) -> Result<Arc<dyn Distribution>, BuildError> {
    move |object, _| {
        let (rmin, rmax) = match object.coeffs.len() {
            3 => (0.0, object.coeffs[2]),
            4 => (object.coeffs[2], object.coeffs[3]),
            n => {
                return Err(BuildError::Source(format!(
                    "distribution {}: cylinder expects 3 or 4 coefficients, {} given",
                    object.id, n
                )))
            }
        };
        Ok(Arc::new(Cyl2D {
            axis,
            center: [object.coeffs[0], object.coeffs[1]],
            rmin,
            rmax,
        }))
    }
}

static REGISTRY: Lazy<HashMap<&'static str, Constructor>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Constructor> = HashMap::new();
    table.insert("box-x", |o, b| box1d(X)(o, b));
    table.insert("box-y", |o, b| box1d(Y)(o, b));
    table.insert("box-z", |o, b| box1d(Z)(o, b));
    table.insert("box", |o, _| {
        expect_coeffs(o, 6)?;
        Ok(Arc::new(Box3D {
            low: [o.coeffs[0], o.coeffs[1], o.coeffs[2]],
            high: [o.coeffs[3], o.coeffs[4], o.coeffs[5]],
        }))
    });
    table.insert("cyl-x", |o, b| cyl2d(X)(o, b));
    table.insert("cyl-y", |o, b| cyl2d(Y)(o, b));
    table.insert("cyl-z", |o, b| cyl2d(Z)(o, b));
    table.insert("isotropic", |_, _| Ok(Arc::new(IsotropicDirection)));
    table.insert("cone", |o, _| {
        expect_coeffs(o, 4)?;
        let axis = nalgebra::Vector3::new(o.coeffs[0], o.coeffs[1], o.coeffs[2]);
        let norm = axis.norm();
        if norm == 0.0 {
            return Err(BuildError::Source(format!("distribution {}: cone axis is zero", o.id)));
        }
        Ok(Arc::new(Cone { axis: axis / norm, mu_min: o.coeffs[3].clamp(-1.0, 1.0) }))
    });
    table.insert("energy-histogram", |o, _| {
        if o.coeffs.len() < 2 || o.weights.len() + 1 != o.coeffs.len() {
            return Err(BuildError::Source(format!(
                "distribution {}: histogram needs n+1 edges for n bin weights",
                o.id
            )));
        }
        let bins = TableSampler::from_weights((0..o.weights.len()).collect(), &o.weights)
            .map_err(|_| BuildError::Source(format!("distribution {}: empty histogram", o.id)))?;
        Ok(Arc::new(EnergyHistogram { edges: o.coeffs.clone(), bins }))
    });
    table.insert("custom", |o, built| {
        if o.distributions.is_empty() {
            return Err(BuildError::Source(format!("distribution {}: empty mixture", o.id)));
        }
        let members = o
            .distributions
            .iter()
            .map(|id| {
                built.get(id).cloned().ok_or_else(|| {
                    BuildError::Source(format!(
                        "distribution {}: member distribution {} is not defined",
                        o.id, id
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Equal probabilities when no weights are given
        let weights = if o.weights.is_empty() {
            vec![1.0; members.len()]
        } else if o.weights.len() == members.len() {
            o.weights.clone()
        } else {
            return Err(BuildError::Source(format!(
                "distribution {}: {} weights for {} members",
                o.id,
                o.weights.len(),
                o.distributions.len()
            )));
        };
        let members = TableSampler::from_weights(members, &weights)
            .map_err(|_| BuildError::Source(format!("distribution {}: empty mixture", o.id)))?;
        Ok(Arc::new(Custom { members }))
    });
    table
});

/// Build all distribution records, in input order so custom mixtures can
/// reference earlier ones.
pub fn build_distributions(objects: &[DistributionObject]) -> Result<Built, BuildError> {
    let mut built = Built::new();
    for object in objects {
        if built.contains_key(&object.id) {
            return Err(BuildError::Source(format!("distribution {}: duplicated id", object.id)));
        }
        let constructor = REGISTRY.get(object.kind.as_str()).ok_or_else(|| {
            BuildError::Source(format!(
                "distribution type {} is not defined (distribution {})",
                object.kind, object.id
            ))
        })?;
        let distribution = constructor(object, &built)?;
        built.insert(object.id.clone(), distribution);
    }
    Ok(built)
}

/// Samples one particle: reference phase space, then the distribution
/// pipeline, then the optional cell-constraint rejection loop.
#[derive(Debug)]
pub struct ParticleSampler {
    user_id: String,
    position: [f64; 3],
    direction: [f64; 3],
    energy: f64,
    distributions: Vec<Arc<dyn Distribution>>,
    /// Allowed user cell ids; empty means unconstrained.
    cells: Vec<u32>,
    max_samples: usize,
}

impl ParticleSampler {
    pub fn from_object(
        object: &SamplerObject,
        distributions: &Built,
        max_samples: usize,
    ) -> Result<Self, BuildError> {
        let pipeline = object
            .distributions
            .iter()
            .map(|id| {
                distributions.get(id).cloned().ok_or_else(|| {
                    BuildError::Source(format!(
                        "sampler {}: distribution {} is not defined",
                        object.id, id
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let norm = (object.direction[0] * object.direction[0]
            + object.direction[1] * object.direction[1]
            + object.direction[2] * object.direction[2])
            .sqrt();
        if norm == 0.0 {
            return Err(BuildError::Source(format!("sampler {}: direction is zero", object.id)));
        }
        let direction = [
            object.direction[0] / norm,
            object.direction[1] / norm,
            object.direction[2] / norm,
        ];

        Ok(Self {
            user_id: object.id.clone(),
            position: object.position,
            direction,
            energy: object.energy,
            distributions: pipeline,
            cells: object.cells.clone(),
            max_samples,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn draw(&self, rng: &mut dyn RngCore) -> Particle {
        let mut particle = Particle::new(self.position, self.direction, self.energy);
        for distribution in &self.distributions {
            distribution.apply(&mut particle, rng);
        }
        particle
    }

    /// Whether the located cell, or any of its fill ancestors, is one of
    /// the configured cells.
    fn satisfies_constraint(&self, geometry: &Geometry, cell: usize) -> bool {
        let mut current = Some(cell);
        while let Some(c) = current {
            if self.cells.contains(&geometry.cells[c].user_id) {
                return true;
            }
            current = geometry.universes[geometry.cells[c].universe].parent;
        }
        false
    }

    pub fn sample(
        &self,
        geometry: &Geometry,
        rng: &mut dyn RngCore,
    ) -> Result<CellParticle, SamplingError> {
        if self.cells.is_empty() {
            let particle = self.draw(rng);
            let cell = geometry.find_cell(&particle.position).ok_or(
                SamplingError::LostParticle(
                    particle.position[0],
                    particle.position[1],
                    particle.position[2],
                ),
            )?;
            return Ok((cell, particle));
        }

        for _ in 0..self.max_samples {
            let particle = self.draw(rng);
            if let Some(cell) = geometry.find_cell(&particle.position) {
                if self.satisfies_constraint(geometry, cell) {
                    return Ok((cell, particle));
                }
            }
        }
        Err(SamplingError::SourceExhausted(self.max_samples))
    }
}

/// The weighted mixture of samplers used as the initial source.
#[derive(Debug)]
pub struct Source {
    samplers: TableSampler<ParticleSampler>,
    strength: f64,
}

impl Source {
    pub fn build(
        distribution_objects: &[DistributionObject],
        sampler_objects: &[SamplerObject],
        source_objects: &[SourceObject],
        max_samples: usize,
    ) -> Result<Self, BuildError> {
        let distributions = build_distributions(distribution_objects)?;

        let mut samplers: HashMap<&str, &SamplerObject> = HashMap::new();
        for object in sampler_objects {
            samplers.insert(object.id.as_str(), object);
        }

        if source_objects.is_empty() {
            return Err(BuildError::Source("no source defined".into()));
        }

        let mut members = Vec::new();
        let mut weights = Vec::new();
        let mut strength = 0.0;
        for source in source_objects {
            if source.samplers.is_empty() {
                return Err(BuildError::Source("source has an empty sampler mixture".into()));
            }
            let source_weights = if source.weights.is_empty() {
                vec![1.0; source.samplers.len()]
            } else if source.weights.len() == source.samplers.len() {
                source.weights.clone()
            } else {
                return Err(BuildError::Source(format!(
                    "source lists {} weights for {} samplers",
                    source.weights.len(),
                    source.samplers.len()
                )));
            };
            for (id, weight) in source.samplers.iter().zip(source_weights) {
                let object = samplers.get(id.as_str()).ok_or_else(|| {
                    BuildError::Source(format!("sampler {} is not defined", id))
                })?;
                members.push(ParticleSampler::from_object(object, &distributions, max_samples)?);
                weights.push(weight * source.strength);
            }
            strength += source.strength;
        }

        let samplers = TableSampler::from_weights(members, &weights)
            .map_err(|_| BuildError::Source("source has an empty sampler mixture".into()))?;
        Ok(Self { samplers, strength })
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Sample one source particle and locate its cell.
    pub fn sample(
        &self,
        geometry: &Geometry,
        rng: &mut dyn RngCore,
    ) -> Result<CellParticle, SamplingError> {
        let sampler = self.samplers.sample(0, rng.gen());
        sampler.sample(geometry, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{CellObject, SurfaceObject};
    use crate::rng::Prn;
    use crate::surface::Transformation;
    use std::collections::BTreeMap;

    fn distribution(id: &str, kind: &str, coeffs: Vec<f64>) -> DistributionObject {
        DistributionObject {
            id: id.into(),
            kind: kind.into(),
            coeffs,
            distributions: vec![],
            weights: vec![],
        }
    }

    fn sampler_object(id: &str, distributions: Vec<String>) -> SamplerObject {
        SamplerObject {
            id: id.into(),
            position: [0.0; 3],
            direction: [0.0, 0.0, 1.0],
            energy: 1e6,
            distributions,
            cells: vec![],
        }
    }

    fn simple_geometry() -> Geometry {
        let surfaces =
            vec![SurfaceObject { id: 1, kind: "sphere".into(), coeffs: vec![0.0, 0.0, 0.0, 10.0] }];
        let cells = vec![CellObject {
            id: 1,
            universe: 0,
            surfaces: vec![-1],
            flag: String::new(),
            material: None,
            fill: None,
            transformation: Transformation::identity(),
        }];
        Geometry::build(&surfaces, &cells, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_box_distribution_bounds() {
        let built = build_distributions(&[distribution(
            "b",
            "box",
            vec![-1.0, -2.0, -3.0, 1.0, 2.0, 3.0],
        )])
        .unwrap();
        let b = built.get("b").unwrap();
        let mut rng = Prn::new(1);
        for _ in 0..1000 {
            let mut p = Particle::default();
            b.apply(&mut p, &mut rng);
            assert!((-1.0..=1.0).contains(&p.position[0]));
            assert!((-2.0..=2.0).contains(&p.position[1]));
            assert!((-3.0..=3.0).contains(&p.position[2]));
        }
    }

    #[test]
    fn test_cylinder_distribution_radius() {
        let built =
            build_distributions(&[distribution("c", "cyl-z", vec![1.0, 2.0, 0.5, 2.0])]).unwrap();
        let c = built.get("c").unwrap();
        let mut rng = Prn::new(2);
        for _ in 0..1000 {
            let mut p = Particle::default();
            c.apply(&mut p, &mut rng);
            let r = ((p.position[0] - 1.0).powi(2) + (p.position[1] - 2.0).powi(2)).sqrt();
            assert!((0.5..=2.0 + 1e-12).contains(&r), "r = {}", r);
            assert_eq!(p.position[2], 0.0, "axial coordinate untouched");
        }
    }

    #[test]
    fn test_energy_histogram_bins() {
        let mut object = distribution("e", "energy-histogram", vec![1e3, 1e4, 1e5]);
        object.weights = vec![1.0, 3.0];
        let built = build_distributions(&[object]).unwrap();
        let e = built.get("e").unwrap();
        let mut rng = Prn::new(3);
        let m = 50_000;
        let mut high = 0usize;
        for _ in 0..m {
            let mut p = Particle::default();
            e.apply(&mut p, &mut rng);
            assert!((1e3..=1e5).contains(&p.energy.value));
            if p.energy.value > 1e4 {
                high += 1;
            }
        }
        let fraction = high as f64 / m as f64;
        assert!((fraction - 0.75).abs() < 0.01, "upper-bin fraction {}", fraction);
    }

    #[test]
    fn test_custom_mixture_references_members() {
        let a = distribution("a", "box-x", vec![-1.0, 0.0]);
        let b = distribution("b", "box-x", vec![0.0, 1.0]);
        let mut custom = distribution("mix", "custom", vec![]);
        custom.distributions = vec!["a".into(), "b".into()];
        custom.weights = vec![1.0, 1.0];
        let built = build_distributions(&[a, b, custom]).unwrap();
        let mix = built.get("mix").unwrap();
        let mut rng = Prn::new(4);
        let mut negative = 0usize;
        let m = 20_000;
        for _ in 0..m {
            let mut p = Particle::default();
            mix.apply(&mut p, &mut rng);
            if p.position[0] < 0.0 {
                negative += 1;
            }
        }
        let fraction = negative as f64 / m as f64;
        assert!((fraction - 0.5).abs() < 0.02, "member fraction {}", fraction);
    }

    #[test]
    fn test_unknown_distribution_kind_is_an_error() {
        let err = build_distributions(&[distribution("x", "pyramid", vec![])]).unwrap_err();
        assert!(err.to_string().contains("not defined"), "{}", err);
    }

    #[test]
    fn test_cell_constrained_sampler_rejects_until_inside() {
        let geometry = simple_geometry();
        let built =
            build_distributions(&[distribution("b", "box", vec![-20.0, 0.0, 0.0, 20.0, 0.0, 0.0])])
                .unwrap();
        // Half the box is outside the sphere: rejection must land every
        // accepted draw inside cell 1
        let mut object = sampler_object("s", vec!["b".into()]);
        object.cells = vec![1];
        let sampler = ParticleSampler::from_object(&object, &built, 100).unwrap();
        let mut rng = Prn::new(5);
        for _ in 0..200 {
            let (cell, particle) = sampler.sample(&geometry, &mut rng).unwrap();
            assert_eq!(geometry.cells[cell].user_id, 1);
            assert!(particle.position[0].abs() <= 10.0);
        }
    }

    #[test]
    fn test_rejection_budget_exhaustion_fails_the_draw() {
        let geometry = simple_geometry();
        // Positions always outside the sphere
        let built =
            build_distributions(&[distribution("b", "box", vec![15.0, 0.0, 0.0, 20.0, 0.0, 0.0])])
                .unwrap();
        let mut object = sampler_object("s", vec!["b".into()]);
        object.cells = vec![1];
        let sampler = ParticleSampler::from_object(&object, &built, 25).unwrap();
        let mut rng = Prn::new(6);
        assert_eq!(
            sampler.sample(&geometry, &mut rng).unwrap_err(),
            SamplingError::SourceExhausted(25)
        );
    }

    #[test]
    fn test_source_mixture_weights_samplers() {
        let geometry = simple_geometry();
        let a = distribution("left", "box-x", vec![-5.0, -1.0]);
        let b = distribution("right", "box-x", vec![1.0, 5.0]);
        let samplers = vec![
            sampler_object("sa", vec!["left".into()]),
            sampler_object("sb", vec!["right".into()]),
        ];
        let source_object = SourceObject {
            samplers: vec!["sa".into(), "sb".into()],
            weights: vec![3.0, 1.0],
            strength: 1.0,
        };
        let source =
            Source::build(&[a, b], &samplers, &[source_object], 100).unwrap();

        let mut rng = Prn::new(7);
        let m = 20_000;
        let mut left = 0usize;
        for _ in 0..m {
            let (_, particle) = source.sample(&geometry, &mut rng).unwrap();
            if particle.position[0] < 0.0 {
                left += 1;
            }
        }
        let fraction = left as f64 / m as f64;
        assert!((fraction - 0.75).abs() < 0.015, "left fraction {}", fraction);
    }

    #[test]
    fn test_empty_source_mixture_is_an_error() {
        let err = Source::build(&[], &[], &[], 100).unwrap_err();
        assert!(err.to_string().contains("no source"), "{}", err);
    }
}
