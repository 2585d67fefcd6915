// Reactions that update a particle's phase space.
//
// The set is closed (elastic, inelastic, prompt fission, delayed fission),
// so reactions are a tagged enum dispatched by match; only the energy laws
// inside them are trait objects. Applying a reaction rewrites the
// particle's energy value and direction in place; the master-grid index
// goes stale and is refreshed by the transport loop on the next lookup.

use std::f64::consts::PI;
use std::sync::Arc;

use nalgebra::Vector3;
use rand::{Rng, RngCore};

use crate::ace::{CrossSection, Tabulated};
use crate::angular::MuSampler;
use crate::energy_grid::ChildGrid;
use crate::energy_law::EnergyLaw;
use crate::particle::Particle;
use crate::sampler::ThresholdSampler;

/// Rotate a unit vector to a new direction making cosine `mu` with it,
/// with a uniformly random azimuth.
pub fn rotate_angle(u: Vector3<f64>, mu: f64, rng: &mut dyn RngCore) -> Vector3<f64> {
    let phi = 2.0 * PI * rng.gen::<f64>();
    let perp = if u.x.abs() < 0.99 {
        Vector3::new(1.0, 0.0, 0.0).cross(&u).normalize()
    } else {
        Vector3::new(0.0, 1.0, 0.0).cross(&u).normalize()
    };
    let ortho = u.cross(&perp);
    let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();
    mu * u + sin_theta * phi.cos() * perp + sin_theta * phi.sin() * ortho
}

/// Rotate a particle's direction by scattering cosine `mu`.
pub fn rotate_direction(direction: &mut [f64; 3], mu: f64, rng: &mut dyn RngCore) {
    let u = Vector3::from_row_slice(direction);
    let v = rotate_angle(u, mu, rng).normalize();
    *direction = [v.x, v.y, v.z];
}

/// Sample an isotropic unit direction.
pub fn isotropic_direction(rng: &mut dyn RngCore) -> [f64; 3] {
    let mu = 2.0 * rng.gen::<f64>() - 1.0;
    let phi = 2.0 * PI * rng.gen::<f64>();
    let sin_theta = (1.0 - mu * mu).sqrt();
    [sin_theta * phi.cos(), sin_theta * phi.sin(), mu]
}

/// Convert a center-of-mass (energy, cosine) pair to the lab frame.
fn cm_to_lab(e_in: f64, e_cm: f64, mu_cm: f64, awr: f64) -> (f64, f64) {
    let ap1 = awr + 1.0;
    let e_lab = e_cm + (e_in + 2.0 * mu_cm * ap1 * (e_in * e_cm).sqrt()) / (ap1 * ap1);
    if e_lab <= 0.0 {
        return (0.0, mu_cm);
    }
    let mu_lab = mu_cm * (e_cm / e_lab).sqrt() + (e_in / e_lab).sqrt() / ap1;
    (e_lab, mu_lab.clamp(-1.0, 1.0))
}

#[derive(Debug)]
pub enum Reaction {
    Elastic(ElasticScattering),
    Inelastic(InelasticScattering),
    Fission(FissionReaction),
    DelayedFission(DelayedFissionReaction),
}

impl Reaction {
    pub fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        match self {
            Reaction::Elastic(r) => r.apply(particle, rng),
            Reaction::Inelastic(r) => r.apply(particle, rng),
            Reaction::Fission(r) => r.apply(particle, rng),
            Reaction::DelayedFission(r) => r.apply(particle, rng),
        }
    }
}

/// Elastic scattering: a center-of-mass cosine from the isotope's angular
/// table, two-body kinematics, and free-gas target motion below the
/// configured energy/AWR thresholds.
#[derive(Debug)]
pub struct ElasticScattering {
    awr: f64,
    kt: f64,
    mu: MuSampler,
    /// Free-gas treatment applies below this multiple of kT...
    energy_threshold: f64,
    /// ...or below this atomic weight ratio regardless of energy.
    awr_threshold: f64,
}

impl ElasticScattering {
    pub fn new(awr: f64, kt: f64, mu: MuSampler, energy_threshold: f64, awr_threshold: f64) -> Self {
        Self { awr, kt, mu, energy_threshold, awr_threshold }
    }

    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let e_in = particle.energy.value;
        let use_freegas =
            self.kt > 0.0 && (e_in < self.energy_threshold * self.kt || self.awr < self.awr_threshold);
        if use_freegas {
            self.scatter_freegas(particle, rng);
        } else {
            self.scatter_stationary(particle, rng);
        }
    }

    fn scatter_stationary(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let e_in = particle.energy.value;
        let awr = self.awr;
        let mu_cm = self.mu.sample(e_in, rng);

        // E_out = E_in (AWR^2 + 1 + 2 AWR mu_cm) / (AWR + 1)^2
        let e_out = e_in * (awr * awr + 1.0 + 2.0 * awr * mu_cm) / ((awr + 1.0) * (awr + 1.0));
        // mu_lab = (1 + AWR mu_cm) / sqrt(1 + AWR^2 + 2 AWR mu_cm)
        let mu_lab =
            (1.0 + awr * mu_cm) / (1.0 + awr * awr + 2.0 * awr * mu_cm).sqrt();

        particle.energy.value = e_out;
        rotate_direction(&mut particle.direction, mu_lab.clamp(-1.0, 1.0), rng);
    }

    /// Sample the target nucleus velocity from a Maxwell-Boltzmann
    /// distribution at the table temperature and do the collision in the
    /// moving-target frame. Speeds are in sqrt(eV) units throughout, which
    /// cancels the common mass factor.
    fn scatter_freegas(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let e_in = particle.energy.value;
        let awr = self.awr;
        let kt = self.kt;
        let u = Vector3::from_row_slice(&particle.direction);
        let v_n = e_in.sqrt() * u;

        // Target speed and flight-angle cosine, rejection-sampled against
        // the relative-speed weighted Maxwellian
        let beta_vn = (awr * e_in / kt).sqrt();
        let alpha = 1.0 / (1.0 + PI.sqrt() * beta_vn / 2.0);
        let (beta_vt_sq, mu_t) = loop {
            let r1 = rng.gen::<f64>();
            let r2 = rng.gen::<f64>();
            let beta_vt_sq = if rng.gen::<f64>() < alpha {
                -(r1 * r2).ln()
            } else {
                let c = (PI / 2.0 * rng.gen::<f64>()).cos();
                -r1.ln() - r2.ln() * c * c
            };
            let beta_vt = beta_vt_sq.sqrt();
            let mu_t = 2.0 * rng.gen::<f64>() - 1.0;
            let accept = (beta_vn * beta_vn + beta_vt_sq - 2.0 * beta_vn * beta_vt * mu_t)
                .max(0.0)
                .sqrt()
                / (beta_vn + beta_vt);
            if rng.gen::<f64>() < accept {
                break (beta_vt_sq, mu_t);
            }
        };
        let vt_speed = (beta_vt_sq * kt / awr).sqrt();
        let v_t = vt_speed * rotate_angle(u, mu_t, rng);

        // Collision in the center-of-mass frame
        let v_cm = (v_n + awr * v_t) / (awr + 1.0);
        let v_rel = v_n - v_cm;
        let speed_rel = v_rel.norm();
        let mu_cm = self.mu.sample(e_in, rng);
        let v_out = v_cm + speed_rel * rotate_angle(v_rel / speed_rel, mu_cm, rng);

        particle.energy.value = v_out.norm_squared();
        let dir = v_out.normalize();
        particle.direction = [dir.x, dir.y, dir.z];
    }
}

/// An inelastic channel: cosine from the reaction's angular table unless
/// the energy law supplies one, outgoing energy from the law, CM-to-lab
/// conversion when the table flags center-of-mass secondaries, and the
/// neutron yield folded into the particle weight.
#[derive(Debug)]
pub struct InelasticScattering {
    pub mt: u32,
    awr: f64,
    mu: Option<MuSampler>,
    law: Box<dyn EnergyLaw>,
    yield_factor: f64,
    cm: bool,
}

impl InelasticScattering {
    pub fn new(
        mt: u32,
        awr: f64,
        mu: Option<MuSampler>,
        law: Box<dyn EnergyLaw>,
        yield_factor: f64,
        cm: bool,
    ) -> Self {
        Self { mt, awr, mu, law, yield_factor, cm }
    }

    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let e_in = particle.energy.value;
        let (mut e_out, law_mu) = self.law.sample(e_in, rng);
        let mut mu = match law_mu {
            Some(mu) => mu,
            None => match &self.mu {
                Some(sampler) => sampler.sample(e_in, rng),
                None => 1.0 - 2.0 * rng.gen::<f64>(),
            },
        };
        if self.cm {
            let (e, m) = cm_to_lab(e_in, e_out, mu, self.awr);
            e_out = e;
            mu = m;
        }
        particle.energy.value = e_out;
        rotate_direction(&mut particle.direction, mu, rng);
        particle.weight *= self.yield_factor;
    }
}

/// Prompt fission: sample the progeny energy from the fission spectrum and
/// emit it isotropically. With multi-chance data the spectrum is drawn
/// from the union of the chance distributions weighted by their partial
/// cross sections at the incident energy.
#[derive(Debug)]
pub enum FissionReaction {
    Single {
        law: Box<dyn EnergyLaw>,
    },
    Chance {
        child: Arc<ChildGrid>,
        sampler: ThresholdSampler<usize>,
        laws: Vec<Box<dyn EnergyLaw>>,
        total: CrossSection,
    },
}

impl FissionReaction {
    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let e_in = particle.energy.value;
        let e_out = match self {
            FissionReaction::Single { law } => law.sample(e_in, rng).0,
            FissionReaction::Chance { child, sampler, laws, total } => {
                let (j, f) = child.locate(&particle.energy);
                let value = total.interpolate(j, f) * rng.gen::<f64>();
                let which = *sampler.sample(j, value, f);
                laws[which].sample(e_in, rng).0
            }
        };
        particle.energy.value = e_out;
        particle.direction = isotropic_direction(rng);
    }
}

/// Delayed fission: pick a precursor group by its emission probability at
/// the incident energy, then sample that group's spectrum.
#[derive(Debug)]
pub struct DelayedFissionReaction {
    groups: Vec<DelayedGroupSampler>,
}

#[derive(Debug)]
pub struct DelayedGroupSampler {
    pub decay_constant: f64,
    pub probability: Tabulated,
    pub law: Box<dyn EnergyLaw>,
}

impl DelayedFissionReaction {
    pub fn new(groups: Vec<DelayedGroupSampler>) -> Self {
        Self { groups }
    }

    fn apply(&self, particle: &mut Particle, rng: &mut dyn RngCore) {
        let e_in = particle.energy.value;
        let weights: Vec<f64> = self.groups.iter().map(|g| g.probability.evaluate(e_in)).collect();
        let total: f64 = weights.iter().sum();

        let mut pick = self.groups.len() - 1;
        if total > 0.0 {
            let target = total * rng.gen::<f64>();
            let mut cumulative = 0.0;
            for (i, w) in weights.iter().enumerate() {
                cumulative += w;
                if target < cumulative {
                    pick = i;
                    break;
                }
            }
        }

        particle.energy.value = self.groups[pick].law.sample(e_in, rng).0;
        particle.direction = isotropic_direction(rng);
    }
}
