// Power-iteration transport driver.
//
// A cycle simulates every site of the current fission bank as an
// independent history. Each history's random stream is derived from the
// base stream by jumping `index * max_rng_per_history`, so the per-cycle
// k sequence is identical whichever scheduler runs it and however the
// threads interleave. Per-history outcomes are collected in index order
// and reduced sequentially at the cycle barrier; the merged local banks
// become the next cycle's source after the weight/k split.

use log::warn;
use rayon::prelude::*;

use crate::bank::FissionBank;
use crate::data::SURFACE_NUDGE;
use crate::error::{RunError, SamplingError};
use crate::model::Model;
use crate::particle::{CellParticle, State};
use crate::rng::Prn;
use crate::settings::Scheduler;

pub struct KeffSimulation<'a> {
    model: &'a Model,
    keff: f64,
    particles_number: usize,
    fission_bank: FissionBank,
    base: Prn,
}

struct HistoryOutcome {
    /// Fission production weight banked by this history.
    population: f64,
    site: Option<CellParticle>,
}

impl HistoryOutcome {
    fn terminated() -> Self {
        Self { population: 0.0, site: None }
    }
}

impl<'a> KeffSimulation<'a> {
    /// Populate the initial bank from the source and disjoin the base
    /// stream past it.
    pub fn new(model: &'a Model) -> Result<Self, RunError> {
        let settings = &model.settings;
        let n = settings.particles;
        let stride = settings.max_rng_per_history as u64;
        let base = Prn::new(settings.seed);

        let draws = run_indexed(settings.scheduler, n, |i| {
            let mut rng = base.jumped(i as u64 * stride);
            model.source.sample(&model.geometry, &mut rng)
        });

        let mut bank = FissionBank::with_capacity(n);
        let mut lost = 0usize;
        for draw in draws {
            match draw {
                Ok(site) => bank.push(site),
                Err(error) => {
                    lost += 1;
                    warn!("source sampling failed: {}", error);
                }
            }
        }
        if lost > settings.max_lost_histories {
            return Err(RunError::TooManyLostHistories {
                cycle: 0,
                count: lost,
                limit: settings.max_lost_histories,
            });
        }

        Ok(Self {
            model,
            keff: 1.0,
            particles_number: n,
            fission_bank: bank,
            base: base.jumped(n as u64 * stride),
        })
    }

    pub fn keff(&self) -> f64 {
        self.keff
    }

    pub fn bank_size(&self) -> usize {
        self.fission_bank.len()
    }

    /// Run one power-iteration cycle: simulate the bank, update k, and
    /// replace the bank with the split of the newly banked sites.
    pub fn cycle(&mut self, cycle_index: usize) -> Result<f64, RunError> {
        let settings = &self.model.settings;
        let bank = std::mem::take(&mut self.fission_bank);
        let n = bank.len();
        let sites = bank.sites();

        let model = self.model;
        let base = self.base;
        let keff = self.keff;
        let outcomes = run_indexed(settings.scheduler, n, |i| {
            Self::history(model, base, keff, i, &sites[i])
        });

        let mut population = 0.0;
        let mut lost = 0usize;
        let mut banked = FissionBank::with_capacity(n);
        for outcome in outcomes {
            match outcome {
                Ok(outcome) => {
                    population += outcome.population;
                    if let Some(site) = outcome.site {
                        banked.push(site);
                    }
                }
                Err(error) => {
                    lost += 1;
                    warn!("history discarded in cycle {}: {}", cycle_index, error);
                }
            }
        }
        if lost > settings.max_lost_histories {
            return Err(RunError::TooManyLostHistories {
                cycle: cycle_index,
                count: lost,
                limit: settings.max_lost_histories,
            });
        }

        // Disjoin the streams of the next cycle from this one's
        self.base.jump(n as u64 * settings.max_rng_per_history as u64);
        self.keff = population / self.particles_number as f64;
        self.fission_bank = banked.split(self.keff);
        Ok(self.keff)
    }

    /// Random walk of one banked particle. Returns the fission production
    /// it banked (zero for histories ending in absorption or escape).
    fn history(
        model: &Model,
        base: Prn,
        keff: f64,
        index: usize,
        site: &CellParticle,
    ) -> Result<HistoryOutcome, SamplingError> {
        let settings = &model.settings;
        let geometry = &model.geometry;
        let budget = settings.max_rng_per_history as u64;
        let mut rng = base.jumped(index as u64 * budget);

        // 1. Load the particle from the bank
        let (mut cell_index, mut particle) = site.clone();
        particle.state = State::Alive;
        let mut factor = model.grid.interpolate(&mut particle.energy);

        loop {
            if rng.draws() > budget {
                return Err(SamplingError::RngBudgetExceeded(settings.max_rng_per_history));
            }
            if !particle.position.iter().all(|x| x.is_finite()) {
                return Err(SamplingError::LostParticle(
                    particle.position[0],
                    particle.position[1],
                    particle.position[2],
                ));
            }

            // 2. Mean free path in the current cell
            let mut mfp = match geometry.cells[cell_index].material {
                Some(m) => model.materials[m].mean_free_path(&particle.energy, factor),
                None => f64::INFINITY,
            };

            // 3. Distance to the nearest bounding surface
            let mut boundary = geometry.intersect(cell_index, &particle.position, &particle.direction);

            // 4. Collision distance from the mean free path
            let mut collision_distance = -rng.random().ln() * mfp;

            // 5. Stream across surfaces while the collision lies beyond them
            loop {
                let distance = match boundary {
                    Some((_, _, distance)) => distance,
                    None => f64::INFINITY,
                };
                if collision_distance <= distance {
                    break;
                }
                if distance.is_infinite() {
                    // Nothing to collide with and nothing to cross
                    return Err(SamplingError::LostParticle(
                        particle.position[0],
                        particle.position[1],
                        particle.position[2],
                    ));
                }

                // 5.1-5.2 advance to the surface and cross it
                particle.move_by(distance + SURFACE_NUDGE);
                match geometry.cross(&particle.position) {
                    None => {
                        // Left the geometry
                        particle.state = State::Dead;
                        return Ok(HistoryOutcome::terminated());
                    }
                    Some(next) => {
                        cell_index = next;
                        if geometry.cells[next].is_dead() {
                            particle.state = State::Dead;
                            return Ok(HistoryOutcome::terminated());
                        }
                    }
                }
                if rng.draws() > budget {
                    return Err(SamplingError::RngBudgetExceeded(settings.max_rng_per_history));
                }

                // 5.3-5.5 new material (energy unchanged), next surface,
                // fresh collision distance
                mfp = match geometry.cells[cell_index].material {
                    Some(m) => model.materials[m].mean_free_path(&particle.energy, factor),
                    None => f64::INFINITY,
                };
                boundary = geometry.intersect(cell_index, &particle.position, &particle.direction);
                collision_distance = -rng.random().ln() * mfp;
            }

            // 6. Advance to the collision point
            particle.move_by(collision_distance);
            let material = match geometry.cells[cell_index].material {
                Some(m) => &model.materials[m],
                None => {
                    return Err(SamplingError::LostParticle(
                        particle.position[0],
                        particle.position[1],
                        particle.position[2],
                    ))
                }
            };

            // 7. Sample the collided isotope at this energy
            let isotope = &model.isotopes[material.sample_isotope(&particle.energy, factor, &mut rng)];

            // 8. Branch on a single uniform against the probability
            // decomposition
            let u = rng.random();
            let absorption = isotope.absorption_prob(&particle.energy);
            if u < absorption {
                if isotope.is_fissile() {
                    let fission = isotope.fission_prob(&particle.energy);
                    if u > absorption - fission {
                        // Expected progeny nu_bar w / k, stochastically
                        // rounded; the banked entry carries the production
                        // weight n k and the parent terminates
                        let expected = isotope.nu_bar(&particle.energy) * particle.weight / keff;
                        let mut progeny = expected as usize;
                        if rng.random() < expected - progeny as f64 {
                            progeny += 1;
                        }
                        if progeny > 0 {
                            if let Some(reaction) = isotope.fission(&particle.energy, &mut rng) {
                                reaction.apply(&mut particle, &mut rng);
                                particle.weight = progeny as f64 * keff;
                                particle.state = State::Bank;
                                return Ok(HistoryOutcome {
                                    population: particle.weight,
                                    site: Some((cell_index, particle)),
                                });
                            }
                        }
                    }
                }
                // Analog absorption
                particle.state = State::Dead;
                return Ok(HistoryOutcome::terminated());
            }

            let elastic = isotope.elastic_prob(&particle.energy);
            if u - absorption <= elastic {
                isotope.elastic().apply(&mut particle, &mut rng);
            } else {
                // Inelastic channel weighted by the partial cross sections
                let reaction = isotope.inelastic(&particle.energy, &mut rng);
                reaction.apply(&mut particle, &mut rng);
            }
            factor = model.grid.interpolate(&mut particle.energy);
        }
    }
}

/// The one scheduler interface of the driver: map a history index range
/// through `f`, collecting results in index order.
fn run_indexed<T, F>(scheduler: Scheduler, n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    match scheduler {
        Scheduler::Single => (0..n).map(f).collect(),
        Scheduler::Threaded => (0..n).into_par_iter().map(f).collect(),
    }
}
