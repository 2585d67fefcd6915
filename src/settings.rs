// Engine settings, parsed from the flat key/value records. The defaults
// are loaded first and user records override them, so a problem only
// states what it changes.

use crate::error::BuildError;
use crate::objects::SettingsObject;

/// History scheduler. The `omp` and `tbb` values are accepted for
/// compatibility and both select the threaded backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduler {
    Single,
    Threaded,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// PRNG base seed.
    pub seed: u64,
    pub scheduler: Scheduler,
    /// Rejection budget per source draw.
    pub max_source_samples: usize,
    /// PRNG draw budget per history; parallel streams are spaced this far
    /// apart.
    pub max_rng_per_history: usize,
    /// Free-gas target motion below this multiple of kT...
    pub energy_freegas_threshold: f64,
    /// ...or below this atomic weight ratio.
    pub awr_freegas_threshold: f64,
    /// Histories per cycle.
    pub particles: usize,
    /// Inactive (source-convergence) cycles.
    pub inactive: usize,
    /// Total cycles, inactive included.
    pub batches: usize,
    /// Discarded histories tolerated per cycle before the run aborts.
    pub max_lost_histories: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 10,
            scheduler: Scheduler::Threaded,
            max_source_samples: 100,
            max_rng_per_history: 100_000,
            energy_freegas_threshold: 400.0,
            awr_freegas_threshold: 1.0,
            particles: 1000,
            inactive: 10,
            batches: 110,
            max_lost_histories: 10,
        }
    }
}

impl Settings {
    pub fn from_objects(objects: &[SettingsObject]) -> Result<Self, BuildError> {
        let mut settings = Settings::default();
        for object in objects {
            settings.apply(object)?;
        }
        if settings.batches <= settings.inactive {
            return Err(BuildError::setting(
                "criticality.batches",
                format!(
                    "total batches ({}) must exceed inactive cycles ({})",
                    settings.batches, settings.inactive
                ),
            ));
        }
        if settings.particles == 0 {
            return Err(BuildError::setting("criticality.particles", "must be positive"));
        }
        Ok(settings)
    }

    fn apply(&mut self, object: &SettingsObject) -> Result<(), BuildError> {
        let key = object.key.as_str();
        let value = object.value.as_str();
        match key {
            "seed" => self.seed = parse(key, value)?,
            "multithread" => {
                self.scheduler = match value {
                    "single" => Scheduler::Single,
                    "omp" | "tbb" => Scheduler::Threaded,
                    other => {
                        return Err(BuildError::setting(
                            key,
                            format!("unknown scheduler {} (single, omp or tbb)", other),
                        ))
                    }
                }
            }
            "max_source_samples" => self.max_source_samples = parse(key, value)?,
            "max_rng_per_history" => self.max_rng_per_history = parse(key, value)?,
            "energy_freegas_threshold" => self.energy_freegas_threshold = parse(key, value)?,
            "awr_freegas_threshold" => self.awr_freegas_threshold = parse(key, value)?,
            "criticality.particles" => self.particles = parse(key, value)?,
            "criticality.inactive" => self.inactive = parse(key, value)?,
            "criticality.batches" => self.batches = parse(key, value)?,
            "max_lost_histories" => self.max_lost_histories = parse(key, value)?,
            other => {
                return Err(BuildError::setting(other, "unknown setting"));
            }
        }
        Ok(())
    }

    /// Active cycles.
    pub fn active(&self) -> usize {
        self.batches - self.inactive
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, BuildError> {
    value
        .parse()
        .map_err(|_| BuildError::setting(key, format!("malformed value `{}`", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.seed, 10);
        assert_eq!(settings.scheduler, Scheduler::Threaded);
        assert_eq!(settings.max_source_samples, 100);
        assert_eq!(settings.max_rng_per_history, 100_000);
        assert_eq!(settings.energy_freegas_threshold, 400.0);
        assert_eq!(settings.awr_freegas_threshold, 1.0);
    }

    #[test]
    fn test_overrides_and_sizing() {
        let objects = vec![
            SettingsObject::new("seed", "42"),
            SettingsObject::new("multithread", "single"),
            SettingsObject::new("criticality.particles", "5000"),
            SettingsObject::new("criticality.inactive", "20"),
            SettingsObject::new("criticality.batches", "120"),
        ];
        let settings = Settings::from_objects(&objects).unwrap();
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.scheduler, Scheduler::Single);
        assert_eq!(settings.particles, 5000);
        assert_eq!(settings.active(), 100);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let objects = vec![SettingsObject::new("turbo", "on")];
        assert!(Settings::from_objects(&objects).is_err());
    }

    #[test]
    fn test_malformed_value_rejected() {
        let objects = vec![SettingsObject::new("seed", "not-a-number")];
        assert!(Settings::from_objects(&objects).is_err());
    }

    #[test]
    fn test_batches_must_exceed_inactive() {
        let objects = vec![
            SettingsObject::new("criticality.inactive", "10"),
            SettingsObject::new("criticality.batches", "10"),
        ];
        assert!(Settings::from_objects(&objects).is_err());
    }
}
