// Continuous-energy Monte Carlo criticality kernel.
//
// The crate is organized bottom-up: random streams and the unified energy
// grid first, then the cross-section machinery (samplers, reactions,
// isotopes, materials), the constructive-solid geometry, the source, and
// finally the power-iteration driver that cycles fission generations until
// k-eff converges.

pub mod ace;
pub mod angular;
pub mod bank;
pub mod cell;
pub mod data;
pub mod energy_grid;
pub mod energy_law;
pub mod error;
pub mod geometry;
pub mod isotope;
pub mod material;
pub mod model;
pub mod objects;
pub mod particle;
pub mod reaction;
pub mod rng;
pub mod sampler;
pub mod settings;
pub mod simulation;
pub mod source;
pub mod stats;
pub mod surface;

pub use error::{BuildError, RunError, SamplingError};
pub use model::{Model, RunResults};
pub use particle::{Energy, Particle, State};
pub use rng::Prn;
pub use settings::Settings;
