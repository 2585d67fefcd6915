// Physical constants used across the cross-section and material modules.
// Energies are in eV, microscopic cross sections in barns, atomic densities
// in atom/b-cm and mass densities in g/cm3.

/// Avogadro's number scaled for barn-cm units (mol^-1 * 1e-24 cm2/barn).
pub const AVOGADRO: f64 = 0.602214076;

/// Neutron mass in atomic mass units. Atomic weight ratios from nuclear
/// data tables are relative to this.
pub const NEUTRON_MASS_AMU: f64 = 1.008664915;

/// Distance a particle is nudged past a surface after a crossing, to avoid
/// relocating exactly on the crossed surface.
pub const SURFACE_NUDGE: f64 = 1e-8;

/// Positivity cutoff for ray-surface intersection roots.
pub const TINY_DISTANCE: f64 = 1e-12;
