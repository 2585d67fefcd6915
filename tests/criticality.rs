// End-to-end power-iteration benchmarks on one-group-style problems.

mod common;

use common::*;
use keff_mc::Model;

/// Infinite medium of a single fissile isotope with sigma_f = sigma_a,
/// sigma_s = 1, nu = 2, sigma_t = 2: k must converge to
/// nu sigma_f / sigma_a = 2.
#[test]
fn infinite_medium_k_converges_to_two() {
    let mut objects = criticality_settings(10, 10_000, 20, 120, "tbb");
    objects.push(isotope("fake", constant_table("fake", 1.0, 1.0, 0.0, 2.0)));
    objects.push(material("fuel", "fake", 1.0));
    objects.push(cell(1, vec![], Some("fuel"), ""));
    objects.extend(point_isotropic_source([0.0; 3], 1e6));

    let model = Model::build(objects).unwrap();
    let results = model.run().unwrap();

    assert!(
        (results.active_mean - 2.0).abs() < 0.01,
        "k = {} +/- {}, expected 2.0",
        results.active_mean,
        results.std_error
    );
    assert_eq!(results.cycles.len(), 120);
    // Every cycle's estimate sits at the fixed point too
    for &k in &results.cycles {
        assert!((k - 2.0).abs() < 0.05, "cycle k = {}", k);
    }
}

fn slab_objects(seed: u64, reflected: bool) -> Vec<keff_mc::objects::McObject> {
    let mut objects = criticality_settings(seed, 4000, 10, 40, "tbb");
    // Fuel: nu Sigma_f = 0.5, Sigma_a = 0.5, Sigma_s = 0.5 at unit density
    objects.push(isotope("fuel-iso", constant_table("fuel-iso", 0.5, 0.5, 0.0, 1.0)));
    objects.push(material("fuel", "fuel-iso", 1.0));
    objects.push(surface(1, "px", vec![0.0]));
    objects.push(surface(2, "px", vec![1.0]));
    objects.push(cell(1, vec![1, -2], Some("fuel"), ""));
    if reflected {
        // Pure scatterer on [1, 2]
        objects.push(isotope("refl-iso", constant_table("refl-iso", 0.5, 0.0, 0.0, 0.0)));
        objects.push(material("reflector", "refl-iso", 1.0));
        objects.push(surface(3, "px", vec![2.0]));
        objects.push(cell(2, vec![2, -3], Some("reflector"), ""));
    }
    objects.extend(point_isotropic_source([0.5, 0.0, 0.0], 1e6));
    objects
}

/// Two-region slab: the fuel is exactly critical in an infinite medium
/// (nu Sigma_f / Sigma_a = 1), so any finite slab is subcritical, and a
/// scattering reflector recovers part of the leakage.
#[test]
fn reflected_slab_sits_between_bare_and_infinite() {
    let bare = Model::build(slab_objects(22, false)).unwrap().run().unwrap();
    let reflected = Model::build(slab_objects(22, true)).unwrap().run().unwrap();

    assert!(
        bare.active_mean > 0.2 && bare.active_mean < 0.95,
        "bare slab k = {}",
        bare.active_mean
    );
    assert!(
        reflected.active_mean > bare.active_mean + 0.01,
        "reflector should raise k: bare {} reflected {}",
        bare.active_mean,
        reflected.active_mean
    );
    assert!(
        reflected.active_mean < 1.0,
        "finite reflected slab must stay subcritical, k = {}",
        reflected.active_mean
    );
}
