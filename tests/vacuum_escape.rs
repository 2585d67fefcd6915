// A point source in a void sphere surrounded by vacuum: every history
// streams to the boundary and leaves, so the cycle multiplies nothing.

mod common;

use common::*;
use keff_mc::Model;

#[test]
fn every_history_escapes_and_k_is_zero() {
    let mut objects = criticality_settings(7, 500, 0, 1, "tbb");
    objects.push(surface(1, "sphere", vec![0.0, 0.0, 0.0, 5.0]));
    objects.push(cell(1, vec![-1], None, "void"));
    objects.extend(point_isotropic_source([0.0; 3], 1e6));

    let model = Model::build(objects).unwrap();
    let results = model.run().unwrap();

    assert_eq!(results.cycles, vec![0.0]);
    assert_eq!(results.active_mean, 0.0);
}

#[test]
fn dead_cell_terminates_entering_histories() {
    // Same sphere, but the shell beyond it is a dead cell: histories die
    // there instead of leaking, with the same null multiplication.
    let mut objects = criticality_settings(7, 500, 0, 1, "tbb");
    objects.push(surface(1, "sphere", vec![0.0, 0.0, 0.0, 5.0]));
    objects.push(surface(2, "sphere", vec![0.0, 0.0, 0.0, 20.0]));
    objects.push(cell(1, vec![-1], None, "void"));
    objects.push(cell(2, vec![1, -2], None, "dead"));
    objects.extend(point_isotropic_source([0.0; 3], 1e6));

    let model = Model::build(objects).unwrap();
    let results = model.run().unwrap();
    assert_eq!(results.cycles, vec![0.0]);
}
