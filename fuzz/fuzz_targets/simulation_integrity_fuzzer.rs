//! Fuzz target for the step simulation.
//!
//! Every interleaving of honest sessions and adversary moves is a step
//! sequence, so coverage-guided step sequences search for attacks.
//!
//! # Invariants
//!
//! - No step is ever refused by the world (the oracle is sound)
//! - Integrity holds after every step, not only at the end
//! - Initiators never establish more sessions than they started

#![no_main]

use arbitrary::Arbitrary;
use dolev_harness::{SimConfig, Simulation, Step};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    honest: u8,
    bad: u8,
    steps: Vec<Step>,
}

fuzz_target!(|input: FuzzInput| {
    let config = SimConfig {
        honest: usize::from(input.honest % 4) + 1,
        bad: usize::from(input.bad % 3),
        ..SimConfig::default()
    };
    let mut sim = match Simulation::new(config) {
        Ok(sim) => sim,
        Err(err) => panic!("setup failed: {err}"),
    };

    for step in input.steps.iter().take(256) {
        if let Err(err) = sim.apply(step) {
            panic!("model fault at {step:?}: {err}");
        }
        if let Err(err) = sim.check() {
            panic!("integrity broken after {step:?}: {err}");
        }
    }

    let summary = sim.summary();
    assert!(summary.initiator_established <= summary.started);
    assert!(summary.responder_established <= summary.accepted);
});
