//! Run configuration.

use serde::{Deserialize, Serialize};

/// Size and scheduling of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Good principals, each running an initiator and a responder.
    pub honest: usize,

    /// Bad principals handed to the adversary at setup.
    pub bad: usize,

    /// Scheduler steps in step mode; adversary actions in concurrent mode.
    pub steps: usize,

    /// Initiator sessions started by the concurrent runtime.
    pub sessions: usize,

    /// Relative weight of adversary actions in the scheduler.
    pub adversary_weight: u32,

    /// Relative weight of honest deliveries in the scheduler.
    pub delivery_weight: u32,

    /// Receives each concurrent participant may make before giving up.
    pub receive_budget: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            honest: 2,
            bad: 1,
            steps: 500,
            sessions: 4,
            adversary_weight: 3,
            delivery_weight: 5,
            receive_budget: 256,
        }
    }
}
