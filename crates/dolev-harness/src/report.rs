//! Run reports.
//!
//! A report is everything needed to understand a run after the fact: the
//! seed and configuration to replay it, the final world, the session journal
//! and the verdict. Reports are CBOR so items keep their structure.

use dolev_core::{CodecError, Item, Publicity, World, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::SimConfig,
    integrity::IntegrityChecker,
    journal::{Journal, SessionEvent},
    simulation::RunSummary,
};

/// Outcome of the integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Every property held.
    Holds,
    /// A property broke.
    Violated {
        /// The violation, rendered.
        reason: String,
    },
}

/// Replayable record of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Seed of the run's environment.
    pub seed: u64,
    /// Configuration of the run.
    pub config: SimConfig,
    /// Counters.
    pub summary: RunSummary,
    /// Final world, in admission order.
    pub world: Vec<Item>,
    /// Session journal, in recording order.
    pub sessions: Vec<SessionEvent>,
    /// Integrity verdict.
    pub verdict: Verdict,
}

impl RunReport {
    /// Report on `world` and `journal`, checking integrity as it goes.
    pub fn new<P: Publicity>(
        seed: u64,
        config: SimConfig,
        summary: RunSummary,
        world: &World<P>,
        journal: &Journal,
    ) -> Self {
        let verdict = match IntegrityChecker::new(world).check(journal) {
            Ok(()) => Verdict::Holds,
            Err(violation) => Verdict::Violated { reason: violation.to_string() },
        };

        Self {
            seed,
            config,
            summary,
            world: world.snapshot(),
            sessions: journal.events(),
            verdict,
        }
    }

    /// True if every property held.
    pub fn holds(&self) -> bool {
        self.verdict == Verdict::Holds
    }

    /// Encode as CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>, CodecError> {
        encode(self)
    }

    /// Decode from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, CodecError> {
        decode(bytes)
    }
}
