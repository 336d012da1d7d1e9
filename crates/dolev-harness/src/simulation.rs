//! Deterministic step simulation.
//!
//! A run is a sequence of [`Step`]s. Each step is one move of one party:
//! an honest delivery or one adversary action. Any interleaving of honest
//! sessions and adversary moves is some step sequence, so proptest and the
//! fuzzer explore interleavings by generating steps.
//!
//! Selectors in steps are resolved modulo whatever they select from, so every
//! generated step is valid or skipped, never an error.
//!
//! ```text
//! Vec<Step> ──apply──> Simulation ──check──> IntegrityChecker
//!                      │  initiators, responders
//!                      │  adversary
//!                      └─ World (shared, append-only)
//! ```

use std::sync::Arc;

use arbitrary::Arbitrary;
use dolev_core::{Environment, Item, PrincipalId, SimContext};
use dolev_handshake::{
    Credentials, Initiator, InitiatorState, Responder, SessionAction, SessionError, SessionId,
    SessionKeys,
};
use serde::{Deserialize, Serialize};

use crate::{
    adversary::{ActionOutcome, Adversary, AdversaryAction, Selector},
    config::SimConfig,
    error::SimError,
    integrity::IntegrityChecker,
    journal::{Journal, Role, SessionEvent},
    setup::{NslWorld, Population, publish},
};

/// One scheduling decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Arbitrary, Serialize, Deserialize)]
pub enum Step {
    /// An honest principal opens a session towards a directory principal.
    StartSession {
        /// Honest principal, modulo the honest count.
        initiator: u8,
        /// Peer, modulo the directory size.
        peer: u8,
    },

    /// Deliver a world item sealed for its owner to an initiator session.
    DeliverToInitiator {
        /// Session, modulo the number started.
        session: u8,
        /// Item, modulo the candidates.
        item: Selector,
    },

    /// Deliver a world item sealed for a responder as a new offer.
    DeliverToResponder {
        /// Honest principal, modulo the honest count.
        responder: u8,
        /// Item, modulo the candidates.
        item: Selector,
    },

    /// Deliver a world item to a responder session waiting for confirmation.
    ContinueResponder {
        /// Honest principal, modulo the honest count.
        responder: u8,
        /// Pending session, modulo the number pending.
        session: u8,
        /// Item, modulo the candidates.
        item: Selector,
    },

    /// One adversary move.
    Adversary(AdversaryAction),
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A session advanced without completing.
    Progressed,
    /// A session completed.
    Established(SessionKeys),
    /// A session ended, or an offer was refused.
    SessionFailed(SessionError),
    /// The adversary acted.
    Adversary(ActionOutcome),
    /// Nothing to do for this step.
    Skipped,
}

/// Counters over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Steps (or adversary actions) executed.
    pub steps: usize,
    /// Steps with nothing to do.
    pub skipped: usize,
    /// Initiator sessions that sent an offer.
    pub started: usize,
    /// Offers accepted by responders.
    pub accepted: usize,
    /// Initiator sessions established.
    pub initiator_established: usize,
    /// Responder sessions established.
    pub responder_established: usize,
    /// Sessions aborted on either side.
    pub aborted: usize,
    /// Adversary attempts performed.
    pub adversary_performed: usize,
    /// Adversary attempts abandoned.
    pub adversary_abandoned: usize,
    /// Distinct items in the world at the end.
    pub world_items: usize,
}

impl RunSummary {
    pub(crate) fn tally(&mut self, outcome: &StepOutcome) {
        self.steps += 1;
        match outcome {
            StepOutcome::Skipped => self.skipped += 1,
            StepOutcome::Adversary(ActionOutcome::Performed { .. }) => {
                self.adversary_performed += 1;
            },
            StepOutcome::Adversary(ActionOutcome::Abandoned(_)) => self.adversary_abandoned += 1,
            StepOutcome::Progressed
            | StepOutcome::Established(_)
            | StepOutcome::SessionFailed(_) => {},
        }
    }

    pub(crate) fn absorb(&mut self, part: &Self) {
        self.steps += part.steps;
        self.skipped += part.skipped;
        self.adversary_performed += part.adversary_performed;
        self.adversary_abandoned += part.adversary_abandoned;
    }

    pub(crate) fn close(&mut self, journal: &Journal, world: &NslWorld) {
        self.started = journal.started();
        self.accepted = journal.accepted();
        self.initiator_established = journal.established(Role::Initiator).len();
        self.responder_established = journal.established(Role::Responder).len();
        self.aborted = journal.aborted();
        self.world_items = world.len();
    }
}

/// Step-driven model of honest parties, adversary and world.
pub struct Simulation {
    config: SimConfig,
    ctx: Arc<SimContext>,
    world: Arc<NslWorld>,
    journal: Arc<Journal>,
    adversary: Adversary,
    initiators: Vec<Initiator<Arc<SimContext>>>,
    responders: Vec<Responder<Arc<SimContext>>>,
    summary: RunSummary,
}

impl Simulation {
    /// Fresh run: principals spawned, directory keys published, no sessions.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let Population { ctx, world, honest, adversary, journal } = Population::new(&config)?;
        let responders = honest
            .into_iter()
            .map(|credentials| Responder::new(Arc::clone(&ctx), credentials))
            .collect();

        Ok(Self {
            config,
            ctx,
            world,
            journal,
            adversary,
            initiators: Vec::new(),
            responders,
            summary: RunSummary::default(),
        })
    }

    /// The shared world.
    pub fn world(&self) -> &NslWorld {
        &self.world
    }

    /// The session journal.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Good principals running sessions, in spawn order.
    pub fn honest(&self) -> Vec<PrincipalId> {
        self.responders.iter().map(Responder::principal).collect()
    }

    /// Principals the adversary controls.
    pub fn adversary_principals(&self) -> Vec<PrincipalId> {
        self.adversary.principals()
    }

    /// State of the `index`th initiator session.
    pub fn initiator_state(&self, index: usize) -> Option<&InitiatorState> {
        self.initiators.get(index).map(Initiator::state)
    }

    /// Responder run by the `index`th honest principal.
    pub fn responder(&self, index: usize) -> Option<&Responder<Arc<SimContext>>> {
        self.responders.get(index)
    }

    /// Counters so far.
    pub fn summary(&self) -> RunSummary {
        let mut summary = self.summary.clone();
        summary.close(&self.journal, &self.world);
        summary
    }

    /// Apply one step.
    ///
    /// # Errors
    ///
    /// Only model faults: the world refused an item an honest party or the
    /// adversary derived. Everything else is a [`StepOutcome`].
    pub fn apply(&mut self, step: &Step) -> Result<StepOutcome, SimError> {
        let outcome = match step {
            Step::StartSession { initiator, peer } => self.start_session(*initiator, *peer)?,
            Step::DeliverToInitiator { session, item } => {
                self.deliver_to_initiator(*session, *item)?
            },
            Step::DeliverToResponder { responder, item } => {
                self.deliver_to_responder(*responder, *item)?
            },
            Step::ContinueResponder { responder, session, item } => {
                self.continue_responder(*responder, *session, *item)?
            },
            Step::Adversary(action) => {
                StepOutcome::Adversary(self.adversary.perform(action, &self.world)?)
            },
        };

        self.summary.tally(&outcome);
        Ok(outcome)
    }

    /// Check the integrity properties against the current state.
    pub fn check(&self) -> Result<(), SimError> {
        IntegrityChecker::new(&self.world).check(&self.journal)?;
        Ok(())
    }

    /// Run `steps` scheduler steps drawn from `env`, then check integrity.
    pub fn run_random<E: Environment>(
        &mut self,
        env: &E,
        steps: usize,
    ) -> Result<RunSummary, SimError> {
        for _ in 0..steps {
            let step = self.random_step(env);
            self.apply(&step)?;
        }

        self.check()?;
        let summary = self.summary();
        tracing::info!(?summary, "step run finished");
        Ok(summary)
    }

    /// Draw one step, weighing adversary moves against honest deliveries.
    pub fn random_step<E: Environment>(&self, env: &E) -> Step {
        let total = self.config.adversary_weight + self.config.delivery_weight;
        if env.chance(self.config.adversary_weight, total) {
            return Step::Adversary(AdversaryAction::random(env));
        }

        let small = || (env.random_u64() & 0xff) as u8;
        let item = || (env.random_u64() & u64::from(u16::MAX)) as Selector;
        match env.choose(7) {
            0 => Step::StartSession { initiator: small(), peer: small() },
            1 | 2 => Step::DeliverToResponder { responder: small(), item: item() },
            3 | 4 => Step::DeliverToInitiator { session: small(), item: item() },
            _ => Step::ContinueResponder { responder: small(), session: small(), item: item() },
        }
    }

    fn start_session(&mut self, initiator: u8, peer: u8) -> Result<StepOutcome, SimError> {
        let directory = self.ctx.published_keys();
        if self.responders.is_empty() || directory.is_empty() {
            return Ok(StepOutcome::Skipped);
        }

        let owner = &self.responders[usize::from(initiator) % self.responders.len()];
        let credentials = self.ctx.long_term_keys(owner.principal())?;
        let peer = directory[usize::from(peer) % directory.len()].creator();

        let mut session = Initiator::new(
            Arc::clone(&self.ctx),
            Credentials::from_keypair(&credentials),
            peer,
        );
        let result = session.start();
        let me = session.principal();
        self.initiators.push(session);

        match result {
            Ok(actions) => {
                self.journal.record(SessionEvent::Started { initiator: me, responder: peer });
                publish(&self.world, &self.journal, Role::Initiator, actions)?;
                Ok(StepOutcome::Progressed)
            },
            Err(err) => self.session_failed(Role::Initiator, me, peer, err),
        }
    }

    fn deliver_to_initiator(
        &mut self,
        session: u8,
        item: Selector,
    ) -> Result<StepOutcome, SimError> {
        if self.initiators.is_empty() {
            return Ok(StepOutcome::Skipped);
        }

        let index = usize::from(session) % self.initiators.len();
        let initiator = &mut self.initiators[index];
        let Some(message) = select(&self.world, item, |candidate| initiator.accepts(candidate))
        else {
            return Ok(StepOutcome::Skipped);
        };

        let (me, peer) = (initiator.principal(), initiator.peer());
        match initiator.handle(&message) {
            Ok(actions) => self.completed(Role::Initiator, actions),
            Err(err) => self.session_failed(Role::Initiator, me, peer, err),
        }
    }

    fn deliver_to_responder(
        &mut self,
        responder: u8,
        item: Selector,
    ) -> Result<StepOutcome, SimError> {
        if self.responders.is_empty() {
            return Ok(StepOutcome::Skipped);
        }

        let index = usize::from(responder) % self.responders.len();
        let responder = &mut self.responders[index];
        let Some(message) = select(&self.world, item, |candidate| responder.accepts(candidate))
        else {
            return Ok(StepOutcome::Skipped);
        };

        let me = responder.principal();
        match responder.accept(&message) {
            Ok((session, actions)) => {
                record_accepted(&self.journal, responder, session);
                publish(&self.world, &self.journal, Role::Responder, actions)?;
                Ok(StepOutcome::Progressed)
            },
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => {
                self.journal
                    .record(SessionEvent::Rejected { responder: me, reason: err.to_string() });
                Ok(StepOutcome::SessionFailed(err))
            },
        }
    }

    fn continue_responder(
        &mut self,
        responder: u8,
        session: u8,
        item: Selector,
    ) -> Result<StepOutcome, SimError> {
        if self.responders.is_empty() {
            return Ok(StepOutcome::Skipped);
        }

        let index = usize::from(responder) % self.responders.len();
        let responder = &mut self.responders[index];
        let pending = responder.pending();
        if pending.is_empty() {
            return Ok(StepOutcome::Skipped);
        }

        let session = pending[usize::from(session) % pending.len()];
        let Some(message) = select(&self.world, item, |candidate| responder.accepts(candidate))
        else {
            return Ok(StepOutcome::Skipped);
        };

        let me = responder.principal();
        let peer = responder.initiator_of(session).unwrap_or(me);
        match responder.handle(session, &message) {
            Ok(actions) => self.completed(Role::Responder, actions),
            Err(err) => self.session_failed(Role::Responder, me, peer, err),
        }
    }

    fn completed(
        &self,
        role: Role,
        actions: Vec<SessionAction>,
    ) -> Result<StepOutcome, SimError> {
        match publish(&self.world, &self.journal, role, actions)? {
            Some(keys) => Ok(StepOutcome::Established(keys)),
            None => Ok(StepOutcome::Progressed),
        }
    }

    fn session_failed(
        &self,
        role: Role,
        owner: PrincipalId,
        peer: PrincipalId,
        err: SessionError,
    ) -> Result<StepOutcome, SimError> {
        if err.is_fatal() {
            return Err(err.into());
        }

        self.journal.record(SessionEvent::Aborted { role, owner, peer, reason: err.to_string() });
        Ok(StepOutcome::SessionFailed(err))
    }
}

/// Pick among world items satisfying `wanted`, modulo their number.
pub(crate) fn select(
    world: &NslWorld,
    selector: Selector,
    wanted: impl Fn(&Item) -> bool,
) -> Option<Item> {
    let candidates: Vec<Item> = world.snapshot().into_iter().filter(|item| wanted(item)).collect();
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[usize::from(selector) % candidates.len()].clone())
}

pub(crate) fn record_accepted(
    journal: &Journal,
    responder: &Responder<Arc<SimContext>>,
    session: SessionId,
) {
    if let Some((initiator_nonce, responder_nonce)) = responder.nonces(session) {
        journal.record(SessionEvent::Accepted {
            responder: responder.principal(),
            initiator: responder.initiator_of(session).unwrap_or_else(|| responder.principal()),
            initiator_nonce: Item::Key(initiator_nonce.clone()),
            responder_nonce: Item::Key(responder_nonce.clone()),
        });
    }
}
