//! Concurrent runtime.
//!
//! Every honest session and the adversary run as tokio tasks over one shared
//! world. The scheduler, not the harness, decides the interleaving. Integrity
//! is checked once every task has finished.
//!
//! Tasks never block forever: a receive only waits while the world is empty,
//! and setup always publishes the directory keys, so each participant runs
//! out of budget eventually.

use std::{collections::HashSet, sync::Arc};

use dolev_core::{Environment, Item, PrincipalId, SimContext};
use dolev_handshake::{Initiator, Responder, SessionError};
use tokio::task::JoinSet;

use crate::{
    adversary::{Adversary, AdversaryAction},
    config::SimConfig,
    error::SimError,
    integrity::IntegrityChecker,
    journal::{Journal, Role, SessionEvent},
    setup::{NslWorld, Population, publish},
    simulation::{RunSummary, StepOutcome, record_accepted},
};

/// A finished concurrent run, not yet checked.
pub struct ConcurrentRun {
    /// Counters.
    pub summary: RunSummary,
    /// The world as the tasks left it.
    pub world: Arc<NslWorld>,
    /// Every session event, in recording order.
    pub journal: Arc<Journal>,
}

impl ConcurrentRun {
    /// Check the integrity properties.
    pub fn check(&self) -> Result<(), SimError> {
        IntegrityChecker::new(&self.world).check(&self.journal)?;
        Ok(())
    }
}

/// Run one concurrent simulation and check it.
pub async fn run_concurrent<E: Environment>(
    config: SimConfig,
    env: E,
) -> Result<RunSummary, SimError> {
    let run = execute_concurrent(config, env).await?;
    run.check()?;
    tracing::info!(summary = ?run.summary, "concurrent run finished");
    Ok(run.summary)
}

/// Run one concurrent simulation to completion.
///
/// Spawns `config.sessions` initiator sessions between random honest owners
/// and random directory peers, one responder per honest principal and one
/// adversary performing `config.steps` random actions.
///
/// # Errors
///
/// A model fault in any task, or a task that panicked. The remaining tasks
/// are cancelled.
pub async fn execute_concurrent<E: Environment>(
    config: SimConfig,
    env: E,
) -> Result<ConcurrentRun, SimError> {
    let population = Population::new(&config)?;
    let directory = population.directory();
    let Population { ctx, world, honest, adversary, journal } = population;

    let mut tasks = JoinSet::new();

    if !honest.is_empty() && !directory.is_empty() {
        for _ in 0..config.sessions {
            let owner = honest[env.choose(honest.len())].clone();
            let peer = directory[env.choose(directory.len())];
            let session = Initiator::new(Arc::clone(&ctx), owner, peer);
            tasks.spawn(run_initiator(
                session,
                Arc::clone(&world),
                Arc::clone(&journal),
                env.clone(),
                config.receive_budget,
            ));
        }
    }

    for credentials in honest {
        tasks.spawn(run_responder(
            Responder::new(Arc::clone(&ctx), credentials),
            Arc::clone(&world),
            Arc::clone(&journal),
            env.clone(),
            config.receive_budget,
        ));
    }

    tasks.spawn(run_adversary(adversary, Arc::clone(&world), env.clone(), config.steps));

    let mut summary = RunSummary::default();
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|err| SimError::Task { reason: err.to_string() })
            .and_then(|result| result);
        match outcome {
            Ok(part) => summary.absorb(&part),
            Err(err) => {
                tasks.abort_all();
                tracing::error!(%err, "concurrent run stopped");
                return Err(err);
            },
        }
    }

    summary.close(&journal, &world);
    Ok(ConcurrentRun { summary, world, journal })
}

async fn run_initiator<E: Environment>(
    mut session: Initiator<Arc<SimContext>>,
    world: Arc<NslWorld>,
    journal: Arc<Journal>,
    env: E,
    budget: usize,
) -> Result<RunSummary, SimError> {
    let (me, peer) = (session.principal(), session.peer());
    match session.start() {
        Ok(actions) => {
            journal.record(SessionEvent::Started { initiator: me, responder: peer });
            publish(&world, &journal, Role::Initiator, actions)?;
        },
        Err(err) => {
            abort(&journal, Role::Initiator, me, peer, err)?;
            return Ok(RunSummary::default());
        },
    }

    for _ in 0..budget {
        let item = world.receive_wait(&env).await;
        if !session.accepts(&item) {
            tokio::task::yield_now().await;
            continue;
        }

        return match session.handle(&item) {
            Ok(actions) => {
                publish(&world, &journal, Role::Initiator, actions)?;
                Ok(RunSummary::default())
            },
            Err(err) => {
                abort(&journal, Role::Initiator, me, peer, err)?;
                Ok(RunSummary::default())
            },
        };
    }

    tracing::debug!(%me, %peer, "initiator out of budget");
    Ok(RunSummary::default())
}

/// One responder serving every offer it sees.
///
/// An unseen item sealed for the responder confirms the waiting session
/// whose nonce it carries, or else is taken as a new offer. Items are
/// handled once; receiving the same offer again is not a replay.
async fn run_responder<E: Environment>(
    mut responder: Responder<Arc<SimContext>>,
    world: Arc<NslWorld>,
    journal: Arc<Journal>,
    env: E,
    budget: usize,
) -> Result<RunSummary, SimError> {
    let me = responder.principal();
    let mut seen: HashSet<Item> = HashSet::new();

    for _ in 0..budget {
        let item = world.receive_wait(&env).await;
        if !responder.accepts(&item) || !seen.insert(item.clone()) {
            tokio::task::yield_now().await;
            continue;
        }

        if let Some(session) = responder.confirming(&item) {
            let peer = responder.initiator_of(session).unwrap_or(me);
            match responder.handle(session, &item) {
                Ok(actions) => {
                    publish(&world, &journal, Role::Responder, actions)?;
                },
                Err(err) => abort(&journal, Role::Responder, me, peer, err)?,
            }
            continue;
        }

        match responder.accept(&item) {
            Ok((session, actions)) => {
                record_accepted(&journal, &responder, session);
                publish(&world, &journal, Role::Responder, actions)?;
            },
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                journal.record(SessionEvent::Rejected { responder: me, reason: err.to_string() });
            },
        }
    }

    Ok(RunSummary::default())
}

async fn run_adversary<E: Environment>(
    mut adversary: Adversary,
    world: Arc<NslWorld>,
    env: E,
    steps: usize,
) -> Result<RunSummary, SimError> {
    let mut summary = RunSummary::default();
    for _ in 0..steps {
        let action = AdversaryAction::random(&env);
        let outcome = adversary.perform(&action, &world)?;
        summary.tally(&StepOutcome::Adversary(outcome));
        tokio::task::yield_now().await;
    }
    Ok(summary)
}

fn abort(
    journal: &Journal,
    role: Role,
    owner: PrincipalId,
    peer: PrincipalId,
    err: SessionError,
) -> Result<(), SimError> {
    if err.is_fatal() {
        return Err(err.into());
    }
    journal.record(SessionEvent::Aborted { role, owner, peer, reason: err.to_string() });
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::SimEnv;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_run_holds_integrity() {
        let config = SimConfig { steps: 200, sessions: 3, ..SimConfig::default() };
        let summary = run_concurrent(config, SimEnv::with_seed(11)).await.unwrap();

        assert_eq!(summary.steps, 200);
        assert!(summary.world_items >= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn without_honest_principals_only_the_adversary_runs() {
        let config = SimConfig { honest: 0, steps: 50, ..SimConfig::default() };
        let summary = run_concurrent(config, SimEnv::with_seed(2)).await.unwrap();

        assert_eq!(summary.started, 0);
        assert_eq!(summary.steps, 50);
    }
}
