//! Run setup shared by step mode and the concurrent runtime.

use std::sync::Arc;

use dolev_core::{Item, KeyItem, PrincipalId, Publicity, SimContext, Standing, World};
use dolev_handshake::{
    Credentials, NonceTag, NslPolicy, SessionAction, SessionError, SessionKeys,
};

use crate::{
    adversary::Adversary,
    config::SimConfig,
    error::SimError,
    journal::{Journal, Role, SessionEvent},
};

/// The world every run uses: guarded by the handshake policy.
pub type NslWorld = World<NslPolicy<Arc<SimContext>>>;

/// Principals, keys, world and adversary at the start of a run.
pub struct Population {
    /// Counters, standing and directory.
    pub ctx: Arc<SimContext>,
    /// The shared channel.
    pub world: Arc<NslWorld>,
    /// Good principals with their directory credentials.
    pub honest: Vec<Credentials>,
    /// The adversary, already controlling the configured bad principals.
    pub adversary: Adversary,
    /// Where sessions report.
    pub journal: Arc<Journal>,
}

impl Population {
    /// Spawn `config.honest` good and `config.bad` bad principals, register
    /// their directory keys and publish every public directory key.
    pub fn new(config: &SimConfig) -> Result<Self, SimError> {
        let ctx = Arc::new(SimContext::new());
        let directory_info = NonceTag::Encryption.to_info();

        let mut honest = Vec::with_capacity(config.honest);
        for _ in 0..config.honest {
            let id = ctx.spawn_principal(Standing::Good);
            let keys = ctx.register_long_term_keys(id, directory_info.clone())?;
            honest.push(Credentials::from_keypair(&keys));
        }

        let mut adversary = Adversary::new(Arc::clone(&ctx), directory_info.clone());
        for _ in 0..config.bad {
            let id = ctx.spawn_principal(Standing::Bad);
            adversary.adopt(ctx.register_long_term_keys(id, directory_info.clone())?);
        }

        let world = Arc::new(World::new(NslPolicy::new(Arc::clone(&ctx))));
        for key in ctx.published_keys() {
            world.send(Item::Key(key))?;
        }

        tracing::info!(
            honest = config.honest,
            bad = config.bad,
            world = world.len(),
            "population ready"
        );
        Ok(Self { ctx, world, honest, adversary, journal: Arc::new(Journal::new()) })
    }

    /// Every principal with a directory key, in id order.
    pub fn directory(&self) -> Vec<PrincipalId> {
        self.ctx.published_keys().iter().map(KeyItem::creator).collect()
    }
}

/// Carry out session actions: send items, journal completions.
///
/// Returns the shared secret if the actions completed the session.
pub(crate) fn publish<P: Publicity>(
    world: &World<P>,
    journal: &Journal,
    role: Role,
    actions: Vec<SessionAction>,
) -> Result<Option<SessionKeys>, SessionError> {
    let mut established = None;
    for action in actions {
        match action {
            SessionAction::Send(item) => {
                world.send(item)?;
            },
            SessionAction::Established(keys) => {
                journal.record(SessionEvent::Established { role, keys: keys.clone() });
                established = Some(keys);
            },
        }
    }
    Ok(established)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dolev_core::Standings;

    use super::*;

    #[test]
    fn population_publishes_directory_keys() {
        let config = SimConfig { honest: 3, bad: 2, ..SimConfig::default() };
        let population = Population::new(&config).unwrap();

        assert_eq!(population.honest.len(), 3);
        assert_eq!(population.adversary.principals().len(), 2);
        assert_eq!(population.world.len(), 5);

        let mut expected: Vec<_> =
            population.honest.iter().map(Credentials::principal).collect();
        expected.extend(population.adversary.principals());
        assert_eq!(population.directory(), expected);

        for principal in population.adversary.principals() {
            assert!(population.ctx.is_bad(principal));
        }
        for credentials in &population.honest {
            assert!(!population.ctx.is_bad(credentials.principal()));
        }
    }
}
