//! The adversary engine.
//!
//! The adversary may do anything an honest party can do, applied to whatever
//! is in the world: pair, split, encrypt, decrypt. On top of that it controls
//! principals it spawns, and the bad ones leak every key they create.
//!
//! Every action reads its inputs from the world and sends its results back,
//! so the oracle checks the adversary exactly as it checks honest parties.
//! If the oracle is sound, no action can ever be refused.
//!
//! # Invariants
//!
//! - A failed attempt (wrong shape, wrong key, empty world) abandons that
//!   attempt only; the engine keeps going
//! - Only bad principals leak keys
//! - A refused send is a model fault and is returned as an error

use std::sync::Arc;

use arbitrary::Arbitrary;
use dolev_core::{
    Admission, AlgebraError, ChannelError, ContextError, Environment, Info, Item, KeyPair,
    KeySource, PrincipalId, Publicity, SimContext, Standing, World,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Item selector. Resolved modulo the world size when the action runs.
pub type Selector = u16;

/// One adversary move.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Arbitrary, Serialize, Deserialize)]
pub enum AdversaryAction {
    /// Spawn a principal with a fixed standing.
    ///
    /// Bad principals get directory keys so honest parties can talk to them.
    SpawnPrincipal {
        /// Standing of the new principal.
        standing: Standing,
    },

    /// Create a fresh keypair and publish both halves.
    LeakKeypair {
        /// Controlled principal, modulo the number controlled.
        principal: u8,
        /// Tag of the new keypair; any value is allowed.
        info: Info,
    },

    /// Publish the private directory key of a controlled principal.
    LeakDirectoryKey {
        /// Controlled principal, modulo the number controlled.
        principal: u8,
    },

    /// Publish a data item.
    PublishData {
        /// Payload.
        value: u64,
    },

    /// Publish the pair of two world items.
    Pair {
        /// First component.
        first: Selector,
        /// Second component.
        second: Selector,
    },

    /// Seal a world item under a world key.
    Encrypt {
        /// Must select a public key.
        key: Selector,
        /// Payload.
        payload: Selector,
    },

    /// Publish both halves of a world pair.
    Split {
        /// Must select a pair.
        pair: Selector,
    },

    /// Open a world ciphertext with a world key.
    Decrypt {
        /// Must select the matching private key.
        key: Selector,
        /// Must select a ciphertext.
        sealed: Selector,
    },
}

impl AdversaryAction {
    /// Draw an action from `env`.
    ///
    /// Spawning is rare; the algebra moves dominate. Tags are small so that
    /// forged tags collide with protocol tags often enough to matter.
    pub fn random<E: Environment>(env: &E) -> Self {
        let selector = || (env.random_u64() & u64::from(u16::MAX)) as Selector;
        let principal = || (env.random_u64() & 0xff) as u8;

        match env.choose(20) {
            0 => Self::SpawnPrincipal {
                standing: if env.chance(1, 2) { Standing::Bad } else { Standing::Good },
            },
            1 | 2 => Self::LeakKeypair { principal: principal(), info: random_info(env) },
            3 => Self::LeakDirectoryKey { principal: principal() },
            4 | 5 => Self::PublishData { value: env.random_u64() % 16 },
            6..=9 => Self::Pair { first: selector(), second: selector() },
            10..=13 => Self::Encrypt { key: selector(), payload: selector() },
            14..=16 => Self::Split { pair: selector() },
            _ => Self::Decrypt { key: selector(), sealed: selector() },
        }
    }
}

fn random_info<E: Environment>(env: &E) -> Info {
    match env.choose(3) {
        0 => Info::atom(env.random_u64() % 4),
        1 => Info::pair(Info::atom(env.choose(3) as u64), Info::atom(env.choose(8) as u64)),
        _ => Info::pair(
            Info::atom(env.choose(3) as u64),
            Info::pair(Info::atom(env.choose(8) as u64), Info::atom(env.choose(8) as u64)),
        ),
    }
}

/// Why an attempt was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Abandoned {
    /// Nothing to receive yet.
    #[error("world is empty")]
    NoTraffic,

    /// The adversary controls no principal.
    #[error("no controlled principal")]
    NoPrincipal,

    /// Good principals do not leak.
    #[error("{0} is good and keeps its keys")]
    GoodPrincipal(PrincipalId),

    /// The principal has no directory keypair.
    #[error("{0} has no directory keys")]
    NoDirectoryKey(PrincipalId),

    /// Wrong shape, direction or key.
    #[error("algebra: {0}")]
    Algebra(#[from] AlgebraError),

    /// Key generation failed.
    #[error("context: {0}")]
    Context(#[from] ContextError),
}

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Items were sent; `added` of them were new to the world.
    Performed {
        /// Newly admitted items.
        added: usize,
    },
    /// The attempt failed harmlessly.
    Abandoned(Abandoned),
}

#[derive(Debug, Clone)]
struct Controlled {
    id: PrincipalId,
    standing: Standing,
    directory: Option<KeyPair>,
}

/// The adversary and the principals it controls.
#[derive(Debug)]
pub struct Adversary {
    ctx: Arc<SimContext>,
    directory_info: Info,
    controlled: Vec<Controlled>,
}

impl Adversary {
    /// Adversary spawning directory keys tagged `directory_info`.
    pub fn new(ctx: Arc<SimContext>, directory_info: Info) -> Self {
        Self { ctx, directory_info, controlled: Vec::new() }
    }

    /// Take control of an existing bad principal and its directory keys.
    pub fn adopt(&mut self, keys: KeyPair) {
        let id = keys.identity().0;
        self.controlled.push(Controlled { id, standing: Standing::Bad, directory: Some(keys) });
    }

    /// Principals under control, in spawn order.
    pub fn principals(&self) -> Vec<PrincipalId> {
        self.controlled.iter().map(|c| c.id).collect()
    }

    /// Run one action against `world`.
    ///
    /// # Errors
    ///
    /// [`ChannelError::PolicyViolation`] if the world refuses a derived item.
    /// That means the oracle is unsound and the run must stop.
    pub fn perform<P: Publicity>(
        &mut self,
        action: &AdversaryAction,
        world: &World<P>,
    ) -> Result<ActionOutcome, ChannelError> {
        let items = match self.derive(action, world) {
            Ok(items) => items,
            Err(reason) => {
                tracing::warn!(?action, %reason, "abandoned adversary attempt");
                return Ok(ActionOutcome::Abandoned(reason));
            },
        };

        let mut added = 0;
        for item in items {
            if world.send(item)? == Admission::Added {
                added += 1;
            }
        }

        tracing::debug!(?action, added, "adversary acted");
        Ok(ActionOutcome::Performed { added })
    }

    fn derive<P: Publicity>(
        &mut self,
        action: &AdversaryAction,
        world: &World<P>,
    ) -> Result<Vec<Item>, Abandoned> {
        let receive = |selector: Selector| {
            world.pick(usize::from(selector)).map_err(|_| Abandoned::NoTraffic)
        };

        match action {
            AdversaryAction::SpawnPrincipal { standing } => self.spawn(*standing),
            AdversaryAction::LeakKeypair { principal, info } => {
                let owner = self.leaker(*principal)?;
                let keys = self.ctx.create_keypair(owner.id, info.clone())?;
                Ok(vec![keys.public_item(), keys.private_item()])
            },
            AdversaryAction::LeakDirectoryKey { principal } => {
                let owner = self.leaker(*principal)?;
                let keys = owner.directory.as_ref().ok_or(Abandoned::NoDirectoryKey(owner.id))?;
                Ok(vec![keys.private_item()])
            },
            AdversaryAction::PublishData { value } => Ok(vec![Item::data(*value)]),
            AdversaryAction::Pair { first, second } => {
                Ok(vec![Item::pair(receive(*first)?, receive(*second)?)])
            },
            AdversaryAction::Encrypt { key, payload } => {
                let key = receive(*key)?;
                Ok(vec![Item::encrypt(&key, receive(*payload)?)?])
            },
            AdversaryAction::Split { pair } => {
                let pair = receive(*pair)?;
                let (first, second) = pair.split()?;
                Ok(vec![first.clone(), second.clone()])
            },
            AdversaryAction::Decrypt { key, sealed } => {
                let key = receive(*key)?;
                Ok(vec![Item::decrypt(&key, &receive(*sealed)?)?])
            },
        }
    }

    fn spawn(&mut self, standing: Standing) -> Result<Vec<Item>, Abandoned> {
        let id = self.ctx.spawn_principal(standing);
        let directory = match standing {
            Standing::Bad => {
                Some(self.ctx.register_long_term_keys(id, self.directory_info.clone())?)
            },
            Standing::Good => None,
        };

        let published = directory.iter().map(KeyPair::public_item).collect();
        self.controlled.push(Controlled { id, standing, directory });
        Ok(published)
    }

    fn leaker(&self, selector: u8) -> Result<&Controlled, Abandoned> {
        if self.controlled.is_empty() {
            return Err(Abandoned::NoPrincipal);
        }

        let owner = &self.controlled[usize::from(selector) % self.controlled.len()];
        match owner.standing {
            Standing::Bad => Ok(owner),
            Standing::Good => Err(Abandoned::GoodPrincipal(owner.id)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dolev_core::{BaselinePolicy, Standings};

    use super::*;
    use crate::SimEnv;

    fn setup() -> (Arc<SimContext>, World<BaselinePolicy<Arc<SimContext>>>, Adversary) {
        let ctx = Arc::new(SimContext::new());
        let world = World::new(BaselinePolicy::new(Arc::clone(&ctx)));
        let adversary = Adversary::new(Arc::clone(&ctx), Info::atom(0));
        (ctx, world, adversary)
    }

    fn performed(outcome: ActionOutcome) -> usize {
        let ActionOutcome::Performed { added } = outcome else {
            unreachable!("expected performed, got {outcome:?}");
        };
        added
    }

    #[test]
    fn spawn_bad_publishes_directory_key() {
        let (ctx, world, mut adversary) = setup();
        let outcome = adversary
            .perform(&AdversaryAction::SpawnPrincipal { standing: Standing::Bad }, &world)
            .unwrap();

        assert_eq!(performed(outcome), 1);
        let id = adversary.principals()[0];
        assert!(ctx.is_bad(id));
        assert!(world.contains(&ctx.long_term_keys(id).unwrap().public_item()));
    }

    #[test]
    fn good_principal_does_not_leak() {
        let (_, world, mut adversary) = setup();
        adversary
            .perform(&AdversaryAction::SpawnPrincipal { standing: Standing::Good }, &world)
            .unwrap();

        let outcome = adversary
            .perform(&AdversaryAction::LeakKeypair { principal: 0, info: Info::atom(1) }, &world)
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Abandoned(Abandoned::GoodPrincipal(_))));
        assert!(world.is_empty());
    }

    #[test]
    fn leak_without_principal_is_abandoned() {
        let (_, world, mut adversary) = setup();
        let outcome = adversary
            .perform(&AdversaryAction::LeakKeypair { principal: 3, info: Info::atom(1) }, &world)
            .unwrap();
        assert_eq!(outcome, ActionOutcome::Abandoned(Abandoned::NoPrincipal));
    }

    #[test]
    fn bad_principal_leaks_both_halves() {
        let (_, world, mut adversary) = setup();
        adversary
            .perform(&AdversaryAction::SpawnPrincipal { standing: Standing::Bad }, &world)
            .unwrap();

        let outcome = adversary
            .perform(&AdversaryAction::LeakKeypair { principal: 9, info: Info::atom(1) }, &world)
            .unwrap();
        assert_eq!(performed(outcome), 2);

        let outcome =
            adversary.perform(&AdversaryAction::LeakDirectoryKey { principal: 0 }, &world).unwrap();
        assert_eq!(performed(outcome), 1);
        assert_eq!(world.len(), 4);
    }

    #[test]
    fn algebra_moves_compose() {
        let (_, world, mut adversary) = setup();
        adversary
            .perform(&AdversaryAction::SpawnPrincipal { standing: Standing::Bad }, &world)
            .unwrap();
        adversary
            .perform(&AdversaryAction::LeakDirectoryKey { principal: 0 }, &world)
            .unwrap();
        adversary.perform(&AdversaryAction::PublishData { value: 5 }, &world).unwrap();

        // World: [pk, sk, data(5)]
        let sealed = adversary
            .perform(&AdversaryAction::Encrypt { key: 0, payload: 2 }, &world)
            .unwrap();
        assert_eq!(performed(sealed), 1);

        // World: [pk, sk, data(5), {5}_pk]
        let opened =
            adversary.perform(&AdversaryAction::Decrypt { key: 1, sealed: 3 }, &world).unwrap();
        assert_eq!(performed(opened), 0, "payload was already public");

        let paired =
            adversary.perform(&AdversaryAction::Pair { first: 2, second: 3 }, &world).unwrap();
        assert_eq!(performed(paired), 1);

        let split = adversary.perform(&AdversaryAction::Split { pair: 4 }, &world).unwrap();
        assert_eq!(performed(split), 0);
        assert_eq!(world.len(), 5);
    }

    #[test]
    fn wrong_shapes_abandon_only_the_attempt() {
        let (_, world, mut adversary) = setup();
        let empty = adversary.perform(&AdversaryAction::Split { pair: 0 }, &world).unwrap();
        assert_eq!(empty, ActionOutcome::Abandoned(Abandoned::NoTraffic));

        adversary.perform(&AdversaryAction::PublishData { value: 1 }, &world).unwrap();

        let split = adversary.perform(&AdversaryAction::Split { pair: 0 }, &world).unwrap();
        assert!(matches!(split, ActionOutcome::Abandoned(Abandoned::Algebra(_))));

        let sealed =
            adversary.perform(&AdversaryAction::Encrypt { key: 0, payload: 0 }, &world).unwrap();
        assert!(matches!(sealed, ActionOutcome::Abandoned(Abandoned::Algebra(_))));

        let opened =
            adversary.perform(&AdversaryAction::Decrypt { key: 0, sealed: 0 }, &world).unwrap();
        assert!(matches!(opened, ActionOutcome::Abandoned(Abandoned::Algebra(_))));

        // Still acting afterwards.
        let data = adversary.perform(&AdversaryAction::PublishData { value: 2 }, &world).unwrap();
        assert_eq!(performed(data), 1);
    }

    #[test]
    fn random_actions_never_fault_under_baseline_policy() {
        let (_, world, mut adversary) = setup();
        let env = SimEnv::with_seed(42);

        for _ in 0..500 {
            let action = AdversaryAction::random(&env);
            adversary.perform(&action, &world).unwrap();
        }
        assert!(!world.is_empty());
    }
}
