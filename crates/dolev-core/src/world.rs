//! The shared world: every item ever legitimately sent.
//!
//! The world is where the adversary lives. It only grows: items are admitted
//! once and never removed, so a receive is a read of shared state, not a
//! consuming dequeue, and many readers may get the same item.
//!
//! # Invariants
//!
//! - Admission: every item in the world satisfies the publicity oracle
//! - Monotonicity: `len()` never decreases
//! - Idempotence: sending an item twice stores it once

use std::{
    collections::HashSet,
    sync::{PoisonError, RwLock},
};

use tokio::sync::Notify;

use crate::{env::Environment, error::ChannelError, item::Item, policy::Publicity};

/// Result of a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The item was new.
    Added,
    /// The item was already in the world.
    AlreadyPresent,
}

#[derive(Debug, Default)]
struct Observed {
    /// Admission order, for index-based selection.
    items: Vec<Item>,
    index: HashSet<Item>,
}

/// Append-only channel gated by a publicity oracle.
#[derive(Debug)]
pub struct World<P> {
    policy: P,
    observed: RwLock<Observed>,
    arrivals: Notify,
}

impl<P: Publicity> World<P> {
    /// Empty world guarded by `policy`.
    pub fn new(policy: P) -> Self {
        Self { policy, observed: RwLock::new(Observed::default()), arrivals: Notify::new() }
    }

    /// The oracle guarding admission.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Publish `item`.
    ///
    /// # Errors
    ///
    /// [`ChannelError::PolicyViolation`] if `item` is not public. Callers
    /// must treat this as fatal.
    pub fn send(&self, item: Item) -> Result<Admission, ChannelError> {
        if !self.policy.is_public(&item) {
            tracing::error!(shape = %item.shape(), "refused to publish non-public item");
            return Err(ChannelError::PolicyViolation { shape: item.shape() });
        }

        let admission = {
            let mut observed = self.observed.write().unwrap_or_else(PoisonError::into_inner);
            if observed.index.contains(&item) {
                Admission::AlreadyPresent
            } else {
                observed.index.insert(item.clone());
                observed.items.push(item);
                tracing::trace!(size = observed.items.len(), "world grew");
                Admission::Added
            }
        };

        if admission == Admission::Added {
            self.arrivals.notify_waiters();
        }

        Ok(admission)
    }

    /// Number of distinct items sent so far.
    pub fn len(&self) -> usize {
        self.observed.read().unwrap_or_else(PoisonError::into_inner).items.len()
    }

    /// True before the first send.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `item` has been sent.
    pub fn contains(&self, item: &Item) -> bool {
        self.observed.read().unwrap_or_else(PoisonError::into_inner).index.contains(item)
    }

    /// Deterministic receive: the item at `selector` modulo the world size.
    ///
    /// Used by replayable schedules where the choice of item is part of the
    /// step itself.
    pub fn pick(&self, selector: usize) -> Result<Item, ChannelError> {
        let observed = self.observed.read().unwrap_or_else(PoisonError::into_inner);
        if observed.items.is_empty() {
            return Err(ChannelError::NoTraffic);
        }
        Ok(observed.items[selector % observed.items.len()].clone())
    }

    /// Nondeterministic receive: some item currently in the world.
    pub fn receive<E: Environment>(&self, env: &E) -> Result<Item, ChannelError> {
        let size = self.len();
        self.pick(env.choose(size))
    }

    /// Receive, waiting for the first send if the world is empty.
    pub async fn receive_wait<E: Environment>(&self, env: &E) -> Item {
        loop {
            // Register before checking so a concurrent send cannot slip between.
            let arrival = self.arrivals.notified();
            if let Ok(item) = self.receive(env) {
                return item;
            }
            arrival.await;
        }
    }

    /// Copy of all items in admission order.
    pub fn snapshot(&self) -> Vec<Item> {
        self.observed.read().unwrap_or_else(PoisonError::into_inner).items.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::{
        context::{KeySource, SimContext, Standing},
        item::Info,
        policy::BaselinePolicy,
    };

    #[derive(Clone, Default)]
    struct StepEnv(Arc<AtomicU64>);

    impl Environment for StepEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            let next = self.0.fetch_add(1, Ordering::SeqCst).to_be_bytes();
            for (byte, value) in buffer.iter_mut().zip(next.iter().cycle()) {
                *byte = *value;
            }
        }
    }

    fn world() -> (Arc<SimContext>, World<BaselinePolicy<Arc<SimContext>>>) {
        let ctx = Arc::new(SimContext::new());
        let world = World::new(BaselinePolicy::new(Arc::clone(&ctx)));
        (ctx, world)
    }

    #[test]
    fn send_is_idempotent() {
        let (_, world) = world();
        assert_eq!(world.send(Item::data(1)).unwrap(), Admission::Added);
        assert_eq!(world.send(Item::data(1)).unwrap(), Admission::AlreadyPresent);
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn send_rejects_secret() {
        let (ctx, world) = world();
        let good = ctx.spawn_principal(Standing::Good);
        let secret = ctx.create_keypair(good, Info::atom(0)).unwrap().private_item();

        let result = world.send(secret.clone());
        assert_eq!(result, Err(ChannelError::PolicyViolation { shape: secret.shape() }));
        assert!(!world.contains(&secret));
        assert!(world.is_empty());
    }

    #[test]
    fn receive_on_empty_world_is_no_traffic() {
        let (_, world) = world();
        assert_eq!(world.receive(&StepEnv::default()), Err(ChannelError::NoTraffic));
        assert_eq!(world.pick(3), Err(ChannelError::NoTraffic));
    }

    #[test]
    fn receive_returns_admitted_items() {
        let (_, world) = world();
        for value in 0..5 {
            world.send(Item::data(value)).unwrap();
        }

        let env = StepEnv::default();
        for _ in 0..20 {
            let item = world.receive(&env).unwrap();
            assert!(world.contains(&item));
        }
    }

    #[test]
    fn pick_wraps_selector() {
        let (_, world) = world();
        world.send(Item::data(10)).unwrap();
        world.send(Item::data(11)).unwrap();

        assert_eq!(world.pick(0).unwrap(), Item::data(10));
        assert_eq!(world.pick(3).unwrap(), Item::data(11));
        assert_eq!(world.snapshot(), vec![Item::data(10), Item::data(11)]);
    }

    #[test]
    fn receive_is_not_consuming() {
        let (_, world) = world();
        world.send(Item::data(9)).unwrap();

        let env = StepEnv::default();
        assert_eq!(world.receive(&env).unwrap(), Item::data(9));
        assert_eq!(world.receive(&env).unwrap(), Item::data(9));
        assert_eq!(world.len(), 1);
    }

    #[tokio::test]
    async fn receive_wait_blocks_until_first_send() {
        let (_, world) = world();
        let world = Arc::new(world);

        let reader = {
            let world = Arc::clone(&world);
            tokio::spawn(async move { world.receive_wait(&StepEnv::default()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!reader.is_finished());

        world.send(Item::data(77)).unwrap();
        let item = tokio::time::timeout(Duration::from_secs(1), reader).await.unwrap().unwrap();
        assert_eq!(item, Item::data(77));
    }
}
