//! Operating-system entropy.

use dolev_core::Environment;

/// Environment backed by `getrandom`.
///
/// Only used to draw a run seed when none is given; the run itself always
/// uses a seeded environment so the seed can be reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Seeds are not secrets; zeros still give a reproducible run.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn system_env_choose_stays_in_range() {
        let env = SystemEnv::new();
        for upper in 1..50 {
            assert!(env.choose(upper) < upper);
        }
    }
}
