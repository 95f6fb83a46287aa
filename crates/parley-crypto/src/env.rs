//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (wall clock, randomness).
//! Production code uses [`SystemEnv`]; tests use a seeded environment so key
//! generation and nonces are reproducible.

use crate::error::CryptoError;

/// Abstract environment providing randomness and wall-clock time.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `random_bytes()` reports failure instead of returning predictable bytes
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Errors
    ///
    /// `EntropyUnavailable` if the underlying source cannot produce bytes.
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError>;

    /// Seconds since the Unix epoch, used for record timestamps only.
    fn wall_clock_secs(&self) -> u64;

    /// Draws a fresh random array (keys, seeds, nonces).
    fn random_array<const N: usize>(&self) -> Result<[u8; N], CryptoError> {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes)?;
        Ok(bytes)
    }
}

/// Production environment backed by the OS RNG and system clock.
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
    #[allow(clippy::disallowed_methods)]
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::fill(buffer).map_err(|e| CryptoError::EntropyUnavailable(e.to_string()))
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

/// Deterministic environments for tests and simulation.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    };

    use rand_chacha::{
        ChaCha20Rng,
        rand_core::{RngCore, SeedableRng},
    };

    use super::Environment;
    use crate::error::CryptoError;

    /// Seeded `ChaCha20` RNG with a manually advanced clock.
    ///
    /// Clones share the same RNG stream and clock.
    #[derive(Clone)]
    pub struct SeededEnv {
        rng: Arc<Mutex<ChaCha20Rng>>,
        clock: Arc<AtomicU64>,
    }

    impl SeededEnv {
        /// Environment whose random stream is fully determined by `seed`.
        pub fn new(seed: u64) -> Self {
            Self {
                rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
                clock: Arc::new(AtomicU64::new(1_700_000_000)),
            }
        }

        /// Move the wall clock forward.
        pub fn advance_secs(&self, secs: u64) {
            self.clock.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Environment for SeededEnv {
        fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| CryptoError::EntropyUnavailable("seeded rng poisoned".to_string()))?;
            rng.fill_bytes(buffer);
            Ok(())
        }

        fn wall_clock_secs(&self) -> u64 {
            self.clock.load(Ordering::SeqCst)
        }
    }

    /// Environment whose randomness source always fails.
    #[derive(Clone, Copy, Default)]
    pub struct FailingEnv;

    impl Environment for FailingEnv {
        fn random_bytes(&self, _buffer: &mut [u8]) -> Result<(), CryptoError> {
            Err(CryptoError::EntropyUnavailable("entropy source offline".to_string()))
        }

        fn wall_clock_secs(&self) -> u64 {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_utils::SeededEnv, *};

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        env.random_bytes(&mut bytes1).unwrap();
        env.random_bytes(&mut bytes2).unwrap();

        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn system_env_clock_is_after_epoch() {
        assert!(SystemEnv::new().wall_clock_secs() > 1_600_000_000);
    }

    #[test]
    fn seeded_env_is_reproducible() {
        let a: [u8; 32] = SeededEnv::new(7).random_array().unwrap();
        let b: [u8; 32] = SeededEnv::new(7).random_array().unwrap();
        let c: [u8; 32] = SeededEnv::new(8).random_array().unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn seeded_env_clones_share_stream() {
        let env = SeededEnv::new(1);
        let clone = env.clone();

        let first: [u8; 16] = env.random_array().unwrap();
        let second: [u8; 16] = clone.random_array().unwrap();
        assert_ne!(first, second, "clones must not replay the same bytes");

        let before = env.wall_clock_secs();
        clone.advance_secs(30);
        assert_eq!(env.wall_clock_secs(), before + 30);
    }
}
