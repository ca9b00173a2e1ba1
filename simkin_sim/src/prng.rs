// simkin_sim/src/prng.rs

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// A newtype wrapper around `ChaCha8Rng`.
/// This is the engine's single deterministic pseudo-random number generator.
#[derive(Debug, Clone)]
pub struct SimulationRng(pub ChaCha8Rng);

impl SimulationRng {
    /// Seeded when a seed is given, otherwise drawn from OS entropy.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => {
                info!("No seed configured; seeding the simulation RNG from entropy.");
                Self(ChaCha8Rng::from_entropy())
            }
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl Default for SimulationRng {
    fn default() -> Self {
        Self::seeded(0)
    }
}
