//! Deterministic RNG for simulation threads.
//!
//! # Determinism strategy
//!
//! Every simulation thread owns its own `SimRng`.  A thread forked from
//! another simulation thread is seeded by drawing from its parent's RNG; a
//! thread forked from outside the simulation is seeded from the manager's
//! seed source.  Because the scheduler runs threads in a fixed order, the
//! draw sequence, and therefore every thread's seed, is reproducible from
//! the manager seed alone.
//!
//! How a drawn value becomes a seed is up to the [`RngFactory`].  The default
//! [`MixingRngFactory`] XORs in a salt multiplied by the 64-bit fractional
//! golden ratio, which spreads nearby seeds across the seed space.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

// ── SimRng ────────────────────────────────────────────────────────────────────

/// Per-thread deterministic RNG.
///
/// Owned by exactly one simulation thread (or by a manager as its seed
/// source).  Not shared: callers that need randomness on another thread
/// derive a child with [`RngFactory::derive`].
#[derive(Clone, Debug)]
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Expose the inner `SmallRng` for use with `rand` distribution types.
    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    /// Draw the next raw 64-bit value; used for seeding children.
    #[inline]
    pub fn next_seed(&mut self) -> u64 {
        self.0.r#gen()
    }

    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Choose a random element from a slice, or `None` if it is empty.
    #[inline]
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        use rand::seq::SliceRandom;
        slice.choose(&mut self.0)
    }
}

// ── RngFactory ────────────────────────────────────────────────────────────────

/// Creates the RNG of a newly forked simulation thread.
///
/// A forked thread inherits its parent's factory, so installing a factory on
/// one thread changes how its whole subtree is seeded.
pub trait RngFactory: Send + Sync + 'static {
    /// Build an RNG from a raw seed.
    fn from_seed(&self, seed: u64) -> SimRng;

    /// Build a child RNG by drawing a seed from `parent`.
    fn derive(&self, parent: &mut SimRng) -> SimRng {
        let seed = parent.next_seed();
        self.from_seed(seed)
    }
}

/// The default factory: `SmallRng` seeded with `seed ^ salt * MIXING_CONSTANT`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MixingRngFactory {
    pub salt: u64,
}

impl MixingRngFactory {
    pub fn new(salt: u64) -> Self {
        Self { salt }
    }
}

impl RngFactory for MixingRngFactory {
    fn from_seed(&self, seed: u64) -> SimRng {
        SimRng::new(seed ^ self.salt.wrapping_mul(MIXING_CONSTANT))
    }
}
