//! Random source capability used for dice and seat shuffling.
//!
//! The source is shared by every game in the process, so implementations are
//! either stateless or guard their state with a mutex.

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

pub trait RandomSource: Send + Sync {
    /// Uniform integer in `min..=max`.
    fn int_in_range(&self, min: u32, max: u32) -> u32;
}

/// Cryptographically strong source backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn int_in_range(&self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        let mut rng = OsRng;
        rng.gen_range(min..=max)
    }
}

/// Deterministic source for simulations that must be reproducible.
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: Mutex<XorShiftRng>,
}

impl SeededRandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(XorShiftRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn int_in_range(&self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        // A poisoned lock only means another thread panicked mid-draw; the
        // generator state itself is still valid.
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen_range(min..=max)
    }
}

/// Replays recorded values in order, e.g. the dice of a logged game.
///
/// Values are clamped into the requested range. Once the script runs out the
/// source keeps returning `min`.
#[derive(Debug, Default)]
pub struct ReplayRandomSource {
    values: Mutex<VecDeque<u32>>,
}

impl ReplayRandomSource {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
        }
    }

    pub fn push(&self, value: u32) {
        let mut values = match self.values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        values.push_back(value);
    }

    pub fn remaining(&self) -> usize {
        match self.values.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl RandomSource for ReplayRandomSource {
    fn int_in_range(&self, min: u32, max: u32) -> u32 {
        let mut values = match self.values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        values
            .pop_front()
            .map_or(min, |value| value.clamp(min, max.max(min)))
    }
}

/// Fisher-Yates shuffle driven by a [`RandomSource`].
pub fn shuffle<T>(source: &dyn RandomSource, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let upper = u32::try_from(i).unwrap_or(u32::MAX);
        let j = source.int_in_range(0, upper) as usize;
        items.swap(i, j.min(i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_source_stays_in_range() {
        let source = OsRandomSource;
        for _ in 0..500 {
            let value = source.int_in_range(1, 6);
            assert!((1..=6).contains(&value));
        }
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let a = SeededRandomSource::new(42);
        let b = SeededRandomSource::new(42);
        let rolls_a: Vec<u32> = (0..20).map(|_| a.int_in_range(1, 6)).collect();
        let rolls_b: Vec<u32> = (0..20).map(|_| b.int_in_range(1, 6)).collect();
        assert_eq!(rolls_a, rolls_b);
    }

    #[test]
    fn test_replay_source_clamps_and_drains() {
        let source = ReplayRandomSource::new([3, 9, 0]);
        assert_eq!(source.int_in_range(1, 6), 3);
        assert_eq!(source.int_in_range(1, 6), 6);
        assert_eq!(source.int_in_range(1, 6), 1);
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.int_in_range(1, 6), 1);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let source = SeededRandomSource::new(7);
        let mut seats = vec![0, 1, 2, 3];
        shuffle(&source, &mut seats);
        let mut sorted = seats.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }
}
