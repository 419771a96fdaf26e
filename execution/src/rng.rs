//! Random sources for symbol draws, wheel spins and chaos payouts.

use commonware_cryptography::{sha256::Sha256, Hasher};
use rand::{rngs::OsRng, Rng};

/// Uniform random draws.
pub trait RandomSource {
    /// Uniform float in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform integer in `[min, max]`. Returns `min` when the range is empty.
    fn range_inclusive(&mut self, min: u64, max: u64) -> u64;

    /// Uniform index into a collection of `len` elements (`len > 0`).
    fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.range_inclusive(0, len as u64 - 1) as usize
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_f64(&mut self) -> f64 {
        (**self).next_f64()
    }

    fn range_inclusive(&mut self, min: u64, max: u64) -> u64 {
        (**self).range_inclusive(min, max)
    }
}

/// Operating-system backed cryptographically strong generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SecureRandom;

impl RandomSource for SecureRandom {
    fn next_f64(&mut self) -> f64 {
        OsRng.gen::<f64>()
    }

    fn range_inclusive(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        OsRng.gen_range(min..=max)
    }
}

/// Deterministic random number generator.
///
/// Uses SHA256 hash chains so the same seed always yields the same sequence.
/// Used by tests and wherever a draw must be reproducible from a time slot.
#[derive(Clone)]
pub struct GameRng {
    state: [u8; 32],
    index: usize,
}

impl GameRng {
    pub fn new(seed: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        Self {
            state: hasher.finalize().0,
            index: 0,
        }
    }

    pub fn from_u64(seed: u64) -> Self {
        Self::new(&seed.to_be_bytes())
    }

    fn next_byte(&mut self) -> u8 {
        if self.index >= 32 {
            // Rehash to get more bytes
            let mut hasher = Sha256::new();
            hasher.update(&self.state);
            self.state = hasher.finalize().0;
            self.index = 0;
        }
        let result = self.state[self.index];
        self.index += 1;
        result
    }

    pub fn next_u64(&mut self) -> u64 {
        (0..8).fold(0u64, |acc, _| (acc << 8) | self.next_byte() as u64)
    }
}

impl RandomSource for GameRng {
    fn next_f64(&mut self) -> f64 {
        // 53 random mantissa bits
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range_inclusive(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        let span = max - min;
        if span == u64::MAX {
            return self.next_u64();
        }
        let span = span + 1;
        // Rejection sampling for unbiased distribution
        let limit = u64::MAX - (u64::MAX % span);
        loop {
            let value = self.next_u64();
            if value < limit {
                return min + value % span;
            }
        }
    }
}

/// Replays a fixed list of floats, then repeats the last one. Integer draws
/// map the float onto the range. Handy for forcing exact outcomes.
#[cfg(any(test, feature = "mocks"))]
#[derive(Clone, Debug)]
pub struct ScriptedRng {
    values: Vec<f64>,
    position: usize,
}

#[cfg(any(test, feature = "mocks"))]
impl ScriptedRng {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            position: 0,
        }
    }
}

#[cfg(any(test, feature = "mocks"))]
impl RandomSource for ScriptedRng {
    fn next_f64(&mut self) -> f64 {
        let value = self
            .values
            .get(self.position)
            .or_else(|| self.values.last())
            .copied()
            .unwrap_or(0.0);
        self.position += 1;
        value
    }

    fn range_inclusive(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        let span = (max - min + 1) as f64;
        (min + (self.next_f64() * span) as u64).min(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_rng_deterministic() {
        let mut rng1 = GameRng::from_u64(7);
        let mut rng2 = GameRng::from_u64(7);

        // Same seed should produce same sequence
        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_game_rng_different_seeds() {
        let mut rng1 = GameRng::from_u64(1);
        let mut rng2 = GameRng::from_u64(2);

        let seq1: Vec<u64> = (0..10).map(|_| rng1.next_u64()).collect();
        let seq2: Vec<u64> = (0..10).map(|_| rng2.next_u64()).collect();
        assert_ne!(seq1, seq2);
    }

    #[test]
    fn test_game_rng_float_range() {
        let mut rng = GameRng::from_u64(3);
        for _ in 0..10_000 {
            let value = rng.next_f64();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn test_range_inclusive_bounds() {
        let mut rng = GameRng::from_u64(4);
        let mut seen = [false; 6];
        for _ in 0..1_000 {
            let value = rng.range_inclusive(1, 6);
            assert!((1..=6).contains(&value));
            seen[(value - 1) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(rng.range_inclusive(5, 5), 5);
        assert_eq!(rng.range_inclusive(9, 2), 9);
    }

    #[test]
    fn test_secure_random_bounds() {
        let mut rng = SecureRandom;
        for _ in 0..1_000 {
            assert!((0.0..1.0).contains(&rng.next_f64()));
            assert!(rng.range_inclusive(10, 20) <= 20);
        }
        assert_eq!(rng.index(1), 0);
    }

    #[test]
    fn test_scripted_rng_replays() {
        let mut rng = ScriptedRng::new(vec![0.1, 0.9]);
        assert_eq!(rng.next_f64(), 0.1);
        assert_eq!(rng.next_f64(), 0.9);
        assert_eq!(rng.next_f64(), 0.9);
        assert_eq!(rng.range_inclusive(0, 9), 9);
    }
}
