//! Deterministic random stream.

use anyhow::{Result, bail};

/// Linear congruential generator owned by a single run.
///
/// The recurrence and output modulus are fixed so that trajectories are
/// identical to every other implementation of the model given the same seed.
#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: u64,
}

impl RandomStream {
    const MULTIPLIER: u64 = 1_103_515_245;
    const INCREMENT: u64 = 12_345;
    const MODULUS: u64 = 32_768;

    /// Create a new stream starting from `seed`.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Advance the state and return a value in `[0, 32768)`.
    pub fn next_raw(&mut self) -> u64 {
        self.seed = self
            .seed
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        (self.seed / 65_536) % Self::MODULUS
    }

    /// Return a value in `[0, max)`.
    ///
    /// # Errors
    /// Returns an error if `max` is zero.
    pub fn bounded(&mut self, max: u64) -> Result<u64> {
        if max == 0 {
            bail!("bound must be positive");
        }
        Ok(self.next_raw() % max)
    }

    /// Return a value in `[0, 1)`.
    pub fn uniform01(&mut self) -> f64 {
        self.next_raw() as f64 / Self::MODULUS as f64
    }

    /// Permute `items` in place with a Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) -> Result<()> {
        for i in (1..items.len()).rev() {
            let j = self.bounded(i as u64 + 1)? as usize;
            items.swap(i, j);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_draws_match_recurrence() {
        let mut rng = RandomStream::new(0);
        let seq: Vec<_> = (0..3).map(|_| rng.next_raw()).collect();
        assert_eq!(seq, vec![0, 21_468, 9_988]);

        let mut rng = RandomStream::new(1);
        let seq: Vec<_> = (0..3).map(|_| rng.next_raw()).collect();
        assert_eq!(seq, vec![16_838, 5_758, 10_113]);
    }

    #[test]
    fn wraps_around_on_overflow() {
        let mut rng = RandomStream::new(u64::MAX);
        let expected = u64::MAX.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        assert_eq!(rng.next_raw(), (expected / 65_536) % 32_768);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomStream::new(42);
        let mut b = RandomStream::new(42);
        let seq_a: Vec<_> = (0..1000).map(|_| a.next_raw()).collect();
        let seq_b: Vec<_> = (0..1000).map(|_| b.next_raw()).collect();
        assert_eq!(seq_a, seq_b);

        let mut c = RandomStream::new(43);
        let seq_c: Vec<_> = (0..1000).map(|_| c.next_raw()).collect();
        assert_ne!(seq_a, seq_c);
    }

    #[test]
    fn bounded_rejects_zero() {
        let mut rng = RandomStream::new(7);
        let error = rng.bounded(0).unwrap_err();
        assert!(error.to_string().contains("positive"));
    }

    #[test]
    fn bounded_stays_in_range() {
        let mut rng = RandomStream::new(3);
        for max in [1, 2, 3, 10, 97, 32_768, 1_000_000] {
            for _ in 0..500 {
                assert!(rng.bounded(max).unwrap() < max);
            }
        }
    }

    #[test]
    fn uniform01_stays_in_unit_interval() {
        let mut rng = RandomStream::new(11);
        for _ in 0..10_000 {
            let val = rng.uniform01();
            assert!((0.0..1.0).contains(&val));
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = RandomStream::new(5);
        let mut items: Vec<usize> = (0..257).collect();
        rng.shuffle(&mut items).unwrap();
        assert_ne!(items, (0..257).collect::<Vec<_>>());
        items.sort_unstable();
        assert_eq!(items, (0..257).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_handles_tiny_slices() {
        let mut rng = RandomStream::new(5);
        let mut empty: Vec<u8> = Vec::new();
        rng.shuffle(&mut empty).unwrap();
        let mut single = vec![9];
        rng.shuffle(&mut single).unwrap();
        assert_eq!(single, vec![9]);
    }
}
