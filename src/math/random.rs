//! Seeded random range helper, ported from the original engine's `Random`
//! (`common/random.hpp`): a process-wide generator with reseed support,
//! backed here by `rand`'s `StdRng` rather than `std::mt19937`/
//! `std::random_device`. Consumed by the volumetrics render module for
//! per-pixel dither jitter.

use std::sync::{Mutex, OnceLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn generator() -> &'static Mutex<StdRng> {
    static GENERATOR: OnceLock<Mutex<StdRng>> = OnceLock::new();
    GENERATOR.get_or_init(|| Mutex::new(StdRng::from_entropy()))
}

pub struct Random;

impl Random {
    pub fn set_seed(seed: u64) {
        *generator().lock().unwrap() = StdRng::seed_from_u64(seed);
    }

    pub fn uint32(min: u32, max: u32) -> u32 {
        generator().lock().unwrap().gen_range(min..=max)
    }

    pub fn float32(min: f32, max: f32) -> f32 {
        generator().lock().unwrap().gen_range(min..=max)
    }

    /// Uniform value in `[0, 1)`.
    pub fn float32_01() -> f32 {
        generator().lock().unwrap().gen_range(0.0..1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_sequence_is_reproducible() {
        Random::set_seed(42);
        let a = Random::float32(0.0, 1.0);
        Random::set_seed(42);
        let b = Random::float32(0.0, 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn float32_01_stays_in_range() {
        Random::set_seed(7);
        for _ in 0..64 {
            let v = Random::float32_01();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
