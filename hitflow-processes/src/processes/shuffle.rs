//! Random hit reordering.

use hitflow_core::Event;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::process::entry;
use crate::{Parameters, Process, ProcessContext, Result};

/// Applies `iterations` random transpositions to the hit order.
///
/// This does not produce a uniform permutation; it mirrors the detector
/// chain's historic behaviour.
#[derive(Debug, Clone)]
pub struct HitsShuffle {
    name: String,
    iterations: usize,
    seed: u64,
    rng: StdRng,
}

impl HitsShuffle {
    /// Registry key.
    pub const TYPE: &'static str = "hitsShuffle";

    /// Sets the number of transpositions.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the seed (0 derives from the worker seed).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for HitsShuffle {
    fn default() -> Self {
        Self {
            name: Self::TYPE.to_string(),
            iterations: 100,
            seed: 0,
            rng: StdRng::seed_from_u64(0),
        }
    }
}

impl Process for HitsShuffle {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn configure(&mut self, params: &Parameters<'_>) -> Result<()> {
        self.iterations = params.count("iterations", self.iterations)?;
        self.seed = params.integer("seed", self.seed)?;
        Ok(())
    }

    fn init_process(&mut self, ctx: &ProcessContext) -> Result<()> {
        self.rng = ctx.rng(self.seed);
        Ok(())
    }

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        let cloud = event.hit_cloud_mut()?;
        let n = cloud.len();
        if n >= 2 {
            for _ in 0..self.iterations {
                let i = self.rng.random_range(0..n);
                let j = self.rng.random_range(0..n);
                cloud.swap_hits(i, j);
            }
        }
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![entry("iterations", self.iterations), entry("seed", self.seed)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitflow_core::{Hit, HitCloud};

    fn numbered(n: u32) -> HitCloud {
        (0..n).map(|i| Hit::new(f64::from(i), 0.0, 0.0, f64::from(i + 1))).collect()
    }

    fn shuffled(seed: u64, worker: usize) -> Vec<f64> {
        let mut process = HitsShuffle::default().with_seed(seed);
        process
            .init_process(&ProcessContext::for_worker(9, worker))
            .unwrap();
        let event = process.process_event(Event::hits(0, numbered(20))).unwrap();
        event.hit_cloud().unwrap().iter().map(|h| h.x).collect()
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut xs = shuffled(0, 0);
        assert_ne!(xs, (0..20).map(f64::from).collect::<Vec<_>>());
        xs.sort_by(f64::total_cmp);
        assert_eq!(xs, (0..20).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_reproducible_per_worker() {
        assert_eq!(shuffled(5, 1), shuffled(5, 1));
        assert_ne!(shuffled(5, 1), shuffled(5, 2));
    }

    #[test]
    fn test_small_clouds_untouched() {
        let mut process = HitsShuffle::default();
        let event = process.process_event(Event::hits(0, numbered(1))).unwrap();
        assert_eq!(event.hit_cloud().unwrap().len(), 1);
        let event = process.process_event(Event::hits(1, HitCloud::new())).unwrap();
        assert!(event.hit_cloud().unwrap().is_empty());
    }
}
