//! Per-worker context handed to processes at initialisation.

use std::sync::Arc;

use hitflow_core::ReadoutGeometry;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::random::mix_seed;
use crate::{Error, Result};

/// Shared collaborators and seeding for one chain instance.
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    worker: usize,
    seed: u64,
    geometry: Option<Arc<ReadoutGeometry>>,
}

impl ProcessContext {
    /// Context for a single-threaded run with seed 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for `worker`, seeded from the run's global seed.
    #[must_use]
    pub fn for_worker(global_seed: u64, worker: usize) -> Self {
        Self {
            worker,
            seed: mix_seed(global_seed, worker as u64),
            geometry: None,
        }
    }

    /// Attaches a readout geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: Arc<ReadoutGeometry>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Worker index.
    #[must_use]
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Seed of this worker.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The readout geometry, if one was attached.
    #[must_use]
    pub fn geometry(&self) -> Option<&Arc<ReadoutGeometry>> {
        self.geometry.as_ref()
    }

    /// The readout geometry, or [`Error::GeometryNotReady`] for `stage`.
    ///
    /// # Errors
    /// Fails when no geometry is attached.
    pub fn require_geometry(&self, stage: &str) -> Result<Arc<ReadoutGeometry>> {
        self.geometry
            .clone()
            .ok_or_else(|| Error::GeometryNotReady {
                stage: stage.to_string(),
            })
    }

    /// A generator for a process. A zero `seed` derives from the worker
    /// seed; any other value is mixed with the worker index.
    #[must_use]
    pub fn rng(&self, seed: u64) -> StdRng {
        let seed = if seed == 0 {
            self.seed
        } else {
            mix_seed(seed, self.worker as u64)
        };
        StdRng::seed_from_u64(seed)
    }
}
