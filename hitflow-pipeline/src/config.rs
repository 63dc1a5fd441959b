//! Pipeline configuration documents.

use std::path::Path;
use std::sync::Arc;

use hitflow_core::{ReadoutDescription, ReadoutGeometry};
use hitflow_processes::{ProcessChain, ProcessConfig, ProcessRegistry};
use serde::{Deserialize, Serialize};

use crate::{Result, RunnerConfig};

/// A complete pipeline: runner settings, optional readout and the chain.
///
/// ```json
/// {
///   "workers": 4,
///   "seed": 7,
///   "processes": [
///     { "type": "hitsReduction", "parameters": { "maxNodes": 20 } },
///     { "type": "hitsAnalysis" }
///   ]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Capacity of each worker's input queue.
    pub queue_capacity: usize,
    /// Results buffered per worker before a flush.
    pub flush_size: usize,
    /// Global seed.
    pub seed: u64,
    /// Readout geometry shared by geometry-aware processes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readout: Option<ReadoutDescription>,
    /// Process chain, in order.
    pub processes: Vec<ProcessConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let runner = RunnerConfig::default();
        Self {
            workers: runner.workers,
            queue_capacity: runner.queue_capacity,
            flush_size: runner.flush_size,
            seed: runner.seed,
            readout: None,
            processes: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    /// Returns a JSON error for malformed input.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads a JSON file.
    ///
    /// # Errors
    /// Returns an I/O or JSON error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Runner settings of this document.
    #[must_use]
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            flush_size: self.flush_size,
            seed: self.seed,
        }
    }

    /// Builds the readout geometry, if one is described.
    ///
    /// # Errors
    /// Returns a core error for an invalid description.
    pub fn geometry(&self) -> Result<Option<Arc<ReadoutGeometry>>> {
        let Some(description) = &self.readout else {
            return Ok(None);
        };
        let geometry = ReadoutGeometry::from_description(description)?;
        log::info!(
            "readout: {} planes, {} channels",
            geometry.len(),
            geometry.channel_count()
        );
        Ok(Some(Arc::new(geometry)))
    }

    /// Builds one configured and validated chain.
    ///
    /// # Errors
    /// Returns the first unknown process, configuration or type error.
    pub fn build_chain(&self, registry: &ProcessRegistry) -> hitflow_processes::Result<ProcessChain> {
        registry.build_chain(&self.processes)
    }

    /// Checks the runner settings and builds the chain and geometry once,
    /// surfacing every configuration error without running anything.
    ///
    /// # Errors
    /// Returns the first error found.
    pub fn validate(&self, registry: &ProcessRegistry) -> Result<()> {
        self.runner_config().validate()?;
        self.geometry()?;
        self.build_chain(registry)?;
        Ok(())
    }
}
