//! Pipeline error types.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Process construction, configuration or lifecycle error.
    #[error("process error: {0}")]
    Process(#[from] hitflow_processes::Error),

    /// Core library error (e.g. readout geometry).
    #[error("core error: {0}")]
    Core(#[from] hitflow_core::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed event record.
    #[error("invalid event record on line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A worker thread panicked; its lane was abandoned.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    /// Invalid runner or pipeline configuration.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
