//! Error types for hitflow-processes.

use hitflow_core::EventKind;
use thiserror::Error;

/// Result type alias for process and chain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Process configuration and chain wiring errors.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter could not be resolved.
    #[error("{stage}: invalid parameter '{parameter}': {reason}")]
    Configuration {
        stage: String,
        parameter: String,
        reason: String,
    },

    /// Adjacent stages disagree on the event kind.
    #[error(
        "stage {position} ({consumer}) accepts {accepts} events but the previous stage ({producer}) produces {produces}"
    )]
    TypeMismatch {
        position: usize,
        producer: String,
        produces: EventKind,
        consumer: String,
        accepts: EventKind,
    },

    /// The stage needs a readout geometry and none was provided.
    #[error("{stage}: no readout geometry available")]
    GeometryNotReady { stage: String },

    /// No factory is registered under this type name.
    #[error("unknown process type: {0}")]
    UnknownProcess(String),

    /// A lifecycle method was called out of order.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] hitflow_core::Error),
}

impl Error {
    /// Shorthand for a [`Error::Configuration`].
    pub fn configuration(
        stage: impl Into<String>,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            stage: stage.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}
