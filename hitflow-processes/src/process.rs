//! The process trait and its lifecycle.

use hitflow_core::{Event, EventKind};

use crate::{Parameters, ProcessContext, Result};

/// Lifecycle state of a process inside a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Constructed with default parameters.
    #[default]
    Created,
    /// Parameters resolved.
    Configured,
    /// Initialised and accepting events.
    Running,
    /// `end_process` has run.
    Finished,
}

/// A unit of event processing.
///
/// A process consumes one event of kind [`Process::input_kind`] and returns
/// at most one event of kind [`Process::output_kind`]. Returning `None`
/// drops the event from the chain; it is not an error.
///
/// Lifecycle: `configure` once, `init_process` once, `process_event` for
/// every event, then `end_process` once. [`crate::ProcessChain`] enforces
/// the ordering.
pub trait Process: Send {
    /// Registry key of the process type.
    fn type_name(&self) -> &'static str;

    /// Instance name, used as the observable prefix.
    fn name(&self) -> &str;

    /// Renames the instance.
    fn set_name(&mut self, name: &str);

    /// Kind of event accepted.
    fn input_kind(&self) -> EventKind {
        EventKind::Hits
    }

    /// Kind of event produced.
    fn output_kind(&self) -> EventKind {
        EventKind::Hits
    }

    /// Resolves parameters, keeping defaults for absent keys.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] for invalid values.
    fn configure(&mut self, params: &Parameters<'_>) -> Result<()>;

    /// Prepares per-run state (random generators, geometry handles).
    ///
    /// # Errors
    /// Returns an error if a required collaborator is missing.
    fn init_process(&mut self, _ctx: &ProcessContext) -> Result<()> {
        Ok(())
    }

    /// Processes one event.
    fn process_event(&mut self, event: Event) -> Option<Event>;

    /// Releases per-run state.
    fn end_process(&mut self) {}

    /// Resolved configuration as `(key, value)` pairs.
    fn metadata(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Formats a `(key, value)` metadata entry.
pub(crate) fn entry(key: &str, value: impl std::fmt::Display) -> (String, String) {
    (key.to_string(), value.to_string())
}
