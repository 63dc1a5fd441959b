//! hitflow-pipeline: Ordered multi-worker execution of process chains.
//!
//! A [`PipelineRunner`] builds one [`hitflow_processes::ProcessChain`] per
//! worker, spreads events over the workers and hands the results to an
//! [`EventSink`] in input order. Events are read and written as JSON lines
//! with [`EventReader`] and [`EventWriter`].
//!

mod config;
mod error;
mod reader;
mod record;
pub mod reorder;
mod runner;
mod writer;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use reader::EventReader;
pub use record::EventRecord;
pub use runner::{
    AbortHandle, PipelineRunner, RunSummary, RunnerConfig, WorkerReport, WorkerState,
};
pub use writer::{EventSink, EventWriter};
