//! hitflow-processes: Process chains for detector hit clouds.
//!
//! This crate provides the [`Process`] trait, the [`ProcessChain`] that
//! runs processes in order, a [`ProcessRegistry`] building them from
//! configuration, and the built-in processes:
//! - **Reduction** and **shuffle** of hit clouds
//! - **Rigid transforms**: rotation, translation, specular, hitmap
//! - **Fiducialization** and **readout mapping** against a readout geometry
//! - **3D reconstruction** from XZ/YZ projections
//! - **Energy** normalisation, smearing and summary **analysis**
//!
#![warn(missing_docs)]

mod chain;
mod context;
pub mod error;
mod params;
mod process;
pub mod processes;
pub mod random;
mod registry;

pub use chain::ProcessChain;
pub use context::ProcessContext;
pub use error::{Error, Result};
pub use params::{parse_quantity, parse_vector, Parameters, ProcessConfig, Quantity};
pub use process::{Process, ProcessState};
pub use registry::{ProcessFactory, ProcessRegistry};
