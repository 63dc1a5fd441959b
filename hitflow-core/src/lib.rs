//! hitflow-core: Core types for detector hit-cloud processing.
//!
//! This crate provides the hit point cloud and its geometric operations,
//! the event containers passed between processes, and the readout geometry
//! that maps 3D positions to detector channels.
//!

pub mod cloud;
pub mod error;
pub mod event;
pub mod hit;
pub mod readout;
pub mod reduction;
pub mod vector;

pub use cloud::HitCloud;
pub use error::{Error, Result};
pub use event::{AnalysisRecord, Event, EventKind, EventPayload, Signal, SignalEvent};
pub use hit::{Hit, HitType};
pub use readout::{
    ModuleDescription, PlaneDescription, ReadoutDescription, ReadoutGeometry, ReadoutModule,
    ReadoutPlane,
};
pub use reduction::{ReductionConfig, ReductionStatistics};
pub use vector::{Vec2, Vec3};
