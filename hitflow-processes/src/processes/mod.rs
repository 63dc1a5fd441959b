//! Concrete processes, one module per family.

mod analysis;
mod energy;
mod fiducial;
mod hitmap;
mod reconstruction;
mod reduction;
mod shuffle;
mod signal;
mod transform;

pub use analysis::HitsAnalysis;
pub use energy::{ChannelType, HitsNormalization, HitsSmearing};
pub use fiducial::Fiducialization;
pub use hitmap::{HitTransform, HitmapTransformation, TransformKind};
pub use reconstruction::{ambiguity, log_ambiguity, Hits3DReconstruction};
pub use reduction::HitsReduction;
pub use shuffle::HitsShuffle;
pub use signal::{HitsToSignal, SignalToHits};
pub use transform::{HitsRotateAndTranslate, HitsRotation, HitsSpecular, HitsTranslation};
