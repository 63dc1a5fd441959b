//! Event containers travelling through a process chain.

use std::collections::BTreeMap;
use std::fmt;

use crate::HitCloud;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The kind of payload an event carries.
///
/// Processes declare the kind they accept and the kind they produce, and a
/// chain is only valid when adjacent kinds agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventKind {
    /// A cloud of hits.
    Hits,
    /// Per-channel readout signals.
    Signal,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hits => f.write_str("hits"),
            Self::Signal => f.write_str("signal"),
        }
    }
}

/// Time samples recorded by one readout channel.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signal {
    /// Readout plane index.
    pub plane: usize,
    /// Module index within the plane.
    pub module: usize,
    /// Channel index within the module.
    pub channel: usize,
    /// `(time, amplitude)` samples, in time order.
    pub samples: Vec<(f64, f64)>,
}

impl Signal {
    /// Total amplitude of the signal.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.samples.iter().map(|&(_, a)| a).sum()
    }
}

/// The per-channel view of an event.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalEvent {
    /// Signals, one per fired channel.
    pub signals: Vec<Signal>,
}

impl SignalEvent {
    /// Returns the signal for a channel, creating it if needed.
    pub fn signal_mut(&mut self, plane: usize, module: usize, channel: usize) -> &mut Signal {
        let position = self
            .signals
            .iter()
            .position(|s| s.plane == plane && s.module == module && s.channel == channel);
        let idx = position.unwrap_or_else(|| {
            self.signals.push(Signal {
                plane,
                module,
                channel,
                samples: Vec::new(),
            });
            self.signals.len() - 1
        });
        &mut self.signals[idx]
    }

    /// Adds `amplitude` at `time` to a channel, accumulating into an existing
    /// sample at the same time.
    pub fn add_sample(&mut self, plane: usize, module: usize, channel: usize, time: f64, amplitude: f64) {
        let signal = self.signal_mut(plane, module, channel);
        match signal.samples.binary_search_by(|&(t, _)| t.total_cmp(&time)) {
            Ok(idx) => signal.samples[idx].1 += amplitude,
            Err(idx) => signal.samples.insert(idx, (time, amplitude)),
        }
    }

    /// Number of fired channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// True when no channel fired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Sum of all sample amplitudes.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.signals.iter().map(Signal::integral).sum()
    }
}

/// Event payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventPayload {
    /// Hit cloud.
    Hits(HitCloud),
    /// Readout signals.
    Signal(SignalEvent),
}

impl EventPayload {
    /// The kind of this payload.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Hits(_) => EventKind::Hits,
            Self::Signal(_) => EventKind::Signal,
        }
    }
}

/// Named scalar observables derived while processing an event.
///
/// Kept separate from the payload so analysis values survive payload
/// transformations.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisRecord {
    values: BTreeMap<String, f64>,
}

impl AnalysisRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `"<process>_<name>"`.
    pub fn set(&mut self, process: &str, name: &str, value: f64) {
        self.values.insert(format!("{process}_{name}"), value);
    }

    /// Stores `value` under a fully qualified key.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    /// Looks up a fully qualified key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Iterates over `(key, value)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Number of observables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no observable was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One detector event: an identifier, its payload and its analysis record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Event identifier.
    pub id: u64,
    /// Event payload.
    pub payload: EventPayload,
    /// Observables attached by processes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub analysis: AnalysisRecord,
}

impl Event {
    /// Creates a hits event.
    #[must_use]
    pub fn hits(id: u64, cloud: HitCloud) -> Self {
        Self {
            id,
            payload: EventPayload::Hits(cloud),
            analysis: AnalysisRecord::new(),
        }
    }

    /// Creates a signal event.
    #[must_use]
    pub fn signal(id: u64, signals: SignalEvent) -> Self {
        Self {
            id,
            payload: EventPayload::Signal(signals),
            analysis: AnalysisRecord::new(),
        }
    }

    /// The kind of the payload.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Borrows the hit cloud, if this is a hits event.
    #[must_use]
    pub fn hit_cloud(&self) -> Option<&HitCloud> {
        match &self.payload {
            EventPayload::Hits(cloud) => Some(cloud),
            EventPayload::Signal(_) => None,
        }
    }

    /// Mutably borrows the hit cloud, if this is a hits event.
    pub fn hit_cloud_mut(&mut self) -> Option<&mut HitCloud> {
        match &mut self.payload {
            EventPayload::Hits(cloud) => Some(cloud),
            EventPayload::Signal(_) => None,
        }
    }

    /// Borrows the signals, if this is a signal event.
    #[must_use]
    pub fn signals(&self) -> Option<&SignalEvent> {
        match &self.payload {
            EventPayload::Signal(signals) => Some(signals),
            EventPayload::Hits(_) => None,
        }
    }

    /// Replaces the payload, keeping id and analysis record.
    #[must_use]
    pub fn with_payload(self, payload: EventPayload) -> Self {
        Self {
            id: self.id,
            payload,
            analysis: self.analysis,
        }
    }
}
