//! Serialised form of one event.

use std::collections::BTreeMap;

use hitflow_core::{Event, EventPayload, Hit, HitCloud, Signal, SignalEvent};
use serde::{Deserialize, Serialize};

/// One line of a JSON-lines event file.
///
/// Hits events carry `hits`; signal events carry `signals` instead.
/// Observables hold the event's analysis record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event identifier.
    pub id: u64,
    /// Hits of the event.
    #[serde(default)]
    pub hits: Vec<Hit>,
    /// Readout signals of the event.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<Signal>,
    /// Named observables.
    #[serde(default)]
    pub observables: BTreeMap<String, f64>,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        let (hits, signals) = match &event.payload {
            EventPayload::Hits(cloud) => (cloud.iter().collect(), Vec::new()),
            EventPayload::Signal(signals) => (Vec::new(), signals.signals.clone()),
        };
        Self {
            id: event.id,
            hits,
            signals,
            observables: event
                .analysis
                .iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

impl From<EventRecord> for Event {
    fn from(record: EventRecord) -> Self {
        let mut event = if record.signals.is_empty() {
            Event::hits(record.id, record.hits.into_iter().collect::<HitCloud>())
        } else {
            Event::signal(
                record.id,
                SignalEvent {
                    signals: record.signals,
                },
            )
        };
        for (key, value) in record.observables {
            event.analysis.insert(key, value);
        }
        event
    }
}
