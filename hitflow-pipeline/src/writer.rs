//! Event sinks and the JSON-lines writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use hitflow_core::Event;

use crate::{EventRecord, Result};

/// Destination of the events leaving a pipeline, in ascending order.
pub trait EventSink {
    /// Consumes one output event.
    ///
    /// # Errors
    /// An error aborts the run.
    fn write_event(&mut self, event: Event) -> Result<()>;
}

impl<F> EventSink for F
where
    F: FnMut(Event) -> Result<()>,
{
    fn write_event(&mut self, event: Event) -> Result<()> {
        self(event)
    }
}

/// Writes events as JSON lines, one [`EventRecord`] per line.
pub struct EventWriter<W: Write> {
    writer: W,
    count: usize,
}

impl EventWriter<BufWriter<File>> {
    /// Creates (or truncates) a JSON-lines file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> EventWriter<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer, count: 0 }
    }

    /// Writes one event.
    ///
    /// # Errors
    /// Returns a serialisation or I/O error.
    pub fn write(&mut self, event: &Event) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &EventRecord::from(event))?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    /// Number of events written.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an I/O error.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    /// Returns an I/O error.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> EventSink for EventWriter<W> {
    fn write_event(&mut self, event: Event) -> Result<()> {
        self.write(&event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventReader;
    use hitflow_core::{Hit, HitCloud, HitType};
    use tempfile::NamedTempFile;

    fn sample_event(id: u64) -> Event {
        let cloud: HitCloud = [
            Hit::new(1.0, 2.0, 3.0, 4.0).with_time(0.25),
            Hit::new(-1.0, 0.0, 5.0, 2.0).with_type(HitType::Yz),
        ]
        .into_iter()
        .collect();
        let mut event = Event::hits(id, cloud);
        event.analysis.set("hitsAnalysis", "nHits", 2.0);
        event
    }

    #[test]
    fn test_write_then_read_file() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = EventWriter::create(file.path()).unwrap();
        writer.write(&sample_event(0)).unwrap();
        writer.write(&sample_event(1)).unwrap();
        assert_eq!(writer.count(), 2);
        writer.flush().unwrap();

        let events: Vec<Event> = EventReader::open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(events, vec![sample_event(0), sample_event(1)]);
    }

    #[test]
    fn test_one_record_per_line() {
        let mut writer = EventWriter::new(Vec::new());
        writer.write(&sample_event(7)).unwrap();
        writer.write(&Event::hits(8, HitCloud::new())).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"hitsAnalysis_nHits\":2.0"));
        assert!(lines[0].contains("\"type\":\"YZ\""));
        assert!(lines[1].starts_with("{\"id\":8,\"hits\":[]"));
    }

    #[test]
    fn test_closure_sink() {
        let mut ids = Vec::new();
        {
            let mut sink = |event: Event| -> Result<()> {
                ids.push(event.id);
                Ok(())
            };
            sink.write_event(sample_event(3)).unwrap();
        }
        assert_eq!(ids, vec![3]);
    }
}
