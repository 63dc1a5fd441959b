//! JSON-lines event reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hitflow_core::Event;

use crate::{Error, EventRecord, Result};

/// Streams events from a JSON-lines source, one [`EventRecord`] per line.
///
/// Blank lines are skipped. A malformed line yields [`Error::Record`] with
/// its 1-based line number.
pub struct EventReader<R> {
    reader: R,
    line: usize,
    buffer: String,
}

impl EventReader<BufReader<File>> {
    /// Opens a JSON-lines file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> EventReader<R> {
    /// Wraps a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buffer: String::new(),
        }
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(err) => return Some(Err(err.into())),
            }
            let text = self.buffer.trim();
            if text.is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str::<EventRecord>(text)
                    .map(Event::from)
                    .map_err(|source| Error::Record {
                        line: self.line,
                        source,
                    }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_records_and_skips_blank_lines() {
        let text = "{\"id\":1,\"hits\":[]}\n\n{\"id\":2,\"hits\":[{\"x\":1,\"y\":0,\"z\":0,\"energy\":1}]}\n";
        let events: Vec<Event> = EventReader::new(Cursor::new(text))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].id, 2);
        assert_eq!(events[1].hit_cloud().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let text = "{\"id\":1,\"hits\":[]}\nnot json\n";
        let mut reader = EventReader::new(Cursor::new(text));
        assert!(reader.next().unwrap().is_ok());
        match reader.next() {
            Some(Err(Error::Record { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected record error, got {other:?}"),
        }
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            EventReader::open("/nonexistent/events.jsonl"),
            Err(Error::Io(_))
        ));
    }
}
