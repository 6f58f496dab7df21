//! Incremental newline-delimited event decoding
//!
//! The worker's stdout arrives in arbitrary chunks; event boundaries
//! never align with read boundaries. The decoder buffers the partial
//! trailing line across feeds and parses only complete lines.

use tracing::warn;

use crate::event::PostProcessEvent;

/// Stateful line decoder over a chunked byte stream
#[derive(Debug, Default)]
pub struct EventDecoder {
    pending: String,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning every event completed by it.
    ///
    /// Splits at the last newline in the accumulated text: everything
    /// before it is parsed line by line, the tail is held back for the
    /// next feed. A line that is not a well-formed event is dropped
    /// with a warning; the stream itself never fails.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<PostProcessEvent> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        let Some(split) = self.pending.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(split + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        let mut events = Vec::new();
        for line in complete.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PostProcessEvent>(line) {
                Ok(event) => events.push(event),
                Err(reason) => {
                    warn!(line, %reason, "dropping malformed post-processor output line");
                }
            }
        }
        events
    }

    /// Text held back waiting for its line terminator
    pub fn pending(&self) -> &str {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Printability, ProgressPayload};

    #[test]
    fn buffers_event_split_across_reads() {
        let mut decoder = EventDecoder::new();

        let first = decoder.feed(
            b"{\"result\":\"progress\",\"payload\":{\"percentage\":10,\"eta\":60}}\n{\"result\":\"success\"",
        );
        assert_eq!(
            first,
            vec![PostProcessEvent::Progress {
                payload: ProgressPayload {
                    percentage: 10,
                    eta: 60
                }
            }]
        );

        let second = decoder.feed(b",\"payload\":{\"printability\":\"READY\"");
        assert!(second.is_empty());

        let third = decoder.feed(b"}}\n");
        assert_eq!(third.len(), 1);
        let PostProcessEvent::Success { payload } = &third[0] else {
            panic!("expected success event");
        };
        assert_eq!(payload.printability, Printability::Ready);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn chunk_without_terminator_dispatches_nothing() {
        let mut decoder = EventDecoder::new();
        assert!(decoder.feed(b"{\"result\":\"waiting\"").is_empty());
        assert_eq!(decoder.pending(), "{\"result\":\"waiting\"");
    }

    #[test]
    fn malformed_lines_are_dropped_not_fatal() {
        let mut decoder = EventDecoder::new();
        let events = decoder.feed(b"this is not json\n{\"noResult\":true}\n{\"result\":\"waiting\"}\n");
        assert_eq!(events, vec![PostProcessEvent::Waiting]);
    }

    #[test]
    fn multiple_events_in_one_chunk() {
        let mut decoder = EventDecoder::new();
        let events = decoder.feed(
            b"{\"result\":\"warning\",\"warning\":\"a\"}\n{\"result\":\"warning\",\"warning\":\"b\"}\n",
        );
        assert_eq!(events.len(), 2);
    }
}
