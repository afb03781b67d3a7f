/// Per-connection stream state: framing, decoding, and diagnostics
use log::{debug, warn};
use std::collections::VecDeque;

use crate::models::SensorRecord;
use crate::protocol::{decode_packet, is_packet_like, StreamFramer, PACKET_GRAMMAR};
use crate::utils::{escape_chunk, format_clock_time, now_local};

/// Number of raw chunks kept for diagnostics
pub const RECENT_LOG_CAPACITY: usize = 10;

/// What happened to one candidate line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Decoded and merged; carries the record as it stands after the merge.
    Decoded(SensorRecord),
    /// Looked like a packet but did not decode.
    Malformed(String),
    /// Not packet-shaped at all.
    Noise(String),
}

/// State owned by one active connection
///
/// Driven by one chunk at a time. The record survives `reset()` so the last
/// known values stay visible across reconnects; the framing buffer and the
/// diagnostics do not.
#[derive(Debug)]
pub struct ConnectionSession {
    framer: StreamFramer,
    record: SensorRecord,
    recent_log: VecDeque<String>,
    last_failure: Option<String>,
}

impl ConnectionSession {
    pub fn new(framer: StreamFramer) -> Self {
        ConnectionSession {
            framer,
            record: SensorRecord::default(),
            recent_log: VecDeque::with_capacity(RECENT_LOG_CAPACITY),
            last_failure: None,
        }
    }

    /// Feed one raw chunk from the transport
    ///
    /// Returns the outcome of every candidate line the chunk completed, in
    /// stream order.
    pub fn on_chunk(&mut self, raw: &str) -> Vec<LineOutcome> {
        self.log_chunk(raw);

        self.framer
            .push(raw)
            .into_iter()
            .map(|line| self.handle_line(line))
            .collect()
    }

    fn log_chunk(&mut self, raw: &str) {
        let entry = format!("[{}] {}", format_clock_time(&now_local()), escape_chunk(raw));
        debug!("Chunk {}", entry);

        self.recent_log.push_front(entry);
        self.recent_log.truncate(RECENT_LOG_CAPACITY);
    }

    fn handle_line(&mut self, line: String) -> LineOutcome {
        match decode_packet(&line) {
            Some(decoded) => {
                self.record.merge(decoded.into());
                self.last_failure = None;
                LineOutcome::Decoded(self.record.clone())
            }
            None if is_packet_like(&line) => {
                warn!(
                    "Malformed packet: '{}' (expected {})",
                    line, PACKET_GRAMMAR
                );
                self.last_failure = Some(line.clone());
                LineOutcome::Malformed(line)
            }
            None => {
                debug!("Ignoring noise line: '{}'", line);
                LineOutcome::Noise(line)
            }
        }
    }

    /// Clear the buffer and diagnostics for a new connection
    pub fn reset(&mut self) {
        self.framer.clear();
        self.recent_log.clear();
        self.last_failure = None;
    }

    pub fn current_record(&self) -> &SensorRecord {
        &self.record
    }

    /// Recent raw chunks, most recent first
    pub fn recent_log(&self) -> impl Iterator<Item = &str> {
        self.recent_log.iter().map(String::as_str)
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::framer::DEFAULT_MAX_BUFFER_BYTES;

    const PACKET: &str = "#S1,D1,M1;5F5E1000,0A,0B,0C,0D,0E,0F,10,11,12,13,14,15,16,17";

    fn session() -> ConnectionSession {
        ConnectionSession::new(StreamFramer::new())
    }

    #[test]
    fn test_decoded_packet_updates_record() {
        let mut session = session();
        let outcomes = session.on_chunk(&format!("{}\n", PACKET));

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], LineOutcome::Decoded(_)));

        let record = session.current_record();
        assert_eq!(record.site_id, "S1");
        assert_eq!(record.channels[0], "10");
        assert_eq!(record.channels[7], "17");
        assert_eq!(record.ntc_indoor, "18");
        assert_eq!(record.channels.len(), 8);
    }

    #[test]
    fn test_packet_across_chunks() {
        let mut session = session();
        let (first, second) = PACKET.split_at(5);

        assert!(session.on_chunk(first).is_empty());
        assert!(session.on_chunk(second).iter().any(|o| matches!(o, LineOutcome::Decoded(_))));
        assert_eq!(session.current_record().message_id, "M1");
    }

    #[test]
    fn test_serial_read_ending_after_separator() {
        // RFCOMM keeps terminators, so the link runs without the marker fallback
        let framer = StreamFramer::with_options(false, DEFAULT_MAX_BUFFER_BYTES);
        let mut session = ConnectionSession::new(framer);
        let line = format!("{}\r\n", PACKET);
        let separator = PACKET.find(';').unwrap();

        for split in separator + 1..line.len() {
            let mut outcomes = session.on_chunk(&line[..split]);
            outcomes.extend(session.on_chunk(&line[split..]));

            assert_eq!(outcomes.len(), 1, "split at {}", split);
            match &outcomes[0] {
                LineOutcome::Decoded(record) => {
                    assert_eq!(record.channels[7], "17", "split at {}", split);
                    assert_eq!(record.packet_count, "23", "split at {}", split);
                }
                other => panic!("split at {}: {:?}", split, other),
            }
        }
    }

    #[test]
    fn test_malformed_packet_is_recorded() {
        let mut session = session();

        assert!(session.on_chunk("#onlyheader_no_semicolon").is_empty());
        assert_eq!(session.last_failure(), None);

        let outcomes = session.on_chunk("\n");
        assert_eq!(
            outcomes,
            vec![LineOutcome::Malformed("#onlyheader_no_semicolon".to_string())]
        );
        assert_eq!(session.last_failure(), Some("#onlyheader_no_semicolon"));
        assert_eq!(session.current_record(), &SensorRecord::default());
    }

    #[test]
    fn test_noise_leaves_failure_untouched() {
        let mut session = session();
        session.on_chunk("#bad\n");

        let outcomes = session.on_chunk("garbage\n");

        assert_eq!(outcomes, vec![LineOutcome::Noise("garbage".to_string())]);
        assert_eq!(session.last_failure(), Some("#bad"));
    }

    #[test]
    fn test_success_clears_failure() {
        let mut session = session();
        session.on_chunk("#bad\n");
        session.on_chunk(&format!("{}\n", PACKET));

        assert_eq!(session.last_failure(), None);
    }

    #[test]
    fn test_recent_log_is_bounded_and_newest_first() {
        let mut session = session();
        for i in 0..15 {
            session.on_chunk(&format!("chunk{}\r\n", i));
        }

        let log: Vec<&str> = session.recent_log().collect();
        assert_eq!(log.len(), RECENT_LOG_CAPACITY);
        assert!(log[0].ends_with("] chunk14\\r\\n"), "got {}", log[0]);
        assert!(log[9].ends_with("] chunk5\\r\\n"), "got {}", log[9]);
    }

    #[test]
    fn test_empty_chunk_is_still_logged() {
        let mut session = session();
        assert!(session.on_chunk("").is_empty());
        assert_eq!(session.recent_log().count(), 1);
    }

    #[test]
    fn test_reset_keeps_record() {
        let mut session = session();
        session.on_chunk(&format!("{}\n", PACKET));
        session.on_chunk("#bad\n#partial");

        session.reset();

        assert_eq!(session.recent_log().count(), 0);
        assert_eq!(session.last_failure(), None);
        assert_eq!(session.current_record().site_id, "S1");
        // The buffered "#partial" is gone, so the terminator yields nothing
        assert!(session.on_chunk("\n").is_empty());
    }
}
