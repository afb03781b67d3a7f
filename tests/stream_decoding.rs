//! End-to-end decoding of chunked transmitter output

use sensor_stream_gateway::models::{SensorRecord, CHANNEL_COUNT};
use sensor_stream_gateway::protocol::framer::DEFAULT_MAX_BUFFER_BYTES;
use sensor_stream_gateway::protocol::StreamFramer;
use sensor_stream_gateway::session::{ConnectionSession, LineOutcome};
use sensor_stream_gateway::utils::bytes_to_chunk;

const PACKET: &[u8] = b"#S1,D1,M1;5F5E1000,0A,0B,0C,0D,0E,0F,10,11,12,13,14,15,16,17\r\n";

fn decoded(outcomes: &[LineOutcome]) -> Vec<&SensorRecord> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            LineOutcome::Decoded(record) => Some(record),
            _ => None,
        })
        .collect()
}

/// Feed `data` in fixed-size pieces, like BLE notifications
fn feed_in_pieces(session: &mut ConnectionSession, data: &[u8], size: usize) -> Vec<LineOutcome> {
    data.chunks(size)
        .flat_map(|piece| session.on_chunk(&bytes_to_chunk(piece)))
        .collect()
}

#[test]
fn test_mtu_sized_notifications() {
    let mut session =
        ConnectionSession::new(StreamFramer::with_options(false, DEFAULT_MAX_BUFFER_BYTES));

    let mut stream = PACKET.to_vec();
    stream.extend_from_slice(b"#S1,D1,M2;0,FF\n");

    let outcomes = feed_in_pieces(&mut session, &stream, 20);
    let records = decoded(&outcomes);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].channels[7], "17");
    assert_eq!(records[0].packet_count, "23");
    assert_eq!(records[1].message_id, "M2");
    assert_eq!(records[1].time, "0");
    assert_eq!(records[1].channels[0], "255");
    assert!(records[1].channels[1..].iter().all(|c| c == "-"));
}

#[test]
fn test_serial_link_without_terminators() {
    let mut session = ConnectionSession::new(StreamFramer::new());

    let first = session.on_chunk("#S1,D1,M1;01,02,03,04,05,06,07,08,09,10,11,12,13,14");
    let second = session.on_chunk("#S1,D1,M2;01,0A");

    assert_eq!(decoded(&first).len(), 1);
    assert_eq!(decoded(&second).len(), 1);

    let record = session.current_record();
    assert_eq!(record.message_id, "M2");
    assert_eq!(record.channels[0], "10");
    assert_eq!(record.channels.len(), CHANNEL_COUNT);
}

#[test]
fn test_noise_between_packets_keeps_sync() {
    let mut session = ConnectionSession::new(StreamFramer::new());

    let outcomes = session.on_chunk("AT+OK\r\n#broken header\r\nxx#S7,D7,M7;0,01\r\n");

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0], LineOutcome::Noise("AT+OK".to_string()));
    assert_eq!(
        outcomes[1],
        LineOutcome::Malformed("#broken header".to_string())
    );
    assert_eq!(decoded(&outcomes)[0].site_id, "S7");
    assert_eq!(session.last_failure(), None);
}

#[test]
fn test_reconnect_keeps_last_record() {
    let mut session =
        ConnectionSession::new(StreamFramer::with_options(false, DEFAULT_MAX_BUFFER_BYTES));
    feed_in_pieces(&mut session, PACKET, 7);
    session.on_chunk("#S1,D1");

    session.reset();
    let outcomes = session.on_chunk("garbage\n");

    assert_eq!(outcomes, vec![LineOutcome::Noise("garbage".to_string())]);
    assert_eq!(session.current_record().site_id, "S1");
    assert_eq!(session.recent_log().count(), 1);
}
