/// Packet decoding for the transmitter's text protocol
///
/// Wire format (one line per packet, noise before `#` is ignored):
///
/// `#site_id,dev_id,msg_id;time,ch1..ch8,ntc_in,ntc_out,lte,battery,reset_flag,count`
///
/// Every body field except the header is a hex token.
use crate::models::{SensorRecord, CHANNEL_COUNT, EMPTY_FIELD};
use crate::protocol::hex::hex_to_decimal;
use crate::utils::format_epoch_local;

pub const PACKET_MARKER: char = '#';
pub const SECTION_SEPARATOR: char = ';';
pub const FIELD_SEPARATOR: char = ',';

/// Human-readable grammar, shown next to malformed packets
pub const PACKET_GRAMMAR: &str =
    "#site_id,dev_id,msg_id;time,ch1..ch8,ntc_in,ntc_out,lte,battery,reset_flag,count";

// Body field positions
const TIME_INDEX: usize = 0;
const FIRST_CHANNEL_INDEX: usize = 1;
const NTC_INDOOR_INDEX: usize = 9;
const NTC_OUTDOOR_INDEX: usize = 10;
const LTE_INDEX: usize = 11;
const BATTERY_INDEX: usize = 12;
const RESET_FLAG_INDEX: usize = 13;
const COUNT_INDEX: usize = 14;

/// Whether a line that failed to decode is still worth reporting
///
/// Anything starting with the marker or carrying a section separator looks
/// like a broken packet; everything else is treated as line noise.
pub fn is_packet_like(line: &str) -> bool {
    line.starts_with(PACKET_MARKER) || line.contains(SECTION_SEPARATOR)
}

/// Decode one candidate line into a full sensor record
///
/// Returns None when the line has no `#...;...` shape or either the header
/// or body section is empty. Individual field problems never fail the
/// packet: non-hex tokens are kept verbatim and missing ones become `-`.
pub fn decode_packet(line: &str) -> Option<SensorRecord> {
    let trimmed = line.trim();
    let marker = trimmed.find(PACKET_MARKER)?;
    let content = &trimmed[marker + PACKET_MARKER.len_utf8()..];

    let mut sections = content.split(SECTION_SEPARATOR);
    let header = sections.next().filter(|s| !s.is_empty())?;
    let body = sections.next().filter(|s| !s.is_empty())?;

    let headers: Vec<&str> = header.split(FIELD_SEPARATOR).collect();
    let bodies: Vec<&str> = body.split(FIELD_SEPARATOR).collect();

    let header_field = |index: usize| -> String {
        headers
            .get(index)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| EMPTY_FIELD.to_string())
    };
    let body_field = |index: usize| -> String {
        hex_to_decimal(bodies.get(index).map(|s| s.trim()).unwrap_or(EMPTY_FIELD))
    };

    Some(SensorRecord {
        site_id: header_field(0),
        device_id: header_field(1),
        message_id: header_field(2),
        time: decode_time(bodies.get(TIME_INDEX).copied().unwrap_or("").trim()),
        channels: std::array::from_fn(|i| body_field(FIRST_CHANNEL_INDEX + i)),
        ntc_indoor: body_field(NTC_INDOOR_INDEX),
        ntc_outdoor: body_field(NTC_OUTDOOR_INDEX),
        lte_signal: body_field(LTE_INDEX),
        battery_level: body_field(BATTERY_INDEX),
        reset_flag: body_field(RESET_FLAG_INDEX),
        packet_count: body_field(COUNT_INDEX),
    })
}

/// Render the time token as a local date-time, or keep it raw
///
/// A zero or unparseable value is shown as sent, since some transmitters
/// have no clock and send a counter or placeholder instead.
fn decode_time(token: &str) -> String {
    match parse_hex_prefix(token) {
        Some(0) | None => token.to_string(),
        Some(seconds) => i64::try_from(seconds)
            .ok()
            .and_then(format_epoch_local)
            .unwrap_or_else(|| token.to_string()),
    }
}

/// Parse the leading run of hex digits, accepting an optional `0x` prefix
fn parse_hex_prefix(token: &str) -> Option<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    let end = digits
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    u64::from_str_radix(&digits[..end], 16).ok()
}
