/// Number of analog sensor channels carried in every packet
pub const CHANNEL_COUNT: usize = 8;

/// Placeholder shown for any field that has not been received yet
pub const EMPTY_FIELD: &str = "-";

fn empty_field() -> String {
    EMPTY_FIELD.to_string()
}

/// Latest known state of the transmitter, always fully populated
///
/// All values are kept as display strings: numeric fields hold the decimal
/// form of the hex token on the wire, or the raw token when it was not hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorRecord {
    pub site_id: String,
    pub device_id: String,
    pub message_id: String,
    pub time: String,
    pub channels: [String; CHANNEL_COUNT],
    pub ntc_indoor: String,
    pub ntc_outdoor: String,
    pub lte_signal: String,
    pub battery_level: String,
    pub reset_flag: String,
    pub packet_count: String,
}

impl Default for SensorRecord {
    fn default() -> Self {
        SensorRecord {
            site_id: empty_field(),
            device_id: empty_field(),
            message_id: empty_field(),
            time: empty_field(),
            channels: std::array::from_fn(|_| empty_field()),
            ntc_indoor: empty_field(),
            ntc_outdoor: empty_field(),
            lte_signal: empty_field(),
            battery_level: empty_field(),
            reset_flag: empty_field(),
            packet_count: empty_field(),
        }
    }
}

impl SensorRecord {
    /// Overwrite every field present in `update`, leaving the rest untouched
    pub fn merge(&mut self, update: SensorUpdate) {
        fn apply(target: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        apply(&mut self.site_id, update.site_id);
        apply(&mut self.device_id, update.device_id);
        apply(&mut self.message_id, update.message_id);
        apply(&mut self.time, update.time);
        if let Some(channels) = update.channels {
            self.channels = channels;
        }
        apply(&mut self.ntc_indoor, update.ntc_indoor);
        apply(&mut self.ntc_outdoor, update.ntc_outdoor);
        apply(&mut self.lte_signal, update.lte_signal);
        apply(&mut self.battery_level, update.battery_level);
        apply(&mut self.reset_flag, update.reset_flag);
        apply(&mut self.packet_count, update.packet_count);
    }
}

/// Channel 1 reading compared against the management value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Above the management value.
    Danger,
    /// At or below the management value.
    Safe,
}

impl SensorRecord {
    /// Classify channel 1 against `threshold`
    ///
    /// Returns None while channel 1 holds no number (`-`, empty, or text).
    pub fn channel_status(&self, threshold: u32) -> Option<ChannelStatus> {
        let value = leading_number(&self.channels[0])?;
        if value > f64::from(threshold) {
            Some(ChannelStatus::Danger)
        } else {
            Some(ChannelStatus::Safe)
        }
    }
}

/// Parse the leading decimal number of a token, ignoring trailing text
fn leading_number(token: &str) -> Option<f64> {
    let token = token.trim();
    let bytes = token.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let fraction_start = end + 1;
        let mut fraction_end = fraction_start;
        while fraction_end < bytes.len() && bytes[fraction_end].is_ascii_digit() {
            fraction_end += 1;
        }
        if fraction_end > fraction_start || has_digits {
            has_digits |= fraction_end > fraction_start;
            end = fraction_end;
        }
    }
    if !has_digits {
        return None;
    }
    token[..end].parse().ok()
}

/// Partial record used for field-wise merging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorUpdate {
    pub site_id: Option<String>,
    pub device_id: Option<String>,
    pub message_id: Option<String>,
    pub time: Option<String>,
    pub channels: Option<[String; CHANNEL_COUNT]>,
    pub ntc_indoor: Option<String>,
    pub ntc_outdoor: Option<String>,
    pub lte_signal: Option<String>,
    pub battery_level: Option<String>,
    pub reset_flag: Option<String>,
    pub packet_count: Option<String>,
}

impl From<SensorRecord> for SensorUpdate {
    fn from(record: SensorRecord) -> Self {
        SensorUpdate {
            site_id: Some(record.site_id),
            device_id: Some(record.device_id),
            message_id: Some(record.message_id),
            time: Some(record.time),
            channels: Some(record.channels),
            ntc_indoor: Some(record.ntc_indoor),
            ntc_outdoor: Some(record.ntc_outdoor),
            lte_signal: Some(record.lte_signal),
            battery_level: Some(record.battery_level),
            reset_flag: Some(record.reset_flag),
            packet_count: Some(record.packet_count),
        }
    }
}

/// A device seen during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub display_name: String,
    pub paired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_fully_populated() {
        let record = SensorRecord::default();
        assert_eq!(record.site_id, "-");
        assert_eq!(record.channels.len(), CHANNEL_COUNT);
        assert!(record.channels.iter().all(|c| c == "-"));
        assert_eq!(record.packet_count, "-");
    }

    #[test]
    fn test_merge_partial_update_keeps_other_fields() {
        let mut record = SensorRecord {
            site_id: "S1".to_string(),
            battery_level: "90".to_string(),
            ..Default::default()
        };

        record.merge(SensorUpdate {
            battery_level: Some("85".to_string()),
            ..Default::default()
        });

        assert_eq!(record.site_id, "S1");
        assert_eq!(record.battery_level, "85");
        assert_eq!(record.time, "-");
    }

    fn record_with_ch1(value: &str) -> SensorRecord {
        let mut record = SensorRecord::default();
        record.channels[0] = value.to_string();
        record
    }

    #[test]
    fn test_channel_status_around_threshold() {
        assert_eq!(
            record_with_ch1("71").channel_status(70),
            Some(ChannelStatus::Danger)
        );
        assert_eq!(
            record_with_ch1("70").channel_status(70),
            Some(ChannelStatus::Safe)
        );
        assert_eq!(
            record_with_ch1("69").channel_status(70),
            Some(ChannelStatus::Safe)
        );
        assert_eq!(
            record_with_ch1("70.5").channel_status(70),
            Some(ChannelStatus::Danger)
        );
    }

    #[test]
    fn test_channel_status_without_value() {
        assert_eq!(SensorRecord::default().channel_status(70), None);
        assert_eq!(record_with_ch1("").channel_status(70), None);
        assert_eq!(record_with_ch1("N/A").channel_status(70), None);
    }

    #[test]
    fn test_channel_status_reads_leading_number() {
        assert_eq!(
            record_with_ch1("120abc").channel_status(70),
            Some(ChannelStatus::Danger)
        );
        assert_eq!(leading_number(".5"), Some(0.5));
        assert_eq!(leading_number("-3"), Some(-3.0));
        assert_eq!(leading_number("."), None);
        assert_eq!(leading_number("+"), None);
    }

    #[test]
    fn test_merge_full_update_replaces_everything() {
        let mut record = SensorRecord::default();
        let incoming = SensorRecord {
            site_id: "S2".to_string(),
            channels: std::array::from_fn(|i| i.to_string()),
            ..Default::default()
        };

        record.merge(incoming.clone().into());

        assert_eq!(record, incoming);
    }
}
