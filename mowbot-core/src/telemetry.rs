//! Last-known telemetry snapshot.

use embassy_time::Instant;

/// Longest raw record kept in the snapshot.
pub const MAX_RECORD_LEN: usize = 96;

/// Telemetry as last reported by the robot.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    /// Heading in degrees, if any record carried a valid one.
    pub heading: Option<f32>,
    /// Last raw record, truncated to [`MAX_RECORD_LEN`] bytes on a
    /// character boundary.
    pub record: heapless::String<MAX_RECORD_LEN>,
    /// Records received since startup.
    pub records: u32,
    /// When the last record arrived.
    pub updated_at: Option<Instant>,
}

impl Telemetry {
    /// Snapshot before any record has arrived.
    pub const fn new() -> Self {
        Self {
            heading: None,
            record: heapless::String::new(),
            records: 0,
            updated_at: None,
        }
    }

    /// Store a new record. A record without a valid heading keeps the
    /// previous heading.
    pub(crate) fn update(&mut self, record: &str, heading: Option<f32>, now: Instant) {
        self.record.clear();
        for c in record.chars() {
            if self.record.push(c).is_err() {
                break;
            }
        }
        if heading.is_some() {
            self.heading = heading;
        }
        self.records = self.records.wrapping_add(1);
        self.updated_at = Some(now);
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}
