//! Telemetry record parsing.
//!
//! Telemetry arrives as a semicolon-delimited text record. Only the heading
//! field is interpreted here; its position is configurable because the
//! remaining layout belongs to the robot's telemetry interface.

/// Error type for telemetry parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    /// The record has fewer fields than the requested index.
    MissingField,
    /// The field is not a finite decimal number.
    InvalidNumber,
}

/// Borrowed view of one telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryRecord<'a> {
    raw: &'a str,
}

impl<'a> TelemetryRecord<'a> {
    /// Field separator.
    pub const SEPARATOR: char = ';';

    /// Wrap a raw record. Surrounding whitespace and line endings are ignored.
    #[must_use]
    pub fn new(raw: &'a str) -> Self {
        Self { raw: raw.trim() }
    }

    /// The trimmed raw record.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// Field at `index` (zero-based), trimmed.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&'a str> {
        self.raw.split(Self::SEPARATOR).nth(index).map(str::trim)
    }

    /// Number of fields in the record.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.raw.split(Self::SEPARATOR).count()
    }

    /// Parse the field at `index` as a heading in degrees.
    pub fn heading(&self, index: usize) -> Result<f32, TelemetryError> {
        let field = self.field(index).ok_or(TelemetryError::MissingField)?;
        let value: f32 = field.parse().map_err(|_| TelemetryError::InvalidNumber)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(TelemetryError::InvalidNumber)
        }
    }
}
