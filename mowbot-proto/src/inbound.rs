//! Inbound payload classification.
//!
//! The robot answers on the same connection with three kinds of payload:
//!
//! - binary payloads carry a complete camera image,
//! - short text payloads (at most [`ACK_MAX_LEN`] characters, including the
//!   empty string) acknowledge a motion command,
//! - longer text payloads are semicolon-delimited telemetry records.

/// Longest text payload that is still treated as an acknowledgment.
pub const ACK_MAX_LEN: usize = 13;

/// Raw payload of one received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Text message.
    Text(&'a str),
    /// Binary message.
    Binary(&'a [u8]),
}

/// A classified inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Inbound<'a> {
    /// Acknowledgment: empty sentinel or exact echo of a motion command.
    Ack(&'a str),
    /// Semicolon-delimited telemetry record.
    Telemetry(&'a str),
    /// Whole camera image.
    Image(&'a [u8]),
}

/// Classify a received payload.
///
/// # Example
///
/// ```
/// use mowbot_proto::{classify, Inbound, Payload};
///
/// assert_eq!(classify(Payload::Text("")), Inbound::Ack(""));
/// assert_eq!(classify(Payload::Text("[0.73 125.4]")), Inbound::Ack("[0.73 125.4]"));
/// assert!(matches!(classify(Payload::Text("1;2;271.5;0;0;")), Inbound::Telemetry(_)));
/// ```
pub fn classify(payload: Payload<'_>) -> Inbound<'_> {
    match payload {
        Payload::Binary(data) => Inbound::Image(data),
        Payload::Text(text) if text.chars().count() <= ACK_MAX_LEN => Inbound::Ack(text),
        Payload::Text(text) => Inbound::Telemetry(text),
    }
}
