//! Fault taxonomy.
//!
//! | kind                 | recovery                     | alert                  |
//! |----------------------|------------------------------|------------------------|
//! | [`TransportFault`]   | backoff and reconnect        | transient, per failure |
//! | [`StallReason`]      | forced reconnect             | generic disconnect     |
//! | [`ConfigurationFault`] | none, dependent task stops | persistent, once       |

use core::fmt;
use mowbot_proto::{FrameError, HandshakeError};

/// Failure of the persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportFault {
    /// Robot unreachable (DNS, TCP connect).
    Connect,
    /// Upgrade answered with a non-101 status.
    HandshakeRejected(u16),
    /// Upgrade response could not be parsed.
    HandshakeMalformed,
    Read,
    Write,
    /// Peer closed the connection.
    Closed,
    /// Invalid or unsupported frame.
    Protocol(FrameError),
    /// No answer within the handshake deadline.
    Timeout,
}

impl From<FrameError> for TransportFault {
    fn from(err: FrameError) -> Self {
        TransportFault::Protocol(err)
    }
}

impl From<HandshakeError> for TransportFault {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::Rejected(status) => TransportFault::HandshakeRejected(status),
            HandshakeError::Malformed | HandshakeError::BufferTooSmall => {
                TransportFault::HandshakeMalformed
            }
        }
    }
}

/// Why the delivery queue forced a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StallReason {
    /// Too many entries waiting.
    QueueSaturated { len: usize },
    /// The pending motion command was retransmitted too often.
    Unacknowledged { retries: u32 },
}

/// Required hardware capability is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationFault {
    /// No wireless chip answered.
    NoRadio,
}

/// Any fault the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    Transport(TransportFault),
    ProtocolStall(StallReason),
    Configuration(ConfigurationFault),
}

impl Fault {
    /// Configuration faults stop the task that depends on them.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Fault::Configuration(_))
    }
}

impl From<TransportFault> for Fault {
    fn from(fault: TransportFault) -> Self {
        Fault::Transport(fault)
    }
}

impl From<StallReason> for Fault {
    fn from(reason: StallReason) -> Self {
        Fault::ProtocolStall(reason)
    }
}

impl From<ConfigurationFault> for Fault {
    fn from(fault: ConfigurationFault) -> Self {
        Fault::Configuration(fault)
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFault::Connect => f.write_str("PiMowBot not found"),
            TransportFault::HandshakeRejected(status) => write!(f, "Access denied ({status})"),
            TransportFault::HandshakeMalformed => f.write_str("Bad handshake"),
            TransportFault::Read => f.write_str("Receive failed"),
            TransportFault::Write => f.write_str("Send failed"),
            TransportFault::Closed => f.write_str("Robot disconnected"),
            TransportFault::Protocol(_) => f.write_str("Protocol error"),
            TransportFault::Timeout => f.write_str("Robot not answering"),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Transport(fault) => fault.fmt(f),
            // stalls surface as a plain disconnect
            Fault::ProtocolStall(_) => TransportFault::Closed.fmt(f),
            Fault::Configuration(ConfigurationFault::NoRadio) => f.write_str("Pico W required"),
        }
    }
}

/// Error returned when a session run loop gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    /// The configured consecutive-failure budget was used up.
    RetryBudgetExhausted { failures: u32 },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::RetryBudgetExhausted { failures } => {
                write!(f, "gave up after {failures} failed attempts")
            }
        }
    }
}
