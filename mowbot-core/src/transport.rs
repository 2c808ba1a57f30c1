//! Transport trait for the persistent connection.

use core::future::Future;
use mowbot_proto::ConnectTarget;

use crate::error::TransportFault;

/// Kind of a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadKind {
    Text,
    Binary,
    /// Binary message larger than the receive buffer. The transport skipped
    /// its payload; nothing was copied and `len` is the declared length.
    Oversized,
}

/// A complete message copied into the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Received {
    pub kind: PayloadKind,
    /// Bytes written to the start of the buffer, or the skipped length for
    /// [`PayloadKind::Oversized`].
    pub len: usize,
}

/// Async trait for a message-oriented connection to the robot.
///
/// Implementations handle framing and control traffic (ping/pong, close)
/// themselves and surface only complete text or binary messages.
pub trait Transport {
    /// Open the connection and complete the handshake.
    fn connect(
        &mut self,
        target: &ConnectTarget<'_>,
    ) -> impl Future<Output = Result<(), TransportFault>>;

    /// Send one text message.
    fn send_text(&mut self, text: &str) -> impl Future<Output = Result<(), TransportFault>>;

    /// Wait for the next complete message and copy it into `buf`.
    ///
    /// Must be cancel-safe: the session manager bounds every call with a
    /// timeout and drops the future when it expires. Bytes already read from
    /// the network must not be lost.
    ///
    /// A binary message that does not fit `buf` is skipped and reported as
    /// [`PayloadKind::Oversized`]; the connection stays usable. A text
    /// message that does not fit is a protocol fault.
    fn receive(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<Received, TransportFault>>;

    /// Tear the connection down. Never fails.
    fn close(&mut self) -> impl Future<Output = ()>;
}
