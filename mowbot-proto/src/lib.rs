//! Wire protocol types, parsing, and serialization for the PiMowBot remote.
//!
//! This crate provides everything needed to talk to the robot over its
//! persistent WebSocket connection:
//!
//! - **Commands**: outbound command values and their text encoding
//!   - [`Command`] - motion, stop, action and poll commands
//!   - [`ActionToken`] - one-shot actions
//!   - [`Command::encode()`] - wire text, e.g. `[0.73 125.4]`
//!
//! - **Inbound**: classification of robot payloads
//!   - [`classify()`] - acknowledgment, telemetry record or image
//!   - [`TelemetryRecord`] - semicolon-delimited telemetry fields
//!
//! - **Session**: connection setup and framing
//!   - [`ConnectTarget`] - host, port, path, token and feature mode
//!   - [`write_upgrade_request()`] / [`check_upgrade_response()`] - HTTP upgrade
//!   - [`encode_frame()`] / [`decode_frame()`] - RFC 6455 frames
//!
//! # Protocol Format
//!
//! ```text
//! remote -> robot   [<force> <bearing>] | [0 0] | mower | 0 | 1
//! robot -> remote   "" or echo         acknowledgment (<= 13 chars)
//!                   a;b;c;...          telemetry record
//!                   <binary>           camera image (JPEG)
//! ```
//!
//! # Example
//!
//! ```
//! use mowbot_proto::{classify, Command, Inbound, Payload};
//!
//! let cmd = Command::Move { force: 0.73, bearing: 125.4 };
//! let text = cmd.encode();
//! assert_eq!(text.as_str(), "[0.73 125.4]");
//!
//! // The robot acknowledges by echoing the command.
//! match classify(Payload::Text(text.as_str())) {
//!     Inbound::Ack(echo) => assert!(cmd.matches_echo(echo)),
//!     _ => unreachable!(),
//! }
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod command;
pub mod frame;
pub mod handshake;
pub mod inbound;
pub mod telemetry;

pub use command::{
    ActionToken, Command, WireText, MAX_COMMAND_LEN, POLL_IMAGE_TEXT, POLL_TELEMETRY_TEXT,
    STOP_TEXT,
};
pub use frame::{
    decode_frame, decode_frame_with_capacity, decode_header, encode_frame, Frame, FrameError,
    FrameHeader, Opcode, MAX_CONTROL_PAYLOAD, MAX_HEADER_LEN,
};
pub use handshake::{
    check_upgrade_response, encode_key, write_upgrade_request, ConnectTarget, HandshakeError, Uri,
    MAX_URI_LEN,
};
pub use inbound::{classify, Inbound, Payload, ACK_MAX_LEN};
pub use telemetry::{TelemetryError, TelemetryRecord};
