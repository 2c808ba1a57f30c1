//! Outbound command values and their text encoding.
//!
//! Every command the remote sends is a short ASCII text frame:
//!
//! ```text
//! [<force> <bearing>]   motion, e.g. [0.73 125.4]
//! [0 0]                 stop
//! mower                 one-shot action
//! 0                     image refresh request
//! 1                     telemetry request
//! ```

use core::fmt::Write;

/// Maximum length of an encoded command.
///
/// Breakdown: `[`(1) + force(4) + space(1) + bearing(5) + `]`(1) = 12.
/// Non-finite values print as `NaN`/`inf`, which are shorter.
pub const MAX_COMMAND_LEN: usize = 16;

/// Encoded command text, ready to be sent as a text frame.
pub type WireText = heapless::String<MAX_COMMAND_LEN>;

/// Wire literal for the canonical zero-motion command.
pub const STOP_TEXT: &str = "[0 0]";

/// Wire literal for an image refresh request.
pub const POLL_IMAGE_TEXT: &str = "0";

/// Wire literal for a telemetry request.
pub const POLL_TELEMETRY_TEXT: &str = "1";

/// One-shot action understood by the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActionToken {
    /// Toggle the mowing motor on or off.
    Mower,
}

impl ActionToken {
    /// Wire literal for this action.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ActionToken::Mower => "mower",
        }
    }
}

/// A command travelling from the remote to the robot.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Drive with normalized `force` (0.0..=1.0) towards `bearing`
    /// (compass degrees, 0 = forward, clockwise).
    Move { force: f32, bearing: f32 },
    /// Canonical zero-motion marker.
    Stop,
    /// One-shot, fire-and-forget action.
    Action(ActionToken),
    /// Low-priority image refresh request.
    PollImage,
    /// Low-priority telemetry request.
    PollTelemetry,
}

impl Command {
    /// Motion commands (`Move`/`Stop`) are delivered at-least-once and
    /// must be acknowledged by the robot.
    #[inline]
    #[must_use]
    pub const fn is_motion(&self) -> bool {
        matches!(self, Command::Move { .. } | Command::Stop)
    }

    /// Poll tokens are deduplicated and never acknowledged.
    #[inline]
    #[must_use]
    pub const fn is_poll(&self) -> bool {
        matches!(self, Command::PollImage | Command::PollTelemetry)
    }

    /// Encode the command into its wire text.
    ///
    /// Force is clamped to `0.0..=1.0` and printed with two decimals,
    /// bearing is folded into `0.0..360.0` and printed with one decimal,
    /// so a `Move` always fits in [`MAX_COMMAND_LEN`].
    #[must_use]
    pub fn encode(&self) -> WireText {
        let mut text = WireText::new();
        let written = match self {
            Command::Move { force, bearing } => write!(
                text,
                "[{:.2} {:.1}]",
                force.clamp(0.0, 1.0),
                fold_bearing(*bearing)
            ),
            Command::Stop => text.write_str(STOP_TEXT),
            Command::Action(token) => text.write_str(token.as_str()),
            Command::PollImage => text.write_str(POLL_IMAGE_TEXT),
            Command::PollTelemetry => text.write_str(POLL_TELEMETRY_TEXT),
        };
        debug_assert!(written.is_ok(), "command text exceeds MAX_COMMAND_LEN");
        text
    }

    /// Check whether `echo` is the exact wire text of this command.
    #[inline]
    #[must_use]
    pub fn matches_echo(&self, echo: &str) -> bool {
        self.encode().as_str() == echo
    }
}

/// Fold a bearing into `0.0..360.0`.
fn fold_bearing(bearing: f32) -> f32 {
    let folded = bearing % 360.0;
    let folded = if folded < 0.0 { folded + 360.0 } else { folded };
    // tiny negatives round up to exactly 360.0 in f32; -0.0 would print as "-0.0"
    if folded >= 360.0 || folded == 0.0 {
        0.0
    } else {
        folded
    }
}
