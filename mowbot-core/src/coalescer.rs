//! Command Coalescer: hysteresis between samples and emitted commands.
//!
//! A new `Move` is emitted only when the clamped force changes or the
//! bearing moves by at least the configured threshold. Returning to rest
//! emits a single `Stop`. The button is edge-triggered.

use mowbot_proto::{ActionToken, Command};

use crate::config::CoalescerConfig;
use crate::sampler::Sample;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Last {
    Nothing,
    Stop,
    Move { force: f32, bearing: f32 },
}

/// Suppresses repeated or jittery commands.
#[derive(Debug, Clone, Copy)]
pub struct Coalescer {
    config: CoalescerConfig,
    last: Last,
    button_held: bool,
}

impl Coalescer {
    /// Create a coalescer that has emitted nothing yet.
    pub const fn new(config: CoalescerConfig) -> Self {
        Self {
            config,
            last: Last::Nothing,
            button_held: false,
        }
    }

    /// Forget the last emitted command so the next sample is emitted again.
    pub fn reset(&mut self) {
        self.last = Last::Nothing;
    }

    /// Feed one stick sample. Returns the command to enqueue, if any.
    pub fn observe(&mut self, sample: Sample) -> Option<Command> {
        match sample {
            Sample::Rest => {
                if self.last == Last::Stop {
                    return None;
                }
                self.last = Last::Stop;
                Some(Command::Stop)
            }
            Sample::Motion { force, bearing } => {
                let force = force.min(1.0);
                let changed = match self.last {
                    Last::Move {
                        force: last_force,
                        bearing: last_bearing,
                    } => {
                        force != last_force
                            || bearing_delta(bearing, last_bearing) >= self.config.bearing_threshold
                    }
                    Last::Nothing | Last::Stop => true,
                };
                if !changed {
                    return None;
                }
                self.last = Last::Move { force, bearing };
                Some(Command::Move { force, bearing })
            }
        }
    }

    /// Feed the button level. Emits the action once per press.
    pub fn press(&mut self, held: bool) -> Option<Command> {
        let rising = held && !self.button_held;
        self.button_held = held;
        rising.then_some(Command::Action(ActionToken::Mower))
    }
}

/// Smallest angle between two bearings, in `0.0..=180.0`.
fn bearing_delta(a: f32, b: f32) -> f32 {
    let delta = libm::fabsf(a - b) % 360.0;
    if delta > 180.0 {
        360.0 - delta
    } else {
        delta
    }
}
