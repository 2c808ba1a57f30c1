//! PiMowBot handheld remote for the Raspberry Pi Pico W.
//!
//! Board glue around [`mowbot_core`]: the analog stick on the ADC, the
//! WebSocket transport on top of embassy-net and the CYW43 radio, and
//! status output on the defmt console and the on-board LED.

#![no_std]

// Re-export core types for convenience
pub use mowbot_core::{
    require_radio, ConnectionState, EngineConfig, InputTask, LinkConfig, MemoryImageStore,
    PollScheduler, Session, SessionManager,
};

pub mod status;
pub mod stick;
pub mod ws_transport;

pub use status::{blink_period, ConsoleAlerts};
pub use stick::AdcStick;
pub use ws_transport::WsTransport;
