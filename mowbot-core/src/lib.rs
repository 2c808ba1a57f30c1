//! Platform-agnostic command delivery engine for the PiMowBot remote.
//!
//! The engine turns stick and button input into commands for the robot and
//! delivers them over one persistent connection, retransmitting motion
//! commands until they are acknowledged and reconnecting on failure. It has
//! no platform dependencies and runs unchanged on the Pico W and on host.
//!
//! # Overview
//!
//! - [`sampler`]: stick readings to force and bearing ([`Sampler`], [`StickSource`])
//! - [`coalescer`]: hysteresis and button edges ([`Coalescer`])
//! - [`queue`]: outbound queue and ack protocol ([`DeliveryQueue`])
//! - [`poll`]: periodic image and telemetry requests ([`PollScheduler`])
//! - [`link`]: connection lifecycle ([`SessionManager`], [`Transport`])
//! - [`session`]: state shared by all tasks ([`Session`])
//!
//! # Tasks
//!
//! Three tasks share one [`Session`]:
//!
//! ```text
//! InputTask ──motion/action──┐
//!                            v
//! PollScheduler ──polls──> Session (queue, ack state, connection state, telemetry)
//!                            ^
//! SessionManager <──send/ack─┘──> Transport <──> robot
//! ```
//!
//! # Example
//!
//! ```
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use mowbot_core::{Command, Session, QueueConfig};
//!
//! let session: Session<NoopRawMutex> = Session::new(QueueConfig::DEFAULT);
//!
//! // nothing is queued until the session manager opens the connection
//! assert!(session.enqueue_motion(Command::Stop).is_none());
//! assert_eq!(session.queue_len(), 0);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log through defmt instead of the `log` facade

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod macros;

pub mod alert;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod image;
pub mod link;
pub mod poll;
pub mod queue;
pub mod sampler;
pub mod session;
pub mod tasks;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use alert::{require_radio, Alert, AlertLevel, AlertSink};
pub use coalescer::Coalescer;
pub use config::{
    CoalescerConfig, EngineConfig, LinkConfig, PollConfig, QueueConfig, RetryBudget,
    SamplerConfig,
};
pub use error::{ConfigurationFault, Fault, SessionError, StallReason, TransportFault};
pub use image::{ImageStore, MemoryImageStore, StoreError};
pub use link::SessionManager;
pub use poll::PollScheduler;
pub use queue::{AckState, DeliveryQueue, Enqueued, TrySend, QUEUE_CAPACITY};
pub use sampler::{InputError, RawStick, Sample, Sampler, StickSource};
pub use session::{ConnectionState, Session};
pub use tasks::InputTask;
pub use telemetry::Telemetry;
pub use transport::{PayloadKind, Received, Transport};

pub use mowbot_proto::{ActionToken, Command};
