//! Compile-time engine configuration.
//!
//! Every component takes its own config struct. Each struct has a `DEFAULT`
//! value describing the reference remote; build a custom one with struct
//! update syntax:
//!
//! ```
//! use mowbot_core::config::{EngineConfig, LinkConfig};
//!
//! const MY_CONFIG: EngineConfig = EngineConfig {
//!     link: LinkConfig {
//!         host: "192.168.4.1",
//!         token: "s3cret",
//!         ..LinkConfig::DEFAULT
//!     },
//!     ..EngineConfig::DEFAULT
//! };
//! assert_eq!(MY_CONFIG.link.port, 8008);
//! ```

use embassy_time::Duration;
use mowbot_proto::ConnectTarget;

/// Stick normalization and deadzone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Raw ADC reading of a centred axis (16-bit scale).
    pub center: u16,
    /// Raw distance from centre that maps to full deflection.
    pub span: f32,
    /// Negate the X axis after centring.
    pub invert_x: bool,
    /// Negate the Y axis after centring (pushing forward reads low).
    pub invert_y: bool,
    /// Force at or below this value is treated as rest.
    pub deadzone: f32,
    /// Interval between samples.
    pub tick: Duration,
}

impl SamplerConfig {
    pub const DEFAULT: Self = Self {
        center: 32768,
        span: 28456.0,
        invert_x: false,
        invert_y: true,
        deadzone: 0.3,
        tick: Duration::from_millis(290),
    };
}

/// Hysteresis applied before a new motion command is emitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoalescerConfig {
    /// Smallest bearing change (degrees) that triggers a new command.
    pub bearing_threshold: f32,
}

impl CoalescerConfig {
    pub const DEFAULT: Self = Self {
        bearing_threshold: 5.0,
    };
}

/// Delivery queue stall detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue length above which the session is considered stalled.
    pub stall_len: usize,
    /// Retransmissions of one pending command above which the session is
    /// considered stalled.
    pub stall_retries: u32,
    /// Minimum interval between two transmissions.
    pub send_interval: Duration,
}

impl QueueConfig {
    pub const DEFAULT: Self = Self {
        stall_len: 5,
        stall_retries: 5,
        send_interval: Duration::from_millis(150),
    };
}

/// Telemetry and image polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Scheduler tick.
    pub tick: Duration,
    /// Minimum time between two image requests.
    pub image_interval: Duration,
    /// A telemetry request is emitted every `telemetry_divider` ticks.
    pub telemetry_divider: u32,
    /// Request camera images at all.
    pub images: bool,
}

impl PollConfig {
    pub const DEFAULT: Self = Self {
        tick: Duration::from_millis(500),
        image_interval: Duration::from_millis(1900),
        telemetry_divider: 4,
        images: true,
    };
}

/// How many consecutive failed connection attempts are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetryBudget {
    /// Retry forever.
    Unbounded,
    /// Give up after this many consecutive failures. Any successful
    /// handshake resets the count.
    Consecutive(u32),
}

impl RetryBudget {
    /// Whether `failures` consecutive failures exhaust the budget.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(self, failures: u32) -> bool {
        match self {
            RetryBudget::Unbounded => false,
            RetryBudget::Consecutive(limit) => failures >= limit,
        }
    }
}

/// Persistent connection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    /// Robot hostname or IPv4 literal.
    pub host: &'static str,
    /// TCP port of the robot's WebSocket endpoint.
    pub port: u16,
    /// Request path of the control endpoint.
    pub path: &'static str,
    /// Authentication token sent in the handshake query.
    pub token: &'static str,
    /// Feature-negotiation query pair.
    pub feature: Option<&'static str>,
    /// Bound on one receive wait while the session is open.
    pub recv_wait: Duration,
    /// Delay between a failure and the next attempt.
    pub backoff: Duration,
    pub retry_budget: RetryBudget,
    /// Position of the heading in a telemetry record.
    pub heading_field: usize,
}

impl LinkConfig {
    pub const DEFAULT: Self = Self {
        host: "pimowbot.local",
        port: 8008,
        path: "/cgi-bin/control.html",
        token: "12345",
        feature: Some("thumb=mode"),
        recv_wait: Duration::from_millis(50),
        backoff: Duration::from_secs(1),
        retry_budget: RetryBudget::Unbounded,
        heading_field: 0,
    };

    /// Handshake target for this link.
    #[must_use]
    pub const fn target(&self) -> ConnectTarget<'static> {
        ConnectTarget {
            host: self.host,
            port: self.port,
            path: self.path,
            token: self.token,
            feature: self.feature,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sampler: SamplerConfig,
    pub coalescer: CoalescerConfig,
    pub queue: QueueConfig,
    pub poll: PollConfig,
    pub link: LinkConfig,
}

impl EngineConfig {
    pub const DEFAULT: Self = Self {
        sampler: SamplerConfig::DEFAULT,
        coalescer: CoalescerConfig::DEFAULT,
        queue: QueueConfig::DEFAULT,
        poll: PollConfig::DEFAULT,
        link: LinkConfig::DEFAULT,
    };
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
