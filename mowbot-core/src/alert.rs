//! User-facing alerts.

use core::fmt::Write;
use core::future::Future;

use embassy_time::Instant;

use crate::error::{ConfigurationFault, Fault};

/// Longest alert text.
pub const MAX_ALERT_LEN: usize = 48;

/// How long an alert stays on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlertLevel {
    /// Shown until the next successful connection.
    Transient,
    /// Shown until power off.
    Persistent,
}

/// An alert for the display collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    /// Human-readable text, at most [`MAX_ALERT_LEN`] bytes.
    pub message: heapless::String<MAX_ALERT_LEN>,
}

impl Alert {
    /// Build the alert for `fault`. Fatal faults are persistent.
    pub fn from_fault(fault: &Fault) -> Self {
        let level = if fault.is_fatal() {
            AlertLevel::Persistent
        } else {
            AlertLevel::Transient
        };
        let mut message = heapless::String::new();
        // messages are fixed texts well below the limit
        let _ = write!(message, "{fault}");
        Self { level, message }
    }
}

impl From<Fault> for Alert {
    fn from(fault: Fault) -> Self {
        Self::from_fault(&fault)
    }
}

/// Async trait for whatever shows alerts to the user.
pub trait AlertSink {
    /// Show an alert, replacing any transient one.
    fn raise(&mut self, alert: &Alert) -> impl Future<Output = ()>;

    /// Remove the transient alert (connection is healthy again).
    fn clear(&mut self) -> impl Future<Output = ()>;
}

/// Log a fault with its timestamp and raise the matching alert.
pub async fn report<A: AlertSink>(alerts: &mut A, fault: Fault, now: Instant) {
    if fault.is_fatal() {
        error!("[{} ms] {:?}", now.as_millis(), fault);
    } else {
        warn!("[{} ms] {:?}", now.as_millis(), fault);
    }
    alerts.raise(&Alert::from_fault(&fault)).await;
}

/// Check that the wireless chip is present.
///
/// A missing radio is reported once as a persistent alert; the caller must
/// not start the session manager.
pub async fn require_radio<A: AlertSink>(
    present: bool,
    alerts: &mut A,
    now: Instant,
) -> Result<(), Fault> {
    if present {
        return Ok(());
    }
    let fault = Fault::Configuration(ConfigurationFault::NoRadio);
    report(alerts, fault, now).await;
    Err(fault)
}
