//! Status reporting on the defmt console and the on-board LED.

use embassy_time::Duration;
use mowbot_core::{Alert, AlertLevel, AlertSink, ConnectionState};

/// Alert sink that logs to the defmt console.
///
/// Remembers whether a persistent alert was raised; a persistent alert is
/// never cleared.
#[derive(Debug, Default)]
pub struct ConsoleAlerts {
    persistent: bool,
    shown: bool,
}

impl ConsoleAlerts {
    pub const fn new() -> Self {
        Self {
            persistent: false,
            shown: false,
        }
    }
}

impl AlertSink for ConsoleAlerts {
    async fn raise(&mut self, alert: &Alert) {
        match alert.level {
            AlertLevel::Transient => defmt::warn!("ALERT: {}", alert.message.as_str()),
            AlertLevel::Persistent => {
                defmt::error!("ALERT: {}", alert.message.as_str());
                self.persistent = true;
            }
        }
        self.shown = true;
    }

    async fn clear(&mut self) {
        if self.shown && !self.persistent {
            defmt::info!("alert cleared");
            self.shown = false;
        }
    }
}

/// LED toggle period for a connection state.
///
/// Fast blink while searching for the robot, slow blink while connected.
#[must_use]
pub const fn blink_period(state: ConnectionState) -> Duration {
    match state {
        ConnectionState::Open => Duration::from_millis(1000),
        _ => Duration::from_millis(250),
    }
}
