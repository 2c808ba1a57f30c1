//! Poll Scheduler: periodic image and telemetry requests.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Instant, Timer};
use mowbot_proto::Command;

use crate::config::PollConfig;
use crate::queue::Enqueued;
use crate::session::Session;

/// Injects poll tokens into the delivery queue while the session is open.
#[derive(Debug)]
pub struct PollScheduler {
    config: PollConfig,
    ticks: u32,
    last_image: Option<Instant>,
}

impl PollScheduler {
    /// Create a scheduler that has not requested anything yet.
    pub const fn new(config: PollConfig) -> Self {
        Self {
            config,
            ticks: 0,
            last_image: None,
        }
    }

    /// Run one scheduler tick at `now`.
    pub fn tick<M: RawMutex>(&mut self, session: &Session<M>, now: Instant) {
        if !session.is_open() {
            return;
        }
        self.ticks = self.ticks.wrapping_add(1);

        if self.config.images && self.image_due(now) && !session.has_queued(Command::PollImage) {
            if let Some(Enqueued::Appended) = session.enqueue_poll(Command::PollImage) {
                self.last_image = Some(now);
            }
        }

        let divider = self.config.telemetry_divider;
        if divider > 0 && self.ticks % divider == 0 {
            let _ = session.enqueue_poll(Command::PollTelemetry);
        }
    }

    fn image_due(&self, now: Instant) -> bool {
        match self.last_image {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.config.image_interval,
        }
    }

    /// Tick forever on the configured interval.
    pub async fn run<M: RawMutex>(&mut self, session: &Session<M>) -> ! {
        loop {
            self.tick(session, Instant::now());
            Timer::after(self.config.tick).await;
        }
    }
}
