//! Input task: sampler and coalescer feeding the delivery queue.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Instant, Timer};
use mowbot_proto::Command;

use crate::coalescer::Coalescer;
use crate::config::{CoalescerConfig, SamplerConfig};
use crate::sampler::{InputError, Sampler, StickSource};
use crate::session::Session;

/// Samples the stick on a fixed tick and enqueues coalesced commands.
pub struct InputTask<S> {
    stick: S,
    sampler: Sampler,
    coalescer: Coalescer,
}

impl<S: StickSource> InputTask<S> {
    /// Create an input task reading `stick`.
    pub const fn new(stick: S, sampler: SamplerConfig, coalescer: CoalescerConfig) -> Self {
        Self {
            stick,
            sampler: Sampler::new(sampler),
            coalescer: Coalescer::new(coalescer),
        }
    }

    /// Read the stick once and enqueue whatever the coalescer emits.
    ///
    /// Returns the commands handed to the session, action first.
    pub async fn step<M: RawMutex>(
        &mut self,
        session: &Session<M>,
    ) -> Result<[Option<Command>; 2], InputError> {
        if session.take_resync() {
            self.coalescer.reset();
        }

        let raw = self.stick.read().await?;

        let action = self.coalescer.press(raw.button);
        if let Some(cmd) = action {
            if session.enqueue_action(cmd).is_none() {
                debug!("action dropped, session not open");
            }
        }

        let motion = self.coalescer.observe(self.sampler.sample_raw(raw));
        if let Some(cmd) = motion {
            if session.enqueue_motion(cmd).is_none() {
                // the coalescer must emit this again once the session opens
                self.coalescer.reset();
            }
        }

        Ok([action, motion])
    }

    /// Sample forever on the configured tick.
    pub async fn run<M: RawMutex>(&mut self, session: &Session<M>) -> ! {
        loop {
            if let Err(e) = self.step(session).await {
                warn!("[{} ms] stick read failed: {:?}", Instant::now().as_millis(), e);
            }
            Timer::after(self.sampler.config().tick).await;
        }
    }
}
