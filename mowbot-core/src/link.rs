//! Transport Session Manager.
//!
//! Owns the connection lifecycle and is the only writer of the
//! [`ConnectionState`]:
//!
//! ```text
//! Disconnected ──> Handshaking ──ok──> Open ──stall──> Disconnected
//!      ^                │               │
//!      │              error           error
//!      │                v               v
//!      └──backoff─── Faulted <──────────┘
//! ```
//!
//! While open, each step sends at most one command from the delivery queue
//! (rate limited to the send interval) and then waits a bounded time for one
//! inbound message, which is classified and dispatched.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use mowbot_proto::{classify, Inbound, Payload, TelemetryRecord};

use crate::alert::{report, AlertSink};
use crate::config::LinkConfig;
use crate::error::{Fault, SessionError, TransportFault};
use crate::image::ImageStore;
use crate::queue::TrySend;
use crate::session::{ConnectionState, Session};
use crate::transport::{PayloadKind, Received, Transport};

/// Drives one [`Transport`] on behalf of a [`Session`].
///
/// `rx` receives inbound messages and must be large enough for a whole
/// camera image.
pub struct SessionManager<'a, T, I, A> {
    transport: T,
    images: I,
    alerts: A,
    config: LinkConfig,
    send_interval: Duration,
    rx: &'a mut [u8],
    failures: u32,
    last_send: Option<Instant>,
}

impl<'a, T, I, A> SessionManager<'a, T, I, A>
where
    T: Transport,
    I: ImageStore,
    A: AlertSink,
{
    /// Create a disconnected manager. Sends are spaced at least
    /// `send_interval` apart.
    pub fn new(
        transport: T,
        images: I,
        alerts: A,
        config: LinkConfig,
        send_interval: Duration,
        rx: &'a mut [u8],
    ) -> Self {
        Self {
            transport,
            images,
            alerts,
            config,
            send_interval,
            rx,
            failures: 0,
            last_send: None,
        }
    }

    /// Consecutive failed attempts since the last successful handshake.
    #[inline]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Get a reference to the image store.
    pub fn images(&self) -> &I {
        &self.images
    }

    /// Get a reference to the alert sink.
    pub fn alerts(&self) -> &A {
        &self.alerts
    }

    /// Run the state machine until the retry budget is exhausted.
    ///
    /// With [`RetryBudget::Unbounded`](crate::config::RetryBudget::Unbounded)
    /// this never returns.
    pub async fn run<M: RawMutex>(&mut self, session: &Session<M>) -> SessionError {
        loop {
            if let Err(e) = self.step(session).await {
                error!("[{} ms] session stopped: {:?}", Instant::now().as_millis(), e);
                return e;
            }
        }
    }

    /// Advance the state machine by one step.
    pub async fn step<M: RawMutex>(&mut self, session: &Session<M>) -> Result<(), SessionError> {
        match session.connection_state() {
            ConnectionState::Disconnected => {
                if self.config.retry_budget.is_exhausted(self.failures) {
                    return Err(SessionError::RetryBudgetExhausted {
                        failures: self.failures,
                    });
                }
                session.set_state(ConnectionState::Handshaking);
            }
            ConnectionState::Handshaking => self.handshake(session).await,
            ConnectionState::Open => self.service(session).await,
            ConnectionState::Faulted => {
                Timer::after(self.config.backoff).await;
                session.set_state(ConnectionState::Disconnected);
            }
        }
        Ok(())
    }

    async fn handshake<M: RawMutex>(&mut self, session: &Session<M>) {
        let target = self.config.target();
        match self.transport.connect(&target).await {
            Ok(()) => {
                if let Ok(uri) = target.uri() {
                    info!("session open: {}", uri.as_str());
                }
                self.failures = 0;
                self.last_send = None;
                session.open();
                self.alerts.clear().await;
            }
            Err(fault) => self.fail(session, fault).await,
        }
    }

    async fn service<M: RawMutex>(&mut self, session: &Session<M>) {
        let now = Instant::now();
        let due = match self.last_send {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.send_interval,
        };

        if due {
            self.last_send = Some(now);
            match session.try_send() {
                TrySend::Idle => {}
                TrySend::Transmit(cmd) => {
                    let text = cmd.encode();
                    if let Err(fault) = self.transport.send_text(text.as_str()).await {
                        self.fail(session, fault).await;
                        return;
                    }
                    debug!("sent {} ({} bytes)", text.as_str(), text.len());
                }
                TrySend::Stall(reason) => {
                    session.force_disconnect();
                    self.transport.close().await;
                    report(&mut self.alerts, Fault::ProtocolStall(reason), now).await;
                    return;
                }
            }
        }

        match with_timeout(self.config.recv_wait, self.transport.receive(&mut *self.rx)).await {
            Err(_) => {}
            Ok(Err(fault)) => self.fail(session, fault).await,
            Ok(Ok(received)) => self.dispatch(session, received).await,
        }
    }

    async fn dispatch<M: RawMutex>(&mut self, session: &Session<M>, received: Received) {
        let now = Instant::now();
        if received.kind == PayloadKind::Oversized {
            warn!(
                "image of {} bytes skipped, buffer holds {}",
                received.len,
                self.rx.len()
            );
            return;
        }
        let Some(data) = self.rx.get(..received.len) else {
            self.fail(session, TransportFault::Read).await;
            return;
        };
        debug!("received {} bytes", received.len);

        let payload = match received.kind {
            PayloadKind::Binary => Payload::Binary(data),
            // skipped above
            PayloadKind::Oversized => return,
            PayloadKind::Text => match core::str::from_utf8(data) {
                Ok(text) => Payload::Text(text),
                Err(_) => {
                    warn!("ignoring text message that is not UTF-8");
                    return;
                }
            },
        };

        match classify(payload) {
            Inbound::Image(image) => {
                if let Err(e) = self.images.store(image).await {
                    warn!("image dropped: {:?}", e);
                }
            }
            Inbound::Ack(text) => {
                if !session.on_ack(text) {
                    trace!("unmatched acknowledgment");
                }
            }
            Inbound::Telemetry(text) => {
                let record = TelemetryRecord::new(text);
                let heading = match record.heading(self.config.heading_field) {
                    Ok(heading) => Some(heading),
                    Err(e) => {
                        debug!("telemetry without heading: {:?}", e);
                        None
                    }
                };
                session.record_telemetry(record.as_str(), heading, now);
            }
        }
    }

    async fn fail<M: RawMutex>(&mut self, session: &Session<M>, fault: TransportFault) {
        session.fail();
        self.failures = self.failures.saturating_add(1);
        self.transport.close().await;
        report(&mut self.alerts, Fault::Transport(fault), Instant::now()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use mowbot_proto::{ActionToken, Command, FrameError};

    use crate::alert::AlertLevel;
    use crate::config::{QueueConfig, RetryBudget};
    use crate::image::MemoryImageStore;
    use crate::testing::{MockTransport, RecordingAlerts};

    const MOVE: Command = Command::Move {
        force: 0.73,
        bearing: 125.4,
    };

    const TEST_LINK: LinkConfig = LinkConfig {
        recv_wait: Duration::from_millis(1),
        backoff: Duration::from_ticks(0),
        ..LinkConfig::DEFAULT
    };

    type Manager<'a> = SessionManager<'a, MockTransport, MemoryImageStore<16>, RecordingAlerts>;

    fn manager(rx: &mut [u8], link: LinkConfig) -> Manager<'_> {
        SessionManager::new(
            MockTransport::default(),
            MemoryImageStore::new(),
            RecordingAlerts::default(),
            link,
            Duration::from_ticks(0),
            rx,
        )
    }

    fn session() -> Session<NoopRawMutex> {
        Session::new(QueueConfig::DEFAULT)
    }

    fn open(m: &mut Manager<'_>, s: &Session<NoopRawMutex>) {
        block_on(m.step(s)).unwrap();
        assert_eq!(s.connection_state(), ConnectionState::Handshaking);
        block_on(m.step(s)).unwrap();
        assert_eq!(s.connection_state(), ConnectionState::Open);
    }

    #[test]
    fn test_handshake_opens_session() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);
        assert_eq!(m.transport().connect_calls, 1);
        assert_eq!(m.alerts().clears, 1);
        assert!(s.take_resync());
    }

    #[test]
    fn test_unacknowledged_motion_forces_reconnect() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);

        assert!(s.enqueue_motion(MOVE).is_some());
        for _ in 0..6 {
            block_on(m.step(&s)).unwrap();
            assert_eq!(s.connection_state(), ConnectionState::Open);
        }
        assert_eq!(m.transport().sent.len(), 6);
        assert!(m.transport().sent.iter().all(|t| t == "[0.73 125.4]"));

        // seventh tick: stall, nothing sent
        block_on(m.step(&s)).unwrap();
        assert_eq!(m.transport().sent.len(), 6);
        assert_eq!(s.connection_state(), ConnectionState::Disconnected);
        assert_eq!(s.queue_len(), 0);
        assert_eq!(s.ack_state().retries, 0);
        assert_eq!(m.transport().closes, 1);
        assert_eq!(m.alerts().raised.len(), 1);
        assert_eq!(m.alerts().raised[0].message.as_str(), "Robot disconnected");
        // a stall does not count against the retry budget
        assert_eq!(m.failures(), 0);

        block_on(m.step(&s)).unwrap();
        assert_eq!(s.connection_state(), ConnectionState::Handshaking);
    }

    #[test]
    fn test_echo_ack_pops_motion() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);

        let _ = s.enqueue_motion(MOVE);
        m.transport_mut().push_text("[0.73 125.4]");
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.queue_len(), 0);
        assert_eq!(s.ack_state().pending, None);

        // next tick sends nothing
        block_on(m.step(&s)).unwrap();
        assert_eq!(m.transport().sent.len(), 1);
    }

    #[test]
    fn test_empty_sentinel_acknowledges() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);

        let _ = s.enqueue_motion(Command::Stop);
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.queue_len(), 1);

        m.transport_mut().push_text("");
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.queue_len(), 0);
        assert_eq!(m.transport().sent, ["[0 0]", "[0 0]"]);
    }

    #[test]
    fn test_action_is_sent_once() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);

        let _ = s.enqueue_action(Command::Action(ActionToken::Mower));
        block_on(m.step(&s)).unwrap();
        block_on(m.step(&s)).unwrap();
        assert_eq!(m.transport().sent, ["mower"]);
    }

    #[test]
    fn test_telemetry_updates_heading() {
        let mut rx = [0u8; 64];
        let link = LinkConfig {
            heading_field: 2,
            ..TEST_LINK
        };
        let mut m = manager(&mut rx, link);
        let s = session();
        open(&mut m, &s);

        m.transport_mut().push_text("ON;12.6;271.5;-3;OK");
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.heading(), Some(271.5));
        let telemetry = s.telemetry();
        assert_eq!(telemetry.records, 1);
        assert_eq!(telemetry.record.as_str(), "ON;12.6;271.5;-3;OK");
    }

    #[test]
    fn test_binary_replaces_image() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);

        m.transport_mut().push_binary(&[0xFF, 0xD8, 0x01]);
        m.transport_mut().push_binary(&[0xFF, 0xD8, 0x02, 0x03]);
        block_on(m.step(&s)).unwrap();
        block_on(m.step(&s)).unwrap();
        assert_eq!(m.images().image(), &[0xFF, 0xD8, 0x02, 0x03]);
        assert_eq!(m.images().generation(), 2);
    }

    #[test]
    fn test_oversized_image_is_dropped_not_fatal() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);

        m.transport_mut().push_binary(&[0u8; 32]);
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.connection_state(), ConnectionState::Open);
        assert_eq!(m.images().generation(), 0);
    }

    #[test]
    fn test_image_larger_than_buffer_keeps_session_open() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);
        let _ = s.enqueue_motion(Command::Stop);

        m.transport_mut().push_binary(&[0xAB; 100]);
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.connection_state(), ConnectionState::Open);
        assert_eq!(s.queue_len(), 1);
        assert!(m.alerts().raised.is_empty());
        assert_eq!(m.images().generation(), 0);

        // the stream continues after the skipped image
        m.transport_mut().push_text("[0 0]");
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.queue_len(), 0);
        assert_eq!(m.transport().sent, ["[0 0]", "[0 0]"]);
    }

    #[test]
    fn test_receive_error_faults_then_backs_off() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);
        let _ = s.enqueue_motion(MOVE);

        m.transport_mut()
            .inbound
            .push_back(Err(TransportFault::Protocol(FrameError::Fragmented)));
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.connection_state(), ConnectionState::Faulted);
        assert_eq!(s.queue_len(), 0);
        assert_eq!(m.failures(), 1);
        assert_eq!(m.transport().closes, 1);
        assert_eq!(m.alerts().raised[0].level, AlertLevel::Transient);

        block_on(m.step(&s)).unwrap();
        assert_eq!(s.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_error_faults() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        open(&mut m, &s);

        let _ = s.enqueue_motion(MOVE);
        m.transport_mut().send_error = Some(TransportFault::Write);
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.connection_state(), ConnectionState::Faulted);
        assert_eq!(m.alerts().raised[0].message.as_str(), "Send failed");
    }

    #[test]
    fn test_handshake_failure_alerts_and_counts() {
        let mut rx = [0u8; 64];
        let mut m = manager(&mut rx, TEST_LINK);
        let s = session();
        m.transport_mut()
            .connects
            .push_back(Err(TransportFault::HandshakeRejected(403)));

        block_on(m.step(&s)).unwrap();
        block_on(m.step(&s)).unwrap();
        assert_eq!(s.connection_state(), ConnectionState::Faulted);
        assert_eq!(m.failures(), 1);
        assert_eq!(m.alerts().raised[0].message.as_str(), "Access denied (403)");

        // backoff, retry, success resets the count
        block_on(m.step(&s)).unwrap();
        open(&mut m, &s);
        assert_eq!(m.failures(), 0);
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let mut rx = [0u8; 64];
        let link = LinkConfig {
            retry_budget: RetryBudget::Consecutive(2),
            ..TEST_LINK
        };
        let mut m = manager(&mut rx, link);
        let s = session();
        for _ in 0..2 {
            m.transport_mut().connects.push_back(Err(TransportFault::Connect));
        }

        let err = block_on(m.run(&s));
        assert_eq!(err, SessionError::RetryBudgetExhausted { failures: 2 });
        assert_eq!(m.transport().connect_calls, 2);
        assert_eq!(m.alerts().raised.len(), 2);
    }

    #[test]
    fn test_rate_limited_sends() {
        let mut rx = [0u8; 64];
        let mut m = SessionManager::new(
            MockTransport::default(),
            MemoryImageStore::<16>::new(),
            RecordingAlerts::default(),
            TEST_LINK,
            Duration::from_secs(3600),
            &mut rx,
        );
        let s = session();
        block_on(m.step(&s)).unwrap();
        block_on(m.step(&s)).unwrap();

        let _ = s.enqueue_motion(MOVE);
        block_on(m.step(&s)).unwrap();
        block_on(m.step(&s)).unwrap();
        assert_eq!(m.transport().sent.len(), 1);
    }
}
