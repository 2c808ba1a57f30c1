//! Shared session context.
//!
//! One [`Session`] lives for the whole process (typically in a `static`) and
//! is shared by reference between the input task, the poll scheduler and the
//! session manager. All state sits behind a single blocking mutex; every
//! operation is one short critical section that never spans an `.await`.
//!
//! The connection state is written only by the session manager (the setters
//! are crate-private); the other tasks only read it.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use mowbot_proto::Command;

use crate::config::QueueConfig;
use crate::queue::{AckState, DeliveryQueue, Enqueued, TrySend};
use crate::telemetry::Telemetry;

/// Lifecycle of the persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Handshaking,
    Open,
    Faulted,
}

struct SessionState {
    queue: DeliveryQueue,
    connection: ConnectionState,
    telemetry: Telemetry,
    /// Set on every transition to `Open`, taken by the input task.
    resync: bool,
}

/// Queue, ack state, connection state and telemetry behind one lock.
pub struct Session<M: RawMutex> {
    inner: Mutex<M, RefCell<SessionState>>,
}

impl<M: RawMutex> Session<M> {
    /// A disconnected session with an empty queue.
    pub const fn new(config: QueueConfig) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(SessionState {
                queue: DeliveryQueue::new(config),
                connection: ConnectionState::Disconnected,
                telemetry: Telemetry::new(),
                resync: false,
            })),
        }
    }

    #[inline]
    fn with<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.with(|s| s.connection)
    }

    /// Whether the connection is usable for sending.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.connection_state() == ConnectionState::Open
    }

    /// Last-known heading in degrees.
    pub fn heading(&self) -> Option<f32> {
        self.with(|s| s.telemetry.heading)
    }

    /// Copy of the telemetry snapshot.
    pub fn telemetry(&self) -> Telemetry {
        self.with(|s| s.telemetry.clone())
    }

    /// Number of queued commands.
    pub fn queue_len(&self) -> usize {
        self.with(|s| s.queue.len())
    }

    /// Snapshot of the acknowledgment tracking.
    pub fn ack_state(&self) -> AckState {
        self.with(|s| s.queue.ack_state())
    }

    /// Head of the queue, if any.
    pub fn front(&self) -> Option<Command> {
        self.with(|s| s.queue.front().copied())
    }

    /// Queue a motion command. Dropped while the session is not open.
    pub fn enqueue_motion(&self, cmd: Command) -> Option<Enqueued> {
        self.with(|s| (s.connection == ConnectionState::Open).then(|| s.queue.enqueue_motion(cmd)))
    }

    /// Queue a one-shot action. Dropped while the session is not open.
    pub fn enqueue_action(&self, cmd: Command) -> Option<Enqueued> {
        self.with(|s| (s.connection == ConnectionState::Open).then(|| s.queue.enqueue_action(cmd)))
    }

    /// Queue a poll token. Dropped while the session is not open.
    pub fn enqueue_poll(&self, cmd: Command) -> Option<Enqueued> {
        self.with(|s| (s.connection == ConnectionState::Open).then(|| s.queue.enqueue_poll(cmd)))
    }

    /// Whether a poll token equal to `cmd` is waiting.
    pub fn has_queued(&self, cmd: Command) -> bool {
        self.with(|s| s.queue.iter().any(|c| *c == cmd))
    }

    /// Consume the resync flag raised when the session opened.
    pub fn take_resync(&self) -> bool {
        self.with(|s| core::mem::take(&mut s.resync))
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.with(|s| s.connection = state);
    }

    /// Handshake succeeded.
    pub(crate) fn open(&self) {
        self.with(|s| {
            s.queue.clear();
            s.connection = ConnectionState::Open;
            s.resync = true;
        });
    }

    /// Protocol stall: drop the connection without a backoff.
    pub(crate) fn force_disconnect(&self) {
        self.with(|s| {
            s.queue.clear();
            s.connection = ConnectionState::Disconnected;
        });
    }

    /// Transport fault: wait for backoff before reconnecting.
    pub(crate) fn fail(&self) {
        self.with(|s| {
            s.queue.clear();
            s.connection = ConnectionState::Faulted;
        });
    }

    pub(crate) fn try_send(&self) -> TrySend {
        self.with(|s| s.queue.try_send(s.connection))
    }

    pub(crate) fn on_ack(&self, received: &str) -> bool {
        self.with(|s| s.queue.on_ack(received))
    }

    pub(crate) fn record_telemetry(&self, record: &str, heading: Option<f32>, now: Instant) {
        self.with(|s| s.telemetry.update(record, heading, now));
    }
}
