//! Delivery Queue & Ack Protocol.
//!
//! A small ordered mailbox shared by the input task and the poll scheduler,
//! drained by the session manager.
//!
//! - Motion commands (`Move`/`Stop`) are delivered at-least-once. The head
//!   motion command is retransmitted on every send tick until the robot
//!   acknowledges it, and the queue never holds more than one motion
//!   command: a newer one supersedes the queued one in place.
//! - Actions and polls are fire-and-forget and popped as soon as they are
//!   sent. Polls are deduplicated.
//! - A queued action is never overwritten by a motion command.
//! - Too many queued entries or too many retransmissions of one command
//!   report a stall, which forces a reconnect.

use heapless::Deque;
use mowbot_proto::Command;

use crate::config::QueueConfig;
use crate::error::StallReason;
use crate::session::ConnectionState;

/// Hard capacity of the queue. Stall detection trips well before this.
pub const QUEUE_CAPACITY: usize = 8;

/// Acknowledgment tracking for the head motion command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AckState {
    /// Motion command sent and not yet acknowledged.
    pub pending: Option<Command>,
    /// Transmissions since the last acknowledgment or reset.
    pub retries: u32,
}

/// Where an enqueued command ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub enum Enqueued {
    Appended,
    /// Overwrote an existing entry.
    Replaced,
    /// Identical poll token already queued.
    Duplicate,
    /// Queue full, command dropped.
    Full,
}

/// Outcome of one send tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrySend {
    /// Nothing to do (not open, or queue empty).
    Idle,
    /// Send this command now.
    Transmit(Command),
    /// Protocol stall: close the connection without sending.
    Stall(StallReason),
}

/// The outbound command queue with its ack state.
#[derive(Debug)]
pub struct DeliveryQueue {
    entries: Deque<Command, QUEUE_CAPACITY>,
    ack: AckState,
    config: QueueConfig,
}

impl DeliveryQueue {
    /// An empty queue with no pending acknowledgment.
    pub const fn new(config: QueueConfig) -> Self {
        Self {
            entries: Deque::new(),
            ack: AckState {
                pending: None,
                retries: 0,
            },
            config,
        }
    }

    /// Number of queued commands.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The command the next send tick transmits.
    #[inline]
    pub fn front(&self) -> Option<&Command> {
        self.entries.front()
    }

    /// Current acknowledgment tracking.
    #[inline]
    pub fn ack_state(&self) -> AckState {
        self.ack
    }

    /// Iterate over the queued commands, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.entries.iter()
    }

    /// Queue a `Move`/`Stop`, superseding any queued motion command.
    ///
    /// A queued motion command is replaced where it stands. Otherwise a poll
    /// at the head is overwritten, and only behind an action is the command
    /// appended.
    pub fn enqueue_motion(&mut self, cmd: Command) -> Enqueued {
        debug_assert!(cmd.is_motion());

        if let Some(slot) = self.entries.iter_mut().find(|c| c.is_motion()) {
            if *slot != cmd {
                // an ack still in flight belongs to the old value
                self.ack.pending = None;
                *slot = cmd;
            }
            return Enqueued::Replaced;
        }

        if let Some(head) = self.entries.front_mut() {
            if head.is_poll() {
                *head = cmd;
                return Enqueued::Replaced;
            }
        }

        self.push(cmd)
    }

    /// Queue a poll token unless the same token is already waiting.
    pub fn enqueue_poll(&mut self, cmd: Command) -> Enqueued {
        debug_assert!(cmd.is_poll());
        if self.entries.iter().any(|c| *c == cmd) {
            return Enqueued::Duplicate;
        }
        self.push(cmd)
    }

    /// Queue a one-shot action.
    pub fn enqueue_action(&mut self, cmd: Command) -> Enqueued {
        self.push(cmd)
    }

    fn push(&mut self, cmd: Command) -> Enqueued {
        match self.entries.push_back(cmd) {
            Ok(()) => Enqueued::Appended,
            Err(_) => Enqueued::Full,
        }
    }

    /// Decide what to transmit on this send tick.
    pub fn try_send(&mut self, state: ConnectionState) -> TrySend {
        if state != ConnectionState::Open {
            return TrySend::Idle;
        }
        let Some(&head) = self.entries.front() else {
            return TrySend::Idle;
        };

        let len = self.entries.len();
        if len > self.config.stall_len {
            self.ack.retries = 0;
            return TrySend::Stall(StallReason::QueueSaturated { len });
        }
        if self.ack.retries > self.config.stall_retries {
            let retries = self.ack.retries;
            self.ack.retries = 0;
            return TrySend::Stall(StallReason::Unacknowledged { retries });
        }

        if head.is_motion() {
            self.ack.pending = Some(head);
            self.ack.retries += 1;
        } else {
            self.entries.pop_front();
            self.ack.retries = 0;
        }
        TrySend::Transmit(head)
    }

    /// Handle an acknowledgment text. Returns `true` if it released the
    /// pending command.
    pub fn on_ack(&mut self, received: &str) -> bool {
        let Some(pending) = self.ack.pending else {
            return false;
        };
        if !received.is_empty() && !pending.matches_echo(received) {
            return false;
        }
        if self.entries.front() == Some(&pending) {
            self.entries.pop_front();
        }
        self.ack = AckState::default();
        true
    }

    /// Drop everything, e.g. on forced reconnect.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ack = AckState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mowbot_proto::ActionToken;

    const OPEN: ConnectionState = ConnectionState::Open;
    const MOVE: Command = Command::Move {
        force: 0.73,
        bearing: 125.4,
    };
    const MOWER: Command = Command::Action(ActionToken::Mower);

    fn queue() -> DeliveryQueue {
        DeliveryQueue::new(QueueConfig::DEFAULT)
    }

    #[test]
    fn test_idle_when_not_open_or_empty() {
        let mut q = queue();
        assert_eq!(q.try_send(OPEN), TrySend::Idle);
        let _ = q.enqueue_motion(MOVE);
        assert_eq!(q.try_send(ConnectionState::Handshaking), TrySend::Idle);
        assert_eq!(q.try_send(ConnectionState::Disconnected), TrySend::Idle);
        assert_eq!(q.ack_state(), AckState::default());
    }

    #[test]
    fn test_motion_retransmitted_until_ack() {
        let mut q = queue();
        assert_eq!(q.enqueue_motion(MOVE), Enqueued::Appended);

        for attempt in 1..=3 {
            assert_eq!(q.try_send(OPEN), TrySend::Transmit(MOVE));
            assert_eq!(q.ack_state().retries, attempt);
            assert_eq!(q.len(), 1);
        }

        assert!(!q.on_ack("[0.73 125.5]"));
        assert!(q.on_ack("[0.73 125.4]"));
        assert!(q.is_empty());
        assert_eq!(q.ack_state(), AckState::default());

        // popped exactly once
        assert!(!q.on_ack("[0.73 125.4]"));
        assert_eq!(q.try_send(OPEN), TrySend::Idle);
    }

    #[test]
    fn test_empty_ack_sentinel() {
        let mut q = queue();
        // sentinel without anything pending is ignored
        let _ = q.enqueue_motion(Command::Stop);
        assert!(!q.on_ack(""));
        assert_eq!(q.len(), 1);

        assert_eq!(q.try_send(OPEN), TrySend::Transmit(Command::Stop));
        assert!(q.on_ack(""));
        assert!(q.is_empty());
    }

    #[test]
    fn test_motion_supersedes_in_place() {
        let mut q = queue();
        let _ = q.enqueue_motion(MOVE);
        assert_eq!(q.try_send(OPEN), TrySend::Transmit(MOVE));

        assert_eq!(q.enqueue_motion(Command::Stop), Enqueued::Replaced);
        assert_eq!(q.len(), 1);
        assert_eq!(q.front(), Some(&Command::Stop));
        // the old value's ack no longer releases the new head
        assert_eq!(q.ack_state().pending, None);
        assert!(!q.on_ack("[0.73 125.4]"));
        assert_eq!(q.len(), 1);
        // retries keep counting across supersession
        assert_eq!(q.ack_state().retries, 1);
    }

    #[test]
    fn test_same_motion_keeps_pending() {
        let mut q = queue();
        let _ = q.enqueue_motion(MOVE);
        let _ = q.try_send(OPEN);
        assert_eq!(q.enqueue_motion(MOVE), Enqueued::Replaced);
        assert_eq!(q.ack_state().pending, Some(MOVE));
    }

    #[test]
    fn test_motion_overwrites_poll_head_not_action() {
        let mut q = queue();
        let _ = q.enqueue_poll(Command::PollImage);
        assert_eq!(q.enqueue_motion(MOVE), Enqueued::Replaced);
        assert_eq!(q.front(), Some(&MOVE));
        assert_eq!(q.len(), 1);

        let mut q = queue();
        let _ = q.enqueue_action(MOWER);
        assert_eq!(q.enqueue_motion(MOVE), Enqueued::Appended);
        assert_eq!(q.iter().copied().collect::<heapless::Vec<_, 4>>(), [MOWER, MOVE]);
    }

    #[test]
    fn test_at_most_one_motion_entry() {
        let mut q = queue();
        let _ = q.enqueue_action(MOWER);
        let _ = q.enqueue_motion(MOVE);
        let _ = q.enqueue_poll(Command::PollTelemetry);
        let _ = q.enqueue_motion(Command::Stop);
        let _ = q.enqueue_motion(MOVE);
        assert_eq!(q.iter().filter(|c| c.is_motion()).count(), 1);
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_polls_are_deduplicated() {
        let mut q = queue();
        assert_eq!(q.enqueue_poll(Command::PollImage), Enqueued::Appended);
        assert_eq!(q.enqueue_poll(Command::PollImage), Enqueued::Duplicate);
        assert_eq!(q.enqueue_poll(Command::PollTelemetry), Enqueued::Appended);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_fire_and_forget_pops_and_resets_retries() {
        let mut q = queue();
        let _ = q.enqueue_action(MOWER);
        let _ = q.enqueue_poll(Command::PollImage);
        assert_eq!(q.try_send(OPEN), TrySend::Transmit(MOWER));
        assert_eq!(q.try_send(OPEN), TrySend::Transmit(Command::PollImage));
        assert!(q.is_empty());
        assert_eq!(q.ack_state().retries, 0);
    }

    #[test]
    fn test_poll_does_not_preempt_pending_motion() {
        let mut q = queue();
        let _ = q.enqueue_motion(MOVE);
        let _ = q.try_send(OPEN);
        let _ = q.enqueue_poll(Command::PollTelemetry);
        assert_eq!(q.try_send(OPEN), TrySend::Transmit(MOVE));
        assert!(q.on_ack(""));
        assert_eq!(q.try_send(OPEN), TrySend::Transmit(Command::PollTelemetry));
    }

    #[test]
    fn test_stall_on_retries() {
        let mut q = queue();
        let _ = q.enqueue_motion(MOVE);
        for _ in 0..6 {
            assert_eq!(q.try_send(OPEN), TrySend::Transmit(MOVE));
        }
        assert_eq!(
            q.try_send(OPEN),
            TrySend::Stall(StallReason::Unacknowledged { retries: 6 })
        );
        assert_eq!(q.ack_state().retries, 0);
    }

    #[test]
    fn test_stall_on_saturation() {
        let mut q = queue();
        for _ in 0..6 {
            assert_eq!(q.enqueue_action(MOWER), Enqueued::Appended);
        }
        assert_eq!(
            q.try_send(OPEN),
            TrySend::Stall(StallReason::QueueSaturated { len: 6 })
        );
        // nothing was sent or popped
        assert_eq!(q.len(), 6);
    }

    #[test]
    fn test_full_queue_drops() {
        let mut q = queue();
        for _ in 0..QUEUE_CAPACITY {
            let _ = q.enqueue_action(MOWER);
        }
        assert_eq!(q.enqueue_action(MOWER), Enqueued::Full);
        assert_eq!(q.len(), QUEUE_CAPACITY);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut q = queue();
        let _ = q.enqueue_motion(MOVE);
        let _ = q.try_send(OPEN);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.ack_state(), AckState::default());
    }
}
