//! Delayed callbacks for control behaviors.
//!
//! Behaviors never hold closures over their own state. They schedule a
//! [`TimerEvent`] and receive it back through the layout when it fires,
//! which keeps all gesture state on the task that owns the layout.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Handle used to cancel a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u64);

/// Identity of one control instance inside a layout
pub type SlotKey = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// A pending touch-pad gesture ran out of time
    IdleTimeout,
    /// A synthesized click must release its button
    ClickRelease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub token: TimerToken,
    pub slot: SlotKey,
    pub generation: u64,
    pub kind: TimerKind,
}

/// Scheduling interface behaviors use for delayed work
pub trait TimerQueue {
    /// Arm a timer; the token inside `event` is filled in by the queue
    fn schedule(&mut self, delay: Duration, event: TimerEvent) -> TimerToken;

    /// Cancel a timer; unknown or already-fired tokens are ignored
    fn cancel(&mut self, token: TimerToken);
}

/// Deterministic timers driven by an explicit clock
///
/// Used by tests and trace replay. Events fire in deadline order, ties in
/// scheduling order, and the clock moves to each deadline as it fires so
/// timers armed from a callback are measured from the right instant.
#[derive(Debug, Default)]
pub struct ManualTimers {
    now: Duration,
    next_token: u64,
    pending: BTreeMap<(Duration, TimerToken), TimerEvent>,
    deadlines: HashMap<TimerToken, Duration>,
}
impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since creation
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Pop the next timer due at or before `until`, advancing the clock to it
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerEvent> {
        let (&(deadline, token), _) = self.pending.iter().next()?;
        if deadline > until {
            return None;
        }
        let event = self.pending.remove(&(deadline, token))?;
        self.deadlines.remove(&token);
        self.now = self.now.max(deadline);
        Some(event)
    }

    /// Move the clock forward without firing anything
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}
impl TimerQueue for ManualTimers {
    fn schedule(&mut self, delay: Duration, mut event: TimerEvent) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        event.token = token;

        let deadline = self.now + delay;
        self.pending.insert((deadline, token), event);
        self.deadlines.insert(token, deadline);
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(deadline) = self.deadlines.remove(&token) {
            self.pending.remove(&(deadline, token));
        }
    }
}

/// Timers backed by tokio tasks
///
/// Each armed timer is a task that sleeps and then sends its event on the
/// channel returned by [`TokioTimers::new`]. Cancelling aborts the task.
pub struct TokioTimers {
    next_token: u64,
    tasks: HashMap<TimerToken, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<TimerEvent>,
}
impl TokioTimers {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (
            Self {
                next_token: 0,
                tasks: HashMap::new(),
                fired_tx,
            },
            fired_rx,
        )
    }

    pub fn active_count(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}
impl TimerQueue for TokioTimers {
    fn schedule(&mut self, delay: Duration, mut event: TimerEvent) -> TimerToken {
        // Drop handles of timers that already fired
        self.tasks.retain(|_, task| !task.is_finished());

        let token = TimerToken(self.next_token);
        self.next_token += 1;
        event.token = token;

        let fired_tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fired_tx.send(event).is_err() {
                trace!("Timer {:?} fired after its receiver closed", event.token);
            }
        });
        self.tasks.insert(token, task);
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(task) = self.tasks.remove(&token) {
            task.abort();
        }
    }
}
impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(slot: SlotKey, kind: TimerKind) -> TimerEvent {
        TimerEvent {
            token: TimerToken(0),
            slot,
            generation: 0,
            kind,
        }
    }

    #[test]
    fn manual_timers_fire_in_deadline_order() {
        let mut timers = ManualTimers::new();
        let late = timers.schedule(Duration::from_millis(200), event(1, TimerKind::IdleTimeout));
        let early = timers.schedule(Duration::from_millis(50), event(2, TimerKind::ClickRelease));
        let tie = timers.schedule(Duration::from_millis(200), event(3, TimerKind::IdleTimeout));

        assert!(timers.pop_due(Duration::from_millis(49)).is_none());

        let until = Duration::from_secs(1);
        let fired: Vec<_> = std::iter::from_fn(|| timers.pop_due(until))
            .map(|e| e.token)
            .collect();
        assert_eq!(fired, vec![early, late, tie]);
        assert_eq!(timers.now(), Duration::from_millis(200));
    }

    #[test]
    fn manual_cancel_removes_timer() {
        let mut timers = ManualTimers::new();
        let token = timers.schedule(Duration::from_millis(10), event(1, TimerKind::IdleTimeout));
        timers.cancel(token);
        timers.cancel(token);
        assert_eq!(timers.pending_count(), 0);
        assert!(timers.pop_due(Duration::from_secs(1)).is_none());
    }

    #[test]
    fn manual_schedule_is_relative_to_last_fire() {
        let mut timers = ManualTimers::new();
        timers.schedule(Duration::from_millis(200), event(1, TimerKind::IdleTimeout));
        let fired = timers.pop_due(Duration::from_millis(500)).unwrap();
        assert_eq!(fired.slot, 1);

        timers.schedule(Duration::from_millis(50), event(1, TimerKind::ClickRelease));
        assert!(timers.pop_due(Duration::from_millis(249)).is_none());
        assert!(timers.pop_due(Duration::from_millis(250)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_timers_deliver_and_cancel() {
        let (mut timers, mut fired_rx) = TokioTimers::new();
        let cancelled = timers.schedule(Duration::from_millis(10), event(1, TimerKind::IdleTimeout));
        let kept = timers.schedule(Duration::from_millis(20), event(2, TimerKind::ClickRelease));
        timers.cancel(cancelled);

        assert_eq!(timers.active_count(), 1);

        let fired = fired_rx.recv().await.unwrap();
        assert_eq!(fired.token, kept);
        assert_eq!(fired.slot, 2);
        assert_eq!(fired.kind, TimerKind::ClickRelease);

        tokio::task::yield_now().await;
        assert_eq!(timers.active_count(), 0);
    }
}
