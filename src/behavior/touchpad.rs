//! Touch-pad gesture state machine.
//!
//! A single tracked finger drives the cursor:
//!
//! | Gesture | Result |
//! |---------|--------|
//! | tap | left click once the idle timeout expires |
//! | press and hold | right click at the idle timeout |
//! | tap, then press again | left button held while dragging (double-click drag) |
//! | press and slide | relative cursor movement, no buttons |
//!
//! ```text
//! Idle --down--> Pending --idle timeout--> Idle (click)
//!                   |--second down--> DoubleClick --up--> Idle
//!                   '--move > threshold--> Moving --up--> Idle
//! ```

use super::{DispatchContext, TouchOutcome};
use crate::protocol::{Cursor, MouseButton, PointerId, TouchAction, TouchEvent};
use crate::timer::{TimerEvent, TimerKind, TimerToken};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// Finger went down (and maybe up again); classification not decided yet
    Pending,
    /// Second tap landed; left button is held until the finger lifts
    DoubleClick,
    /// Finger travelled past the threshold; pure cursor drag
    Moving,
}

/// A button down whose release is waiting on the click timer
#[derive(Debug, Clone, Copy)]
struct PendingRelease {
    token: TimerToken,
    button: MouseButton,
    cursor: Cursor,
}

#[derive(Debug)]
pub struct TouchPad {
    pass_through: bool,
    state: GestureState,
    active_pointer: Option<PointerId>,
    claimed: bool,
    /// Whether the gesture's finger is currently on the glass
    pressed: bool,
    initial: (f32, f32),
    last: (f32, f32),
    /// Bumped on every gesture start and reset; stale timers compare against it
    generation: u64,
    idle_timer: Option<TimerToken>,
    release: Option<PendingRelease>,
    /// Left button held by a double-click drag
    drag_button_down: bool,
}
impl TouchPad {
    pub fn new(pass_through: bool) -> Self {
        Self {
            pass_through,
            state: GestureState::Idle,
            active_pointer: None,
            claimed: false,
            pressed: false,
            initial: (0.0, 0.0),
            last: (0.0, 0.0),
            generation: 0,
            idle_timer: None,
            release: None,
            drag_button_down: false,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn active_pointer(&self) -> Option<PointerId> {
        self.active_pointer
    }

    pub fn is_pass_through(&self) -> bool {
        self.pass_through
    }

    fn outcome(&self) -> TouchOutcome {
        if self.pass_through {
            TouchOutcome::PassThrough
        } else {
            TouchOutcome::Consumed
        }
    }

    pub fn on_touch(&mut self, event: &TouchEvent, ctx: &mut DispatchContext<'_>) -> TouchOutcome {
        match event.action {
            TouchAction::Down => self.on_down(event, ctx),
            TouchAction::Move => self.on_move(event, ctx),
            TouchAction::Up => self.on_lift(event, false, ctx),
            TouchAction::Cancel => self.on_lift(event, true, ctx),
        }
    }

    fn on_down(&mut self, event: &TouchEvent, ctx: &mut DispatchContext<'_>) -> TouchOutcome {
        if let Some(active) = self.active_pointer {
            trace!(
                "'{}' follows pointer {}, ignoring pointer {}",
                ctx.control_id, active, event.pointer
            );
            return TouchOutcome::Ignored;
        }

        let point = (event.x, event.y);
        match self.state {
            GestureState::Idle => {
                // A click still waiting for its release must finish first
                self.flush_release(ctx);
                self.track(event.pointer, ctx);
                self.initial = point;
                self.last = point;
                self.generation += 1;
                self.state = GestureState::Pending;
                self.arm_idle_timer(ctx);
                trace!("'{}' gesture {} pending", ctx.control_id, self.generation);
            }
            GestureState::Pending => {
                self.cancel_idle_timer(ctx);
                self.track(event.pointer, ctx);
                self.last = point;
                self.state = GestureState::DoubleClick;

                let cursor = self.click_cursor(ctx);
                ctx.sink.send_mouse_button(MouseButton::Left, true, cursor);
                self.drag_button_down = true;
                debug!("'{}' double-click drag started", ctx.control_id);
            }
            GestureState::DoubleClick | GestureState::Moving => {
                // These states always own a pointer, so this is unreachable
                // unless a release went missing
                debug!(
                    "'{}' got pointer {} in {:?} without an active pointer, resetting",
                    ctx.control_id, event.pointer, self.state
                );
                self.teardown(ctx);
                return self.on_down(event, ctx);
            }
        }
        self.outcome()
    }

    fn on_move(&mut self, event: &TouchEvent, ctx: &mut DispatchContext<'_>) -> TouchOutcome {
        if self.active_pointer != Some(event.pointer) {
            return TouchOutcome::Ignored;
        }

        let ratio = ctx.config.touchpad.movement_ratio;
        match self.state {
            GestureState::Pending => {
                let (ix, iy) = self.initial;
                let (dx, dy) = (event.x - ix, event.y - iy);
                let threshold = ctx.surface.dp_to_px(ctx.config.touchpad.move_threshold_dp);
                if dx.hypot(dy) > threshold {
                    self.cancel_idle_timer(ctx);
                    self.state = GestureState::Moving;
                    // Forward the travel that crossed the threshold too
                    ctx.sink.send_mouse_move(dx * ratio, dy * ratio);
                    trace!("'{}' drag started", ctx.control_id);
                }
            }
            GestureState::Moving | GestureState::DoubleClick => {
                let (lx, ly) = self.last;
                let (dx, dy) = (event.x - lx, event.y - ly);
                if dx != 0.0 || dy != 0.0 {
                    ctx.sink.send_mouse_move(dx * ratio, dy * ratio);
                }
            }
            GestureState::Idle => {}
        }
        self.last = (event.x, event.y);
        self.outcome()
    }

    fn on_lift(
        &mut self,
        event: &TouchEvent,
        cancelled: bool,
        ctx: &mut DispatchContext<'_>,
    ) -> TouchOutcome {
        if self.active_pointer != Some(event.pointer) {
            return TouchOutcome::Ignored;
        }

        self.untrack(ctx);
        match self.state {
            GestureState::DoubleClick => {
                self.release_drag_button(ctx);
                self.reset();
            }
            GestureState::Moving => self.reset(),
            GestureState::Pending if cancelled => {
                self.cancel_idle_timer(ctx);
                self.reset();
            }
            // The idle timer decides what this touch was
            GestureState::Pending => {}
            GestureState::Idle => {}
        }
        self.outcome()
    }

    pub fn on_timer(&mut self, event: TimerEvent, ctx: &mut DispatchContext<'_>) {
        match event.kind {
            TimerKind::IdleTimeout => {
                if event.generation != self.generation
                    || self.state != GestureState::Pending
                    || self.idle_timer != Some(event.token)
                {
                    trace!("'{}' ignoring stale idle timeout", ctx.control_id);
                    return;
                }
                self.idle_timer = None;

                // A finger still down at this point is a long press
                let button = if self.pressed {
                    MouseButton::Right
                } else {
                    MouseButton::Left
                };
                let cursor = self.click_cursor(ctx);
                ctx.sink.send_mouse_button(button, true, cursor);
                let token = ctx.timers.schedule(
                    ctx.config.touchpad.click_timeout(),
                    self.timer_event(ctx, TimerKind::ClickRelease),
                );
                self.release = Some(PendingRelease {
                    token,
                    button,
                    cursor,
                });
                debug!("'{}' {:?} click", ctx.control_id, button);
                self.reset();
            }
            TimerKind::ClickRelease => match self.release {
                Some(release) if release.token == event.token => {
                    self.release = None;
                    ctx.sink
                        .send_mouse_button(release.button, false, release.cursor);
                }
                _ => trace!("'{}' ignoring stale click release", ctx.control_id),
            },
        }
    }

    /// Cancel timers, send any owed button release and free the pointer
    pub fn teardown(&mut self, ctx: &mut DispatchContext<'_>) {
        self.cancel_idle_timer(ctx);
        self.flush_release(ctx);
        if self.drag_button_down {
            self.release_drag_button(ctx);
        }
        self.untrack(ctx);
        self.reset();
    }

    fn track(&mut self, pointer: PointerId, ctx: &DispatchContext<'_>) {
        self.active_pointer = Some(pointer);
        self.pressed = true;
        self.claimed = !self.pass_through && ctx.tracker.claim(pointer, ctx.control_id);
    }

    fn untrack(&mut self, ctx: &DispatchContext<'_>) {
        if let Some(pointer) = self.active_pointer.take() {
            if self.claimed {
                ctx.tracker.release(pointer);
            }
        }
        self.claimed = false;
        self.pressed = false;
    }

    /// Back to Idle; the tracked pointer, if any, stays tracked until it lifts
    fn reset(&mut self) {
        self.state = GestureState::Idle;
        self.generation += 1;
    }

    fn timer_event(&self, ctx: &DispatchContext<'_>, kind: TimerKind) -> TimerEvent {
        TimerEvent {
            token: TimerToken(0),
            slot: ctx.slot,
            generation: self.generation,
            kind,
        }
    }

    fn arm_idle_timer(&mut self, ctx: &mut DispatchContext<'_>) {
        self.cancel_idle_timer(ctx);
        let event = self.timer_event(ctx, TimerKind::IdleTimeout);
        self.idle_timer = Some(
            ctx.timers
                .schedule(ctx.config.touchpad.idle_timeout(), event),
        );
    }

    fn cancel_idle_timer(&mut self, ctx: &mut DispatchContext<'_>) {
        if let Some(token) = self.idle_timer.take() {
            ctx.timers.cancel(token);
        }
    }

    /// Send a scheduled click release right away
    fn flush_release(&mut self, ctx: &mut DispatchContext<'_>) {
        if let Some(release) = self.release.take() {
            ctx.timers.cancel(release.token);
            ctx.sink
                .send_mouse_button(release.button, false, release.cursor);
        }
    }

    fn release_drag_button(&mut self, ctx: &DispatchContext<'_>) {
        let cursor = self.click_cursor(ctx);
        ctx.sink.send_mouse_button(MouseButton::Left, false, cursor);
        self.drag_button_down = false;
    }

    /// Surface midpoint offset by the scaled travel since the gesture began
    fn click_cursor(&self, ctx: &DispatchContext<'_>) -> Cursor {
        let ratio = ctx.config.touchpad.movement_ratio;
        let (cx, cy) = ctx.surface.center();
        let x = cx + (self.last.0 - self.initial.0) * ratio;
        let y = cy + (self.last.1 - self.initial.1) * ratio;
        Cursor::Absolute {
            x: x.clamp(0.0, ctx.surface.width),
            y: y.clamp(0.0, ctx.surface.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::protocol::{SinkEvent, SurfaceMetrics};
    use crate::sink::RecordingSink;
    use crate::timer::ManualTimers;
    use crate::tracker::PointerTracker;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Rig {
        pad: TouchPad,
        sink: RecordingSink,
        tracker: PointerTracker,
        timers: ManualTimers,
        config: EngineConfig,
    }

    impl Rig {
        fn new(pass_through: bool) -> Self {
            Self {
                pad: TouchPad::new(pass_through),
                sink: RecordingSink::new(),
                tracker: PointerTracker::new(),
                timers: ManualTimers::new(),
                config: EngineConfig::default(),
            }
        }

        fn touch(&mut self, event: TouchEvent) -> TouchOutcome {
            let mut ctx = DispatchContext {
                slot: 1,
                control_id: "pad",
                sink: &self.sink,
                tracker: &self.tracker,
                timers: &mut self.timers,
                surface: SurfaceMetrics::new(1000.0, 600.0, 1.0),
                config: &self.config,
            };
            self.pad.on_touch(&event, &mut ctx)
        }

        fn advance_to(&mut self, ms: u64) {
            let until = Duration::from_millis(ms);
            while let Some(event) = self.timers.pop_due(until) {
                let mut ctx = DispatchContext {
                    slot: 1,
                    control_id: "pad",
                    sink: &self.sink,
                    tracker: &self.tracker,
                    timers: &mut self.timers,
                    surface: SurfaceMetrics::new(1000.0, 600.0, 1.0),
                    config: &self.config,
                };
                self.pad.on_timer(event, &mut ctx);
            }
            self.timers.set_now(until);
        }
    }

    fn click(button: MouseButton, down: bool, x: f32, y: f32) -> SinkEvent {
        SinkEvent::MouseButton {
            button,
            down,
            cursor: Cursor::Absolute { x, y },
        }
    }

    #[test]
    fn tap_clicks_left_after_idle_timeout() {
        let mut rig = Rig::new(false);
        assert_eq!(rig.touch(TouchEvent::down(0, 100.0, 100.0)), TouchOutcome::Consumed);
        assert!(rig.tracker.is_claimed(0));
        rig.advance_to(30);
        rig.touch(TouchEvent::up(0, 100.0, 100.0));
        assert!(!rig.tracker.is_claimed(0));
        assert_eq!(rig.pad.state(), GestureState::Pending);

        rig.advance_to(199);
        assert!(rig.sink.events().is_empty());

        rig.advance_to(500);
        assert_eq!(
            rig.sink.take(),
            vec![
                click(MouseButton::Left, true, 500.0, 300.0),
                click(MouseButton::Left, false, 500.0, 300.0),
            ]
        );
        assert_eq!(rig.pad.state(), GestureState::Idle);
    }

    #[test]
    fn hold_clicks_right_and_keeps_pointer() {
        let mut rig = Rig::new(false);
        rig.touch(TouchEvent::down(3, 10.0, 10.0));
        rig.advance_to(200);
        assert_eq!(
            rig.sink.take(),
            vec![click(MouseButton::Right, true, 500.0, 300.0)]
        );
        assert!(rig.tracker.is_claimed(3));

        rig.advance_to(250);
        assert_eq!(
            rig.sink.take(),
            vec![click(MouseButton::Right, false, 500.0, 300.0)]
        );

        // The finger keeps its claim until it lifts; moving it does nothing
        rig.touch(TouchEvent::moved(3, 80.0, 80.0));
        assert!(rig.sink.events().is_empty());
        rig.touch(TouchEvent::up(3, 80.0, 80.0));
        assert!(!rig.tracker.is_claimed(3));
    }

    #[test]
    fn small_moves_stay_pending() {
        let mut rig = Rig::new(false);
        rig.touch(TouchEvent::down(0, 100.0, 100.0));
        rig.touch(TouchEvent::moved(0, 103.0, 104.0));
        assert_eq!(rig.pad.state(), GestureState::Pending);
        rig.touch(TouchEvent::moved(0, 103.0, 103.9));
        assert_eq!(rig.pad.state(), GestureState::Pending);
        assert!(rig.sink.events().is_empty());
    }

    #[test]
    fn crossing_threshold_sends_accumulated_travel() {
        let mut rig = Rig::new(false);
        rig.touch(TouchEvent::down(0, 0.0, 0.0));
        rig.touch(TouchEvent::moved(0, 6.0, 0.0));
        assert_eq!(rig.pad.state(), GestureState::Moving);
        assert_eq!(rig.sink.take(), vec![SinkEvent::MouseMove { dx: 12.0, dy: 0.0 }]);
    }

    #[test]
    fn second_finger_is_ignored() {
        let mut rig = Rig::new(false);
        rig.touch(TouchEvent::down(0, 100.0, 100.0));
        assert_eq!(rig.touch(TouchEvent::down(1, 300.0, 300.0)), TouchOutcome::Ignored);
        assert!(!rig.tracker.is_claimed(1));
        assert_eq!(rig.touch(TouchEvent::moved(1, 400.0, 300.0)), TouchOutcome::Ignored);
        assert_eq!(rig.pad.state(), GestureState::Pending);
    }

    #[test]
    fn pass_through_never_claims() {
        let mut rig = Rig::new(true);
        assert!(rig.pad.is_pass_through());
        assert_eq!(
            rig.touch(TouchEvent::down(0, 100.0, 100.0)),
            TouchOutcome::PassThrough
        );
        assert!(!rig.tracker.is_claimed(0));
        rig.touch(TouchEvent::up(0, 100.0, 100.0));
        rig.advance_to(300);
        assert_eq!(rig.sink.events().len(), 2);
    }

    #[test]
    fn cancel_while_pending_drops_the_click() {
        let mut rig = Rig::new(false);
        rig.touch(TouchEvent::down(0, 100.0, 100.0));
        rig.touch(TouchEvent::cancel(0, 100.0, 100.0));
        assert!(!rig.tracker.is_claimed(0));
        rig.advance_to(1000);
        assert!(rig.sink.events().is_empty());
        assert_eq!(rig.timers.pending_count(), 0);
    }

    #[test]
    fn new_gesture_flushes_pending_release() {
        let mut rig = Rig::new(false);
        rig.touch(TouchEvent::down(0, 100.0, 100.0));
        rig.touch(TouchEvent::up(0, 100.0, 100.0));
        rig.advance_to(200);
        // Left down sent, release due at 250
        rig.touch(TouchEvent::down(1, 100.0, 100.0));
        assert_eq!(
            rig.sink.take(),
            vec![
                click(MouseButton::Left, true, 500.0, 300.0),
                click(MouseButton::Left, false, 500.0, 300.0),
            ]
        );
        rig.advance_to(250);
        assert!(rig.sink.events().is_empty());
    }

    #[test]
    fn teardown_releases_everything() {
        let mut rig = Rig::new(false);
        rig.touch(TouchEvent::down(0, 100.0, 100.0));
        rig.touch(TouchEvent::up(0, 100.0, 100.0));
        rig.touch(TouchEvent::down(1, 110.0, 100.0));
        assert_eq!(rig.pad.state(), GestureState::DoubleClick);

        let mut ctx = DispatchContext {
            slot: 1,
            control_id: "pad",
            sink: &rig.sink,
            tracker: &rig.tracker,
            timers: &mut rig.timers,
            surface: SurfaceMetrics::new(1000.0, 600.0, 1.0),
            config: &rig.config,
        };
        rig.pad.teardown(&mut ctx);

        assert_eq!(
            rig.sink.take(),
            vec![
                click(MouseButton::Left, true, 520.0, 300.0),
                click(MouseButton::Left, false, 520.0, 300.0),
            ]
        );
        assert!(rig.tracker.claimed().is_empty());
        assert_eq!(rig.pad.state(), GestureState::Idle);
        assert_eq!(rig.pad.active_pointer(), None);
    }
}
