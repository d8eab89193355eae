//! Per-kind control behaviors.
//!
//! A [`Behavior`] holds the ephemeral state of one control instance. The
//! layout routes touches and fired timers to it together with a
//! [`DispatchContext`] carrying everything the behavior may act on.

use crate::config::EngineConfig;
use crate::control::{ButtonMode, ControlSpec, InputMapping};
use crate::keycodes::{self, ButtonAction};
use crate::protocol::{Cursor, PointerId, SurfaceMetrics, TouchAction, TouchEvent};
use crate::sink::InputSink;
use crate::timer::{SlotKey, TimerEvent, TimerQueue};
use crate::tracker::PointerTracker;
use tracing::{debug, warn};

mod button;
mod joystick;
mod touchpad;

pub use button::ButtonBehavior;
pub use joystick::JoystickBehavior;
pub use touchpad::{GestureState, TouchPad};

/// Everything a behavior may touch while handling one event
pub struct DispatchContext<'a> {
    pub slot: SlotKey,
    pub control_id: &'a str,
    pub sink: &'a dyn InputSink,
    pub tracker: &'a PointerTracker,
    pub timers: &'a mut dyn TimerQueue,
    pub surface: SurfaceMetrics,
    pub config: &'a EngineConfig,
}

/// Result of offering a touch to a behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutcome {
    /// Handled; the surface must not see this pointer
    Consumed,
    /// Handled, and the surface should still see the raw touch
    PassThrough,
    /// Not taken, e.g. a second finger on a single-pointer control
    Ignored,
}

/// Behavior state of one control, chosen by its kind
#[derive(Debug)]
pub enum Behavior {
    Button(ButtonBehavior),
    Joystick(JoystickBehavior),
    TouchPad(TouchPad),
    Text,
}
impl Behavior {
    pub fn for_spec(spec: &ControlSpec) -> Self {
        match &spec.mapping {
            InputMapping::Button(_) => Behavior::Button(ButtonBehavior::new()),
            InputMapping::Joystick(_) => Behavior::Joystick(JoystickBehavior::new()),
            InputMapping::TouchPad(mapping) => Behavior::TouchPad(TouchPad::new(mapping.pass_through)),
            InputMapping::Text => Behavior::Text,
        }
    }

    pub fn on_touch(
        &mut self,
        spec: &ControlSpec,
        event: &TouchEvent,
        ctx: &mut DispatchContext<'_>,
    ) -> TouchOutcome {
        match (self, &spec.mapping) {
            (Behavior::Button(state), InputMapping::Button(mapping)) => {
                state.on_touch(mapping, event, ctx)
            }
            (Behavior::Joystick(state), InputMapping::Joystick(mapping)) => {
                state.on_touch(mapping, &spec.geometry, event, ctx)
            }
            (Behavior::TouchPad(state), InputMapping::TouchPad(_)) => state.on_touch(event, ctx),
            (Behavior::Text, _) => TouchOutcome::Ignored,
            (_, mapping) => {
                warn!(
                    "Behavior of '{}' does not match its {:?} mapping, ignoring touch",
                    spec.id,
                    mapping.kind()
                );
                TouchOutcome::Ignored
            }
        }
    }

    pub fn on_timer(&mut self, event: TimerEvent, ctx: &mut DispatchContext<'_>) {
        match self {
            Behavior::TouchPad(state) => state.on_timer(event, ctx),
            _ => debug!("Timer {:?} for '{}' has no receiver", event.kind, ctx.control_id),
        }
    }

    /// Stop whatever is in flight: cancel timers, send owed releases and
    /// give back claimed pointers
    pub fn teardown(&mut self, spec: &ControlSpec, ctx: &mut DispatchContext<'_>) {
        match (self, &spec.mapping) {
            (Behavior::Button(state), InputMapping::Button(mapping)) => state.teardown(mapping, ctx),
            (Behavior::Joystick(state), InputMapping::Joystick(mapping)) => {
                state.teardown(mapping, ctx)
            }
            (Behavior::TouchPad(state), _) => state.teardown(ctx),
            _ => {}
        }
        // Safety net for anything a behavior lost track of
        ctx.tracker.release_control(ctx.control_id);
    }

    /// Pointers this behavior is currently following
    pub fn active_pointer(&self) -> Option<PointerId> {
        match self {
            Behavior::Button(state) => state.pointer(),
            Behavior::Joystick(state) => state.pointer(),
            Behavior::TouchPad(state) => state.active_pointer(),
            Behavior::Text => None,
        }
    }
}

/// Whether an event ends its pointer's life
pub(crate) fn is_release(action: TouchAction) -> bool {
    matches!(action, TouchAction::Up | TouchAction::Cancel)
}

/// Send the press or release a button code asks for
pub(crate) fn emit_action(
    code: i32,
    mode: ButtonMode,
    is_down: bool,
    ctx: &DispatchContext<'_>,
) {
    let action = ButtonAction::decode(code);
    let mismatched = match action {
        ButtonAction::Unknown(_) => false,
        _ => action.is_gamepad() != (mode == ButtonMode::Gamepad),
    };
    if mismatched {
        warn!(
            "Code {} on '{}' does not fit {:?} mode, dropping",
            code, ctx.control_id, mode
        );
        return;
    }

    match action {
        ButtonAction::Key(abstract_code) => {
            ctx.sink.send_key(keycodes::translate(abstract_code), is_down)
        }
        ButtonAction::Mouse(button) => ctx.sink.send_mouse_button(button, is_down, Cursor::IN_PLACE),
        ButtonAction::OpenKeyboard => {
            if is_down {
                match ctx.tracker.surface() {
                    Some(surface) => surface.toggle_soft_keyboard(),
                    None => debug!("No surface to open a soft keyboard on"),
                }
            }
        }
        ButtonAction::Gamepad(button) => ctx.sink.send_gamepad_button(button, is_down),
        ButtonAction::Trigger(trigger) => {
            ctx.sink
                .send_gamepad_trigger(trigger, if is_down { 1.0 } else { 0.0 })
        }
        ButtonAction::Unknown(code) => {
            warn!("Unknown button code {} on '{}', dropping", code, ctx.control_id)
        }
    }
}
