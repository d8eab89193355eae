use super::{DispatchContext, TouchOutcome, emit_action, is_release};
use crate::control::ButtonMapping;
use crate::protocol::{PointerId, TouchAction, TouchEvent};
use tracing::trace;

/// Press state of a button control
///
/// A plain button is down exactly while its finger is. A toggle button flips
/// on every press and ignores the lift.
#[derive(Debug, Default)]
pub struct ButtonBehavior {
    pointer: Option<PointerId>,
    claimed: bool,
    toggled: bool,
}
impl ButtonBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer(&self) -> Option<PointerId> {
        self.pointer
    }

    /// Logical state of a toggle button
    pub fn is_toggled(&self) -> bool {
        self.toggled
    }

    pub fn on_touch(
        &mut self,
        mapping: &ButtonMapping,
        event: &TouchEvent,
        ctx: &mut DispatchContext<'_>,
    ) -> TouchOutcome {
        match event.action {
            TouchAction::Down => {
                if self.pointer.is_some() {
                    trace!("'{}' already pressed, ignoring pointer {}", ctx.control_id, event.pointer);
                    return TouchOutcome::Ignored;
                }
                self.pointer = Some(event.pointer);
                self.claimed = ctx.tracker.claim(event.pointer, ctx.control_id);

                if mapping.is_toggle {
                    self.toggled = !self.toggled;
                    emit_action(mapping.keycode, mapping.button_mode, self.toggled, ctx);
                } else {
                    emit_action(mapping.keycode, mapping.button_mode, true, ctx);
                }
                TouchOutcome::Consumed
            }
            TouchAction::Move => {
                if self.pointer == Some(event.pointer) {
                    TouchOutcome::Consumed
                } else {
                    TouchOutcome::Ignored
                }
            }
            action if is_release(action) => {
                if self.pointer != Some(event.pointer) {
                    return TouchOutcome::Ignored;
                }
                self.release_pointer(ctx);
                if !mapping.is_toggle {
                    emit_action(mapping.keycode, mapping.button_mode, false, ctx);
                }
                TouchOutcome::Consumed
            }
            _ => TouchOutcome::Ignored,
        }
    }

    pub fn teardown(&mut self, mapping: &ButtonMapping, ctx: &mut DispatchContext<'_>) {
        let held = if mapping.is_toggle {
            self.toggled
        } else {
            self.pointer.is_some()
        };
        self.release_pointer(ctx);
        self.toggled = false;
        if held {
            emit_action(mapping.keycode, mapping.button_mode, false, ctx);
        }
    }

    fn release_pointer(&mut self, ctx: &DispatchContext<'_>) {
        if let Some(pointer) = self.pointer.take() {
            if self.claimed {
                ctx.tracker.release(pointer);
            }
        }
        self.claimed = false;
    }
}
