use super::{DispatchContext, TouchOutcome, emit_action, is_release};
use crate::control::{ButtonMode, Geometry, JoystickMapping, JoystickMode};
use crate::protocol::{PointerId, Stick, TouchAction, TouchEvent};
use tracing::trace;

const UP: usize = 0;
const RIGHT: usize = 1;
const DOWN: usize = 2;
const LEFT: usize = 3;

/// Deflection state of a joystick control
#[derive(Debug, Default)]
pub struct JoystickBehavior {
    pointer: Option<PointerId>,
    claimed: bool,
    /// Four-way keys currently held, indexed up, right, down, left
    held: [bool; 4],
    vector: (f32, f32),
}
impl JoystickBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer(&self) -> Option<PointerId> {
        self.pointer
    }

    /// Last normalized deflection, +y pointing down
    pub fn vector(&self) -> (f32, f32) {
        self.vector
    }

    /// Deflection of a surface point, clamped to the unit circle
    pub fn deflection(geometry: &Geometry, x: f32, y: f32) -> (f32, f32) {
        let radius = geometry.radius();
        let (lx, ly) = geometry.to_local(x, y);
        let (nx, ny) = (lx / radius, ly / radius);
        let length = nx.hypot(ny);
        if length > 1.0 {
            (nx / length, ny / length)
        } else {
            (nx, ny)
        }
    }

    pub fn on_touch(
        &mut self,
        mapping: &JoystickMapping,
        geometry: &Geometry,
        event: &TouchEvent,
        ctx: &mut DispatchContext<'_>,
    ) -> TouchOutcome {
        match event.action {
            TouchAction::Down => {
                if self.pointer.is_some() {
                    trace!("'{}' already held, ignoring pointer {}", ctx.control_id, event.pointer);
                    return TouchOutcome::Ignored;
                }
                self.pointer = Some(event.pointer);
                self.claimed = ctx.tracker.claim(event.pointer, ctx.control_id);
                self.apply(mapping, Self::deflection(geometry, event.x, event.y), ctx);
                TouchOutcome::Consumed
            }
            TouchAction::Move => {
                if self.pointer != Some(event.pointer) {
                    return TouchOutcome::Ignored;
                }
                self.apply(mapping, Self::deflection(geometry, event.x, event.y), ctx);
                TouchOutcome::Consumed
            }
            action if is_release(action) => {
                if self.pointer != Some(event.pointer) {
                    return TouchOutcome::Ignored;
                }
                self.recenter(mapping, ctx);
                TouchOutcome::Consumed
            }
            _ => TouchOutcome::Ignored,
        }
    }

    pub fn teardown(&mut self, mapping: &JoystickMapping, ctx: &mut DispatchContext<'_>) {
        if self.pointer.is_some() || self.held.iter().any(|held| *held) {
            self.recenter(mapping, ctx);
        }
    }

    fn recenter(&mut self, mapping: &JoystickMapping, ctx: &DispatchContext<'_>) {
        match mapping.mode {
            JoystickMode::AnalogController => ctx.sink.send_analog_stick(stick(mapping), 0.0, 0.0),
            JoystickMode::Keyboard => self.update_keys(mapping, [false; 4], ctx),
            JoystickMode::MouseDelta => {}
        }
        self.vector = (0.0, 0.0);

        if let Some(pointer) = self.pointer.take() {
            if self.claimed {
                ctx.tracker.release(pointer);
            }
        }
        self.claimed = false;
    }

    fn apply(&mut self, mapping: &JoystickMapping, vector: (f32, f32), ctx: &DispatchContext<'_>) {
        self.vector = vector;
        let (x, y) = vector;
        match mapping.mode {
            JoystickMode::AnalogController => ctx.sink.send_analog_stick(stick(mapping), x, y),
            JoystickMode::MouseDelta => {
                if x != 0.0 || y != 0.0 {
                    let speed = ctx.config.joystick.mouse_speed;
                    ctx.sink.send_mouse_move(x * speed, y * speed);
                }
            }
            JoystickMode::Keyboard => {
                let dz = ctx.config.joystick.deadzone;
                let mut wanted = [false; 4];
                wanted[UP] = y < -dz;
                wanted[RIGHT] = x > dz;
                wanted[DOWN] = y > dz;
                wanted[LEFT] = x < -dz;
                self.update_keys(mapping, wanted, ctx);
            }
        }
    }

    /// Press and release four-way keys so that `held` matches `wanted`
    fn update_keys(&mut self, mapping: &JoystickMapping, wanted: [bool; 4], ctx: &DispatchContext<'_>) {
        // Releases first so opposite directions never overlap
        for pass_down in [false, true] {
            for direction in [UP, RIGHT, DOWN, LEFT] {
                if self.held[direction] != wanted[direction] && wanted[direction] == pass_down {
                    emit_action(
                        mapping.four_way_keys[direction],
                        ButtonMode::KeyboardMouse,
                        pass_down,
                        ctx,
                    );
                    self.held[direction] = pass_down;
                }
            }
        }
    }
}

fn stick(mapping: &JoystickMapping) -> Stick {
    if mapping.use_right_stick {
        Stick::Right
    } else {
        Stick::Left
    }
}
