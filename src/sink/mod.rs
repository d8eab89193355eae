use crate::protocol::*;
use std::sync::{Arc, Mutex};

pub mod bridge;

/// Downstream consumer of synthesized input
///
/// Every call is fire-and-forget. Implementations deliver into the hosted
/// runtime on their own terms; when a backend is unavailable they log a
/// warning and drop the call, and controls tolerate that silently.
pub trait InputSink: Send + Sync {
    /// Press or release a platform key code
    fn send_key(&self, code: i32, is_down: bool);

    fn send_mouse_button(&self, button: MouseButton, is_down: bool, cursor: Cursor);

    /// Relative cursor movement in surface pixels
    fn send_mouse_move(&self, dx: f32, dy: f32);

    /// Stick deflection, each axis in [-1, 1] with +y pointing down
    fn send_analog_stick(&self, stick: Stick, x: f32, y: f32);

    fn send_gamepad_button(&self, button: GamepadButton, is_down: bool);

    /// Trigger pull in [0, 1]
    fn send_gamepad_trigger(&self, trigger: Trigger, value: f32);
}

impl SinkEvent {
    /// Replay this event into a sink
    pub fn deliver(&self, sink: &dyn InputSink) {
        match *self {
            SinkEvent::Key { code, down } => sink.send_key(code, down),
            SinkEvent::MouseButton {
                button,
                down,
                cursor,
            } => sink.send_mouse_button(button, down, cursor),
            SinkEvent::MouseMove { dx, dy } => sink.send_mouse_move(dx, dy),
            SinkEvent::AnalogStick { stick, x, y } => sink.send_analog_stick(stick, x, y),
            SinkEvent::GamepadButton { button, down } => sink.send_gamepad_button(button, down),
            SinkEvent::GamepadTrigger { trigger, value } => {
                sink.send_gamepad_trigger(trigger, value)
            }
        }
    }
}

/// Build the event for an analog stick call, clamping both axes
pub fn analog_stick_event(stick: Stick, x: f32, y: f32) -> SinkEvent {
    SinkEvent::AnalogStick {
        stick,
        x: x.clamp(-1.0, 1.0),
        y: y.clamp(-1.0, 1.0),
    }
}

/// Build the event for a trigger call, clamping the value
pub fn trigger_event(trigger: Trigger, value: f32) -> SinkEvent {
    SinkEvent::GamepadTrigger {
        trigger,
        value: value.clamp(0.0, 1.0),
    }
}

/// Sink that keeps every call in order
///
/// Clones share the same buffer, so one handle can be given to a layout
/// while another inspects what was sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Take everything recorded so far, leaving the buffer empty
    pub fn take(&self) -> Vec<SinkEvent> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}
impl InputSink for RecordingSink {
    fn send_key(&self, code: i32, is_down: bool) {
        self.push(SinkEvent::Key {
            code,
            down: is_down,
        });
    }

    fn send_mouse_button(&self, button: MouseButton, is_down: bool, cursor: Cursor) {
        self.push(SinkEvent::MouseButton {
            button,
            down: is_down,
            cursor,
        });
    }

    fn send_mouse_move(&self, dx: f32, dy: f32) {
        self.push(SinkEvent::MouseMove { dx, dy });
    }

    fn send_analog_stick(&self, stick: Stick, x: f32, y: f32) {
        self.push(analog_stick_event(stick, x, y));
    }

    fn send_gamepad_button(&self, button: GamepadButton, is_down: bool) {
        self.push(SinkEvent::GamepadButton {
            button,
            down: is_down,
        });
    }

    fn send_gamepad_trigger(&self, trigger: Trigger, value: f32) {
        self.push(trigger_event(trigger, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order_and_clamps() {
        let sink = RecordingSink::new();
        let shared = sink.clone();

        sink.send_key(30, true);
        sink.send_analog_stick(Stick::Right, 1.7, -3.0);
        sink.send_gamepad_trigger(Trigger::Left, 2.0);
        sink.send_key(30, false);

        assert_eq!(
            shared.take(),
            vec![
                SinkEvent::Key {
                    code: 30,
                    down: true
                },
                SinkEvent::AnalogStick {
                    stick: Stick::Right,
                    x: 1.0,
                    y: -1.0
                },
                SinkEvent::GamepadTrigger {
                    trigger: Trigger::Left,
                    value: 1.0
                },
                SinkEvent::Key {
                    code: 30,
                    down: false
                },
            ]
        );
        assert!(sink.events().is_empty());
    }

    #[test]
    fn deliver_replays_into_another_sink() {
        let source = vec![
            SinkEvent::MouseMove { dx: 4.0, dy: -2.0 },
            SinkEvent::MouseButton {
                button: MouseButton::Left,
                down: true,
                cursor: Cursor::IN_PLACE,
            },
            SinkEvent::GamepadButton {
                button: GamepadButton::Start,
                down: true,
            },
        ];
        let target = RecordingSink::new();
        for event in &source {
            event.deliver(&target);
        }
        assert_eq!(target.events(), source);
    }
}
