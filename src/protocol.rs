use serde::{Deserialize, Serialize};

/// Multi-touch pointer id as reported by the rendering surface
pub type PointerId = i32;

/// Stable control id, unique within a layout
pub type ControlId = String;

/// Phase of a single pointer within a multi-touch stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchAction {
    Down,
    Move,
    Up,
    Cancel,
}

/// One pointer sample, in rendering-surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub pointer: PointerId,
    pub action: TouchAction,
    pub x: f32,
    pub y: f32,
}
impl TouchEvent {
    pub fn new(pointer: PointerId, action: TouchAction, x: f32, y: f32) -> Self {
        Self {
            pointer,
            action,
            x,
            y,
        }
    }

    pub fn down(pointer: PointerId, x: f32, y: f32) -> Self {
        Self::new(pointer, TouchAction::Down, x, y)
    }

    pub fn moved(pointer: PointerId, x: f32, y: f32) -> Self {
        Self::new(pointer, TouchAction::Move, x, y)
    }

    pub fn up(pointer: PointerId, x: f32, y: f32) -> Self {
        Self::new(pointer, TouchAction::Up, x, y)
    }

    pub fn cancel(pointer: PointerId, x: f32, y: f32) -> Self {
        Self::new(pointer, TouchAction::Cancel, x, y)
    }
}

/// Size and pixel density of the rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMetrics {
    pub width: f32,
    pub height: f32,
    /// Pixels per density-independent pixel
    pub density: f32,
}
impl SurfaceMetrics {
    pub fn new(width: f32, height: f32, density: f32) -> Self {
        Self {
            width,
            height,
            density,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Convert density-independent pixels to surface pixels
    pub fn dp_to_px(&self, dp: f32) -> f32 {
        dp * self.density
    }
}
impl Default for SurfaceMetrics {
    fn default() -> Self {
        Self::new(1280.0, 720.0, 1.0)
    }
}

/// Mouse buttons, including the scroll wheel as two pseudo-buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
}

/// Where a mouse button event happens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Cursor {
    /// Discrete click at a surface position
    Absolute { x: f32, y: f32 },
    /// Offset from the current cursor; `(0, 0)` clicks in place
    Relative { dx: f32, dy: f32 },
}
impl Cursor {
    pub const IN_PLACE: Cursor = Cursor::Relative { dx: 0.0, dy: 0.0 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stick {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    Left,
    Right,
}

/// Standard gamepad buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamepadButton {
    A,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    Select,
    Start,
    Guide,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}
impl GamepadButton {
    pub const ALL: [GamepadButton; 15] = [
        GamepadButton::A,
        GamepadButton::B,
        GamepadButton::X,
        GamepadButton::Y,
        GamepadButton::LeftBumper,
        GamepadButton::RightBumper,
        GamepadButton::Select,
        GamepadButton::Start,
        GamepadButton::Guide,
        GamepadButton::LeftStick,
        GamepadButton::RightStick,
        GamepadButton::DPadUp,
        GamepadButton::DPadDown,
        GamepadButton::DPadLeft,
        GamepadButton::DPadRight,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Value form of every call an input sink accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkEvent {
    Key {
        code: i32,
        down: bool,
    },
    MouseButton {
        button: MouseButton,
        down: bool,
        cursor: Cursor,
    },
    MouseMove {
        dx: f32,
        dy: f32,
    },
    AnalogStick {
        stick: Stick,
        x: f32,
        y: f32,
    },
    GamepadButton {
        button: GamepadButton,
        down: bool,
    },
    GamepadTrigger {
        trigger: Trigger,
        value: f32,
    },
}
impl SinkEvent {
    /// Whether delivering this event needs a virtual gamepad backend
    pub fn needs_gamepad(&self) -> bool {
        matches!(
            self,
            SinkEvent::AnalogStick { .. }
                | SinkEvent::GamepadButton { .. }
                | SinkEvent::GamepadTrigger { .. }
        )
    }
}

/// Commands sent to a bridge endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BridgeCommand {
    Hello,
    Deliver { events: Vec<SinkEvent> },
}

/// Results returned by a bridge endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BridgeResult {
    Capabilities { gamepad: bool },
    Delivered { count: usize },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub id: String,
    pub command: BridgeCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub id: String,
    pub result: BridgeResult,
}
