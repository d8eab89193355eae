//! vcontrols - Virtual Control Overlay Engine
//!
//! This library turns touches on configurable on-screen controls (buttons,
//! joysticks and touch-pads) into synthetic keyboard, mouse and gamepad
//! input delivered to a hosted runtime through an [`InputSink`].

pub mod behavior;
pub mod config;
pub mod control;
pub mod error;
pub mod keycodes;
pub mod layout;
pub mod protocol;
pub mod runtime;
pub mod sink;
pub mod timer;
pub mod tracker;

// Re-export commonly used types
pub use protocol::{
    ControlId, Cursor, GamepadButton, MouseButton, PointerId, SinkEvent, Stick, SurfaceMetrics,
    TouchAction, TouchEvent, Trigger,
};

pub use config::{EngineConfig, JoystickConfig, TouchPadConfig};
pub use control::{ControlKind, ControlSpec, Geometry, InputMapping, LayoutDocument, Style};
pub use error::{ConfigError, LayoutError};
pub use layout::{ControlLayout, Routing};
pub use runtime::{OverlayHandle, OverlayRuntime};
pub use sink::bridge::{BridgeServer, BridgeSink};
pub use sink::{InputSink, RecordingSink};
pub use timer::{ManualTimers, TimerEvent, TimerKind, TimerQueue, TimerToken, TokioTimers};
pub use tracker::{PointerTracker, SurfaceHooks};
