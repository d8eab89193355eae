use crate::error::LayoutError;
use crate::protocol::ControlId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Which behavior owns a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKind {
    Button,
    Joystick,
    TouchPad,
    Text,
}

/// Position and size in surface pixels, rotation in degrees around the center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub rotation: f32,
}
impl Geometry {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn radius(&self) -> f32 {
        self.width.min(self.height) / 2.0
    }

    /// Point relative to the center, with the control's rotation undone
    pub fn to_local(&self, x: f32, y: f32) -> (f32, f32) {
        let (cx, cy) = self.center();
        let (dx, dy) = (x - cx, y - cy);
        if self.rotation == 0.0 {
            return (dx, dy);
        }
        let (sin, cos) = (-self.rotation.to_radians()).sin_cos();
        (dx * cos - dy * sin, dx * sin + dy * cos)
    }

    pub fn contains_rect(&self, x: f32, y: f32) -> bool {
        let (lx, ly) = self.to_local(x, y);
        lx.abs() <= self.width / 2.0 && ly.abs() <= self.height / 2.0
    }

    pub fn contains_circle(&self, x: f32, y: f32) -> bool {
        let (lx, ly) = self.to_local(x, y);
        lx.hypot(ly) <= self.radius()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Shape {
    #[default]
    Rect,
    Circle,
}

/// Visual attributes; the engine reads only `shape` and `visible`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Style {
    pub opacity: f32,
    /// 0xAARRGGBB
    pub background_color: u32,
    pub stroke_color: u32,
    pub stroke_width: f32,
    pub corner_radius: f32,
    pub shape: Shape,
    pub visible: bool,
}
impl Default for Style {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            background_color: 0x4d00_0000,
            stroke_color: 0xffff_ffff,
            stroke_width: 1.0,
            corner_radius: 0.0,
            shape: Shape::Rect,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ButtonMode {
    #[default]
    KeyboardMouse,
    Gamepad,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonMapping {
    /// Abstract key code, see [`crate::keycodes`]
    pub keycode: i32,
    #[serde(default)]
    pub is_toggle: bool,
    #[serde(default)]
    pub button_mode: ButtonMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoystickMode {
    #[default]
    Keyboard,
    MouseDelta,
    AnalogController,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoystickMapping {
    /// Up, right, down, left
    #[serde(default)]
    pub four_way_keys: [i32; 4],
    #[serde(default)]
    pub mode: JoystickMode,
    #[serde(default)]
    pub use_right_stick: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchPadMapping {
    #[serde(default)]
    pub pass_through: bool,
}

/// Kind-specific input mapping; the serde tag doubles as the control kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "inputMapping")]
pub enum InputMapping {
    Button(ButtonMapping),
    Joystick(JoystickMapping),
    TouchPad(TouchPadMapping),
    Text,
}
impl InputMapping {
    pub fn kind(&self) -> ControlKind {
        match self {
            InputMapping::Button(_) => ControlKind::Button,
            InputMapping::Joystick(_) => ControlKind::Joystick,
            InputMapping::TouchPad(_) => ControlKind::TouchPad,
            InputMapping::Text => ControlKind::Text,
        }
    }
}

/// One virtual control as described by a layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSpec {
    pub id: ControlId,
    #[serde(default)]
    pub name: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub style: Style,
    #[serde(flatten)]
    pub mapping: InputMapping,
}
impl ControlSpec {
    pub fn new(id: impl Into<ControlId>, geometry: Geometry, mapping: InputMapping) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            geometry,
            style: Style::default(),
            mapping,
        }
    }

    pub fn button(id: impl Into<ControlId>, geometry: Geometry, keycode: i32) -> Self {
        Self::new(
            id,
            geometry,
            InputMapping::Button(ButtonMapping {
                keycode,
                is_toggle: false,
                button_mode: ButtonMode::KeyboardMouse,
            }),
        )
    }

    pub fn joystick(id: impl Into<ControlId>, geometry: Geometry, mapping: JoystickMapping) -> Self {
        Self::new(id, geometry, InputMapping::Joystick(mapping))
    }

    pub fn touchpad(id: impl Into<ControlId>, geometry: Geometry, pass_through: bool) -> Self {
        Self::new(
            id,
            geometry,
            InputMapping::TouchPad(TouchPadMapping { pass_through }),
        )
    }

    pub fn text(id: impl Into<ControlId>, geometry: Geometry) -> Self {
        Self::new(id, geometry, InputMapping::Text)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn kind(&self) -> ControlKind {
        self.mapping.kind()
    }

    /// Whether touches can be routed to this control at all
    pub fn is_interactive(&self) -> bool {
        self.style.visible && self.kind() != ControlKind::Text
    }

    /// Hit-test a surface point against the control's region
    pub fn hit_test(&self, x: f32, y: f32) -> bool {
        let circular = self.kind() == ControlKind::Joystick || self.style.shape == Shape::Circle;
        if circular {
            self.geometry.contains_circle(x, y)
        } else {
            self.geometry.contains_rect(x, y)
        }
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.id.is_empty() {
            return Err(LayoutError::EmptyId);
        }
        let g = &self.geometry;
        if !(g.width > 0.0 && g.height > 0.0) {
            return Err(LayoutError::InvalidSize {
                id: self.id.clone(),
                width: g.width,
                height: g.height,
            });
        }
        if !(0.0..=1.0).contains(&self.style.opacity) {
            return Err(LayoutError::InvalidOpacity {
                id: self.id.clone(),
                opacity: self.style.opacity,
            });
        }
        if self.style.stroke_width.is_nan() || self.style.stroke_width < 0.0 {
            return Err(LayoutError::InvalidStroke {
                id: self.id.clone(),
                stroke_width: self.style.stroke_width,
            });
        }
        Ok(())
    }
}

/// A typed layout as handed over by the editor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(default = "LayoutDocument::current_version")]
    pub version: u32,
    pub controls: Vec<ControlSpec>,
}
impl LayoutDocument {
    pub const VERSION: u32 = 1;

    fn current_version() -> u32 {
        Self::VERSION
    }

    pub fn new(controls: Vec<ControlSpec>) -> Self {
        Self {
            version: Self::VERSION,
            controls,
        }
    }

    /// Parse and validate a JSON layout
    pub fn from_json(text: &str) -> Result<Self, LayoutError> {
        let document: Self = serde_json::from_str(text)?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String, LayoutError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every control; a version other than [`Self::VERSION`] is read
    /// as-is with a warning
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.version != Self::VERSION {
            warn!(
                "Layout version {} is not {}, reading it anyway",
                self.version,
                Self::VERSION
            );
        }
        let mut seen = HashSet::new();
        for control in &self.controls {
            control.validate()?;
            if !seen.insert(control.id.as_str()) {
                return Err(LayoutError::DuplicateId(control.id.clone()));
            }
        }
        Ok(())
    }
}
