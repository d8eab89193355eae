use crate::protocol::ControlId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the layout editor
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("control id must not be empty")]
    EmptyId,

    #[error("control '{id}' has a non-positive size {width}x{height}")]
    InvalidSize { id: ControlId, width: f32, height: f32 },

    #[error("control '{id}' has opacity {opacity} outside [0, 1]")]
    InvalidOpacity { id: ControlId, opacity: f32 },

    #[error("control '{id}' has a negative stroke width {stroke_width}")]
    InvalidStroke { id: ControlId, stroke_width: f32 },

    #[error("a control with id '{0}' already exists")]
    DuplicateId(ControlId),

    #[error("no control with id '{0}'")]
    UnknownControl(ControlId),

    #[error("cannot change control id from '{from}' to '{to}'")]
    IdMismatch { from: ControlId, to: ControlId },

    #[error("failed to parse layout document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("overlay runtime is no longer running")]
    RuntimeStopped,
}

/// Errors loading an engine configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}
