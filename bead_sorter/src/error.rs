// THEORY:
// Every failure the sorter can hit falls in one of two camps. Geometry and
// configuration problems are programming mistakes and are caught once, when the
// locator and sequencer are built. Capture and actuator failures come from the
// hardware collaborators and abort the bead cycle in flight. Neither camp is
// retried here.

use std::path::PathBuf;
use thiserror::Error;

use crate::hardware::ActuatorId;

pub type Result<T> = std::result::Result<T, SorterError>;

/// A sample arc that would leave the pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("start pixel {start} is outside the {width}x{height} buffer")]
    OutOfBounds { start: usize, width: u32, height: u32 },
    #[error("start pixel {start} (row {row}) is too close to the top edge; row must exceed {min_row}")]
    TooCloseToTop { start: usize, row: u32, min_row: u32 },
    #[error("start pixel {start} (column {column}) leaves no room for the arc before the right edge at {width}")]
    TooCloseToRight { start: usize, column: u32, width: u32 },
}

/// A raw capture whose size doesn't match the configured sensor geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("expected {expected} bytes for a {width}x{height} RGB565 capture, got {actual}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("capture is {width}x{height}, locator was built for {expected_width}x{expected_height}")]
    GeometryMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture source has no more frames. Only replay sources end.
    #[error("capture source exhausted")]
    Exhausted,
    #[error("capture i/o failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("actuator {actuator:?} rejected angle {angle}: {reason}")]
    Rejected {
        actuator: ActuatorId,
        angle: f32,
        reason: String,
    },
    #[error("actuator {actuator:?} fault: {reason}")]
    Fault { actuator: ActuatorId, reason: String },
}

#[derive(Debug, Error)]
pub enum SorterError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

impl SorterError {
    /// True when a replay camera simply ran out of frames.
    pub fn is_capture_exhausted(&self) -> bool {
        matches!(self, SorterError::Capture(CaptureError::Exhausted))
    }
}
