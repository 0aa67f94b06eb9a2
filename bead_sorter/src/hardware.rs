// THEORY:
// The sorter core never touches pins. It talks to two collaborators through
// small traits: a `Camera` that hands back one raw capture, and `Actuators` that
// accept a target angle per servo. Real drivers live in the firmware bootstrap;
// this module also carries the stand-ins used for dry runs on a workstation: a
// camera that replays raw captures from a directory and actuators that only log
// what they would have done.

use std::path::{Path, PathBuf};

use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::{ActuatorError, CaptureError, Result};
use crate::motion::{Degrees, ServoRange};

/// The three servos of the sorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorId {
    /// Picks a bead up, presents it to the camera and drops it.
    Feeder,
    /// Tilts the hopper to select a row.
    Hopper,
    /// Rotates the chute to select a slice.
    Chute,
}

impl ActuatorId {
    pub const COUNT: usize = 3;
    pub const ALL: [ActuatorId; Self::COUNT] = [ActuatorId::Feeder, ActuatorId::Hopper, ActuatorId::Chute];

    pub fn index(self) -> usize {
        match self {
            ActuatorId::Feeder => 0,
            ActuatorId::Hopper => 1,
            ActuatorId::Chute => 2,
        }
    }
}

pub trait Camera {
    /// Takes one capture. Only called while the feeder holds the capture pose.
    fn capture(&mut self) -> Result<PixelBuffer>;
}

pub trait Actuators {
    /// Commands `actuator` to `degrees` and returns immediately.
    fn set_angle(&mut self, actuator: ActuatorId, degrees: Degrees) -> Result<()>;
}

/// Replays raw RGB565 captures from a directory in file-name order.
pub struct DirectoryCamera {
    width: u32,
    height: u32,
    files: std::vec::IntoIter<PathBuf>,
    current: Option<PathBuf>,
}

impl DirectoryCamera {
    pub fn open(dir: &Path, width: u32, height: u32) -> Result<Self> {
        let files = capture_files(dir)?;
        tracing::info!(dir = %dir.display(), captures = files.len(), "opened capture directory");
        Ok(Self {
            width,
            height,
            files: files.into_iter(),
            current: None,
        })
    }

    /// File the last capture was read from.
    pub fn current_file(&self) -> Option<&Path> {
        self.current.as_deref()
    }
}

impl Camera for DirectoryCamera {
    fn capture(&mut self) -> Result<PixelBuffer> {
        let path = self.files.next().ok_or(CaptureError::Exhausted)?;
        let bytes = std::fs::read(&path).map_err(|source| CaptureError::Io {
            path: path.clone(),
            source,
        })?;
        let buffer = PixelBuffer::from_rgb565_bytes(self.width, self.height, &bytes)?;
        tracing::debug!(file = %path.display(), "captured");
        self.current = Some(path);
        Ok(buffer)
    }
}

/// Regular files in `dir`, sorted by name. Hidden files are skipped.
pub fn capture_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_err = |source| CaptureError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type().map_err(io_err)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Servo ranges for every actuator.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Deserialize)]
#[serde(default)]
pub struct ServoRanges {
    pub feeder: ServoRange,
    pub hopper: ServoRange,
    pub chute: ServoRange,
}

impl ServoRanges {
    pub fn get(&self, actuator: ActuatorId) -> &ServoRange {
        match actuator {
            ActuatorId::Feeder => &self.feeder,
            ActuatorId::Hopper => &self.hopper,
            ActuatorId::Chute => &self.chute,
        }
    }
}

/// Actuators that log the pulse width each command would produce.
pub struct LoggingActuators {
    ranges: ServoRanges,
    commands: u64,
}

impl LoggingActuators {
    pub fn new(ranges: ServoRanges) -> Self {
        Self { ranges, commands: 0 }
    }

    pub fn commands(&self) -> u64 {
        self.commands
    }
}

impl Actuators for LoggingActuators {
    fn set_angle(&mut self, actuator: ActuatorId, degrees: Degrees) -> Result<()> {
        if !degrees.is_finite() {
            return Err(ActuatorError::Rejected {
                actuator,
                angle: degrees,
                reason: "angle is not finite".to_string(),
            }
            .into());
        }
        let pulse_us = self.ranges.get(actuator).pulse_width_us(degrees);
        self.commands += 1;
        tracing::info!(?actuator, degrees, pulse_us, "servo");
        Ok(())
    }
}
