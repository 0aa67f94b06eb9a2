// THEORY:
// Every tuning constant of the sorter is supplied from outside: sensor size, the
// candidate grid, clustering capacity and threshold, and the servo poses and
// speed. The defaults are the values the machine was calibrated with, so an
// empty config file (or none at all) gives a working sorter. A config is
// validated once at startup; nothing downstream re-checks it per bead.

use serde::Deserialize;
use std::ops::Range;
use std::path::Path;
use std::time::Duration;

use crate::core_modules::bead_locator::BeadLocator;
use crate::core_modules::cluster_store::OverflowPolicy;
use crate::core_modules::color::color::Distance;
use crate::core_modules::pixel_buffer::PixelIndex;
use crate::core_modules::sample_arc::SampleArc;
use crate::core_modules::tube::{row_for, SLICES_PER_ROW};
use crate::error::ConfigError;
use crate::hardware::ServoRanges;
use crate::motion::{Degrees, WaitPolicy};

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    pub image: ImageConfig,
    pub locator: LocatorConfig,
    pub clustering: ClusteringConfig,
    pub motion: MotionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self { width: 40, height: 30 }
    }
}

/// Candidate arc starts: every column in `columns` crossed with every row in
/// `rows`, both half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub columns: [u32; 2],
    pub rows: [u32; 2],
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            columns: [15, 21],
            rows: [18, 22],
        }
    }
}

impl LocatorConfig {
    pub fn column_range(&self) -> Range<u32> {
        self.columns[0]..self.columns[1]
    }

    pub fn row_range(&self) -> Range<u32> {
        self.rows[0]..self.rows[1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub max_tubes: usize,
    /// Redmean distance below which a bead joins an existing tube.
    pub threshold: Distance,
    pub overflow: OverflowPolicy,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            max_tubes: 30,
            threshold: 35,
            overflow: OverflowPolicy::Widen,
        }
    }
}

/// Feeder servo poses.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeederPoses {
    /// Bead falls out of the feeder into the chute.
    pub release: Degrees,
    /// Feeder sits under the bead reservoir.
    pub present: Degrees,
    /// Wiggle either side of `present` to seat a bead.
    pub present_offset: Degrees,
    /// Bead is held in front of the camera.
    pub capture: Degrees,
}

impl Default for FeederPoses {
    fn default() -> Self {
        Self {
            release: 170.0,
            present: 12.0,
            present_offset: 8.0,
            capture: 90.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Slowest servo speed under load, degrees per second.
    pub speed_deg_per_sec: f32,
    /// Extra pause after every move.
    pub settle_ms: u64,
    pub feeder: FeederPoses,
    /// Hopper angle for each row.
    pub row_angles: Vec<Degrees>,
    /// Chute angle for slice 0.
    pub slice_base: Degrees,
    /// Chute angle between neighbouring slices.
    pub slice_step: Degrees,
    pub servos: ServoRanges,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed_deg_per_sec: 200.0,
            settle_ms: 150,
            feeder: FeederPoses::default(),
            row_angles: vec![30.0, 70.0, 110.0, 150.0],
            slice_base: 6.0,
            slice_step: 12.0,
            servos: ServoRanges::default(),
        }
    }
}

impl MotionConfig {
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(self.speed_deg_per_sec, Duration::from_millis(self.settle_ms))
    }

    /// Hopper angle for `row`. Rows past the table reuse the last entry;
    /// validation guarantees that never happens for reachable tubes.
    pub fn row_angle(&self, row: usize) -> Degrees {
        self.row_angles
            .get(row)
            .or(self.row_angles.last())
            .copied()
            .unwrap_or_default()
    }

    pub fn slice_angle(&self, slice: usize) -> Degrees {
        self.slice_base + slice as f32 * self.slice_step
    }
}

impl SorterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SorterConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Candidate arc start pixels, columns outermost.
    pub fn candidate_starts(&self) -> Vec<PixelIndex> {
        BeadLocator::grid_starts(
            self.image.width,
            self.locator.column_range(),
            self.locator.row_range(),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.image.width == 0 || self.image.height == 0 {
            return invalid(format!("image size {}x{} is empty", self.image.width, self.image.height));
        }

        // Bounds first: the grid is only materialized once it is known to fit.
        let [first_column, end_column] = self.locator.columns;
        let [first_row, end_row] = self.locator.rows;
        if first_column >= end_column || first_row >= end_row {
            return invalid(format!(
                "locator grid columns {:?} x rows {:?} has no candidate starts",
                self.locator.columns, self.locator.rows
            ));
        }
        if end_column > self.image.width || end_row > self.image.height {
            return invalid(format!(
                "locator grid columns {:?} x rows {:?} exceeds the {}x{} image",
                self.locator.columns, self.locator.rows, self.image.width, self.image.height
            ));
        }
        for start in self.candidate_starts() {
            if let Err(e) = SampleArc::around(start, self.image.width, self.image.height) {
                return invalid(format!("locator grid: {e}"));
            }
        }

        let clustering = &self.clustering;
        if clustering.max_tubes == 0 {
            return invalid("max_tubes must be at least 1".to_string());
        }

        let motion = &self.motion;
        if !motion.speed_deg_per_sec.is_finite() || motion.speed_deg_per_sec <= 0.0 {
            return invalid(format!("speed_deg_per_sec must be positive, got {}", motion.speed_deg_per_sec));
        }
        let feeder = &motion.feeder;
        let angles = [
            ("feeder.release", feeder.release),
            ("feeder.present", feeder.present),
            ("feeder.present_offset", feeder.present_offset),
            ("feeder.capture", feeder.capture),
            ("slice_base", motion.slice_base),
            ("slice_step", motion.slice_step),
        ];
        for (name, value) in angles.into_iter().chain(motion.row_angles.iter().map(|&a| ("row_angles", a))) {
            if !value.is_finite() {
                return invalid(format!("{name} must be a finite angle, got {value}"));
            }
        }
        for (name, servo) in [
            ("feeder", &motion.servos.feeder),
            ("hopper", &motion.servos.hopper),
            ("chute", &motion.servos.chute),
        ] {
            if !servo.min_angle.is_finite() || !servo.max_angle.is_finite() {
                return invalid(format!(
                    "{name} servo range {}..{} is not finite",
                    servo.min_angle, servo.max_angle
                ));
            }
            if servo.span() <= 0.0 || servo.max_pulse_us <= servo.min_pulse_us {
                return invalid(format!("{name} servo range is empty"));
            }
        }
        // The highest row is used by the last tube or, when that one sits on an
        // even slice, by the one before it.
        let last = clustering.max_tubes - 1;
        let rows_needed = row_for(last).max(row_for(last.saturating_sub(1))) + 1;
        if motion.row_angles.len() < rows_needed {
            return invalid(format!(
                "{} tubes need {} row angles, got {}",
                clustering.max_tubes,
                rows_needed,
                motion.row_angles.len()
            ));
        }
        let slices_needed = clustering.max_tubes.min(SLICES_PER_ROW);
        let last_slice = motion.slice_angle(slices_needed - 1);
        if !(motion.servos.chute.min_angle..=motion.servos.chute.max_angle).contains(&last_slice) {
            return invalid(format!("slice {} angle {last_slice} is outside the chute range", slices_needed - 1));
        }
        Ok(())
    }
}
