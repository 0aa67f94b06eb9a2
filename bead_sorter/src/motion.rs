// THEORY:
// The sorter moves beads with hobby servos and never reads their position back.
// The only way to know a move has finished is to wait long enough. This module
// holds everything needed to turn "put the bead in tube N" into an ordered list
// of servo targets, and to turn each move into a conservative wait:
//
//     wait = ceil(|degrees moved| / speed) in whole milliseconds + settle pause
//
// Rounding up to the millisecond never shortens a wait. When a servo's position is unknown (the
// first move after power-up) the move is assumed to cross the servo's whole
// range.

use serde::Deserialize;
use std::time::Duration;

use crate::config::MotionConfig;
use crate::core_modules::tube::{row_for, slice_for, TubeIndex};
use crate::hardware::ActuatorId;

pub type Degrees = f32;

/// Angular range of one servo and its linear angle-to-pulse mapping.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ServoRange {
    pub min_angle: Degrees,
    pub max_angle: Degrees,
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
}

impl Default for ServoRange {
    fn default() -> Self {
        Self {
            min_angle: 0.0,
            max_angle: 180.0,
            min_pulse_us: 500,
            max_pulse_us: 2500,
        }
    }
}

impl ServoRange {
    pub fn span(&self) -> Degrees {
        self.max_angle - self.min_angle
    }

    pub fn clamp(&self, angle: Degrees) -> Degrees {
        angle.clamp(self.min_angle, self.max_angle)
    }

    /// Pulse width for `angle`, clamped to the range first.
    pub fn pulse_width_us(&self, angle: Degrees) -> u32 {
        let span = self.span();
        if span <= 0.0 {
            return self.min_pulse_us;
        }
        let fraction = (self.clamp(angle) - self.min_angle) / span;
        let pulse_span = self.max_pulse_us as f32 - self.min_pulse_us as f32;
        (self.min_pulse_us as f32 + fraction * pulse_span).round() as u32
    }
}

/// One state of the per-bead choreography, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    SettleRelease,
    PresentLow,
    PresentHigh,
    PresentCenter,
    CapturePose,
    RouteRow,
    RouteSlice,
    ReleasePose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    pub stage: Stage,
    pub actuator: ActuatorId,
    pub angle: Degrees,
}

/// An ordered list of servo targets, executed strictly one after the other.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MotionPlan {
    steps: Vec<MotionStep>,
}

impl MotionPlan {
    /// Moves that bring a bead from the feeder into the capture pose.
    pub fn presentation(motion: &MotionConfig) -> Self {
        let feeder = &motion.feeder;
        let mut plan = Self::default();
        plan.push(Stage::SettleRelease, ActuatorId::Feeder, feeder.release);
        plan.push(Stage::PresentLow, ActuatorId::Feeder, feeder.present - feeder.present_offset);
        plan.push(Stage::PresentHigh, ActuatorId::Feeder, feeder.present + feeder.present_offset);
        plan.push(Stage::PresentCenter, ActuatorId::Feeder, feeder.present);
        plan.push(Stage::CapturePose, ActuatorId::Feeder, feeder.capture);
        plan
    }

    /// Moves that aim the hopper and chute at `tube` and drop the bead.
    pub fn routing(motion: &MotionConfig, tube: TubeIndex) -> Self {
        let mut plan = Self::default();
        plan.push(Stage::RouteRow, ActuatorId::Hopper, motion.row_angle(row_for(tube)));
        plan.push(Stage::RouteSlice, ActuatorId::Chute, motion.slice_angle(slice_for(tube)));
        plan.push(Stage::ReleasePose, ActuatorId::Feeder, motion.feeder.release);
        plan
    }

    fn push(&mut self, stage: Stage, actuator: ActuatorId, angle: Degrees) {
        self.steps.push(MotionStep { stage, actuator, angle });
    }

    pub fn steps(&self) -> &[MotionStep] {
        &self.steps
    }
}

/// How long to hold still after commanding a move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    speed_deg_per_sec: f32,
    settle: Duration,
}

impl WaitPolicy {
    pub fn new(speed_deg_per_sec: f32, settle: Duration) -> Self {
        Self {
            speed_deg_per_sec,
            settle,
        }
    }

    pub fn wait_for(&self, degrees_moved: Degrees) -> Duration {
        let travel_ms = (degrees_moved.abs() / self.speed_deg_per_sec * 1000.0).ceil() as u64;
        Duration::from_millis(travel_ms) + self.settle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pulse_width_is_linear_in_angle() {
        let servo = ServoRange::default();
        assert_eq!(servo.pulse_width_us(0.0), 500);
        assert_eq!(servo.pulse_width_us(90.0), 1500);
        assert_eq!(servo.pulse_width_us(180.0), 2500);
        assert_eq!(servo.pulse_width_us(45.0), 1000);
    }

    #[test]
    fn out_of_range_angles_clamp() {
        let servo = ServoRange {
            min_angle: 20.0,
            max_angle: 160.0,
            min_pulse_us: 1000,
            max_pulse_us: 2000,
        };
        assert_relative_eq!(servo.clamp(-5.0), 20.0);
        assert_relative_eq!(servo.clamp(170.0), 160.0);
        assert_eq!(servo.pulse_width_us(500.0), 2000);
        assert_relative_eq!(servo.span(), 140.0);
    }

    #[test]
    fn wait_rounds_travel_up_and_adds_settle() {
        let policy = WaitPolicy::new(200.0, Duration::from_millis(50));
        assert_eq!(policy.wait_for(0.0), Duration::from_millis(50));
        assert_eq!(policy.wait_for(100.0), Duration::from_millis(550));
        assert_eq!(policy.wait_for(-100.0), Duration::from_millis(550));
        // 1 degree at 300 deg/s is 3.33 ms, rounded up to 4.
        let slow = WaitPolicy::new(300.0, Duration::ZERO);
        assert_eq!(slow.wait_for(1.0), Duration::from_millis(4));
    }

    #[test]
    fn presentation_wiggles_around_the_present_pose() {
        let motion = MotionConfig::default();
        let plan = MotionPlan::presentation(&motion);
        let stages: Vec<Stage> = plan.steps().iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            [
                Stage::SettleRelease,
                Stage::PresentLow,
                Stage::PresentHigh,
                Stage::PresentCenter,
                Stage::CapturePose
            ]
        );
        assert!(plan.steps().iter().all(|s| s.actuator == ActuatorId::Feeder));

        let angles: Vec<f32> = plan.steps().iter().map(|s| s.angle).collect();
        let f = &motion.feeder;
        assert_relative_eq!(angles[1], f.present - f.present_offset);
        assert_relative_eq!(angles[2], f.present + f.present_offset);
        assert_relative_eq!(angles[3], f.present);
    }

    #[test]
    fn routing_targets_row_then_slice_then_release() {
        let motion = MotionConfig::default();
        let plan = MotionPlan::routing(&motion, 16);
        let steps = plan.steps();

        assert_eq!(steps[0].stage, Stage::RouteRow);
        assert_eq!(steps[0].actuator, ActuatorId::Hopper);
        assert_relative_eq!(steps[0].angle, motion.row_angles[3]);

        assert_eq!(steps[1].stage, Stage::RouteSlice);
        assert_eq!(steps[1].actuator, ActuatorId::Chute);
        assert_relative_eq!(steps[1].angle, motion.slice_base + motion.slice_step);

        assert_eq!(steps[2].stage, Stage::ReleasePose);
        assert_relative_eq!(steps[2].angle, motion.feeder.release);
    }
}
