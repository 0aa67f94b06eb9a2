// THEORY:
// The `MotionSequencer` is the top of the sorter: it drives the physical loop
// that every bead goes through.
//
//     settle at release -> present (-offset, +offset, center) -> capture pose
//       -> capture + classify + assign -> route row -> route slice -> release
//
// Key architectural principles:
// 1.  **Open loop**: No servo reports its position. After each command the
//     sequencer computes an absolute deadline from the distance travelled and
//     suspends until it. The next command is never issued earlier.
// 2.  **Strictly sequential**: One bead, one step at a time. The sequencer owns
//     the classifier and the hardware handles outright; nothing is shared.
// 3.  **Fail the cycle, not the bead**: A capture or actuator error aborts the
//     cycle and is returned to the caller. Nothing is retried.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

use crate::config::{MotionConfig, SorterConfig};
use crate::error::Result;
use crate::hardware::{ActuatorId, Actuators, Camera};
use crate::motion::{Degrees, MotionPlan, MotionStep, WaitPolicy};
use crate::pipeline::{BeadClassifier, Classification};

/// What happened to one bead.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    pub classification: Classification,
    pub row: usize,
    pub slice: usize,
    /// Wall time the whole cycle took, including every wait.
    pub elapsed: Duration,
}

pub struct MotionSequencer<C, A> {
    camera: C,
    actuators: A,
    classifier: BeadClassifier,
    motion: MotionConfig,
    waits: WaitPolicy,
    positions: [Option<Degrees>; ActuatorId::COUNT],
    cycles: u64,
}

impl<C: Camera, A: Actuators> MotionSequencer<C, A> {
    pub fn new(config: &SorterConfig, camera: C, actuators: A) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            camera,
            actuators,
            classifier: BeadClassifier::new(config)?,
            motion: config.motion.clone(),
            waits: config.motion.wait_policy(),
            positions: [None; ActuatorId::COUNT],
            cycles: 0,
        })
    }

    /// Sorts beads until a collaborator fails. Only returns with that error.
    pub async fn run_forever(&mut self) -> Result<std::convert::Infallible> {
        loop {
            self.run_cycle().await?;
        }
    }

    /// Sorts at most `limit` beads (unbounded when `None`) and returns how many
    /// were sorted. Any error aborts the run.
    pub async fn run(&mut self, limit: Option<u64>) -> Result<u64> {
        let mut sorted = 0;
        while limit.is_none_or(|n| sorted < n) {
            self.run_cycle().await?;
            sorted += 1;
        }
        Ok(sorted)
    }

    /// One full bead cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started = Instant::now();
        self.cycles += 1;

        self.execute(&MotionPlan::presentation(&self.motion)).await?;

        let buffer = self.camera.capture()?;
        let classification = self.classifier.classify(&buffer)?;
        let tube = classification.tube();

        self.execute(&MotionPlan::routing(&self.motion, tube)).await?;

        let tube_info = &self.classifier.tubes()[tube];
        let report = CycleReport {
            cycle: self.cycles,
            row: tube_info.row(),
            slice: tube_info.slice(),
            classification,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            cycle = report.cycle,
            color = %report.classification.color(),
            tube,
            row = report.row,
            slice = report.slice,
            outcome = ?report.classification.assignment.outcome,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "sorted bead"
        );
        Ok(report)
    }

    async fn execute(&mut self, plan: &MotionPlan) -> Result<()> {
        for step in plan.steps() {
            self.move_to(step).await?;
        }
        Ok(())
    }

    /// Commands one move and suspends until it must have finished.
    async fn move_to(&mut self, step: &MotionStep) -> Result<Duration> {
        let servo = self.motion.servos.get(step.actuator);
        let target = servo.clamp(step.angle);
        let travel = match self.positions[step.actuator.index()] {
            Some(current) => (target - current).abs(),
            None => servo.span(),
        };

        self.actuators.set_angle(step.actuator, target)?;
        self.positions[step.actuator.index()] = Some(target);

        let wait = self.waits.wait_for(travel);
        let deadline = Instant::now() + wait;
        tracing::debug!(
            stage = ?step.stage,
            actuator = ?step.actuator,
            target,
            travel,
            wait_ms = wait.as_millis() as u64,
            "move"
        );
        sleep_until(deadline).await;
        Ok(wait)
    }

    /// Last commanded angle of `actuator`, if it has moved yet.
    pub fn position(&self, actuator: ActuatorId) -> Option<Degrees> {
        self.positions[actuator.index()]
    }

    pub fn classifier(&self) -> &BeadClassifier {
        &self.classifier
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn actuators(&self) -> &A {
        &self.actuators
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel_buffer::PixelBuffer;
    use crate::error::{ActuatorError, CaptureError, SorterError};
    use crate::motion::Stage;
    use crate::pipeline::Color;
    use std::collections::VecDeque;

    struct ScriptedCamera {
        frames: VecDeque<PixelBuffer>,
        captured_at: Vec<Instant>,
    }

    impl ScriptedCamera {
        fn of(colors: &[Color]) -> Self {
            Self {
                frames: colors.iter().map(|c| PixelBuffer::filled(40, 30, c.to_rgb565())).collect(),
                captured_at: Vec::new(),
            }
        }
    }

    impl Camera for ScriptedCamera {
        fn capture(&mut self) -> Result<PixelBuffer> {
            self.captured_at.push(Instant::now());
            self.frames.pop_front().ok_or(CaptureError::Exhausted.into())
        }
    }

    #[derive(Default)]
    struct RecordingActuators {
        commands: Vec<(Instant, ActuatorId, Degrees)>,
        fail_on: Option<ActuatorId>,
    }

    impl Actuators for RecordingActuators {
        fn set_angle(&mut self, actuator: ActuatorId, degrees: Degrees) -> Result<()> {
            if self.fail_on == Some(actuator) {
                return Err(ActuatorError::Fault {
                    actuator,
                    reason: "stalled".to_string(),
                }
                .into());
            }
            self.commands.push((Instant::now(), actuator, degrees));
            Ok(())
        }
    }

    fn sequencer(colors: &[Color]) -> MotionSequencer<ScriptedCamera, RecordingActuators> {
        MotionSequencer::new(
            &SorterConfig::default(),
            ScriptedCamera::of(colors),
            RecordingActuators::default(),
        )
        .expect("default config")
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_issues_the_choreography_in_order() {
        let mut seq = sequencer(&[Color::new(255, 0, 0)]);
        seq.run_cycle().await.expect("cycle");

        let motion = MotionConfig::default();
        let mut expected: Vec<MotionStep> = MotionPlan::presentation(&motion).steps().to_vec();
        expected.extend_from_slice(MotionPlan::routing(&motion, 0).steps());

        let issued: Vec<(ActuatorId, Degrees)> = seq.actuators().commands.iter().map(|&(_, id, a)| (id, a)).collect();
        let planned: Vec<(ActuatorId, Degrees)> = expected.iter().map(|s| (s.actuator, s.angle)).collect();
        assert_eq!(issued, planned);
        assert_eq!(expected[4].stage, Stage::CapturePose);
    }

    #[tokio::test(start_paused = true)]
    async fn every_command_waits_for_the_previous_move() {
        let mut seq = sequencer(&[Color::new(255, 0, 0), Color::new(0, 0, 255)]);
        seq.run(Some(2)).await.expect("two cycles");

        let waits = MotionConfig::default().wait_policy();
        let servos = MotionConfig::default().servos;
        let commands = &seq.actuators().commands;
        let mut last: [Option<Degrees>; ActuatorId::COUNT] = [None; ActuatorId::COUNT];

        for pair in commands.windows(2) {
            let (issued, id, angle) = pair[0];
            let travel = match last[id.index()] {
                Some(prev) => (angle - prev).abs(),
                None => servos.get(id).span(),
            };
            last[id.index()] = Some(angle);
            assert!(
                pair[1].0 - issued >= waits.wait_for(travel),
                "{id:?} -> {angle} was followed too early"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn capture_happens_after_capture_pose_settles() {
        let mut seq = sequencer(&[Color::new(0, 255, 0)]);
        seq.run_cycle().await.expect("cycle");

        let motion = MotionConfig::default();
        let (pose_issued, id, angle) = seq.actuators().commands[4];
        assert_eq!((id, angle), (ActuatorId::Feeder, motion.feeder.capture));

        let travel = (motion.feeder.capture - motion.feeder.present).abs();
        let captured = seq.camera().captured_at[0];
        assert!(captured - pose_issued >= motion.wait_policy().wait_for(travel));
    }

    #[tokio::test(start_paused = true)]
    async fn first_move_assumes_full_travel() {
        let mut seq = sequencer(&[Color::new(0, 255, 0)]);
        let first = MotionPlan::presentation(&MotionConfig::default()).steps()[0];
        let wait = seq.move_to(&first).await.expect("move");

        let motion = MotionConfig::default();
        assert_eq!(wait, motion.wait_policy().wait_for(motion.servos.feeder.span()));
        assert_eq!(seq.position(ActuatorId::Feeder), Some(motion.feeder.release));
        assert_eq!(seq.position(ActuatorId::Hopper), None);
    }

    #[tokio::test(start_paused = true)]
    async fn routes_to_the_assigned_tube() {
        let mut seq = sequencer(&[Color::new(255, 0, 0), Color::new(0, 0, 255), Color::new(255, 0, 0)]);
        let reports = [
            seq.run_cycle().await.expect("cycle 1"),
            seq.run_cycle().await.expect("cycle 2"),
            seq.run_cycle().await.expect("cycle 3"),
        ];

        let tubes: Vec<usize> = reports.iter().map(|r| r.classification.tube()).collect();
        assert_eq!(tubes, [0, 1, 0]);
        assert_eq!((reports[1].row, reports[1].slice), (1, 1));

        let motion = MotionConfig::default();
        assert_eq!(seq.position(ActuatorId::Hopper), Some(motion.row_angle(0)));
        assert_eq!(seq.position(ActuatorId::Chute), Some(motion.slice_angle(0)));
        assert_eq!(seq.cycles(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_aborts_before_routing() {
        let mut seq = sequencer(&[]);
        let err = seq.run_forever().await.unwrap_err();
        assert!(err.is_capture_exhausted());

        // Presentation ran, routing never did.
        assert_eq!(seq.actuators().commands.len(), 5);
        assert_eq!(seq.position(ActuatorId::Hopper), None);
        assert!(seq.classifier().tubes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_fault_is_not_retried() {
        let mut seq = sequencer(&[Color::new(255, 0, 0), Color::new(255, 0, 0)]);
        seq.actuators.fail_on = Some(ActuatorId::Hopper);

        let err = seq.run(None).await.unwrap_err();
        assert!(matches!(err, SorterError::Actuator(ActuatorError::Fault { .. })));
        assert_eq!(seq.camera().captured_at.len(), 1);
        // The bead was classified before the routing fault.
        assert_eq!(seq.classifier().tubes().len(), 1);
    }

    #[test]
    fn non_finite_servo_range_is_rejected_before_any_move() {
        let mut config = SorterConfig::default();
        config.motion.servos.feeder.min_angle = f32::NAN;
        let result = MotionSequencer::new(
            &config,
            ScriptedCamera::of(&[Color::new(1, 2, 3)]),
            RecordingActuators::default(),
        );
        assert!(matches!(result, Err(SorterError::Config(_))));
    }

    #[test]
    fn non_finite_feeder_pose_is_rejected() {
        let mut config = SorterConfig::default();
        config.motion.feeder.capture = f32::NAN;
        let result = MotionSequencer::new(&config, ScriptedCamera::of(&[]), RecordingActuators::default());
        assert!(matches!(result, Err(SorterError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn clamps_targets_to_the_servo_range() {
        let mut config = SorterConfig::default();
        config.motion.feeder.present = 2.0;
        let mut seq = MotionSequencer::new(
            &config,
            ScriptedCamera::of(&[Color::new(1, 2, 3)]),
            RecordingActuators::default(),
        )
        .expect("config");
        seq.run_cycle().await.expect("cycle");

        // present - offset = -6, clamped to the feeder's 0 degree stop.
        assert_eq!(seq.actuators().commands[1].2, 0.0);
    }
}
