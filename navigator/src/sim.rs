//! Software-in-the-loop stand-in for the field server and the robot.
//!
//! [`SimRobot`] integrates differential-drive kinematics from the last wheel
//! command. [`SimTelemetry`] and [`SimMotors`] share one robot and plug into
//! the [`TickDriver`](crate::TickDriver) in place of the HTTP source and the
//! brick's motors.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use field_protocol::{GameSnapshot, RobotRecord};
use rand::Rng;
use tracing::trace;

use crate::actuation::{ActuationSink, WheelSpeeds};
use crate::error::FetchError;
use crate::geometry::{Point, Pose, wrap_degrees};
use crate::telemetry::TelemetrySource;

/// Wheel geometry of the simulated robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveModel {
    pub wheel_radius_mm: f32,
    pub axle_track_mm: f32,
}

impl Default for DriveModel {
    /// EV3 large motors with the 56 mm wheels.
    fn default() -> Self {
        Self {
            wheel_radius_mm: 28.0,
            axle_track_mm: 120.0,
        }
    }
}

/// Telemetry noise, uniformly distributed in `±position_mm` and `±heading_deg`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Jitter {
    pub position_mm: f32,
    pub heading_deg: f32,
}

#[derive(Debug, Clone)]
pub struct SimRobot {
    pub robot_id: u32,
    pub pose: Pose,
    pub model: DriveModel,
    pub jitter: Jitter,
    pub game_on: bool,
    pub visible: bool,
    speeds: WheelSpeeds,
    brakes: u32,
}

impl SimRobot {
    pub fn new(robot_id: u32, pose: Pose) -> Self {
        Self {
            robot_id,
            pose,
            model: DriveModel::default(),
            jitter: Jitter::default(),
            game_on: true,
            visible: true,
            speeds: WheelSpeeds::STOP,
            brakes: 0,
        }
    }

    pub fn speeds(&self) -> WheelSpeeds {
        self.speeds
    }

    /// How many brake commands the robot has received.
    pub fn brakes(&self) -> u32 {
        self.brakes
    }

    pub fn command(&mut self, speeds: WheelSpeeds) {
        self.speeds = speeds;
    }

    pub fn brake(&mut self) {
        self.speeds = WheelSpeeds::STOP;
        self.brakes += 1;
    }

    /// Integrate the current wheel speeds over `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        let radius = self.model.wheel_radius_mm;
        let to_mm = |deg_per_s: i32| (deg_per_s as f32).to_radians() * radius;
        let v_left = to_mm(self.speeds.left);
        let v_right = to_mm(self.speeds.right);

        let v = (v_left + v_right) / 2.0;
        let omega = (v_right - v_left) / self.model.axle_track_mm;

        // Integrate along the midpoint heading
        let mid = self.pose.heading.to_radians() + omega * dt / 2.0;
        self.pose.position.x += v * mid.cos() * dt;
        self.pose.position.y += v * mid.sin() * dt;
        self.pose.heading = wrap_degrees(self.pose.heading + (omega * dt).to_degrees());
    }

    /// What the field camera would report right now.
    pub fn snapshot(&self) -> GameSnapshot {
        let mut rng = rand::rng();
        let mut noise = |amplitude: f32| {
            if amplitude > 0.0 {
                rng.random_range(-amplitude..=amplitude)
            } else {
                0.0
            }
        };

        let Point { x, y } = self.pose.position;
        let record = if self.visible {
            RobotRecord {
                id: self.robot_id,
                position: Some(vec![
                    x + noise(self.jitter.position_mm),
                    y + noise(self.jitter.position_mm),
                ]),
                direction: Some(wrap_degrees(
                    self.pose.heading + noise(self.jitter.heading_deg),
                )),
            }
        } else {
            RobotRecord {
                id: self.robot_id,
                position: None,
                direction: None,
            }
        };

        GameSnapshot {
            game_on: self.game_on,
            time_left: 0.0,
            robots: vec![record],
            ..Default::default()
        }
    }
}

/// Telemetry side of a shared [`SimRobot`].
///
/// Each fetch waits `latency`, then advances the robot by the real time
/// elapsed since the previous fetch.
pub struct SimTelemetry {
    robot: Rc<RefCell<SimRobot>>,
    latency: Duration,
    last: Option<Instant>,
}

impl SimTelemetry {
    pub fn new(robot: Rc<RefCell<SimRobot>>, latency: Duration) -> Self {
        Self {
            robot,
            latency,
            last: None,
        }
    }
}

impl TelemetrySource for SimTelemetry {
    async fn fetch(&mut self) -> Result<GameSnapshot, FetchError> {
        tokio::time::sleep(self.latency).await;

        let now = Instant::now();
        let dt = self
            .last
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last = Some(now);

        let mut robot = self.robot.borrow_mut();
        robot.advance(dt);
        trace!(
            x = robot.pose.position.x,
            y = robot.pose.position.y,
            heading = robot.pose.heading,
            "sim"
        );
        Ok(robot.snapshot())
    }
}

/// Actuation side of a shared [`SimRobot`].
pub struct SimMotors {
    robot: Rc<RefCell<SimRobot>>,
}

impl SimMotors {
    pub fn new(robot: Rc<RefCell<SimRobot>>) -> Self {
        Self { robot }
    }
}

impl ActuationSink for SimMotors {
    fn drive(&mut self, speeds: WheelSpeeds) {
        self.robot.borrow_mut().command(speeds);
    }

    fn brake(&mut self) {
        self.robot.borrow_mut().brake();
    }
}
