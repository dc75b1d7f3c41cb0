//! The navigation state machine.
//!
//! One call to [`Navigator::step`] per valid telemetry sample. The machine
//! cycles `Idle -> Turn -> DriveStraight -> LoadNextTarget -> Idle` and never
//! terminates on its own. Entry actions (controller resets, window re-seeding,
//! arming the watchdog) run inside [`Navigator::enter`], so a state's memory is
//! always fresh on the first tick spent in it.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::actuation::WheelSpeeds;
use crate::config::NavConfig;
use crate::error::NavError;
use crate::geometry::{Point, Pose, bearing, distance};
use crate::pid::Pid;
use crate::window::SettleWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavState {
    #[default]
    Idle,
    Turn,
    DriveStraight,
    LoadNextTarget,
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Turn => "TURN",
            Self::DriveStraight => "DRIVE_STRAIGHT",
            Self::LoadNextTarget => "LOAD_NEXT_TARGET",
        })
    }
}

/// Non-empty, cyclic list of targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoints {
    points: Vec<Point>,
}

impl Waypoints {
    pub fn new(points: Vec<Point>) -> Result<Self, NavError> {
        if points.is_empty() {
            return Err(NavError::NoWaypoints);
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Never true, construction rejects empty lists.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Point {
        self.points[index % self.points.len()]
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.points.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.iter().copied()
    }
}

/// Drives the robot from waypoint to waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigator {
    config: NavConfig,
    waypoints: Waypoints,
    target_idx: usize,
    state: NavState,
    // Turning in place
    turn_pid: Pid,
    // Heading correction while driving straight
    heading_pid: Pid,
    // Common wheel speed from distance while driving straight
    distance_pid: Pid,
    heading_window: SettleWindow,
    distance_window: SettleWindow,
    near_target: bool,
    watchdog: f32,
}

impl Navigator {
    pub fn new(config: NavConfig, waypoints: Waypoints) -> Self {
        let len = config.hist_queue_length;
        Self {
            turn_pid: Pid::new(0.0, config.turn),
            heading_pid: Pid::new(0.0, config.turn),
            distance_pid: Pid::new(0.0, config.straight),
            heading_window: SettleWindow::new(len, SettleWindow::HEADING_SENTINEL),
            distance_window: SettleWindow::new(len, SettleWindow::DISTANCE_SENTINEL),
            near_target: false,
            watchdog: config.timer_near_target,
            target_idx: 0,
            state: NavState::Idle,
            waypoints,
            config,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn target_index(&self) -> usize {
        self.target_idx
    }

    pub fn target(&self) -> Point {
        self.waypoints.get(self.target_idx)
    }

    pub fn waypoints(&self) -> &Waypoints {
        &self.waypoints
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Seconds left on the near-target watchdog, while it is counting.
    pub fn watchdog(&self) -> Option<f32> {
        (self.state == NavState::DriveStraight && self.near_target).then_some(self.watchdog)
    }

    /// Advance the machine by one telemetry sample.
    ///
    /// `now` timestamps the sample for the controllers, `loop_time` is the
    /// measured period of the outer loop and only feeds the watchdog.
    pub fn step(&mut self, pose: Pose, now: Instant, loop_time: Duration) -> WheelSpeeds {
        let target = self.target();
        let target_dist = distance(pose.position, target);
        let target_angle = bearing(&pose, target);
        trace!(
            state = %self.state,
            dist = target_dist,
            angle = target_angle,
            "tick"
        );

        let (left, right) = match self.state {
            NavState::Idle => {
                if target_dist > self.config.dist_eps {
                    self.enter(NavState::Turn);
                } else {
                    self.enter(NavState::LoadNextTarget);
                }
                (0.0, 0.0)
            }
            NavState::LoadNextTarget => {
                self.target_idx = self.waypoints.next_index(self.target_idx);
                info!(index = self.target_idx, target = %self.target(), "next target");
                self.enter(NavState::Idle);
                (0.0, 0.0)
            }
            NavState::Turn => self.turn(target_angle, now),
            NavState::DriveStraight => {
                self.drive_straight(target_angle, target_dist, now, loop_time)
            }
        };

        WheelSpeeds::clamped(left, right, self.config.speed_hard_limit_abs)
    }

    fn turn(&mut self, target_angle: f32, now: Instant) -> (f32, f32) {
        self.heading_window.push(target_angle);

        if self.heading_window.is_within(self.config.dir_eps) {
            self.enter(NavState::DriveStraight);
            return (0.0, 0.0);
        }

        // Positive bearing gives a negative u: right wheel forward, left back
        let u = self.turn_pid.update_at(target_angle, now);
        (u, -u)
    }

    fn drive_straight(
        &mut self,
        target_angle: f32,
        target_dist: f32,
        now: Instant,
        loop_time: Duration,
    ) -> (f32, f32) {
        self.distance_window.push(target_dist);

        let near = target_dist < self.config.dist_close;
        if near && !self.near_target {
            debug!(dist = target_dist, "near target, arming watchdog");
            self.watchdog = self.config.timer_near_target;
        }
        if near {
            self.watchdog -= loop_time.as_secs_f32();
        }
        self.near_target = near;

        if self.distance_window.is_within(self.config.dist_eps) {
            self.enter(NavState::LoadNextTarget);
            return (0.0, 0.0);
        }
        if self.watchdog < 0.0 {
            warn!(
                dist = target_dist,
                "stuck near target for {}s, turning again", self.config.timer_near_target
            );
            self.enter(NavState::Turn);
            return (0.0, 0.0);
        }

        let u_turn = self.heading_pid.update_at(target_angle, now);
        // Distance error is negative while the target is ahead
        let u_base = self
            .distance_pid
            .update_at(target_dist, now)
            .clamp(-self.config.speed_base_max, self.config.speed_base_max);
        (-u_base + u_turn, -u_base - u_turn)
    }

    fn enter(&mut self, next: NavState) {
        info!(from = %self.state, to = %next, target = %self.target(), "state change");
        match next {
            NavState::Turn => {
                self.turn_pid.reset();
                self.heading_window.fill(SettleWindow::HEADING_SENTINEL);
                self.near_target = false;
            }
            NavState::DriveStraight => {
                self.heading_pid.reset();
                self.distance_pid.reset();
                self.distance_window.fill(SettleWindow::DISTANCE_SENTINEL);
                self.watchdog = self.config.timer_near_target;
            }
            NavState::Idle | NavState::LoadNextTarget => {}
        }
        self.state = next;
    }
}
