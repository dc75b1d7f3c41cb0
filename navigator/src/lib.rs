//! Waypoint navigation for a two-wheeled differential robot.
//!
//! The robot is steered from externally supplied pose telemetry: it turns in
//! place to face the current waypoint, drives towards it while correcting its
//! heading, waits for the distance to settle and then moves on to the next
//! waypoint, cycling through the list forever.

pub mod actuation;
pub mod config;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod navigation;
pub mod pid;
pub mod sim;
pub mod telemetry;
pub mod window;

pub use actuation::{ActuationSink, WheelSpeeds};
pub use config::{NavConfig, PidGains};
pub use driver::{
    BrakeReason, DEFAULT_RETRY_PAUSE, Either, RunStats, StopSignal, TickDriver, TickOutcome,
};
pub use error::{FetchError, NavError};
pub use geometry::{Point, Pose};
pub use navigation::{NavState, Navigator, Waypoints};
pub use telemetry::{TelemetrySource, probe_latency};
