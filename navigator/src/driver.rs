//! The outer control loop: fetch, step, actuate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::actuation::{ActuationSink, BrakeGuard, WheelSpeeds};
use crate::error::FetchError;
use crate::navigation::Navigator;
use crate::telemetry::{self, TelemetrySource, Unavailable};

/// Operator request to end the loop, polled once per tick.
pub trait StopSignal {
    fn should_stop(&mut self) -> bool;
}

impl StopSignal for Arc<AtomicBool> {
    fn should_stop(&mut self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<S: StopSignal + ?Sized> StopSignal for &mut S {
    fn should_stop(&mut self) -> bool {
        (**self).should_stop()
    }
}

/// An absent signal never stops.
impl<S: StopSignal> StopSignal for Option<S> {
    fn should_stop(&mut self) -> bool {
        self.as_mut().is_some_and(|s| s.should_stop())
    }
}

/// Stops once either signal asks for it.
pub struct Either<A, B>(pub A, pub B);

impl<A: StopSignal, B: StopSignal> StopSignal for Either<A, B> {
    fn should_stop(&mut self) -> bool {
        self.0.should_stop() || self.1.should_stop()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrakeReason {
    /// The match is not running.
    GameOff,
    /// The field camera does not see our marker.
    NotObserved,
}

impl From<Unavailable> for BrakeReason {
    fn from(value: Unavailable) -> Self {
        match value {
            Unavailable::GameOff => Self::GameOff,
            Unavailable::NotObserved => Self::NotObserved,
        }
    }
}

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Drove(WheelSpeeds),
    Braked(BrakeReason),
    /// The fetch failed; the robot was braked and the navigator left alone.
    Skipped(FetchError),
}

/// Tick counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub driven: u64,
    pub braked: u64,
    pub skipped: u64,
}

/// Pause after a failed fetch before the next tick may run.
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Owns the navigator and its collaborators and runs the loop.
///
/// The sink is braked when the driver is dropped, so every exit path leaves
/// the robot stopped.
pub struct TickDriver<T: TelemetrySource, A: ActuationSink> {
    source: T,
    sink: BrakeGuard<A>,
    navigator: Navigator,
    robot_id: u32,
    last_tick: Option<Instant>,
    retry_pause: Duration,
}

impl<T: TelemetrySource, A: ActuationSink> TickDriver<T, A> {
    pub fn new(source: T, sink: A, navigator: Navigator, robot_id: u32) -> Self {
        Self {
            source,
            sink: BrakeGuard::new(sink),
            navigator,
            robot_id,
            last_tick: None,
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }

    /// How long a tick whose fetch failed waits before returning.
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    /// Run one iteration of the loop.
    pub async fn tick(&mut self) -> TickOutcome {
        let started = Instant::now();
        let loop_time = self
            .last_tick
            .map_or(Duration::ZERO, |last| started.saturating_duration_since(last));
        self.last_tick = Some(started);

        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%err, "game state unavailable, retrying");
                self.sink.brake();
                tokio::time::sleep(self.retry_pause).await;
                return TickOutcome::Skipped(err);
            }
        };

        match telemetry::locate(&snapshot, self.robot_id) {
            Ok(pose) => {
                let speeds = self.navigator.step(pose, Instant::now(), loop_time);
                debug!(
                    state = %self.navigator.state(),
                    %speeds,
                    loop_ms = loop_time.as_millis() as u64,
                    time_left = snapshot.time_left,
                    "drive"
                );
                self.sink.drive(speeds);
                TickOutcome::Drove(speeds)
            }
            Err(why) => {
                let reason = BrakeReason::from(why);
                debug!(?reason, "braking");
                self.sink.brake();
                TickOutcome::Braked(reason)
            }
        }
    }

    /// Tick until `stop` asks to end, then brake.
    pub async fn run<S: StopSignal>(&mut self, mut stop: S) -> RunStats {
        info!(
            robot_id = self.robot_id,
            waypoints = self.navigator.waypoints().len(),
            "control loop started"
        );

        let mut stats = RunStats::default();
        while !stop.should_stop() {
            stats.ticks += 1;
            match self.tick().await {
                TickOutcome::Drove(_) => stats.driven += 1,
                TickOutcome::Braked(_) => stats.braked += 1,
                TickOutcome::Skipped(_) => stats.skipped += 1,
            }
        }

        self.sink.brake();
        info!(?stats, "control loop stopped");
        stats
    }
}
