use std::time::{Duration, Instant};

use field_protocol::GameSnapshot;
use tracing::debug;

use crate::error::FetchError;
use crate::geometry::{Point, Pose};

/// Source of game-state snapshots, polled once per tick.
#[allow(async_fn_in_trait)]
pub trait TelemetrySource {
    async fn fetch(&mut self) -> Result<GameSnapshot, FetchError>;
}

/// Why a decoded snapshot cannot drive the robot this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// The match is not running.
    GameOff,
    /// Our marker is not in the snapshot or has no pose.
    NotObserved,
}

/// Pose of `robot_id`, provided the match is on and the marker is visible.
pub fn locate(snapshot: &GameSnapshot, robot_id: u32) -> Result<Pose, Unavailable> {
    if !snapshot.game_on {
        return Err(Unavailable::GameOff);
    }
    let record = snapshot.robot(robot_id).ok_or(Unavailable::NotObserved)?;
    match (record.xy(), record.direction) {
        (Some(xy), Some(heading)) => Ok(Pose {
            position: Point::from(xy),
            heading,
        }),
        _ => Err(Unavailable::NotObserved),
    }
}

/// Mean round-trip time of `iters` consecutive fetches. The first failure aborts.
pub async fn probe_latency<T: TelemetrySource>(
    source: &mut T,
    iters: u32,
) -> Result<Duration, FetchError> {
    let iters = iters.max(1);
    let mut total = Duration::ZERO;
    for k in 0..iters {
        let started = Instant::now();
        source.fetch().await?;
        let took = started.elapsed();
        debug!(iteration = k, took_ms = took.as_secs_f64() * 1000.0, "probe");
        total += took;
    }
    Ok(total / iters)
}


#[cfg(test)]
mod tests {
    use field_protocol::RobotRecord;

    use super::testing::{ScriptedSource, snapshot_with};
    use super::*;

    #[test]
    fn locates_visible_robot() {
        let snapshot = snapshot_with(10, Pose::new(100.0, 250.0, -30.0), true);
        assert_eq!(locate(&snapshot, 10), Ok(Pose::new(100.0, 250.0, -30.0)));
    }

    #[test]
    fn game_off_wins_over_visibility() {
        let snapshot = snapshot_with(10, Pose::new(0.0, 0.0, 0.0), false);
        assert_eq!(locate(&snapshot, 10), Err(Unavailable::GameOff));
    }

    #[test]
    fn missing_or_hidden_marker_is_not_observed() {
        let snapshot = snapshot_with(10, Pose::new(0.0, 0.0, 0.0), true);
        assert_eq!(locate(&snapshot, 11), Err(Unavailable::NotObserved));

        let mut snapshot = snapshot;
        snapshot.robots.push(RobotRecord {
            id: 11,
            position: Some(vec![5.0, 5.0]),
            direction: None,
        });
        assert_eq!(locate(&snapshot, 11), Err(Unavailable::NotObserved));
    }

    #[tokio::test]
    async fn probe_averages_successful_fetches() {
        let mut source = ScriptedSource::default();
        for _ in 0..4 {
            source.push(Ok(GameSnapshot::default()));
        }
        let mean = probe_latency(&mut source, 4).await.unwrap();
        assert!(mean < Duration::from_secs(1));
        assert!(source.replies.is_empty());
    }

    #[tokio::test]
    async fn probe_stops_at_first_failure() {
        let mut source = ScriptedSource::default();
        source
            .push(Ok(GameSnapshot::default()))
            .push(Err(FetchError::Status(503)))
            .push(Ok(GameSnapshot::default()));
        let err = probe_latency(&mut source, 3).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));
        assert_eq!(source.replies.len(), 1);
    }
}
