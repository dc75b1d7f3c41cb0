mod config;
mod ev3;
mod http;
mod targets;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use navigator::sim::{Jitter, SimMotors, SimRobot, SimTelemetry};
use navigator::{
    Either, Navigator, Point, Pose, StopSignal, TelemetrySource, TickDriver, Waypoints,
    probe_latency,
};
use tracing::info;

use crate::config::ConnectorConfig;
use crate::ev3::{Ev3Drive, TouchSensor};
use crate::http::HttpTelemetry;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Configuration file, defaults to the user's config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    server: Option<String>,

    #[arg(long)]
    robot_id: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Drive the waypoints on the brick until stopped.
    Run,
    /// Measure the mean game-state fetch time.
    Probe {
        #[arg(long, default_value_t = 10)]
        iters: u32,
    },
    /// Print the waypoints the robot would drive.
    Targets,
    /// Drive a simulated robot instead of the brick.
    Simulate {
        #[arg(long = "waypoint", value_parser = parse_point)]
        waypoints: Vec<Point>,
        #[arg(long, default_value_t = 2000)]
        ticks: u64,
        /// Starting pose as `x,y,heading`.
        #[arg(long, value_parser = parse_pose, default_value = "0,0,0")]
        start: Pose,
        #[arg(long, default_value_t = 20)]
        latency_ms: u64,
        /// Uniform position noise in mm; heading noise is a tenth of it in degrees.
        #[arg(long, default_value_t = 0.0)]
        jitter_mm: f32,
    },
    /// Write the default configuration file.
    InitConfig {
        #[arg(long)]
        force: bool,
    },
}

/// Stops the simulation after a fixed number of ticks.
struct TickBudget(u64);

impl StopSignal for TickBudget {
    fn should_stop(&mut self) -> bool {
        if self.0 == 0 {
            return true;
        }
        self.0 -= 1;
        false
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "robot_connector=info,navigator=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };

    match cli.command {
        Commands::InitConfig { force } => {
            if path.exists() && !force {
                return Err(format!("{} exists, pass --force to overwrite", path.display()).into());
            }
            config::save_config(&path, &ConnectorConfig::default())?;
            println!("Wrote {}", path.display());
        }
        Commands::Run => {
            let config = settings(&path, cli.server, cli.robot_id)?;
            run(&config).await?;
        }
        Commands::Probe { iters } => {
            let config = settings(&path, cli.server, cli.robot_id)?;
            let mut telemetry = HttpTelemetry::new(&config)?;
            let mean = probe_latency(&mut telemetry, iters).await?;
            println!("{:.4} s", mean.as_secs_f64());
        }
        Commands::Targets => {
            let config = settings(&path, cli.server, cli.robot_id)?;
            let mut telemetry = HttpTelemetry::new(&config)?;
            let snapshot = telemetry.fetch().await?;
            let waypoints =
                targets::resolve(config.waypoints.as_deref(), &snapshot, config.robot_id)?;
            for (k, point) in waypoints.iter().enumerate() {
                println!("{k}\t{point}");
            }
        }
        Commands::Simulate {
            waypoints,
            ticks,
            start,
            latency_ms,
            jitter_mm,
        } => {
            let config = settings(&path, cli.server, cli.robot_id)?;
            let points = if waypoints.is_empty() {
                config
                    .waypoints
                    .clone()
                    .ok_or("simulation needs --waypoint or configured waypoints")?
            } else {
                waypoints
            };
            simulate(&config, points, start, ticks, latency_ms, jitter_mm).await?;
        }
    }

    Ok(())
}

/// Config file, then environment, then command line.
fn settings(
    path: &Path,
    server: Option<String>,
    robot_id: Option<u32>,
) -> Result<ConnectorConfig, Box<dyn std::error::Error>> {
    let mut config = config::load_or_default(path)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(server) = server {
        config.server = server;
    }
    if let Some(robot_id) = robot_id {
        config.robot_id = robot_id;
    }
    config.validate()?;
    Ok(config)
}

async fn run(config: &ConnectorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let stop = stop_flag()?;
    let retry = config.device_retry();
    let touch = if config.use_touch_stop {
        Some(TouchSensor::connect(&config.sysfs_root, retry).await?)
    } else {
        None
    };
    let motors =
        Ev3Drive::connect(&config.sysfs_root, &config.left_port, &config.right_port, retry)
            .await?;

    let mut telemetry = HttpTelemetry::new(config)?;
    info!(url = telemetry.url(), "connecting to field server");
    let mean = probe_latency(&mut telemetry, 10).await?;
    info!(latency_ms = mean.as_secs_f64() * 1000.0, "field server latency");

    let snapshot = telemetry.fetch().await?;
    let waypoints = targets::resolve(config.waypoints.as_deref(), &snapshot, config.robot_id)?;
    if let Some(team) = snapshot.team_of(config.robot_id) {
        info!(team = team.as_str(), "robot is playing");
    }
    for (k, point) in waypoints.iter().enumerate() {
        info!(index = k, %point, "target");
    }

    let navigator = Navigator::new(config.nav.clone(), waypoints);
    let mut driver = TickDriver::new(telemetry, motors, navigator, config.robot_id)
        .with_retry_pause(Duration::from_millis(config.fetch_retry_ms));
    driver.run(Either(stop, touch)).await;
    Ok(())
}

async fn simulate(
    config: &ConnectorConfig,
    points: Vec<Point>,
    start: Pose,
    ticks: u64,
    latency_ms: u64,
    jitter_mm: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut robot = SimRobot::new(config.robot_id, start);
    robot.jitter = Jitter {
        position_mm: jitter_mm,
        heading_deg: jitter_mm / 10.0,
    };
    let robot = Rc::new(RefCell::new(robot));

    let telemetry = SimTelemetry::new(robot.clone(), Duration::from_millis(latency_ms));
    let motors = SimMotors::new(robot.clone());
    let navigator = Navigator::new(config.nav.clone(), Waypoints::new(points)?);

    let mut driver = TickDriver::new(telemetry, motors, navigator, config.robot_id);
    let stats = driver.run(Either(stop_flag()?, TickBudget(ticks))).await;

    let pose = robot.borrow().pose;
    println!(
        "{} ticks, state {}, target {} {}, pose {} heading {:.1}",
        stats.ticks,
        driver.navigator().state(),
        driver.navigator().target_index(),
        driver.navigator().target(),
        pose.position,
        pose.heading
    );
    Ok(())
}

/// Flag raised by ctrl-c, and on unix also by SIGTERM or SIGHUP.
fn stop_flag() -> Result<Arc<AtomicBool>, Box<dyn std::error::Error>> {
    let flag = Arc::new(AtomicBool::new(false));
    tokio::spawn(raise_when(flag.clone(), "ctrl-c", async {
        tokio::signal::ctrl_c().await.is_ok()
    }));

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        for (name, kind) in [
            ("terminate", SignalKind::terminate()),
            ("hangup", SignalKind::hangup()),
        ] {
            let mut stream = signal(kind)?;
            tokio::spawn(raise_when(flag.clone(), name, async move {
                stream.recv().await.is_some()
            }));
        }
    }

    Ok(flag)
}

async fn raise_when(
    flag: Arc<AtomicBool>,
    name: &'static str,
    received: impl Future<Output = bool>,
) {
    if received.await {
        info!(signal = name, "stop requested");
        flag.store(true, Ordering::Relaxed);
    }
}

fn parse_point(text: &str) -> Result<Point, String> {
    match parse_floats(text)?.as_slice() {
        &[x, y] => Ok(Point::new(x, y)),
        _ => Err(format!("expected X,Y, got {text:?}")),
    }
}

fn parse_pose(text: &str) -> Result<Pose, String> {
    match parse_floats(text)?.as_slice() {
        &[x, y, heading] => Ok(Pose::new(x, y, heading)),
        _ => Err(format!("expected X,Y,HEADING, got {text:?}")),
    }
}

fn parse_floats(text: &str) -> Result<Vec<f32>, String> {
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| format!("{part:?}: {e}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points_and_poses() {
        assert_eq!(parse_point("1000, -250.5"), Ok(Point::new(1000.0, -250.5)));
        assert!(parse_point("1,2,3").is_err());
        assert!(parse_point("a,b").is_err());
        assert_eq!(parse_pose("0,0,90"), Ok(Pose::new(0.0, 0.0, 90.0)));
    }

    #[test]
    fn simulate_arguments() {
        let cli = Cli::try_parse_from([
            "robot-connector",
            "--robot-id",
            "4",
            "simulate",
            "--waypoint",
            "1000,0",
            "--waypoint",
            "1000,1000",
            "--ticks",
            "50",
        ])
        .unwrap();
        assert_eq!(cli.robot_id, Some(4));
        match cli.command {
            Commands::Simulate {
                waypoints, ticks, start, ..
            } => {
                assert_eq!(waypoints, vec![Point::new(1000.0, 0.0), Point::new(1000.0, 1000.0)]);
                assert_eq!(ticks, 50);
                assert_eq!(start, Pose::new(0.0, 0.0, 0.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminate_raises_stop_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        raise_when(flag.clone(), "terminate", async { true }).await;
        assert!(flag.clone().should_stop());
    }

    #[tokio::test]
    async fn closed_signal_stream_leaves_flag_down() {
        let flag = Arc::new(AtomicBool::new(false));
        raise_when(flag.clone(), "hangup", async { false }).await;
        assert!(!flag.clone().should_stop());
    }

    #[tokio::test]
    async fn stop_flag_starts_down() {
        let mut flag = stop_flag().unwrap();
        assert!(!flag.should_stop());
    }

    #[test]
    fn tick_budget_counts_down() {
        let mut budget = TickBudget(2);
        assert!(!budget.should_stop());
        assert!(!budget.should_stop());
        assert!(budget.should_stop());
    }
}
