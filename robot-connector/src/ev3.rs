//! Motors and touch sensor of an EV3 brick running ev3dev, driven through
//! the sysfs device classes.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use navigator::{ActuationSink, StopSignal, WheelSpeeds};
use tracing::{debug, warn};

const TACHO_MOTOR_CLASS: &str = "tacho-motor";
const LEGO_SENSOR_CLASS: &str = "lego-sensor";
const TOUCH_DRIVER: &str = "lego-ev3-touch";

fn read_attr(dir: &Path, attr: &str) -> io::Result<String> {
    Ok(std::fs::read_to_string(dir.join(attr))?.trim().to_string())
}

fn write_attr(dir: &Path, attr: &str, value: &str) -> io::Result<()> {
    std::fs::write(dir.join(attr), value)
}

/// Device directories of `class` under `root`, sorted by name.
fn devices(root: &Path, class: &str) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let class_dir = root.join(class);
    let entries = std::fs::read_dir(&class_dir)
        .map_err(|e| format!("failed to list {}: {e}", class_dir.display()))?;
    let mut dirs = Vec::new();
    for entry in entries {
        dirs.push(entry?.path());
    }
    dirs.sort();
    Ok(dirs)
}

/// How to wait for a device that is not connected yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    pub interval: Duration,
    /// `None` keeps trying until the device shows up.
    pub attempts: Option<u32>,
}

/// Call `find` until it succeeds, prompting the operator between attempts.
pub async fn wait_for<T>(
    retry: Retry,
    prompt: &str,
    mut find: impl FnMut() -> Result<T, Box<dyn std::error::Error>>,
) -> Result<T, Box<dyn std::error::Error>> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match find() {
            Ok(device) => return Ok(device),
            Err(err) if retry.attempts.is_none_or(|max| attempt < max) => {
                warn!(%err, attempt, "{prompt}");
                tokio::time::sleep(retry.interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// One tacho motor, addressed by its output port.
#[derive(Debug)]
pub struct TachoMotor {
    dir: PathBuf,
    port: String,
}

impl TachoMotor {
    /// The motor whose address ends in `port`, e.g. `outA`.
    pub fn find(root: &Path, port: &str) -> Result<Self, Box<dyn std::error::Error>> {
        for dir in devices(root, TACHO_MOTOR_CLASS)? {
            let Ok(address) = read_attr(&dir, "address") else {
                continue;
            };
            if address.ends_with(port) {
                debug!(port, dir = %dir.display(), "found motor");
                return Ok(Self {
                    dir,
                    port: port.to_string(),
                });
            }
        }
        Err(format!("no motor connected to {port}").into())
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn run_forever(&self, speed: i32) -> io::Result<()> {
        write_attr(&self.dir, "speed_sp", &speed.to_string())?;
        write_attr(&self.dir, "command", "run-forever")
    }

    pub fn stop(&self, stop_action: &str) -> io::Result<()> {
        write_attr(&self.dir, "stop_action", stop_action)?;
        write_attr(&self.dir, "command", "stop")
    }
}

/// Left and right drive motors.
#[derive(Debug)]
pub struct Ev3Drive {
    left: TachoMotor,
    right: TachoMotor,
}

impl Ev3Drive {
    /// Locate both motors, waiting for each until it is plugged in.
    pub async fn connect(
        root: &Path,
        left_port: &str,
        right_port: &str,
        retry: Retry,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let left = Self::motor(root, left_port, retry).await?;
        let right = Self::motor(root, right_port, retry).await?;
        Ok(Self { left, right })
    }

    async fn motor(
        root: &Path,
        port: &str,
        retry: Retry,
    ) -> Result<TachoMotor, Box<dyn std::error::Error>> {
        let prompt = format!("connect a motor to {port}");
        wait_for(retry, &prompt, || TachoMotor::find(root, port)).await
    }
}

impl ActuationSink for Ev3Drive {
    fn drive(&mut self, speeds: WheelSpeeds) {
        for (motor, speed) in [(&self.left, speeds.left), (&self.right, speeds.right)] {
            if let Err(err) = motor.run_forever(speed) {
                warn!(port = motor.port(), %err, "failed to command motor");
            }
        }
    }

    fn brake(&mut self) {
        for motor in [&self.left, &self.right] {
            if let Err(err) = motor.stop("brake") {
                warn!(port = motor.port(), %err, "failed to brake motor");
            }
        }
    }
}

/// The EV3 touch sensor, used as the operator's stop button.
#[derive(Debug)]
pub struct TouchSensor {
    dir: PathBuf,
}

impl TouchSensor {
    pub fn find(root: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        for dir in devices(root, LEGO_SENSOR_CLASS)? {
            if read_attr(&dir, "driver_name").is_ok_and(|name| name == TOUCH_DRIVER) {
                debug!(dir = %dir.display(), "found touch sensor");
                return Ok(Self { dir });
            }
        }
        Err("no touch sensor connected".into())
    }

    pub async fn connect(root: &Path, retry: Retry) -> Result<Self, Box<dyn std::error::Error>> {
        wait_for(retry, "connect the touch sensor", || Self::find(root)).await
    }

    pub fn is_pressed(&self) -> io::Result<bool> {
        Ok(read_attr(&self.dir, "value0")? == "1")
    }
}

impl StopSignal for TouchSensor {
    /// A sensor that cannot be read counts as pressed.
    fn should_stop(&mut self) -> bool {
        match self.is_pressed() {
            Ok(pressed) => pressed,
            Err(err) => {
                warn!(%err, "touch sensor unreadable, stopping");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(root: &Path, class: &str, name: &str, attrs: &[(&str, &str)]) -> PathBuf {
        let dir = root.join(class).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for (attr, value) in attrs {
            std::fs::write(dir.join(attr), format!("{value}\n")).unwrap();
        }
        dir
    }

    fn brick() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let left = device(
            root.path(),
            TACHO_MOTOR_CLASS,
            "motor0",
            &[("address", "ev3-ports:outA")],
        );
        let right = device(
            root.path(),
            TACHO_MOTOR_CLASS,
            "motor1",
            &[("address", "ev3-ports:outD")],
        );
        (root, left, right)
    }

    fn attr(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }

    const ONCE: Retry = Retry {
        interval: Duration::from_millis(1),
        attempts: Some(1),
    };

    #[tokio::test]
    async fn finds_motors_by_port() {
        let (root, left, right) = brick();
        let drive = Ev3Drive::connect(root.path(), "outA", "outD", ONCE)
            .await
            .unwrap();
        assert_eq!(drive.left.dir, left);
        assert_eq!(drive.right.dir, right);

        let err = TachoMotor::find(root.path(), "outB").unwrap_err();
        assert!(err.to_string().contains("outB"));
    }

    #[tokio::test]
    async fn missing_class_directory_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let connected = Ev3Drive::connect(root.path(), "outA", "outD", ONCE).await;
        assert!(connected.is_err());
    }

    #[tokio::test]
    async fn waits_for_a_motor_plugged_in_late() {
        let root = tempfile::tempdir().unwrap();
        let mut calls = 0;
        let retry = Retry {
            interval: Duration::from_millis(1),
            attempts: None,
        };

        let motor = wait_for(retry, "connect a motor to outA", || {
            calls += 1;
            if calls == 2 {
                device(
                    root.path(),
                    TACHO_MOTOR_CLASS,
                    "motor0",
                    &[("address", "ev3-ports:outA")],
                );
            }
            TachoMotor::find(root.path(), "outA")
        })
        .await
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(motor.port(), "outA");
    }

    #[tokio::test]
    async fn gives_up_after_the_configured_attempts() {
        let (root, _, _) = brick();
        let mut calls = 0;
        let retry = Retry {
            interval: Duration::from_millis(1),
            attempts: Some(3),
        };

        let err = wait_for(retry, "connect a motor to outB", || {
            calls += 1;
            TachoMotor::find(root.path(), "outB")
        })
        .await
        .unwrap_err();

        assert_eq!(calls, 3);
        assert!(err.to_string().contains("outB"));
    }

    #[tokio::test]
    async fn touch_sensor_connects_once_plugged_in() {
        let root = tempfile::tempdir().unwrap();
        let retry = Retry {
            interval: Duration::from_millis(1),
            attempts: Some(2),
        };
        assert!(TouchSensor::connect(root.path(), retry).await.is_err());

        device(
            root.path(),
            LEGO_SENSOR_CLASS,
            "sensor0",
            &[("driver_name", TOUCH_DRIVER), ("value0", "0")],
        );
        let mut sensor = TouchSensor::connect(root.path(), retry).await.unwrap();
        assert!(!sensor.should_stop());
    }

    #[tokio::test]
    async fn drive_and_brake_write_sysfs_attributes() {
        let (root, left, right) = brick();
        let mut drive = Ev3Drive::connect(root.path(), "outA", "outD", ONCE)
            .await
            .unwrap();

        drive.drive(WheelSpeeds { left: 420, right: -35 });
        assert_eq!(attr(&left, "speed_sp"), "420");
        assert_eq!(attr(&right, "speed_sp"), "-35");
        assert_eq!(attr(&left, "command"), "run-forever");

        drive.brake();
        assert_eq!(attr(&left, "stop_action"), "brake");
        assert_eq!(attr(&right, "command"), "stop");
    }

    #[test]
    fn touch_sensor_is_the_stop_button() {
        let root = tempfile::tempdir().unwrap();
        device(
            root.path(),
            LEGO_SENSOR_CLASS,
            "sensor0",
            &[("driver_name", "lego-ev3-color"), ("value0", "1")],
        );
        let touch = device(
            root.path(),
            LEGO_SENSOR_CLASS,
            "sensor1",
            &[("driver_name", TOUCH_DRIVER), ("value0", "0")],
        );

        let mut sensor = TouchSensor::find(root.path()).unwrap();
        assert!(!sensor.should_stop());
        std::fs::write(touch.join("value0"), "1\n").unwrap();
        assert!(sensor.should_stop());

        std::fs::remove_file(touch.join("value0")).unwrap();
        assert!(sensor.should_stop());
    }
}
