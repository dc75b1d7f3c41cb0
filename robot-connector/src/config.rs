use std::path::{Path, PathBuf};
use std::time::Duration;

use navigator::{NavConfig, Point};
use serde::{Deserialize, Serialize};

use crate::ev3::Retry;

/// Everything the connector needs to know about the brick and the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Base URL of the field server.
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_robot_id")]
    pub robot_id: u32,
    #[serde(default = "default_left_port")]
    pub left_port: String,
    #[serde(default = "default_right_port")]
    pub right_port: String,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Pause after a failed fetch.
    #[serde(default = "default_fetch_retry_ms")]
    pub fetch_retry_ms: u64,
    /// Delay between attempts to find a missing motor or sensor.
    #[serde(default = "default_device_retry_ms")]
    pub device_retry_ms: u64,
    /// Give up after this many attempts. Absent waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_attempts: Option<u32>,
    /// Root of the ev3dev device classes.
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    /// Stop the loop when the touch sensor is pressed.
    #[serde(default)]
    pub use_touch_stop: bool,
    /// Explicit targets. When absent they are derived from the baskets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoints: Option<Vec<Point>>,
    #[serde(default)]
    pub nav: NavConfig,
}

fn default_server() -> String {
    "http://193.2.72.100".to_string()
}

fn default_robot_id() -> u32 {
    10
}

fn default_left_port() -> String {
    "outA".to_string()
}

fn default_right_port() -> String {
    "outD".to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_fetch_retry_ms() -> u64 {
    100
}

fn default_device_retry_ms() -> u64 {
    1000
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class")
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            robot_id: default_robot_id(),
            left_port: default_left_port(),
            right_port: default_right_port(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            fetch_retry_ms: default_fetch_retry_ms(),
            device_retry_ms: default_device_retry_ms(),
            device_attempts: None,
            sysfs_root: default_sysfs_root(),
            use_touch_stop: false,
            waypoints: None,
            nav: NavConfig::default(),
        }
    }
}

impl ConnectorConfig {
    /// Apply `NAVIGATOR_*` overrides looked up through `var`.
    pub fn apply_env(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(server) = var("NAVIGATOR_SERVER") {
            self.server = server;
        }
        if let Some(robot_id) = var("NAVIGATOR_ROBOT_ID") {
            self.robot_id = robot_id
                .trim()
                .parse()
                .map_err(|e| format!("NAVIGATOR_ROBOT_ID={robot_id:?}: {e}"))?;
        }
        if let Some(touch) = var("NAVIGATOR_TOUCH_STOP") {
            self.use_touch_stop = matches!(touch.as_str(), "1" | "true" | "TRUE" | "True");
        }
        Ok(())
    }

    pub fn device_retry(&self) -> Retry {
        Retry {
            interval: Duration::from_millis(self.device_retry_ms),
            attempts: self.device_attempts,
        }
    }

    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.server.trim().is_empty() {
            return Err("server must not be empty".into());
        }
        if self.fetch_timeout_ms == 0 {
            return Err("fetch_timeout_ms must be positive".into());
        }
        if self.device_attempts == Some(0) {
            return Err("device_attempts must be at least 1".into());
        }
        if matches!(&self.waypoints, Some(points) if points.is_empty()) {
            return Err("waypoints must not be an empty list".into());
        }
        self.nav.validate()?;
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base = dirs::config_dir().ok_or("failed to locate config dir")?;
    Ok(base.join("robot-navigator").join("connector.toml"))
}

pub fn load_config(path: &Path) -> Result<ConnectorConfig, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let config: ConnectorConfig = toml::from_str(&text)?;
    Ok(config)
}

/// The file at `path` if it exists, otherwise the defaults.
pub fn load_or_default(path: &Path) -> Result<ConnectorConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(ConnectorConfig::default())
    }
}

pub fn save_config(path: &Path, config: &ConnectorConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text)?;
    Ok(())
}
