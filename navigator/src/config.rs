use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::NavError;

/// Gains of one PID controller. `None` for `ki`/`kd` disables that term.
///
/// In a config file every key is optional and falls back to the tuning of the
/// controller it belongs to; a zero gain switches a term off.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ki: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kd: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integral_limit: Option<f32>,
}

impl PidGains {
    /// Turning in place and heading correction while driving straight.
    pub fn turn() -> Self {
        Self {
            kp: 3.0,
            ki: Some(0.5),
            kd: Some(0.0),
            integral_limit: Some(100.0),
        }
    }

    /// Base speed from distance while driving straight.
    pub fn straight() -> Self {
        Self {
            kp: 2.0,
            ki: Some(0.5),
            kd: Some(0.01),
            integral_limit: Some(100.0),
        }
    }
}

/// Tolerances, limits and gains of the navigation loop.
///
/// Distances are millimetres, angles degrees, speeds wheel degrees per second.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NavConfig {
    /// Arrival tolerance.
    #[serde(default = "default_dist_eps")]
    pub dist_eps: f32,
    /// Alignment tolerance while turning in place.
    #[serde(default = "default_dir_eps")]
    pub dir_eps: f32,
    /// Proximity radius that arms the near-target watchdog.
    #[serde(default = "default_dist_close")]
    pub dist_close: f32,
    /// Seconds the robot may stay near the target without arriving.
    #[serde(default = "default_timer_near_target")]
    pub timer_near_target: f32,
    #[serde(default = "default_hist_queue_length")]
    pub hist_queue_length: usize,
    #[serde(default = "default_speed_hard_limit_abs")]
    pub speed_hard_limit_abs: f32,
    /// Cap on the common speed while driving straight, leaving room to steer.
    #[serde(default = "default_speed_base_max")]
    pub speed_base_max: f32,
    #[serde(default = "PidGains::turn", deserialize_with = "turn_gains")]
    pub turn: PidGains,
    #[serde(default = "PidGains::straight", deserialize_with = "straight_gains")]
    pub straight: PidGains,
}

/// A `[turn]` or `[straight]` table; missing keys keep the defaults.
#[derive(Deserialize)]
struct GainsTable {
    kp: Option<f32>,
    ki: Option<f32>,
    kd: Option<f32>,
    integral_limit: Option<f32>,
}

impl GainsTable {
    fn over(self, base: PidGains) -> PidGains {
        PidGains {
            kp: self.kp.unwrap_or(base.kp),
            ki: self.ki.or(base.ki),
            kd: self.kd.or(base.kd),
            integral_limit: self.integral_limit.or(base.integral_limit),
        }
    }
}

fn turn_gains<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PidGains, D::Error> {
    Ok(GainsTable::deserialize(deserializer)?.over(PidGains::turn()))
}

fn straight_gains<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PidGains, D::Error> {
    Ok(GainsTable::deserialize(deserializer)?.over(PidGains::straight()))
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            dist_eps: default_dist_eps(),
            dir_eps: default_dir_eps(),
            dist_close: default_dist_close(),
            timer_near_target: default_timer_near_target(),
            hist_queue_length: default_hist_queue_length(),
            speed_hard_limit_abs: default_speed_hard_limit_abs(),
            speed_base_max: default_speed_base_max(),
            turn: PidGains::turn(),
            straight: PidGains::straight(),
        }
    }
}

fn default_dist_eps() -> f32 {
    20.0
}

fn default_dir_eps() -> f32 {
    4.0
}

fn default_dist_close() -> f32 {
    100.0
}

fn default_timer_near_target() -> f32 {
    3.0
}

fn default_hist_queue_length() -> usize {
    3
}

fn default_speed_hard_limit_abs() -> f32 {
    900.0
}

fn default_speed_base_max() -> f32 {
    800.0
}

impl NavConfig {
    /// Load a configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self, NavError> {
        let text = std::fs::read_to_string(path).map_err(|source| NavError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| NavError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), NavError> {
        if self.hist_queue_length == 0 {
            return Err(NavError::InvalidConfig(
                "hist_queue_length must be at least 1".into(),
            ));
        }
        let positive = [
            ("dist_eps", self.dist_eps),
            ("dir_eps", self.dir_eps),
            ("dist_close", self.dist_close),
            ("timer_near_target", self.timer_near_target),
            ("speed_hard_limit_abs", self.speed_hard_limit_abs),
            ("speed_base_max", self.speed_base_max),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(NavError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.speed_base_max > self.speed_hard_limit_abs {
            return Err(NavError::InvalidConfig(format!(
                "speed_base_max ({}) exceeds speed_hard_limit_abs ({})",
                self.speed_base_max, self.speed_hard_limit_abs
            )));
        }
        Ok(())
    }
}
