//! PID feedback controller with optional integral and derivative terms.

use std::time::Instant;

use crate::config::PidGains;

/// Memory of a controller between two updates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PidMemory {
    last_error: f32,
    integral: f32,
    last_time: Instant,
}

/// Parameters to overwrite on [`Pid::reset_with`]. `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidOverrides {
    pub setpoint: Option<f32>,
    pub kp: Option<f32>,
    pub ki: Option<f32>,
    pub kd: Option<f32>,
    pub integral_limit: Option<f32>,
}

/// Implementation of the PID algorithm.
///
/// The first update after construction or [`Pid::reset`] has no time
/// reference yet, so it returns the proportional term only.
#[derive(Debug, Clone, PartialEq)]
pub struct Pid {
    setpoint: f32,
    gains: PidGains,
    memory: Option<PidMemory>,
}

impl Pid {
    pub fn new(setpoint: f32, gains: PidGains) -> Self {
        Self {
            setpoint,
            gains,
            memory: None,
        }
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    /// True until the first update after construction or reset.
    pub fn is_fresh(&self) -> bool {
        self.memory.is_none()
    }

    /// Forget the error history; the next update acts like the first one.
    pub fn reset(&mut self) {
        self.memory = None;
    }

    /// Overwrite the supplied parameters, then [`reset`](Self::reset).
    pub fn reset_with(&mut self, overrides: PidOverrides) {
        if let Some(setpoint) = overrides.setpoint {
            self.setpoint = setpoint;
        }
        if let Some(kp) = overrides.kp {
            self.gains.kp = kp;
        }
        if overrides.ki.is_some() {
            self.gains.ki = overrides.ki;
        }
        if overrides.kd.is_some() {
            self.gains.kd = overrides.kd;
        }
        if overrides.integral_limit.is_some() {
            self.gains.integral_limit = overrides.integral_limit;
        }
        self.reset();
    }

    /// Control value for `measured`, timestamped now.
    pub fn update(&mut self, measured: f32) -> f32 {
        self.update_at(measured, Instant::now())
    }

    /// Control value for `measured` sampled at `now`.
    pub fn update_at(&mut self, measured: f32, now: Instant) -> f32 {
        let error = self.setpoint - measured;
        let gains = self.gains;

        let Some(memory) = self.memory.as_mut() else {
            self.memory = Some(PidMemory {
                last_error: error,
                integral: 0.0,
                last_time: now,
            });
            return gains.kp * error;
        };

        let dt = now.saturating_duration_since(memory.last_time).as_secs_f32();
        let p = gains.kp * error;

        // Two samples at the same instant: no integral step, no derivative
        let stepped = dt > 0.0;

        let i = match gains.ki {
            Some(ki) => {
                if stepped {
                    memory.integral += error * dt;
                }
                let i = ki * memory.integral;
                match gains.integral_limit {
                    Some(limit) => i.clamp(-limit, limit),
                    None => i,
                }
            }
            None => 0.0,
        };

        let d = match gains.kd {
            Some(kd) if stepped => kd * (error - memory.last_error) / dt,
            _ => 0.0,
        };

        memory.last_error = error;
        memory.last_time = now;

        let output = p + i + d;
        if output.is_finite() { output } else { p }
    }
}
