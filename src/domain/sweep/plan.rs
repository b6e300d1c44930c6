//! Validated sweep parameters and the frequency schedule they describe.

use std::time::Duration;

use crate::domain::foundation::DeviceId;

use super::errors::SweepError;

/// Marker prefixed to every frequency-set command.
pub const SWEEP_COMMAND_MARKER: char = 'S';

/// Raw sweep parameters as entered by an operator.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub device_id: String,
    pub start: f64,
    pub end: f64,
    pub step: f64,
    pub wait_seconds: f64,
}

/// A sweep that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    device: DeviceId,
    start: f64,
    end: f64,
    step: f64,
    wait_seconds: f64,
    wait: Duration,
}

impl SweepPlan {
    /// Validates a request: device id non-empty, every number finite,
    /// `end > start`, `step > 0`, `wait_seconds >= 0`.
    pub fn new(request: SweepRequest) -> Result<Self, SweepError> {
        let device = request.device_id.trim();
        if device.is_empty() {
            return Err(SweepError::invalid("device id is empty"));
        }
        let device = DeviceId::new(device).map_err(|e| SweepError::invalid(e.to_string()))?;

        let SweepRequest {
            start,
            end,
            step,
            wait_seconds,
            ..
        } = request;

        for (name, value) in [
            ("start", start),
            ("end", end),
            ("step", step),
            ("waitSeconds", wait_seconds),
        ] {
            if !value.is_finite() {
                return Err(SweepError::invalid(format!("{name} must be a finite number")));
            }
        }
        if end <= start {
            return Err(SweepError::invalid("end must be greater than start"));
        }
        if step <= 0.0 {
            return Err(SweepError::invalid("step must be greater than zero"));
        }
        if start + step == start {
            return Err(SweepError::invalid("step is too small to advance from start"));
        }
        if wait_seconds < 0.0 {
            return Err(SweepError::invalid("waitSeconds must not be negative"));
        }
        let wait = Duration::try_from_secs_f64(wait_seconds)
            .map_err(|_| SweepError::invalid("waitSeconds is out of range"))?;

        Ok(Self {
            device,
            start,
            end,
            step,
            wait_seconds,
            wait,
        })
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn wait_seconds(&self) -> f64 {
        self.wait_seconds
    }

    /// Pause after each published command.
    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Frequencies `start + i*step` for `i = 0, 1, ...` while `<= end`.
    pub fn frequencies(&self) -> impl Iterator<Item = f64> + '_ {
        (0u64..)
            .map(move |i| self.start + i as f64 * self.step)
            .take_while(move |f| *f <= self.end)
    }
}

/// Formats the frequency-set command: marker plus frequency rounded half-up.
pub fn sweep_command(frequency: f64) -> String {
    format!("{}{}", SWEEP_COMMAND_MARKER, (frequency + 0.5).floor() as i64)
}
