//! Observable state of a running or finished sweep.

use serde::Serialize;
use std::fmt;

use crate::domain::foundation::{DeviceId, SweepId};

use super::plan::SweepPlan;

/// Lifecycle status of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    Running,
    /// Every scheduled command was issued.
    Completed,
    /// Stopped early by an abort request or shutdown.
    Aborted,
}

impl SweepStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SweepStatus::Running)
    }
}

impl fmt::Display for SweepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SweepStatus::Running => "running",
            SweepStatus::Completed => "completed",
            SweepStatus::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of one sweep session.
///
/// `current_frequency` is the last frequency a command was issued for; it
/// only ever increases and stays within `[start, end]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepState {
    pub sweep_id: SweepId,
    pub device_id: DeviceId,
    pub start: f64,
    pub end: f64,
    pub step: f64,
    pub wait_seconds: f64,
    pub running: bool,
    pub abort_requested: bool,
    pub current_frequency: Option<f64>,
}

impl SweepState {
    pub fn started(sweep_id: SweepId, plan: &SweepPlan) -> Self {
        Self {
            sweep_id,
            device_id: plan.device().clone(),
            start: plan.start(),
            end: plan.end(),
            step: plan.step(),
            wait_seconds: plan.wait_seconds(),
            running: true,
            abort_requested: false,
            current_frequency: None,
        }
    }
}
