//! Paced, cancellable frequency sweeps.
//!
//! Each viewer session owns one `SweepController`, which runs at most one
//! sweep at a time as a spawned task. The task publishes one command per
//! scheduled frequency and then waits; the wait races a cancellation
//! token, so an abort takes effect immediately rather than after the
//! interval elapses. An in-flight publish is never interrupted.
//!
//! Progress is reported on an unbounded event channel so the sweep task
//! never blocks on its owning session.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::bus::BusError;
use crate::domain::foundation::{DeviceId, SweepId};
use crate::domain::sweep::{
    sweep_command, SweepError, SweepPlan, SweepRequest, SweepState, SweepStatus,
};
use crate::ports::DeviceBus;

/// Progress reported by a sweep task.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepEvent {
    /// A command was published (or the publish failed; the sweep goes on).
    CommandSent {
        sweep_id: SweepId,
        device: DeviceId,
        frequency: f64,
        command: String,
        result: Result<(), BusError>,
    },
    /// The sweep stopped. `status` is `Completed` or `Aborted`.
    Finished {
        sweep_id: SweepId,
        device: DeviceId,
        status: SweepStatus,
    },
}

struct ActiveSweep {
    id: SweepId,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SweepState>>,
    handle: JoinHandle<()>,
}

impl ActiveSweep {
    fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    fn request_abort(&self) {
        self.state.send_modify(|s| s.abort_requested = true);
        self.cancel.cancel();
    }
}

/// Runs the sweeps of one viewer session.
pub struct SweepController {
    bus: Arc<dyn DeviceBus>,
    events: mpsc::UnboundedSender<SweepEvent>,
    active: Option<ActiveSweep>,
}

impl SweepController {
    pub fn new(bus: Arc<dyn DeviceBus>, events: mpsc::UnboundedSender<SweepEvent>) -> Self {
        Self {
            bus,
            events,
            active: None,
        }
    }

    /// Validate and start a sweep.
    ///
    /// # Errors
    ///
    /// - `InvalidParameters` if the request fails validation
    /// - `AlreadyRunning` if this controller's previous sweep is still running
    pub fn start(&mut self, request: SweepRequest) -> Result<SweepId, SweepError> {
        let plan = SweepPlan::new(request)?;
        if self.is_running() {
            return Err(SweepError::AlreadyRunning);
        }

        let id = SweepId::new();
        let (state, _) = watch::channel(SweepState::started(id, &plan));
        let state = Arc::new(state);
        let cancel = CancellationToken::new();

        tracing::info!(
            sweep_id = %id,
            device_id = %plan.device(),
            start = plan.start(),
            end = plan.end(),
            step = plan.step(),
            wait_seconds = plan.wait_seconds(),
            "Sweep started"
        );

        let handle = tokio::spawn(run_sweep(
            id,
            plan,
            Arc::clone(&self.bus),
            self.events.clone(),
            Arc::clone(&state),
            cancel.clone(),
        ));

        self.active = Some(ActiveSweep {
            id,
            cancel,
            state,
            handle,
        });
        Ok(id)
    }

    /// Request abort of a specific sweep.
    pub fn abort(&self, id: &SweepId) -> Result<(), SweepError> {
        match &self.active {
            Some(active) if active.id == *id && active.is_running() => {
                active.request_abort();
                Ok(())
            }
            _ => Err(SweepError::NotRunning),
        }
    }

    /// Request abort of whichever sweep is running.
    pub fn abort_active(&self) -> Result<SweepId, SweepError> {
        match &self.active {
            Some(active) if active.is_running() => {
                active.request_abort();
                Ok(active.id)
            }
            _ => Err(SweepError::NotRunning),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(ActiveSweep::is_running)
    }

    /// Snapshot of the current or most recent sweep.
    pub fn state(&self) -> Option<SweepState> {
        self.active.as_ref().map(|active| active.state.borrow().clone())
    }

    /// Abort any running sweep and wait for its task to finish.
    ///
    /// A sweep cut short here still reports `Aborted` on the event channel.
    pub async fn shutdown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if active.is_running() {
            active.request_abort();
        }
        if let Err(e) = active.handle.await {
            tracing::error!(sweep_id = %active.id, error = %e, "Sweep task failed");
        }
    }
}

async fn run_sweep(
    id: SweepId,
    plan: SweepPlan,
    bus: Arc<dyn DeviceBus>,
    events: mpsc::UnboundedSender<SweepEvent>,
    state: Arc<watch::Sender<SweepState>>,
    cancel: CancellationToken,
) {
    let device = plan.device().clone();
    let mut status = SweepStatus::Completed;

    for frequency in plan.frequencies() {
        if cancel.is_cancelled() {
            status = SweepStatus::Aborted;
            break;
        }

        let command = sweep_command(frequency);
        state.send_modify(|s| s.current_frequency = Some(frequency));

        let result = bus.publish_command(&device, &command).await;
        if let Err(e) = &result {
            tracing::warn!(sweep_id = %id, device_id = %device, command = %command, error = %e, "Sweep command failed");
        }
        let _ = events.send(SweepEvent::CommandSent {
            sweep_id: id,
            device: device.clone(),
            frequency,
            command,
            result,
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                status = SweepStatus::Aborted;
                break;
            }
            _ = tokio::time::sleep(plan.wait()) => {}
        }
    }

    state.send_modify(|s| s.running = false);
    tracing::info!(sweep_id = %id, device_id = %device, status = %status, "Sweep finished");
    let _ = events.send(SweepEvent::Finished {
        sweep_id: id,
        device,
        status,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::rooms::tests::RecordingBus;
    use std::time::Duration;
    use tokio::time::timeout;

    fn request(start: f64, end: f64, step: f64, wait: f64) -> SweepRequest {
        SweepRequest {
            device_id: "D1".to_string(),
            start,
            end,
            step,
            wait_seconds: wait,
        }
    }

    fn controller() -> (
        SweepController,
        Arc<RecordingBus>,
        mpsc::UnboundedReceiver<SweepEvent>,
    ) {
        let bus = RecordingBus::new();
        let (tx, rx) = mpsc::unbounded_channel();
        (SweepController::new(bus.clone(), tx), bus, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<SweepEvent>) -> SweepEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("sweep event timed out")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn publishes_each_step_then_completes() {
        let (mut sweeps, bus, mut rx) = controller();
        let id = sweeps.start(request(100.0, 103.0, 1.0, 0.0)).unwrap();

        let mut commands = Vec::new();
        loop {
            match next(&mut rx).await {
                SweepEvent::CommandSent { command, result, .. } => {
                    assert!(result.is_ok());
                    commands.push(command);
                }
                SweepEvent::Finished { sweep_id, status, .. } => {
                    assert_eq!(sweep_id, id);
                    assert_eq!(status, SweepStatus::Completed);
                    break;
                }
            }
        }

        assert_eq!(commands, vec!["S100", "S101", "S102", "S103"]);
        assert_eq!(
            bus.calls(),
            vec![
                "publish D1 S100",
                "publish D1 S101",
                "publish D1 S102",
                "publish D1 S103"
            ]
        );
        let state = sweeps.state().unwrap();
        assert!(!state.running);
        assert_eq!(state.current_frequency, Some(103.0));
    }

    #[tokio::test]
    async fn abort_during_wait_stops_immediately() {
        let (mut sweeps, bus, mut rx) = controller();
        let id = sweeps.start(request(100.0, 103.0, 1.0, 30.0)).unwrap();

        assert!(matches!(next(&mut rx).await, SweepEvent::CommandSent { .. }));
        sweeps.abort(&id).unwrap();

        match next(&mut rx).await {
            SweepEvent::Finished { status, .. } => assert_eq!(status, SweepStatus::Aborted),
            other => panic!("expected Finished, got {other:?}"),
        }
        assert_eq!(bus.calls(), vec!["publish D1 S100"]);
        assert!(sweeps.state().unwrap().abort_requested);
    }

    #[tokio::test]
    async fn invalid_parameters_publish_nothing() {
        let (mut sweeps, bus, _rx) = controller();

        for bad in [
            request(100.0, 100.0, 1.0, 0.0),
            request(100.0, 90.0, 1.0, 0.0),
            request(100.0, 110.0, 0.0, 0.0),
            request(100.0, 110.0, -1.0, 0.0),
        ] {
            assert!(matches!(
                sweeps.start(bad),
                Err(SweepError::InvalidParameters(_))
            ));
        }

        assert!(sweeps.state().is_none());
        assert!(bus.calls().is_empty());
    }

    #[tokio::test]
    async fn second_start_while_running_is_rejected() {
        let (mut sweeps, _bus, _rx) = controller();
        sweeps.start(request(1.0, 5.0, 1.0, 30.0)).unwrap();

        assert_eq!(
            sweeps.start(request(1.0, 5.0, 1.0, 0.0)),
            Err(SweepError::AlreadyRunning)
        );
        sweeps.shutdown().await;
    }

    #[tokio::test]
    async fn restart_allowed_after_completion() {
        let (mut sweeps, _bus, mut rx) = controller();
        sweeps.start(request(1.0, 2.0, 1.0, 0.0)).unwrap();
        while !matches!(next(&mut rx).await, SweepEvent::Finished { .. }) {}

        assert!(sweeps.start(request(1.0, 2.0, 1.0, 0.0)).is_ok());
    }

    #[tokio::test]
    async fn abort_without_sweep_is_not_running() {
        let (sweeps, _bus, _rx) = controller();
        assert_eq!(sweeps.abort_active(), Err(SweepError::NotRunning));
        assert_eq!(sweeps.abort(&SweepId::new()), Err(SweepError::NotRunning));
    }

    #[tokio::test]
    async fn abort_with_stale_id_is_rejected() {
        let (mut sweeps, _bus, _rx) = controller();
        sweeps.start(request(1.0, 5.0, 1.0, 30.0)).unwrap();

        assert_eq!(sweeps.abort(&SweepId::new()), Err(SweepError::NotRunning));
        assert!(sweeps.is_running());
        sweeps.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_reports_aborted() {
        let (mut sweeps, _bus, mut rx) = controller();
        sweeps.start(request(1.0, 5.0, 1.0, 30.0)).unwrap();
        assert!(matches!(next(&mut rx).await, SweepEvent::CommandSent { .. }));

        sweeps.shutdown().await;

        match next(&mut rx).await {
            SweepEvent::Finished { status, .. } => assert_eq!(status, SweepStatus::Aborted),
            other => panic!("expected Finished, got {other:?}"),
        }
        assert!(!sweeps.is_running());
    }
}
