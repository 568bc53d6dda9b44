//! Periodic enforcement scheduler.
//!
//! A single worker thread owns the device gateway and runs one
//! enforcement pass per tick, so passes can never overlap. The UI thread
//! talks to it over a channel.

use crate::audio::{AudioError, DeviceGateway};
use crate::config::SharedConfig;
use crate::engine;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Scheduler error types.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Failed to spawn scheduler thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Device gateway initialization failed: {0}")]
    GatewayInit(#[source] AudioError),

    #[error("Scheduler thread exited during startup")]
    StartupAborted,
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

enum Command {
    SetInterval(Duration),
    Shutdown,
}

struct Worker {
    commands: Sender<Command>,
    handle: JoinHandle<()>,
}

/// Drives [`engine::enforce`] on a fixed, reconfigurable period.
pub struct Scheduler {
    config: SharedConfig,
    interval: Duration,
    worker: Option<Worker>,
}

impl Scheduler {
    /// Create a stopped scheduler reading from `config`.
    pub fn new(config: SharedConfig, interval: Duration) -> Self {
        Self {
            config,
            interval,
            worker: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.worker.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking.
    ///
    /// `make_gateway` runs on the worker thread, since OS audio objects are
    /// bound to the thread that created them. Its failure is returned here
    /// and leaves the scheduler stopped.
    pub fn start<G, F>(&mut self, make_gateway: F) -> Result<(), SchedulerError>
    where
        G: DeviceGateway + 'static,
        F: FnOnce() -> Result<G, AudioError> + Send + 'static,
    {
        if self.worker.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (commands, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let config = self.config.clone();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("enforcer".to_string())
            .spawn(move || {
                let gateway = match make_gateway() {
                    Ok(gateway) => {
                        let _ = ready_tx.send(Ok(()));
                        gateway
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run_loop(&gateway, &config, interval, &receiver);
            })
            .map_err(SchedulerError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(SchedulerError::GatewayInit(e));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(SchedulerError::StartupAborted);
            }
        }

        info!(interval_secs = interval.as_secs_f64(), "Scheduler started");
        self.worker = Some(Worker { commands, handle });
        Ok(())
    }

    /// Change the period. A running scheduler restarts its timer from now.
    pub fn set_interval(&mut self, interval: Duration) {
        if interval == self.interval {
            return;
        }
        self.interval = interval;

        if let Some(worker) = &self.worker {
            if worker.commands.send(Command::SetInterval(interval)).is_err() {
                warn!("Scheduler thread is gone, interval change dropped");
            }
        }
        info!(interval_secs = interval.as_secs_f64(), "Scheduler interval changed");
    }

    /// Stop ticking. Waits for an in-flight pass to finish.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = worker.commands.send(Command::Shutdown);
        if worker.handle.join().is_err() {
            error!("Scheduler thread panicked");
        }
        info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop<G: DeviceGateway>(
    gateway: &G,
    config: &SharedConfig,
    mut interval: Duration,
    commands: &Receiver<Command>,
) {
    let mut next_tick = Instant::now() + interval;

    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match commands.recv_timeout(wait) {
            Ok(Command::SetInterval(new_interval)) => {
                interval = new_interval;
                next_tick = Instant::now() + interval;
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                run_pass(gateway, config);
                next_tick = Instant::now() + interval;
            }
        }
    }

    debug!("Scheduler loop exited");
}

fn run_pass<G: DeviceGateway>(gateway: &G, config: &SharedConfig) {
    let snapshot = config.snapshot();
    let result = panic::catch_unwind(AssertUnwindSafe(|| engine::enforce(&snapshot, gateway)));
    if result.is_err() {
        error!("Enforcement pass panicked; will retry next tick");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CaptureDevice, DeviceId, DeviceReading, MemoryGateway, SimulatedDevice};
    use crate::config::{Configuration, Target};
    use std::sync::Arc;

    const MIC_X: &str = "8c9d1f0e-2b3a-4c5d-9e8f-0a1b2c3d4e5f";

    fn id() -> DeviceId {
        MIC_X.parse().unwrap()
    }

    /// Gateway wrapper that reports each write on a channel.
    struct Notifying {
        inner: Arc<MemoryGateway>,
        writes: Sender<u8>,
    }

    impl DeviceGateway for Notifying {
        fn list_active_capture_devices(&self) -> Result<Vec<CaptureDevice>, AudioError> {
            self.inner.list_active_capture_devices()
        }

        fn get_active_device(&self, id: &DeviceId) -> Result<Option<DeviceReading>, AudioError> {
            self.inner.get_active_device(id)
        }

        fn set_device_volume(&self, id: &DeviceId, percent: u8) -> Result<(), AudioError> {
            self.inner.set_device_volume(id, percent)?;
            let _ = self.writes.send(percent);
            Ok(())
        }
    }

    fn shared_with_target(volume: i32) -> SharedConfig {
        SharedConfig::new(Configuration {
            targets: vec![Target::new(MIC_X, "X", volume)],
            ..Configuration::default()
        })
    }

    #[test]
    fn test_start_and_shutdown_transitions() {
        let mut scheduler = Scheduler::new(SharedConfig::default(), Duration::from_secs(60));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        scheduler.start(|| Ok(MemoryGateway::default())).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(matches!(
            scheduler.start(|| Ok(MemoryGateway::default())),
            Err(SchedulerError::AlreadyRunning)
        ));

        scheduler.shutdown();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_gateway_init_failure_leaves_scheduler_stopped() {
        let mut scheduler = Scheduler::new(SharedConfig::default(), Duration::from_secs(60));
        let result = scheduler.start(|| -> Result<MemoryGateway, AudioError> {
            Err(AudioError::Gateway("no audio service".to_string()))
        });

        assert!(matches!(result, Err(SchedulerError::GatewayInit(_))));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_ticks_enforce_latest_snapshot() {
        let gateway = Arc::new(MemoryGateway::new(vec![SimulatedDevice::microphone(
            id(),
            "X",
            20.0,
        )]));
        let (tx, rx) = mpsc::channel();
        let shared = shared_with_target(55);

        let mut scheduler = Scheduler::new(shared.clone(), Duration::from_millis(20));
        let inner = gateway.clone();
        scheduler
            .start(move || Ok(Notifying { inner, writes: tx }))
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 55);

        shared.replace(Configuration {
            targets: vec![Target::new(MIC_X, "X", 90)],
            ..Configuration::default()
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 90);

        scheduler.shutdown();
        assert_eq!(gateway.volume_of(&id()), Some(90.0));
    }

    #[test]
    fn test_interval_change_keeps_running() {
        let gateway = Arc::new(MemoryGateway::new(vec![SimulatedDevice::microphone(
            id(),
            "X",
            20.0,
        )]));
        let (tx, rx) = mpsc::channel();

        let mut scheduler = Scheduler::new(shared_with_target(70), Duration::from_secs(3600));
        let inner = gateway.clone();
        scheduler
            .start(move || Ok(Notifying { inner, writes: tx }))
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        scheduler.set_interval(Duration::from_millis(20));
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 70);
    }

    #[test]
    fn test_no_further_writes_once_converged() {
        let gateway = Arc::new(MemoryGateway::new(vec![SimulatedDevice::microphone(
            id(),
            "X",
            20.0,
        )]));
        let (tx, rx) = mpsc::channel();

        let mut scheduler = Scheduler::new(shared_with_target(40), Duration::from_millis(10));
        let inner = gateway.clone();
        scheduler
            .start(move || Ok(Notifying { inner, writes: tx }))
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 40);
        thread::sleep(Duration::from_millis(100));
        scheduler.shutdown();

        assert_eq!(gateway.writes().len(), 1);
    }
}
