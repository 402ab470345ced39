//! Inactivity watchdog.
//!
//! A dead-man's switch: the serve loop checks in after every answered
//! query. If no check-in arrives within `timeout`, the network stack is
//! presumed dead and the device is rebooted.
//!
//! ```text
//! serve loop ──check_in()──► last check-in ◄──every period── timer task
//!                                                  │ elapsed > timeout
//!                                                  ▼
//!                                          RebootActuator::reboot()
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error};

use crate::reboot::RebootActuator;

/// Default time without a check-in before rebooting (one hour).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default interval between expiry checks.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);

/// Watchdog configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Seconds without a check-in before the device is rebooted.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Milliseconds between expiry checks.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_period_ms() -> u64 {
    DEFAULT_PERIOD.as_millis() as u64
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            period_ms: default_period_ms(),
        }
    }
}

impl WatchdogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Check-in side of the watchdog. Cheap to clone and share.
#[derive(Debug, Clone)]
pub struct WatchdogHandle {
    last_check_in: Arc<Mutex<Instant>>,
}

impl WatchdogHandle {
    fn new() -> Self {
        Self {
            last_check_in: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// A handle with no timer behind it; check-ins are recorded but never
    /// acted on.
    pub fn detached() -> Self {
        Self::new()
    }

    /// Report liveness, resetting the elapsed time to zero.
    pub fn check_in(&self) {
        let mut last = self.lock();
        debug!(
            "Checking in with watchdog. Elapsed watchdog time: {:?}",
            last.elapsed()
        );
        *last = Instant::now();
    }

    /// Time since the last check-in.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Instant> {
        self.last_check_in
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Running watchdog. The timer stops when this is dropped.
pub struct Watchdog {
    handle: WatchdogHandle,
    task: JoinHandle<()>,
}

impl Watchdog {
    /// Start the timer. Must be called inside a tokio runtime.
    pub fn start(config: &WatchdogConfig, actuator: Arc<dyn RebootActuator>) -> Self {
        let handle = WatchdogHandle::new();
        let task = tokio::spawn(run_timer(
            handle.clone(),
            config.timeout(),
            config.period(),
            actuator,
        ));
        Self { handle, task }
    }

    /// Handle for the code that checks in.
    pub fn handle(&self) -> WatchdogHandle {
        self.handle.clone()
    }

    pub fn check_in(&self) {
        self.handle.check_in();
    }

    pub fn elapsed(&self) -> Duration {
        self.handle.elapsed()
    }

    /// Whether the timer is still firing.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Wait for the timer to stop, which happens only after expiry.
    pub async fn join(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_timer(
    handle: WatchdogHandle,
    timeout: Duration,
    period: Duration,
    actuator: Arc<dyn RebootActuator>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let elapsed = handle.elapsed();

        if elapsed > timeout {
            error!(
                "Watchdog expired after {:?} (limit {:?}); rebooting",
                elapsed, timeout
            );
            // Rebooting blocks until the process dies.
            let _ = tokio::task::spawn_blocking(move || actuator.reboot()).await;
            return;
        }

        debug!(
            "Watchdog check. Elapsed: {:?}, expires after {:?}",
            elapsed, timeout
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingReboot {
        calls: AtomicUsize,
    }

    impl RebootActuator for CountingReboot {
        fn reboot(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config(timeout_secs: u64) -> WatchdogConfig {
        WatchdogConfig {
            timeout_secs,
            period_ms: 1000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_in_resets_elapsed() {
        let actuator = Arc::new(CountingReboot::default());
        let watchdog = Watchdog::start(&config(10), actuator.clone());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(watchdog.elapsed() >= Duration::from_secs(5));

        watchdog.check_in();
        assert!(watchdog.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_reboots_exactly_once() {
        let actuator = Arc::new(CountingReboot::default());
        let watchdog = Watchdog::start(&config(10), actuator.clone());

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(actuator.calls.load(Ordering::SeqCst), 0);
        assert!(watchdog.is_running());

        tokio::time::sleep(Duration::from_secs(3)).await;
        watchdog.join().await;
        assert_eq!(actuator.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(actuator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_ins_keep_device_alive() {
        let actuator = Arc::new(CountingReboot::default());
        let watchdog = Watchdog::start(&config(10), actuator.clone());
        let handle = watchdog.handle();

        for _ in 0..5 {
            tokio::time::sleep(Duration::from_secs(8)).await;
            handle.check_in();
        }
        assert_eq!(actuator.calls.load(Ordering::SeqCst), 0);
        assert!(watchdog.is_running());

        tokio::time::sleep(Duration::from_secs(12)).await;
        watchdog.join().await;
        assert_eq!(actuator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timer() {
        let actuator = Arc::new(CountingReboot::default());
        let watchdog = Watchdog::start(&config(1), actuator.clone());
        drop(watchdog);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(actuator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_config_defaults() {
        let config = WatchdogConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(3600));
        assert_eq!(config.period(), Duration::from_secs(1));
    }

    #[test]
    fn test_detached_handle_tracks_time() {
        let handle = WatchdogHandle::detached();
        handle.check_in();
        assert!(handle.elapsed() < Duration::from_secs(1));
    }
}
