//! Agent supervisor.
//!
//! Wires the check registry, serve loop, watchdog and activity light
//! together. A faulted serve loop is never restarted in-process; the device
//! is rebooted instead.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::check::{CheckRegistry, GpioWaterSensor, IioClimateSensor, TemperatureCheck};
use crate::config::AgentConfig;
use crate::error::{NrpeError, Result};
use crate::reboot::{CommandReboot, RebootActuator};
use crate::server::{ConnectionServer, ServerExit, StopSignal};
use crate::signal::{LedFlasher, NoLed, SysfsLed};
use crate::watchdog::Watchdog;

/// A configured agent, ready to run.
pub struct Agent {
    config: AgentConfig,
    registry: Arc<CheckRegistry>,
    actuator: Arc<dyn RebootActuator>,
    signal: LedFlasher,
    stop: StopSignal,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        registry: CheckRegistry,
        actuator: Arc<dyn RebootActuator>,
        signal: LedFlasher,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            actuator,
            signal,
            stop: StopSignal::new(),
        }
    }

    /// Agent backed by the sysfs sensors, light and reboot command named in
    /// `config`.
    pub fn from_config(config: AgentConfig) -> Self {
        let signal = match &config.signal.led_path {
            Some(path) => LedFlasher::new(SysfsLed::new(path)),
            None => LedFlasher::new(NoLed),
        };

        let sensors = &config.sensors;
        let water = GpioWaterSensor::new(&sensors.flood_gpio_path)
            .active_low(sensors.flood_active_low);
        let climate = TemperatureCheck::new(IioClimateSensor::new(
            &sensors.temperature_path,
            &sensors.humidity_path,
        ))
        .settle_delay(sensors.settle_delay());
        let registry = CheckRegistry::with_default_checks(water, climate, Instant::now());

        let actuator = Arc::new(CommandReboot::new(config.reboot.clone(), signal.clone()));
        Self::new(config, registry, actuator, signal)
    }

    /// Signal that stops [`run`](Self::run) at the next poll timeout.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Serve until stopped.
    ///
    /// Returns `Ok` after a requested stop. A bind failure or faulted serve
    /// loop triggers a reboot and then returns the error.
    pub async fn run(self) -> Result<()> {
        info!(commands = ?self.registry.commands(), "Starting NRPE agent");

        let watchdog = Watchdog::start(&self.config.watchdog, self.actuator.clone());

        let started = ConnectionServer::builder(self.registry.clone())
            .config(self.config.server.clone())
            .watchdog(watchdog.handle())
            .signal(self.signal.clone())
            .stop_signal(self.stop.clone())
            .start();

        let exit = match started {
            Ok(running) => running.wait_for_shutdown().await,
            Err(e) => ServerExit::Faulted(e),
        };
        drop(watchdog);

        match exit {
            ServerExit::Stopped => {
                info!("NRPE agent stopped");
                Ok(())
            }
            ServerExit::Faulted(e) => {
                error!("NRPE server faulted: {}", e);
                let actuator = self.actuator.clone();
                let _ = tokio::task::spawn_blocking(move || actuator.reboot()).await;
                Err(NrpeError::ServerFaulted(e.to_string()))
            }
        }
    }
}
