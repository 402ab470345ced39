//! Configuration management for the agent.
//!
//! All sections are optional; a missing file section takes its defaults.
//!
//! ```toml
//! [server]
//! port = 5666
//!
//! [watchdog]
//! timeout_secs = 3600
//!
//! [sensors]
//! flood_gpio_path = "/sys/class/gpio/gpio10/value"
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NrpeError, Result};
use crate::reboot::RebootConfig;
use crate::server::ServerConfig;
use crate::watchdog::WatchdogConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub watchdog: WatchdogConfig,

    #[serde(default)]
    pub signal: SignalConfig,

    #[serde(default)]
    pub sensors: SensorConfig,

    #[serde(default)]
    pub reboot: RebootConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AgentConfig {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NrpeError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| NrpeError::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(NrpeError::InvalidConfig("Server port must be non-zero".into()));
        }

        if self.server.poll_timeout_ms == 0 {
            return Err(NrpeError::InvalidConfig(
                "Server poll timeout must be non-zero".into(),
            ));
        }

        if self.watchdog.period_ms == 0 {
            return Err(NrpeError::InvalidConfig(
                "Watchdog period must be non-zero".into(),
            ));
        }

        if self.watchdog.timeout() <= self.watchdog.period() {
            return Err(NrpeError::InvalidConfig(
                "Watchdog timeout must be longer than its period".into(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(NrpeError::InvalidConfig(format!(
                "Unknown log format {:?}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

/// Activity light configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// LED brightness file. No light is driven when unset.
    #[serde(default)]
    pub led_path: Option<PathBuf>,
}

/// Sensor locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// GPIO `value` file of the water probe.
    #[serde(default = "default_flood_gpio_path")]
    pub flood_gpio_path: PathBuf,

    /// Probe reports `0` for water.
    #[serde(default)]
    pub flood_active_low: bool,

    /// IIO temperature file, milli-degrees Celsius.
    #[serde(default = "default_temperature_path")]
    pub temperature_path: PathBuf,

    /// IIO relative humidity file, milli-percent.
    #[serde(default = "default_humidity_path")]
    pub humidity_path: PathBuf,

    /// Pause between climate sensor retries.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_flood_gpio_path() -> PathBuf {
    PathBuf::from("/sys/class/gpio/gpio10/value")
}

fn default_temperature_path() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices/iio:device0/in_temp_input")
}

fn default_humidity_path() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices/iio:device0/in_humidityrelative_input")
}

fn default_settle_delay_ms() -> u64 {
    2000
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            flood_gpio_path: default_flood_gpio_path(),
            flood_active_low: false,
            temperature_path: default_temperature_path(),
            humidity_path: default_humidity_path(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl SensorConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| NrpeError::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| NrpeError::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
