//! Sensor interfaces consumed by the checks, with Linux sysfs backends.
//!
//! - [`GpioWaterSensor`] reads a GPIO `value` file
//! - [`IioClimateSensor`] reads IIO milli-unit files (e.g. a DHT22 driver)

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{NrpeError, Result};

/// Source of a water-present reading.
pub trait WaterSensor: Send + Sync + 'static {
    fn water_detected(&self) -> Result<bool>;
}

/// One temperature/humidity sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature_celsius: f64,
    pub relative_humidity: f64,
}

impl ClimateReading {
    /// An all-zero sample, which the DHT family reports while warming up.
    pub fn is_zero(&self) -> bool {
        self.temperature_celsius == 0.0 && self.relative_humidity == 0.0
    }
}

/// Source of temperature/humidity readings.
pub trait ClimateSensor: Send + Sync + 'static {
    fn read(&self) -> Result<ClimateReading>;
}

/// Water sensor wired to a GPIO exported through sysfs.
#[derive(Debug, Clone)]
pub struct GpioWaterSensor {
    value_path: PathBuf,
    active_low: bool,
}

impl GpioWaterSensor {
    /// `value_path` is typically `/sys/class/gpio/gpioN/value`. A `1` means water.
    pub fn new(value_path: impl Into<PathBuf>) -> Self {
        Self {
            value_path: value_path.into(),
            active_low: false,
        }
    }

    /// Treat `0` as water instead. Some probe boards invert the output.
    pub fn active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }
}

impl WaterSensor for GpioWaterSensor {
    fn water_detected(&self) -> Result<bool> {
        let level = match read_trimmed(&self.value_path)?.as_str() {
            "0" => false,
            "1" => true,
            other => {
                return Err(NrpeError::Sensor(format!(
                    "unexpected GPIO value {:?} in {}",
                    other,
                    self.value_path.display()
                )))
            }
        };
        Ok(level != self.active_low)
    }
}

/// Temperature/humidity sensor exposed through the Linux IIO subsystem.
#[derive(Debug, Clone)]
pub struct IioClimateSensor {
    temperature_path: PathBuf,
    humidity_path: PathBuf,
}

impl IioClimateSensor {
    /// Paths to `in_temp_input` (milli-degrees C) and
    /// `in_humidityrelative_input` (milli-percent).
    pub fn new(temperature_path: impl Into<PathBuf>, humidity_path: impl Into<PathBuf>) -> Self {
        Self {
            temperature_path: temperature_path.into(),
            humidity_path: humidity_path.into(),
        }
    }
}

impl ClimateSensor for IioClimateSensor {
    fn read(&self) -> Result<ClimateReading> {
        Ok(ClimateReading {
            temperature_celsius: read_milli(&self.temperature_path)?,
            relative_humidity: read_milli(&self.humidity_path)?,
        })
    }
}

fn read_trimmed(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| NrpeError::Sensor(format!("{}: {}", path.display(), e)))
}

fn read_milli(path: &Path) -> Result<f64> {
    let raw = read_trimmed(path)?;
    raw.parse::<i64>()
        .map(|v| v as f64 / 1000.0)
        .map_err(|e| NrpeError::Sensor(format!("{}: bad value {:?}: {}", path.display(), raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_gpio_levels() {
        let wet = file_with("1\n");
        let dry = file_with("0\n");

        assert!(GpioWaterSensor::new(wet.path()).water_detected().unwrap());
        assert!(!GpioWaterSensor::new(dry.path()).water_detected().unwrap());
        assert!(!GpioWaterSensor::new(wet.path())
            .active_low(true)
            .water_detected()
            .unwrap());
    }

    #[test]
    fn test_gpio_garbage_is_error() {
        let bad = file_with("maybe");
        assert!(matches!(
            GpioWaterSensor::new(bad.path()).water_detected(),
            Err(NrpeError::Sensor(_))
        ));
    }

    #[test]
    fn test_gpio_missing_file_is_error() {
        let sensor = GpioWaterSensor::new("/nonexistent/gpio/value");
        assert!(sensor.water_detected().is_err());
    }

    #[test]
    fn test_iio_reading() {
        let temp = file_with("21500\n");
        let humidity = file_with("40250\n");
        let reading = IioClimateSensor::new(temp.path(), humidity.path())
            .read()
            .unwrap();

        assert_eq!(reading.temperature_celsius, 21.5);
        assert_eq!(reading.relative_humidity, 40.25);
        assert!(!reading.is_zero());
    }

    #[test]
    fn test_iio_negative_temperature() {
        let temp = file_with("-4000");
        let humidity = file_with("0");
        let reading = IioClimateSensor::new(temp.path(), humidity.path())
            .read()
            .unwrap();
        assert_eq!(reading.temperature_celsius, -4.0);
    }
}
