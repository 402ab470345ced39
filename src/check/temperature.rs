//! `check_temp`: temperature and relative humidity probe.
//!
//! Performance data follows the Nagios plugin convention
//! `label=value[UOM];warn;crit;min;max`.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::sensor::{ClimateReading, ClimateSensor};
use super::{Check, CheckResult};
use crate::error::Result;

/// Reads attempted while the sensor keeps returning all-zero samples.
const MAX_READ_ATTEMPTS: usize = 2;

/// Default pause between reads; the DHT22 needs ~2s between samples.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Threshold set for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warn: f64,
    pub crit: f64,
    pub min: f64,
    pub max: f64,
}

impl Thresholds {
    /// Celsius thresholds.
    pub const CELSIUS: Thresholds = Thresholds {
        warn: 35.0,
        crit: 38.0,
        min: 0.0,
        max: 100.0,
    };

    /// Relative humidity thresholds in percent.
    pub const HUMIDITY: Thresholds = Thresholds {
        warn: 70.0,
        crit: 80.0,
        min: 0.0,
        max: 100.0,
    };

    fn map(self, f: impl Fn(f64) -> f64) -> Thresholds {
        Thresholds {
            warn: f(self.warn),
            crit: f(self.crit),
            min: f(self.min),
            max: f(self.max),
        }
    }

    fn perf_value(&self, value: f64, unit: &str) -> String {
        format!(
            "{:.1}{};{:.1};{:.1};{:.1};{:.1}",
            value, unit, self.warn, self.crit, self.min, self.max
        )
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

/// Reports temperature and humidity. Always `Ok` when the sensor answers,
/// `Warning` when it does not: the DHT family is too erratic for a failed
/// read to be critical.
pub struct TemperatureCheck<S> {
    sensor: S,
    settle_delay: Duration,
    celsius: Thresholds,
    humidity: Thresholds,
}

impl<S: ClimateSensor> TemperatureCheck<S> {
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            settle_delay: DEFAULT_SETTLE_DELAY,
            celsius: Thresholds::CELSIUS,
            humidity: Thresholds::HUMIDITY,
        }
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn thresholds(mut self, celsius: Thresholds, humidity: Thresholds) -> Self {
        self.celsius = celsius;
        self.humidity = humidity;
        self
    }

    /// Read until a non-zero sample arrives or attempts run out.
    fn read_settled(&self) -> Result<ClimateReading> {
        let mut last = self.sensor.read();
        for _ in 1..MAX_READ_ATTEMPTS {
            match &last {
                Ok(reading) if !reading.is_zero() => break,
                _ => {}
            }
            debug!("Climate sensor not settled, retrying");
            thread::sleep(self.settle_delay);
            last = self.sensor.read();
        }
        last
    }
}

impl<S: ClimateSensor> Check for TemperatureCheck<S> {
    fn evaluate(&self) -> CheckResult {
        let reading = match self.read_settled() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Climate sensor read failed: {}", e);
                return CheckResult::warning("Could not read temperature.");
            }
        };

        let celsius = reading.temperature_celsius;
        let fahrenheit = celsius_to_fahrenheit(celsius);
        let humidity = reading.relative_humidity;
        let fahrenheit_thresholds = self.celsius.map(celsius_to_fahrenheit);

        CheckResult::ok(format!(
            "Temperature = {:.1}C {:.1}F Relative Humidity = {:.1}%",
            celsius, fahrenheit, humidity
        ))
        .with_perf("temp_fahrenheit", fahrenheit_thresholds.perf_value(fahrenheit, ""))
        .with_perf("temp_celsius", self.celsius.perf_value(celsius, ""))
        .with_perf("relative_humidity", self.humidity.perf_value(humidity, "%"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NrpeError;
    use crate::protocol::ResultCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns queued samples in order, repeating the last one.
    struct Scripted {
        samples: Mutex<Vec<Option<ClimateReading>>>,
        reads: AtomicUsize,
    }

    impl Scripted {
        fn new(samples: Vec<Option<ClimateReading>>) -> Self {
            Self {
                samples: Mutex::new(samples),
                reads: AtomicUsize::new(0),
            }
        }
    }

    impl ClimateSensor for Scripted {
        fn read(&self) -> Result<ClimateReading> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let mut samples = self.samples.lock().unwrap();
            let sample = if samples.len() > 1 {
                samples.remove(0)
            } else {
                samples[0]
            };
            sample.ok_or_else(|| NrpeError::Sensor("checksum mismatch".to_string()))
        }
    }

    fn reading(t: f64, h: f64) -> Option<ClimateReading> {
        Some(ClimateReading {
            temperature_celsius: t,
            relative_humidity: h,
        })
    }

    #[test]
    fn test_good_reading() {
        let check = TemperatureCheck::new(Scripted::new(vec![reading(21.5, 40.0)]))
            .settle_delay(Duration::ZERO);
        let result = check.evaluate();

        assert_eq!(result.state, ResultCode::Ok);
        assert_eq!(
            result.status_text,
            "Temperature = 21.5C 70.7F Relative Humidity = 40.0%"
        );
        assert_eq!(
            result.performance_data.get("temp_celsius"),
            Some("21.5;35.0;38.0;0.0;100.0")
        );
        assert_eq!(
            result.performance_data.get("temp_fahrenheit"),
            Some("70.7;95.0;100.4;32.0;212.0")
        );
        assert_eq!(
            result.performance_data.get("relative_humidity"),
            Some("40.0%;70.0;80.0;0.0;100.0")
        );
        let keys: Vec<_> = result.performance_data.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["temp_fahrenheit", "temp_celsius", "relative_humidity"]);
        assert_eq!(check.sensor.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_reading_retried() {
        let check = TemperatureCheck::new(Scripted::new(vec![
            reading(0.0, 0.0),
            reading(19.0, 55.0),
        ]))
        .settle_delay(Duration::ZERO);
        let result = check.evaluate();

        assert_eq!(result.state, ResultCode::Ok);
        assert!(result.status_text.starts_with("Temperature = 19.0C"));
        assert_eq!(check.sensor.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_retries_are_bounded() {
        let check = TemperatureCheck::new(Scripted::new(vec![reading(0.0, 0.0)]))
            .settle_delay(Duration::ZERO);
        let result = check.evaluate();

        assert_eq!(result.state, ResultCode::Ok);
        assert_eq!(check.sensor.reads.load(Ordering::SeqCst), MAX_READ_ATTEMPTS);
    }

    #[test]
    fn test_failed_read_is_warning() {
        let check =
            TemperatureCheck::new(Scripted::new(vec![None])).settle_delay(Duration::ZERO);
        let result = check.evaluate();

        assert_eq!(result.state, ResultCode::Warning);
        assert_eq!(result.status_text, "Could not read temperature.");
        assert!(result.performance_data.is_empty());
    }

    #[test]
    fn test_celsius_to_fahrenheit() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
    }
}
