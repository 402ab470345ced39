//! `check_flood`: water sensor probe.

use tracing::warn;

use super::sensor::WaterSensor;
use super::{Check, CheckResult};

/// Reports `Critical` when the water sensor is wet.
pub struct FloodCheck<S> {
    sensor: S,
}

impl<S: WaterSensor> FloodCheck<S> {
    pub fn new(sensor: S) -> Self {
        Self { sensor }
    }
}

impl<S: WaterSensor> Check for FloodCheck<S> {
    fn evaluate(&self) -> CheckResult {
        match self.sensor.water_detected() {
            Ok(false) => CheckResult::ok("No water detected").with_perf("water_detected", 0),
            Ok(true) => CheckResult::critical("Water detected!").with_perf("water_detected", 1),
            Err(e) => {
                warn!("Water sensor read failed: {}", e);
                CheckResult::unknown(format!("Could not read water sensor: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NrpeError, Result};
    use crate::protocol::ResultCode;

    struct Fixed(Option<bool>);

    impl WaterSensor for Fixed {
        fn water_detected(&self) -> Result<bool> {
            self.0
                .ok_or_else(|| NrpeError::Sensor("pin unreadable".to_string()))
        }
    }

    #[test]
    fn test_dry() {
        let result = FloodCheck::new(Fixed(Some(false))).evaluate();
        assert_eq!(result.state, ResultCode::Ok);
        assert_eq!(result.status_text, "No water detected");
        assert_eq!(result.performance_data.get("water_detected"), Some("0"));
    }

    #[test]
    fn test_wet() {
        let result = FloodCheck::new(Fixed(Some(true))).evaluate();
        assert_eq!(result.state, ResultCode::Critical);
        assert_eq!(result.status_text, "Water detected!");
        assert_eq!(result.performance_data.get("water_detected"), Some("1"));
    }

    #[test]
    fn test_read_failure_is_unknown() {
        let result = FloodCheck::new(Fixed(None)).evaluate();
        assert_eq!(result.state, ResultCode::Unknown);
        assert!(result.status_text.contains("pin unreadable"));
        assert!(result.performance_data.is_empty());
    }
}
