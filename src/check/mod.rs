//! Check module - health probes and command dispatch.
//!
//! Provides:
//! - [`Check`] - a probe that produces a [`CheckResult`]
//! - [`CheckRegistry`] - maps NRPE command names to checks
//! - [`format_reply`] - turns a result into the reply code and text
//!
//! Checks never fail. A sensor that cannot be read degrades the result to
//! `Warning` or `Unknown` so a bad probe cannot take the server down.
//!
//! # Example
//!
//! ```
//! use nrpe_agent::check::{CheckRegistry, CheckResult};
//! use nrpe_agent::protocol::ResultCode;
//!
//! let mut registry = CheckRegistry::new();
//! registry.register("check_demo", || CheckResult::ok("Demo Metric: 20").with_perf("demo_metric", 20));
//!
//! let result = registry.dispatch("CHECK_DEMO");
//! assert_eq!(result.state, ResultCode::Ok);
//! ```

mod flood;
mod registry;
mod sensor;
mod temperature;
mod uptime;

pub use flood::FloodCheck;
pub use registry::{CheckRegistry, CHECK_FLOOD, CHECK_TEMP, CHECK_UPTIME, MAX_ECHOED_COMMAND};
pub use sensor::{ClimateReading, ClimateSensor, GpioWaterSensor, IioClimateSensor, WaterSensor};
pub use temperature::{celsius_to_fahrenheit, TemperatureCheck, Thresholds};
pub use uptime::{format_uptime, meminfo_available, UptimeCheck};

use crate::protocol::{PerformanceData, ResultCode};

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub state: ResultCode,
    pub status_text: String,
    pub performance_data: PerformanceData,
}

impl CheckResult {
    pub fn new(state: ResultCode, status_text: impl Into<String>) -> Self {
        Self {
            state,
            status_text: status_text.into(),
            performance_data: PerformanceData::new(),
        }
    }

    pub fn ok(status_text: impl Into<String>) -> Self {
        Self::new(ResultCode::Ok, status_text)
    }

    pub fn warning(status_text: impl Into<String>) -> Self {
        Self::new(ResultCode::Warning, status_text)
    }

    pub fn critical(status_text: impl Into<String>) -> Self {
        Self::new(ResultCode::Critical, status_text)
    }

    pub fn unknown(status_text: impl Into<String>) -> Self {
        Self::new(ResultCode::Unknown, status_text)
    }

    /// Append a performance data entry.
    pub fn with_perf(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.performance_data.push(name, value);
        self
    }
}

/// A health probe.
///
/// Implementations must absorb their own failures into the returned result.
pub trait Check: Send + Sync + 'static {
    fn evaluate(&self) -> CheckResult;
}

impl<F> Check for F
where
    F: Fn() -> CheckResult + Send + Sync + 'static,
{
    fn evaluate(&self) -> CheckResult {
        self()
    }
}

/// Reply code and full status text, e.g. `"WARNING - Could not read temperature."`.
pub fn format_reply(result: &CheckResult) -> (ResultCode, String) {
    let state = result.state;
    (state, format!("{} - {}", state.label(), result.status_text))
}
