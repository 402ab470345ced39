//! Check registry for dispatching queries by command name.
//!
//! The registry maps lowercase command names to checks. It is built once at
//! startup and then shared read-only with the server.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use super::sensor::{ClimateSensor, WaterSensor};
use super::{format_reply, Check, CheckResult, FloodCheck, TemperatureCheck, UptimeCheck};
use crate::error::Result;
use crate::protocol::{NrpePacket, PacketVersion};

/// Water sensor check command.
pub const CHECK_FLOOD: &str = "check_flood";
/// Temperature and humidity check command.
pub const CHECK_TEMP: &str = "check_temp";
/// Uptime and free memory check command.
pub const CHECK_UPTIME: &str = "check_uptime";

/// Version stamped on every reply.
const REPLY_VERSION: PacketVersion = PacketVersion::V2;

/// Longest command name echoed back in a "not recognized" reply.
pub const MAX_ECHOED_COMMAND: usize = 64;

/// Registry mapping command names to checks.
pub struct CheckRegistry {
    checks: HashMap<String, Box<dyn Check>>,
}

impl CheckRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    /// Registry answering `check_flood`, `check_temp` and `check_uptime`.
    pub fn with_default_checks<W, C>(water: W, climate: TemperatureCheck<C>, started: Instant) -> Self
    where
        W: WaterSensor,
        C: ClimateSensor,
    {
        Self::new()
            .with(CHECK_FLOOD, FloodCheck::new(water))
            .with(CHECK_TEMP, climate)
            .with(CHECK_UPTIME, UptimeCheck::new(started))
    }

    /// Register a check under `name`. Matching is case-insensitive.
    ///
    /// Registering the same name twice replaces the earlier check.
    pub fn register<C: Check>(&mut self, name: &str, check: C) {
        self.checks.insert(name.to_lowercase(), Box::new(check));
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<C: Check>(mut self, name: &str, check: C) -> Self {
        self.register(name, check);
        self
    }

    /// Whether `name` routes to a check.
    pub fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(&name.to_lowercase())
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.checks.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Run the check registered for `command`.
    ///
    /// Unrecognised commands produce an `Unknown` result naming the command.
    pub fn dispatch(&self, command: &str) -> CheckResult {
        let key = command.to_lowercase();
        match self.checks.get(&key) {
            Some(check) => {
                debug!(command = %key, "Dispatching check");
                check.evaluate()
            }
            None => {
                debug!(command = %key, "Unrecognised command");
                CheckResult::unknown(format!(
                    "message type {} not recognized.",
                    echoed_command(&key)
                ))
            }
        }
    }

    /// Dispatch `command` and build the reply packet.
    ///
    /// Fails only if the reply text does not fit into the packet buffer.
    pub fn reply_for(&self, command: &str) -> Result<NrpePacket> {
        let result = self.dispatch(command);
        let (code, text) = format_reply(&result);
        NrpePacket::response(REPLY_VERSION, code, &text, &result.performance_data)
    }
}

/// `command`, cut to at most [`MAX_ECHOED_COMMAND`] bytes on a char boundary.
fn echoed_command(command: &str) -> Cow<'_, str> {
    if command.len() <= MAX_ECHOED_COMMAND {
        return Cow::Borrowed(command);
    }
    let mut end = MAX_ECHOED_COMMAND;
    while !command.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!("{}...", &command[..end]))
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResultCode;

    #[test]
    fn test_unrecognised_command() {
        let registry = CheckRegistry::new();
        let result = registry.dispatch("check_bogus");

        assert_eq!(result.state, ResultCode::Unknown);
        assert!(result.status_text.contains("check_bogus"));
        assert_eq!(result.status_text, "message type check_bogus not recognized.");
        assert!(result.performance_data.is_empty());
    }

    #[test]
    fn test_dispatch_is_case_insensitive() {
        let registry =
            CheckRegistry::new().with("Check_Flood", || CheckResult::ok("No water detected"));

        assert!(registry.contains("CHECK_FLOOD"));
        assert_eq!(registry.dispatch("check_flood").state, ResultCode::Ok);
        assert_eq!(registry.dispatch("CHECK_flood").state, ResultCode::Ok);
    }

    #[test]
    fn test_commands_sorted() {
        let registry = CheckRegistry::new()
            .with(CHECK_UPTIME, || CheckResult::ok("up"))
            .with(CHECK_FLOOD, || CheckResult::ok("dry"))
            .with(CHECK_TEMP, || CheckResult::ok("warm"));

        assert_eq!(
            registry.commands(),
            vec![CHECK_FLOOD, CHECK_TEMP, CHECK_UPTIME]
        );
    }

    #[test]
    fn test_reply_for_formats_text() {
        let registry = CheckRegistry::new().with(CHECK_FLOOD, || {
            CheckResult::critical("Water detected!").with_perf("water_detected", 1)
        });

        let reply = registry.reply_for("check_flood").unwrap();
        assert_eq!(reply.result_code(), ResultCode::Critical);
        assert_eq!(reply.text(), "CRITICAL - Water detected! | water_detected=1");
        assert_eq!(reply.version(), 2);
        assert!(!reply.is_legal_query());
        assert!(reply.crc_matches());
    }

    #[test]
    fn test_reply_for_unknown_command() {
        let registry = CheckRegistry::new();
        let reply = registry.reply_for("check_bogus").unwrap();
        assert_eq!(reply.result_code(), ResultCode::Unknown);
        assert_eq!(
            reply.text(),
            "UNKNOWN - message type check_bogus not recognized."
        );
    }

    #[test]
    fn test_long_unrecognised_command_is_cut() {
        let registry = CheckRegistry::new();
        let command = "x".repeat(1000);

        let result = registry.dispatch(&command);
        assert_eq!(result.state, ResultCode::Unknown);
        assert_eq!(
            result.status_text,
            format!("message type {}... not recognized.", "x".repeat(MAX_ECHOED_COMMAND))
        );

        let reply = registry.reply_for(&command).unwrap();
        assert_eq!(reply.result_code(), ResultCode::Unknown);
    }

    #[test]
    fn test_echoed_command_respects_char_boundary() {
        let command = format!("{}\u{00e9}tail", "a".repeat(MAX_ECHOED_COMMAND - 1));
        let echoed = echoed_command(&command);
        assert_eq!(echoed, format!("{}...", "a".repeat(MAX_ECHOED_COMMAND - 1)));
        assert_eq!(echoed_command("check_bogus"), "check_bogus");
    }

    #[test]
    fn test_default_checks() {
        struct Dry;
        impl WaterSensor for Dry {
            fn water_detected(&self) -> Result<bool> {
                Ok(false)
            }
        }
        struct Broken;
        impl ClimateSensor for Broken {
            fn read(&self) -> Result<crate::check::ClimateReading> {
                Err(crate::error::NrpeError::Sensor("no sensor".to_string()))
            }
        }

        let registry = CheckRegistry::with_default_checks(
            Dry,
            TemperatureCheck::new(Broken).settle_delay(std::time::Duration::ZERO),
            Instant::now(),
        );

        assert_eq!(registry.commands(), vec![CHECK_FLOOD, CHECK_TEMP, CHECK_UPTIME]);
        assert_eq!(registry.dispatch("check_flood").state, ResultCode::Ok);
        assert_eq!(registry.dispatch("check_temp").state, ResultCode::Warning);
        assert_eq!(registry.dispatch("check_uptime").state, ResultCode::Ok);
    }

    #[test]
    fn test_reply_for_oversized_result_is_error() {
        let registry = CheckRegistry::new().with("check_big", || CheckResult::ok("x".repeat(2000)));
        assert!(registry.reply_for("check_big").is_err());
    }
}
