//! `check_uptime`: time since the agent started, plus free memory.

use std::fs;
use std::time::{Duration, Instant};

use super::{Check, CheckResult};

const SECONDS_PER_MINUTE: u64 = 60;
const MINUTES_PER_HOUR: u64 = 60;
const HOURS_PER_DAY: u64 = 24;

/// Reports uptime since the device last (re)started. Always `Ok`.
pub struct UptimeCheck {
    started: Instant,
    free_memory: fn() -> Option<u64>,
}

impl UptimeCheck {
    /// Measure uptime from `started`, reporting free memory from `/proc/meminfo`.
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            free_memory: meminfo_available,
        }
    }

    /// Replace the free memory probe.
    pub fn with_memory_probe(mut self, probe: fn() -> Option<u64>) -> Self {
        self.free_memory = probe;
        self
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Check for UptimeCheck {
    fn evaluate(&self) -> CheckResult {
        let free_memory = (self.free_memory)().unwrap_or(0);
        uptime_result(self.uptime(), free_memory)
    }
}

fn uptime_result(uptime: Duration, free_memory: u64) -> CheckResult {
    let seconds = uptime.as_secs();
    let minutes = seconds / SECONDS_PER_MINUTE;
    let hours = minutes / MINUTES_PER_HOUR;

    CheckResult::ok(format!(
        "Uptime: {} Free memory: {}",
        format_uptime(uptime),
        free_memory
    ))
    .with_perf("free_memory", free_memory)
    .with_perf("uptime_in_seconds", seconds)
    .with_perf("uptime_in_minutes", minutes)
    .with_perf("uptime_in_hours", hours)
}

/// `hh:mm:ss`, or `d.hh:mm:ss` once a day has passed.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let seconds = total % SECONDS_PER_MINUTE;
    let minutes = (total / SECONDS_PER_MINUTE) % MINUTES_PER_HOUR;
    let hours = (total / (SECONDS_PER_MINUTE * MINUTES_PER_HOUR)) % HOURS_PER_DAY;
    let days = total / (SECONDS_PER_MINUTE * MINUTES_PER_HOUR * HOURS_PER_DAY);

    if days > 0 {
        format!("{}.{:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// `MemAvailable` from `/proc/meminfo`, in bytes.
pub fn meminfo_available() -> Option<u64> {
    let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
    parse_mem_available(&meminfo)
}

fn parse_mem_available(meminfo: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let rest = line.strip_prefix("MemAvailable:")?;
        let kib: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
        Some(kib * 1024)
    })
}
