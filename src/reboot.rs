//! Device reboot.
//!
//! Recovery in this agent is crash-only: a hung network stack or a faulted
//! serve loop ends in a full device restart rather than an in-process retry.

use std::process::Command;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::signal::LedFlasher;

/// Restarts the device.
///
/// Production implementations do not return. Test fakes may.
pub trait RebootActuator: Send + Sync + 'static {
    fn reboot(&self);
}

/// Reboot configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootConfig {
    /// Command and arguments that restart the device.
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Seconds of logged countdown before rebooting.
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,
}

fn default_command() -> Vec<String> {
    vec!["reboot".to_string()]
}

fn default_countdown_secs() -> u64 {
    5
}

impl Default for RebootConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            countdown_secs: default_countdown_secs(),
        }
    }
}

/// Pulses flashed just before rebooting.
const REBOOT_PULSES: u32 = 4;
const REBOOT_PULSE: Duration = Duration::from_millis(100);

/// Reboots by running a system command, then exits the process.
pub struct CommandReboot {
    config: RebootConfig,
    flasher: LedFlasher,
}

impl CommandReboot {
    pub fn new(config: RebootConfig, flasher: LedFlasher) -> Self {
        Self { config, flasher }
    }
}

impl RebootActuator for CommandReboot {
    fn reboot(&self) {
        for remaining in (1..=self.config.countdown_secs).rev() {
            warn!("Rebooting device in {} seconds..", remaining);
            thread::sleep(Duration::from_secs(1));
        }

        error!("Rebooting device!");
        // Let the light finish before the power goes.
        let _ = self
            .flasher
            .flash(REBOOT_PULSES, REBOOT_PULSE, REBOOT_PULSE)
            .join();

        match self.config.command.split_first() {
            Some((program, args)) => match Command::new(program).args(args).status() {
                Ok(status) => error!("Reboot command {:?} returned {}", program, status),
                Err(e) => error!("Failed to run reboot command {:?}: {}", program, e),
            },
            None => error!("No reboot command configured"),
        }

        // Still running: let an external supervisor restart us.
        std::process::exit(1);
    }
}
