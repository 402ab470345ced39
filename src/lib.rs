//! # nrpe-agent
//!
//! Minimal NRPE agent for small Linux devices.
//!
//! The agent answers `check_nrpe` queries over plain TCP, one connection at
//! a time, and reboots the device when it stops answering.
//!
//! ## Architecture
//!
//! - **Protocol**: fixed 1036-byte NRPE v2 packets protected by CRC-32
//! - **Checks**: a registry routing command names to sensor checks
//! - **Server**: a single-connection serve loop with cooperative shutdown
//! - **Watchdog**: reboots the device when queries stop being answered
//!
//! ## Example
//!
//! ```ignore
//! use nrpe_agent::{Agent, AgentConfig};
//!
//! #[tokio::main]
//! async fn main() -> nrpe_agent::Result<()> {
//!     let agent = Agent::from_config(AgentConfig::default());
//!     agent.run().await
//! }
//! ```

pub mod agent;
pub mod check;
pub mod config;
pub mod error;
pub mod protocol;
pub mod reboot;
pub mod server;
pub mod signal;
pub mod transport;
pub mod watchdog;

pub use agent::Agent;
pub use check::{Check, CheckRegistry, CheckResult};
pub use config::AgentConfig;
pub use error::{NrpeError, Result};
pub use protocol::{NrpePacket, PerformanceData, ResultCode};
pub use server::{ConnectionServer, RunningServer, ServerExit, StopSignal};
