//! Error types for the NRPE agent.

use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for all agent operations.
#[derive(Debug, Error)]
pub enum NrpeError {
    /// I/O error on the listening socket or an accepted connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The listening socket could not be created, bound or put into listen mode.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Status text plus performance data does not fit into the packet buffer.
    #[error("Payload of {len} bytes exceeds packet capacity of {capacity} bytes")]
    PayloadTooLarge { len: usize, capacity: usize },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration was parsed but is not usable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A sensor could not be read.
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// The serve loop stopped because of a transport fault.
    #[error("NRPE server stopped abnormally: {0}")]
    ServerFaulted(String),
}

/// Result type alias using NrpeError.
pub type Result<T> = std::result::Result<T, NrpeError>;
