//! Transport module - TCP listening socket and fixed-length packet I/O.
//!
//! The agent serves one client at a time, so the listening socket is
//! created with a backlog of exactly one pending connection.

mod tcp;

pub use tcp::{bind_listener, read_packet, write_packet, LISTEN_BACKLOG};
