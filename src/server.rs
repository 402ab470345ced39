//! NRPE connection server and its serve loop.
//!
//! The [`ServerBuilder`] configures the listener and collaborators. The
//! [`ConnectionServer`] runs one connection at a time through:
//!
//! ```text
//! Idle ─► Listening ─► Polling ─┬─► Accepted ─► Reading ─► Dispatching ─► Replying ─► Closed ─┐
//!                       ▲       │                                                             │
//!                       │       └─► Shutdown (stop requested at a poll timeout)               │
//!                       └─────────────────────────────────────────────────────────────────────┘
//!                       any transport error ─► Faulted
//! ```
//!
//! Cancellation is cooperative: accept waits at most one poll timeout, after
//! which the [`StopSignal`] is consulted.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nrpe_agent::check::CheckRegistry;
//! use nrpe_agent::server::ConnectionServer;
//!
//! let running = ConnectionServer::builder(Arc::new(CheckRegistry::new()))
//!     .port(5666)
//!     .start()?;
//!
//! let exit = running.wait_for_shutdown().await;
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, trace, warn};

use crate::check::CheckRegistry;
use crate::error::{NrpeError, Result};
use crate::protocol::{hex_dump, NrpePacket, PacketVersion};
use crate::protocol::DEFAULT_NRPE_PORT;
use crate::signal::LedFlasher;
use crate::transport::{bind_listener, read_packet, write_packet};
use crate::watchdog::WatchdogHandle;

/// Default wait for a connection before checking the stop signal.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Shortest poll timeout; anything lower is raised to this.
pub const MIN_POLL_TIMEOUT: Duration = Duration::from_millis(1);

const REPLY_VERSION: PacketVersion = PacketVersion::V2;

/// Sent when a check's reply does not fit into a packet.
const UNENCODABLE_REPLY: &str = "UNKNOWN - reply could not be encoded";

/// Sent when a check panics.
const FAILED_CHECK_REPLY: &str = "UNKNOWN - check failed";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Milliseconds to wait for a connection between stop-signal checks.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_NRPE_PORT
}

fn default_poll_timeout_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT.as_millis() as u64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Poll timeout, never below [`MIN_POLL_TIMEOUT`].
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms).max(MIN_POLL_TIMEOUT)
    }
}

/// Cooperative stop request shared between the server and its owner.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the serve loop to stop at its next poll timeout.
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Serve loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Listening,
    Polling,
    Accepted,
    Reading,
    Dispatching,
    Replying,
    Closed,
    Shutdown,
    Faulted,
}

/// How a serve loop run ended.
#[derive(Debug)]
pub enum ServerExit {
    /// A stop was requested and honoured.
    Stopped,
    /// A transport error ended the run.
    Faulted(NrpeError),
}

impl ServerExit {
    pub fn stopped_normally(&self) -> bool {
        matches!(self, ServerExit::Stopped)
    }
}

/// What happened to a single accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    Replied,
    /// Illegal query, or peer hung up before a whole packet arrived.
    Skipped,
}

/// Builder for configuring and starting a [`ConnectionServer`].
pub struct ServerBuilder {
    config: ServerConfig,
    registry: Arc<CheckRegistry>,
    watchdog: WatchdogHandle,
    signal: LedFlasher,
    stop: StopSignal,
}

impl ServerBuilder {
    /// Replace the whole server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind_address(mut self, address: IpAddr) -> Self {
        self.config.bind_address = address;
        self
    }

    /// TCP port. Default: 5666
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Wait between stop-signal checks. Default: 1 second
    ///
    /// Whole milliseconds, at least [`MIN_POLL_TIMEOUT`].
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.max(MIN_POLL_TIMEOUT).as_millis();
        self.config.poll_timeout_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    /// Watchdog to check in with after each answered query.
    pub fn watchdog(mut self, watchdog: WatchdogHandle) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Light flashed once per accepted connection.
    pub fn signal(mut self, signal: LedFlasher) -> Self {
        self.signal = signal;
        self
    }

    pub fn stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn build(self) -> ConnectionServer {
        let (state_tx, _) = watch::channel(ServerState::Idle);
        ConnectionServer {
            config: self.config,
            registry: self.registry,
            watchdog: self.watchdog,
            signal: self.signal,
            stop: self.stop,
            state: state_tx,
        }
    }

    /// Build, bind and start serving on a new task.
    pub fn start(self) -> Result<RunningServer> {
        self.build().start()
    }
}

/// Single-connection NRPE server.
pub struct ConnectionServer {
    config: ServerConfig,
    registry: Arc<CheckRegistry>,
    watchdog: WatchdogHandle,
    signal: LedFlasher,
    stop: StopSignal,
    state: watch::Sender<ServerState>,
}

impl ConnectionServer {
    /// Create a new server builder.
    pub fn builder(registry: Arc<CheckRegistry>) -> ServerBuilder {
        ServerBuilder {
            config: ServerConfig::default(),
            registry,
            watchdog: WatchdogHandle::detached(),
            signal: LedFlasher::disabled(),
            stop: StopSignal::new(),
        }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Bind the listening socket, then run the serve loop on a new task.
    ///
    /// Bind failures are returned directly. Must be called inside a tokio
    /// runtime.
    pub fn start(self) -> Result<RunningServer> {
        let listener = self.listen()?;
        let local_addr = listener.local_addr()?;
        let stop = self.stop.clone();
        let state = self.state.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let exit = self.run(listener).await;
            let _ = shutdown_tx.send(exit);
        });

        Ok(RunningServer {
            local_addr,
            stop,
            state,
            shutdown_rx,
        })
    }

    fn listen(&self) -> Result<TcpListener> {
        let addr = self.config.socket_addr();
        let listener = bind_listener(addr).map_err(|e| {
            self.transition(ServerState::Faulted);
            e
        })?;
        self.transition(ServerState::Listening);
        info!("Listening on {}", addr);
        Ok(listener)
    }

    /// Serve until stopped or faulted. The listener is closed on return.
    async fn run(&self, listener: TcpListener) -> ServerExit {
        info!("Starting NRPE server");
        let exit = match self.serve(&listener).await {
            Ok(()) => {
                self.transition(ServerState::Shutdown);
                ServerExit::Stopped
            }
            Err(e) => {
                error!("Exception in NRPE server: {}", e);
                self.transition(ServerState::Faulted);
                ServerExit::Faulted(e)
            }
        };
        drop(listener);
        info!("Ending NRPE server");
        exit
    }

    async fn serve(&self, listener: &TcpListener) -> Result<()> {
        loop {
            let Some((stream, peer)) = self.poll_accept(listener).await? else {
                info!("Stop requested, shutting down");
                return Ok(());
            };
            self.handle_connection(stream, peer).await?;
            self.transition(ServerState::Listening);
        }
    }

    /// Wait for a connection, checking the stop signal at each poll timeout.
    async fn poll_accept(&self, listener: &TcpListener) -> Result<Option<(TcpStream, SocketAddr)>> {
        self.transition(ServerState::Polling);
        debug!("Waiting for connection..");
        let poll_timeout = self.config.poll_timeout();

        loop {
            match tokio::time::timeout(poll_timeout, listener.accept()).await {
                Ok(accepted) => return Ok(Some(accepted?)),
                Err(_) if self.stop.is_stop_requested() => return Ok(None),
                Err(_) => continue,
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        self.transition(ServerState::Accepted);
        info!("Accepted connection from {}", peer.ip());
        let _ = self.signal.pulse(1);

        let exchange = self.exchange(&mut stream).await;

        // Closes only the connection, never the listener.
        debug!("Closing connection from {}", peer.ip());
        let _ = stream.shutdown().await;
        drop(stream);
        self.transition(ServerState::Closed);

        if exchange? == Exchange::Replied {
            self.watchdog.check_in();
        }
        Ok(())
    }

    /// Read, dispatch and reply for one connection.
    async fn exchange(&self, stream: &mut TcpStream) -> Result<Exchange> {
        self.transition(ServerState::Reading);
        let raw = match read_packet(stream).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                warn!("Peer closed before sending a whole packet, skipping");
                return Ok(Exchange::Skipped);
            }
            Err(e) => return Err(e.into()),
        };
        trace!("Bytes received over the wire: {}", hex_dump(&raw));

        self.transition(ServerState::Dispatching);
        let query = NrpePacket::decode(&raw);
        debug!(
            version = query.version(),
            packet_type = query.packet_type(),
            crc = format_args!("{:08X}", query.crc32()),
            result_code = query.raw_result_code(),
            "Received packet"
        );

        if !query.is_legal_query() {
            warn!(
                "Skipping unreadable incoming message (is SSL disabled for your check_nrpe request? \
                 This agent can't handle SSL messages.)"
            );
            return Ok(Exchange::Skipped);
        }
        if !query.crc_matches() {
            debug!("Query CRC mismatch, processing anyway");
        }

        let reply = self.reply_for(query.command()).await;
        debug!(
            result_code = ?reply.result_code(),
            text = %reply.text(),
            "About to send reply"
        );

        self.transition(ServerState::Replying);
        let bytes = reply.to_bytes();
        trace!("Bytes sent over the wire: {}", hex_dump(&bytes));
        write_packet(stream, &bytes).await?;
        debug!("Reply sent");
        Ok(Exchange::Replied)
    }

    /// Run the check off the async workers; sensor reads may block.
    ///
    /// Always yields a reply. Encoding failures and panicking checks are
    /// answered with a fixed UNKNOWN text, never with the query's command.
    async fn reply_for(&self, command: String) -> NrpePacket {
        let registry = self.registry.clone();
        let name = command.clone();

        match tokio::task::spawn_blocking(move || registry.reply_for(&command)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                error!(command = %name, "Reply could not be encoded: {}", e);
                NrpePacket::unknown(REPLY_VERSION, UNENCODABLE_REPLY)
            }
            Err(e) => {
                error!(command = %name, "Check panicked: {}", e);
                NrpePacket::unknown(REPLY_VERSION, FAILED_CHECK_REPLY)
            }
        }
    }

    fn transition(&self, state: ServerState) {
        trace!(?state, "Server state");
        self.state.send_replace(state);
    }
}

/// A serve loop running on its own task.
pub struct RunningServer {
    local_addr: SocketAddr,
    stop: StopSignal,
    state: watch::Receiver<ServerState>,
    shutdown_rx: oneshot::Receiver<ServerExit>,
}

impl RunningServer {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Request a stop; takes effect at the next poll timeout.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Current serve loop state.
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Wait for the serve loop to end.
    pub async fn wait_for_shutdown(self) -> ServerExit {
        match self.shutdown_rx.await {
            Ok(exit) => exit,
            Err(_) => ServerExit::Faulted(NrpeError::ServerFaulted(
                "serve loop ended without reporting".to_string(),
            )),
        }
    }
}
