//! TCP listener setup and packet-sized reads and writes.
//!
//! # Example
//!
//! ```ignore
//! use nrpe_agent::transport::{bind_listener, read_packet};
//!
//! let listener = bind_listener("0.0.0.0:5666".parse()?)?;
//! let (mut stream, _peer) = listener.accept().await?;
//! let raw = read_packet(&mut stream).await?;
//! ```

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};

use crate::error::{NrpeError, Result};
use crate::protocol::PACKET_SIZE;

/// Pending connections the kernel may queue for us.
pub const LISTEN_BACKLOG: u32 = 1;

/// Bind and listen on `addr` with a backlog of [`LISTEN_BACKLOG`].
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let bind_err = |source| NrpeError::Bind { addr, source };

    let socket = if addr.is_ipv6() {
        TcpSocket::new_v6()
    } else {
        TcpSocket::new_v4()
    }
    .map_err(bind_err)?;

    // Allow a quick rebind after a crash-restart while old sockets sit in TIME_WAIT.
    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)
}

/// Read one whole packet.
///
/// Loops until [`PACKET_SIZE`] bytes have arrived. A peer that closes early
/// yields an `UnexpectedEof` I/O error.
pub async fn read_packet<R>(reader: &mut R) -> std::io::Result<[u8; PACKET_SIZE]>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; PACKET_SIZE];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write one encoded packet and flush it.
pub async fn write_packet<W>(writer: &mut W, packet: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(packet).await?;
    writer.flush().await
}
