//! # Server data channel
//!
//! The writer side of the ephemeral transfer connection. A channel is
//! configured by PORT/EPRT (active) or PASV/EPSV (passive) and its socket is
//! good for one transfer.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Timeout for dialing the client in active mode.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Data channel configuration owned by a session.
#[derive(Debug)]
pub(crate) enum DataChannel {
    /// Server dials the client-advertised endpoint per transfer.
    Active { addr: SocketAddr },
    /// Server listens; only the control-channel peer may connect.
    Passive {
        listener: TcpListener,
        peer_ip: IpAddr,
    },
}

impl DataChannel {
    /// Bind an ephemeral passive listener on `local_ip`, remembering the
    /// control peer for the accept-time ownership check. Returns the channel
    /// and the address to advertise.
    pub(crate) async fn passive(
        local_ip: IpAddr,
        peer_ip: IpAddr,
    ) -> std::io::Result<(Self, SocketAddr)> {
        let listener = TcpListener::bind((local_ip, 0)).await?;
        let listen_addr = listener.local_addr()?;
        debug!("Passive data connection listening on {listen_addr}");
        Ok((Self::Passive { listener, peer_ip }, listen_addr))
    }
}

/// Dial the stored endpoint, write the payload, close.
pub(crate) async fn send_active(addr: SocketAddr, payload: &[u8]) -> std::io::Result<()> {
    let mut socket = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "data dial timed out"))??;
    socket.write_all(payload).await?;
    socket.shutdown().await
}

/// Accept one connection, verify it comes from the control-channel peer,
/// write the payload, close. The listener is dropped either way.
pub(crate) async fn send_passive(
    listener: TcpListener,
    peer_ip: IpAddr,
    payload: &[u8],
) -> std::io::Result<()> {
    let (mut socket, remote) = listener.accept().await?;
    if remote.ip() != peer_ip {
        return Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            format!("unexpected data client: want {peer_ip} got {}", remote.ip()),
        ));
    }
    socket.write_all(payload).await?;
    socket.shutdown().await
}
