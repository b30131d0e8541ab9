//! # Client data channel
//!
//! The ephemeral connection a single listing or download arrives over. Each
//! value is good for exactly one transfer: reading consumes it.

use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::debug;

use super::DIAL_TIMEOUT;
use crate::types::{FtpError, FtpResult};

/// How long an active-mode read waits for the server to connect and send.
pub const DATA_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// A one-shot inbound data connection.
///
/// Active mode listens and waits for the server to dial in; a background
/// thread accepts the connection and drains it so the control channel can
/// proceed in the meantime. Passive mode dials the endpoint the server
/// advertised and reads it straight.
pub enum ClientDataConn {
    Active {
        incoming: mpsc::Receiver<std::io::Result<Vec<u8>>>,
    },
    Passive {
        stream: TcpStream,
    },
}

impl ClientDataConn {
    /// Bind an ephemeral listener and start the background accept task.
    /// Returns the channel and the local address to advertise via PORT/EPRT.
    pub fn active() -> FtpResult<(Self, SocketAddr)> {
        let listener = TcpListener::bind("0.0.0.0:0").map_err(FtpError::ConnectionError)?;
        let addr = listener.local_addr().map_err(FtpError::ConnectionError)?;
        debug!("Active data channel listening on {addr}");

        let (tx, incoming) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(accept_and_drain(listener));
        });

        Ok((Self::Active { incoming }, addr))
    }

    /// Dial the endpoint advertised by a PASV/EPSV reply.
    pub fn passive(addr: SocketAddr) -> FtpResult<Self> {
        debug!("Dialing passive data channel {addr}");
        let stream =
            TcpStream::connect_timeout(&addr, DIAL_TIMEOUT).map_err(FtpError::ConnectionError)?;
        Ok(Self::Passive { stream })
    }

    /// Read the transfer to EOF, consuming the channel.
    ///
    /// In active mode this waits for whichever comes first: the drained bytes
    /// or the 10 second deadline.
    pub fn read(self) -> FtpResult<Vec<u8>> {
        match self {
            Self::Active { incoming } => match incoming.recv_timeout(DATA_READ_TIMEOUT) {
                Ok(result) => result.map_err(FtpError::ConnectionError),
                Err(_) => Err(FtpError::Timeout),
            },
            Self::Passive { mut stream } => {
                let mut bytes = Vec::new();
                stream
                    .read_to_end(&mut bytes)
                    .map_err(FtpError::ConnectionError)?;
                Ok(bytes)
            }
        }
    }
}

fn accept_and_drain(listener: TcpListener) -> std::io::Result<Vec<u8>> {
    let (mut socket, peer) = listener.accept()?;
    debug!("Data connection accepted from {peer}");
    let mut bytes = Vec::new();
    socket.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod test {

    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn should_read_bytes_in_active_mode() {
        let (conn, addr) = ClientDataConn::active().unwrap();

        let target = SocketAddr::from(([127, 0, 0, 1], addr.port()));
        let handle = thread::spawn(move || {
            let mut socket = TcpStream::connect(target).unwrap();
            socket.write_all(b"drwxr-xr-x 2 ftp ftp 4096 notes\r\n").unwrap();
        });

        let bytes = conn.read().unwrap();
        assert_eq!(bytes.as_slice(), b"drwxr-xr-x 2 ftp ftp 4096 notes\r\n");
        handle.join().unwrap();
    }

    #[test]
    fn should_read_bytes_in_passive_mode() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"file contents\r\n").unwrap();
        });

        let conn = ClientDataConn::passive(addr).unwrap();
        let bytes = conn.read().unwrap();
        assert_eq!(bytes.as_slice(), b"file contents\r\n");
        handle.join().unwrap();
    }
}
