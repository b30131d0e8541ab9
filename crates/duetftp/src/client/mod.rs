//! # Client
//!
//! The synchronous half of the engine: the control channel an interactive
//! client drives, plus the one-shot data channels in [`data`].

pub mod data;

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::command::Command;
use crate::logger::TransferLog;
use crate::reply::{self, Reply};
use crate::status::Status;
use crate::types::{FtpError, FtpResult};

/// Timeout for establishing any outbound connection.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// The long-lived connection carrying commands out and replies back.
///
/// Every line that crosses the channel is mirrored to the transfer log with
/// its direction. The reader accumulates multi-line replies into a single
/// [`Reply`]. Closing consumes the connection, so no call can slip in after
/// `close()`.
pub struct ControlConn {
    reader: BufReader<TcpStream>,
    log: Arc<TransferLog>,
}

impl ControlConn {
    /// Dial `host:port` with a 5 second timeout and read the server greeting.
    pub fn dial(host: &str, port: u16, log: Arc<TransferLog>) -> FtpResult<(Self, Reply)> {
        log.message(&format!("Connecting to {host}:{port}"));

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(FtpError::ConnectionError)?
            .next()
            .ok_or_else(|| FtpError::InvalidAddress(format!("{host}:{port}")))?;
        let stream =
            TcpStream::connect_timeout(&addr, DIAL_TIMEOUT).map_err(FtpError::ConnectionError)?;
        debug!("Established connection with {addr}");

        let mut conn = Self {
            reader: BufReader::new(stream),
            log,
        };
        let greeting = conn.read_reply()?;
        Ok((conn, greeting))
    }

    /// The address of this end of the control connection.
    pub fn local_addr(&self) -> FtpResult<SocketAddr> {
        self.reader
            .get_ref()
            .local_addr()
            .map_err(FtpError::ConnectionError)
    }

    /// The address of the server end of the control connection.
    pub fn peer_addr(&self) -> FtpResult<SocketAddr> {
        self.reader
            .get_ref()
            .peer_addr()
            .map_err(FtpError::ConnectionError)
    }

    /// Write one command line, CRLF terminated.
    pub fn send(&mut self, cmd: &Command) -> FtpResult<()> {
        let wire = cmd.to_string();
        debug!("CC OUT: {wire}");
        self.log.sent(&wire);
        self.reader
            .get_mut()
            .write_all(format!("{wire}\r\n").as_bytes())
            .map_err(FtpError::ConnectionError)
    }

    /// Issue `cmd` and wait for the reply.
    pub fn send_then_read(&mut self, cmd: &Command) -> FtpResult<Reply> {
        self.send(cmd)?;
        self.read_reply()
    }

    /// Read one complete reply, accumulating the multi-line form.
    pub fn read_reply(&mut self) -> FtpResult<Reply> {
        let line = self.read_line()?;

        if let Some(code) = reply::single_line_code(&line) {
            return Ok(Reply::new(Status::from(code), &line[4..]));
        }

        if let Some(code) = reply::multi_line_code(&line) {
            let mut lines: Vec<String> = Vec::new();
            if line.len() > 4 {
                lines.push(line[4..].to_string());
            }
            loop {
                let next = self.read_line()?;
                let done = reply::single_line_code(&next) == Some(code);
                lines.push(next);
                if done {
                    return Ok(Reply::new(Status::from(code), lines.join("\n")));
                }
            }
        }

        Err(FtpError::MalformedReply)
    }

    /// Close the control connection.
    pub fn close(self) -> FtpResult<()> {
        self.shutdown()
    }

    /// Shut down both directions without consuming the handle; for abort
    /// paths that terminate the process right after.
    pub fn shutdown(&self) -> FtpResult<()> {
        self.reader
            .get_ref()
            .shutdown(Shutdown::Both)
            .map_err(FtpError::ConnectionError)
    }

    fn read_line(&mut self) -> FtpResult<String> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(FtpError::ConnectionError)?;
        if n == 0 {
            return Err(FtpError::ConnectionError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "control connection closed by server",
            )));
        }
        debug!("CC IN: {}", line.trim_end());
        self.log.received(&line);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

#[cfg(test)]
mod test {

    use std::io::Write as _;
    use std::net::TcpListener;
    use std::thread;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::command::CommandCode;

    use super::*;

    /// Serve one canned byte sequence on a loopback port, capturing whatever
    /// the client writes back.
    fn canned_server(payload: &'static str) -> (SocketAddr, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(payload.as_bytes()).unwrap();
            socket.shutdown(Shutdown::Write).unwrap();
            let mut received = String::new();
            use std::io::Read;
            socket.read_to_string(&mut received).unwrap();
            received
        });
        (addr, handle)
    }

    fn test_log(dir: &TempDir) -> Arc<TransferLog> {
        Arc::new(TransferLog::append(&dir.path().join("test.log")).unwrap())
    }

    #[test]
    fn should_dial_and_read_greeting() {
        let dir = TempDir::new().unwrap();
        let (addr, handle) = canned_server("220 Welcome to the duetftp server.\r\n");

        let (conn, greeting) =
            ControlConn::dial("127.0.0.1", addr.port(), test_log(&dir)).unwrap();
        assert_eq!(greeting.status, Status::Ready);
        assert_eq!(greeting.message.as_str(), "Welcome to the duetftp server.");
        conn.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn should_send_command_and_read_reply() {
        let dir = TempDir::new().unwrap();
        let (addr, handle) = canned_server("220 ready\r\n331 Username alice accepted.\r\n");

        let (mut conn, _) = ControlConn::dial("127.0.0.1", addr.port(), test_log(&dir)).unwrap();
        let reply = conn
            .send_then_read(&Command::new(CommandCode::User, "alice"))
            .unwrap();
        assert_eq!(reply.status, Status::NeedPassword);
        conn.close().unwrap();
        assert_eq!(handle.join().unwrap().as_str(), "USER alice\r\n");
    }

    #[test]
    fn should_accumulate_multi_line_reply() {
        let dir = TempDir::new().unwrap();
        let (addr, handle) =
            canned_server("220 ready\r\n214-\r\n\tUSER PASS\r\n\tQUIT\r\n214 duetftp\r\n");

        let (mut conn, _) = ControlConn::dial("127.0.0.1", addr.port(), test_log(&dir)).unwrap();
        let reply = conn
            .send_then_read(&Command::new(CommandCode::Help, ""))
            .unwrap();
        assert_eq!(reply.status, Status::Help);
        assert_eq!(reply.message.as_str(), "\tUSER PASS\n\tQUIT\n214 duetftp");
        conn.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn should_error_on_malformed_reply() {
        let dir = TempDir::new().unwrap();
        let (addr, handle) = canned_server("not a reply\r\n");

        assert!(matches!(
            ControlConn::dial("127.0.0.1", addr.port(), test_log(&dir)),
            Err(FtpError::MalformedReply)
        ));
        handle.join().unwrap();
    }

    #[test]
    fn should_mirror_traffic_to_the_log() {
        let dir = TempDir::new().unwrap();
        let (addr, handle) = canned_server("220 ready\r\n221 Goodbye.\r\n");
        let log_path = dir.path().join("mirror.log");
        let log = Arc::new(TransferLog::append(&log_path).unwrap());

        let (mut conn, _) = ControlConn::dial("127.0.0.1", addr.port(), log).unwrap();
        conn.send_then_read(&Command::new(CommandCode::Quit, ""))
            .unwrap();
        conn.close().unwrap();
        handle.join().unwrap();

        let text = std::fs::read_to_string(&log_path).unwrap();
        assert!(text.contains("Sent QUIT"));
        assert!(text.contains("Received 220 ready"));
        assert!(text.contains("Received 221 Goodbye."));
    }
}
