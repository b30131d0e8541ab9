//! # Session
//!
//! The per-connection state machine. A session owns its control socket,
//! tracks the authentication gate and the current directory, and carries at
//! most one configured data channel at a time. Every handler writes exactly
//! one status handshake back before the next command is read.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::data::{self, DataChannel};
use super::list::list_directory;
use crate::addr;
use crate::command::{Command, CommandCode};
use crate::config::ServerConfig;
use crate::logger::TransferLog;
use crate::reply::Reply;
use crate::status::Status;
use crate::types::FtpError;

/// A session with no traffic for this long is sent `421` and closed.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

const HELP_TEXT: &str = "The following commands are recognized:\n\
                         USER   PASS   CWD    CDUP   PWD\n\
                         PASV   EPSV   PORT   EPRT   RETR\n\
                         LIST   HELP   QUIT";

/// Authentication gate.
///
/// `USER` always moves to `AwaitPass`, dropping any prior login; only a
/// matching `PASS` enters `LoggedIn`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    PreAuth,
    AwaitPass { username: String },
    LoggedIn { username: String },
}

enum Flow {
    Continue,
    Quit,
}

enum ReadOutcome {
    Cmd(Command),
    Eof,
    TimedOut,
    Unparseable,
}

pub(crate) struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    local_ip: IpAddr,
    config: Arc<ServerConfig>,
    users: Arc<HashMap<String, String>>,
    log: Arc<TransferLog>,
    state: SessionState,
    cwd: PathBuf,
    data: Option<DataChannel>,
}

impl Session {
    /// Drive one control connection from greeting to teardown.
    pub(crate) async fn run(
        socket: TcpStream,
        config: Arc<ServerConfig>,
        users: Arc<HashMap<String, String>>,
        log: Arc<TransferLog>,
    ) -> std::io::Result<()> {
        let peer = socket.peer_addr()?;
        let local_ip = socket.local_addr()?.ip();
        log.message(&format!("Accepted connection from {peer}"));

        let cwd = std::env::current_dir()?;
        let (read_half, writer) = socket.into_split();

        // default data channel: passive listener when available, otherwise
        // active towards the historical client data port (control port + 1)
        let data = if config.pasv_mode {
            let (channel, _) = DataChannel::passive(local_ip, peer.ip()).await?;
            Some(channel)
        } else {
            Some(DataChannel::Active {
                addr: SocketAddr::new(peer.ip(), peer.port().wrapping_add(1)),
            })
        };

        let mut session = Self {
            reader: BufReader::new(read_half),
            writer,
            peer,
            local_ip,
            config,
            users,
            log,
            state: SessionState::PreAuth,
            cwd,
            data,
        };
        let result = session.command_loop().await;
        session
            .log
            .message(&format!("Closing connection to {}", session.peer));
        result
    }

    async fn command_loop(&mut self) -> std::io::Result<()> {
        self.write_reply(Reply::new(Status::Ready, "Welcome to the duetftp server."))
            .await?;

        loop {
            match self.read_command().await? {
                ReadOutcome::Eof => {
                    self.log
                        .message(&format!("Connection to {} closed", self.peer));
                    return Ok(());
                }
                ReadOutcome::TimedOut => {
                    self.write_reply(Reply::new(Status::NotAvailable, "Timeout."))
                        .await?;
                    return Ok(());
                }
                ReadOutcome::Unparseable => {
                    self.write_reply(Reply::new(Status::BadCommand, "Unrecognized command."))
                        .await?;
                }
                ReadOutcome::Cmd(cmd) => {
                    debug!("{} <- {cmd}", self.peer);
                    if let Flow::Quit = self.dispatch(cmd).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Read one command, bounded by the idle deadline.
    async fn read_command(&mut self) -> std::io::Result<ReadOutcome> {
        let mut line = String::new();
        match tokio::time::timeout(IDLE_TIMEOUT, self.reader.read_line(&mut line)).await {
            Err(_) => return Ok(ReadOutcome::TimedOut),
            Ok(Err(e)) => return Err(e),
            Ok(Ok(0)) => return Ok(ReadOutcome::Eof),
            Ok(Ok(_)) => {}
        }
        self.log.received(&line);

        match Command::parse(&line) {
            Ok(cmd) => Ok(ReadOutcome::Cmd(cmd)),
            Err(e) => {
                self.log.error(&e);
                Ok(ReadOutcome::Unparseable)
            }
        }
    }

    async fn write_reply(&mut self, reply: Reply) -> std::io::Result<()> {
        let wire = reply.to_wire();
        self.log.sent(&wire);
        self.writer
            .write_all(format!("{wire}\r\n").as_bytes())
            .await
    }

    /// Single dispatch point: the allow-list per state lives here, so a
    /// recognized command in the wrong state gets its `530` without any
    /// handler-table juggling.
    async fn dispatch(&mut self, cmd: Command) -> std::io::Result<Flow> {
        let arg = cmd.arg.as_str();
        match cmd.code {
            CommandCode::Quit => {
                self.write_reply(Reply::new(Status::Closing, "Goodbye.")).await?;
                return Ok(Flow::Quit);
            }
            CommandCode::User => self.handle_user(arg).await?,
            CommandCode::Pass => self.handle_pass(arg).await?,
            CommandCode::Help => self.handle_help(arg).await?,
            CommandCode::Other(ref code) => {
                self.write_reply(Reply::new(
                    Status::BadCommand,
                    format!("{code}: command not recognized."),
                ))
                .await?;
            }
            _ if !self.logged_in() => {
                self.write_reply(Reply::new(
                    Status::NotLoggedIn,
                    "Log in with USER and PASS first.",
                ))
                .await?;
            }
            CommandCode::Pwd => self.handle_pwd(arg).await?,
            CommandCode::Cwd => self.handle_cwd(arg).await?,
            CommandCode::Cdup => self.handle_cdup(arg).await?,
            CommandCode::Port => self.handle_port(arg).await?,
            CommandCode::Eprt => self.handle_eprt(arg).await?,
            CommandCode::Pasv => self.handle_pasv(arg).await?,
            CommandCode::Epsv => self.handle_epsv(arg).await?,
            CommandCode::List => self.handle_list(arg).await?,
            CommandCode::Retr => self.handle_retr(arg).await?,
        }
        Ok(Flow::Continue)
    }

    fn logged_in(&self) -> bool {
        matches!(self.state, SessionState::LoggedIn { .. })
    }

    async fn handle_user(&mut self, username: &str) -> std::io::Result<()> {
        if username.is_empty() {
            return self.write_error_args().await;
        }

        if let SessionState::LoggedIn { username: current } = &self.state {
            if current == username {
                return self
                    .write_reply(Reply::new(Status::LoggedIn, "User already logged in."))
                    .await;
            }
        }

        self.state = SessionState::AwaitPass {
            username: username.to_string(),
        };
        self.write_reply(Reply::new(
            Status::NeedPassword,
            format!("Username {username} accepted, please provide the password."),
        ))
        .await
    }

    async fn handle_pass(&mut self, password: &str) -> std::io::Result<()> {
        let username = match &self.state {
            SessionState::PreAuth => {
                return self
                    .write_reply(Reply::new(Status::BadSequence, "Log in with USER first."))
                    .await;
            }
            SessionState::AwaitPass { username } | SessionState::LoggedIn { username } => {
                username.clone()
            }
        };

        if self.users.get(&username).map(String::as_str) != Some(password) {
            self.state = SessionState::PreAuth;
            return self
                .write_reply(Reply::new(Status::NotLoggedIn, "Login incorrect."))
                .await;
        }

        self.log.message(&format!("User {username} logged in."));
        self.state = SessionState::LoggedIn { username };
        self.write_reply(Reply::new(Status::LoggedIn, "Login successful."))
            .await
    }

    async fn handle_pwd(&mut self, arg: &str) -> std::io::Result<()> {
        if !arg.is_empty() {
            return self.write_error_args().await;
        }

        let msg = format!("\"{}\" is the current directory.", self.cwd.display());
        self.write_reply(Reply::new(Status::PathCreated, msg)).await
    }

    async fn handle_cwd(&mut self, dir: &str) -> std::io::Result<()> {
        let path = resolve_path(&self.cwd, dir);

        let meta = match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                self.log.error(&e);
                return self
                    .write_reply(Reply::new(Status::FileUnavailable, "Directory change failed."))
                    .await;
            }
        };
        if !meta.is_dir() {
            return self
                .write_reply(Reply::new(
                    Status::FileUnavailable,
                    format!("{dir}: Not a directory."),
                ))
                .await;
        }

        self.cwd = path;
        self.write_reply(Reply::new(
            Status::RequestedFileActionOk,
            "Directory change successful.",
        ))
        .await
    }

    async fn handle_cdup(&mut self, arg: &str) -> std::io::Result<()> {
        if !arg.is_empty() {
            return self.write_error_args().await;
        }

        self.handle_cwd("..").await
    }

    async fn handle_port(&mut self, arg: &str) -> std::io::Result<()> {
        if !self.config.port_mode {
            return self
                .write_reply(Reply::new(Status::FileUnavailable, "PORT mode not available."))
                .await;
        }

        match addr::parse_host_port(arg) {
            Ok(target) => {
                self.set_active(SocketAddr::V4(target));
                self.write_reply(Reply::new(Status::CommandOk, "PORT command accepted."))
                    .await
            }
            Err(e) => {
                self.log.error(&e);
                self.write_error_args().await
            }
        }
    }

    async fn handle_eprt(&mut self, arg: &str) -> std::io::Result<()> {
        if !self.config.port_mode {
            return self
                .write_reply(Reply::new(Status::FileUnavailable, "EPRT mode not available"))
                .await;
        }

        match addr::parse_eprt(arg) {
            Ok(target) => {
                self.set_active(target);
                self.write_reply(Reply::new(Status::CommandOk, "EPRT command accepted."))
                    .await
            }
            Err(FtpError::InvalidAddressFamily) => {
                self.write_reply(Reply::new(
                    Status::UnsupportedAddressFamily,
                    "Unrecognized address family identifier.",
                ))
                .await
            }
            Err(e) => {
                self.log.error(&e);
                self.write_error_args().await
            }
        }
    }

    async fn handle_pasv(&mut self, arg: &str) -> std::io::Result<()> {
        if !self.config.pasv_mode {
            return self
                .write_reply(Reply::new(Status::FileUnavailable, "PASV mode not available"))
                .await;
        }
        if !arg.is_empty() {
            return self.write_error_args().await;
        }

        let port = match self.open_passive().await {
            Ok(port) => port,
            Err(e) => {
                self.log.error(&e);
                return self.write_error_internal().await;
            }
        };

        // the comma form can only carry IPv4; IPv6 peers must use EPSV
        let IpAddr::V4(host) = self.local_ip else {
            return self
                .write_reply(Reply::new(Status::NotAvailable, "PASV failed, use EPSV."))
                .await;
        };

        self.write_reply(Reply::new(
            Status::PassiveMode,
            format!(
                "Entering Passive Mode ({}).",
                addr::to_port_string(host, port)
            ),
        ))
        .await
    }

    async fn handle_epsv(&mut self, arg: &str) -> std::io::Result<()> {
        if !self.config.pasv_mode {
            return self
                .write_reply(Reply::new(Status::FileUnavailable, "PASV mode not available"))
                .await;
        }
        if !arg.is_empty() {
            return self.write_error_args().await;
        }

        match self.open_passive().await {
            Ok(port) => {
                self.write_reply(Reply::new(
                    Status::ExtendedPassiveMode,
                    format!("Entering Extended Passive Mode (|||{port}|)."),
                ))
                .await
            }
            Err(e) => {
                self.log.error(&e);
                self.write_reply(Reply::new(Status::NotAvailable, "EPSV command failed."))
                    .await
            }
        }
    }

    async fn handle_list(&mut self, arg: &str) -> std::io::Result<()> {
        let path = resolve_path(&self.cwd, arg);

        let meta = match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                self.log.error(&e);
                return self
                    .write_reply(Reply::new(Status::FileUnavailable, "Directory listing failed."))
                    .await;
            }
        };
        if !meta.is_dir() {
            return self
                .write_reply(Reply::new(
                    Status::FileUnavailable,
                    format!("{arg}: not a directory"),
                ))
                .await;
        }

        let listing = match list_directory(&path).await {
            Ok(listing) => listing,
            Err(e) => {
                self.log.error(&e);
                return self
                    .write_reply(Reply::new(Status::FileUnavailable, "Directory listing failed."))
                    .await;
            }
        };
        let payload = lf_to_crlf(listing.as_bytes());

        self.write_reply(Reply::new(
            Status::AboutToSend,
            "Here comes the directory listing.",
        ))
        .await?;

        if let Err(e) = self.send_data(&payload).await {
            self.log.error(&e);
            return self
                .write_reply(Reply::new(Status::ActionAborted, "Failed to open data connection."))
                .await;
        }

        self.write_reply(Reply::new(
            Status::ClosingDataConnection,
            "Listing successfully transfered.",
        ))
        .await
    }

    async fn handle_retr(&mut self, arg: &str) -> std::io::Result<()> {
        let path = resolve_path(&self.cwd, arg);

        let meta = match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) => meta,
            Err(_) => return self.write_error_file_action().await,
        };
        if !meta.is_file() {
            return self.write_error_file_action().await;
        }

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                self.log.error(&e);
                return self.write_error_file_action().await;
            }
        };
        let payload = lf_to_crlf(&contents);

        self.write_reply(Reply::new(Status::AboutToSend, "Here comes the file."))
            .await?;

        if let Err(e) = self.send_data(&payload).await {
            self.log.error(&e);
            return self
                .write_reply(Reply::new(Status::ActionAborted, "Error occurred in transfer."))
                .await;
        }

        self.write_reply(Reply::new(
            Status::ClosingDataConnection,
            "File transfered successfully.",
        ))
        .await
    }

    async fn handle_help(&mut self, arg: &str) -> std::io::Result<()> {
        if !arg.is_empty() {
            return self.write_error_args().await;
        }

        self.write_reply(Reply::new(Status::Help, HELP_TEXT)).await
    }

    /// Replace the data channel with an active target.
    fn set_active(&mut self, addr: SocketAddr) {
        self.log
            .message(&format!("Active data connection ready for {addr}"));
        self.data = Some(DataChannel::Active { addr });
    }

    /// Replace the data channel with a fresh passive listener; returns the
    /// port to advertise.
    async fn open_passive(&mut self) -> std::io::Result<u16> {
        let (channel, listen_addr) =
            DataChannel::passive(self.local_ip, self.peer.ip()).await?;
        self.log.message(&format!(
            "Passive data connection listening on port {}",
            listen_addr.port()
        ));
        self.data = Some(channel);
        Ok(listen_addr.port())
    }

    /// Push one payload through the configured data channel.
    ///
    /// An active configuration survives the transfer (each one dials afresh);
    /// a passive listener is consumed and must be re-established.
    async fn send_data(&mut self, payload: &[u8]) -> std::io::Result<()> {
        match self.data.take() {
            Some(DataChannel::Active { addr }) => {
                let result = data::send_active(addr, payload).await;
                self.data = Some(DataChannel::Active { addr });
                result
            }
            Some(DataChannel::Passive { listener, peer_ip }) => {
                data::send_passive(listener, peer_ip, payload).await
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "data connection not set up",
            )),
        }
    }

    async fn write_error_args(&mut self) -> std::io::Result<()> {
        self.write_reply(Reply::new(Status::BadArguments, "Error in arguments."))
            .await
    }

    async fn write_error_file_action(&mut self) -> std::io::Result<()> {
        self.write_reply(Reply::new(Status::FileUnavailable, "File action failed."))
            .await
    }

    async fn write_error_internal(&mut self) -> std::io::Result<()> {
        self.write_reply(Reply::new(Status::NotAvailable, "An internal error occurred."))
            .await
    }
}

/// Resolve a command argument against the working directory, lexically.
fn resolve_path(cwd: &Path, arg: &str) -> PathBuf {
    let path = Path::new(arg);
    if path.is_absolute() {
        lexical_clean(path)
    } else {
        lexical_clean(&cwd.join(path))
    }
}

/// Normalize `.` and `..` components without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            Component::Normal(_) | Component::Prefix(_) => out.push(component),
        }
    }
    out
}

/// Textual transfer framing: every line terminator goes out as CRLF, lone
/// LFs included.
fn lf_to_crlf(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut prev = 0u8;
    for &b in bytes {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
    out
}

#[cfg(test)]
mod test {

    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    struct TestClient {
        control: BufReader<TcpStream>,
        _log_dir: TempDir,
    }

    impl TestClient {
        async fn connect(config: ServerConfig) -> Self {
            let log_dir = TempDir::new().unwrap();
            let log =
                Arc::new(TransferLog::append(&log_dir.path().join("srv.log")).unwrap());
            let users = Arc::new(HashMap::from([
                (String::from("alice"), String::from("secret")),
                (String::from("bob"), String::from("hunter2")),
            ]));

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (socket, _) = listener.accept().await.unwrap();
                let _ = Session::run(socket, Arc::new(config), users, log).await;
            });

            let stream = TcpStream::connect(addr).await.unwrap();
            Self {
                control: BufReader::new(stream),
                _log_dir: log_dir,
            }
        }

        async fn login(config: ServerConfig) -> Self {
            let mut client = Self::connect(config).await;
            assert!(client.read_line().await.starts_with("220 "));
            client.send("USER alice").await;
            assert!(client.read_line().await.starts_with("331 "));
            client.send("PASS secret").await;
            assert_eq!(client.read_line().await, "230 Login successful.");
            client
        }

        async fn send(&mut self, line: &str) {
            self.control
                .get_mut()
                .write_all(format!("{line}\r\n").as_bytes())
                .await
                .unwrap();
        }

        async fn read_line(&mut self) -> String {
            let mut line = String::new();
            self.control.read_line(&mut line).await.unwrap();
            line.trim_end_matches(['\r', '\n']).to_string()
        }

        /// Read a complete reply; multi-line replies are accumulated until
        /// the `NNN ` terminator.
        async fn read_reply(&mut self) -> Vec<String> {
            let first = self.read_line().await;
            let mut lines = vec![first.clone()];
            if first.len() >= 4 && &first[3..4] == "-" {
                let code = &first[..3];
                loop {
                    let line = self.read_line().await;
                    let done = line.starts_with(code) && line[3..].starts_with(' ');
                    lines.push(line);
                    if done {
                        break;
                    }
                }
            }
            lines
        }
    }

    fn test_config() -> ServerConfig {
        ServerConfig {
            log_dir: PathBuf::new(),
            num_log_files: 5,
            users_file: PathBuf::new(),
            port_mode: true,
            pasv_mode: true,
        }
    }

    #[tokio::test]
    async fn should_login_and_print_working_directory() {
        let mut client = TestClient::connect(test_config()).await;
        assert_eq!(
            client.read_line().await,
            "220 Welcome to the duetftp server."
        );

        client.send("USER alice").await;
        assert_eq!(
            client.read_line().await,
            "331 Username alice accepted, please provide the password."
        );
        client.send("PASS secret").await;
        assert_eq!(client.read_line().await, "230 Login successful.");

        client.send("PWD").await;
        let startdir = std::env::current_dir().unwrap();
        assert_eq!(
            client.read_line().await,
            format!("257 \"{}\" is the current directory.", startdir.display())
        );

        client.send("QUIT").await;
        assert_eq!(client.read_line().await, "221 Goodbye.");
    }

    #[tokio::test]
    async fn should_reset_to_preauth_on_wrong_password() {
        let mut client = TestClient::connect(test_config()).await;
        client.read_line().await;

        client.send("USER alice").await;
        assert!(client.read_line().await.starts_with("331 "));
        client.send("PASS wrong").await;
        assert_eq!(client.read_line().await, "530 Login incorrect.");

        client.send("PWD").await;
        assert_eq!(
            client.read_line().await,
            "530 Log in with USER and PASS first."
        );
    }

    #[tokio::test]
    async fn should_refuse_every_privileged_command_before_login() {
        let mut client = TestClient::connect(test_config()).await;
        client.read_line().await;

        for command in [
            "PWD",
            "CWD /",
            "CDUP",
            "PORT 127,0,0,1,4,0",
            "EPRT |1|127.0.0.1|1024|",
            "PASV",
            "EPSV",
            "LIST",
            "RETR notes.txt",
        ] {
            client.send(command).await;
            assert_eq!(
                client.read_line().await,
                "530 Log in with USER and PASS first.",
                "command: {command}"
            );
        }
    }

    #[tokio::test]
    async fn should_answer_help_before_login() {
        let mut client = TestClient::connect(test_config()).await;
        client.read_line().await;

        client.send("HELP").await;
        let reply = client.read_reply().await;
        assert_eq!(reply.first().map(String::as_str), Some("214-"));
        assert!(reply.iter().any(|l| l.contains("USER   PASS")));
        assert_eq!(reply.last().map(String::as_str), Some("214 duetftp"));
    }

    #[tokio::test]
    async fn should_reject_unknown_and_unparseable_commands() {
        let mut client = TestClient::connect(test_config()).await;
        client.read_line().await;

        client.send("STOR notes.txt").await;
        assert_eq!(
            client.read_line().await,
            "500 STOR: command not recognized."
        );

        client.send("hi").await;
        assert_eq!(client.read_line().await, "500 Unrecognized command.");

        // the session survives both
        client.send("USER alice").await;
        assert!(client.read_line().await.starts_with("331 "));
    }

    #[tokio::test]
    async fn should_require_user_before_pass() {
        let mut client = TestClient::connect(test_config()).await;
        client.read_line().await;

        client.send("PASS secret").await;
        assert_eq!(client.read_line().await, "503 Log in with USER first.");
    }

    #[tokio::test]
    async fn should_drop_login_when_user_is_reissued() {
        let mut client = TestClient::login(test_config()).await;

        client.send("USER alice").await;
        assert_eq!(client.read_line().await, "230 User already logged in.");
        client.send("PWD").await;
        assert!(client.read_line().await.starts_with("257 "));

        client.send("USER bob").await;
        assert!(client.read_line().await.starts_with("331 "));
        client.send("PWD").await;
        assert_eq!(
            client.read_line().await,
            "530 Log in with USER and PASS first."
        );
    }

    #[tokio::test]
    async fn should_change_and_report_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("inner");
        fs::create_dir(&target).unwrap();

        let mut client = TestClient::login(test_config()).await;

        client.send(&format!("CWD {}", target.display())).await;
        assert_eq!(client.read_line().await, "250 Directory change successful.");
        client.send("PWD").await;
        assert_eq!(
            client.read_line().await,
            format!("257 \"{}\" is the current directory.", target.display())
        );

        client.send("CDUP").await;
        assert_eq!(client.read_line().await, "250 Directory change successful.");
        client.send("PWD").await;
        assert_eq!(
            client.read_line().await,
            format!("257 \"{}\" is the current directory.", dir.path().display())
        );
    }

    #[tokio::test]
    async fn should_report_missing_and_non_directories_on_cwd() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("plain.txt"), "x").unwrap();

        let mut client = TestClient::login(test_config()).await;

        client.send(&format!("CWD {}/absent", dir.path().display())).await;
        assert_eq!(client.read_line().await, "550 Directory change failed.");

        let file = dir.path().join("plain.txt");
        client.send(&format!("CWD {}", file.display())).await;
        assert_eq!(
            client.read_line().await,
            format!("550 {}: Not a directory.", file.display())
        );
    }

    #[tokio::test]
    async fn should_refuse_port_when_disabled() {
        let config = ServerConfig {
            port_mode: false,
            ..test_config()
        };
        let mut client = TestClient::login(config).await;

        client.send("PORT 127,0,0,1,4,0").await;
        assert_eq!(client.read_line().await, "550 PORT mode not available.");
    }

    #[tokio::test]
    async fn should_refuse_pasv_when_disabled() {
        let config = ServerConfig {
            pasv_mode: false,
            ..test_config()
        };
        let mut client = TestClient::login(config).await;

        client.send("PASV").await;
        assert_eq!(client.read_line().await, "550 PASV mode not available");
        client.send("EPSV").await;
        assert_eq!(client.read_line().await, "550 PASV mode not available");
    }

    #[tokio::test]
    async fn should_reject_unknown_eprt_family() {
        let mut client = TestClient::login(test_config()).await;

        client.send("EPRT |3|fe80::1|1234|").await;
        assert_eq!(
            client.read_line().await,
            "522 Unrecognized address family identifier."
        );
    }

    #[tokio::test]
    async fn should_reject_malformed_port_argument() {
        let mut client = TestClient::login(test_config()).await;

        client.send("PORT 300,0,0,1,4,0").await;
        assert_eq!(client.read_line().await, "501 Error in arguments.");
    }

    #[tokio::test]
    async fn should_list_directory_over_extended_passive_mode() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();

        let mut client = TestClient::login(test_config()).await;

        client.send("EPSV").await;
        let reply = client.read_line().await;
        assert!(reply.starts_with("229 Entering Extended Passive Mode (|||"));
        let port = crate::addr::parse_epsv_reply(&reply).unwrap();

        let mut data = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        client.send(&format!("LIST {}", dir.path().display())).await;
        assert_eq!(
            client.read_line().await,
            "150 Here comes the directory listing."
        );

        let mut listing = String::new();
        data.read_to_string(&mut listing).await.unwrap();
        assert!(listing.contains("notes.txt"));
        assert!(listing.contains("\r\n"));

        assert_eq!(
            client.read_line().await,
            "226 Listing successfully transfered."
        );
    }

    #[tokio::test]
    async fn should_transfer_file_over_port_mode() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "line one\nline two\n").unwrap();

        let mut client = TestClient::login(test_config()).await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        client
            .send(&format!("PORT 127,0,0,1,{},{}", port >> 8, port & 0xff))
            .await;
        assert_eq!(client.read_line().await, "200 PORT command accepted.");

        client.send(&format!("RETR {}", file.display())).await;
        assert_eq!(client.read_line().await, "150 Here comes the file.");

        let (mut data, _) = listener.accept().await.unwrap();
        let mut payload = Vec::new();
        data.read_to_end(&mut payload).await.unwrap();
        assert_eq!(payload.as_slice(), b"line one\r\nline two\r\n");

        assert_eq!(
            client.read_line().await,
            "226 File transfered successfully."
        );
    }

    #[tokio::test]
    async fn should_fail_retr_for_missing_or_non_files() {
        let dir = TempDir::new().unwrap();

        let mut client = TestClient::login(test_config()).await;

        client.send(&format!("RETR {}/absent.txt", dir.path().display())).await;
        assert_eq!(client.read_line().await, "550 File action failed.");

        client.send(&format!("RETR {}", dir.path().display())).await;
        assert_eq!(client.read_line().await, "550 File action failed.");
    }

    #[tokio::test]
    async fn should_list_over_legacy_passive_mode() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a\n").unwrap();

        let mut client = TestClient::login(test_config()).await;

        client.send("PASV").await;
        let reply = client.read_line().await;
        assert!(reply.starts_with("227 Entering Passive Mode ("));
        let addr = crate::addr::parse_pasv_reply(&reply).unwrap();

        let mut data = TcpStream::connect(addr).await.unwrap();
        client.send(&format!("LIST {}", dir.path().display())).await;
        assert!(client.read_line().await.starts_with("150 "));

        let mut listing = String::new();
        data.read_to_string(&mut listing).await.unwrap();
        assert!(listing.contains("a.txt"));

        assert!(client.read_line().await.starts_with("226 "));
    }

    #[tokio::test]
    async fn should_reject_arguments_to_no_arg_commands() {
        let mut client = TestClient::login(test_config()).await;

        for command in ["PWD extra", "CDUP extra", "PASV extra", "EPSV extra", "HELP extra"] {
            client.send(command).await;
            assert_eq!(
                client.read_line().await,
                "501 Error in arguments.",
                "command: {command}"
            );
        }
    }

    #[test]
    fn should_resolve_paths_lexically() {
        let cwd = Path::new("/srv/ftp");
        assert_eq!(resolve_path(cwd, "docs"), PathBuf::from("/srv/ftp/docs"));
        assert_eq!(resolve_path(cwd, "/etc"), PathBuf::from("/etc"));
        assert_eq!(resolve_path(cwd, ".."), PathBuf::from("/srv"));
        assert_eq!(resolve_path(cwd, "../.."), PathBuf::from("/"));
        assert_eq!(resolve_path(cwd, "./a/./b"), PathBuf::from("/srv/ftp/a/b"));
        assert_eq!(resolve_path(Path::new("/"), ".."), PathBuf::from("/"));
        assert_eq!(resolve_path(cwd, ""), PathBuf::from("/srv/ftp"));
    }

    #[test]
    fn should_convert_bare_line_feeds_only() {
        assert_eq!(lf_to_crlf(b"a\nb\n"), b"a\r\nb\r\n");
        assert_eq!(lf_to_crlf(b"a\r\nb"), b"a\r\nb");
        assert_eq!(lf_to_crlf(b"no newline"), b"no newline");
        assert_eq!(lf_to_crlf(b"\n"), b"\r\n");
    }
}
