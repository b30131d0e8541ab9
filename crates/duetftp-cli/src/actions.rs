//! # Actions
//!
//! The interactive session engine: one method per console command, each
//! driving the control-channel exchange, classifying the replies and, for
//! transfers, sequencing the data channel around the command.
//!
//! Every received reply is printed raw before any classification message, so
//! the user always sees the server's own words. Recoverable failures return
//! to the prompt; `421`, unrecognized reply codes and control-channel I/O
//! failures terminate the process.

use std::io::{self, BufRead, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::process::exit;

use duetftp::addr;
use duetftp::client::data::ClientDataConn;
use duetftp::client::ControlConn;
use duetftp::{Command, CommandCode, FtpError, FtpResult, Mode, Reply, Status};

pub struct FtpClient {
    control: ControlConn,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    mode: Mode,
    extended: bool,
}

impl FtpClient {
    /// Classify the server greeting and wrap the control connection.
    ///
    /// `220` proceeds immediately; `120` waits for the follow-up `220`;
    /// anything else aborts the session.
    pub fn startup(mut control: ControlConn, greeting: &Reply) -> FtpResult<Self> {
        match greeting.status {
            Status::Ready => {}
            Status::ReadyMinute => {
                let reply = control.read_reply()?;
                println!("{reply}");
                if reply.status != Status::Ready {
                    println!("Connection failed: {reply}");
                    return Err(FtpError::UnexpectedReply(reply));
                }
            }
            _ => return Err(FtpError::UnexpectedReply(greeting.clone())),
        }

        let local_addr = control.local_addr()?;
        let remote_addr = control.peer_addr()?;
        Ok(Self {
            control,
            local_addr,
            remote_addr,
            mode: Mode::default(),
            extended: false,
        })
    }

    /// Prompt for credentials and drive the USER/PASS exchange.
    pub fn login(&mut self) -> FtpResult<()> {
        print!("Username: ");
        let _ = io::stdout().flush();
        let mut username = String::new();
        io::stdin()
            .lock()
            .read_line(&mut username)
            .map_err(FtpError::ConnectionError)?;

        let reply = self
            .control
            .send_then_read(&Command::new(CommandCode::User, username.trim_end()))?;
        println!("{reply}");
        match reply.status {
            // already logged in, no password needed
            Status::LoggedIn => return Ok(()),
            Status::NeedPassword => {}
            Status::LoginNeedAccount => {
                self.close_and_exit("Log in with accounts is not supported. Exiting.")
            }
            Status::BadCommand | Status::BadArguments | Status::NotLoggedIn
            | Status::NotAvailable => self.close_and_exit("Exiting."),
            _ => self.close_and_exit("Unrecognized response, exiting"),
        }

        let password =
            rpassword::prompt_password("Password: ").map_err(FtpError::ConnectionError)?;
        let reply = self
            .control
            .send_then_read(&Command::new(CommandCode::Pass, password))?;
        println!("{reply}");
        match reply.status {
            Status::LoggedIn | Status::CommandNotImplemented => Ok(()),
            Status::NotLoggedIn => self.close_and_exit("Login failed. Exiting."),
            Status::BadArguments => self.close_and_exit("Error in parameters. Exiting."),
            Status::BadCommand
            | Status::BadSequence
            | Status::NotAvailable
            | Status::LoginNeedAccount => self.close_and_exit("Exiting"),
            _ => self.close_and_exit("Unrecognized response, exiting"),
        }
    }

    pub fn cd(&mut self, path: &str) {
        let Some(reply) = self.exchange(Command::new(CommandCode::Cwd, path)) else {
            return;
        };
        match reply.status {
            Status::RequestedFileActionOk => {}
            Status::BadCommand | Status::NotImplemented | Status::FileUnavailable => {
                println!("Command failed.")
            }
            Status::BadArguments => println!("Error in parameters."),
            Status::NotAvailable => self.close_and_exit("Exiting."),
            _ => self.close_and_exit("Unrecognized reply, exiting."),
        }
    }

    pub fn cdup(&mut self) {
        let Some(reply) = self.exchange(Command::new(CommandCode::Cdup, "")) else {
            return;
        };
        match reply.status {
            Status::CommandOk | Status::RequestedFileActionOk => {}
            Status::BadCommand | Status::NotImplemented | Status::FileUnavailable => {
                println!("Command failed.")
            }
            Status::BadArguments => println!("Error in parameters."),
            Status::NotAvailable => self.close_and_exit("Exiting."),
            _ => self.close_and_exit("Unrecognized reply, exiting."),
        }
    }

    pub fn pwd(&mut self) {
        let Some(reply) = self.exchange(Command::new(CommandCode::Pwd, "")) else {
            return;
        };
        match reply.status {
            Status::PathCreated => {}
            Status::BadCommand | Status::NotImplemented | Status::FileUnavailable => {
                println!("Command failed.")
            }
            Status::BadArguments => println!("Error in parameters."),
            Status::NotAvailable => self.close_and_exit("Exiting."),
            _ => self.close_and_exit("Unrecognized reply, exiting."),
        }
    }

    pub fn help(&mut self) {
        let Some(reply) = self.exchange(Command::new(CommandCode::Help, "")) else {
            return;
        };
        match reply.status {
            Status::System | Status::Help => {}
            Status::BadCommand | Status::NotImplemented => println!("Command failed."),
            Status::BadArguments => println!("Error in parameters."),
            Status::NotAvailable => self.close_and_exit("Exiting."),
            _ => self.close_and_exit("Unrecognized reply, exiting."),
        }
    }

    /// List `path` (or the remote working directory) and print the listing.
    pub fn ls(&mut self, path: Option<&str>) {
        let Some(data) = self.open_data_conn() else {
            return;
        };

        let Some(reply) = self.exchange(Command::new(CommandCode::List, path.unwrap_or("")))
        else {
            return;
        };
        match reply.status {
            Status::AlreadyOpen | Status::AboutToSend => match data.read() {
                Ok(bytes) => print!("{}", String::from_utf8_lossy(&bytes)),
                Err(e) => {
                    println!("Reading from data connection: {e}");
                    return;
                }
            },
            Status::RequestFileActionIgnored
            | Status::BadCommand
            | Status::NotImplemented
            | Status::NotLoggedIn
            | Status::FileUnavailable => {
                println!("Command failed.");
                return;
            }
            Status::BadArguments => {
                println!("Error in parameters.");
                return;
            }
            Status::NotAvailable => self.close_and_exit("Exiting."),
            _ => self.close_and_exit("Unrecognized reply, exiting."),
        }

        self.finish_transfer();
    }

    /// Download `file` into the local working directory under its base name.
    pub fn get(&mut self, file: &str) {
        let Some(data) = self.open_data_conn() else {
            return;
        };

        let Some(reply) = self.exchange(Command::new(CommandCode::Retr, file)) else {
            return;
        };
        let bytes = match reply.status {
            Status::AlreadyOpen | Status::AboutToSend => match data.read() {
                Ok(bytes) => bytes,
                Err(e) => {
                    println!("An unexpected error occurred: {e}");
                    return;
                }
            },
            Status::RequestFileActionIgnored
            | Status::FileUnavailable
            | Status::BadCommand
            | Status::NotImplemented
            | Status::NotLoggedIn => {
                println!("Command failed.");
                return;
            }
            Status::BadArguments => {
                println!("Invalid parameters.");
                return;
            }
            Status::NotAvailable => self.close_and_exit("Exiting."),
            _ => self.close_and_exit("Unrecognized reply, exiting."),
        };

        if !self.finish_transfer() {
            return;
        }

        let Some(name) = Path::new(file).file_name() else {
            println!("Failed to write file: no file name in {file}");
            return;
        };
        if let Err(e) = std::fs::write(name, bytes) {
            println!("Failed to write file: {e}");
        }
    }

    /// Send QUIT and terminate.
    pub fn quit(&mut self) -> ! {
        match self.control.send_then_read(&Command::new(CommandCode::Quit, "")) {
            Ok(reply) => println!("{reply}"),
            Err(e) => println!("An unexpected error occurred: {e}"),
        }
        let _ = self.control.shutdown();
        exit(0)
    }

    pub fn set_mode(&mut self, mode: Mode) {
        match mode {
            Mode::Passive => println!("Switching to passive mode..."),
            Mode::Active => println!("Switching to active mode..."),
            Mode::Unset => {}
        }
        self.mode = mode;
    }

    pub fn set_extended(&mut self, on: bool) {
        if on {
            println!("Extended configuration commands will be preferred.");
        } else {
            println!("Legacy configuration commands will be preferred.");
        }
        self.extended = on;
    }

    // -- transfer plumbing

    /// Read and classify the terminal reply of a transfer. Returns whether
    /// the transfer completed.
    fn finish_transfer(&mut self) -> bool {
        let reply = match self.control.read_reply() {
            Ok(reply) => reply,
            Err(e) => {
                println!("An unexpected error occurred: {e}");
                return false;
            }
        };
        println!("{reply}");
        match reply.status {
            Status::ClosingDataConnection | Status::RequestedFileActionOk => true,
            Status::CannotOpenDataConnection
            | Status::TransferAborted
            | Status::ActionAborted
            | Status::FileUnavailable => {
                println!("Command failed.");
                false
            }
            _ => self.close_and_exit("Unrecognized reply, exiting."),
        }
    }

    /// Set up the data channel for the next transfer using the session's
    /// mode, issuing the matching configuration command.
    fn open_data_conn(&mut self) -> Option<ClientDataConn> {
        let result = match self.mode {
            Mode::Active => self.init_active_data_conn(),
            Mode::Passive => self.init_passive_data_conn(),
            Mode::Unset => Err(FtpError::InvalidConfig(String::from(
                "no data connection mode selected",
            ))),
        };
        match result {
            Ok(conn) => Some(conn),
            Err(e) => {
                println!("An unexpected error occurred: {e}");
                None
            }
        }
    }

    /// Open a listener and advertise it with PORT or EPRT.
    fn init_active_data_conn(&mut self) -> FtpResult<ClientDataConn> {
        let (conn, listen_addr) = ClientDataConn::active()?;
        self.issue_port_command(self.local_addr.ip(), listen_addr.port())?;
        Ok(conn)
    }

    /// Pick PORT or EPRT: extended mode always uses EPRT, and IPv6 cannot be
    /// expressed in the legacy comma form at all.
    fn issue_port_command(&mut self, ip: IpAddr, port: u16) -> FtpResult<()> {
        match ip {
            IpAddr::V4(v4) if !self.extended => self.command_port(v4, port),
            _ => self.command_eprt(ip, port),
        }
    }

    fn command_port(&mut self, ip: Ipv4Addr, port: u16) -> FtpResult<()> {
        let arg = addr::to_port_string(ip, port);
        let reply = self
            .control
            .send_then_read(&Command::new(CommandCode::Port, arg))?;
        match reply.status {
            Status::CommandOk => Ok(()),
            Status::BadCommand
            | Status::BadArguments
            | Status::NotLoggedIn
            | Status::FileUnavailable => {
                println!("{reply}");
                Err(FtpError::UnexpectedReply(reply))
            }
            Status::NotAvailable => {
                println!("{reply}");
                self.close_and_exit("Exiting.")
            }
            _ => {
                println!("{reply}");
                self.close_and_exit("Unrecognized response. Exiting.")
            }
        }
    }

    fn command_eprt(&mut self, ip: IpAddr, port: u16) -> FtpResult<()> {
        let arg = addr::to_eprt_string(ip, port);
        let reply = self
            .control
            .send_then_read(&Command::new(CommandCode::Eprt, arg))?;
        match reply.status {
            Status::CommandOk => Ok(()),
            Status::BadCommand
            | Status::BadArguments
            | Status::NotLoggedIn
            | Status::UnsupportedAddressFamily
            | Status::FileUnavailable => {
                println!("{reply}");
                Err(FtpError::UnexpectedReply(reply))
            }
            Status::NotAvailable => {
                println!("{reply}");
                self.close_and_exit("Exiting.")
            }
            _ => {
                println!("{reply}");
                self.close_and_exit("Unrecognized response. Exiting.")
            }
        }
    }

    /// Ask the server for a passive endpoint and dial it.
    fn init_passive_data_conn(&mut self) -> FtpResult<ClientDataConn> {
        let target = if self.extended {
            let msg = self.command_epsv()?;
            let port = addr::parse_epsv_reply(&msg)?;
            SocketAddr::new(self.remote_addr.ip(), port)
        } else {
            let msg = self.command_pasv()?;
            SocketAddr::V4(addr::parse_pasv_reply(&msg)?)
        };
        ClientDataConn::passive(target)
    }

    fn command_pasv(&mut self) -> FtpResult<String> {
        let reply = self
            .control
            .send_then_read(&Command::new(CommandCode::Pasv, ""))?;
        println!("{reply}");
        match reply.status {
            Status::PassiveMode => Ok(reply.message),
            Status::BadCommand
            | Status::BadArguments
            | Status::NotImplemented
            | Status::NotLoggedIn
            | Status::FileUnavailable => Err(FtpError::UnexpectedReply(reply)),
            Status::NotAvailable => self.close_and_exit("Exiting."),
            _ => self.close_and_exit("Unrecognized reply, exiting."),
        }
    }

    fn command_epsv(&mut self) -> FtpResult<String> {
        let reply = self
            .control
            .send_then_read(&Command::new(CommandCode::Epsv, ""))?;
        println!("{reply}");
        match reply.status {
            Status::ExtendedPassiveMode => Ok(reply.message),
            Status::BadCommand
            | Status::BadArguments
            | Status::NotLoggedIn
            | Status::UnsupportedAddressFamily
            | Status::FileUnavailable => Err(FtpError::UnexpectedReply(reply)),
            Status::NotAvailable => self.close_and_exit("Exiting."),
            _ => self.close_and_exit("Unrecognized reply, exiting."),
        }
    }

    // -- helpers

    /// Issue a command, print the raw reply, surface I/O failures.
    fn exchange(&mut self, cmd: Command) -> Option<Reply> {
        match self.control.send_then_read(&cmd) {
            Ok(reply) => {
                println!("{reply}");
                Some(reply)
            }
            Err(e) => {
                println!("An unknown error occurred: {e}");
                None
            }
        }
    }

    fn close_and_exit(&mut self, msg: &str) -> ! {
        if !msg.is_empty() {
            println!("{msg}");
        }
        let _ = self.control.shutdown();
        exit(1)
    }
}
