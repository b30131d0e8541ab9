//! # ftpclient
//!
//! The interactive duetftp client: connects to a server, walks the login
//! dialogue, then drops into a command prompt. Every byte that crosses the
//! control channel is transcribed to the log file named on the command line.

mod actions;
mod command;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use argh::FromArgs;

use actions::FtpClient;
use command::Command;
use duetftp::client::ControlConn;
use duetftp::{Mode, TransferLog};

#[derive(FromArgs)]
#[argh(description = "interactive duetftp client")]
struct Args {
    #[argh(positional, description = "host to connect to")]
    host: String,
    #[argh(positional, description = "file to write the session transcript to")]
    logfile: String,
    #[argh(positional, default = "21", description = "control port (default 21)")]
    port: u16,
}

fn main() -> Result<()> {
    env_logger::init();
    let args: Args = argh::from_env();

    let log = Arc::new(
        TransferLog::append(Path::new(&args.logfile))
            .with_context(|| format!("opening log file {}", args.logfile))?,
    );

    let (control, greeting) = ControlConn::dial(&args.host, args.port, log)
        .with_context(|| format!("connecting to {}:{}", args.host, args.port))?;
    println!("{greeting}");

    let mut client = FtpClient::startup(control, &greeting).context("connection failed")?;
    client.login()?;

    repl(&mut client)
}

fn repl(client: &mut FtpClient) -> Result<()> {
    let stdin = io::stdin();
    loop {
        print!("ftp> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("reading standard input")? == 0 {
            bail!("standard input closed");
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(cmd) => dispatch(client, cmd),
            Err(msg) => println!("{msg}"),
        }
    }
}

fn dispatch(client: &mut FtpClient, cmd: Command) {
    match cmd {
        Command::Cd(path) => client.cd(&path),
        Command::Cdup => client.cdup(),
        Command::Pwd => client.pwd(),
        Command::Ls(path) => client.ls(path.as_deref()),
        Command::Get(file) => client.get(&file),
        Command::Passive => client.set_mode(Mode::Passive),
        Command::Active => client.set_mode(Mode::Active),
        Command::Extended(on) => client.set_extended(on),
        Command::Help => client.help(),
        Command::Quit => client.quit(),
    }
}
