#![crate_name = "duetftp"]
#![crate_type = "lib"]

//! # duetftp
//!
//! duetftp implements both halves of the classic FTP dual-channel dance:
//! a server that accepts concurrent control connections and an interactive
//! client, sharing one set of wire codecs.
//!
//! The crate is split along the protocol seams:
//!
//! - [`command`] and [`reply`] implement the control-channel wire formats
//!   (RFC 959 command lines, single- and multi-line replies)
//! - [`addr`] converts endpoints to and from the `PORT`/`PASV` comma form
//!   and the `EPRT`/`EPSV` delimited form (RFC 2428)
//! - [`client`] provides the synchronous control channel and the one-shot
//!   client data channel (active listener or passive dial)
//! - [`server`] provides the async accept loop, the per-session state
//!   machine, and the one-shot server data channel
//! - [`config`] and [`logger`] cover the server configuration file and the
//!   rolling transfer log both binaries write their transcripts to
//!
//! The two ends deliberately use different I/O flavors: the client drives a
//! single interactive session and stays synchronous, the server handles many
//! sessions and runs on tokio.

// -- private
mod regex;

// -- public
pub mod addr;
pub mod client;
pub mod command;
pub mod config;
pub mod logger;
pub mod reply;
pub mod server;
pub mod status;
pub mod types;

pub use command::{Command, CommandCode};
pub use logger::TransferLog;
pub use reply::Reply;
pub use status::Status;
pub use types::{FtpError, FtpResult, Mode};
