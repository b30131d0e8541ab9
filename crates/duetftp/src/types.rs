//! # Types
//!
//! Common result, error and mode types shared by the client and server halves.

use thiserror::Error;

use crate::reply::Reply;

/// A shorthand for a Result whose error type is always an [`FtpError`].
pub type FtpResult<T> = std::result::Result<T, FtpError>;

/// `FtpError` is the crate-global error type for everything that can go wrong
/// while speaking FTP: socket failures, codec violations and protocol-level
/// surprises.
#[derive(Debug, Error)]
pub enum FtpError {
    /// I/O failure on a control or data socket
    #[error("Connection error: {0}")]
    ConnectionError(std::io::Error),
    /// A command line that does not match `^[A-Za-z]{3,4} *.*`
    #[error("Unrecognized command: {0}")]
    UnparseableCommand(String),
    /// A reply line that opens with neither `NNN ` nor `NNN-`
    #[error("a malformed reply was received from the server")]
    MalformedReply,
    /// A `PORT`/`PASV`/`EPRT`/`EPSV` argument that does not decode to an endpoint
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// An `EPRT` protocol family other than `1` (IPv4) or `2` (IPv6); maps to reply 522
    #[error("unrecognized address family identifier")]
    InvalidAddressFamily,
    /// A broken `ftpserver.config` or users file
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A per-operation deadline expired
    #[error("timeout reached, connection closed")]
    Timeout,
    /// The server answered with a reply the current exchange cannot accept
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(Reply),
}

/// Connection mode for the client data channel.
///
/// `Unset` exists so a session can refuse transfers before the user has
/// picked a mode explicitly or implicitly; freshly started sessions default
/// to `Active` like historical clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Active,
    Passive,
    Unset,
}
