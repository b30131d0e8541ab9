//! # Status
//!
//! The subset of RFC 959/2428 reply codes spoken by this implementation.

use thiserror::Error;

#[derive(Debug, Copy, Clone, Error, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u16)]
/// Ftp status sent or received in a reply
pub enum Status {
    // 1xx: Positive Preliminary Reply
    #[error("service ready in (n) minutes")]
    ReadyMinute = 120,
    #[error("data connection already open, transfer starting")]
    AlreadyOpen = 125,
    #[error("file status okay, about to open data connection")]
    AboutToSend = 150,
    // 2xx: Positive Completion Reply
    #[error("command okay")]
    CommandOk = 200,
    #[error("command not implemented, superfluous at this site")]
    CommandNotImplemented = 202,
    #[error("system status, or system help reply")]
    System = 211,
    #[error("help message")]
    Help = 214,
    #[error("service ready for new user")]
    Ready = 220,
    #[error("service closing control connection")]
    Closing = 221,
    #[error("closing data connection")]
    ClosingDataConnection = 226,
    #[error("entering passive mode")]
    PassiveMode = 227,
    #[error("entering extended passive mode")]
    ExtendedPassiveMode = 229,
    #[error("user logged in, proceed")]
    LoggedIn = 230,
    #[error("requested file action okay")]
    RequestedFileActionOk = 250,
    #[error("pathname created")]
    PathCreated = 257,
    // 3xx: Positive Intermediate Reply
    #[error("user name okay, need password")]
    NeedPassword = 331,
    #[error("need account for login")]
    LoginNeedAccount = 332,
    // 4xx: Transient Negative Completion Reply
    #[error("service not available, closing control connection")]
    NotAvailable = 421,
    #[error("can't open data connection")]
    CannotOpenDataConnection = 425,
    #[error("connection closed; transfer aborted")]
    TransferAborted = 426,
    #[error("requested file action not taken")]
    RequestFileActionIgnored = 450,
    #[error("requested action aborted; local error in processing")]
    ActionAborted = 451,
    // 5xx: Permanent Negative Completion Reply
    #[error("syntax error, command unrecognized")]
    BadCommand = 500,
    #[error("syntax error in parameters or arguments")]
    BadArguments = 501,
    #[error("command not implemented")]
    NotImplemented = 502,
    #[error("bad sequence of commands")]
    BadSequence = 503,
    #[error("network protocol not supported")]
    UnsupportedAddressFamily = 522,
    #[error("user not logged in")]
    NotLoggedIn = 530,
    #[error("requested action not taken; file unavailable")]
    FileUnavailable = 550,
    #[error("unknown status code")]
    Unknown = 0,
}

impl Status {
    /// Get the 3-digit status code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the status description
    pub fn desc(&self) -> String {
        self.to_string()
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        match code {
            120 => Self::ReadyMinute,
            125 => Self::AlreadyOpen,
            150 => Self::AboutToSend,
            200 => Self::CommandOk,
            202 => Self::CommandNotImplemented,
            211 => Self::System,
            214 => Self::Help,
            220 => Self::Ready,
            221 => Self::Closing,
            226 => Self::ClosingDataConnection,
            227 => Self::PassiveMode,
            229 => Self::ExtendedPassiveMode,
            230 => Self::LoggedIn,
            250 => Self::RequestedFileActionOk,
            257 => Self::PathCreated,
            331 => Self::NeedPassword,
            332 => Self::LoginNeedAccount,
            421 => Self::NotAvailable,
            425 => Self::CannotOpenDataConnection,
            426 => Self::TransferAborted,
            450 => Self::RequestFileActionIgnored,
            451 => Self::ActionAborted,
            500 => Self::BadCommand,
            501 => Self::BadArguments,
            502 => Self::NotImplemented,
            503 => Self::BadSequence,
            522 => Self::UnsupportedAddressFamily,
            530 => Self::NotLoggedIn,
            550 => Self::FileUnavailable,
            _ => Self::Unknown,
        }
    }
}
