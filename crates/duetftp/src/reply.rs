//! # Reply
//!
//! The reply side of the control-channel wire codec: a 3-digit status plus a
//! message, serialized either as a single line or as the tab-indented
//! multi-line form.

use std::fmt;

use thiserror::Error;

use crate::status::Status;

/// Identifier emitted as the trailer of multi-line replies.
const SERVER_IDENT: &str = "duetftp";

/// A reply PDU from an FTP server.
///
/// For multi-line replies the message holds every received line after the
/// opening `NNN-`, joined with `\n`, including the terminator line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct Reply {
    pub status: Status,
    pub message: String,
}

impl Reply {
    /// Instantiates a new `Reply`
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Serialize for the wire, without the final CRLF (the control channel
    /// appends it).
    ///
    /// A message with embedded newlines becomes the multi-line form: the bare
    /// `NNN-` opener, every message line prefixed with a tab so it cannot be
    /// mistaken for a terminator, and a `NNN <ident>` trailer.
    pub fn to_wire(&self) -> String {
        let msg = self.message.trim_matches('\n');
        if msg.contains('\n') {
            let code = self.status.code();
            let mut wire = format!("{code}-\r\n");
            for line in msg.split('\n') {
                wire.push('\t');
                wire.push_str(line);
                wire.push_str("\r\n");
            }
            wire.push_str(&format!("{code} {SERVER_IDENT}"));
            return wire;
        }

        format!("{} {}", self.status.code(), msg)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.contains('\n') {
            write!(f, "{}-\n{}", self.status.code(), self.message)
        } else {
            write!(f, "{} {}", self.status.code(), self.message)
        }
    }
}

/// Returns the status code if `line` is a terminator or single-line reply
/// (`NNN<space>`).
pub fn single_line_code(line: &str) -> Option<u16> {
    split_reply_code(line, b' ')
}

/// Returns the status code if `line` opens a multi-line reply (`NNN-`).
pub fn multi_line_code(line: &str) -> Option<u16> {
    split_reply_code(line, b'-')
}

fn split_reply_code(line: &str, delim: u8) -> Option<u16> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 || bytes[3] != delim {
        return None;
    }
    if !bytes[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    line[..3].parse().ok()
}
