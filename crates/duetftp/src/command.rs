//! # Command
//!
//! The command side of the control-channel wire codec.

use std::fmt;
use std::str::FromStr;

use crate::regex::COMMAND_LINE_RE;
use crate::types::{FtpError, FtpResult};

/// The character code naming a command.
///
/// Every code the parser can meet is representable: the thirteen commands the
/// dispatcher knows, plus [`CommandCode::Other`] for lines that are
/// syntactically valid commands but name nothing we implement. The parser
/// accepts those; rejecting them with a `500` is the dispatcher's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// Provide user to login as
    User,
    /// Provide login password
    Pass,
    /// Change working directory
    Cwd,
    /// Change directory to parent directory
    Cdup,
    /// Quit
    Quit,
    /// Passive mode
    Pasv,
    /// Extended passive mode <https://www.rfc-editor.org/rfc/rfc2428#section-3>
    Epsv,
    /// Specifies an address and port to which the server should connect (active mode)
    Port,
    /// Extended active mode, address-family aware
    Eprt,
    /// Retrieve file
    Retr,
    /// Print working directory
    Pwd,
    /// List entries at specified path
    List,
    /// Ask the server for its supported commands
    Help,
    /// A syntactically valid code with no handler (kept verbatim, uppercased)
    Other(String),
}

impl CommandCode {
    /// The uppercase wire form of the code
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "USER",
            Self::Pass => "PASS",
            Self::Cwd => "CWD",
            Self::Cdup => "CDUP",
            Self::Quit => "QUIT",
            Self::Pasv => "PASV",
            Self::Epsv => "EPSV",
            Self::Port => "PORT",
            Self::Eprt => "EPRT",
            Self::Retr => "RETR",
            Self::Pwd => "PWD",
            Self::List => "LIST",
            Self::Help => "HELP",
            Self::Other(code) => code.as_str(),
        }
    }
}

impl From<&str> for CommandCode {
    fn from(s: &str) -> Self {
        let code = s.to_ascii_uppercase();
        match code.as_str() {
            "USER" => Self::User,
            "PASS" => Self::Pass,
            "CWD" => Self::Cwd,
            "CDUP" => Self::Cdup,
            "QUIT" => Self::Quit,
            "PASV" => Self::Pasv,
            "EPSV" => Self::Epsv,
            "PORT" => Self::Port,
            "EPRT" => Self::Eprt,
            "RETR" => Self::Retr,
            "PWD" => Self::Pwd,
            "LIST" => Self::List,
            "HELP" => Self::Help,
            _ => Self::Other(code),
        }
    }
}

impl FromStr for CommandCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command PDU: a code and its raw argument, which may be empty.
///
/// `Display` renders the wire form without the trailing CRLF; the control
/// channel appends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub code: CommandCode,
    pub arg: String,
}

impl Command {
    /// Instantiates a new `Command`
    pub fn new(code: CommandCode, arg: impl Into<String>) -> Self {
        Self {
            code,
            arg: arg.into(),
        }
    }

    /// Parse one control-channel line into a command.
    ///
    /// The trailing CRLF is stripped, the code is uppercased and the argument
    /// is kept verbatim after the first space. Lines that do not look like a
    /// command at all yield [`FtpError::UnparseableCommand`].
    pub fn parse(line: &str) -> FtpResult<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if !COMMAND_LINE_RE.is_match(line) {
            return Err(FtpError::UnparseableCommand(line.to_string()));
        }

        let (code, arg) = match line.find(' ') {
            Some(ind) => (&line[..ind], &line[ind + 1..]),
            None => (line, ""),
        };

        Ok(Self {
            code: CommandCode::from(code),
            arg: arg.to_string(),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arg.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.arg)
        }
    }
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn should_parse_command_with_argument() {
        let cmd = Command::parse("USER alice\r\n").unwrap();
        assert_eq!(cmd.code, CommandCode::User);
        assert_eq!(cmd.arg.as_str(), "alice");
    }

    #[test]
    fn should_uppercase_code_but_not_argument() {
        let cmd = Command::parse("retr Notes.TXT\r\n").unwrap();
        assert_eq!(cmd.code, CommandCode::Retr);
        assert_eq!(cmd.arg.as_str(), "Notes.TXT");
    }

    #[test]
    fn should_parse_command_without_argument() {
        let cmd = Command::parse("PWD\r\n").unwrap();
        assert_eq!(cmd.code, CommandCode::Pwd);
        assert_eq!(cmd.arg.as_str(), "");
    }

    #[test]
    fn should_keep_argument_spaces_verbatim() {
        let cmd = Command::parse("CWD my dir\r\n").unwrap();
        assert_eq!(cmd.code, CommandCode::Cwd);
        assert_eq!(cmd.arg.as_str(), "my dir");
    }

    #[test]
    fn should_accept_unknown_codes() {
        let cmd = Command::parse("STOR file.txt\r\n").unwrap();
        assert_eq!(cmd.code, CommandCode::Other(String::from("STOR")));
        assert_eq!(cmd.arg.as_str(), "file.txt");
    }

    #[test]
    fn should_reject_unparseable_lines() {
        assert!(matches!(
            Command::parse("hi\r\n"),
            Err(FtpError::UnparseableCommand(_))
        ));
        assert!(matches!(
            Command::parse("1234 arg\r\n"),
            Err(FtpError::UnparseableCommand(_))
        ));
    }

    #[test]
    fn should_stringify_command() {
        assert_eq!(
            Command::new(CommandCode::User, "alice").to_string().as_str(),
            "USER alice"
        );
        assert_eq!(Command::new(CommandCode::Pasv, "").to_string().as_str(), "PASV");
        assert_eq!(
            Command::new(CommandCode::List, "/tmp").to_string().as_str(),
            "LIST /tmp"
        );
    }
}
