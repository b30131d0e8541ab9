//! # FTP Regex
//!
//! Regular expressions to validate command lines and parse reply payloads

use lazy_regex::{lazy_regex, Lazy, Regex};

/// A syntactically valid command line: a 3 or 4 letter code, optionally
/// followed by spaces and an argument.
pub(crate) static COMMAND_LINE_RE: Lazy<Regex> = lazy_regex!(r"^[A-Za-z]{3,4} *.*");

/// This regex extracts the port number from an EPSV command reply.
/// The regex looks for the pattern (|||port_number|)
pub(crate) static EPSV_PORT_RE: Lazy<Regex> = lazy_regex!(r"\(\|\|\|(\d+)\|\)");
