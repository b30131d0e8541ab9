//! # Addr
//!
//! Conversions between socket endpoints and the four wire encodings used to
//! negotiate data channels: the RFC 959 comma form (`PORT` arguments and
//! `PASV` replies) and the RFC 2428 delimited form (`EPRT` arguments and
//! `EPSV` replies).

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::regex::EPSV_PORT_RE;
use crate::types::{FtpError, FtpResult};

/// Encode an IPv4 endpoint into the `a,b,c,d,p1,p2` comma form, with `p1`
/// carrying the high byte of the port.
pub fn to_port_string(ip: Ipv4Addr, port: u16) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{a},{b},{c},{d},{},{}", port >> 8, port & 0xff)
}

/// Decode the `a,b,c,d,p1,p2` comma form into an endpoint.
///
/// Exactly six fields are required and every field must fit in one byte.
pub fn parse_host_port(arg: &str) -> FtpResult<SocketAddrV4> {
    let fields = arg
        .split(',')
        .map(|f| f.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| FtpError::InvalidAddress(arg.to_string()))?;

    let &[a, b, c, d, p1, p2] = fields.as_slice() else {
        return Err(FtpError::InvalidAddress(arg.to_string()));
    };

    let port = u16::from(p1) * 256 + u16::from(p2);
    Ok(SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), port))
}

/// Encode an endpoint into the `|proto|addr|port|` form for `EPRT`.
///
/// The IPv6 loopback is rewritten to `127.0.0.1`: servers commonly refuse
/// `::1` as an EPRT target, and a loopback peer is reachable either way.
pub fn to_eprt_string(ip: IpAddr, port: u16) -> String {
    match ip {
        IpAddr::V4(v4) => format!("|1|{v4}|{port}|"),
        IpAddr::V6(v6) if v6.is_loopback() => format!("|1|127.0.0.1|{port}|"),
        IpAddr::V6(v6) => format!("|2|{v6}|{port}|"),
    }
}

/// Decode an `EPRT` argument of the form `<d>proto<d>addr<d>port<d>`, where
/// the delimiter is whatever character the argument opens with.
///
/// A protocol field other than `1` (IPv4) or `2` (IPv6) yields
/// [`FtpError::InvalidAddressFamily`], which the server maps to reply 522.
pub fn parse_eprt(arg: &str) -> FtpResult<SocketAddr> {
    let delim = arg
        .chars()
        .next()
        .ok_or_else(|| FtpError::InvalidAddress(arg.to_string()))?;

    let fields: Vec<&str> = arg.trim_matches(delim).split(delim).collect();
    let &[proto, host, port] = fields.as_slice() else {
        return Err(FtpError::InvalidAddress(arg.to_string()));
    };

    match proto {
        "1" | "2" => {}
        _ => return Err(FtpError::InvalidAddressFamily),
    }

    let ip: IpAddr = host
        .parse()
        .map_err(|_| FtpError::InvalidAddress(arg.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| FtpError::InvalidAddress(arg.to_string()))?;

    Ok(SocketAddr::new(ip, port))
}

/// Extract the endpoint from a `227 Entering Passive Mode (a,b,c,d,p1,p2).`
/// reply message.
pub fn parse_pasv_reply(msg: &str) -> FtpResult<SocketAddrV4> {
    let inner = between_parens(msg).ok_or_else(|| FtpError::InvalidAddress(msg.to_string()))?;
    parse_host_port(inner)
}

/// Extract the port from a `229 Entering Extended Passive Mode (|||port|).`
/// reply message.
pub fn parse_epsv_reply(msg: &str) -> FtpResult<u16> {
    let caps = EPSV_PORT_RE
        .captures(msg)
        .ok_or_else(|| FtpError::InvalidAddress(msg.to_string()))?;
    caps[1]
        .parse()
        .map_err(|_| FtpError::InvalidAddress(msg.to_string()))
}

fn between_parens(msg: &str) -> Option<&str> {
    let start = msg.find('(')?;
    let end = msg.rfind(')')?;
    (start < end).then(|| &msg[start + 1..end])
}
