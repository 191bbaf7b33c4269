//! SOCKS5 Protocol Types

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use super::constants::*;

/// Destination requested by the client.
///
/// IPv6 destinations are out of scope; an ATYP of 0x04 is rejected
/// during request parsing and never reaches this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    Ipv4(Ipv4Addr),
    Domain(String),
}

impl TargetAddr {
    /// Get the address type code for this address
    pub fn address_type(&self) -> u8 {
        match self {
            TargetAddr::Ipv4(_) => SOCKS5_ADDR_IPV4,
            TargetAddr::Domain(_) => SOCKS5_ADDR_DOMAIN,
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ipv4(ip) => ip.fmt(f),
            TargetAddr::Domain(domain) => domain.fmt(f),
        }
    }
}

/// Authentication methods negotiable in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NoAuth,
    Unsupported,
}

impl AuthMethod {
    /// Convert to method code
    pub fn method_code(&self) -> u8 {
        match self {
            AuthMethod::NoAuth => SOCKS5_AUTH_NONE,
            AuthMethod::Unsupported => SOCKS5_AUTH_UNSUPPORTED,
        }
    }
}

/// Parsed CONNECT request from the client.
#[derive(Debug, Clone)]
pub struct Socks5Request {
    pub command: u8,
    pub address_type: u8,
    pub target_addr: TargetAddr,
    pub target_port: u16,
}

/// Reply sent after the request phase.
///
/// Always encodes as exactly 10 bytes with ATYP=0x01, even when the
/// request named a domain; the bound address is always an IPv4.
#[derive(Debug, Clone, Copy)]
pub struct Socks5Response {
    pub reply_code: u8,
    pub bind_addr: SocketAddrV4,
}

impl Socks5Response {
    /// Create a success response
    pub fn success(bind_addr: SocketAddrV4) -> Self {
        Self {
            reply_code: SOCKS5_REPLY_SUCCESS,
            bind_addr,
        }
    }

    /// Create an error response with a zeroed bound endpoint
    pub fn error(reply_code: u8) -> Self {
        Self {
            reply_code,
            bind_addr: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
        }
    }

    /// Wire encoding: `VER REP RSV ATYP BND.ADDR(4) BND.PORT(2)`.
    pub fn encode(&self) -> [u8; 10] {
        let mut buf = [0u8; 10];
        buf[0] = SOCKS5_VERSION;
        buf[1] = self.reply_code;
        buf[2] = SOCKS5_RESERVED;
        buf[3] = SOCKS5_ADDR_IPV4;
        buf[4..8].copy_from_slice(&self.bind_addr.ip().octets());
        buf[8..10].copy_from_slice(&self.bind_addr.port().to_be_bytes());
        buf
    }
}
