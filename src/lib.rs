//! socksd
//!
//! A CONNECT-only SOCKS5 proxy server (RFC 1928): accept a client,
//! negotiate method selection, open a TCP connection to the requested
//! destination, and splice the two sockets until both directions close.

pub mod config;
pub mod connection;
pub mod protocol;
pub mod relay;

pub use config::Config;
pub use connection::ConnectionManager;

/// Common error type for the proxy server
pub type Result<T> = anyhow::Result<T>;
