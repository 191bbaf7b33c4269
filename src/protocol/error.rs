//! SOCKS5 Failure Taxonomy
//!
//! Every way a conversation can end short of a working session, with the
//! reply code (if any) owed to the client.

use std::io;

use thiserror::Error;

use super::constants::*;

/// Errors produced while driving a SOCKS5 conversation.
#[derive(Debug, Error)]
pub enum SocksError {
    #[error("incorrect SOCKS version: {0:#04x}")]
    IncorrectVersion(u8),
    #[error("no acceptable authentication methods")]
    NoAcceptableMethods,
    #[error("command not supported: {0:#04x}")]
    CommandNotSupported(u8),
    #[error("address type not supported: {0:#04x}")]
    AddressTypeNotSupported(u8),
    #[error("network unreachable")]
    NetworkUnreachable,
    #[error("host unreachable")]
    HostUnreachable,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("general failure: {0}")]
    GeneralFailure(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SocksError {
    /// Classify a failed upstream dial.
    pub fn from_dial_error(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => SocksError::ConnectionRefused,
            io::ErrorKind::HostUnreachable => SocksError::HostUnreachable,
            io::ErrorKind::NetworkUnreachable => SocksError::NetworkUnreachable,
            _ => SocksError::GeneralFailure(err),
        }
    }

    /// REP code for the 10-byte error reply.
    ///
    /// `None` means no reply is owed: the client never identified itself
    /// as SOCKS5, the method reply already carried the refusal, or the
    /// transport itself failed.
    pub fn reply_code(&self) -> Option<u8> {
        match self {
            SocksError::IncorrectVersion(_)
            | SocksError::NoAcceptableMethods
            | SocksError::Io(_) => None,
            SocksError::CommandNotSupported(_) => Some(SOCKS5_REPLY_COMMAND_NOT_SUPPORTED),
            SocksError::AddressTypeNotSupported(_) => {
                Some(SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED)
            }
            SocksError::NetworkUnreachable => Some(SOCKS5_REPLY_NETWORK_UNREACHABLE),
            SocksError::HostUnreachable => Some(SOCKS5_REPLY_HOST_UNREACHABLE),
            SocksError::ConnectionRefused => Some(SOCKS5_REPLY_CONNECTION_REFUSED),
            SocksError::GeneralFailure(_) => Some(SOCKS5_REPLY_GENERAL_FAILURE),
        }
    }
}
