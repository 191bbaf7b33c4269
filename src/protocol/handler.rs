//! SOCKS5 Protocol Handler

use std::net::Ipv4Addr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::constants::*;
use super::error::SocksError;
use super::types::{AuthMethod, Socks5Request, Socks5Response, TargetAddr};

/// Drives one SOCKS5 conversation over a client stream.
///
/// Generic over the stream so the byte-level state machine can be
/// exercised in tests without a real socket.
pub struct Socks5Handler<S> {
    stream: S,
}

impl<S> Socks5Handler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new SOCKS5 handler for the given stream
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Handle the SOCKS5 handshake (method selection).
    ///
    /// Reads `VER NMETHODS METHODS[..]` and answers with the 2-byte
    /// method reply. No-auth is selected when offered, 0xFF otherwise.
    /// A wrong version byte fails without writing anything back.
    pub async fn handle_handshake(&mut self) -> Result<AuthMethod, SocksError> {
        let mut header = [0u8; 2];
        self.stream.read_exact(&mut header).await?;

        if header[0] != SOCKS5_VERSION {
            return Err(SocksError::IncorrectVersion(header[0]));
        }

        let mut methods = vec![0u8; header[1] as usize];
        self.stream.read_exact(&mut methods).await?;

        let selected = if methods.contains(&SOCKS5_AUTH_NONE) {
            AuthMethod::NoAuth
        } else {
            AuthMethod::Unsupported
        };
        self.stream
            .write_all(&[SOCKS5_VERSION, selected.method_code()])
            .await?;

        if selected == AuthMethod::Unsupported {
            return Err(SocksError::NoAcceptableMethods);
        }
        trace!("negotiated method {:#04x}", selected.method_code());
        Ok(selected)
    }

    /// Handle the connection request.
    ///
    /// Reads `VER CMD RSV ATYP DST.ADDR DST.PORT`. Only CONNECT and the
    /// IPv4/domain address types are accepted; RSV is not inspected.
    /// Validation stops at the first offending byte, so a rejected
    /// command or address type leaves the rest of the request unread.
    pub async fn handle_request(&mut self) -> Result<Socks5Request, SocksError> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).await?;

        if header[0] != SOCKS5_VERSION {
            return Err(SocksError::IncorrectVersion(header[0]));
        }

        let command = header[1];
        if command != SOCKS5_CMD_CONNECT {
            return Err(SocksError::CommandNotSupported(command));
        }

        let address_type = header[3];
        let target_addr = match address_type {
            SOCKS5_ADDR_IPV4 => {
                let mut octets = [0u8; 4];
                self.stream.read_exact(&mut octets).await?;
                TargetAddr::Ipv4(Ipv4Addr::from(octets))
            }
            SOCKS5_ADDR_DOMAIN => {
                let mut len = [0u8; 1];
                self.stream.read_exact(&mut len).await?;
                let mut name = vec![0u8; len[0] as usize];
                self.stream.read_exact(&mut name).await?;
                // Decoded lossily; a mangled name fails at resolution.
                TargetAddr::Domain(String::from_utf8_lossy(&name).into_owned())
            }
            other => return Err(SocksError::AddressTypeNotSupported(other)),
        };

        let mut port = [0u8; 2];
        self.stream.read_exact(&mut port).await?;
        let target_port = u16::from_be_bytes(port);

        debug!("request: CONNECT {}:{}", target_addr, target_port);
        Ok(Socks5Request {
            command,
            address_type,
            target_addr,
            target_port,
        })
    }

    /// Write the 10-byte reply.
    ///
    /// Surfaces the write error itself when the reply cannot be
    /// delivered.
    pub async fn send_response(&mut self, response: Socks5Response) -> Result<(), SocksError> {
        self.stream.write_all(&response.encode()).await?;
        Ok(())
    }

    /// Consume the handler, handing the stream back for the splice.
    pub fn into_stream(self) -> S {
        self.stream
    }
}
