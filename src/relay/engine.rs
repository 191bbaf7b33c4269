//! Relay Engine

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::io::copy_bidirectional_with_sizes;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::RelaySession;
use crate::config::Config;
use crate::protocol::{SocksError, TargetAddr};

/// Dials destinations and relays data between client and target
/// connections.
pub struct RelayEngine {
    connect_timeout: Duration,
    relay_timeout: Option<Duration>,
    buffer_size: usize,
}

impl RelayEngine {
    /// Create a new relay engine from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: config.server.connect_timeout,
            relay_timeout: config.server.relay_timeout,
            buffer_size: config.server.buffer_size,
        }
    }

    /// Establish a connection to the target server.
    ///
    /// Returns the stream together with its local endpoint in canonical
    /// IPv4 form, ready for the success reply.
    pub async fn connect_to_target(
        &self,
        target_addr: &TargetAddr,
        port: u16,
    ) -> Result<(TcpStream, SocketAddrV4), SocksError> {
        let addr = self.resolve_target_address(target_addr, port).await?;
        debug!("dialing {}", addr);

        let stream = match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("failed to connect to {}: {}", addr, e);
                return Err(SocksError::from_dial_error(e));
            }
            Err(_) => {
                warn!("connect to {} timed out after {:?}", addr, self.connect_timeout);
                return Err(SocksError::GeneralFailure(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connect timed out",
                )));
            }
        };

        let local = canonical_v4(stream.local_addr().map_err(SocksError::GeneralFailure)?);
        debug!("connected to {} from {}", addr, local);
        Ok((stream, local))
    }

    /// Resolve the target to a single IPv4 socket address.
    ///
    /// Every resolution failure, an IPv6-only answer included, is
    /// network-unreachable.
    async fn resolve_target_address(
        &self,
        target_addr: &TargetAddr,
        port: u16,
    ) -> Result<SocketAddr, SocksError> {
        match target_addr {
            TargetAddr::Ipv4(ip) => Ok(SocketAddr::new(IpAddr::V4(*ip), port)),
            TargetAddr::Domain(domain) => {
                let mut addrs = lookup_host((domain.as_str(), port)).await.map_err(|e| {
                    debug!("resolution of {} failed: {}", domain, e);
                    SocksError::NetworkUnreachable
                })?;
                addrs
                    .find(|addr| addr.is_ipv4())
                    .ok_or(SocksError::NetworkUnreachable)
            }
        }
    }

    /// Relay data bidirectionally until both directions reach EOF.
    ///
    /// Each direction half-closes its write end when its read side hits
    /// EOF, so one peer finishing early never cuts the other off.
    /// Splice errors are logged only; the peers observe a closed socket.
    pub async fn relay_data(
        &self,
        session: &RelaySession,
        mut client: TcpStream,
        mut target: TcpStream,
    ) {
        let transfer = copy_bidirectional_with_sizes(
            &mut client,
            &mut target,
            self.buffer_size,
            self.buffer_size,
        );

        let result = match self.relay_timeout {
            Some(limit) => match timeout(limit, transfer).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "relay {} -> {} exceeded the {:?} deadline",
                        session.client_addr, session.target_addr, limit
                    );
                    return;
                }
            },
            None => transfer.await,
        };

        match result {
            Ok((bytes_up, bytes_down)) => {
                session.update_bytes_up(bytes_up);
                session.update_bytes_down(bytes_down);
                session.log_stats();
            }
            Err(e) => {
                error!(
                    "relay {} -> {} aborted after {:?}: {}",
                    session.client_addr,
                    session.target_addr,
                    session.duration(),
                    e
                );
            }
        }
    }
}

/// Canonical 4-byte form of a local endpoint. An IPv4-mapped IPv6
/// address must not reach the reply encoder as 16 bytes.
fn canonical_v4(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(v6) => SocketAddrV4::new(
            v6.ip().to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
            v6.port(),
        ),
    }
}
