//! Connection Manager Implementation

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::protocol::{Socks5Handler, Socks5Request, Socks5Response, SocksError};
use crate::relay::{RelayEngine, RelaySession};
use crate::Result;

/// Owns the bound socket and fans accepted connections out to
/// independent handler tasks.
pub struct ConnectionManager {
    listener: TcpListener,
    config: Arc<Config>,
    relay_engine: Arc<RelayEngine>,
}

impl ConnectionManager {
    /// Bind the listener. Accepting starts with [`serve`](Self::serve).
    pub async fn bind(config: Arc<Config>) -> Result<Self> {
        let bind_addr = config.server.bind_addr;
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind to {bind_addr}"))?;
        info!("listening on {}", listener.local_addr()?);

        let relay_engine = Arc::new(RelayEngine::from_config(&config));
        Ok(Self {
            listener,
            config,
            relay_engine,
        })
    }

    /// The address the listener actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Main connection acceptance loop.
    ///
    /// Each accepted socket is handed to a freshly spawned handler task
    /// which the loop does not await; `tokio::spawn` keeps a handler
    /// panic from reaching the loop. Accept failures are logged and do
    /// not stop the service.
    pub async fn serve(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("accepted connection from {}", addr);
                    let config = Arc::clone(&self.config);
                    let engine = Arc::clone(&self.relay_engine);
                    tokio::spawn(async move {
                        if let Err(e) =
                            Self::handle_connection(stream, addr, config, engine).await
                        {
                            error!("connection from {} failed: {}", addr, e);
                        }
                        debug!("{} closed", addr);
                    });
                }
                Err(e) => {
                    error!("error accepting connection: {}", e);
                }
            }
        }
    }

    /// Carry one SOCKS5 conversation end-to-end.
    ///
    /// Phases 1-2 run under the handshake deadline; the dial runs under
    /// the engine's own connect deadline so a slow destination still
    /// earns its reply. Replies are written outside both deadlines so a
    /// reply is never cut off mid-write. Both sockets are dropped
    /// exactly once when this returns.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        config: Arc<Config>,
        engine: Arc<RelayEngine>,
    ) -> std::result::Result<(), SocksError> {
        let mut handler = Socks5Handler::new(stream);

        let negotiated = timeout(
            config.server.handshake_timeout,
            Self::negotiate(&mut handler),
        )
        .await;

        let request = match negotiated {
            Ok(Ok(request)) => request,
            Ok(Err(e)) => {
                return Err(Self::send_error_reply(&mut handler, e).await);
            }
            Err(_) => {
                return Err(SocksError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "handshake timed out",
                )));
            }
        };

        let (target, bound) = match engine
            .connect_to_target(&request.target_addr, request.target_port)
            .await
        {
            Ok(dialed) => dialed,
            Err(e) => {
                return Err(Self::send_error_reply(&mut handler, e).await);
            }
        };

        handler.send_response(Socks5Response::success(bound)).await?;

        let session = RelaySession::new(addr, target.peer_addr()?);
        engine
            .relay_data(&session, handler.into_stream(), target)
            .await;
        Ok(())
    }

    /// Phases 1-2: method selection and request parsing.
    ///
    /// Once the method reply is out, every terminal failure except a
    /// bogus version byte owes the client exactly one 10-byte reply, so
    /// transport errors from here on fall into the general bucket.
    async fn negotiate(
        handler: &mut Socks5Handler<TcpStream>,
    ) -> std::result::Result<Socks5Request, SocksError> {
        handler.handle_handshake().await?;
        handler.handle_request().await.map_err(|e| match e {
            SocksError::Io(err) => SocksError::GeneralFailure(err),
            other => other,
        })
    }

    /// Send the reply owed for `e`, if any. A failed reply write is
    /// surfaced in place of the original error.
    async fn send_error_reply(
        handler: &mut Socks5Handler<TcpStream>,
        e: SocksError,
    ) -> SocksError {
        if let Some(code) = e.reply_code() {
            if let Err(write_err) = handler.send_response(Socks5Response::error(code)).await {
                return write_err;
            }
        }
        e
    }
}
