//! A hyper HTTP/1 front end for an [`Engine`].
//!
//! The server owns the listener loop only: each accepted connection gets its own task,
//! request bodies are collected up to [`ServerConfig::max_body_size`], and everything
//! after that is the engine's job. With TLS configured, the handshake runs on the
//! connection task before hyper sees the stream.

use crate::body::ResponseBody;
use crate::config::{ServerConfig, TlsConfig};
use crate::engine::Engine;
use crate::tls::{self, TlsError};
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

pub struct ServerBuilder {
    engine: Option<Engine>,
    address: Option<String>,
    tls: Option<TlsConfig>,
    config: ServerConfig,
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("address", &self.address)
            .field("tls", &self.tls)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ServerBuilder {
    fn new() -> Self {
        Self { engine: None, address: None, tls: None, config: ServerConfig::default() }
    }

    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the listen address; takes precedence over [`ServerConfig::address`].
    pub fn bind(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Serves HTTPS using the PEM encoded certificate chain and private key; takes
    /// precedence over [`ServerConfig::tls`]. The files are read by [`build`](Self::build).
    pub fn tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsConfig { cert: cert.into(), key: key.into() });
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let engine = self.engine.ok_or(ServerBuildError::MissingEngine)?;
        let address = self.address.or(self.config.address).ok_or(ServerBuildError::MissingAddress)?;
        let addresses = address
            .to_socket_addrs()
            .map_err(|source| ServerBuildError::InvalidAddress { address: address.clone(), source })?
            .collect::<Vec<_>>();
        let acceptor =
            self.tls.or(self.config.tls).map(|TlsConfig { cert, key }| tls::load_acceptor(&cert, &key)).transpose()?;

        Ok(Server { engine: Arc::new(engine), addresses, max_body_size: self.config.max_body_size, tls: acceptor })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("engine must be set")]
    MissingEngine,

    #[error("address must be set")]
    MissingAddress,

    #[error("invalid address {address}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to set up tls: {source}")]
    Tls {
        #[from]
        source: TlsError,
    },
}

pub struct Server {
    engine: Arc<Engine>,
    addresses: Vec<SocketAddr>,
    max_body_size: usize,
    tls: Option<TlsAcceptor>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("addresses", &self.addresses)
            .field("max_body_size", &self.max_body_size)
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Binds the configured address and serves until the task is dropped.
    pub async fn start(self) -> io::Result<()> {
        info!(addresses = ?self.addresses, tls = self.tls.is_some(), "start listening");
        let listener = match TcpListener::bind(self.addresses.as_slice()).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return Err(e);
            }
        };

        self.serve(listener).await;
        Ok(())
    }

    /// Serves connections accepted from an already bound `listener`.
    pub async fn serve(self, listener: TcpListener) {
        let max_body_size = self.max_body_size;
        loop {
            let (tcp_stream, remote_addr) = match listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let engine = Arc::clone(&self.engine);
            let tls = self.tls.clone();
            tokio::spawn(async move {
                match tls {
                    Some(acceptor) => match acceptor.accept(tcp_stream).await {
                        Ok(tls_stream) => serve_connection(tls_stream, engine, max_body_size, remote_addr).await,
                        Err(e) => warn!(%remote_addr, cause = %e, "tls handshake failed"),
                    },
                    None => serve_connection(tcp_stream, engine, max_body_size, remote_addr).await,
                }
            });
        }
    }
}

async fn serve_connection<S>(stream: S, engine: Arc<Engine>, max_body_size: usize, remote_addr: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |request| handle(Arc::clone(&engine), max_body_size, request));
    match http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
        Ok(()) => debug!(%remote_addr, "finished process, connection shutdown"),
        Err(e) => error!(%remote_addr, cause = %e, "service has error, connection shutdown"),
    }
}

async fn handle(
    engine: Arc<Engine>,
    max_body_size: usize,
    request: Request<Incoming>,
) -> Result<Response<ResponseBody>, Infallible> {
    let (parts, body) = request.into_parts();

    let body = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let status = if e.downcast_ref::<LengthLimitError>().is_some() {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            warn!(cause = %e, status = status.as_u16(), "failed to read request body");
            return Ok(status_response(status));
        }
    };

    Ok(engine.serve(Request::from_parts(parts, body)).await)
}

fn status_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::once(Bytes::from(status.to_string())));
    *response.status_mut() = status;
    response
}
